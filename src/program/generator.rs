use crate::{program::Emitter, Result};

/// Produces the instruction program for one method body.
///
/// Generators are supplied by compiling front ends and run exactly once per
/// frame push: the engine hands the generator a fresh [`Emitter`], the
/// generator emits the method's instructions, and the sealed program becomes
/// the frame's immutable body.
///
/// Generators must be deterministic - the engine caches statically resolved
/// generators per method id and re-runs them for every push.
pub trait Generator: Send + Sync {
    /// Emits the method body into `emitter`.
    ///
    /// # Errors
    ///
    /// Returns an error when the body cannot be emitted; this aborts the
    /// push (and the run), it is not a taint event.
    fn generate(&self, emitter: &mut Emitter) -> Result<()>;
}
