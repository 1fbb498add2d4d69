use std::fmt;
use std::sync::Arc;

use crate::{
    analyzing::{AnalyzingContext, CallTransform, RemoveProvider},
    program::InstructionInfo,
    Result,
};

/// Classification consumed by the edits-provider swap.
///
/// Before executing an instruction, the engine adjusts its active edits
/// provider based on this kind: a `Call` installs a provider scoped to the
/// call site, a `DirectInvoke` keeps the provider of its enclosing call, and
/// anything else clears it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstructionKind {
    /// A call instruction - a separately editable call site.
    Call,
    /// A direct native invoke - not a separately editable call site.
    DirectInvoke,
    /// Any other instruction.
    Other,
}

/// One executable IAL instruction.
///
/// Instructions are immutable once materialized into an
/// [`InstructionProgram`] and carry, besides their behavior, the metadata
/// the engine's provenance bookkeeping reads back out:
///
/// - the shared [`InstructionInfo`] tag delimiting executed blocks,
/// - an optional assignment-site [`RemoveProvider`] captured by variable
///   writes,
/// - an optional [`CallTransform`] consumed by the edits-provider swap.
///
/// The concrete instruction set lives in
/// [`program::instructions`](crate::program::instructions); front ends can
/// implement this trait for their own extensions.
pub trait Instruction: fmt::Debug + Send + Sync {
    /// Returns the shared provenance tag this instruction was emitted under.
    fn info(&self) -> &Arc<InstructionInfo>;

    /// Executes the instruction against the analyzing context.
    ///
    /// # Errors
    ///
    /// Returns an error for fatal/structural conditions (unresolved
    /// variables, bad argument indices); recoverable conditions are handled
    /// through the taint protocol instead.
    fn execute(&self, context: &mut AnalyzingContext) -> Result<()>;

    /// Returns the classification used for the edits-provider swap.
    fn kind(&self) -> InstructionKind {
        InstructionKind::Other
    }

    /// Returns the remove provider attached at the assignment this
    /// instruction performs, if any.
    fn remove_provider(&self) -> Option<&RemoveProvider> {
        None
    }

    /// Returns the call-site transform provider, if this is a call
    /// instruction that carries one.
    fn transform(&self) -> Option<&Arc<dyn CallTransform>> {
        None
    }
}

/// An immutable, fully materialized instruction program.
///
/// Programs are produced exactly once per frame push by running the frame's
/// generator through an [`Emitter`](crate::program::Emitter); after sealing
/// they are shared read-only between the frame and any provenance consumers.
#[derive(Debug, Default)]
pub struct InstructionProgram {
    instructions: Vec<Arc<dyn Instruction>>,
}

impl InstructionProgram {
    pub(crate) fn from_instructions(instructions: Vec<Arc<dyn Instruction>>) -> Self {
        InstructionProgram { instructions }
    }

    /// Returns the number of instructions in the program.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns `true` if the program contains no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Returns the instruction at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Arc<dyn Instruction>> {
        self.instructions.get(index)
    }

    /// Iterates the program in instruction order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Instruction>> {
        self.instructions.iter()
    }
}
