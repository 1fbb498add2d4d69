use std::sync::Arc;

use crate::{
    analyzing::{InstanceId, InstanceInfo, Instances, MethodId},
    program::Generator,
};

/// Method-resolution contract consumed by the engine.
///
/// A loader turns [`MethodId`]s into executable [`Generator`]s in three
/// tiers, queried in order by
/// [`AnalyzingContext::resolve_generator`](crate::analyzing::AnalyzingContext::resolve_generator):
///
/// 1. **Overrides** - per-call-site generators that may depend on the
///    concrete argument instances. Never cached.
/// 2. **Dynamic resolution** - for methods flagged
///    [`MethodFlags::DYNAMIC`](crate::analyzing::MethodFlags::DYNAMIC),
///    rewrite the id based on the runtime type descriptors of the
///    arguments.
/// 3. **Static resolution** - the pure `MethodId → Generator` mapping;
///    results are memoized by the engine.
///
/// Front ends implement this per source language;
/// [`MethodRegistry`](crate::analyzing::MethodRegistry) is a ready-made
/// table-driven implementation.
pub trait Loader: Send + Sync {
    /// Returns a call-site specific generator for `method`, if one applies
    /// to these concrete arguments.
    ///
    /// The engine never caches the returned generator: an override may
    /// depend on argument identity and must be recomputed per call site.
    fn overriding_generator(
        &self,
        method: &MethodId,
        arguments: &[InstanceId],
        instances: &Instances,
    ) -> Option<Arc<dyn Generator>>;

    /// Resolves a dynamic method id to its concrete target given the
    /// runtime type descriptors of the arguments.
    ///
    /// Returns the input id unchanged when no better target is known.
    fn dynamic_resolve(&self, method: &MethodId, argument_types: &[Arc<InstanceInfo>]) -> MethodId;

    /// Statically resolves a method id to its generator.
    ///
    /// Returns `None` for unknown or abstract methods; the engine degrades
    /// such calls into the taint short-circuit.
    fn static_resolve(&self, method: &MethodId) -> Option<Arc<dyn Generator>>;
}
