use std::fmt;
use std::sync::Arc;

use crossbeam_skiplist::SkipMap;
use dashmap::DashMap;

use crate::{
    analyzing::{InstanceId, InstanceInfo, Instances, Loader, MethodId},
    program::Generator,
};

/// Map from method id to its statically registered generator.
pub type GeneratorMap = SkipMap<MethodId, Arc<dyn Generator>>;

/// Per-method override hook.
///
/// Called with the method id, the concrete argument instances, and the
/// instance arena; returns a call-site specific generator or `None` to fall
/// through to ordinary resolution. Override results are never cached by the
/// engine.
pub type OverrideFn =
    Arc<dyn Fn(&MethodId, &[InstanceId], &Instances) -> Option<Arc<dyn Generator>> + Send + Sync>;

/// A ready-made, table-driven [`Loader`] implementation.
///
/// Front ends and tests register method bodies, dynamic-dispatch targets,
/// and override hooks; the engine consumes the registry through the
/// [`Loader`] trait:
///
/// - **Static table** - `MethodId → Generator`, the ordinary resolution
///   path.
/// - **Dynamic table** - `(method, receiver type name) → MethodId`,
///   consulted for methods flagged
///   [`MethodFlags::DYNAMIC`](crate::analyzing::MethodFlags::DYNAMIC);
///   dispatch is directed by the runtime type of the first argument. An
///   unknown pairing leaves the id unchanged.
/// - **Override hooks** - per-method closures producing call-site specific
///   generators.
///
/// Registration goes through shared references, so a registry can be built
/// up incrementally while already shared with a machine.
///
/// # Examples
///
/// ```rust
/// use ialscope::prelude::*;
/// use std::sync::Arc;
///
/// struct Noop;
///
/// impl Generator for Noop {
///     fn generate(&self, emitter: &mut Emitter) -> ialscope::Result<()> {
///         emitter.nop();
///         Ok(())
///     }
/// }
///
/// let registry = MethodRegistry::new();
/// let method = MethodId::new("Widget.Refresh", 0);
/// registry.register(method.clone(), Arc::new(Noop));
/// assert!(registry.contains(&method));
/// ```
#[derive(Default)]
pub struct MethodRegistry {
    generators: GeneratorMap,
    dynamic_targets: DashMap<(MethodId, String), MethodId>,
    overrides: DashMap<MethodId, OverrideFn>,
}

impl MethodRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        MethodRegistry::default()
    }

    /// Registers the generator statically resolving `method`.
    ///
    /// A later registration for the same id replaces the earlier one for
    /// *future* resolutions; generators already memoized by a running
    /// engine are unaffected.
    pub fn register(&self, method: MethodId, generator: Arc<dyn Generator>) {
        self.generators.insert(method, generator);
    }

    /// Registers a dynamic-dispatch target: calls to `method` whose first
    /// argument carries `receiver_type` resolve to `target`.
    pub fn register_dynamic(&self, method: MethodId, receiver_type: &str, target: MethodId) {
        self.dynamic_targets
            .insert((method, receiver_type.to_string()), target);
    }

    /// Registers a per-method override hook.
    pub fn register_override(&self, method: MethodId, hook: OverrideFn) {
        self.overrides.insert(method, hook);
    }

    /// Returns `true` if a generator is statically registered for
    /// `method`.
    #[must_use]
    pub fn contains(&self, method: &MethodId) -> bool {
        self.generators.contains_key(method)
    }
}

impl Loader for MethodRegistry {
    fn overriding_generator(
        &self,
        method: &MethodId,
        arguments: &[InstanceId],
        instances: &Instances,
    ) -> Option<Arc<dyn Generator>> {
        let hook = self.overrides.get(method)?;
        hook.value()(method, arguments, instances)
    }

    fn dynamic_resolve(&self, method: &MethodId, argument_types: &[Arc<InstanceInfo>]) -> MethodId {
        let Some(receiver) = argument_types.first() else {
            return method.clone();
        };
        let key = (method.clone(), receiver.type_name().to_string());
        self.dynamic_targets
            .get(&key)
            .map_or_else(|| method.clone(), |target| target.value().clone())
    }

    fn static_resolve(&self, method: &MethodId) -> Option<Arc<dyn Generator>> {
        self.generators
            .get(method)
            .map(|entry| entry.value().clone())
    }
}

impl fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodRegistry")
            .field("generators", &self.generators.len())
            .field("dynamic_targets", &self.dynamic_targets.len())
            .field("overrides", &self.overrides.len())
            .finish()
    }
}
