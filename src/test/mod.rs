//! Shared functionality which is used in unit- and integration-tests.

use std::sync::{Arc, Mutex};

use crate::{
    analyzing::{AnalyzingContext, CallTransform, DirectValue, MethodId, MethodRegistry},
    program::{DirectMethod, Emitter, Generator},
    Result,
};

/// Wraps a closure as a [`Generator`].
pub(crate) struct ClosureGenerator<F>(pub F);

impl<F> Generator for ClosureGenerator<F>
where
    F: Fn(&mut Emitter) -> Result<()> + Send + Sync,
{
    fn generate(&self, emitter: &mut Emitter) -> Result<()> {
        (self.0)(emitter)
    }
}

/// Builds a generator from an emitting closure.
pub(crate) fn generator<F>(body: F) -> Arc<dyn Generator>
where
    F: Fn(&mut Emitter) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(ClosureGenerator(body))
}

/// Builds a native callout from a closure.
pub(crate) fn native<F>(body: F) -> DirectMethod
where
    F: Fn(&mut AnalyzingContext) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(body)
}

/// Chronological record of which method bodies actually ran.
pub(crate) type CallLog = Arc<Mutex<Vec<&'static str>>>;

pub(crate) fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// A generator whose body appends `name` to `log` when executed.
pub(crate) fn logging_generator(log: CallLog, name: &'static str) -> Arc<dyn Generator> {
    generator(move |emitter| {
        let log = log.clone();
        emitter.start_block(name);
        emitter.direct_invoke(native(move |_context| {
            log.lock().unwrap().push(name);
            Ok(())
        }));
        Ok(())
    })
}

/// Transform provider marking a fixed set of argument positions optional.
#[derive(Debug)]
pub(crate) struct OptionalArgs(pub Vec<usize>);

impl CallTransform for OptionalArgs {
    fn is_optional(&self, index: usize) -> bool {
        self.0.contains(&index)
    }
}

/// The method id of the native integer addition registered by
/// [`arithmetic_registry`].
pub(crate) fn add_method() -> MethodId {
    MethodId::new("Add", 2)
}

/// A registry with a native two-argument integer `Add`.
///
/// `Add` sums its `Int32` arguments (treating anything else as zero) and
/// leaves the sum as the engine's last return value.
pub(crate) fn arithmetic_registry() -> Arc<MethodRegistry> {
    let registry = MethodRegistry::new();
    registry.register(
        add_method(),
        generator(|emitter| {
            emitter.start_block("Add(a, b)");
            emitter.direct_invoke(native(|context| {
                let lhs = context.argument(0)?;
                let rhs = context.argument(1)?;
                let sum: i32 = [lhs, rhs]
                    .iter()
                    .filter_map(|&id| context.instances().get(id).direct_value())
                    .filter_map(DirectValue::as_i32)
                    .sum();
                let result = context.create_direct_instance(DirectValue::I32(sum));
                context.set_last_return(result);
                Ok(())
            }));
            Ok(())
        }),
    );
    Arc::new(registry)
}
