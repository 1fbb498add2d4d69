use std::fmt;
use std::sync::Arc;

use crate::{
    analyzing::{
        AnalyzingContext, AnalyzingResult, DirectValue, Instance, InstanceInfo, Loader, MethodId,
    },
    Result,
};

/// Truthiness test applied by conditional jumps.
///
/// Receives the instance under test; the default implementation treats
/// `Null`, `false`, numeric zero, and the empty string as falsy, everything
/// else (including every data instance) as truthy.
pub type TruthinessFn = Arc<dyn Fn(&Instance) -> bool + Send + Sync>;

/// Shared-initializer lookup.
///
/// Given the descriptor of a freshly created data instance, returns the
/// method to run once per descriptor before the type's instances are used
/// further. The initializer receives the triggering instance as its single
/// argument and runs as an ordinary dynamic call on the creating frame.
pub type SharedInitializerFn = Arc<dyn Fn(&InstanceInfo) -> Option<MethodId> + Send + Sync>;

/// Execution budgets enforced during an analysis run.
///
/// Analyzed programs are untrusted: loops that never terminate and runaway
/// recursion must not hang the host. Exceeding a budget aborts the run with
/// a descriptive error - limits are fatal, not taint events.
///
/// # Examples
///
/// ```rust
/// use ialscope::analyzing::AnalysisLimits;
///
/// let limits = AnalysisLimits {
///     max_instructions: 10_000,
///     ..AnalysisLimits::default()
/// };
/// assert_eq!(limits.max_instructions, 10_000);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct AnalysisLimits {
    /// Maximum number of instructions a run may execute.
    pub max_instructions: usize,
    /// Maximum call stack depth.
    pub max_call_depth: usize,
}

impl Default for AnalysisLimits {
    fn default() -> Self {
        AnalysisLimits {
            max_instructions: 1_000_000,
            max_call_depth: 512,
        }
    }
}

/// Global settings shared by every run of one [`Machine`].
///
/// Settings bundle the conditional truthiness test, the optional
/// shared-initializer lookup, and the execution limits. Construct with
/// [`MachineSettings::default`] and refine through the builder-style
/// `with_*` methods.
#[derive(Clone)]
pub struct MachineSettings {
    limits: AnalysisLimits,
    truthiness: TruthinessFn,
    shared_initializer: Option<SharedInitializerFn>,
}

impl MachineSettings {
    /// Returns the configured execution limits.
    #[must_use]
    pub fn limits(&self) -> &AnalysisLimits {
        &self.limits
    }

    /// Returns the truthiness test.
    #[must_use]
    pub fn truthiness(&self) -> &TruthinessFn {
        &self.truthiness
    }

    /// Returns the shared-initializer lookup, if configured.
    #[must_use]
    pub fn shared_initializer(&self) -> Option<&SharedInitializerFn> {
        self.shared_initializer.as_ref()
    }

    /// Replaces the execution limits.
    #[must_use]
    pub fn with_limits(mut self, limits: AnalysisLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Replaces the truthiness test.
    #[must_use]
    pub fn with_truthiness(mut self, truthiness: TruthinessFn) -> Self {
        self.truthiness = truthiness;
        self
    }

    /// Installs a shared-initializer lookup.
    #[must_use]
    pub fn with_shared_initializer(mut self, lookup: SharedInitializerFn) -> Self {
        self.shared_initializer = Some(lookup);
        self
    }
}

impl Default for MachineSettings {
    fn default() -> Self {
        MachineSettings {
            limits: AnalysisLimits::default(),
            truthiness: Arc::new(default_truthiness),
            shared_initializer: None,
        }
    }
}

impl fmt::Debug for MachineSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MachineSettings")
            .field("limits", &self.limits)
            .field("shared_initializer", &self.shared_initializer.is_some())
            .finish_non_exhaustive()
    }
}

/// Default truthiness: falsy for `Null`, `false`, numeric zero, and the
/// empty string; truthy for everything else, data instances included.
fn default_truthiness(instance: &Instance) -> bool {
    match instance.direct_value() {
        Some(DirectValue::Null) => false,
        Some(DirectValue::Bool(value)) => *value,
        Some(DirectValue::I32(value)) => *value != 0,
        Some(DirectValue::I64(value)) => *value != 0,
        Some(DirectValue::F64(value)) => *value != 0.0,
        Some(DirectValue::String(value)) => !value.is_empty(),
        None => true,
    }
}

/// The analysis host driving complete runs.
///
/// A machine owns the [`MachineSettings`] shared by its runs and drives the
/// interpreter loop: it constructs the [`AnalyzingContext`], pushes the
/// entry call, steps instructions until execution ends, and hands back the
/// [`AnalyzingResult`].
///
/// # Examples
///
/// ```rust
/// use ialscope::prelude::*;
/// use std::sync::Arc;
///
/// struct Entry;
///
/// impl Generator for Entry {
///     fn generate(&self, emitter: &mut Emitter) -> ialscope::Result<()> {
///         emitter.start_block("let answer = 42");
///         emitter.assign_literal("answer", DirectValue::I32(42));
///         emitter.ret("answer");
///         Ok(())
///     }
/// }
///
/// let registry = MethodRegistry::new();
/// let main = MethodId::new("Main", 0);
/// registry.register(main.clone(), Arc::new(Entry));
///
/// let machine = Machine::default();
/// let result = machine.run(Arc::new(registry), &main, &[]).unwrap();
///
/// let value = result.direct_value(result.last_return_value());
/// assert_eq!(value, Some(&DirectValue::I32(42)));
/// ```
#[derive(Debug, Default)]
pub struct Machine {
    settings: MachineSettings,
}

impl Machine {
    /// Creates a machine with the given settings.
    #[must_use]
    pub fn new(settings: MachineSettings) -> Self {
        Machine { settings }
    }

    /// Returns the machine's settings.
    #[must_use]
    pub fn settings(&self) -> &MachineSettings {
        &self.settings
    }

    /// Runs a complete analysis of `method` with the given entry arguments.
    ///
    /// Arguments are materialized as fresh direct instances. The run ends
    /// when the call stack (including all chained dynamic calls) is
    /// exhausted.
    ///
    /// An unresolvable entry method is not an error: the run completes
    /// immediately with a tainted return value, like any other
    /// taint-short-circuited call.
    ///
    /// # Errors
    ///
    /// Returns an error for fatal/structural conditions in the executed
    /// programs and for exceeded execution limits.
    pub fn run(
        &self,
        loader: Arc<dyn Loader>,
        method: &MethodId,
        arguments: &[DirectValue],
    ) -> Result<AnalyzingResult> {
        let mut context = AnalyzingContext::new(self.settings.clone(), loader);

        let argument_ids: Vec<_> = arguments
            .iter()
            .map(|value| context.create_direct_instance(value.clone()))
            .collect();
        context.invoke(method.clone(), argument_ids)?;

        while let Some(instruction) = context.next_instruction()? {
            context.prepare(instruction.as_ref());
            instruction.execute(&mut context)?;
        }

        Ok(context.into_result())
    }
}
