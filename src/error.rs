use thiserror::Error;

use crate::analyzing::VariableName;

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// This enum covers all possible error conditions that can occur while generating,
/// materializing, and executing IAL instruction programs. Each variant provides specific
/// context about the failure mode to enable appropriate error handling.
///
/// # Error Categories
///
/// ## Fatal / structural errors
/// - [`Error::UndefinedVariable`] - Variable lookup failed in local and global scope
/// - [`Error::UndefinedGlobal`] - Global variable lookup failed
/// - [`Error::NoActiveFrame`] - An operation required an active call frame
/// - [`Error::ArgumentOutOfRange`] - Argument index beyond the frame's argument list
/// - [`Error::NotDataInstance`] - Field access on a direct (non-composite) instance
/// - [`Error::UndefinedField`] - Field lookup failed on a data instance
///
/// These indicate a malformed instruction program and abort the analysis run.
///
/// ## Policy violations
/// - [`Error::LabelRedefined`] - A jump label was placed twice
/// - [`Error::UnboundLabel`] - A jump targets a label that was never placed
///
/// These are programmer errors in the emitting front end and fail immediately.
///
/// ## Limit errors
/// - [`Error::InstructionLimit`] - Executed instruction budget exhausted
/// - [`Error::CallDepthLimit`] - Call stack depth budget exhausted
///
/// Note that an unresolvable call target is *not* an error: it degrades into the
/// taint short-circuit and execution continues with a dirty result.
///
/// # Examples
///
/// ```rust
/// use ialscope::prelude::*;
/// use std::sync::Arc;
///
/// let machine = Machine::default();
/// let registry = Arc::new(MethodRegistry::new());
/// let method = MethodId::new("Main", 0);
///
/// match machine.run(registry, &method, &[]) {
///     Ok(result) => {
///         // An unregistered entry method is not fatal, it taints the result.
///         assert!(result.is_dirty(result.last_return_value()));
///     }
///     Err(e) => eprintln!("analysis aborted: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// Variable lookup failed in both the local and the global scope.
    ///
    /// Raised by variable reads when the name is bound neither in the current
    /// frame nor in the process-wide global scope. This indicates a malformed
    /// instruction program (a read before any write) and is fatal to the run.
    #[error("Variable '{name}' is not defined in local or global scope")]
    UndefinedVariable {
        /// The variable name that could not be resolved.
        name: VariableName,
    },

    /// Global variable lookup failed.
    ///
    /// Raised by explicit global reads when the name has never been written.
    #[error("Global variable '{name}' is not defined")]
    UndefinedGlobal {
        /// The global variable name that could not be resolved.
        name: VariableName,
    },

    /// An operation that requires an active call frame found an empty stack.
    ///
    /// Frame-scoped operations (variable writes, argument reads, jumps,
    /// dynamic-call queueing) are only meaningful while a call is executing.
    #[error("No call is active on the analyzing stack")]
    NoActiveFrame,

    /// An argument index was outside the current frame's argument list.
    #[error("Argument index {index} is out of range, {count} arguments are bound")]
    ArgumentOutOfRange {
        /// The requested argument index.
        index: usize,
        /// The number of arguments bound to the frame.
        count: usize,
    },

    /// A field accessor was used on a direct instance.
    ///
    /// Only data instances carry named fields; direct instances box a single
    /// native-like value and have no field storage.
    #[error("Field access on direct instance of type '{type_name}'")]
    NotDataInstance {
        /// Type name of the instance that was accessed.
        type_name: String,
    },

    /// A field read found no such field on a data instance.
    #[error("Field '{field}' is not defined on instance of type '{type_name}'")]
    UndefinedField {
        /// The requested field name.
        field: String,
        /// Type name of the accessed instance.
        type_name: String,
    },

    /// A jump label was placed a second time.
    ///
    /// Labels are write-once: the emitting front end may target a label any
    /// number of times but must place it exactly once.
    #[error("Label {label} has already been placed")]
    LabelRedefined {
        /// Index of the offending label.
        label: usize,
    },

    /// A program was sealed while a targeted label was still unplaced.
    #[error("Label {label} is targeted but was never placed")]
    UnboundLabel {
        /// Index of the offending label.
        label: usize,
    },

    /// The executed-instruction budget was exhausted.
    ///
    /// Guards against runaway programs (unbounded loops in analyzed code).
    /// The limit is configured through `AnalysisLimits`.
    #[error("Executed instruction limit reached - {limit}")]
    InstructionLimit {
        /// The configured instruction budget.
        limit: usize,
    },

    /// The call stack depth budget was exhausted.
    #[error("Call depth limit reached - {limit}")]
    CallDepthLimit {
        /// The configured call depth budget.
        limit: usize,
    },

    /// Generic error for miscellaneous failures.
    ///
    /// Used by native method callouts and front ends to report failures that
    /// don't fit into other categories.
    #[error("{0}")]
    Error(String),
}
