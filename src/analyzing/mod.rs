//! The IAL execution engine and its provenance-recording model.
//!
//! This module is the core of the crate: a call-stack interpreter that
//! executes dynamically-resolved instruction programs while recording, per
//! executed block, enough provenance for a downstream tool to synthesize
//! reversible source edits.
//!
//! # Architecture
//!
//! - Tagged values ([`Instance`]) live in an arena ([`Instances`]) and flow
//!   through the engine as stable [`InstanceId`] handles; aliasing copies
//!   handles, never instances.
//! - One activation record per call ([`CallContext`]), stacked inside the
//!   interpreter ([`AnalyzingContext`]); frames are retained after popping
//!   so the trace stays addressable.
//! - Each frame's execution is segmented into [`ExecutedBlock`]s by the
//!   provenance tags of its instructions; blocks accumulate scope
//!   starts/ends, affected instances, remove providers, and issued calls.
//! - Deferred invocations ([`DynamicCall`]) wait in per-frame queues and
//!   drain at pop time under strict ordering rules.
//! - Method resolution is type-directed and cached ([`Loader`],
//!   [`MethodRegistry`]); unresolvable targets degrade into the monotonic
//!   taint protocol instead of failing.
//! - [`Machine`] drives complete runs and produces the [`AnalyzingResult`]
//!   consumed by edit synthesis.
//!
//! # Key Components
//!
//! ## Value system
//! - [`Instance`] / [`Instances`] - tagged values and their arena
//! - [`DirectValue`] - native-like boxed values
//! - [`InstanceInfo`] - structural-identity type descriptors
//!
//! ## Execution
//! - [`AnalyzingContext`] - the call-stack interpreter
//! - [`CallContext`] - one activation record
//! - [`Machine`] / [`MachineSettings`] / [`AnalysisLimits`] - run driver
//!   and configuration
//!
//! ## Resolution
//! - [`Loader`] - the three-tier resolution contract
//! - [`MethodRegistry`] - table-driven loader implementation
//! - [`MethodId`] / [`MethodFlags`] - callable identity
//!
//! ## Provenance
//! - [`ExecutedBlock`] / [`Blocks`] - per-block execution trace
//! - [`RemoveProvider`] / [`CallTransform`] / [`EditsProvider`] - edit
//!   synthesis contracts
//! - [`AnalyzingResult`] - the completed-run summary
//!
//! # Thread Safety
//!
//! The engine is strictly single-threaded and cooperative: exactly one
//! instruction pointer is active at a time, and dynamic calls are a
//! deferred-execution queue, not concurrency. Types are `Send` so a whole
//! run can be moved between threads, but a run never shares mutable state.

mod block;
mod context;
mod edits;
mod frame;
mod instance;
mod loader;
mod machine;
mod method;
mod registry;
mod result;
mod variable;

#[cfg(test)]
mod tests;

pub use block::{BlockId, Blocks, CallRecord, ExecutedBlock};
pub use context::AnalyzingContext;
pub use edits::{CallTransform, EditsProvider, RemoveProvider};
pub use frame::{CallContext, DynamicCall, FrameId};
pub use instance::{DirectValue, Instance, InstanceId, InstanceInfo, Instances};
pub use loader::Loader;
pub use machine::{
    AnalysisLimits, Machine, MachineSettings, SharedInitializerFn, TruthinessFn,
};
pub use method::{MethodFlags, MethodId};
pub use registry::{GeneratorMap, MethodRegistry, OverrideFn};
pub use result::AnalyzingResult;
pub use variable::{VariableName, TEMPORARY_SIGIL};
