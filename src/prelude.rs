//! Convenient re-exports of the most commonly used types and traits.
//!
//! This module provides a curated selection of the most frequently used
//! types from across the `ialscope` library, allowing for convenient glob
//! imports.
//!
//! # Example
//!
//! ```rust
//! use ialscope::prelude::*;
//! use std::sync::Arc;
//!
//! let machine = Machine::default();
//! let registry = Arc::new(MethodRegistry::new());
//! let result = machine.run(registry, &MethodId::new("Main", 0), &[]).unwrap();
//! assert!(result.is_dirty(result.last_return_value()));
//! ```

pub use crate::{
    analyzing::{
        AnalysisLimits, AnalyzingContext, AnalyzingResult, BlockId, Blocks, CallContext,
        CallRecord, CallTransform, DirectValue, DynamicCall, EditsProvider, ExecutedBlock,
        FrameId, GeneratorMap, Instance, InstanceId, InstanceInfo, Instances, Loader, Machine,
        MachineSettings, MethodFlags, MethodId, MethodRegistry, OverrideFn, RemoveProvider,
        SharedInitializerFn, TruthinessFn, VariableName, TEMPORARY_SIGIL,
    },
    program::{
        DirectMethod, Emitter, Generator, Instruction, InstructionInfo, InstructionKind,
        InstructionProgram, Label,
    },
    Error, Result,
};
