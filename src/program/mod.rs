//! IAL instruction programs and their emission.
//!
//! This module carries everything the engine executes: the
//! [`Instruction`] contract and its [`InstructionProgram`] container, the
//! [`InstructionInfo`] provenance tags that delimit executed blocks, the
//! [`Emitter`] builder that materializes immutable programs out of
//! [`Generator`] runs, and the core instruction set in [`instructions`].
//!
//! # Architecture
//!
//! Programs go through exactly two phases:
//!
//! 1. **Emission** - a [`Generator`] (supplied by a compiling front end)
//!    drives an [`Emitter`]: it mints provenance tags, places labels, and
//!    emits instructions. This is the only mutable phase.
//! 2. **Materialization** - [`Emitter::seal`] resolves every label into an
//!    absolute instruction index and produces the immutable
//!    [`InstructionProgram`]. Sealing consumes the emitter, so emitting
//!    into a materialized program is unrepresentable.
//!
//! The engine materializes a frame's program exactly once, at push time,
//! and shares it read-only afterwards.

mod emitter;
mod generator;
mod info;
mod instruction;
pub mod instructions;

pub use emitter::{Emitter, Label};
pub use generator::Generator;
pub use info::InstructionInfo;
pub use instruction::{Instruction, InstructionKind, InstructionProgram};
pub use instructions::DirectMethod;
