// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]

//! # ialscope
//!
//! An analysis host that executes a dynamically-resolved, stack-machine
//! intermediate language ("IAL") while recording enough provenance about the
//! execution to let a separate tool synthesize reversible,
//! semantics-preserving edits to the original source.
//!
//! ## Features
//!
//! - **🧵 Call-stack interpreter** - lazy, cached, type-directed method
//!   dispatch over immutable instruction programs
//! - **🧪 Taint protocol** - unresolvable targets and tainted arguments
//!   degrade into monotonic dirty propagation instead of failing the run
//! - **⏳ Deferred calls** - continuation-style dynamic calls with strict,
//!   deterministic ordering and no real concurrency
//! - **🧭 Block-level provenance** - per-block scope starts/ends, affected
//!   instances, and remove providers for downstream edit synthesis
//! - **🛡️ Bounded execution** - instruction and call-depth budgets for
//!   untrusted analyzed programs
//!
//! ## Quick Start
//!
//! Add `ialscope` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! ialscope = "0.1"
//! ```
//!
//! ### Using the Prelude
//!
//! ```rust
//! use ialscope::prelude::*;
//! use std::sync::Arc;
//!
//! struct Entry;
//!
//! impl Generator for Entry {
//!     fn generate(&self, emitter: &mut Emitter) -> ialscope::Result<()> {
//!         emitter.start_block("let x = 40 + 2");
//!         emitter.assign_literal("x", DirectValue::I32(42));
//!         emitter.ret("x");
//!         Ok(())
//!     }
//! }
//!
//! let registry = MethodRegistry::new();
//! let main = MethodId::new("Main", 0);
//! registry.register(main.clone(), Arc::new(Entry));
//!
//! let machine = Machine::default();
//! let result = machine.run(Arc::new(registry), &main, &[])?;
//! assert_eq!(
//!     result.direct_value(result.last_return_value()),
//!     Some(&DirectValue::I32(42)),
//! );
//! # Ok::<(), ialscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! `ialscope` is organized into two domain modules:
//!
//! - [`program`] - the IAL instruction model: the [`program::Instruction`]
//!   contract, provenance tags, the [`program::Emitter`] builder, and the
//!   core instruction set
//! - [`analyzing`] - the execution engine: instances and taint, the call
//!   stack, dynamic-call scheduling, method resolution, executed-block
//!   provenance, and the [`analyzing::Machine`] driver
//! - [`prelude`] - convenient re-exports of the most commonly used types
//! - [`Error`] and [`Result`] - comprehensive error handling
//!
//! ### Execution model
//!
//! A driver repeatedly asks the [`analyzing::AnalyzingContext`] for the next
//! instruction; the context delegates to the topmost frame, which advances an
//! instruction pointer through a previously materialized, immutable program.
//! Calls push new frames after resolving (and memoizing) their generators;
//! returns, falling off the end of a program, or taint-triggered skips pop
//! frames, draining any dynamic calls chained to them. Scope and taint
//! metadata are written onto executed blocks and instances as side effects of
//! ordinary execution, and survive the run inside the
//! [`analyzing::AnalyzingResult`].
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result). Only structural
//! errors (unresolved variables, policy violations in emitted programs,
//! exhausted budgets) abort a run; unresolvable calls and tainted data
//! propagate forward through the dirty flag instead:
//!
//! ```rust
//! use ialscope::prelude::*;
//! use std::sync::Arc;
//!
//! let machine = Machine::default();
//! let result = machine
//!     .run(Arc::new(MethodRegistry::new()), &MethodId::new("Missing", 0), &[])
//!     .unwrap();
//!
//! // The unresolved entry call degraded into a dirty sentinel.
//! assert!(result.is_dirty(result.last_return_value()));
//! ```

mod error;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use ialscope::prelude::*;
///
/// let method = MethodId::new("Main", 0);
/// assert_eq!(method.parameters(), 0);
/// ```
pub mod prelude;

/// The IAL execution engine and its provenance-recording model.
///
/// See the [module documentation](analyzing) for the full architecture
/// overview: instances and taint, call frames, dynamic-call scheduling,
/// method resolution, executed-block provenance, and the run driver.
pub mod analyzing;

/// IAL instruction programs and their emission.
///
/// The [`program::Instruction`] contract, [`program::InstructionInfo`]
/// provenance tags, the [`program::Emitter`] builder, the
/// [`program::Generator`]/[`analyzing::Loader`] front-end seams, and the
/// core instruction set in [`program::instructions`].
pub mod program;

/// `ialscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is
/// always [`Error`]. This is used consistently throughout the crate for all
/// fallible operations.
pub type Result<T> = std::result::Result<T, Error>;

/// `ialscope` Error type
///
/// The main error type for all operations in this crate. See [`Error`] for
/// the taxonomy of structural errors, policy violations, and limit errors.
pub use error::Error;

/// The analysis host driving complete runs.
///
/// See [`analyzing::Machine`] for the run loop and
/// [`analyzing::AnalyzingResult`] for the produced trace summary.
pub use analyzing::{AnalyzingResult, Machine};
