use std::fmt;
use std::sync::Arc;

use crate::analyzing::{BlockId, MethodId, VariableName};

/// Call-site transformation contract supplied by the emitting front end.
///
/// A transform provider knows how a call instruction maps back onto the
/// original source. The engine consults it for one thing only: whether a
/// given argument position is optional, i.e. whether the argument can be
/// deleted from the source without deleting the whole call.
///
/// Providers are attached to call instructions at emission time and travel
/// with the per-block call records, where
/// [`ExecutedBlock::remove_providers`](crate::analyzing::ExecutedBlock::remove_providers)
/// consumes them.
pub trait CallTransform: fmt::Debug + Send + Sync {
    /// Returns `true` if the argument at `index` may be removed on its own.
    fn is_optional(&self, index: usize) -> bool;
}

/// Describes one way to eliminate a value's presence from the original
/// source.
///
/// Remove providers are the currency between the execution trace and the
/// downstream edit synthesizer: for a given instance, a block can offer the
/// deletion of the assignment that bound it, the deletion of a single
/// optional call argument, or the deletion of a whole call. The synthesizer
/// picks the least destructive valid option.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoveProvider {
    /// Delete the assignment statement that bound the value.
    Assignment {
        /// Variable the assignment targeted.
        variable: VariableName,
    },
    /// Delete a single optional argument at a call site.
    CallArgument {
        /// Method the call targeted.
        method: MethodId,
        /// Zero-based argument position.
        index: usize,
    },
    /// Delete the whole call the value was passed to.
    Call {
        /// Method the call targeted.
        method: MethodId,
    },
}

/// The edits provider active while a call instruction resolves.
///
/// Before a call instruction executes, the engine swaps in a provider scoped
/// to that call's transform provider and the block the call was issued from,
/// so that any edit synthesized during the call's resolution is attributable
/// to that exact call site. Direct invokes share the provider of their
/// enclosing call; any other instruction clears it.
#[derive(Clone, Debug)]
pub struct EditsProvider {
    /// Transform provider of the call being resolved.
    transform: Arc<dyn CallTransform>,
    /// Block the call was issued from.
    block: BlockId,
}

impl EditsProvider {
    /// Creates a provider scoped to a call's transform and issuing block.
    #[must_use]
    pub fn new(transform: Arc<dyn CallTransform>, block: BlockId) -> Self {
        EditsProvider { transform, block }
    }

    /// Returns the transform provider of the call being resolved.
    #[must_use]
    pub fn transform(&self) -> &Arc<dyn CallTransform> {
        &self.transform
    }

    /// Returns the block the call was issued from.
    #[must_use]
    pub fn block(&self) -> BlockId {
        self.block
    }
}
