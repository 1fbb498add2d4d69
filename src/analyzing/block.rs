use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::{
    analyzing::{CallTransform, FrameId, InstanceId, MethodId, RemoveProvider, VariableName},
    program::InstructionInfo,
};

/// Stable handle addressing an [`ExecutedBlock`] inside a [`Blocks`] arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block#{}", self.0)
    }
}

/// One call issued from an executed block.
///
/// Records the resolved target, the argument instances at the call site, and
/// the call's transform provider (if the emitting front end supplied one).
/// Consumed by [`ExecutedBlock::remove_providers`] to offer call-site
/// removal options.
#[derive(Clone, Debug)]
pub struct CallRecord {
    method: MethodId,
    arguments: Vec<InstanceId>,
    transform: Option<Arc<dyn CallTransform>>,
}

impl CallRecord {
    /// Returns the resolved call target.
    #[must_use]
    pub fn method(&self) -> &MethodId {
        &self.method
    }

    /// Returns the argument instances passed at the call site.
    #[must_use]
    pub fn arguments(&self) -> &[InstanceId] {
        &self.arguments
    }

    /// Returns the call's transform provider, if one was supplied.
    #[must_use]
    pub fn transform(&self) -> Option<&Arc<dyn CallTransform>> {
        self.transform.as_ref()
    }
}

/// One segment of a frame's execution trace.
///
/// A block covers the run of consecutive instructions sharing one
/// [`InstructionInfo`] provenance tag. Blocks form a doubly linked chain per
/// frame (singly linked in each direction) and accumulate, as side effects
/// of ordinary execution:
///
/// - the set of instances *affected* in the block,
/// - which variables' scopes *started* and *ended* here, per instance
///   (skipped for temporary variables),
/// - remove providers captured at assignment sites,
/// - the calls issued from the block.
///
/// Once the owning frame moves past a block it is never mutated again, but
/// it remains reachable for read-only provenance queries by the downstream
/// edit synthesizer.
#[derive(Debug)]
pub struct ExecutedBlock {
    id: BlockId,
    frame: FrameId,
    info: Arc<InstructionInfo>,
    previous: Option<BlockId>,
    next: Option<BlockId>,
    affected: Vec<InstanceId>,
    scope_starts: HashMap<InstanceId, Vec<VariableName>>,
    scope_ends: HashMap<InstanceId, Vec<VariableName>>,
    removes: HashMap<InstanceId, Vec<RemoveProvider>>,
    calls: Vec<CallRecord>,
}

impl ExecutedBlock {
    /// Returns this block's handle.
    #[must_use]
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// Returns the frame this block was executed in.
    #[must_use]
    pub fn frame(&self) -> FrameId {
        self.frame
    }

    /// Returns the shared provenance tag delimiting this block.
    #[must_use]
    pub fn info(&self) -> &Arc<InstructionInfo> {
        &self.info
    }

    /// Returns the preceding block of the same frame.
    #[must_use]
    pub fn previous(&self) -> Option<BlockId> {
        self.previous
    }

    /// Returns the following block of the same frame.
    #[must_use]
    pub fn next(&self) -> Option<BlockId> {
        self.next
    }

    /// Returns the instances affected in this block, in first-touch order.
    #[must_use]
    pub fn affected_instances(&self) -> &[InstanceId] {
        &self.affected
    }

    /// Returns the variables whose scope started here holding `instance`.
    #[must_use]
    pub fn scope_starts(&self, instance: InstanceId) -> &[VariableName] {
        self.scope_starts
            .get(&instance)
            .map_or(&[], Vec::as_slice)
    }

    /// Returns the variables whose scope ended here while holding
    /// `instance`.
    #[must_use]
    pub fn scope_ends(&self, instance: InstanceId) -> &[VariableName] {
        self.scope_ends.get(&instance).map_or(&[], Vec::as_slice)
    }

    /// Returns the calls issued from this block, in program order.
    #[must_use]
    pub fn calls(&self) -> &[CallRecord] {
        &self.calls
    }

    /// Yields every currently available way to eliminate `instance` from the
    /// original source.
    ///
    /// The query combines two strategies, in order:
    ///
    /// 1. remove providers captured at assignment time, then
    /// 2. for each call issued from this block that received `instance` as
    ///    an argument: removal of just that argument if the call's transform
    ///    provider marked the position optional, removal of the whole call
    ///    otherwise.
    ///
    /// Calls recorded without a transform provider contribute nothing - with
    /// no provider there is no source mapping to delete through.
    #[must_use]
    pub fn remove_providers(&self, instance: InstanceId) -> Vec<RemoveProvider> {
        let mut providers = self.removes.get(&instance).cloned().unwrap_or_default();

        for call in &self.calls {
            let Some(transform) = call.transform() else {
                continue;
            };
            for (index, argument) in call.arguments().iter().enumerate() {
                if *argument != instance {
                    continue;
                }
                if transform.is_optional(index) {
                    providers.push(RemoveProvider::CallArgument {
                        method: call.method().clone(),
                        index,
                    });
                } else {
                    providers.push(RemoveProvider::Call {
                        method: call.method().clone(),
                    });
                }
            }
        }

        providers
    }

    /// Records `instance` as affected in this block.
    pub(crate) fn touch(&mut self, instance: InstanceId) {
        if !self.affected.contains(&instance) {
            self.affected.push(instance);
        }
    }

    /// Records that `variable`'s scope started here holding `instance`.
    pub(crate) fn record_scope_start(&mut self, instance: InstanceId, variable: VariableName) {
        self.scope_starts.entry(instance).or_default().push(variable);
    }

    /// Records that `variable`'s scope ended here while holding `instance`.
    pub(crate) fn record_scope_end(&mut self, instance: InstanceId, variable: VariableName) {
        self.scope_ends.entry(instance).or_default().push(variable);
    }

    /// Attaches an assignment-site remove provider for `instance`.
    pub(crate) fn attach_remove_provider(
        &mut self,
        instance: InstanceId,
        provider: RemoveProvider,
    ) {
        self.removes.entry(instance).or_default().push(provider);
    }

    /// Registers a call issued from this block.
    pub(crate) fn register_call(
        &mut self,
        method: MethodId,
        arguments: Vec<InstanceId>,
        transform: Option<Arc<dyn CallTransform>>,
    ) {
        self.calls.push(CallRecord {
            method,
            arguments,
            transform,
        });
    }
}

/// Arena owning every [`ExecutedBlock`] created during one analysis run.
///
/// Blocks are created on demand the first time a frame sees a new
/// [`InstructionInfo`] tag, and are linked into that frame's chain as they
/// are appended. The arena is retained by the analysis result so block
/// chains stay traversable after execution ends.
#[derive(Debug, Default)]
pub struct Blocks {
    entries: Vec<ExecutedBlock>,
}

impl Blocks {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Blocks::default()
    }

    /// Returns the number of blocks created so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no block has been created yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the block addressed by `id`.
    #[must_use]
    pub fn get(&self, id: BlockId) -> &ExecutedBlock {
        &self.entries[id.0 as usize]
    }

    pub(crate) fn get_mut(&mut self, id: BlockId) -> &mut ExecutedBlock {
        &mut self.entries[id.0 as usize]
    }

    /// Appends a new block for `frame`, linked after `previous`.
    pub(crate) fn append(
        &mut self,
        frame: FrameId,
        previous: Option<BlockId>,
        info: Arc<InstructionInfo>,
    ) -> BlockId {
        // Arena capacity is bounded by the instruction limit, u32 is plenty.
        #[allow(clippy::cast_possible_truncation)]
        let id = BlockId(self.entries.len() as u32);
        if let Some(previous) = previous {
            self.entries[previous.0 as usize].next = Some(id);
        }
        self.entries.push(ExecutedBlock {
            id,
            frame,
            info,
            previous,
            next: None,
            affected: Vec::new(),
            scope_starts: HashMap::new(),
            scope_ends: HashMap::new(),
            removes: HashMap::new(),
            calls: Vec::new(),
        });
        id
    }

    /// Iterates a frame's block chain starting at `start`, following forward
    /// links.
    pub fn chain(&self, start: BlockId) -> impl Iterator<Item = &ExecutedBlock> {
        let mut cursor = Some(start);
        std::iter::from_fn(move || {
            let block = self.get(cursor?);
            cursor = block.next;
            Some(block)
        })
    }
}
