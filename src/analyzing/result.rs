use crate::analyzing::{
    BlockId, Blocks, CallContext, DirectValue, ExecutedBlock, FrameId, InstanceId, Instances,
    MethodId,
};

/// The externally visible summary of a completed analysis run.
///
/// Absorbs the run's retained arenas - every frame, executed block, and
/// instance stays addressable - together with the last return value, the
/// permanent entry context, and the sequence of resolved method ids.
/// Downstream edit synthesis traverses this structure read-only.
///
/// # Examples
///
/// ```rust,ignore
/// let result = machine.run(loader, &method, &arguments)?;
///
/// let entry = result.entry_context().expect("entry call was pushed");
/// for block in result.blocks().chain(entry.entry_block().unwrap()) {
///     for &instance in block.affected_instances() {
///         let removals = block.remove_providers(instance);
///         // feed removals to the edit synthesizer...
///     }
/// }
/// ```
#[derive(Debug)]
pub struct AnalyzingResult {
    last_return_value: InstanceId,
    entry_context: Option<FrameId>,
    frames: Vec<CallContext>,
    blocks: Blocks,
    instances: Instances,
    resolved_methods: Vec<MethodId>,
    instructions_executed: usize,
}

impl AnalyzingResult {
    pub(crate) fn new(
        last_return_value: InstanceId,
        entry_context: Option<FrameId>,
        frames: Vec<CallContext>,
        blocks: Blocks,
        instances: Instances,
        resolved_methods: Vec<MethodId>,
        instructions_executed: usize,
    ) -> Self {
        AnalyzingResult {
            last_return_value,
            entry_context,
            frames,
            blocks,
            instances,
            resolved_methods,
            instructions_executed,
        }
    }

    /// Returns the engine's last return value.
    #[must_use]
    pub fn last_return_value(&self) -> InstanceId {
        self.last_return_value
    }

    /// Returns the permanent entry context - the very first pushed call.
    ///
    /// `None` only when the entry call itself was taint-skipped.
    #[must_use]
    pub fn entry_context(&self) -> Option<&CallContext> {
        self.entry_context.map(|id| &self.frames[id.index()])
    }

    /// Returns the frame addressed by `id`.
    #[must_use]
    pub fn frame(&self, id: FrameId) -> &CallContext {
        &self.frames[id.index()]
    }

    /// Iterates every frame of the run in push order.
    pub fn frames(&self) -> impl Iterator<Item = &CallContext> {
        self.frames.iter()
    }

    /// Returns the executed-block arena.
    #[must_use]
    pub fn blocks(&self) -> &Blocks {
        &self.blocks
    }

    /// Returns the block addressed by `id`.
    #[must_use]
    pub fn block(&self, id: BlockId) -> &ExecutedBlock {
        self.blocks.get(id)
    }

    /// Returns the instance arena.
    #[must_use]
    pub fn instances(&self) -> &Instances {
        &self.instances
    }

    /// Returns the number of instances created during the run.
    #[must_use]
    pub fn created_instances(&self) -> usize {
        self.instances.len()
    }

    /// Returns `true` if the instance was tainted during the run.
    #[must_use]
    pub fn is_dirty(&self, instance: InstanceId) -> bool {
        self.instances.is_dirty(instance)
    }

    /// Returns the boxed value of a direct instance, `None` for data
    /// instances.
    #[must_use]
    pub fn direct_value(&self, instance: InstanceId) -> Option<&DirectValue> {
        self.instances.get(instance).direct_value()
    }

    /// Returns every method id resolved during the run, in resolution
    /// order.
    #[must_use]
    pub fn resolved_methods(&self) -> &[MethodId] {
        &self.resolved_methods
    }

    /// Returns the number of instructions the run executed.
    #[must_use]
    pub fn instructions_executed(&self) -> usize {
        self.instructions_executed
    }
}
