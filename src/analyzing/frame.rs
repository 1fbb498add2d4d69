use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use crate::{
    analyzing::{BlockId, Blocks, InstanceId, MethodId, VariableName},
    program::{Generator, Instruction, InstructionProgram},
};

/// Stable handle addressing a [`CallContext`] inside the engine's frame
/// arena.
///
/// Frames are retained after popping so the trace they produced stays
/// addressable; a `FrameId` is valid for the run and the result that
/// absorbs it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(u32);

impl FrameId {
    pub(crate) fn new(index: usize) -> Self {
        // Frame count is bounded by the instruction limit, u32 is plenty.
        #[allow(clippy::cast_possible_truncation)]
        FrameId(index as u32)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }

    #[cfg(test)]
    pub(crate) fn entry() -> Self {
        FrameId(0)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

/// One deferred call waiting in a frame's dynamic-call queue.
///
/// Dynamic calls emulate continuation-style composition without threads:
/// they are resolved at queue time and run when the queueing frame pops.
/// The generator is optional - a call that failed to resolve still drains,
/// degrading into the taint short-circuit.
pub struct DynamicCall {
    method: MethodId,
    generator: Option<Arc<dyn Generator>>,
    arguments: Vec<InstanceId>,
}

impl DynamicCall {
    pub(crate) fn new(
        method: MethodId,
        generator: Option<Arc<dyn Generator>>,
        arguments: Vec<InstanceId>,
    ) -> Self {
        DynamicCall {
            method,
            generator,
            arguments,
        }
    }

    /// Returns the resolved call target.
    #[must_use]
    pub fn method(&self) -> &MethodId {
        &self.method
    }

    /// Returns the argument instances the call will receive.
    #[must_use]
    pub fn arguments(&self) -> &[InstanceId] {
        &self.arguments
    }

    pub(crate) fn into_parts(self) -> (MethodId, Option<Arc<dyn Generator>>, Vec<InstanceId>) {
        (self.method, self.generator, self.arguments)
    }
}

impl fmt::Debug for DynamicCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicCall")
            .field("method", &self.method)
            .field("arguments", &self.arguments)
            .field("resolved", &self.generator.is_some())
            .finish()
    }
}

/// One activation record of the analyzing call stack.
///
/// A frame owns its private variable mapping, an instruction pointer into
/// the immutable program materialized at push time, back-references to its
/// caller and the block that was executing in the caller at the moment of
/// the call, its own entry/current block, and two dynamic-call queues:
///
/// - `contexts_dynamic_calls` - calls queued while this frame's
///   instructions ran,
/// - `following_dynamic_calls` - calls that must run after this frame *and*
///   whatever it queued itself.
///
/// Frames are created by [`AnalyzingContext::push_call`](crate::analyzing::AnalyzingContext::push_call)
/// and stay addressable after popping for provenance queries.
#[derive(Debug)]
pub struct CallContext {
    id: FrameId,
    method: MethodId,
    program: Arc<InstructionProgram>,
    ip: usize,
    variables: HashMap<VariableName, InstanceId>,
    arguments: Vec<InstanceId>,
    caller: Option<FrameId>,
    calling_block: Option<BlockId>,
    entry_block: Option<BlockId>,
    current_block: Option<BlockId>,
    contexts_dynamic_calls: VecDeque<DynamicCall>,
    following_dynamic_calls: VecDeque<DynamicCall>,
}

impl CallContext {
    pub(crate) fn new(
        id: FrameId,
        method: MethodId,
        program: Arc<InstructionProgram>,
        arguments: Vec<InstanceId>,
        caller: Option<FrameId>,
        calling_block: Option<BlockId>,
    ) -> Self {
        CallContext {
            id,
            method,
            program,
            ip: 0,
            variables: HashMap::new(),
            arguments,
            caller,
            calling_block,
            entry_block: None,
            current_block: None,
            contexts_dynamic_calls: VecDeque::new(),
            following_dynamic_calls: VecDeque::new(),
        }
    }

    /// Returns this frame's handle.
    #[must_use]
    pub fn id(&self) -> FrameId {
        self.id
    }

    /// Returns the method this frame activates.
    #[must_use]
    pub fn method(&self) -> &MethodId {
        &self.method
    }

    /// Returns the frame's immutable instruction program.
    #[must_use]
    pub fn program(&self) -> &Arc<InstructionProgram> {
        &self.program
    }

    /// Returns the current instruction pointer.
    #[must_use]
    pub fn instruction_pointer(&self) -> usize {
        self.ip
    }

    /// Returns `true` once the instruction pointer has reached the end of
    /// the program.
    #[must_use]
    pub fn is_call_end(&self) -> bool {
        self.ip >= self.program.len()
    }

    /// Returns the calling frame, `None` at the root.
    #[must_use]
    pub fn caller(&self) -> Option<FrameId> {
        self.caller
    }

    /// Returns the block that was executing in the caller when this call
    /// was pushed.
    #[must_use]
    pub fn calling_block(&self) -> Option<BlockId> {
        self.calling_block
    }

    /// Returns the first block this frame executed.
    ///
    /// `None` for frames with an empty program - such frames never produce
    /// a block.
    #[must_use]
    pub fn entry_block(&self) -> Option<BlockId> {
        self.entry_block
    }

    /// Returns the block currently executing in this frame.
    #[must_use]
    pub fn current_block(&self) -> Option<BlockId> {
        self.current_block
    }

    /// Returns the argument instances bound to this frame.
    #[must_use]
    pub fn arguments(&self) -> &[InstanceId] {
        &self.arguments
    }

    /// Looks up a locally bound variable.
    #[must_use]
    pub fn variable(&self, name: &VariableName) -> Option<InstanceId> {
        self.variables.get(name).copied()
    }

    /// Iterates the frame's local variable bindings.
    pub fn variables(&self) -> impl Iterator<Item = (&VariableName, InstanceId)> {
        self.variables.iter().map(|(name, id)| (name, *id))
    }

    /// Returns the instruction at the pointer and advances it.
    ///
    /// Appends and links a new [`ExecutedBlock`](crate::analyzing::ExecutedBlock)
    /// whenever the instruction's provenance tag differs (by identity) from
    /// the current block's. Returns `None` once the program is exhausted.
    pub(crate) fn next_instruction(&mut self, blocks: &mut Blocks) -> Option<Arc<dyn Instruction>> {
        let instruction = self.program.get(self.ip)?.clone();
        self.ip += 1;

        let info = instruction.info();
        let starts_new_block = match self.current_block {
            None => true,
            Some(block) => !Arc::ptr_eq(blocks.get(block).info(), info),
        };
        if starts_new_block {
            let block = blocks.append(self.id, self.current_block, info.clone());
            if self.entry_block.is_none() {
                self.entry_block = Some(block);
            }
            self.current_block = Some(block);
        }

        Some(instruction)
    }

    /// Returns the instruction immediately preceding the pointer - the one
    /// currently executing.
    pub(crate) fn executing_instruction(&self) -> Option<&Arc<dyn Instruction>> {
        self.ip.checked_sub(1).and_then(|index| self.program.get(index))
    }

    /// Binds `name` to `instance`, returning the previous occupant.
    pub(crate) fn insert_variable(
        &mut self,
        name: VariableName,
        instance: InstanceId,
    ) -> Option<InstanceId> {
        self.variables.insert(name, instance)
    }

    pub(crate) fn jump_to(&mut self, target: usize) {
        self.ip = target;
    }

    /// Moves the pointer past the end of the program, ending the frame.
    pub(crate) fn end(&mut self) {
        self.ip = self.program.len();
    }

    pub(crate) fn queue_dynamic_call(&mut self, call: DynamicCall) {
        self.contexts_dynamic_calls.push_back(call);
    }

    pub(crate) fn has_queued_dynamic_calls(&self) -> bool {
        !self.contexts_dynamic_calls.is_empty() || !self.following_dynamic_calls.is_empty()
    }

    /// Takes both dynamic-call queues out of the frame, in drain order:
    /// calls this frame queued itself, then calls that were waiting behind
    /// it.
    pub(crate) fn take_dynamic_calls(&mut self) -> (VecDeque<DynamicCall>, VecDeque<DynamicCall>) {
        (
            std::mem::take(&mut self.contexts_dynamic_calls),
            std::mem::take(&mut self.following_dynamic_calls),
        )
    }

    /// Tail-appends `calls` to the frame's following-calls queue.
    pub(crate) fn extend_following_dynamic_calls(
        &mut self,
        calls: impl IntoIterator<Item = DynamicCall>,
    ) {
        self.following_dynamic_calls.extend(calls);
    }
}
