use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace};

use crate::{
    analyzing::{
        AnalyzingResult, Blocks, CallContext, CallTransform, DirectValue, DynamicCall,
        EditsProvider, FrameId, InstanceId, InstanceInfo, Instances, Loader, MachineSettings,
        MethodId, VariableName,
    },
    program::{Emitter, Generator, Instruction, InstructionKind},
    Error, Result,
};

/// The call-stack interpreter of one analysis run.
///
/// `AnalyzingContext` owns every piece of run-wide state: the LIFO call
/// stack over a retained frame arena, the global variable scope, the
/// method-resolution cache, the instance and block arenas, the last return
/// value, and the active edits provider. A driver (normally
/// [`Machine::run`](crate::analyzing::Machine::run)) repeatedly asks it for
/// the next instruction and executes it against the context.
///
/// # Protocols
///
/// Three protocols give the engine its shape:
///
/// - **Taint short-circuit** ([`push_call`](Self::push_call)): a call whose
///   generator is absent, or any of whose arguments is already dirty, is
///   not pushed. Every argument is marked dirty and a fresh dirty direct
///   instance becomes the last return value; execution continues as if the
///   call had happened, but nothing about its effects is trusted.
/// - **Dynamic-call chaining** (pop): popping a frame drains the dynamic
///   calls it queued itself before the calls that were merely waiting
///   behind it, preserving strict program order across nested and chained
///   deferred invocations without real concurrency.
/// - **Edits-provider swap** ([`prepare`](Self::prepare)): before a call
///   instruction executes, the active provider is replaced by one scoped to
///   that call site; direct invokes inherit the enclosing provider; every
///   other instruction clears it.
///
/// The context is strictly single-threaded; shared mutable state needs no
/// locking because exactly one instruction pointer is active at a time.
pub struct AnalyzingContext {
    settings: MachineSettings,
    loader: Arc<dyn Loader>,
    instances: Instances,
    blocks: Blocks,
    /// Every frame ever pushed; popping removes from `stack`, never from
    /// here - the trace stays addressable.
    frames: Vec<CallContext>,
    stack: Vec<FrameId>,
    globals: HashMap<VariableName, InstanceId>,
    /// Statically resolved generators, write-once per method id.
    cache: DashMap<MethodId, Arc<dyn Generator>>,
    resolved_methods: Vec<MethodId>,
    initialized_infos: HashSet<InstanceInfo>,
    entry_frame: Option<FrameId>,
    null_instance: InstanceId,
    last_return: InstanceId,
    edits: Option<EditsProvider>,
    execution_end: bool,
    instructions_executed: usize,
}

impl AnalyzingContext {
    /// Creates a context for one run.
    #[must_use]
    pub fn new(settings: MachineSettings, loader: Arc<dyn Loader>) -> Self {
        let mut instances = Instances::new();
        let null_instance = instances.create_direct(DirectValue::Null);
        AnalyzingContext {
            settings,
            loader,
            instances,
            blocks: Blocks::new(),
            frames: Vec::new(),
            stack: Vec::new(),
            globals: HashMap::new(),
            cache: DashMap::new(),
            resolved_methods: Vec::new(),
            initialized_infos: HashSet::new(),
            entry_frame: None,
            null_instance,
            last_return: null_instance,
            edits: None,
            execution_end: false,
            instructions_executed: 0,
        }
    }

    /// Returns the instance arena.
    #[must_use]
    pub fn instances(&self) -> &Instances {
        &self.instances
    }

    /// Returns the executed-block arena.
    #[must_use]
    pub fn blocks(&self) -> &Blocks {
        &self.blocks
    }

    /// Returns the frame addressed by `id`.
    #[must_use]
    pub fn frame(&self, id: FrameId) -> &CallContext {
        &self.frames[id.index()]
    }

    /// Returns the frame on top of the call stack.
    #[must_use]
    pub fn current_frame(&self) -> Option<&CallContext> {
        self.stack.last().map(|id| &self.frames[id.index()])
    }

    /// Returns the permanent entry frame - the very first pushed call.
    #[must_use]
    pub fn entry_context(&self) -> Option<&CallContext> {
        self.entry_frame.map(|id| &self.frames[id.index()])
    }

    /// Returns the current call stack depth.
    #[must_use]
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Returns `true` once the stack (including chained dynamic calls) is
    /// exhausted.
    #[must_use]
    pub fn is_execution_end(&self) -> bool {
        self.execution_end
    }

    /// Returns the canonical null instance of this run.
    #[must_use]
    pub fn null_instance(&self) -> InstanceId {
        self.null_instance
    }

    /// Returns the engine's last return value.
    #[must_use]
    pub fn last_return(&self) -> InstanceId {
        self.last_return
    }

    /// Sets the engine's last return value.
    pub fn set_last_return(&mut self, instance: InstanceId) {
        self.last_return = instance;
    }

    /// Returns the currently active edits provider.
    #[must_use]
    pub fn edits(&self) -> Option<&EditsProvider> {
        self.edits.as_ref()
    }

    /// Returns the machine settings this run executes under.
    #[must_use]
    pub fn settings(&self) -> &MachineSettings {
        &self.settings
    }

    /// Returns the number of instructions executed so far.
    #[must_use]
    pub fn instructions_executed(&self) -> usize {
        self.instructions_executed
    }

    /// Returns every method id resolved so far, in resolution order.
    #[must_use]
    pub fn resolved_methods(&self) -> &[MethodId] {
        &self.resolved_methods
    }

    // ================================================================
    // Instance operations
    // ================================================================

    /// Creates a direct instance boxing `value`.
    pub fn create_direct_instance(&mut self, value: DirectValue) -> InstanceId {
        self.instances.create_direct(value)
    }

    /// Creates a data instance with the given descriptor.
    ///
    /// The first time a descriptor (by structural identity) is seen while a
    /// frame is active, the settings' shared initializer is consulted; a
    /// hit queues the initializer as a dynamic call on the current frame,
    /// receiving the new instance as its single argument.
    pub fn create_instance(&mut self, info: Arc<InstanceInfo>) -> InstanceId {
        let id = self.instances.create_data(info.clone());

        let Some(lookup) = self.settings.shared_initializer().cloned() else {
            return id;
        };
        if !self.initialized_infos.insert((*info).clone()) {
            return id;
        }
        if let Some(initializer) = lookup(&info) {
            if let Some(&top) = self.stack.last() {
                trace!(method = %initializer, info = %info, "queueing shared initializer");
                let (resolved, generator) = self.resolve_generator(&initializer, &[id]);
                self.frames[top.index()]
                    .queue_dynamic_call(DynamicCall::new(resolved, generator, vec![id]));
            }
        }
        id
    }

    /// Marks an instance dirty. Taint is monotonic for the whole run.
    pub fn mark_dirty(&mut self, instance: InstanceId) {
        self.instances.set_dirty(instance);
    }

    /// Returns `true` if the instance has been tainted.
    #[must_use]
    pub fn is_dirty(&self, instance: InstanceId) -> bool {
        self.instances.is_dirty(instance)
    }

    /// Applies the machine's truthiness test to an instance.
    #[must_use]
    pub fn is_true(&self, instance: InstanceId) -> bool {
        (self.settings.truthiness())(self.instances.get(instance))
    }

    /// Reads a field of a data instance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotDataInstance`] or [`Error::UndefinedField`].
    pub fn get_field(&self, instance: InstanceId, field: &str) -> Result<InstanceId> {
        self.instances.field(instance, field)
    }

    /// Writes a field of a data instance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotDataInstance`].
    pub fn set_field(&mut self, instance: InstanceId, field: &str, value: InstanceId) -> Result<()> {
        self.instances.set_field(instance, field, value)
    }

    // ================================================================
    // Variable operations
    // ================================================================

    /// Binds `name` to `instance` in the current frame.
    ///
    /// Records the previous occupant (if any) as a scope end and the new
    /// instance as a scope start in the current block - skipped entirely
    /// for temporary names. An assignment-site remove provider attached to
    /// the executing instruction is captured for the new instance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveFrame`] when no call is executing.
    pub fn set_value(&mut self, name: &VariableName, instance: InstanceId) -> Result<()> {
        let Some(&top) = self.stack.last() else {
            return Err(Error::NoActiveFrame);
        };

        let frame = &self.frames[top.index()];
        let remove = frame
            .executing_instruction()
            .and_then(|instruction| instruction.remove_provider().cloned());
        let block = frame.current_block();

        let previous = self.frames[top.index()].insert_variable(name.clone(), instance);

        if let Some(block) = block {
            let block = self.blocks.get_mut(block);
            block.touch(instance);
            if let Some(remove) = remove {
                block.attach_remove_provider(instance, remove);
            }
            if !name.is_temporary() {
                if let Some(previous) = previous {
                    block.record_scope_end(previous, name.clone());
                }
                block.record_scope_start(instance, name.clone());
            }
        }

        Ok(())
    }

    /// Resolves `name` in the current frame, falling back to the global
    /// scope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UndefinedVariable`] when the name is bound in
    /// neither scope - a malformed program, fatal to the run.
    pub fn get_value(&self, name: &VariableName) -> Result<InstanceId> {
        if let Some(&top) = self.stack.last() {
            if let Some(instance) = self.frames[top.index()].variable(name) {
                return Ok(instance);
            }
        }
        self.globals
            .get(name)
            .copied()
            .ok_or_else(|| Error::UndefinedVariable { name: name.clone() })
    }

    /// Binds `name` in the process-wide global scope, last writer wins.
    pub fn set_global(&mut self, name: VariableName, instance: InstanceId) {
        self.globals.insert(name, instance);
    }

    /// Resolves `name` in the global scope only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UndefinedGlobal`] when the name has never been
    /// written - fatal to the run.
    pub fn get_global(&self, name: &VariableName) -> Result<InstanceId> {
        self.globals
            .get(name)
            .copied()
            .ok_or_else(|| Error::UndefinedGlobal { name: name.clone() })
    }

    /// Returns the current frame's argument at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveFrame`] or [`Error::ArgumentOutOfRange`].
    pub fn argument(&self, index: usize) -> Result<InstanceId> {
        let frame = self.current_frame().ok_or(Error::NoActiveFrame)?;
        frame
            .arguments()
            .get(index)
            .copied()
            .ok_or(Error::ArgumentOutOfRange {
                index,
                count: frame.arguments().len(),
            })
    }

    // ================================================================
    // Resolution and the call stack
    // ================================================================

    /// Resolves the generator for a call in three tiers.
    ///
    /// 1. A per-call-site *override* from the loader is used directly and
    ///    never cached - it may depend on the identity of the concrete
    ///    argument instances.
    /// 2. A method flagged for dynamic resolution has its id rewritten by
    ///    the loader, given the runtime type descriptors of the arguments.
    /// 3. The (possibly rewritten) id is looked up in the resolution cache;
    ///    on a miss the loader statically resolves it and the result is
    ///    memoized, write-once per key.
    ///
    /// Returns the resolved id together with the generator, `None` when the
    /// method cannot be resolved at all - the caller degrades that into the
    /// taint short-circuit.
    pub fn resolve_generator(
        &mut self,
        method: &MethodId,
        arguments: &[InstanceId],
    ) -> (MethodId, Option<Arc<dyn Generator>>) {
        let loader = self.loader.clone();

        if let Some(overriding) = loader.overriding_generator(method, arguments, &self.instances) {
            trace!(method = %method, "per-call-site override, bypassing cache");
            self.resolved_methods.push(method.clone());
            return (method.clone(), Some(overriding));
        }

        let resolved = if method.needs_dynamic_resolution() {
            let argument_types: Vec<Arc<InstanceInfo>> = arguments
                .iter()
                .map(|&id| self.instances.get(id).info().clone())
                .collect();
            loader.dynamic_resolve(method, &argument_types)
        } else {
            method.clone()
        };
        self.resolved_methods.push(resolved.clone());

        if let Some(cached) = self.cache.get(&resolved) {
            return (resolved, Some(cached.value().clone()));
        }

        let generator = loader.static_resolve(&resolved);
        if let Some(generator) = &generator {
            trace!(method = %resolved, "caching statically resolved generator");
            self.cache.insert(resolved.clone(), generator.clone());
        }
        (resolved, generator)
    }

    /// Resolves and pushes a call with the given argument instances.
    ///
    /// The active edits provider's transform (if any) is attributed to the
    /// call record of the issuing block.
    ///
    /// # Errors
    ///
    /// Returns an error when program materialization fails or the call
    /// depth limit is exceeded. Resolution failure is not an error - it
    /// degrades into the taint short-circuit.
    pub fn invoke(&mut self, method: MethodId, arguments: Vec<InstanceId>) -> Result<()> {
        let (resolved, generator) = self.resolve_generator(&method, &arguments);
        let transform = self.edits.as_ref().map(|edits| edits.transform().clone());
        self.push_frame(resolved, generator, arguments, transform)
    }

    /// Pushes a call for an already resolved generator.
    ///
    /// If the generator is absent or any argument is already dirty, the
    /// call is *not* pushed: every argument is marked dirty and a fresh
    /// dirty direct instance becomes the last return value. Otherwise the
    /// frame's program is materialized (exactly once), the call is
    /// registered on the caller's current block, and the new frame becomes
    /// the top of the stack. The very first pushed call becomes the
    /// permanent entry context.
    ///
    /// # Errors
    ///
    /// Returns an error when program materialization fails or the call
    /// depth limit is exceeded.
    pub fn push_call(
        &mut self,
        method: MethodId,
        generator: Option<Arc<dyn Generator>>,
        arguments: Vec<InstanceId>,
    ) -> Result<()> {
        let transform = self.edits.as_ref().map(|edits| edits.transform().clone());
        self.push_frame(method, generator, arguments, transform)
    }

    fn push_frame(
        &mut self,
        method: MethodId,
        generator: Option<Arc<dyn Generator>>,
        arguments: Vec<InstanceId>,
        transform: Option<Arc<dyn CallTransform>>,
    ) -> Result<()> {
        let tainted_argument = arguments
            .iter()
            .any(|&argument| self.instances.is_dirty(argument));

        let generator = match generator {
            Some(generator) if !tainted_argument => generator,
            _ => {
                debug!(method = %method, "call target unresolved or arguments tainted, skipping push");
                for &argument in &arguments {
                    self.instances.set_dirty(argument);
                }
                let dirty_return = self.instances.create_direct(DirectValue::Null);
                self.instances.set_dirty(dirty_return);
                self.last_return = dirty_return;
                return Ok(());
            }
        };

        if self.stack.len() >= self.settings.limits().max_call_depth {
            return Err(Error::CallDepthLimit {
                limit: self.settings.limits().max_call_depth,
            });
        }

        // The one and only materialization of this frame's program.
        let mut emitter = Emitter::new();
        generator.generate(&mut emitter)?;
        let program = Arc::new(emitter.seal()?);

        let caller = self.stack.last().copied();
        let calling_block = caller.and_then(|frame| self.frames[frame.index()].current_block());
        if let Some(block) = calling_block {
            self.blocks
                .get_mut(block)
                .register_call(method.clone(), arguments.clone(), transform);
        }

        let id = FrameId::new(self.frames.len());
        debug!(method = %method, frame = %id, depth = self.stack.len(), "pushing call");
        self.frames.push(CallContext::new(
            id,
            method,
            program,
            arguments,
            caller,
            calling_block,
        ));
        self.stack.push(id);
        if self.entry_frame.is_none() {
            self.entry_frame = Some(id);
        }
        Ok(())
    }

    /// Queues a call to run after the current frame completes.
    ///
    /// The target is resolved now (override/dynamic/static, like any call)
    /// and the entry waits in the current frame's queue; an unresolved
    /// target still drains and degrades into the taint short-circuit at
    /// drain time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveFrame`] when no call is executing.
    pub fn dynamic_call(&mut self, method: MethodId, arguments: Vec<InstanceId>) -> Result<()> {
        let (resolved, generator) = self.resolve_generator(&method, &arguments);
        let Some(&top) = self.stack.last() else {
            return Err(Error::NoActiveFrame);
        };
        trace!(method = %resolved, frame = %top, "queueing dynamic call");
        self.frames[top.index()].queue_dynamic_call(DynamicCall::new(
            resolved, generator, arguments,
        ));
        Ok(())
    }

    /// Returns the next instruction to execute, advancing the engine.
    ///
    /// Exhausted frames are popped (draining their chained dynamic calls)
    /// until an instruction is found or the stack empties, which ends the
    /// run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InstructionLimit`] when the instruction budget is
    /// exhausted, and propagates errors from dynamic-call pushes.
    pub fn next_instruction(&mut self) -> Result<Option<Arc<dyn Instruction>>> {
        loop {
            if self.execution_end {
                return Ok(None);
            }
            let Some(&top) = self.stack.last() else {
                trace!(
                    instructions = self.instructions_executed,
                    "call stack exhausted, analysis complete"
                );
                self.execution_end = true;
                return Ok(None);
            };

            if let Some(instruction) = self.frames[top.index()].next_instruction(&mut self.blocks)
            {
                let limit = self.settings.limits().max_instructions;
                if self.instructions_executed >= limit {
                    return Err(Error::InstructionLimit { limit });
                }
                self.instructions_executed += 1;
                return Ok(Some(instruction));
            }

            self.pop_context()?;
        }
    }

    /// Adjusts the active edits provider for the instruction about to
    /// execute.
    ///
    /// A call instruction installs a provider scoped to its transform and
    /// the current block; a direct invoke keeps the provider of its
    /// enclosing call; any other instruction clears it.
    pub fn prepare(&mut self, instruction: &dyn Instruction) {
        match instruction.kind() {
            InstructionKind::Call => {
                let block = self.current_frame().and_then(CallContext::current_block);
                self.edits = match (instruction.transform(), block) {
                    (Some(transform), Some(block)) => {
                        Some(EditsProvider::new(transform.clone(), block))
                    }
                    _ => None,
                };
            }
            InstructionKind::DirectInvoke => {}
            InstructionKind::Other => {
                self.edits = None;
            }
        }
    }

    /// Moves the current frame's instruction pointer to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveFrame`] when no call is executing.
    pub fn jump_to(&mut self, target: usize) -> Result<()> {
        let Some(&top) = self.stack.last() else {
            return Err(Error::NoActiveFrame);
        };
        self.frames[top.index()].jump_to(target);
        Ok(())
    }

    /// Ends the current frame: its program counts as exhausted and the
    /// frame pops on the next step.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveFrame`] when no call is executing.
    pub fn end_call(&mut self) -> Result<()> {
        let Some(&top) = self.stack.last() else {
            return Err(Error::NoActiveFrame);
        };
        self.frames[top.index()].end();
        Ok(())
    }

    /// Pops the top frame and drains its chained dynamic calls.
    fn pop_context(&mut self) -> Result<()> {
        let Some(popped) = self.stack.pop() else {
            return Ok(());
        };
        trace!(frame = %popped, depth = self.stack.len(), "popping call");
        self.handle_dynamic_calls_chaining(popped)
    }

    /// Runs the two-branch dynamic-call merge for a popped frame.
    ///
    /// Calls the popped frame queued itself run before calls that were
    /// merely waiting behind it: the first entry of the combined chain is
    /// pushed immediately as the new top of stack, and the remainder is
    /// tail-appended to the new top's following-calls queue. If the push is
    /// taint-skipped, the remainder lands on whichever frame is left on
    /// top; with no frame left the remainder is discarded and the run ends.
    fn handle_dynamic_calls_chaining(&mut self, popped: FrameId) -> Result<()> {
        let (mut chain, following) = self.frames[popped.index()].take_dynamic_calls();
        if chain.is_empty() {
            chain = following;
        } else {
            chain.extend(following);
        }

        let Some(first) = chain.pop_front() else {
            return Ok(());
        };
        let (method, generator, arguments) = first.into_parts();
        debug!(method = %method, "draining dynamic call");
        self.push_frame(method, generator, arguments, None)?;

        if let Some(&top) = self.stack.last() {
            self.frames[top.index()].extend_following_dynamic_calls(chain);
        } else if !chain.is_empty() {
            debug!(
                dropped = chain.len(),
                "discarding chained dynamic calls, no frame left to own them"
            );
        }
        Ok(())
    }

    /// Consumes the context into the externally visible run summary.
    #[must_use]
    pub fn into_result(self) -> AnalyzingResult {
        AnalyzingResult::new(
            self.last_return,
            self.entry_frame,
            self.frames,
            self.blocks,
            self.instances,
            self.resolved_methods,
            self.instructions_executed,
        )
    }
}
