//! The core IAL instruction set.
//!
//! These instructions cover the operations the engine itself gives meaning
//! to: variable binding, argument and return-value plumbing, calls, direct
//! native invokes, and intra-program control flow. Compiling front ends
//! emit them through the [`Emitter`](crate::program::Emitter); richer
//! instruction sets can be layered on by implementing
//! [`Instruction`](crate::program::Instruction) directly.

use std::fmt;
use std::sync::Arc;

use crate::{
    analyzing::{AnalyzingContext, CallTransform, DirectValue, MethodId, RemoveProvider, VariableName},
    program::{Instruction, InstructionInfo, InstructionKind},
    Result,
};

/// Native method callout signature.
///
/// Direct invokes run host-native behavior (primitive arithmetic, runtime
/// services) against the analyzing context without pushing a frame.
pub type DirectMethod = Arc<dyn Fn(&mut AnalyzingContext) -> Result<()> + Send + Sync>;

/// Binds a fresh direct instance of a literal value to a variable.
#[derive(Debug)]
pub struct AssignLiteral {
    target: VariableName,
    value: DirectValue,
    remove: Option<RemoveProvider>,
    info: Arc<InstructionInfo>,
}

impl AssignLiteral {
    /// Creates the instruction; `remove` optionally carries the
    /// assignment-site remove provider captured by the variable write.
    #[must_use]
    pub fn new(
        target: VariableName,
        value: DirectValue,
        remove: Option<RemoveProvider>,
        info: Arc<InstructionInfo>,
    ) -> Self {
        AssignLiteral {
            target,
            value,
            remove,
            info,
        }
    }
}

impl Instruction for AssignLiteral {
    fn info(&self) -> &Arc<InstructionInfo> {
        &self.info
    }

    fn execute(&self, context: &mut AnalyzingContext) -> Result<()> {
        let instance = context.create_direct_instance(self.value.clone());
        context.set_value(&self.target, instance)
    }

    fn remove_provider(&self) -> Option<&RemoveProvider> {
        self.remove.as_ref()
    }
}

/// Aliases the instance bound to `source` into `target`.
///
/// The instance is shared, never copied - both variables reference the same
/// handle afterwards.
#[derive(Debug)]
pub struct Assign {
    target: VariableName,
    source: VariableName,
    info: Arc<InstructionInfo>,
}

impl Assign {
    /// Creates the instruction.
    #[must_use]
    pub fn new(target: VariableName, source: VariableName, info: Arc<InstructionInfo>) -> Self {
        Assign {
            target,
            source,
            info,
        }
    }
}

impl Instruction for Assign {
    fn info(&self) -> &Arc<InstructionInfo> {
        &self.info
    }

    fn execute(&self, context: &mut AnalyzingContext) -> Result<()> {
        let instance = context.get_value(&self.source)?;
        context.set_value(&self.target, instance)
    }
}

/// Binds the frame's n-th argument instance to a variable.
#[derive(Debug)]
pub struct AssignArgument {
    target: VariableName,
    index: usize,
    info: Arc<InstructionInfo>,
}

impl AssignArgument {
    /// Creates the instruction.
    #[must_use]
    pub fn new(target: VariableName, index: usize, info: Arc<InstructionInfo>) -> Self {
        AssignArgument {
            target,
            index,
            info,
        }
    }
}

impl Instruction for AssignArgument {
    fn info(&self) -> &Arc<InstructionInfo> {
        &self.info
    }

    fn execute(&self, context: &mut AnalyzingContext) -> Result<()> {
        let instance = context.argument(self.index)?;
        context.set_value(&self.target, instance)
    }
}

/// Binds the engine's last return value to a variable.
#[derive(Debug)]
pub struct AssignReturnValue {
    target: VariableName,
    info: Arc<InstructionInfo>,
}

impl AssignReturnValue {
    /// Creates the instruction.
    #[must_use]
    pub fn new(target: VariableName, info: Arc<InstructionInfo>) -> Self {
        AssignReturnValue { target, info }
    }
}

impl Instruction for AssignReturnValue {
    fn info(&self) -> &Arc<InstructionInfo> {
        &self.info
    }

    fn execute(&self, context: &mut AnalyzingContext) -> Result<()> {
        let instance = context.last_return();
        context.set_value(&self.target, instance)
    }
}

/// Writes the instance bound to a local variable into the global scope.
#[derive(Debug)]
pub struct AssignGlobal {
    target: VariableName,
    source: VariableName,
    info: Arc<InstructionInfo>,
}

impl AssignGlobal {
    /// Creates the instruction.
    #[must_use]
    pub fn new(target: VariableName, source: VariableName, info: Arc<InstructionInfo>) -> Self {
        AssignGlobal {
            target,
            source,
            info,
        }
    }
}

impl Instruction for AssignGlobal {
    fn info(&self) -> &Arc<InstructionInfo> {
        &self.info
    }

    fn execute(&self, context: &mut AnalyzingContext) -> Result<()> {
        let instance = context.get_value(&self.source)?;
        context.set_global(self.target.clone(), instance);
        Ok(())
    }
}

/// Resolves and pushes a call.
///
/// Argument variables are read in order at execution time; resolution and
/// the taint short-circuit are handled by
/// [`AnalyzingContext::invoke`](crate::analyzing::AnalyzingContext::invoke).
#[derive(Debug)]
pub struct Call {
    method: MethodId,
    arguments: Vec<VariableName>,
    transform: Option<Arc<dyn CallTransform>>,
    info: Arc<InstructionInfo>,
}

impl Call {
    /// Creates the instruction; `transform` optionally carries the
    /// call-site transform provider consumed by the edits-provider swap.
    #[must_use]
    pub fn new(
        method: MethodId,
        arguments: Vec<VariableName>,
        transform: Option<Arc<dyn CallTransform>>,
        info: Arc<InstructionInfo>,
    ) -> Self {
        Call {
            method,
            arguments,
            transform,
            info,
        }
    }
}

impl Instruction for Call {
    fn info(&self) -> &Arc<InstructionInfo> {
        &self.info
    }

    fn execute(&self, context: &mut AnalyzingContext) -> Result<()> {
        let mut arguments = Vec::with_capacity(self.arguments.len());
        for variable in &self.arguments {
            arguments.push(context.get_value(variable)?);
        }
        context.invoke(self.method.clone(), arguments)
    }

    fn kind(&self) -> InstructionKind {
        InstructionKind::Call
    }

    fn transform(&self) -> Option<&Arc<dyn CallTransform>> {
        self.transform.as_ref()
    }
}

/// Runs a native callout against the context without pushing a frame.
///
/// Direct invokes are not separately editable call sites; they share the
/// edits provider of their enclosing call.
pub struct DirectInvoke {
    method: DirectMethod,
    info: Arc<InstructionInfo>,
}

impl DirectInvoke {
    /// Creates the instruction.
    #[must_use]
    pub fn new(method: DirectMethod, info: Arc<InstructionInfo>) -> Self {
        DirectInvoke { method, info }
    }
}

impl fmt::Debug for DirectInvoke {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectInvoke")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl Instruction for DirectInvoke {
    fn info(&self) -> &Arc<InstructionInfo> {
        &self.info
    }

    fn execute(&self, context: &mut AnalyzingContext) -> Result<()> {
        (self.method)(context)
    }

    fn kind(&self) -> InstructionKind {
        InstructionKind::DirectInvoke
    }
}

/// Unconditionally moves the frame's instruction pointer.
#[derive(Debug)]
pub struct Jump {
    target: usize,
    info: Arc<InstructionInfo>,
}

impl Jump {
    /// Creates the instruction; `target` is an absolute instruction index.
    #[must_use]
    pub fn new(target: usize, info: Arc<InstructionInfo>) -> Self {
        Jump { target, info }
    }
}

impl Instruction for Jump {
    fn info(&self) -> &Arc<InstructionInfo> {
        &self.info
    }

    fn execute(&self, context: &mut AnalyzingContext) -> Result<()> {
        context.jump_to(self.target)
    }
}

/// Moves the frame's instruction pointer when the condition is truthy.
///
/// Truthiness is decided by the machine settings' truthiness test.
#[derive(Debug)]
pub struct ConditionalJump {
    condition: VariableName,
    target: usize,
    info: Arc<InstructionInfo>,
}

impl ConditionalJump {
    /// Creates the instruction; `target` is an absolute instruction index.
    #[must_use]
    pub fn new(condition: VariableName, target: usize, info: Arc<InstructionInfo>) -> Self {
        ConditionalJump {
            condition,
            target,
            info,
        }
    }
}

impl Instruction for ConditionalJump {
    fn info(&self) -> &Arc<InstructionInfo> {
        &self.info
    }

    fn execute(&self, context: &mut AnalyzingContext) -> Result<()> {
        let condition = context.get_value(&self.condition)?;
        if context.is_true(condition) {
            context.jump_to(self.target)?;
        }
        Ok(())
    }
}

/// Sets the engine's last return value and ends the frame.
#[derive(Debug)]
pub struct Return {
    value: Option<VariableName>,
    info: Arc<InstructionInfo>,
}

impl Return {
    /// Creates the instruction; `value` is the variable holding the return
    /// value, or `None` for a void return.
    #[must_use]
    pub fn new(value: Option<VariableName>, info: Arc<InstructionInfo>) -> Self {
        Return { value, info }
    }
}

impl Instruction for Return {
    fn info(&self) -> &Arc<InstructionInfo> {
        &self.info
    }

    fn execute(&self, context: &mut AnalyzingContext) -> Result<()> {
        if let Some(variable) = &self.value {
            let instance = context.get_value(variable)?;
            context.set_last_return(instance);
        }
        context.end_call()
    }
}

/// Does nothing.
#[derive(Debug)]
pub struct Nop {
    info: Arc<InstructionInfo>,
}

impl Nop {
    /// Creates the instruction.
    #[must_use]
    pub fn new(info: Arc<InstructionInfo>) -> Self {
        Nop { info }
    }
}

impl Instruction for Nop {
    fn info(&self) -> &Arc<InstructionInfo> {
        &self.info
    }

    fn execute(&self, _context: &mut AnalyzingContext) -> Result<()> {
        Ok(())
    }
}
