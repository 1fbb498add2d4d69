use std::sync::Arc;

use crate::{
    analyzing::{CallTransform, DirectValue, MethodId, RemoveProvider, VariableName},
    program::{
        instructions::{
            Assign, AssignArgument, AssignGlobal, AssignLiteral, AssignReturnValue, Call,
            ConditionalJump, DirectInvoke, DirectMethod, Jump, Nop, Return,
        },
        Instruction, InstructionInfo, InstructionProgram,
    },
    Error, Result,
};

/// A forward-referenceable jump target.
///
/// Labels are created and placed through the [`Emitter`]; jumps may target a
/// label before it is placed. Placement is write-once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Label(usize);

/// A not-yet-resolved emitted instruction.
///
/// Jumps stay pending until [`Emitter::seal`] resolves their labels into
/// absolute instruction indices.
enum Pending {
    Ready(Arc<dyn Instruction>),
    Jump {
        label: Label,
        info: Arc<InstructionInfo>,
    },
    ConditionalJump {
        condition: VariableName,
        label: Label,
        info: Arc<InstructionInfo>,
    },
}

/// Builder materializing an immutable [`InstructionProgram`].
///
/// The emitter is the single mutable phase of a program's life: a
/// [`Generator`](crate::program::Generator) emits instructions and places
/// labels, then [`Emitter::seal`] resolves every jump and produces the
/// immutable program. Sealing consumes the emitter, so a program can never
/// be materialized into twice.
///
/// Instructions emitted after a [`start_block`](Self::start_block) call all
/// share the provenance tag that call minted; the engine uses tag identity
/// to delimit executed blocks.
///
/// # Examples
///
/// ```rust
/// use ialscope::analyzing::DirectValue;
/// use ialscope::program::Emitter;
///
/// let mut emitter = Emitter::new();
/// emitter.start_block("let x = 1");
/// emitter.assign_literal("x", DirectValue::I32(1));
///
/// let exit = emitter.create_label();
/// emitter.jump(exit);
/// emitter.start_block("unreachable");
/// emitter.nop();
/// emitter.place_label(exit).unwrap();
///
/// let program = emitter.seal().unwrap();
/// assert_eq!(program.len(), 3);
/// ```
pub struct Emitter {
    pending: Vec<Pending>,
    labels: Vec<Option<usize>>,
    info: Arc<InstructionInfo>,
}

impl Emitter {
    /// Creates an emitter with an anonymous initial provenance tag.
    #[must_use]
    pub fn new() -> Self {
        Emitter {
            pending: Vec::new(),
            labels: Vec::new(),
            info: Arc::new(InstructionInfo::new("")),
        }
    }

    /// Mints a fresh provenance tag; subsequent instructions share it.
    ///
    /// Every call produces a distinct tag even for equal comments, so each
    /// source construct gets its own executed block.
    pub fn start_block(&mut self, comment: impl Into<String>) {
        self.info = Arc::new(InstructionInfo::new(comment));
    }

    /// Returns the provenance tag currently in effect.
    #[must_use]
    pub fn current_info(&self) -> &Arc<InstructionInfo> {
        &self.info
    }

    /// Creates a new, unplaced label.
    #[must_use]
    pub fn create_label(&mut self) -> Label {
        let label = Label(self.labels.len());
        self.labels.push(None);
        label
    }

    /// Places a label at the next emitted instruction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LabelRedefined`] if the label has been placed
    /// before - placement is write-once.
    pub fn place_label(&mut self, label: Label) -> Result<()> {
        let slot = &mut self.labels[label.0];
        if slot.is_some() {
            return Err(Error::LabelRedefined { label: label.0 });
        }
        *slot = Some(self.pending.len());
        Ok(())
    }

    /// Emits an arbitrary, already constructed instruction.
    ///
    /// Front ends with custom instruction types use this directly; the
    /// convenience emitters below stamp the current provenance tag for the
    /// core instruction set.
    pub fn emit(&mut self, instruction: Arc<dyn Instruction>) {
        self.pending.push(Pending::Ready(instruction));
    }

    /// Emits a literal assignment.
    pub fn assign_literal(&mut self, target: impl Into<VariableName>, value: DirectValue) {
        let info = self.info.clone();
        self.emit(Arc::new(AssignLiteral::new(target.into(), value, None, info)));
    }

    /// Emits a literal assignment carrying an assignment-site remove
    /// provider.
    pub fn assign_literal_removable(
        &mut self,
        target: impl Into<VariableName>,
        value: DirectValue,
        remove: RemoveProvider,
    ) {
        let info = self.info.clone();
        self.emit(Arc::new(AssignLiteral::new(
            target.into(),
            value,
            Some(remove),
            info,
        )));
    }

    /// Emits a variable-to-variable aliasing assignment.
    pub fn assign(&mut self, target: impl Into<VariableName>, source: impl Into<VariableName>) {
        let info = self.info.clone();
        self.emit(Arc::new(Assign::new(target.into(), source.into(), info)));
    }

    /// Emits an argument binding.
    pub fn assign_argument(&mut self, target: impl Into<VariableName>, index: usize) {
        let info = self.info.clone();
        self.emit(Arc::new(AssignArgument::new(target.into(), index, info)));
    }

    /// Emits a last-return-value binding.
    pub fn assign_return_value(&mut self, target: impl Into<VariableName>) {
        let info = self.info.clone();
        self.emit(Arc::new(AssignReturnValue::new(target.into(), info)));
    }

    /// Emits a global-scope write.
    pub fn assign_global(
        &mut self,
        target: impl Into<VariableName>,
        source: impl Into<VariableName>,
    ) {
        let info = self.info.clone();
        self.emit(Arc::new(AssignGlobal::new(target.into(), source.into(), info)));
    }

    /// Emits a call without a transform provider.
    pub fn call(&mut self, method: MethodId, arguments: Vec<VariableName>) {
        let info = self.info.clone();
        self.emit(Arc::new(Call::new(method, arguments, None, info)));
    }

    /// Emits a call carrying its call-site transform provider.
    pub fn call_with_transform(
        &mut self,
        method: MethodId,
        arguments: Vec<VariableName>,
        transform: Arc<dyn CallTransform>,
    ) {
        let info = self.info.clone();
        self.emit(Arc::new(Call::new(method, arguments, Some(transform), info)));
    }

    /// Emits a native callout.
    pub fn direct_invoke(&mut self, method: DirectMethod) {
        let info = self.info.clone();
        self.emit(Arc::new(DirectInvoke::new(method, info)));
    }

    /// Emits an unconditional jump to `label`.
    pub fn jump(&mut self, label: Label) {
        let info = self.info.clone();
        self.pending.push(Pending::Jump { label, info });
    }

    /// Emits a jump to `label` taken when `condition` is truthy.
    pub fn conditional_jump(&mut self, condition: impl Into<VariableName>, label: Label) {
        let info = self.info.clone();
        self.pending.push(Pending::ConditionalJump {
            condition: condition.into(),
            label,
            info,
        });
    }

    /// Emits a value return.
    pub fn ret(&mut self, value: impl Into<VariableName>) {
        let info = self.info.clone();
        self.emit(Arc::new(Return::new(Some(value.into()), info)));
    }

    /// Emits a void return.
    pub fn ret_void(&mut self) {
        let info = self.info.clone();
        self.emit(Arc::new(Return::new(None, info)));
    }

    /// Emits a no-op.
    pub fn nop(&mut self) {
        let info = self.info.clone();
        self.emit(Arc::new(Nop::new(info)));
    }

    /// Resolves all jumps and produces the immutable program.
    ///
    /// Consumes the emitter: a sealed program can never be emitted into
    /// again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnboundLabel`] if any jump targets a label that was
    /// never placed.
    pub fn seal(self) -> Result<InstructionProgram> {
        let labels = self.labels;
        let resolve = |label: Label| -> Result<usize> {
            labels[label.0].ok_or(Error::UnboundLabel { label: label.0 })
        };

        let mut instructions: Vec<Arc<dyn Instruction>> = Vec::with_capacity(self.pending.len());
        for pending in self.pending {
            let instruction: Arc<dyn Instruction> = match pending {
                Pending::Ready(instruction) => instruction,
                Pending::Jump { label, info } => Arc::new(Jump::new(resolve(label)?, info)),
                Pending::ConditionalJump {
                    condition,
                    label,
                    info,
                } => Arc::new(ConditionalJump::new(condition, resolve(label)?, info)),
            };
            instructions.push(instruction);
        }

        Ok(InstructionProgram::from_instructions(instructions))
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Emitter::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_redefinition_is_rejected() {
        let mut emitter = Emitter::new();
        let label = emitter.create_label();

        emitter.place_label(label).unwrap();
        assert!(matches!(
            emitter.place_label(label),
            Err(Error::LabelRedefined { label: 0 })
        ));
    }

    #[test]
    fn test_unbound_label_fails_seal() {
        let mut emitter = Emitter::new();
        let label = emitter.create_label();
        emitter.jump(label);

        assert!(matches!(
            emitter.seal(),
            Err(Error::UnboundLabel { label: 0 })
        ));
    }

    #[test]
    fn test_unplaced_untargeted_label_is_harmless() {
        let mut emitter = Emitter::new();
        let _unused = emitter.create_label();
        emitter.nop();

        assert_eq!(emitter.seal().unwrap().len(), 1);
    }

    #[test]
    fn test_forward_jump_resolution() {
        let mut emitter = Emitter::new();
        let skip = emitter.create_label();
        emitter.jump(skip);
        emitter.nop();
        emitter.place_label(skip).unwrap();
        emitter.nop();

        let program = emitter.seal().unwrap();
        assert_eq!(program.len(), 3);
        // The jump resolved against the label placed before the final nop.
        let rendered = format!("{:?}", program.get(0).unwrap());
        assert!(rendered.contains("target: 2"), "{rendered}");
    }

    #[test]
    fn test_info_identity_groups_instructions() {
        let mut emitter = Emitter::new();
        emitter.start_block("first");
        emitter.nop();
        emitter.nop();
        emitter.start_block("first");
        emitter.nop();

        let program = emitter.seal().unwrap();
        let first = program.get(0).unwrap().info();
        let second = program.get(1).unwrap().info();
        let third = program.get(2).unwrap().info();

        assert!(Arc::ptr_eq(first, second));
        // Same comment, distinct tag - blocks are delimited by identity.
        assert!(!Arc::ptr_eq(first, third));
        assert_eq!(first.comment(), third.comment());
    }
}
