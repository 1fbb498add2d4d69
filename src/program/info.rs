use std::fmt;

/// Shared provenance tag grouping instructions by source origin.
///
/// Front ends mint one `InstructionInfo` per source construct (a statement,
/// a lowered expression) and stamp every instruction emitted for it with the
/// same tag. The engine delimits [`ExecutedBlock`](crate::analyzing::ExecutedBlock)s
/// wherever the tag *identity* changes between consecutive instructions -
/// tags are compared by pointer, never by content, so two constructs with
/// identical comments still produce distinct blocks.
///
/// Tags are immutable once minted; [`Emitter::start_block`](crate::program::Emitter::start_block)
/// is the only producer.
#[derive(Debug)]
pub struct InstructionInfo {
    /// Human-readable description of the source construct.
    comment: String,
}

impl InstructionInfo {
    /// Creates a provenance tag with the given comment.
    #[must_use]
    pub fn new(comment: impl Into<String>) -> Self {
        InstructionInfo {
            comment: comment.into(),
        }
    }

    /// Returns the tag's comment.
    #[must_use]
    pub fn comment(&self) -> &str {
        &self.comment
    }
}

impl fmt::Display for InstructionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.comment)
    }
}
