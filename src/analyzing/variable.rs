use std::fmt;
use std::sync::Arc;

/// Sigil prefixing compiler-internal temporary variables.
///
/// Temporaries are storage slots synthesized by front ends while lowering
/// expressions. They never correspond to a named variable in the original
/// source, so scope provenance must not record them - an edit synthesized
/// against a temporary would target source text that does not exist.
pub const TEMPORARY_SIGIL: char = '$';

/// An interned identifier naming a storage slot.
///
/// A `VariableName` is valid either in a single frame's local scope or in the
/// process-wide global scope. Names are cheap to clone (the backing string is
/// shared) and compare by content.
///
/// Names beginning with [`TEMPORARY_SIGIL`] are compiler-internal temporaries
/// and are excluded from scope-provenance bookkeeping.
///
/// # Examples
///
/// ```rust
/// use ialscope::analyzing::VariableName;
///
/// let user = VariableName::new("result");
/// let temp = VariableName::new("$tmp0");
///
/// assert!(!user.is_temporary());
/// assert!(temp.is_temporary());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableName(Arc<str>);

impl VariableName {
    /// Creates a new variable name.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        VariableName(name.into())
    }

    /// Returns the textual form of the name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if this name denotes a compiler-internal temporary.
    ///
    /// Temporaries are excluded from scope-start/scope-end bookkeeping on
    /// executed blocks.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMPORARY_SIGIL)
    }
}

impl fmt::Display for VariableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VariableName {
    fn from(name: &str) -> Self {
        VariableName::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temporary_detection() {
        assert!(VariableName::new("$t0").is_temporary());
        assert!(!VariableName::new("counter").is_temporary());
        assert!(!VariableName::new("dollar$inside").is_temporary());
    }

    #[test]
    fn test_equality_by_content() {
        assert_eq!(VariableName::new("x"), VariableName::from("x"));
        assert_ne!(VariableName::new("x"), VariableName::new("y"));
    }
}
