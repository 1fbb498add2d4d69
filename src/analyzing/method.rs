use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use bitflags::bitflags;

bitflags! {
    /// Dispatch-relevant properties of a callable.
    ///
    /// Flags do not participate in [`MethodId`] equality or ordering - two ids
    /// naming the same method with different flags still hit the same cache
    /// slot and registry entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MethodFlags: u8 {
        /// The method is virtual/abstract and its concrete target depends on
        /// the runtime types of the call's arguments.
        const DYNAMIC = 0x01;
        /// The method has no statically resolvable body of its own.
        ///
        /// Calls that still point at an abstract method after dynamic
        /// resolution degrade into the taint short-circuit.
        const ABSTRACT = 0x02;
    }
}

/// Identifies a callable method.
///
/// A `MethodId` pairs a display name with an arity and a set of
/// [`MethodFlags`]. Identity - and therefore resolution-cache and registry
/// keying - is determined by the `(name, parameters)` pair alone; flags only
/// steer how the id is resolved.
///
/// # Examples
///
/// ```rust
/// use ialscope::analyzing::{MethodFlags, MethodId};
///
/// let concat = MethodId::new("String.Concat", 2);
/// let describe = MethodId::dynamic("Animal.Describe", 1);
///
/// assert!(!concat.needs_dynamic_resolution());
/// assert!(describe.needs_dynamic_resolution());
/// assert_eq!(describe, MethodId::new("Animal.Describe", 1));
/// ```
#[derive(Clone, Debug)]
pub struct MethodId {
    /// Display name of the method.
    name: Arc<str>,
    /// Number of arguments the method accepts.
    parameters: usize,
    /// Dispatch properties.
    flags: MethodFlags,
}

impl MethodId {
    /// Creates a statically resolvable method id.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, parameters: usize) -> Self {
        MethodId {
            name: name.into(),
            parameters,
            flags: MethodFlags::empty(),
        }
    }

    /// Creates a method id that requires dynamic (type-directed) resolution.
    #[must_use]
    pub fn dynamic(name: impl Into<Arc<str>>, parameters: usize) -> Self {
        MethodId::new(name, parameters).with_flags(MethodFlags::DYNAMIC)
    }

    /// Returns a copy of this id with the given flags set.
    #[must_use]
    pub fn with_flags(mut self, flags: MethodFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Returns the display name of the method.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of arguments the method accepts.
    #[must_use]
    pub fn parameters(&self) -> usize {
        self.parameters
    }

    /// Returns the dispatch flags of the method.
    #[must_use]
    pub fn flags(&self) -> MethodFlags {
        self.flags
    }

    /// Returns `true` if the concrete call target depends on runtime
    /// argument types.
    #[must_use]
    pub fn needs_dynamic_resolution(&self) -> bool {
        self.flags.contains(MethodFlags::DYNAMIC)
    }
}

impl PartialEq for MethodId {
    fn eq(&self, other: &Self) -> bool {
        self.parameters == other.parameters && self.name == other.name
    }
}

impl Eq for MethodId {}

impl Hash for MethodId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.parameters.hash(state);
    }
}

impl PartialOrd for MethodId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MethodId {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.name.as_ref(), self.parameters).cmp(&(other.name.as_ref(), other.parameters))
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(id: &MethodId) -> u64 {
        let mut hasher = DefaultHasher::new();
        id.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_identity_ignores_flags() {
        let plain = MethodId::new("Add", 2);
        let flagged = MethodId::dynamic("Add", 2).with_flags(MethodFlags::ABSTRACT);

        assert_eq!(plain, flagged);
        assert_eq!(hash_of(&plain), hash_of(&flagged));
        assert_eq!(plain.cmp(&flagged), Ordering::Equal);
    }

    #[test]
    fn test_identity_includes_arity() {
        assert_ne!(MethodId::new("Add", 2), MethodId::new("Add", 3));
    }

    #[test]
    fn test_ordering_by_name_then_arity() {
        let mut ids = vec![
            MethodId::new("B", 0),
            MethodId::new("A", 1),
            MethodId::new("A", 0),
        ];
        ids.sort();
        assert_eq!(ids[0], MethodId::new("A", 0));
        assert_eq!(ids[1], MethodId::new("A", 1));
        assert_eq!(ids[2], MethodId::new("B", 0));
    }
}
