use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::{Error, Result};

/// A native-like value boxed by a direct instance.
///
/// `DirectValue` covers the primitive value shapes that flow through IAL
/// programs without composite structure. Composite values are modelled as
/// data instances with named fields instead.
///
/// # Examples
///
/// ```rust
/// use ialscope::analyzing::DirectValue;
///
/// assert_eq!(DirectValue::I32(42).type_name(), "Int32");
/// assert_eq!(DirectValue::Null.type_name(), "Null");
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum DirectValue {
    /// The null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 32-bit signed integer.
    I32(i32),
    /// 64-bit signed integer.
    I64(i64),
    /// 64-bit floating point.
    F64(f64),
    /// Text value.
    String(String),
}

impl DirectValue {
    /// Returns the type descriptor name for this value shape.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            DirectValue::Null => "Null",
            DirectValue::Bool(_) => "Boolean",
            DirectValue::I32(_) => "Int32",
            DirectValue::I64(_) => "Int64",
            DirectValue::F64(_) => "Float64",
            DirectValue::String(_) => "String",
        }
    }

    /// Attempts to extract an `i32` value.
    #[must_use]
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            DirectValue::I32(value) => Some(*value),
            _ => None,
        }
    }

    /// Attempts to extract a `bool` value.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DirectValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Attempts to extract a string slice.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DirectValue::String(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for DirectValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectValue::Null => f.write_str("null"),
            DirectValue::Bool(value) => write!(f, "{value}"),
            DirectValue::I32(value) => write!(f, "{value}"),
            DirectValue::I64(value) => write!(f, "{value}"),
            DirectValue::F64(value) => write!(f, "{value}"),
            DirectValue::String(value) => write!(f, "{value:?}"),
        }
    }
}

/// Immutable type descriptor attached to every instance.
///
/// Descriptors are compared by structural identity (their type name), never
/// by allocation identity - two independently minted descriptors for the
/// same type name are interchangeable. An instance's descriptor never
/// changes after construction.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceInfo {
    /// Fully qualified type name.
    type_name: Arc<str>,
}

impl InstanceInfo {
    /// Creates a descriptor for the given type name.
    #[must_use]
    pub fn new(type_name: impl Into<Arc<str>>) -> Self {
        InstanceInfo {
            type_name: type_name.into(),
        }
    }

    /// Returns the fully qualified type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

impl fmt::Display for InstanceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.type_name)
    }
}

/// Stable handle addressing an instance inside an [`Instances`] arena.
///
/// Handles are the unit of identity for values flowing through the engine:
/// aliasing a value into several variables copies the handle, never the
/// instance. No two handles minted by an arena are equal unless they address
/// the same instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u32);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Storage variant of an instance.
#[derive(Clone, Debug)]
enum InstanceKind {
    /// Boxes a single native-like value.
    Direct(DirectValue),
    /// Carries a mapping from field name to the instance bound to it.
    Data(HashMap<Arc<str>, InstanceId>),
}

/// A tagged value flowing through the engine.
///
/// Instances come in two shapes: *direct* instances box a [`DirectValue`],
/// *data* instances carry named fields referencing other instances. Every
/// instance additionally holds an immutable [`InstanceInfo`] descriptor and
/// the monotonic `dirty` taint flag.
///
/// Only the taint flag and data-instance fields are mutable; the descriptor
/// and the storage shape are fixed at construction.
#[derive(Clone, Debug)]
pub struct Instance {
    /// Immutable type descriptor.
    info: Arc<InstanceInfo>,
    /// Monotonic taint flag - never cleared once set.
    dirty: bool,
    /// Storage variant.
    kind: InstanceKind,
}

impl Instance {
    /// Returns the type descriptor of this instance.
    #[must_use]
    pub fn info(&self) -> &Arc<InstanceInfo> {
        &self.info
    }

    /// Returns `true` if this instance has been tainted.
    ///
    /// A dirty instance's provenance cannot be safely reasoned about for
    /// edit synthesis; the flag propagates forward through data and is never
    /// cleared within a run.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns `true` if this is a direct instance.
    #[must_use]
    pub fn is_direct(&self) -> bool {
        matches!(self.kind, InstanceKind::Direct(_))
    }

    /// Returns `true` if this is a data instance.
    #[must_use]
    pub fn is_data(&self) -> bool {
        matches!(self.kind, InstanceKind::Data(_))
    }

    /// Returns the boxed value of a direct instance, `None` for data
    /// instances.
    #[must_use]
    pub fn direct_value(&self) -> Option<&DirectValue> {
        match &self.kind {
            InstanceKind::Direct(value) => Some(value),
            InstanceKind::Data(_) => None,
        }
    }

    /// Returns the field names bound on a data instance.
    ///
    /// Empty for direct instances.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        match &self.kind {
            InstanceKind::Direct(_) => None,
            InstanceKind::Data(fields) => Some(fields.keys().map(|name| &**name)),
        }
        .into_iter()
        .flatten()
    }
}

/// Arena owning every instance created during one analysis run.
///
/// Instances are reference-owned: the arena is the single allocation site,
/// and all other structures (variables, fields, blocks, results) refer to
/// instances through [`InstanceId`] handles. The arena never deallocates or
/// deduplicates - handles stay valid for the lifetime of the run and the
/// [`AnalyzingResult`](crate::analyzing::AnalyzingResult) that absorbs it.
///
/// # Examples
///
/// ```rust
/// use ialscope::analyzing::{DirectValue, Instances};
///
/// let mut instances = Instances::new();
/// let five = instances.create_direct(DirectValue::I32(5));
///
/// assert!(!instances.is_dirty(five));
/// instances.set_dirty(five);
/// assert!(instances.is_dirty(five));
/// ```
#[derive(Debug, Default)]
pub struct Instances {
    entries: Vec<Instance>,
}

impl Instances {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Instances::default()
    }

    /// Returns the number of instances created so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no instance has been created yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the instance addressed by `id`.
    ///
    /// Handles are only minted by this arena, so every handed-out id is
    /// valid for the arena's whole lifetime.
    #[must_use]
    pub fn get(&self, id: InstanceId) -> &Instance {
        &self.entries[id.0 as usize]
    }

    /// Iterates over all instances in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (InstanceId, &Instance)> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, instance)| (InstanceId(index as u32), instance))
    }

    /// Creates a direct instance boxing `value`.
    ///
    /// The descriptor is derived from the value shape.
    pub fn create_direct(&mut self, value: DirectValue) -> InstanceId {
        let info = Arc::new(InstanceInfo::new(value.type_name()));
        self.push(Instance {
            info,
            dirty: false,
            kind: InstanceKind::Direct(value),
        })
    }

    /// Creates a data instance with the given descriptor and no fields.
    pub fn create_data(&mut self, info: Arc<InstanceInfo>) -> InstanceId {
        self.push(Instance {
            info,
            dirty: false,
            kind: InstanceKind::Data(HashMap::new()),
        })
    }

    /// Marks an instance dirty.
    ///
    /// Taint is monotonic: there is no way to clear the flag again.
    pub fn set_dirty(&mut self, id: InstanceId) {
        self.entries[id.0 as usize].dirty = true;
    }

    /// Returns `true` if the instance has been tainted.
    #[must_use]
    pub fn is_dirty(&self, id: InstanceId) -> bool {
        self.entries[id.0 as usize].dirty
    }

    /// Reads a field of a data instance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotDataInstance`] for direct instances and
    /// [`Error::UndefinedField`] when the field has never been written.
    pub fn field(&self, id: InstanceId, field: &str) -> Result<InstanceId> {
        let instance = self.get(id);
        match &instance.kind {
            InstanceKind::Direct(_) => Err(Error::NotDataInstance {
                type_name: instance.info.type_name().to_string(),
            }),
            InstanceKind::Data(fields) => {
                fields
                    .get(field)
                    .copied()
                    .ok_or_else(|| Error::UndefinedField {
                        field: field.to_string(),
                        type_name: instance.info.type_name().to_string(),
                    })
            }
        }
    }

    /// Writes a field of a data instance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotDataInstance`] for direct instances.
    pub fn set_field(&mut self, id: InstanceId, field: &str, value: InstanceId) -> Result<()> {
        let instance = &mut self.entries[id.0 as usize];
        match &mut instance.kind {
            InstanceKind::Direct(_) => Err(Error::NotDataInstance {
                type_name: instance.info.type_name().to_string(),
            }),
            InstanceKind::Data(fields) => {
                fields.insert(Arc::from(field), value);
                Ok(())
            }
        }
    }

    fn push(&mut self, instance: Instance) -> InstanceId {
        // Arena capacity is bounded by the instruction limit, u32 is plenty.
        #[allow(clippy::cast_possible_truncation)]
        let id = InstanceId(self.entries.len() as u32);
        self.entries.push(instance);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_instance_shape() {
        let mut instances = Instances::new();
        let id = instances.create_direct(DirectValue::I32(7));

        let instance = instances.get(id);
        assert!(instance.is_direct());
        assert_eq!(instance.direct_value(), Some(&DirectValue::I32(7)));
        assert_eq!(instance.info().type_name(), "Int32");
    }

    #[test]
    fn test_data_instance_fields() {
        let mut instances = Instances::new();
        let info = Arc::new(InstanceInfo::new("Geometry.Point"));
        let point = instances.create_data(info);
        let x = instances.create_direct(DirectValue::I32(1));

        instances.set_field(point, "X", x).unwrap();
        assert_eq!(instances.field(point, "X").unwrap(), x);

        assert!(matches!(
            instances.field(point, "Y"),
            Err(Error::UndefinedField { .. })
        ));
    }

    #[test]
    fn test_field_access_on_direct_instance_fails() {
        let mut instances = Instances::new();
        let id = instances.create_direct(DirectValue::Bool(true));

        assert!(matches!(
            instances.field(id, "X"),
            Err(Error::NotDataInstance { .. })
        ));
        let other = instances.create_direct(DirectValue::Null);
        assert!(matches!(
            instances.set_field(id, "X", other),
            Err(Error::NotDataInstance { .. })
        ));
    }

    #[test]
    fn test_taint_is_monotonic() {
        let mut instances = Instances::new();
        let id = instances.create_direct(DirectValue::I32(1));

        instances.set_dirty(id);
        instances.set_dirty(id);
        assert!(instances.is_dirty(id));
    }

    #[test]
    fn test_info_structural_identity() {
        let a = InstanceInfo::new("System.String");
        let b = InstanceInfo::new("System.String");
        assert_eq!(a, b);
    }

    #[test]
    fn test_instances_never_deduplicate() {
        let mut instances = Instances::new();
        let a = instances.create_direct(DirectValue::I32(5));
        let b = instances.create_direct(DirectValue::I32(5));
        assert_ne!(a, b);
    }
}
