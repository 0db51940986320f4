//! Typed, observable property values
//!
//! A [`Property`] is a named value cell owned by exactly one container. The
//! value type is a closed set ([`PropertyValue`]); every write is checked
//! against the declared [`PropertyType`] and an optional
//! [`PropertyConstraint`] before anything is mutated.

use std::fmt;

use bitflags::bitflags;
use glam::DVec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::object::ObjectId;

/// Property-related errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PropertyError {
    #[error("Type mismatch on {property}: expected {expected}, got {found}")]
    TypeMismatch {
        property: String,
        expected: PropertyType,
        found: PropertyType,
    },

    #[error("Constraint violation on {property}: {reason}")]
    ConstraintViolation { property: String, reason: String },

    #[error("Property is read-only: {0}")]
    ReadOnly(String),

    #[error("Property not found: {0}")]
    NotFound(String),

    #[error("Property already exists: {0}")]
    Duplicate(String),
}

/// Result type for property operations
pub type PropertyResult<T> = Result<T, PropertyError>;

/// Declared type of a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    Bool,
    Integer,
    Float,
    Text,
    Enumeration,
    Vector,
    Link,
    LinkList,
}

impl PropertyType {
    /// Stable tag written next to every saved value
    pub fn type_tag(self) -> &'static str {
        match self {
            PropertyType::Bool => "App::PropertyBool",
            PropertyType::Integer => "App::PropertyInteger",
            PropertyType::Float => "App::PropertyFloat",
            PropertyType::Text => "App::PropertyString",
            PropertyType::Enumeration => "App::PropertyEnumeration",
            PropertyType::Vector => "App::PropertyVector",
            PropertyType::Link => "App::PropertyLink",
            PropertyType::LinkList => "App::PropertyLinkList",
        }
    }

    /// Parse a tag produced by [`type_tag`](Self::type_tag)
    pub fn from_type_tag(tag: &str) -> Option<Self> {
        match tag {
            "App::PropertyBool" => Some(PropertyType::Bool),
            "App::PropertyInteger" => Some(PropertyType::Integer),
            "App::PropertyFloat" => Some(PropertyType::Float),
            "App::PropertyString" => Some(PropertyType::Text),
            "App::PropertyEnumeration" => Some(PropertyType::Enumeration),
            "App::PropertyVector" => Some(PropertyType::Vector),
            "App::PropertyLink" => Some(PropertyType::Link),
            "App::PropertyLinkList" => Some(PropertyType::LinkList),
            _ => None,
        }
    }

    /// Whether values of this type reference other objects
    pub fn is_link(self) -> bool {
        matches!(self, PropertyType::Link | PropertyType::LinkList)
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_tag())
    }
}

/// A property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    /// Index into the property's choice list
    Enumeration(usize),
    Vector(DVec3),
    Link(Option<ObjectId>),
    LinkList(Vec<ObjectId>),
}

impl PropertyValue {
    /// Get the type of this value
    pub fn property_type(&self) -> PropertyType {
        match self {
            PropertyValue::Bool(_) => PropertyType::Bool,
            PropertyValue::Integer(_) => PropertyType::Integer,
            PropertyValue::Float(_) => PropertyType::Float,
            PropertyValue::Text(_) => PropertyType::Text,
            PropertyValue::Enumeration(_) => PropertyType::Enumeration,
            PropertyValue::Vector(_) => PropertyType::Vector,
            PropertyValue::Link(_) => PropertyType::Link,
            PropertyValue::LinkList(_) => PropertyType::LinkList,
        }
    }

    /// Default value for a property type
    pub fn default_for(ty: PropertyType) -> Self {
        match ty {
            PropertyType::Bool => PropertyValue::Bool(false),
            PropertyType::Integer => PropertyValue::Integer(0),
            PropertyType::Float => PropertyValue::Float(0.0),
            PropertyType::Text => PropertyValue::Text(String::new()),
            PropertyType::Enumeration => PropertyValue::Enumeration(0),
            PropertyType::Vector => PropertyValue::Vector(DVec3::ZERO),
            PropertyType::Link => PropertyValue::Link(None),
            PropertyType::LinkList => PropertyValue::LinkList(Vec::new()),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<DVec3> {
        match self {
            PropertyValue::Vector(v) => Some(*v),
            _ => None,
        }
    }

    /// Object ids referenced by this value (empty for non-link types)
    pub fn links(&self) -> &[ObjectId] {
        match self {
            PropertyValue::Link(Some(id)) => std::slice::from_ref(id),
            PropertyValue::LinkList(ids) => ids,
            _ => &[],
        }
    }

    /// Copy of this value with every reference to `target` dropped
    pub fn without_link(&self, target: ObjectId) -> Option<PropertyValue> {
        match self {
            PropertyValue::Link(Some(id)) if *id == target => Some(PropertyValue::Link(None)),
            PropertyValue::LinkList(ids) if ids.contains(&target) => Some(PropertyValue::LinkList(
                ids.iter().copied().filter(|id| *id != target).collect(),
            )),
            _ => None,
        }
    }

    /// Approximate heap and inline footprint, used for the undo budget
    pub fn mem_size(&self) -> usize {
        let heap = match self {
            PropertyValue::Text(s) => s.capacity(),
            PropertyValue::LinkList(ids) => ids.capacity() * std::mem::size_of::<ObjectId>(),
            _ => 0,
        };
        std::mem::size_of::<Self>() + heap
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Integer(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Float(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Text(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::Text(v)
    }
}

impl From<DVec3> for PropertyValue {
    fn from(v: DVec3) -> Self {
        PropertyValue::Vector(v)
    }
}

impl From<ObjectId> for PropertyValue {
    fn from(v: ObjectId) -> Self {
        PropertyValue::Link(Some(v))
    }
}

impl From<Vec<ObjectId>> for PropertyValue {
    fn from(v: Vec<ObjectId>) -> Self {
        PropertyValue::LinkList(v)
    }
}

/// Constraint applied to every write of a property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyConstraint {
    /// Inclusive numeric range (integers and floats)
    Range { min: f64, max: f64 },
    /// Strictly greater than zero
    Positive,
    /// Valid enumeration indices
    Choices(Vec<String>),
    /// Text or link list must not be empty
    NonEmpty,
}

impl PropertyConstraint {
    /// Check a candidate value
    pub fn check(&self, property: &str, value: &PropertyValue) -> PropertyResult<()> {
        let violation = |reason: String| PropertyError::ConstraintViolation {
            property: property.to_string(),
            reason,
        };

        let number = match value {
            PropertyValue::Float(v) => Some(*v),
            PropertyValue::Integer(v) => Some(*v as f64),
            _ => None,
        };

        match self {
            PropertyConstraint::Range { min, max } => {
                if let Some(v) = number
                    && !(v >= *min && v <= *max)
                {
                    return Err(violation(format!("{} is outside [{}, {}]", v, min, max)));
                }
            }
            PropertyConstraint::Positive => {
                if let Some(v) = number
                    && !(v > 0.0)
                {
                    return Err(violation(format!("{} must be greater than zero", v)));
                }
            }
            PropertyConstraint::Choices(items) => {
                if let PropertyValue::Enumeration(index) = value
                    && *index >= items.len()
                {
                    return Err(violation(format!(
                        "index {} out of range ({} choices)",
                        index,
                        items.len()
                    )));
                }
            }
            PropertyConstraint::NonEmpty => {
                let empty = match value {
                    PropertyValue::Text(s) => s.is_empty(),
                    PropertyValue::LinkList(ids) => ids.is_empty(),
                    _ => false,
                };
                if empty {
                    return Err(violation("value must not be empty".into()));
                }
            }
        }

        Ok(())
    }
}

bitflags! {
    /// Status flags of a property
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PropertyFlags: u8 {
        /// Writes through the public API are rejected
        const READ_ONLY = 1;
        /// Written by `execute()`; changing it does not touch the owner
        const OUTPUT = 1 << 1;
        /// Not listed in editors
        const HIDDEN = 1 << 2;
        /// Not persisted
        const TRANSIENT = 1 << 3;
    }
}

/// Handle to the container owning a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerRef {
    /// The document's own properties
    Document,
    /// A document object
    Object(ObjectId),
}

/// Declaration of a property, instantiated by a container
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySpec {
    pub name: String,
    pub default: PropertyValue,
    pub constraint: Option<PropertyConstraint>,
    pub flags: PropertyFlags,
}

impl PropertySpec {
    /// Declare a property with a default value
    pub fn new(name: impl Into<String>, default: impl Into<PropertyValue>) -> Self {
        Self {
            name: name.into(),
            default: default.into(),
            constraint: None,
            flags: PropertyFlags::empty(),
        }
    }

    pub fn float(name: impl Into<String>, default: f64) -> Self {
        Self::new(name, default)
    }

    pub fn text(name: impl Into<String>, default: impl Into<String>) -> Self {
        Self::new(name, PropertyValue::Text(default.into()))
    }

    pub fn link(name: impl Into<String>) -> Self {
        Self::new(name, PropertyValue::Link(None))
    }

    pub fn link_list(name: impl Into<String>) -> Self {
        Self::new(name, PropertyValue::LinkList(Vec::new()))
    }

    /// Enumeration property with its choices as constraint
    pub fn enumeration(name: impl Into<String>, choices: &[&str], default: usize) -> Self {
        Self::new(name, PropertyValue::Enumeration(default)).with_constraint(
            PropertyConstraint::Choices(choices.iter().map(|c| c.to_string()).collect()),
        )
    }

    pub fn with_constraint(mut self, constraint: PropertyConstraint) -> Self {
        self.constraint = Some(constraint);
        self
    }

    pub fn with_flags(mut self, flags: PropertyFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Mark as output of `execute()`
    pub fn output(self) -> Self {
        self.with_flags(PropertyFlags::OUTPUT | PropertyFlags::READ_ONLY)
    }
}

/// Receives the change notifications of a property write, in order:
/// `about_to_change` before the mutation, `has_changed` after it.
pub trait PropertyObserver {
    /// Called with the property still holding its old value
    fn about_to_change(&mut self, property: &Property);

    /// Called with the property holding its new value
    fn has_changed(&mut self, property: &Property);
}

/// Observer that ignores every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl PropertyObserver for NullObserver {
    fn about_to_change(&mut self, _property: &Property) {}

    fn has_changed(&mut self, _property: &Property) {}
}

/// A named, typed, observable value cell
#[derive(Debug, Clone)]
pub struct Property {
    name: String,
    owner: ContainerRef,
    kind: PropertyType,
    value: PropertyValue,
    constraint: Option<PropertyConstraint>,
    flags: PropertyFlags,
    notify: bool,
}

impl Property {
    /// Instantiate a declaration for its owner
    pub(crate) fn from_spec(spec: PropertySpec, owner: ContainerRef) -> PropertyResult<Self> {
        if let Some(constraint) = &spec.constraint {
            constraint.check(&spec.name, &spec.default)?;
        }
        Ok(Self {
            kind: spec.default.property_type(),
            name: spec.name,
            owner,
            value: spec.default,
            constraint: spec.constraint,
            flags: spec.flags,
            notify: true,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> ContainerRef {
        self.owner
    }

    pub fn property_type(&self) -> PropertyType {
        self.kind
    }

    pub fn value(&self) -> &PropertyValue {
        &self.value
    }

    pub fn constraint(&self) -> Option<&PropertyConstraint> {
        self.constraint.as_ref()
    }

    pub fn flags(&self) -> PropertyFlags {
        self.flags
    }

    pub fn is_read_only(&self) -> bool {
        self.flags.contains(PropertyFlags::READ_ONLY)
    }

    pub fn is_output(&self) -> bool {
        self.flags.contains(PropertyFlags::OUTPUT)
    }

    pub fn is_transient(&self) -> bool {
        self.flags.contains(PropertyFlags::TRANSIENT)
    }

    pub fn notify_enabled(&self) -> bool {
        self.notify
    }

    /// Enable or disable change notification (disabled during bulk restore)
    pub fn enable_notify(&mut self, on: bool) {
        self.notify = on;
    }

    /// Check type and constraint of a candidate value without writing it
    pub fn validate(&self, value: &PropertyValue) -> PropertyResult<()> {
        self.check_type(value)?;
        if let Some(constraint) = &self.constraint {
            constraint.check(&self.name, value)?;
        }
        Ok(())
    }

    fn check_type(&self, value: &PropertyValue) -> PropertyResult<()> {
        let found = value.property_type();
        if found != self.kind {
            return Err(PropertyError::TypeMismatch {
                property: self.name.clone(),
                expected: self.kind,
                found,
            });
        }
        Ok(())
    }

    /// Validated write with notifications
    pub fn set(
        &mut self,
        value: PropertyValue,
        observer: &mut dyn PropertyObserver,
    ) -> PropertyResult<()> {
        if self.is_read_only() {
            return Err(PropertyError::ReadOnly(self.name.clone()));
        }
        self.validate(&value)?;
        self.write(value, observer);
        Ok(())
    }

    /// Type-checked write that bypasses the read-only flag and constraint,
    /// returning the previous value. Used for outputs, undo and link cleanup.
    pub(crate) fn replace(
        &mut self,
        value: PropertyValue,
        observer: &mut dyn PropertyObserver,
    ) -> PropertyResult<PropertyValue> {
        self.check_type(&value)?;
        Ok(self.write(value, observer))
    }

    fn write(&mut self, value: PropertyValue, observer: &mut dyn PropertyObserver) -> PropertyValue {
        if self.notify {
            observer.about_to_change(self);
        }
        let old = std::mem::replace(&mut self.value, value);
        if self.notify {
            observer.has_changed(self);
        }
        old
    }

    /// Force the post-change notification without altering the value
    pub fn touch(&self, observer: &mut dyn PropertyObserver) {
        observer.has_changed(self);
    }

    pub fn mem_size(&self) -> usize {
        std::mem::size_of::<Self>() + self.name.capacity() + self.value.mem_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl PropertyObserver for Recorder {
        fn about_to_change(&mut self, property: &Property) {
            self.events
                .push(format!("before {} = {:?}", property.name(), property.value()));
        }

        fn has_changed(&mut self, property: &Property) {
            self.events
                .push(format!("after {} = {:?}", property.name(), property.value()));
        }
    }

    fn length() -> Property {
        Property::from_spec(
            PropertySpec::float("Length", 10.0).with_constraint(PropertyConstraint::Positive),
            ContainerRef::Document,
        )
        .unwrap()
    }

    #[test]
    fn test_set_notifies_in_order() {
        let mut prop = length();
        let mut recorder = Recorder::default();

        prop.set(PropertyValue::Float(4.0), &mut recorder).unwrap();

        assert_eq!(
            recorder.events,
            vec!["before Length = Float(10.0)", "after Length = Float(4.0)"]
        );
    }

    #[test]
    fn test_type_mismatch_keeps_value() {
        let mut prop = length();
        let err = prop
            .set(PropertyValue::Text("ten".into()), &mut NullObserver)
            .unwrap_err();

        assert!(matches!(err, PropertyError::TypeMismatch { .. }));
        assert_eq!(prop.value(), &PropertyValue::Float(10.0));
    }

    #[test]
    fn test_constraint_violation_keeps_value() {
        let mut prop = length();
        let mut recorder = Recorder::default();
        let err = prop.set(PropertyValue::Float(-5.0), &mut recorder).unwrap_err();

        assert!(matches!(err, PropertyError::ConstraintViolation { .. }));
        assert_eq!(prop.value(), &PropertyValue::Float(10.0));
        assert!(recorder.events.is_empty(), "rejected write must not notify");
    }

    #[test]
    fn test_notify_disabled_is_silent() {
        let mut prop = length();
        let mut recorder = Recorder::default();
        prop.enable_notify(false);

        prop.set(PropertyValue::Float(2.0), &mut recorder).unwrap();

        assert!(recorder.events.is_empty());
        assert_eq!(prop.value().as_float(), Some(2.0));
    }

    #[test]
    fn test_enumeration_choices() {
        let mut prop = Property::from_spec(
            PropertySpec::enumeration("Mode", &["Solid", "Shell"], 0),
            ContainerRef::Document,
        )
        .unwrap();

        assert!(prop.set(PropertyValue::Enumeration(1), &mut NullObserver).is_ok());
        assert!(matches!(
            prop.set(PropertyValue::Enumeration(2), &mut NullObserver),
            Err(PropertyError::ConstraintViolation { .. })
        ));
    }

    #[test]
    fn test_read_only_rejects_set_but_allows_replace() {
        let mut prop = Property::from_spec(
            PropertySpec::float("Volume", 0.0).output(),
            ContainerRef::Document,
        )
        .unwrap();

        assert!(matches!(
            prop.set(PropertyValue::Float(1.0), &mut NullObserver),
            Err(PropertyError::ReadOnly(_))
        ));
        let old = prop
            .replace(PropertyValue::Float(1.0), &mut NullObserver)
            .unwrap();
        assert_eq!(old, PropertyValue::Float(0.0));
    }

    #[test]
    fn test_without_link() {
        let a = ObjectId::new();
        let b = ObjectId::new();

        let list = PropertyValue::LinkList(vec![a, b]);
        assert_eq!(list.without_link(a), Some(PropertyValue::LinkList(vec![b])));
        assert_eq!(
            PropertyValue::Link(Some(a)).without_link(a),
            Some(PropertyValue::Link(None))
        );
        assert_eq!(PropertyValue::Link(Some(b)).without_link(a), None);
    }

    #[test]
    fn test_type_tag_roundtrip() {
        for ty in [
            PropertyType::Bool,
            PropertyType::Float,
            PropertyType::LinkList,
        ] {
            assert_eq!(PropertyType::from_type_tag(ty.type_tag()), Some(ty));
        }
        assert_eq!(PropertyType::from_type_tag("App::PropertyMagic"), None);
    }
}
