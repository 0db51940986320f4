//! Object execution: the behavior trait and what `execute()` can see.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use super::{DocumentObject, LABEL, ObjectId, ObjectStatus};
use crate::container::PropertyContainer;
use crate::property::{
    PropertyError, PropertyObserver, PropertySpec, PropertyType, PropertyValue,
};

/// Domain failure reported by an object's `execute()`
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecError {
    #[error("{0}")]
    Failed(String),

    #[error("Link {property} points to a missing object")]
    BrokenLink { property: String },

    #[error("Invalid input {property}: {reason}")]
    InvalidInput { property: String, reason: String },

    #[error(transparent)]
    Property(#[from] PropertyError),
}

/// Result type for `execute()`
pub type ExecResult<T> = Result<T, ExecError>;

/// Successful outcome of `execute()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecOutcome {
    /// Outputs were rebuilt; dependents must follow
    Recomputed,
    /// Nothing observable changed; dependents are not forced
    NoChange,
}

/// Why an object ended up in `Error`
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecomputeFailure {
    #[error("{0}")]
    Execution(ExecError),

    #[error("Object is part of a dependency cycle")]
    CyclicDependency,

    #[error("Depends on {0}, which is part of a dependency cycle")]
    UpstreamCycle(String),

    #[error("Depends on {0}, which failed to recompute")]
    UpstreamError(String),
}

/// Recorded outcome of a failed recompute
#[derive(Debug, Clone, PartialEq)]
pub struct ExecReturn {
    pub object: ObjectId,
    pub name: String,
    pub failure: RecomputeFailure,
}

impl ExecReturn {
    pub fn new(object: ObjectId, name: impl Into<String>, failure: RecomputeFailure) -> Self {
        Self {
            object,
            name: name.into(),
            failure,
        }
    }

    /// Human readable reason
    pub fn message(&self) -> String {
        self.failure.to_string()
    }
}

impl fmt::Display for ExecReturn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.failure)
    }
}

/// What `must_execute()` gets to look at
#[derive(Debug, Clone, Copy)]
pub struct ExecuteState<'a> {
    pub status: ObjectStatus,
    /// Properties changed since the last recompute
    pub changed: &'a [String],
    /// Touched without a property change
    pub forced: bool,
    /// A dependency was recomputed in this pass
    pub upstream_recomputed: bool,
    pub properties: &'a PropertyContainer,
}

impl ExecuteState<'_> {
    /// Execute when new, forced, after an upstream recompute, or when any
    /// input other than the label changed.
    pub fn default_must_execute(&self) -> bool {
        self.status == ObjectStatus::New
            || self.forced
            || self.upstream_recomputed
            || self.changed.iter().any(|name| {
                name != LABEL && !self.properties.get(name).is_some_and(|p| p.is_output())
            })
    }

    /// Whether a given property is among the changed ones
    pub fn has_changed(&self, name: &str) -> bool {
        self.changed.iter().any(|p| p == name)
    }
}

/// Recompute behavior of an object type
pub trait ObjectBehavior: fmt::Debug {
    /// Registered type name, e.g. `Part::Box`
    fn type_name(&self) -> &'static str;

    /// Properties declared by this type, after `Label`
    fn properties(&self) -> Vec<PropertySpec>;

    /// Fast pre-check before `execute()`
    fn must_execute(&self, state: &ExecuteState<'_>) -> bool {
        state.default_must_execute()
    }

    /// Rebuild the outputs from the inputs
    fn execute(&mut self, ctx: &mut ExecContext<'_>) -> ExecResult<ExecOutcome>;

    /// Follow-up writes to the same object after `property` changed
    fn on_changed(
        &mut self,
        _property: &str,
        _properties: &PropertyContainer,
    ) -> Vec<(String, PropertyValue)> {
        Vec::new()
    }
}

/// View of the document during one `execute()` call.
///
/// Own properties are writable; every other object is read-only. Touches on
/// other objects are queued and handled by the scheduler.
pub struct ExecContext<'a> {
    id: ObjectId,
    properties: &'a mut PropertyContainer,
    objects: &'a HashMap<ObjectId, DocumentObject>,
    observer: &'a mut dyn PropertyObserver,
    touch_requests: &'a mut Vec<ObjectId>,
}

impl<'a> ExecContext<'a> {
    pub(crate) fn new(
        id: ObjectId,
        properties: &'a mut PropertyContainer,
        objects: &'a HashMap<ObjectId, DocumentObject>,
        observer: &'a mut dyn PropertyObserver,
        touch_requests: &'a mut Vec<ObjectId>,
    ) -> Self {
        Self {
            id,
            properties,
            objects,
            observer,
            touch_requests,
        }
    }

    /// Id of the executing object
    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn properties(&self) -> &PropertyContainer {
        &*self.properties
    }

    pub fn float(&self, name: &str) -> ExecResult<f64> {
        Ok(self.properties.float(name)?)
    }

    /// Another object of the document
    pub fn object(&self, id: ObjectId) -> Option<&'a DocumentObject> {
        self.objects.get(&id)
    }

    /// Object referenced by a `Link` property
    pub fn link(&self, name: &str) -> ExecResult<&'a DocumentObject> {
        match self.properties.require(name)? {
            PropertyValue::Link(Some(id)) => self.resolve(name, *id),
            PropertyValue::Link(None) => Err(ExecError::InvalidInput {
                property: name.to_string(),
                reason: "no object linked".into(),
            }),
            other => Err(ExecError::Property(PropertyError::TypeMismatch {
                property: name.to_string(),
                expected: PropertyType::Link,
                found: other.property_type(),
            })),
        }
    }

    /// Objects referenced by a `LinkList` property, in list order
    pub fn linked_list(&self, name: &str) -> ExecResult<Vec<&'a DocumentObject>> {
        match self.properties.require(name)? {
            PropertyValue::LinkList(ids) => ids.iter().map(|id| self.resolve(name, *id)).collect(),
            other => Err(ExecError::Property(PropertyError::TypeMismatch {
                property: name.to_string(),
                expected: PropertyType::LinkList,
                found: other.property_type(),
            })),
        }
    }

    fn resolve(&self, property: &str, id: ObjectId) -> ExecResult<&'a DocumentObject> {
        let objects: &'a HashMap<ObjectId, DocumentObject> = self.objects;
        objects.get(&id).ok_or_else(|| ExecError::BrokenLink {
            property: property.to_string(),
        })
    }

    /// Write an own property; outputs bypass the read-only flag
    pub fn set(&mut self, name: &str, value: PropertyValue) -> ExecResult<()> {
        let is_output = self
            .properties
            .get(name)
            .ok_or_else(|| PropertyError::NotFound(name.to_string()))?
            .is_output();
        if is_output {
            self.properties
                .replace_value(name, value, &mut *self.observer)?;
        } else {
            self.properties.set_value(name, value, &mut *self.observer)?;
        }
        Ok(())
    }

    /// Ask for another object to be recomputed
    pub fn request_touch(&mut self, id: ObjectId) {
        if !self.touch_requests.contains(&id) {
            self.touch_requests.push(id);
        }
    }
}
