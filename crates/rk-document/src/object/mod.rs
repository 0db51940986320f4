//! Document Objects
//!
//! A document object is a property container that takes part in the
//! dependency graph through its link-typed properties and knows how to
//! recompute itself through an [`ObjectBehavior`].

mod exec;

pub use exec::{
    ExecContext, ExecError, ExecOutcome, ExecResult, ExecReturn, ExecuteState, ObjectBehavior,
    RecomputeFailure,
};

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::container::PropertyContainer;
use crate::property::{
    ContainerRef, PropertyObserver, PropertyResult, PropertySpec, PropertyValue,
};

/// Name of the label property carried by every object
pub const LABEL: &str = "Label";

/// Stable handle to a document object
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(Uuid);

impl ObjectId {
    /// Generate a fresh id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Recompute state of an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ObjectStatus {
    /// Never recomputed since creation or restore
    #[default]
    New,
    /// Up to date
    Valid,
    /// Changed since its last recompute
    Touched,
    /// Executing
    Recomputing,
    /// Last recompute failed; see the error log
    Error,
}

impl fmt::Display for ObjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObjectStatus::New => "New",
            ObjectStatus::Valid => "Valid",
            ObjectStatus::Touched => "Touched",
            ObjectStatus::Recomputing => "Recomputing",
            ObjectStatus::Error => "Error",
        };
        f.write_str(s)
    }
}

/// A named, graph-linked, recomputable entity inside a document
#[derive(Debug)]
pub struct DocumentObject {
    id: ObjectId,
    type_name: String,
    properties: PropertyContainer,
    status: ObjectStatus,
    /// Properties changed since the last recompute
    changed: Vec<String>,
    /// Touched without a property change
    forced: bool,
    error_log: Option<ExecReturn>,
    behavior: Box<dyn ObjectBehavior>,
}

impl DocumentObject {
    /// Create an object with its `Label` and the behavior's properties
    pub fn new(
        id: ObjectId,
        name: impl Into<String>,
        behavior: Box<dyn ObjectBehavior>,
    ) -> PropertyResult<Self> {
        let name = name.into();
        let mut specs = vec![PropertySpec::text(LABEL, name.clone())];
        specs.extend(behavior.properties());
        let properties = PropertyContainer::with_properties(name, ContainerRef::Object(id), specs)?;

        Ok(Self {
            id,
            type_name: behavior.type_name().to_string(),
            properties,
            status: ObjectStatus::New,
            changed: Vec::new(),
            forced: false,
            error_log: None,
            behavior,
        })
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Unique name within the document
    pub fn name(&self) -> &str {
        self.properties.name()
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.properties.set_name(name);
    }

    /// User-facing label
    pub fn label(&self) -> &str {
        self.properties.text(LABEL).unwrap_or_else(|_| self.name())
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn properties(&self) -> &PropertyContainer {
        &self.properties
    }

    pub(crate) fn properties_mut(&mut self) -> &mut PropertyContainer {
        &mut self.properties
    }

    /// Get a property value by name
    pub fn value(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.value(name)
    }

    pub fn status(&self) -> ObjectStatus {
        self.status
    }

    pub fn is_valid(&self) -> bool {
        self.status == ObjectStatus::Valid
    }

    pub fn is_error(&self) -> bool {
        self.status == ObjectStatus::Error
    }

    /// New or touched, i.e. due for recompute
    pub fn is_touched(&self) -> bool {
        matches!(self.status, ObjectStatus::New | ObjectStatus::Touched)
    }

    /// Outcome of the last failed recompute
    pub fn error_log(&self) -> Option<&ExecReturn> {
        self.error_log.as_ref()
    }

    /// Properties changed since the last recompute
    pub fn changed_properties(&self) -> &[String] {
        &self.changed
    }

    /// Ids referenced by link-typed properties, without duplicates
    pub fn dependencies(&self) -> Vec<ObjectId> {
        let mut out: Vec<ObjectId> = Vec::new();
        for (_, id) in self.properties.links() {
            if !out.contains(&id) {
                out.push(id);
            }
        }
        out
    }

    /// `(property, target)` pairs of every link
    pub fn dependency_edges(&self) -> Vec<(&str, ObjectId)> {
        self.properties.links()
    }

    pub fn mem_size(&self) -> usize {
        std::mem::size_of::<Self>() + self.type_name.capacity() + self.properties.mem_size()
    }

    // ============== State transitions ==============

    /// Mark as touched, optionally through a property change
    pub(crate) fn mark_touched(&mut self, property: Option<&str>) {
        match property {
            Some(name) => {
                if !self.changed.iter().any(|p| p == name) {
                    self.changed.push(name.to_string());
                }
            }
            None => self.forced = true,
        }
        if self.status != ObjectStatus::New {
            self.status = ObjectStatus::Touched;
        }
    }

    /// Drop pending changes without recomputing; a recorded failure is kept
    pub(crate) fn purge_touched(&mut self) {
        self.clear_pending();
        if self.status == ObjectStatus::Touched {
            self.status = self.settled_status();
        }
    }

    pub(crate) fn reset_new(&mut self) {
        self.changed.clear();
        self.forced = false;
        self.error_log = None;
        self.status = ObjectStatus::New;
    }

    /// Visited but not executed; an error from an earlier pass is kept
    pub(crate) fn finish_skipped(&mut self) {
        self.clear_pending();
        self.status = self.settled_status();
    }

    pub(crate) fn set_recomputing(&mut self) {
        self.status = ObjectStatus::Recomputing;
    }

    pub(crate) fn set_valid(&mut self) {
        self.clear_pending();
        self.error_log = None;
        self.status = ObjectStatus::Valid;
    }

    pub(crate) fn set_error(&mut self, error: ExecReturn) {
        self.clear_pending();
        self.error_log = Some(error);
        self.status = ObjectStatus::Error;
    }

    /// Status without a successful execute: only `set_valid` clears an error
    fn settled_status(&self) -> ObjectStatus {
        if self.error_log.is_some() {
            ObjectStatus::Error
        } else {
            ObjectStatus::Valid
        }
    }

    fn clear_pending(&mut self) {
        self.changed.clear();
        self.forced = false;
    }

    // ============== Behavior ==============

    pub(crate) fn must_execute(&self, upstream_recomputed: bool) -> bool {
        let state = ExecuteState {
            status: self.status,
            changed: &self.changed,
            forced: self.forced,
            upstream_recomputed,
            properties: &self.properties,
        };
        self.behavior.must_execute(&state)
    }

    pub(crate) fn run_execute(
        &mut self,
        objects: &HashMap<ObjectId, DocumentObject>,
        observer: &mut dyn PropertyObserver,
        touch_requests: &mut Vec<ObjectId>,
    ) -> ExecResult<ExecOutcome> {
        let mut ctx = ExecContext::new(
            self.id,
            &mut self.properties,
            objects,
            observer,
            touch_requests,
        );
        self.behavior.execute(&mut ctx)
    }

    /// Follow-up writes requested by the behavior after `property` changed
    pub(crate) fn on_changed(&mut self, property: &str) -> Vec<(String, PropertyValue)> {
        self.behavior.on_changed(property, &self.properties)
    }
}
