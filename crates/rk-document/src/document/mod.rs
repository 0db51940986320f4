//! Document
//!
//! The document owns every object, the undo/redo log and the recompute
//! scheduler. Objects reference each other only through [`ObjectId`]s, and
//! every property write goes through the document so that transactions,
//! touch propagation and events stay consistent.

mod event;
mod graph;
mod io;
pub mod naming;
mod recompute;
mod undo;

pub use event::{DocumentEvent, DocumentObserver, ListenerId};
pub use graph::DependencyGraph;
pub use recompute::RecomputeReport;

use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use thiserror::Error;

use crate::config::DocumentConfig;
use crate::container::PropertyContainer;
use crate::object::{DocumentObject, ExecReturn, ObjectId};
use crate::persistence::PersistenceError;
use crate::property::{
    ContainerRef, Property, PropertyError, PropertyFlags, PropertyObserver, PropertySpec,
    PropertyValue,
};
use crate::registry::TypeRegistry;
use crate::transaction::Transaction;
use event::EventDispatcher;

/// Longest chain of `on_changed` follow-up writes handled for one edit
const MAX_FOLLOW_UP_DEPTH: usize = 64;

/// Document-related errors
#[derive(Debug, Clone, Error)]
pub enum DocumentError {
    #[error("Unknown object type: {0}")]
    UnknownObjectType(String),

    #[error("Object name already in use: {0}")]
    NameCollision(String),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("No transaction is open")]
    NoOpenTransaction,

    #[error("Property error: {0}")]
    Property(#[from] PropertyError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Result type for document operations
pub type DocumentResult<T> = Result<T, DocumentError>;

/// A property change reported during a write
#[derive(Debug, Clone)]
struct Change {
    owner: ContainerRef,
    property: String,
    output: bool,
}

/// Observer used for every write made through the document: captures
/// before-images into the open transaction and collects the changes for
/// touch propagation once the write is done.
struct ChangeRecorder<'a> {
    transaction: Option<&'a mut Transaction>,
    changes: Vec<Change>,
}

impl<'a> ChangeRecorder<'a> {
    fn new(transaction: Option<&'a mut Transaction>) -> Self {
        Self {
            transaction,
            changes: Vec::new(),
        }
    }

    fn into_changes(self) -> Vec<Change> {
        self.changes
    }
}

impl PropertyObserver for ChangeRecorder<'_> {
    fn about_to_change(&mut self, property: &Property) {
        if let Some(tx) = self.transaction.as_deref_mut() {
            tx.capture_property(property.owner(), property.name(), property.value());
        }
    }

    fn has_changed(&mut self, property: &Property) {
        self.changes.push(Change {
            owner: property.owner(),
            property: property.name().to_string(),
            output: property.is_output(),
        });
    }
}

/// A document: named objects, their dependency graph and the undo log
#[derive(Debug)]
pub struct Document {
    properties: PropertyContainer,
    registry: Rc<TypeRegistry>,
    config: DocumentConfig,
    objects: HashMap<ObjectId, DocumentObject>,
    creation_order: Vec<ObjectId>,
    active_object: Option<ObjectId>,
    undo_stack: VecDeque<Transaction>,
    redo_stack: VecDeque<Transaction>,
    open_transaction: Option<Transaction>,
    next_transaction_id: u64,
    recompute_log: Vec<ExecReturn>,
    events: EventDispatcher,
}

impl Document {
    /// Create an empty document with the built-in object types
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_registry(
            name,
            Rc::new(TypeRegistry::with_builtin_types()),
            DocumentConfig::default(),
        )
    }

    /// Create an empty document with an explicit registry and configuration
    pub fn with_registry(
        name: impl Into<String>,
        registry: Rc<TypeRegistry>,
        config: DocumentConfig,
    ) -> Self {
        let name = name.into();
        let properties = PropertyContainer::with_properties(
            name.clone(),
            ContainerRef::Document,
            document_properties(&name),
        )
        .unwrap_or_else(|e| {
            tracing::warn!("Invalid document property declaration: {}", e);
            PropertyContainer::new(name.clone(), ContainerRef::Document)
        });

        Self {
            properties,
            registry,
            config,
            objects: HashMap::new(),
            creation_order: Vec::new(),
            active_object: None,
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            open_transaction: None,
            next_transaction_id: 0,
            recompute_log: Vec::new(),
            events: EventDispatcher::default(),
        }
    }

    pub fn name(&self) -> &str {
        self.properties.name()
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.properties.set_name(name);
    }

    /// User-facing label
    pub fn label(&self) -> &str {
        self.properties.text("Label").unwrap_or_else(|_| self.name())
    }

    pub fn config(&self) -> &DocumentConfig {
        &self.config
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Document-level properties (`Label`, `FileName`, `CreatedBy`, ...)
    pub fn properties(&self) -> &PropertyContainer {
        &self.properties
    }

    // ============== Events ==============

    /// Register an observer with default priority
    pub fn subscribe(&mut self, observer: impl DocumentObserver + 'static) -> ListenerId {
        self.events.subscribe(0, Box::new(observer))
    }

    /// Register an observer; lower priorities run first
    pub fn subscribe_with_priority(
        &mut self,
        priority: i32,
        observer: impl DocumentObserver + 'static,
    ) -> ListenerId {
        self.events.subscribe(priority, Box::new(observer))
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }

    fn emit(&mut self, event: DocumentEvent) {
        self.events.dispatch(&event);
    }

    // ============== Object Management ==============

    /// Create an object of a registered type.
    ///
    /// Without a name the type's short name is used (`Part::Box` -> `Box`).
    pub fn add_object(&mut self, type_name: &str, name: Option<&str>) -> DocumentResult<ObjectId> {
        let behavior = self
            .registry
            .create(type_name)
            .ok_or_else(|| DocumentError::UnknownObjectType(type_name.to_string()))?;

        let base = name.unwrap_or_else(|| type_name.rsplit("::").next().unwrap_or(type_name));
        let name = self.resolve_name(base, name.is_some())?;
        let id = ObjectId::new();
        let object = DocumentObject::new(id, name.clone(), behavior)?;

        self.attach(object, self.creation_order.len());
        if let Some(tx) = self.open_transaction.as_mut() {
            tx.record_added(id);
        }
        tracing::debug!("Added {} ({})", name, type_name);

        self.emit(DocumentEvent::ObjectAdded { id, name });
        self.activate(Some(id));
        Ok(id)
    }

    /// Remove an object; links to it in other objects are cleared
    pub fn remove_object(&mut self, name: &str) -> DocumentResult<()> {
        let id = self
            .object_id(name)
            .ok_or_else(|| DocumentError::ObjectNotFound(name.to_string()))?;

        let mut changes = Vec::new();
        for other in self.creation_order.clone() {
            if other == id {
                continue;
            }
            let Some(object) = self.objects.get_mut(&other) else {
                continue;
            };
            let updates: Vec<(String, PropertyValue)> = object
                .properties()
                .iter()
                .filter_map(|p| p.value().without_link(id).map(|v| (p.name().to_string(), v)))
                .collect();
            for (property, value) in updates {
                let mut recorder = ChangeRecorder::new(self.open_transaction.as_mut());
                object
                    .properties_mut()
                    .replace_value(&property, value, &mut recorder)?;
                changes.extend(recorder.into_changes());
            }
        }
        self.process_changes(changes, true);

        let Some((object, position)) = self.detach(id) else {
            return Err(DocumentError::ObjectNotFound(name.to_string()));
        };
        tracing::debug!("Removed {}", name);
        let name = object.name().to_string();
        if let Some(tx) = self.open_transaction.as_mut() {
            tx.record_removed(object, position);
        }
        self.emit(DocumentEvent::ObjectRemoved { id, name });
        Ok(())
    }

    /// Give an object a new unique name
    pub fn rename_object(&mut self, id: ObjectId, new_name: &str) -> DocumentResult<String> {
        let old_name = self
            .objects
            .get(&id)
            .map(|o| o.name().to_string())
            .ok_or_else(|| DocumentError::ObjectNotFound(id.to_string()))?;

        let clean = naming::clean_name(new_name);
        if clean == old_name {
            return Ok(old_name);
        }
        let new_name = self.resolve_name(&clean, true)?;

        if let Some(object) = self.objects.get_mut(&id) {
            object.set_name(new_name.clone());
        }
        if let Some(tx) = self.open_transaction.as_mut() {
            tx.record_renamed(id, old_name.clone());
        }
        tracing::debug!("Renamed {} to {}", old_name, new_name);
        self.emit(DocumentEvent::ObjectRenamed {
            id,
            old_name,
            new_name: new_name.clone(),
        });
        Ok(new_name)
    }

    /// Free name derived from `base`, as `add_object` would pick it
    pub fn get_unique_object_name(&self, base: &str) -> String {
        let clean = naming::clean_name(base);
        naming::unique_name(&clean, self.objects.values().map(DocumentObject::name))
    }

    fn resolve_name(&self, base: &str, explicit: bool) -> DocumentResult<String> {
        let clean = naming::clean_name(base);
        if self.object_id(&clean).is_none() {
            return Ok(clean);
        }
        if explicit && self.config.name_policy == crate::config::NamePolicy::Reject {
            return Err(DocumentError::NameCollision(clean));
        }
        Ok(naming::unique_name(
            &clean,
            self.objects.values().map(DocumentObject::name),
        ))
    }

    /// Insert an object at a position in creation order
    fn attach(&mut self, object: DocumentObject, position: usize) {
        let id = object.id();
        let position = position.min(self.creation_order.len());
        self.creation_order.insert(position, id);
        self.objects.insert(id, object);
    }

    /// Take an object out of the document with its creation order position
    fn detach(&mut self, id: ObjectId) -> Option<(DocumentObject, usize)> {
        let position = self.creation_order.iter().position(|o| *o == id)?;
        let object = self.objects.remove(&id)?;
        self.creation_order.remove(position);
        if self.active_object == Some(id) {
            self.active_object = None;
        }
        Some((object, position))
    }

    // ============== Object Access ==============

    /// Look up an object by name
    pub fn get_object(&self, name: &str) -> Option<&DocumentObject> {
        self.object_id(name).and_then(|id| self.objects.get(&id))
    }

    /// Id of the object with this name
    pub fn object_id(&self, name: &str) -> Option<ObjectId> {
        self.creation_order
            .iter()
            .copied()
            .find(|id| self.objects.get(id).is_some_and(|o| o.name() == name))
    }

    pub fn object(&self, id: ObjectId) -> Option<&DocumentObject> {
        self.objects.get(&id)
    }

    /// Object ids in creation order
    pub fn objects(&self) -> Vec<ObjectId> {
        self.creation_order.clone()
    }

    /// Objects in creation order
    pub fn iter_objects(&self) -> impl Iterator<Item = &DocumentObject> {
        self.creation_order
            .iter()
            .filter_map(|id| self.objects.get(id))
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Objects of a type, in creation order
    pub fn objects_of_type(&self, type_name: &str) -> Vec<ObjectId> {
        self.iter_objects()
            .filter(|o| o.type_name() == type_name)
            .map(DocumentObject::id)
            .collect()
    }

    pub fn count_objects_of_type(&self, type_name: &str) -> usize {
        self.iter_objects()
            .filter(|o| o.type_name() == type_name)
            .count()
    }

    pub fn active_object(&self) -> Option<ObjectId> {
        self.active_object
    }

    /// Make an object the active one
    pub fn set_active_object(&mut self, id: Option<ObjectId>) -> DocumentResult<()> {
        if let Some(id) = id
            && !self.objects.contains_key(&id)
        {
            return Err(DocumentError::ObjectNotFound(id.to_string()));
        }
        self.activate(id);
        Ok(())
    }

    fn activate(&mut self, id: Option<ObjectId>) {
        self.active_object = id;
        if let Some(id) = id {
            self.emit(DocumentEvent::ObjectActivated { id });
        }
    }

    // ============== Property Writes ==============

    /// Write a property of an object
    pub fn set_property(
        &mut self,
        id: ObjectId,
        property: &str,
        value: impl Into<PropertyValue>,
    ) -> DocumentResult<()> {
        let object = self
            .objects
            .get_mut(&id)
            .ok_or_else(|| DocumentError::ObjectNotFound(id.to_string()))?;
        let mut recorder = ChangeRecorder::new(self.open_transaction.as_mut());
        object
            .properties_mut()
            .set_value(property, value.into(), &mut recorder)?;
        let changes = recorder.into_changes();
        self.process_changes(changes, true);
        Ok(())
    }

    /// Write a property of the object with this name
    pub fn set_property_by_name(
        &mut self,
        name: &str,
        property: &str,
        value: impl Into<PropertyValue>,
    ) -> DocumentResult<()> {
        let id = self
            .object_id(name)
            .ok_or_else(|| DocumentError::ObjectNotFound(name.to_string()))?;
        self.set_property(id, property, value)
    }

    /// Write a document-level property
    pub fn set_document_property(
        &mut self,
        property: &str,
        value: impl Into<PropertyValue>,
    ) -> DocumentResult<()> {
        let mut recorder = ChangeRecorder::new(self.open_transaction.as_mut());
        self.properties
            .set_value(property, value.into(), &mut recorder)?;
        let changes = recorder.into_changes();
        self.process_changes(changes, false);
        Ok(())
    }

    /// Write a read-only document property without recording it
    pub(crate) fn update_document_property(&mut self, property: &str, value: PropertyValue) {
        let mut recorder = ChangeRecorder::new(None);
        if let Err(e) = self
            .properties
            .replace_value(property, value, &mut recorder)
        {
            tracing::warn!("Cannot update {}: {}", property, e);
        }
        let changes = recorder.into_changes();
        self.process_changes(changes, false);
    }

    /// Raise the change notification of a property without changing it
    pub fn touch_property(&mut self, id: ObjectId, property: &str) -> DocumentResult<()> {
        let object = self
            .objects
            .get(&id)
            .ok_or_else(|| DocumentError::ObjectNotFound(id.to_string()))?;
        let mut recorder = ChangeRecorder::new(None);
        object.properties().touch(property, &mut recorder)?;
        let changes = recorder.into_changes();
        self.process_changes(changes, false);
        Ok(())
    }

    /// Force an object to recompute on the next pass
    pub fn touch_object(&mut self, id: ObjectId) -> DocumentResult<()> {
        let object = self
            .objects
            .get_mut(&id)
            .ok_or_else(|| DocumentError::ObjectNotFound(id.to_string()))?;
        object.mark_touched(None);
        Ok(())
    }

    /// Touch owners, raise events and run `on_changed` follow-ups.
    ///
    /// Follow-up writes are queued, never recursed into; chains longer than
    /// `MAX_FOLLOW_UP_DEPTH` are cut off with a warning.
    fn process_changes(&mut self, changes: Vec<Change>, run_hooks: bool) {
        let mut queue: VecDeque<(Change, usize)> = changes.into_iter().map(|c| (c, 0)).collect();

        while let Some((change, depth)) = queue.pop_front() {
            let id = match change.owner {
                ContainerRef::Document => {
                    self.emit(DocumentEvent::DocumentChanged {
                        property: change.property,
                    });
                    continue;
                }
                ContainerRef::Object(id) => id,
            };
            let Some(object) = self.objects.get_mut(&id) else {
                continue;
            };
            if !change.output {
                object.mark_touched(Some(&change.property));
            }
            let follow_ups = if run_hooks {
                object.on_changed(&change.property)
            } else {
                Vec::new()
            };
            self.emit(DocumentEvent::ObjectChanged {
                id,
                property: change.property.clone(),
            });

            if follow_ups.is_empty() {
                continue;
            }
            if depth >= MAX_FOLLOW_UP_DEPTH {
                tracing::warn!(
                    "Dropping follow-up writes after {} on {}: chain too long",
                    change.property,
                    id
                );
                continue;
            }
            for (property, value) in follow_ups {
                let Some(object) = self.objects.get_mut(&id) else {
                    break;
                };
                let mut recorder = ChangeRecorder::new(self.open_transaction.as_mut());
                if let Err(e) = object
                    .properties_mut()
                    .set_value(&property, value, &mut recorder)
                {
                    tracing::warn!("Follow-up write to {} failed: {}", property, e);
                }
                queue.extend(recorder.into_changes().into_iter().map(|c| (c, depth + 1)));
            }
        }
    }

    // ============== Queries ==============

    /// Whether any object is due for recompute
    pub fn is_touched(&self) -> bool {
        self.objects.values().any(DocumentObject::is_touched)
    }

    /// Objects due for recompute, in creation order
    pub fn touched(&self) -> Vec<ObjectId> {
        self.iter_objects()
            .filter(|o| o.is_touched())
            .map(DocumentObject::id)
            .collect()
    }

    /// Forget pending changes without recomputing
    pub fn purge_touched(&mut self) {
        for object in self.objects.values_mut() {
            object.purge_touched();
        }
    }

    /// Reason of an object's last failure
    pub fn error_description(&self, id: ObjectId) -> Option<String> {
        self.objects
            .get(&id)
            .and_then(DocumentObject::error_log)
            .map(ExecReturn::message)
    }

    /// Failures of the last recompute pass
    pub fn get_recompute_log(&self) -> &[ExecReturn] {
        &self.recompute_log
    }

    /// Snapshot of the current dependency graph
    pub fn dependency_graph(&self) -> DependencyGraph {
        DependencyGraph::build(&self.creation_order, &self.objects)
    }

    /// Whether the object graph contains a cycle
    pub fn check_on_cycle(&self) -> bool {
        self.dependency_graph().has_cycle()
    }

    /// Everything `id` transitively depends on, in creation order
    pub fn dependencies_of(&self, id: ObjectId) -> Vec<ObjectId> {
        let graph = self.dependency_graph();
        let Some(node) = graph.node(id) else {
            return Vec::new();
        };
        let reached = graph.upstream(&[node]);
        (0..graph.len())
            .filter(|&n| n != node && reached[n])
            .map(|n| graph.id(n))
            .collect()
    }

    /// Everything transitively depending on `id`, in creation order
    pub fn dependents_of(&self, id: ObjectId) -> Vec<ObjectId> {
        let graph = self.dependency_graph();
        let Some(node) = graph.node(id) else {
            return Vec::new();
        };
        let reached = graph.downstream(&[node]);
        (0..graph.len())
            .filter(|&n| n != node && reached[n])
            .map(|n| graph.id(n))
            .collect()
    }

    /// Estimated memory held by the objects
    pub fn mem_size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.properties.mem_size()
            + self
                .objects
                .values()
                .map(DocumentObject::mem_size)
                .sum::<usize>()
    }

    /// DOT graph of the object dependencies, edges labelled by property
    pub fn dependency_graph_dot(&self) -> String {
        let quote = |s: &str| format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""));
        let mut dot = format!("digraph {} {{\n", quote(self.name()));
        for object in self.iter_objects() {
            dot.push_str(&format!("    {};\n", quote(object.name())));
        }
        for object in self.iter_objects() {
            for (property, target) in object.dependency_edges() {
                let Some(target) = self.objects.get(&target) else {
                    continue;
                };
                dot.push_str(&format!(
                    "    {} -> {} [label={}];\n",
                    quote(object.name()),
                    quote(target.name()),
                    quote(property)
                ));
            }
        }
        dot.push_str("}\n");
        dot
    }

    /// Write the DOT dependency graph
    pub fn write_dependency_graph_viz(&self, out: &mut impl std::io::Write) -> std::io::Result<()> {
        out.write_all(self.dependency_graph_dot().as_bytes())
    }
}

/// Properties every document carries
fn document_properties(name: &str) -> Vec<PropertySpec> {
    let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    vec![
        PropertySpec::text("Label", name),
        PropertySpec::text("FileName", "").with_flags(PropertyFlags::READ_ONLY),
        PropertySpec::text("CreatedBy", ""),
        PropertySpec::text("CreationDate", now).with_flags(PropertyFlags::READ_ONLY),
        PropertySpec::text("LastModifiedBy", ""),
        PropertySpec::text("LastModifiedDate", "").with_flags(PropertyFlags::READ_ONLY),
        PropertySpec::text("Company", ""),
        PropertySpec::text("Comment", ""),
    ]
}
