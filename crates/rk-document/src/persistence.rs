//! Document persistence
//!
//! Containers are saved as ordered `(property_name, type_tag, value)` records
//! through the [`DocumentWriter`] / [`DocumentReader`] seam. Links are stored
//! by object name so the saved form stays readable and independent of the
//! in-memory ids. [`DocumentFile`] is the default RON encoding.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::object::ObjectId;
use crate::property::{Property, PropertyError, PropertyValue};

/// Current document file format version
pub const FORMAT_VERSION: u32 = 1;

/// Persistence-related errors
#[derive(Debug, Clone, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialize(String),
    #[error("Deserialization error: {0}")]
    Deserialize(String),
    #[error("Unsupported file version {found} (newest supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("Unexpected container: {0}")]
    UnexpectedContainer(String),
    #[error("Property error: {0}")]
    Property(#[from] PropertyError),
}

/// Result type for persistence operations
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Bidirectional id/name table used to encode links
#[derive(Debug, Clone, Default)]
pub struct LinkNames {
    by_id: HashMap<ObjectId, String>,
    by_name: HashMap<String, ObjectId>,
}

impl LinkNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ObjectId, name: impl Into<String>) {
        let name = name.into();
        self.by_name.insert(name.clone(), id);
        self.by_id.insert(id, name);
    }

    pub fn name(&self, id: ObjectId) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    pub fn id(&self, name: &str) -> Option<ObjectId> {
        self.by_name.get(name).copied()
    }

    fn resolve(&self, name: &str) -> Option<ObjectId> {
        let id = self.id(name);
        if id.is_none() {
            tracing::warn!("Dropping link to unknown object {}", name);
        }
        id
    }
}

/// Saved form of a property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoredValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Enumeration(usize),
    Vector([f64; 3]),
    Link(Option<String>),
    LinkList(Vec<String>),
}

impl StoredValue {
    /// Encode a value, replacing object ids by names
    pub fn encode(value: &PropertyValue, names: &LinkNames) -> Self {
        let name_of = |id: &ObjectId| names.name(*id).map(str::to_string);
        match value {
            PropertyValue::Bool(v) => StoredValue::Bool(*v),
            PropertyValue::Integer(v) => StoredValue::Integer(*v),
            PropertyValue::Float(v) => StoredValue::Float(*v),
            PropertyValue::Text(v) => StoredValue::Text(v.clone()),
            PropertyValue::Enumeration(v) => StoredValue::Enumeration(*v),
            PropertyValue::Vector(v) => StoredValue::Vector(v.to_array()),
            PropertyValue::Link(id) => StoredValue::Link(id.as_ref().and_then(name_of)),
            PropertyValue::LinkList(ids) => {
                StoredValue::LinkList(ids.iter().filter_map(name_of).collect())
            }
        }
    }

    /// Decode a value; links to unknown names are dropped with a warning
    pub fn decode(self, names: &LinkNames) -> PropertyValue {
        match self {
            StoredValue::Bool(v) => PropertyValue::Bool(v),
            StoredValue::Integer(v) => PropertyValue::Integer(v),
            StoredValue::Float(v) => PropertyValue::Float(v),
            StoredValue::Text(v) => PropertyValue::Text(v),
            StoredValue::Enumeration(v) => PropertyValue::Enumeration(v),
            StoredValue::Vector(v) => PropertyValue::Vector(glam::DVec3::from_array(v)),
            StoredValue::Link(name) => {
                PropertyValue::Link(name.as_deref().and_then(|n| names.resolve(n)))
            }
            StoredValue::LinkList(list) => {
                PropertyValue::LinkList(list.iter().filter_map(|n| names.resolve(n)).collect())
            }
        }
    }
}

/// One saved property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub name: String,
    pub type_tag: String,
    pub value: StoredValue,
}

impl PropertyRecord {
    pub fn encode(prop: &Property, names: &LinkNames) -> Self {
        Self {
            name: prop.name().to_string(),
            type_tag: prop.property_type().type_tag().to_string(),
            value: StoredValue::encode(prop.value(), names),
        }
    }
}

/// Start of a saved container
#[derive(Debug, Clone, PartialEq)]
pub enum ContainerHeader {
    Document { name: String },
    Object { name: String, type_name: String },
}

/// Sink for saved containers
pub trait DocumentWriter {
    /// Start a container; following records belong to it
    fn begin_container(&mut self, header: ContainerHeader) -> PersistenceResult<()>;

    /// Append a record to the current container
    fn write_property(&mut self, record: PropertyRecord) -> PersistenceResult<()>;
}

/// Source of saved containers
pub trait DocumentReader {
    /// Advance to the next container
    fn next_container(&mut self) -> PersistenceResult<Option<ContainerHeader>>;

    /// Next record of the current container, `None` at its end
    fn next_property(&mut self) -> PersistenceResult<Option<PropertyRecord>>;
}

/// A saved document object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectEntry {
    pub name: String,
    pub type_name: String,
    pub properties: Vec<PropertyRecord>,
}

/// RON document file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentFile {
    pub version: u32,
    pub name: String,
    pub properties: Vec<PropertyRecord>,
    pub objects: Vec<ObjectEntry>,
}

impl Default for DocumentFile {
    fn default() -> Self {
        Self {
            version: FORMAT_VERSION,
            name: String::new(),
            properties: Vec::new(),
            objects: Vec::new(),
        }
    }
}

impl DocumentFile {
    /// Serialize to pretty RON
    pub fn to_ron(&self) -> PersistenceResult<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| PersistenceError::Serialize(e.to_string()))
    }

    /// Parse RON, rejecting files from newer format versions
    pub fn from_ron(content: &str) -> PersistenceResult<Self> {
        let file: DocumentFile =
            ron::from_str(content).map_err(|e| PersistenceError::Deserialize(e.to_string()))?;
        if file.version > FORMAT_VERSION {
            return Err(PersistenceError::UnsupportedVersion {
                found: file.version,
                supported: FORMAT_VERSION,
            });
        }
        Ok(file)
    }

    /// Load from a file
    pub fn load(path: impl AsRef<std::path::Path>) -> PersistenceResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| PersistenceError::Io(e.to_string()))?;
        Self::from_ron(&content)
    }

    /// Write to a file
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> PersistenceResult<()> {
        let content = self.to_ron()?;
        std::fs::write(path.as_ref(), content).map_err(|e| PersistenceError::Io(e.to_string()))
    }

    /// Cursor reading this file container by container
    pub fn reader(&self) -> DocumentFileReader<'_> {
        DocumentFileReader {
            file: self,
            position: ReadPosition::Start,
            next_record: 0,
        }
    }

    /// Records of the container written last
    fn current_records(&mut self) -> &mut Vec<PropertyRecord> {
        match self.objects.last_mut() {
            Some(entry) => &mut entry.properties,
            None => &mut self.properties,
        }
    }
}

impl DocumentWriter for DocumentFile {
    fn begin_container(&mut self, header: ContainerHeader) -> PersistenceResult<()> {
        match header {
            ContainerHeader::Document { name } => {
                if !self.objects.is_empty() {
                    return Err(PersistenceError::UnexpectedContainer(format!(
                        "document {} after objects",
                        name
                    )));
                }
                self.name = name;
            }
            ContainerHeader::Object { name, type_name } => {
                self.objects.push(ObjectEntry {
                    name,
                    type_name,
                    properties: Vec::new(),
                });
            }
        }
        Ok(())
    }

    fn write_property(&mut self, record: PropertyRecord) -> PersistenceResult<()> {
        self.current_records().push(record);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadPosition {
    Start,
    Document,
    Object(usize),
    End,
}

/// Reader over a [`DocumentFile`]
#[derive(Debug)]
pub struct DocumentFileReader<'a> {
    file: &'a DocumentFile,
    position: ReadPosition,
    next_record: usize,
}

impl DocumentReader for DocumentFileReader<'_> {
    fn next_container(&mut self) -> PersistenceResult<Option<ContainerHeader>> {
        self.next_record = 0;
        self.position = match self.position {
            ReadPosition::Start => ReadPosition::Document,
            ReadPosition::Document => ReadPosition::Object(0),
            ReadPosition::Object(i) => ReadPosition::Object(i + 1),
            ReadPosition::End => ReadPosition::End,
        };

        match self.position {
            ReadPosition::Document => Ok(Some(ContainerHeader::Document {
                name: self.file.name.clone(),
            })),
            ReadPosition::Object(i) => match self.file.objects.get(i) {
                Some(entry) => Ok(Some(ContainerHeader::Object {
                    name: entry.name.clone(),
                    type_name: entry.type_name.clone(),
                })),
                None => {
                    self.position = ReadPosition::End;
                    Ok(None)
                }
            },
            ReadPosition::Start | ReadPosition::End => Ok(None),
        }
    }

    fn next_property(&mut self) -> PersistenceResult<Option<PropertyRecord>> {
        let records = match self.position {
            ReadPosition::Document => &self.file.properties,
            ReadPosition::Object(i) => match self.file.objects.get(i) {
                Some(entry) => &entry.properties,
                None => return Ok(None),
            },
            ReadPosition::Start | ReadPosition::End => return Ok(None),
        };
        let record = records.get(self.next_record).cloned();
        if record.is_some() {
            self.next_record += 1;
        }
        Ok(record)
    }
}
