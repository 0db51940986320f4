//! Transactions
//!
//! A transaction is a reversible record of the edits made between
//! `open_transaction` and `commit_transaction`. Property values are captured
//! lazily: only the first write to each property stores its before-image.

use std::collections::HashSet;

use crate::object::{DocumentObject, ObjectId};
use crate::property::{ContainerRef, PropertyValue};

/// One reversible edit
#[derive(Debug)]
pub enum TransactionRecord {
    /// Value of a property before the edit
    Property {
        owner: ContainerRef,
        property: String,
        value: PropertyValue,
    },
    /// Object created by the edit
    ObjectAdded { id: ObjectId },
    /// Object removed by the edit, with its place in creation order
    ObjectRemoved {
        object: Box<DocumentObject>,
        position: usize,
    },
    /// Name of an object before it was renamed
    ObjectRenamed { id: ObjectId, name: String },
}

impl TransactionRecord {
    pub fn mem_size(&self) -> usize {
        let extra = match self {
            TransactionRecord::Property {
                property, value, ..
            } => property.capacity() + value.mem_size(),
            TransactionRecord::ObjectAdded { .. } => 0,
            TransactionRecord::ObjectRemoved { object, .. } => object.mem_size(),
            TransactionRecord::ObjectRenamed { name, .. } => name.capacity(),
        };
        std::mem::size_of::<Self>() + extra
    }
}

/// A named group of reversible edits
#[derive(Debug)]
pub struct Transaction {
    id: u64,
    name: String,
    records: Vec<TransactionRecord>,
    /// Properties whose before-image is already stored
    captured: HashSet<(ContainerRef, String)>,
    /// Objects created inside this transaction; their writes need no capture
    added: HashSet<ObjectId>,
}

impl Transaction {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            records: Vec::new(),
            captured: HashSet::new(),
            added: HashSet::new(),
        }
    }

    pub(crate) fn from_records(id: u64, name: String, records: Vec<TransactionRecord>) -> Self {
        Self {
            id,
            name,
            records,
            captured: HashSet::new(),
            added: HashSet::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> &[TransactionRecord] {
        &self.records
    }

    /// Whether the before-image of a property is stored
    pub fn has_captured(&self, owner: ContainerRef, property: &str) -> bool {
        self.captured.contains(&(owner, property.to_string()))
    }

    /// Store the before-image of a property on its first write
    pub fn capture_property(&mut self, owner: ContainerRef, property: &str, value: &PropertyValue) {
        if let ContainerRef::Object(id) = owner
            && self.added.contains(&id)
        {
            return;
        }
        if !self.captured.insert((owner, property.to_string())) {
            return;
        }
        self.records.push(TransactionRecord::Property {
            owner,
            property: property.to_string(),
            value: value.clone(),
        });
    }

    pub fn record_added(&mut self, id: ObjectId) {
        self.added.insert(id);
        self.records.push(TransactionRecord::ObjectAdded { id });
    }

    pub fn record_removed(&mut self, object: DocumentObject, position: usize) {
        self.records.push(TransactionRecord::ObjectRemoved {
            object: Box::new(object),
            position,
        });
    }

    pub fn record_renamed(&mut self, id: ObjectId, old_name: impl Into<String>) {
        self.records.push(TransactionRecord::ObjectRenamed {
            id,
            name: old_name.into(),
        });
    }

    pub(crate) fn into_parts(self) -> (u64, String, Vec<TransactionRecord>) {
        (self.id, self.name, self.records)
    }

    /// Estimated memory held by the stored before-images
    pub fn mem_size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.name.capacity()
            + self
                .records
                .iter()
                .map(TransactionRecord::mem_size)
                .sum::<usize>()
    }
}
