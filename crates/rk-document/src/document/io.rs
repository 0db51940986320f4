//! Saving and restoring documents
//!
//! The document container is written first, followed by one container per
//! object in creation order. Restore creates every object before reading any
//! property so that links can be resolved regardless of order.

use std::path::Path;
use std::rc::Rc;

use super::{Document, DocumentEvent, DocumentResult, naming};
use crate::config::DocumentConfig;
use crate::object::{DocumentObject, ObjectId};
use crate::persistence::{
    ContainerHeader, DocumentFile, DocumentReader, DocumentWriter, LinkNames, PersistenceError,
    PersistenceResult, PropertyRecord,
};
use crate::property::PropertyValue;
use crate::registry::TypeRegistry;

impl Document {
    /// Table of current object names, used to encode links
    fn link_names(&self) -> LinkNames {
        let mut names = LinkNames::new();
        for object in self.iter_objects() {
            names.insert(object.id(), object.name());
        }
        names
    }

    /// Write the document and every object through `writer`
    pub fn save(&mut self, writer: &mut dyn DocumentWriter) -> DocumentResult<()> {
        self.emit(DocumentEvent::DocumentWillSave);
        self.write_containers(writer)
    }

    fn write_containers(&self, writer: &mut dyn DocumentWriter) -> DocumentResult<()> {
        let names = self.link_names();
        writer.begin_container(ContainerHeader::Document {
            name: self.name().to_string(),
        })?;
        self.properties.save(writer, &names)?;

        for object in self.iter_objects() {
            writer.begin_container(ContainerHeader::Object {
                name: object.name().to_string(),
                type_name: object.type_name().to_string(),
            })?;
            object.properties().save(writer, &names)?;
        }
        Ok(())
    }

    /// Replace the contents of this document with what `reader` holds.
    ///
    /// Objects of unknown types are skipped with a warning, and names that
    /// are not unique identifiers are cleaned and suffixed. Every restored
    /// object starts out `New`; the undo log is cleared. On error the
    /// document is left unchanged.
    pub fn restore(&mut self, reader: &mut dyn DocumentReader) -> DocumentResult<()> {
        let name = match reader.next_container()? {
            Some(ContainerHeader::Document { name }) => name,
            other => {
                return Err(PersistenceError::UnexpectedContainer(format!(
                    "expected document, found {:?}",
                    other
                ))
                .into());
            }
        };

        // Document records are read after the objects exist; buffer them
        let mut document_records = Vec::new();
        while let Some(record) = reader.next_property()? {
            document_records.push(record);
        }

        // Objects are created first, then their properties are read in a
        // second sweep once every link target has an id
        let mut names = LinkNames::new();
        let mut objects: Vec<(DocumentObject, Vec<PropertyRecord>)> = Vec::new();
        while let Some(header) = reader.next_container()? {
            let (saved_name, type_name) = match header {
                ContainerHeader::Object { name, type_name } => (name, type_name),
                other => {
                    return Err(PersistenceError::UnexpectedContainer(format!(
                        "unexpected {:?} after objects",
                        other
                    ))
                    .into());
                }
            };
            let mut records = Vec::new();
            while let Some(record) = reader.next_property()? {
                records.push(record);
            }

            let Some(behavior) = self.registry.create(&type_name) else {
                tracing::warn!("Skipping {} of unknown type {}", saved_name, type_name);
                continue;
            };
            let object_name = naming::unique_name(
                &naming::clean_name(&saved_name),
                objects.iter().map(|(o, _)| o.name()),
            );
            if object_name != saved_name {
                tracing::warn!("Restoring {} as {}", saved_name, object_name);
            }

            let id = ObjectId::new();
            // Links name the first object saved under a name
            if names.id(&saved_name).is_none() {
                names.insert(id, saved_name);
            }
            objects.push((DocumentObject::new(id, object_name, behavior)?, records));
        }

        let mut properties = self.properties.clone();
        properties.set_name(name);
        properties.restore(&mut BufferedReader::new(document_records), &names)?;
        for (object, records) in &mut objects {
            object
                .properties_mut()
                .restore(&mut BufferedReader::new(std::mem::take(records)), &names)?;
            object.reset_new();
        }

        self.properties = properties;
        self.objects.clear();
        self.creation_order.clear();
        for (object, _) in objects {
            self.attach(object, self.creation_order.len());
        }
        self.active_object = None;
        self.open_transaction = None;
        self.recompute_log.clear();
        self.clear_undos();

        tracing::info!("Restored {} with {} objects", self.name(), self.objects.len());
        self.emit(DocumentEvent::DocumentRestored);
        Ok(())
    }

    // ============== Files ==============

    /// Encode as a [`DocumentFile`]
    pub fn to_file(&mut self) -> DocumentResult<DocumentFile> {
        let mut file = DocumentFile::default();
        self.save(&mut file)?;
        Ok(file)
    }

    /// Serialize to RON bytes
    pub fn to_bytes(&mut self) -> DocumentResult<Vec<u8>> {
        Ok(self.to_file()?.to_ron()?.into_bytes())
    }

    /// Save to a RON file, updating `FileName` and `LastModifiedDate` after
    /// `DocumentWillSave` has fired
    pub fn save_to_file(&mut self, path: impl AsRef<Path>) -> DocumentResult<()> {
        let path = path.as_ref();
        self.emit(DocumentEvent::DocumentWillSave);
        self.update_document_property(
            "FileName",
            PropertyValue::Text(path.display().to_string()),
        );
        self.update_document_property(
            "LastModifiedDate",
            PropertyValue::Text(
                chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            ),
        );

        let mut file = DocumentFile::default();
        self.write_containers(&mut file)?;
        file.save(path)?;
        tracing::info!("Saved {} to {}", self.name(), path.display());
        Ok(())
    }

    /// Load a document from a RON file
    pub fn load(
        path: impl AsRef<Path>,
        registry: Rc<TypeRegistry>,
        config: DocumentConfig,
    ) -> DocumentResult<Self> {
        let file = DocumentFile::load(path)?;
        Self::from_file(&file, registry, config)
    }

    /// Load a document from RON bytes
    pub fn load_from_bytes(
        data: &[u8],
        registry: Rc<TypeRegistry>,
        config: DocumentConfig,
    ) -> DocumentResult<Self> {
        let content =
            std::str::from_utf8(data).map_err(|e| PersistenceError::Deserialize(e.to_string()))?;
        let file = DocumentFile::from_ron(content)?;
        Self::from_file(&file, registry, config)
    }

    /// Build a document from a decoded file
    pub fn from_file(
        file: &DocumentFile,
        registry: Rc<TypeRegistry>,
        config: DocumentConfig,
    ) -> DocumentResult<Self> {
        let mut doc = Self::with_registry(file.name.clone(), registry, config);
        doc.restore(&mut file.reader())?;
        Ok(doc)
    }
}

/// Replays the records of one container
struct BufferedReader {
    records: std::vec::IntoIter<PropertyRecord>,
}

impl BufferedReader {
    fn new(records: Vec<PropertyRecord>) -> Self {
        Self {
            records: records.into_iter(),
        }
    }
}

impl DocumentReader for BufferedReader {
    fn next_container(&mut self) -> PersistenceResult<Option<ContainerHeader>> {
        Ok(None)
    }

    fn next_property(&mut self) -> PersistenceResult<Option<PropertyRecord>> {
        Ok(self.records.next())
    }
}
