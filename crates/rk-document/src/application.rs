//! Application Context
//!
//! Holds the open documents, the object type registry and the application
//! configuration. Documents are looked up by name through this value.

use std::path::Path;
use std::rc::Rc;

use thiserror::Error;

use crate::config::AppConfig;
use crate::document::{Document, DocumentError, naming};
use crate::property::PropertyValue;
use crate::registry::{BehaviorConstructor, TypeRegistry};

/// Application-level errors
#[derive(Debug, Clone, Error)]
pub enum ApplicationError {
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),
}

/// Result type for application operations
pub type ApplicationResult<T> = Result<T, ApplicationError>;

/// Open documents and the shared object type registry
#[derive(Debug)]
pub struct Application {
    config: AppConfig,
    registry: Rc<TypeRegistry>,
    documents: Vec<Document>,
    active: Option<String>,
}

impl Default for Application {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

impl Application {
    /// Create an application with the built-in object types
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            registry: Rc::new(TypeRegistry::with_builtin_types()),
            documents: Vec::new(),
            active: None,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Register an object type for documents created or opened afterwards
    pub fn register_type(&mut self, type_name: impl Into<String>, constructor: BehaviorConstructor) {
        Rc::make_mut(&mut self.registry).register(type_name, constructor);
    }

    // ============== Documents ==============

    /// Create an empty document and make it active.
    ///
    /// The name is cleaned and suffixed if another document already uses it.
    pub fn new_document(&mut self, name: &str) -> ApplicationResult<&mut Document> {
        let name = self.unique_document_name(name);
        let mut doc = Document::with_registry(
            name.clone(),
            Rc::clone(&self.registry),
            self.config.document.clone(),
        );
        if !self.config.author.is_empty() {
            doc.set_document_property("CreatedBy", self.config.author.as_str())?;
        }
        if !self.config.company.is_empty() {
            doc.set_document_property("Company", self.config.company.as_str())?;
        }

        tracing::info!("Created document {}", name);
        Ok(self.push_document(doc))
    }

    /// Load a document from a RON file and make it active
    pub fn open_document(&mut self, path: impl AsRef<Path>) -> ApplicationResult<&mut Document> {
        let path = path.as_ref();
        let mut doc = Document::load(
            path,
            Rc::clone(&self.registry),
            self.config.document.clone(),
        )?;

        let name = self.unique_document_name(doc.name());
        if name != doc.name() {
            tracing::info!("Opening {} as {}", doc.name(), name);
            doc.set_name(name);
        }
        tracing::info!("Opened {} from {}", doc.name(), path.display());
        Ok(self.push_document(doc))
    }

    /// Save a document to a RON file, stamping `LastModifiedBy`
    pub fn save_document(&mut self, name: &str, path: impl AsRef<Path>) -> ApplicationResult<()> {
        let author = self.config.author.clone();
        let doc = self
            .get_document_mut(name)
            .ok_or_else(|| ApplicationError::DocumentNotFound(name.to_string()))?;
        if !author.is_empty() {
            doc.update_document_property("LastModifiedBy", PropertyValue::Text(author));
        }
        doc.save_to_file(path)?;
        Ok(())
    }

    /// Close a document and hand it back
    pub fn close_document(&mut self, name: &str) -> ApplicationResult<Document> {
        let index = self
            .documents
            .iter()
            .position(|d| d.name() == name)
            .ok_or_else(|| ApplicationError::DocumentNotFound(name.to_string()))?;
        let doc = self.documents.remove(index);

        if self.active.as_deref() == Some(name) {
            self.active = self.documents.last().map(|d| d.name().to_string());
        }
        tracing::info!("Closed document {}", name);
        Ok(doc)
    }

    /// Give a document a new unique name
    pub fn rename_document(&mut self, name: &str, new_name: &str) -> ApplicationResult<String> {
        if self.get_document(name).is_none() {
            return Err(ApplicationError::DocumentNotFound(name.to_string()));
        }
        let clean = naming::clean_name(new_name);
        if clean == name {
            return Ok(clean);
        }
        let new_name = self.unique_document_name(&clean);

        if let Some(doc) = self.get_document_mut(name) {
            doc.set_name(new_name.clone());
        }
        if self.active.as_deref() == Some(name) {
            self.active = Some(new_name.clone());
        }
        tracing::debug!("Renamed document {} to {}", name, new_name);
        Ok(new_name)
    }

    pub fn get_document(&self, name: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.name() == name)
    }

    pub fn get_document_mut(&mut self, name: &str) -> Option<&mut Document> {
        self.documents.iter_mut().find(|d| d.name() == name)
    }

    /// Open documents in opening order
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn document_names(&self) -> Vec<&str> {
        self.documents.iter().map(Document::name).collect()
    }

    pub fn set_active_document(&mut self, name: &str) -> ApplicationResult<()> {
        if self.get_document(name).is_none() {
            return Err(ApplicationError::DocumentNotFound(name.to_string()));
        }
        self.active = Some(name.to_string());
        Ok(())
    }

    pub fn active_document(&self) -> Option<&Document> {
        self.active.as_deref().and_then(|name| self.get_document(name))
    }

    pub fn active_document_mut(&mut self) -> Option<&mut Document> {
        let name = self.active.clone()?;
        self.get_document_mut(&name)
    }

    fn unique_document_name(&self, name: &str) -> String {
        let clean = naming::clean_name(name);
        naming::unique_name(&clean, self.documents.iter().map(Document::name))
    }

    fn push_document(&mut self, doc: Document) -> &mut Document {
        self.active = Some(doc.name().to_string());
        let index = self.documents.len();
        self.documents.push(doc);
        &mut self.documents[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ExecContext, ExecOutcome, ExecResult, ObjectBehavior};
    use crate::property::PropertySpec;

    #[test]
    fn test_new_document_names_are_unique() {
        let mut app = Application::default();
        app.new_document("Unnamed").unwrap();
        app.new_document("Unnamed").unwrap();
        app.new_document("3D part").unwrap();

        assert_eq!(app.document_names(), vec!["Unnamed", "Unnamed1", "_D_part"]);
        assert_eq!(app.active_document().unwrap().name(), "_D_part");
    }

    #[test]
    fn test_new_document_uses_config() {
        let config = AppConfig {
            author: "Ada".into(),
            company: "Analytical Engines".into(),
            ..Default::default()
        };
        let mut app = Application::new(config);
        let doc = app.new_document("Drawing").unwrap();

        assert_eq!(doc.properties().text("CreatedBy").unwrap(), "Ada");
        assert_eq!(doc.properties().text("Company").unwrap(), "Analytical Engines");
        assert_eq!(doc.available_undos(), 0);
    }

    #[test]
    fn test_close_document_moves_active() {
        let mut app = Application::default();
        app.new_document("A").unwrap();
        app.new_document("B").unwrap();
        app.set_active_document("B").unwrap();

        let closed = app.close_document("B").unwrap();
        assert_eq!(closed.name(), "B");
        assert_eq!(app.active_document().unwrap().name(), "A");
        assert!(matches!(
            app.close_document("B"),
            Err(ApplicationError::DocumentNotFound(_))
        ));
        assert!(app.set_active_document("B").is_err());
    }

    #[test]
    fn test_rename_document() {
        let mut app = Application::default();
        app.new_document("A").unwrap();
        app.new_document("B").unwrap();

        assert_eq!(app.rename_document("B", "A").unwrap(), "A1");
        assert_eq!(app.active_document().unwrap().name(), "A1");
        assert!(app.get_document("B").is_none());
        assert!(app.rename_document("Missing", "C").is_err());
    }

    #[test]
    fn test_save_and_open_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("part.ron");
        let config = AppConfig {
            author: "Ada".into(),
            ..Default::default()
        };
        let mut app = Application::new(config);
        let doc = app.new_document("Part").unwrap();
        let base = doc.add_object("Part::Box", None).unwrap();
        doc.set_property(base, "Height", 3.0).unwrap();

        app.save_document("Part", &path).unwrap();
        let opened = app.open_document(&path).unwrap();

        assert_eq!(opened.name(), "Part1");
        assert_eq!(opened.properties().text("LastModifiedBy").unwrap(), "Ada");
        let height = opened
            .get_object("Box")
            .unwrap()
            .properties()
            .float("Height")
            .unwrap();
        assert_eq!(height, 3.0);
        assert_eq!(app.documents().len(), 2);
        assert!(app.save_document("Missing", &path).is_err());
    }

    #[derive(Debug)]
    struct Marker;

    impl ObjectBehavior for Marker {
        fn type_name(&self) -> &'static str {
            "Test::Marker"
        }

        fn properties(&self) -> Vec<PropertySpec> {
            vec![PropertySpec::float("Size", 1.0)]
        }

        fn execute(&mut self, _ctx: &mut ExecContext<'_>) -> ExecResult<ExecOutcome> {
            Ok(ExecOutcome::NoChange)
        }
    }

    #[test]
    fn test_register_type_applies_to_new_documents() {
        let mut app = Application::default();
        app.new_document("Before").unwrap();
        app.register_type("Test::Marker", || Box::new(Marker));
        app.new_document("After").unwrap();

        assert!(app.registry().contains("Test::Marker"));
        let before = app.get_document_mut("Before").unwrap();
        assert!(before.add_object("Test::Marker", None).is_err());
        let after = app.get_document_mut("After").unwrap();
        assert!(after.add_object("Test::Marker", None).is_ok());
    }
}
