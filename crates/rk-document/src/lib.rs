//! Parametric Document Object Graph
//!
//! This crate provides:
//! - Typed, observable properties grouped in property containers
//! - Document objects linked into a dependency graph
//! - Dependency-ordered recompute with touch propagation and cycle detection
//! - Transactional undo/redo with a memory budget
//! - RON persistence and an application context holding open documents

pub mod application;
pub mod config;
pub mod container;
pub mod document;
pub mod features;
pub mod object;
pub mod persistence;
pub mod property;
pub mod registry;
pub mod transaction;

// Re-exports for convenience
pub use application::{Application, ApplicationError, ApplicationResult};
pub use config::{AppConfig, DocumentConfig, NamePolicy, TransactionMode, UndoConfig, UndoMode};
pub use container::PropertyContainer;
pub use document::{
    DependencyGraph, Document, DocumentError, DocumentEvent, DocumentObserver, DocumentResult,
    ListenerId, RecomputeReport,
};
pub use object::{
    DocumentObject, ExecContext, ExecError, ExecOutcome, ExecResult, ExecReturn, ExecuteState,
    ObjectBehavior, ObjectId, ObjectStatus, RecomputeFailure,
};
pub use persistence::{DocumentFile, DocumentReader, DocumentWriter, PersistenceError};
pub use property::{
    ContainerRef, Property, PropertyConstraint, PropertyError, PropertyFlags, PropertyObserver,
    PropertyResult, PropertySpec, PropertyType, PropertyValue,
};
pub use registry::{BehaviorConstructor, TypeRegistry};
pub use transaction::{Transaction, TransactionRecord};
