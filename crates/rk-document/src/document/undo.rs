//! Transactions and the undo/redo log
//!
//! Undo applies a transaction's records newest first and turns them into
//! their own inverse, which is pushed onto the opposite stack. Restored
//! values go through the normal change path, so undone edits touch their
//! objects exactly like live edits.

use super::{ChangeRecorder, Document, DocumentError, DocumentEvent, DocumentResult};
use crate::config::{TransactionMode, UndoMode};
use crate::property::ContainerRef;
use crate::transaction::{Transaction, TransactionRecord};

/// Name of a transaction opened without one
const UNNAMED_TRANSACTION: &str = "<empty>";

impl Document {
    // ============== Transactions ==============

    /// Open a transaction and start recording edits.
    ///
    /// Returns the transaction id, or `None` when undo is disabled or a
    /// transaction is already open in strict mode.
    pub fn open_transaction(&mut self, name: Option<&str>) -> Option<u64> {
        if self.config.undo.mode == UndoMode::Disabled {
            tracing::debug!("Undo disabled, not opening a transaction");
            return None;
        }
        if let Some(open) = &self.open_transaction {
            match self.config.transaction_mode {
                TransactionMode::Strict => {
                    tracing::warn!(
                        "Transaction {} is already open, ignoring {}",
                        open.name(),
                        name.unwrap_or(UNNAMED_TRANSACTION)
                    );
                    return None;
                }
                TransactionMode::AutoCommit => {
                    self.commit_transaction().ok()?;
                }
            }
        }

        self.next_transaction_id += 1;
        let id = self.next_transaction_id;
        let name = name.unwrap_or(UNNAMED_TRANSACTION);
        tracing::debug!("Opened transaction {} ({})", id, name);
        self.open_transaction = Some(Transaction::new(id, name));
        Some(id)
    }

    pub fn has_open_transaction(&self) -> bool {
        self.open_transaction.is_some()
    }

    /// Name of the open transaction
    pub fn transaction_name(&self) -> Option<&str> {
        self.open_transaction.as_ref().map(Transaction::name)
    }

    /// Push the open transaction onto the undo stack.
    ///
    /// Empty transactions are dropped and leave the redo stack intact.
    pub fn commit_transaction(&mut self) -> DocumentResult<()> {
        let tx = self
            .open_transaction
            .take()
            .ok_or(DocumentError::NoOpenTransaction)?;
        if tx.is_empty() {
            tracing::debug!("Dropping empty transaction {}", tx.name());
            return Ok(());
        }

        tracing::debug!("Committed transaction {} ({} records)", tx.name(), tx.len());
        self.redo_stack.clear();
        self.undo_stack.push_back(tx);
        self.enforce_undo_limits();
        Ok(())
    }

    /// Roll back every edit of the open transaction and discard it
    pub fn abort_transaction(&mut self) -> DocumentResult<()> {
        let tx = self
            .open_transaction
            .take()
            .ok_or(DocumentError::NoOpenTransaction)?;
        tracing::debug!("Aborting transaction {}", tx.name());
        self.apply_transaction(tx);
        Ok(())
    }

    // ============== Undo / Redo ==============

    /// Undo the most recent transaction, committing an open one first
    pub fn undo(&mut self) -> bool {
        if self.open_transaction.is_some() {
            let _ = self.commit_transaction();
        }
        let Some(tx) = self.undo_stack.pop_back() else {
            return false;
        };
        tracing::debug!("Undo {}", tx.name());
        let inverse = self.apply_transaction(tx);
        self.redo_stack.push_back(inverse);
        true
    }

    /// Redo the most recently undone transaction
    pub fn redo(&mut self) -> bool {
        if self.open_transaction.is_some() {
            tracing::warn!("Cannot redo while a transaction is open");
            return false;
        }
        let Some(tx) = self.redo_stack.pop_back() else {
            return false;
        };
        tracing::debug!("Redo {}", tx.name());
        let inverse = self.apply_transaction(tx);
        self.undo_stack.push_back(inverse);
        self.enforce_undo_limits();
        true
    }

    pub fn available_undos(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn available_redos(&self) -> usize {
        self.redo_stack.len()
    }

    /// Undo step names, most recent first
    pub fn available_undo_names(&self) -> Vec<String> {
        self.undo_stack
            .iter()
            .rev()
            .map(|tx| tx.name().to_string())
            .collect()
    }

    /// Redo step names, most recent first
    pub fn available_redo_names(&self) -> Vec<String> {
        self.redo_stack
            .iter()
            .rev()
            .map(|tx| tx.name().to_string())
            .collect()
    }

    /// Estimated memory held by the undo stack
    pub fn undo_mem_size(&self) -> usize {
        self.undo_stack.iter().map(Transaction::mem_size).sum()
    }

    /// Drop all undo and redo steps
    pub fn clear_undos(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Bound the undo stack's estimated memory (0 = unlimited)
    pub fn set_undo_limit(&mut self, bytes: usize) {
        self.config.undo.memory_limit = bytes;
        self.enforce_undo_limits();
    }

    pub fn undo_limit(&self) -> usize {
        self.config.undo.memory_limit
    }

    /// Bound the number of undo steps (0 = unlimited)
    pub fn set_max_undo_steps(&mut self, steps: usize) {
        self.config.undo.max_steps = steps;
        self.enforce_undo_limits();
    }

    /// Enable or disable undo; disabling drops the whole log
    pub fn set_undo_mode(&mut self, mode: UndoMode) {
        self.config.undo.mode = mode;
        if mode == UndoMode::Disabled {
            self.open_transaction = None;
            self.clear_undos();
        }
    }

    pub fn undo_mode(&self) -> UndoMode {
        self.config.undo.mode
    }

    pub fn set_transaction_mode(&mut self, mode: TransactionMode) {
        self.config.transaction_mode = mode;
    }

    /// Evict the oldest steps while over the step count or memory budget
    fn enforce_undo_limits(&mut self) {
        let max_steps = self.config.undo.max_steps;
        let memory_limit = self.config.undo.memory_limit;

        while !self.undo_stack.is_empty() {
            let too_many = max_steps > 0 && self.undo_stack.len() > max_steps;
            let too_large = memory_limit > 0 && self.undo_mem_size() > memory_limit;
            if !too_many && !too_large {
                break;
            }
            if let Some(evicted) = self.undo_stack.pop_front() {
                tracing::debug!("Evicted undo step {}", evicted.name());
            }
        }
    }

    // ============== Applying records ==============

    /// Revert every record, newest first; returns the inverse transaction
    fn apply_transaction(&mut self, tx: Transaction) -> Transaction {
        let (id, name, mut records) = tx.into_parts();
        let mut inverse = Vec::with_capacity(records.len());
        while let Some(record) = records.pop() {
            if let Some(record) = self.revert_record(record) {
                inverse.push(record);
            }
        }
        Transaction::from_records(id, name, inverse)
    }

    fn revert_record(&mut self, record: TransactionRecord) -> Option<TransactionRecord> {
        match record {
            TransactionRecord::Property {
                owner,
                property,
                value,
            } => {
                let container = match owner {
                    ContainerRef::Document => &mut self.properties,
                    ContainerRef::Object(id) => self.objects.get_mut(&id)?.properties_mut(),
                };
                let mut recorder = ChangeRecorder::new(None);
                let old = match container.replace_value(&property, value, &mut recorder) {
                    Ok(old) => old,
                    Err(e) => {
                        tracing::warn!("Cannot restore {}: {}", property, e);
                        return None;
                    }
                };
                let changes = recorder.into_changes();
                self.process_changes(changes, false);
                Some(TransactionRecord::Property {
                    owner,
                    property,
                    value: old,
                })
            }
            TransactionRecord::ObjectAdded { id } => {
                let (object, position) = self.detach(id)?;
                let name = object.name().to_string();
                self.emit(DocumentEvent::ObjectRemoved { id, name });
                Some(TransactionRecord::ObjectRemoved {
                    object: Box::new(object),
                    position,
                })
            }
            TransactionRecord::ObjectRemoved { object, position } => {
                let mut object = *object;
                let id = object.id();
                let name = object.name().to_string();
                object.mark_touched(None);
                self.attach(object, position);
                self.emit(DocumentEvent::ObjectAdded { id, name });
                Some(TransactionRecord::ObjectAdded { id })
            }
            TransactionRecord::ObjectRenamed { id, name } => {
                let object = self.objects.get_mut(&id)?;
                let current = object.name().to_string();
                object.set_name(name.clone());
                self.emit(DocumentEvent::ObjectRenamed {
                    id,
                    old_name: current.clone(),
                    new_name: name,
                });
                Some(TransactionRecord::ObjectRenamed { id, name: current })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DocumentConfig;
    use crate::property::PropertyValue;
    use crate::registry::TypeRegistry;
    use std::rc::Rc;

    fn length(doc: &Document, name: &str) -> f64 {
        doc.get_object(name)
            .unwrap()
            .properties()
            .float("Length")
            .unwrap()
    }

    #[test]
    fn test_undo_redo_property() {
        let mut doc = Document::new("Unnamed");
        let id = doc.add_object("Part::Box", None).unwrap();
        doc.recompute();

        doc.open_transaction(Some("Resize"));
        doc.set_property(id, "Length", 20.0).unwrap();
        doc.set_property(id, "Length", 30.0).unwrap();
        doc.commit_transaction().unwrap();
        doc.recompute();

        assert_eq!(doc.available_undo_names(), vec!["Resize"]);
        assert!(doc.undo());
        assert_eq!(length(&doc, "Box"), 10.0);
        assert!(doc.object(id).unwrap().is_touched());
        assert_eq!(doc.available_redos(), 1);

        assert!(doc.redo());
        assert_eq!(length(&doc, "Box"), 30.0);
        assert!(!doc.redo());
    }

    #[test]
    fn test_undo_add_and_remove() {
        let mut doc = Document::new("Unnamed");
        doc.open_transaction(Some("Create"));
        let base = doc.add_object("Part::Box", None).unwrap();
        let fillet = doc.add_object("Part::Fillet", None).unwrap();
        doc.set_property(fillet, "Base", base).unwrap();
        doc.commit_transaction().unwrap();

        doc.open_transaction(Some("Delete"));
        doc.remove_object("Box").unwrap();
        doc.commit_transaction().unwrap();
        assert!(doc.get_object("Box").is_none());

        assert!(doc.undo());
        assert_eq!(doc.objects(), vec![base, fillet]);
        assert_eq!(
            doc.object(fillet).unwrap().value("Base"),
            Some(&PropertyValue::Link(Some(base)))
        );

        assert!(doc.undo());
        assert_eq!(doc.object_count(), 0);

        assert!(doc.redo());
        assert_eq!(doc.objects(), vec![base, fillet]);
        assert_eq!(doc.dependencies_of(fillet), vec![base]);
    }

    #[test]
    fn test_undo_rename() {
        let mut doc = Document::new("Unnamed");
        let id = doc.add_object("Part::Box", None).unwrap();

        doc.open_transaction(Some("Rename"));
        doc.rename_object(id, "Plate").unwrap();
        doc.commit_transaction().unwrap();

        assert!(doc.undo());
        assert_eq!(doc.object(id).unwrap().name(), "Box");
        assert!(doc.redo());
        assert_eq!(doc.object(id).unwrap().name(), "Plate");
    }

    #[test]
    fn test_strict_mode_refuses_nesting() {
        let mut doc = Document::new("Unnamed");
        assert!(doc.open_transaction(Some("Outer")).is_some());
        assert!(doc.open_transaction(Some("Inner")).is_none());
        assert_eq!(doc.transaction_name(), Some("Outer"));
    }

    #[test]
    fn test_auto_commit_mode() {
        let mut doc = Document::new("Unnamed");
        doc.set_transaction_mode(TransactionMode::AutoCommit);
        let id = doc.add_object("Part::Box", None).unwrap();

        doc.open_transaction(Some("First"));
        doc.set_property(id, "Width", 1.0).unwrap();
        doc.open_transaction(Some("Second"));
        doc.set_property(id, "Width", 2.0).unwrap();
        doc.commit_transaction().unwrap();

        assert_eq!(doc.available_undo_names(), vec!["Second", "First"]);
    }

    #[test]
    fn test_commit_without_transaction_is_an_error() {
        let mut doc = Document::new("Unnamed");
        assert!(matches!(
            doc.commit_transaction(),
            Err(DocumentError::NoOpenTransaction)
        ));
        assert!(matches!(
            doc.abort_transaction(),
            Err(DocumentError::NoOpenTransaction)
        ));
    }

    #[test]
    fn test_empty_transaction_keeps_redo() {
        let mut doc = Document::new("Unnamed");
        let id = doc.add_object("Part::Box", None).unwrap();
        doc.open_transaction(Some("Edit"));
        doc.set_property(id, "Height", 3.0).unwrap();
        doc.commit_transaction().unwrap();
        doc.undo();

        doc.open_transaction(Some("Nothing"));
        doc.commit_transaction().unwrap();

        assert_eq!(doc.available_undos(), 0);
        assert_eq!(doc.available_redos(), 1);
    }

    #[test]
    fn test_undo_commits_open_transaction() {
        let mut doc = Document::new("Unnamed");
        let id = doc.add_object("Part::Box", None).unwrap();
        doc.open_transaction(Some("Edit"));
        doc.set_property(id, "Height", 3.0).unwrap();

        assert!(doc.undo());
        assert!(!doc.has_open_transaction());
        assert_eq!(length(&doc, "Box"), 10.0);
        assert_eq!(
            doc.object(id).unwrap().properties().float("Height").unwrap(),
            10.0
        );
    }

    #[test]
    fn test_max_steps_and_disabled_mode() {
        let mut config = DocumentConfig::default();
        config.undo.max_steps = 2;
        let mut doc = Document::with_registry(
            "Unnamed",
            Rc::new(TypeRegistry::with_builtin_types()),
            config,
        );
        let id = doc.add_object("Part::Box", None).unwrap();
        for i in 1..=4 {
            doc.open_transaction(Some(&format!("Step {}", i)));
            doc.set_property(id, "Length", i as f64).unwrap();
            doc.commit_transaction().unwrap();
        }
        assert_eq!(doc.available_undo_names(), vec!["Step 4", "Step 3"]);

        doc.set_undo_mode(UndoMode::Disabled);
        assert_eq!(doc.available_undos(), 0);
        assert!(doc.open_transaction(None).is_none());
    }
}
