//! Document events
//!
//! Events are dispatched synchronously, in the order the document raises
//! them. Listeners run by ascending priority, then by subscription order.

use std::fmt;

use crate::object::ObjectId;

/// Something that happened to a document
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentEvent {
    ObjectAdded { id: ObjectId, name: String },
    ObjectRemoved { id: ObjectId, name: String },
    ObjectChanged { id: ObjectId, property: String },
    ObjectRenamed {
        id: ObjectId,
        old_name: String,
        new_name: String,
    },
    ObjectActivated { id: ObjectId },
    DocumentChanged { property: String },
    DocumentWillSave,
    DocumentRestored,
}

impl DocumentEvent {
    /// Stable event name
    pub fn kind(&self) -> &'static str {
        match self {
            DocumentEvent::ObjectAdded { .. } => "object_added",
            DocumentEvent::ObjectRemoved { .. } => "object_removed",
            DocumentEvent::ObjectChanged { .. } => "object_changed",
            DocumentEvent::ObjectRenamed { .. } => "object_renamed",
            DocumentEvent::ObjectActivated { .. } => "object_activated",
            DocumentEvent::DocumentChanged { .. } => "document_changed",
            DocumentEvent::DocumentWillSave => "document_will_save",
            DocumentEvent::DocumentRestored => "document_restored",
        }
    }
}

/// Receiver of document events
pub trait DocumentObserver {
    fn on_event(&mut self, event: &DocumentEvent);
}

impl<F> DocumentObserver for F
where
    F: FnMut(&DocumentEvent),
{
    fn on_event(&mut self, event: &DocumentEvent) {
        self(event)
    }
}

/// Handle returned by `subscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Listener {
    id: ListenerId,
    priority: i32,
    observer: Box<dyn DocumentObserver>,
}

/// Ordered list of listeners
#[derive(Default)]
pub(crate) struct EventDispatcher {
    listeners: Vec<Listener>,
    next_id: u64,
}

impl EventDispatcher {
    pub fn subscribe(&mut self, priority: i32, observer: Box<dyn DocumentObserver>) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        // Stable position: after every listener with the same or lower priority
        let position = self
            .listeners
            .iter()
            .position(|l| l.priority > priority)
            .unwrap_or(self.listeners.len());
        self.listeners.insert(
            position,
            Listener {
                id,
                priority,
                observer,
            },
        );
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        self.listeners.len() != before
    }

    pub fn dispatch(&mut self, event: &DocumentEvent) {
        tracing::trace!("Event {}", event.kind());
        for listener in &mut self.listeners {
            listener.observer.on_event(event);
        }
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_priority_then_subscription_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut dispatcher = EventDispatcher::default();

        for (tag, priority) in [("late", 10), ("first", 0), ("second", 0)] {
            let seen = Rc::clone(&seen);
            dispatcher.subscribe(
                priority,
                Box::new(move |_: &DocumentEvent| seen.borrow_mut().push(tag)),
            );
        }

        dispatcher.dispatch(&DocumentEvent::DocumentWillSave);
        assert_eq!(*seen.borrow(), vec!["first", "second", "late"]);
    }

    #[test]
    fn test_unsubscribe() {
        let count = Rc::new(RefCell::new(0));
        let mut dispatcher = EventDispatcher::default();
        let counter = Rc::clone(&count);
        let id = dispatcher.subscribe(
            0,
            Box::new(move |_: &DocumentEvent| *counter.borrow_mut() += 1),
        );

        dispatcher.dispatch(&DocumentEvent::DocumentRestored);
        assert!(dispatcher.unsubscribe(id));
        assert!(!dispatcher.unsubscribe(id));
        dispatcher.dispatch(&DocumentEvent::DocumentRestored);

        assert_eq!(*count.borrow(), 1);
        assert!(dispatcher.listeners.is_empty());
    }
}
