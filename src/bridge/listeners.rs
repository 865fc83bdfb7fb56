use std::cell::RefCell;
use std::rc::Rc;

use super::dom::{DomTree, NodeId};
use super::event::BridgeEvent;

/// Callback registered on a node for one event type.
pub type Listener = Rc<dyn Fn(&dyn DomTree, &mut BridgeEvent)>;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ListenerOptions {
    /// The listener promises not to call `prevent_default`.
    pub passive: bool,
}

struct Registration {
    node: NodeId,
    event_type: String,
    listener: Listener,
    options: ListenerOptions,
}

/// Per-document listener storage and native bubbling dispatch.
///
/// Listeners may register, remove, or dispatch re-entrantly: dispatch works on
/// a snapshot of each node's listeners and never holds a borrow while calling out.
#[derive(Default)]
pub struct ListenerRegistry {
    registrations: RefCell<Vec<Registration>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the same listener is already registered for the
    /// node and event type.
    pub fn add_event_listener(
        &self,
        node: NodeId,
        event_type: &str,
        listener: &Listener,
        options: ListenerOptions,
    ) -> bool {
        let mut registrations = self.registrations.borrow_mut();
        let duplicate = registrations.iter().any(|entry| {
            entry.node == node
                && entry.event_type == event_type
                && Rc::ptr_eq(&entry.listener, listener)
        });
        if duplicate {
            return false;
        }
        registrations.push(Registration {
            node,
            event_type: event_type.to_string(),
            listener: Rc::clone(listener),
            options,
        });
        true
    }

    pub fn remove_event_listener(
        &self,
        node: NodeId,
        event_type: &str,
        listener: &Listener,
    ) -> bool {
        let mut registrations = self.registrations.borrow_mut();
        let before = registrations.len();
        registrations.retain(|entry| {
            !(entry.node == node
                && entry.event_type == event_type
                && Rc::ptr_eq(&entry.listener, listener))
        });
        registrations.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.registrations.borrow().len()
    }

    pub fn listeners_on(&self, node: NodeId) -> usize {
        self.registrations
            .borrow()
            .iter()
            .filter(|entry| entry.node == node)
            .count()
    }

    pub fn is_passive(&self, node: NodeId, event_type: &str) -> Option<bool> {
        self.registrations
            .borrow()
            .iter()
            .find(|entry| entry.node == node && entry.event_type == event_type)
            .map(|entry| entry.options.passive)
    }

    /// Deliver `event` to the target and, for bubbling events, each ancestor in
    /// turn until propagation is stopped.
    pub fn dispatch(&self, tree: &dyn DomTree, event: &mut BridgeEvent) {
        let path: Vec<NodeId> = if event.bubbles() {
            std::iter::successors(Some(event.target()), |node| tree.parent_of(*node)).collect()
        } else {
            vec![event.target()]
        };

        for node in path {
            for (listener, options) in self.snapshot(node, event.event_type()) {
                event.enter_listener(node, options.passive);
                listener(tree, event);
            }
            if event.is_propagation_stopped() {
                break;
            }
        }
        event.leave_listeners();
    }

    fn snapshot(&self, node: NodeId, event_type: &str) -> Vec<(Listener, ListenerOptions)> {
        self.registrations
            .borrow()
            .iter()
            .filter(|entry| entry.node == node && entry.event_type == event_type)
            .map(|entry| (Rc::clone(&entry.listener), entry.options))
            .collect()
    }
}
