use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

use super::dom::NodeId;

/// Opaque engine-side identity of a DOM node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(pub u64);

impl Handle {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub trait HandleResolver {
    /// Handle attached to `node`, if the engine wants notifications for it.
    fn resolve(&self, node: NodeId) -> Option<Handle>;
}

/// Side-table from node identity to engine handle.
///
/// Owned by the engine; the bridge only ever reads it through [`HandleResolver`].
#[derive(Debug, Default)]
pub struct HandleTable {
    entries: RefCell<HashMap<NodeId, Handle>>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle previously attached to `node`, if any.
    pub fn attach(&self, node: NodeId, handle: Handle) -> Option<Handle> {
        self.entries.borrow_mut().insert(node, handle)
    }

    pub fn detach(&self, node: NodeId) -> Option<Handle> {
        self.entries.borrow_mut().remove(&node)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl HandleResolver for HandleTable {
    fn resolve(&self, node: NodeId) -> Option<Handle> {
        self.entries.borrow().get(&node).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unhandled_nodes_resolve_to_none() {
        let table = HandleTable::new();
        assert_eq!(table.resolve(7), None);
    }

    #[test]
    fn attach_replaces_and_detach_forgets() {
        let table = HandleTable::new();
        assert_eq!(table.attach(3, Handle(10)), None);
        assert_eq!(table.attach(3, Handle(11)), Some(Handle(10)));
        assert_eq!(table.resolve(3), Some(Handle(11)));
        assert_eq!(table.detach(3), Some(Handle(11)));
        assert!(table.is_empty());
    }
}
