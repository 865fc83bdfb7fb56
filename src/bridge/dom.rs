use blitz_dom::BaseDocument;

/// Node identity as used by `blitz-dom`.
pub type NodeId = usize;

/// Read-only view of a document tree, enough to walk ancestor chains.
pub trait DomTree {
    fn parent_of(&self, node: NodeId) -> Option<NodeId>;

    fn element_by_html_id(&self, id: &str) -> Option<NodeId>;

    /// Inclusive containment: a node contains itself.
    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent_of(id);
        }
        false
    }
}

impl DomTree for BaseDocument {
    fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.get_node(node).and_then(|node| node.parent)
    }

    fn element_by_html_id(&self, id: &str) -> Option<NodeId> {
        if id.is_empty() {
            return None;
        }
        self.query_selector(&format!("#{id}")).ok().flatten()
    }
}

/// Iterator over `start` and its ancestors, stopping before `root`.
///
/// Walks off the top of the tree quietly when `root` is not an ancestor, so
/// callers that need containment must check it first.
pub struct AncestorsUntil<'a> {
    tree: &'a dyn DomTree,
    next: Option<NodeId>,
    root: NodeId,
}

impl<'a> AncestorsUntil<'a> {
    pub fn new(tree: &'a dyn DomTree, start: NodeId, root: NodeId) -> Self {
        Self {
            tree,
            next: Some(start),
            root,
        }
    }
}

impl Iterator for AncestorsUntil<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        if current == self.root {
            self.next = None;
            return None;
        }
        self.next = self.tree.parent_of(current);
        Some(current)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::ParentMap;
    use super::*;

    #[test]
    fn ancestors_stop_before_root() {
        let tree = ParentMap::with_chain(&[(1, "doc"), (2, "root"), (3, "a"), (4, "b")]);
        let walked: Vec<_> = AncestorsUntil::new(&tree, 4, 2).collect();
        assert_eq!(walked, vec![4, 3]);
    }

    #[test]
    fn walk_from_root_is_empty() {
        let tree = ParentMap::with_chain(&[(1, "doc"), (2, "root")]);
        assert_eq!(AncestorsUntil::new(&tree, 2, 2).count(), 0);
    }

    #[test]
    fn containment_is_inclusive() {
        let tree = ParentMap::with_chain(&[(1, "doc"), (2, "root"), (3, "a")]);
        assert!(tree.contains(2, 2));
        assert!(tree.contains(2, 3));
        assert!(!tree.contains(3, 2));
        assert!(!tree.contains(2, 99));
    }
}
