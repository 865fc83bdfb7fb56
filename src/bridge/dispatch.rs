use std::rc::Rc;

use tracing::{trace, warn};

use super::dom::{AncestorsUntil, DomTree, NodeId};
use super::engine::Engine;
use super::event::BridgeEvent;

/// Forwards an event to every engine-owned node between its target and the
/// delegation root, innermost first.
pub struct BubbleDispatcher {
    root: NodeId,
    engine: Rc<dyn Engine>,
}

impl BubbleDispatcher {
    pub fn new(root: NodeId, engine: Rc<dyn Engine>) -> Self {
        Self { root, engine }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn engine(&self) -> &Rc<dyn Engine> {
        &self.engine
    }

    /// Walk from the target up to (not including) the root, notifying the
    /// engine once per handled node. Returns how many notifications were sent.
    pub fn handle(&self, tree: &dyn DomTree, event: &mut BridgeEvent) -> usize {
        if !tree.contains(self.root, event.target()) {
            trace!(
                target: "bridge",
                event_type = event.event_type(),
                target_node = event.target(),
                "event target outside delegation root"
            );
            return 0;
        }

        let mut notified = 0;
        for node in AncestorsUntil::new(tree, event.target(), self.root) {
            let Some(handle) = self.engine.resolve(node) else {
                continue;
            };

            event.set_handle(Some(handle));
            notified += 1;
            if let Err(err) = self.engine.notify_bubble(handle, event) {
                warn!(
                    target: "bridge",
                    error = %err,
                    event_type = event.event_type(),
                    %handle,
                    "engine failed while handling bubble event"
                );
            }
            if event.is_propagation_stopped() {
                break;
            }
        }
        event.set_handle(None);
        notified
    }
}
