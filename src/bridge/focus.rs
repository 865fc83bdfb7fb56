use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::{trace, warn};

use super::dispatch::BubbleDispatcher;
use super::dom::{AncestorsUntil, DomTree};
use super::engine::Engine;
use super::event::BridgeEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusKind {
    In,
    Out,
}

#[derive(Debug, Clone)]
struct FocusTransition {
    kind: FocusKind,
    event: BridgeEvent,
}

/// Keeps the engine's focused-handle set in step with DOM focus.
///
/// Focus events can be raised synchronously while an earlier one is still being
/// applied (the engine moves focus from inside a handler). Every transition is
/// queued and a single drain applies them in arrival order; a nested arrival only
/// enqueues and returns.
pub struct FocusCoordinator {
    dispatcher: Rc<BubbleDispatcher>,
    pending: RefCell<VecDeque<FocusTransition>>,
    draining: Cell<bool>,
}

struct DrainGuard<'a>(&'a Cell<bool>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl FocusCoordinator {
    pub fn new(dispatcher: Rc<BubbleDispatcher>) -> Self {
        Self {
            dispatcher,
            pending: RefCell::new(VecDeque::new()),
            draining: Cell::new(false),
        }
    }

    pub fn is_draining(&self) -> bool {
        self.draining.get()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn handle(&self, tree: &dyn DomTree, kind: FocusKind, event: &mut BridgeEvent) {
        self.pending.borrow_mut().push_back(FocusTransition {
            kind,
            event: event.clone(),
        });

        if self.draining.get() {
            trace!(
                target: "focus",
                ?kind,
                target_node = event.target(),
                "queued focus transition behind active drain"
            );
            return;
        }

        self.draining.set(true);
        let _guard = DrainGuard(&self.draining);

        // The queue is empty between drains, so the head is this caller's own
        // transition; apply it to the caller's record so flags reach the host.
        let mut own = true;
        loop {
            let next = self.pending.borrow_mut().pop_front();
            let Some(mut transition) = next else {
                break;
            };
            if own {
                own = false;
                self.apply(tree, transition.kind, event);
            } else {
                self.apply(tree, transition.kind, &mut transition.event);
            }
        }
    }

    fn apply(&self, tree: &dyn DomTree, kind: FocusKind, event: &mut BridgeEvent) {
        match kind {
            FocusKind::In => self.process_focus_in(tree, event),
            FocusKind::Out => self.process_focus_out(tree, event),
        }
    }

    fn process_focus_in(&self, tree: &dyn DomTree, event: &mut BridgeEvent) {
        let engine = self.dispatcher.engine();
        let root = self.dispatcher.root();
        if !tree.contains(root, event.target()) {
            return;
        }

        if let Err(err) = engine.clear_focused_set() {
            warn!(target: "focus", error = %err, "engine failed to clear focused set on focusin");
        }

        for node in AncestorsUntil::new(tree, event.target(), root) {
            let Some(handle) = engine.resolve(node) else {
                continue;
            };
            if let Err(err) = engine.mark_focused(handle) {
                warn!(target: "focus", error = %err, %handle, "engine failed to register focused node");
            }
        }

        self.dispatcher.handle(tree, event);
    }

    fn process_focus_out(&self, tree: &dyn DomTree, event: &BridgeEvent) {
        let root = self.dispatcher.root();
        if let Some(related) = event.related_target() {
            if tree.contains(root, related) {
                trace!(target: "focus", related, "focus moved within delegation root");
                return;
            }
        }

        if let Err(err) = self.dispatcher.engine().clear_focused_set() {
            warn!(target: "focus", error = %err, "engine failed to clear focused set on focusout");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;
    use crate::bridge::dom::test_support::ParentMap;
    use crate::bridge::dom::NodeId;
    use crate::bridge::handle::{Handle, HandleResolver, HandleTable};

    /// Records calls; the first `mark_focused` moves focus from `refocus.0` to
    /// `refocus.1` while the coordinator is still draining.
    struct RefocusingEngine {
        handles: HandleTable,
        calls: RefCell<Vec<String>>,
        tree: Rc<ParentMap>,
        coordinator: RefCell<Option<Rc<FocusCoordinator>>>,
        refocus: Cell<Option<(NodeId, NodeId)>>,
    }

    impl HandleResolver for RefocusingEngine {
        fn resolve(&self, node: NodeId) -> Option<Handle> {
            self.handles.resolve(node)
        }
    }

    impl Engine for RefocusingEngine {
        fn notify_bubble(&self, handle: Handle, event: &mut BridgeEvent) -> anyhow::Result<()> {
            self.calls
                .borrow_mut()
                .push(format!("bubble:{}:{}", handle.value(), event.event_type()));
            Ok(())
        }

        fn clear_focused_set(&self) -> anyhow::Result<()> {
            self.calls.borrow_mut().push("clear".into());
            Ok(())
        }

        fn mark_focused(&self, handle: Handle) -> anyhow::Result<()> {
            self.calls
                .borrow_mut()
                .push(format!("mark:{}", handle.value()));
            if let Some((from, to)) = self.refocus.take() {
                let coordinator = self.coordinator.borrow().clone();
                if let Some(coordinator) = coordinator {
                    let tree: &dyn DomTree = &*self.tree;
                    let mut out = BridgeEvent::focus_out(from, Some(to));
                    coordinator.handle(tree, FocusKind::Out, &mut out);
                    let mut into = BridgeEvent::focus_in(to, Some(from));
                    coordinator.handle(tree, FocusKind::In, &mut into);
                    assert_eq!(coordinator.pending_len(), 2);
                }
            }
            Ok(())
        }

        fn start(&self, _mount_id: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn setup() -> (Rc<RefocusingEngine>, Rc<FocusCoordinator>) {
        let mut tree = ParentMap::with_chain(&[(1, "doc"), (2, "root"), (3, "a")]);
        tree.insert(4, 2, "b");
        let engine = Rc::new(RefocusingEngine {
            handles: HandleTable::new(),
            calls: RefCell::new(Vec::new()),
            tree: Rc::new(tree),
            coordinator: RefCell::new(None),
            refocus: Cell::new(None),
        });
        engine.handles.attach(3, Handle(10));
        engine.handles.attach(4, Handle(20));
        let dispatcher = Rc::new(BubbleDispatcher::new(2, engine.clone()));
        let coordinator = Rc::new(FocusCoordinator::new(dispatcher));
        *engine.coordinator.borrow_mut() = Some(Rc::clone(&coordinator));
        (engine, coordinator)
    }

    #[test]
    fn nested_transitions_run_after_the_current_one() {
        let (engine, coordinator) = setup();
        engine.refocus.set(Some((3, 4)));

        let tree = Rc::clone(&engine.tree);
        let mut event = BridgeEvent::focus_in(3, None);
        coordinator.handle(&*tree, FocusKind::In, &mut event);

        assert_eq!(
            *engine.calls.borrow(),
            vec!["clear", "mark:10", "bubble:10:focusin", "clear", "mark:20", "bubble:20:focusin"]
        );
        assert!(!coordinator.is_draining());
        assert_eq!(coordinator.pending_len(), 0);
    }

    #[test]
    fn focus_leaving_the_root_clears_once() {
        let (engine, coordinator) = setup();
        let tree = Rc::clone(&engine.tree);

        let mut within = BridgeEvent::focus_out(3, Some(4));
        coordinator.handle(&*tree, FocusKind::Out, &mut within);
        assert!(engine.calls.borrow().is_empty());

        let mut away = BridgeEvent::focus_out(3, None);
        coordinator.handle(&*tree, FocusKind::Out, &mut away);
        assert_eq!(*engine.calls.borrow(), vec!["clear"]);
    }

    #[test]
    fn focus_outside_the_root_is_ignored() {
        let (engine, coordinator) = setup();
        let tree = Rc::clone(&engine.tree);
        coordinator.handle(&*tree, FocusKind::In, &mut BridgeEvent::focus_in(1, None));
        assert!(engine.calls.borrow().is_empty());
    }
}
