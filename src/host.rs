use std::cell::{Cell, RefCell};
use std::rc::Rc;

use blitz_dom::{BaseDocument, DocumentConfig};
use blitz_html::HtmlDocument;
use blitz_traits::events::DomEvent;
use tracing::{error, warn};

use crate::bridge::{
    BridgeConfig, BridgeError, BridgeEvent, DomTree, Engine, EventBridge, ListenerRegistry, NodeId,
};
use crate::console::LogConsole;
use crate::js::ScriptEngine;
use crate::overlay::render_error_overlay;

/// A parsed page with its listener registry and focus state.
///
/// Every method takes `&self` so listeners and engines may call back into the
/// page while an event is being dispatched.
pub struct HostDocument {
    document: RefCell<HtmlDocument>,
    listeners: Rc<ListenerRegistry>,
    active: Cell<Option<NodeId>>,
}

impl HostDocument {
    pub fn from_html(html: &str) -> Self {
        Self::new(HtmlDocument::from_html(html, DocumentConfig::default()))
    }

    pub fn new(document: HtmlDocument) -> Self {
        Self {
            document: RefCell::new(document),
            listeners: Rc::new(ListenerRegistry::new()),
            active: Cell::new(None),
        }
    }

    pub fn listeners(&self) -> Rc<ListenerRegistry> {
        Rc::clone(&self.listeners)
    }

    pub fn with_tree<T>(&self, f: impl FnOnce(&dyn DomTree) -> T) -> T {
        let document = self.document.borrow();
        let base: &BaseDocument = &document;
        f(base)
    }

    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.with_tree(|tree| tree.element_by_html_id(id))
    }

    pub fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.with_tree(|tree| tree.parent_of(node))
    }

    pub fn text_content(&self, node: NodeId) -> Option<String> {
        let document = self.document.borrow();
        document.get_node(node).map(|node| node.text_content())
    }

    pub fn dispatch(&self, event: &mut BridgeEvent) {
        self.with_tree(|tree| self.listeners.dispatch(tree, event));
    }

    /// Convert a shell UI event and deliver it; returns the record so callers
    /// can inspect cancellation and default-prevented state.
    pub fn dispatch_ui_event(&self, event: &DomEvent) -> BridgeEvent {
        let mut record = BridgeEvent::from(event);
        self.dispatch(&mut record);
        record
    }

    pub fn active_element(&self) -> Option<NodeId> {
        self.active.get()
    }

    /// Move focus the way a browser does: `blur` and `focusout` on the element
    /// losing focus, then `focus` and `focusin` on the one gaining it.
    pub fn focus(&self, next: Option<NodeId>) {
        let previous = self.active.get();
        if previous == next {
            return;
        }
        self.active.set(next);

        if let Some(node) = previous {
            self.dispatch(&mut focus_change_event("blur", node, next));
            self.dispatch(&mut BridgeEvent::focus_out(node, next));
        }

        if let Some(node) = next {
            // A focusout listener may already have moved focus elsewhere.
            if self.active.get() != Some(node) {
                return;
            }
            self.dispatch(&mut focus_change_event("focus", node, previous));
            self.dispatch(&mut BridgeEvent::focus_in(node, previous));
        }
    }

    pub fn blur(&self) {
        self.focus(None);
    }

    /// Start a bridge on this page. Engine failures are also reported inside
    /// the page, in the mount element or else the container.
    pub fn start_bridge(
        &self,
        config: &BridgeConfig,
        engine: Rc<dyn Engine>,
    ) -> Result<EventBridge, BridgeError> {
        let result = self.with_tree(|tree| {
            EventBridge::start(config, tree, Rc::clone(&self.listeners), engine)
        });

        if let Err(err) = &result {
            error!(target: "bridge", error = %err, "failed to start event bridge");
            if err.is_engine_failure() {
                self.show_error_overlay(config, &err.to_string());
            }
        }
        result
    }

    /// Load an engine script and start a bridge on it. A script that fails to
    /// evaluate is reported in the page like any other engine failure.
    pub fn start_script_bridge(
        &self,
        config: &BridgeConfig,
        source: &str,
        filename: &str,
        console: Rc<RefCell<LogConsole>>,
    ) -> Result<EventBridge, BridgeError> {
        let engine = match ScriptEngine::load(source, filename, config, console) {
            Ok(engine) => engine,
            Err(err) => {
                let err = BridgeError::EngineLoad(err);
                error!(target: "bridge", error = %err, filename, "failed to load engine script");
                self.show_error_overlay(config, &err.to_string());
                return Err(err);
            }
        };
        self.start_bridge(config, Rc::new(engine))
    }

    fn show_error_overlay(&self, config: &BridgeConfig, message: &str) {
        let target = self
            .element_by_id(config.mount_id())
            .or_else(|| self.element_by_id(&config.container_id));
        let Some(node) = target else {
            warn!(target: "bridge", "no element available for the error overlay");
            return;
        };

        let mut document = self.document.borrow_mut();
        let base: &mut BaseDocument = &mut document;
        if let Err(err) = render_error_overlay(base, node, message) {
            error!(target: "bridge", error = %err, "could not render error overlay");
        }
    }
}

fn focus_change_event(event_type: &str, target: NodeId, related: Option<NodeId>) -> BridgeEvent {
    BridgeEvent::new(event_type, target)
        .with_related_target(related)
        .with_bubbles(false)
        .with_cancelable(false)
}
