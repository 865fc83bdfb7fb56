//! Delegated DOM event bridge into an embedded engine.
//!
//! One listener per configured event type is registered on the delegation
//! root. Ordinary events walk the ancestor chain and notify every engine-owned
//! node; focus transitions go through a FIFO queue so that the engine's focused
//! set is rebuilt in arrival order even when focus changes re-entrantly.

pub mod config;
pub mod dispatch;
pub mod dom;
pub mod engine;
pub mod error;
pub mod event;
pub mod focus;
pub mod handle;
pub mod listeners;
pub mod passive;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{debug, info};

pub use config::{BridgeConfig, ConfigError, DEFAULT_EVENTS};
pub use dispatch::BubbleDispatcher;
pub use dom::{DomTree, NodeId};
pub use engine::{Capability, Engine};
pub use error::BridgeError;
pub use event::{BridgeEvent, FOCUS_IN, FOCUS_OUT};
pub use focus::{FocusCoordinator, FocusKind};
pub use handle::{Handle, HandleResolver, HandleTable};
pub use listeners::{Listener, ListenerOptions, ListenerRegistry};
pub use passive::PassivePolicy;

struct RegisteredListener {
    event_type: String,
    listener: Listener,
    passive: bool,
}

/// A running bridge: the listener set on the delegation root plus the engine.
///
/// [`EventBridge::destroy`] is the only teardown path; dropping the value
/// leaves the listeners registered.
pub struct EventBridge {
    root: NodeId,
    engine: Rc<dyn Engine>,
    focus: Rc<FocusCoordinator>,
    registry: Rc<ListenerRegistry>,
    registered: RefCell<Vec<RegisteredListener>>,
    destroyed: Cell<bool>,
    namespace: Option<String>,
    debug: bool,
}

impl std::fmt::Debug for EventBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBridge")
            .field("root", &self.root)
            .field("destroyed", &self.destroyed)
            .field("namespace", &self.namespace)
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}

macro_rules! progress {
    ($debug:expr, $($arg:tt)+) => {
        if $debug {
            info!(target: "bridge", $($arg)+);
        } else {
            debug!(target: "bridge", $($arg)+);
        }
    };
}

impl EventBridge {
    /// Validate the page and engine, register listeners on the container, and
    /// start the engine at the mount point.
    pub fn start(
        config: &BridgeConfig,
        tree: &dyn DomTree,
        registry: Rc<ListenerRegistry>,
        engine: Rc<dyn Engine>,
    ) -> Result<Self, BridgeError> {
        config.validate()?;

        let root = tree
            .element_by_html_id(&config.container_id)
            .ok_or_else(|| BridgeError::MissingContainer(config.container_id.clone()))?;

        let mount_id = config.mount_id();
        if mount_id != config.container_id && tree.element_by_html_id(mount_id).is_none() {
            return Err(BridgeError::MissingMount(mount_id.to_string()));
        }

        if let Some(missing) = Capability::REQUIRED
            .into_iter()
            .find(|capability| !engine.has_capability(*capability))
        {
            return Err(BridgeError::MissingCapability(missing));
        }

        progress!(
            config.debug,
            container = %config.container_id,
            mount = %mount_id,
            "starting event bridge"
        );

        let namespace = engine.namespace();
        if let Some(namespace) = &namespace {
            progress!(config.debug, %namespace, "engine namespace");
        }

        let dispatcher = Rc::new(BubbleDispatcher::new(root, Rc::clone(&engine)));
        let focus = Rc::new(FocusCoordinator::new(Rc::clone(&dispatcher)));
        let bridge = Self {
            root,
            engine,
            focus,
            registry,
            registered: RefCell::new(Vec::new()),
            destroyed: Cell::new(false),
            namespace,
            debug: config.debug,
        };

        bridge.attach_listeners(config, dispatcher);

        if let Err(err) = bridge.engine.start(mount_id) {
            bridge.destroy();
            return Err(BridgeError::Startup(err));
        }

        progress!(config.debug, "engine mounted");
        Ok(bridge)
    }

    fn attach_listeners(&self, config: &BridgeConfig, dispatcher: Rc<BubbleDispatcher>) {
        let policy = config.passive_policy();

        let generic: Listener = Rc::new(move |tree: &dyn DomTree, event: &mut BridgeEvent| {
            dispatcher.handle(tree, event);
        });
        let focus_in = self.focus_listener(FocusKind::In);
        let focus_out = self.focus_listener(FocusKind::Out);

        let mut registered = self.registered.borrow_mut();
        for event_type in config.unique_events() {
            let listener = match event_type {
                FOCUS_IN => Rc::clone(&focus_in),
                FOCUS_OUT => Rc::clone(&focus_out),
                _ => Rc::clone(&generic),
            };
            let passive = policy.is_passive(event_type);
            self.registry.add_event_listener(
                self.root,
                event_type,
                &listener,
                ListenerOptions { passive },
            );
            registered.push(RegisteredListener {
                event_type: event_type.to_string(),
                listener,
                passive,
            });
        }

        progress!(
            self.debug,
            count = registered.len(),
            container = %config.container_id,
            "attached event listeners"
        );
    }

    fn focus_listener(&self, kind: FocusKind) -> Listener {
        let focus = Rc::clone(&self.focus);
        Rc::new(move |tree: &dyn DomTree, event: &mut BridgeEvent| {
            focus.handle(tree, kind, event);
        })
    }

    pub fn engine(&self) -> Rc<dyn Engine> {
        Rc::clone(&self.engine)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Event types currently registered, with their passive flag.
    pub fn registered_events(&self) -> Vec<(String, bool)> {
        self.registered
            .borrow()
            .iter()
            .map(|entry| (entry.event_type.clone(), entry.passive))
            .collect()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    pub fn focus_coordinator(&self) -> &FocusCoordinator {
        &self.focus
    }

    /// Remove every listener this bridge registered. Safe to call twice.
    pub fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        let registered = std::mem::take(&mut *self.registered.borrow_mut());
        progress!(self.debug, count = registered.len(), "destroying event bridge");
        for entry in registered {
            self.registry
                .remove_event_listener(self.root, &entry.event_type, &entry.listener);
        }
    }
}
