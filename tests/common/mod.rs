#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use anyhow::{anyhow, Result};
use event_bridge::bridge::{
    BridgeEvent, Capability, Engine, Handle, HandleResolver, HandleTable, NodeId,
};
use event_bridge::HostDocument;

pub const PAGE: &str = r#"<!DOCTYPE html>
<html>
  <body>
    <div id="outside"><button id="elsewhere">elsewhere</button></div>
    <div id="app-container">
      <div id="root">
        <div id="a"><div id="b"><button id="c">go</button></div></div>
        <input id="y">
      </div>
    </div>
  </body>
</html>"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Bubble(u64, String),
    Clear,
    Mark(u64),
    Start(String),
}

pub fn bubble(handle: u64, event_type: &str) -> Call {
    Call::Bubble(handle, event_type.to_string())
}

/// Engine double that records every call in order.
#[derive(Default)]
pub struct RecordingEngine {
    handles: HandleTable,
    calls: RefCell<Vec<Call>>,
    stop_at: RefCell<HashSet<u64>>,
    fail_at: RefCell<HashSet<u64>>,
    prevent: Cell<bool>,
    fail_start: Cell<bool>,
    fail_clear: Cell<bool>,
    missing: RefCell<Vec<Capability>>,
    namespace: RefCell<Option<String>>,
    on_mark: RefCell<Option<Rc<dyn Fn(Handle)>>>,
}

impl RecordingEngine {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn attach(&self, node: NodeId, handle: u64) {
        self.handles.attach(node, Handle(handle));
    }

    pub fn attach_ids(&self, page: &HostDocument, handles: &[(&str, u64)]) {
        for (id, handle) in handles {
            let node = page.element_by_id(id).expect("element exists");
            self.attach(node, *handle);
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.borrow_mut())
    }

    pub fn stop_at(&self, handle: u64) {
        self.stop_at.borrow_mut().insert(handle);
    }

    pub fn fail_at(&self, handle: u64) {
        self.fail_at.borrow_mut().insert(handle);
    }

    pub fn prevent_default_everywhere(&self) {
        self.prevent.set(true);
    }

    pub fn fail_start(&self) {
        self.fail_start.set(true);
    }

    pub fn fail_clear(&self) {
        self.fail_clear.set(true);
    }

    pub fn without(&self, capability: Capability) {
        self.missing.borrow_mut().push(capability);
    }

    pub fn set_namespace(&self, namespace: &str) {
        *self.namespace.borrow_mut() = Some(namespace.to_string());
    }

    /// Run `hook` on the next `mark_focused` call only.
    pub fn on_next_mark(&self, hook: impl Fn(Handle) + 'static) {
        *self.on_mark.borrow_mut() = Some(Rc::new(hook));
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    fn check(&self, handle: Handle) -> Result<()> {
        if self.fail_at.borrow().contains(&handle.value()) {
            return Err(anyhow!("engine failure at {handle}"));
        }
        Ok(())
    }
}

impl HandleResolver for RecordingEngine {
    fn resolve(&self, node: NodeId) -> Option<Handle> {
        self.handles.resolve(node)
    }
}

impl Engine for RecordingEngine {
    fn has_capability(&self, capability: Capability) -> bool {
        !self.missing.borrow().contains(&capability)
    }

    fn notify_bubble(&self, handle: Handle, event: &mut BridgeEvent) -> Result<()> {
        self.record(Call::Bubble(handle.value(), event.event_type().to_string()));
        self.check(handle)?;
        if self.prevent.get() {
            event.prevent_default();
        }
        if self.stop_at.borrow().contains(&handle.value()) {
            event.stop_propagation();
        }
        Ok(())
    }

    fn clear_focused_set(&self) -> Result<()> {
        self.record(Call::Clear);
        if self.fail_clear.get() {
            return Err(anyhow!("engine could not clear focused set"));
        }
        Ok(())
    }

    fn mark_focused(&self, handle: Handle) -> Result<()> {
        self.record(Call::Mark(handle.value()));
        let hook = self.on_mark.borrow_mut().take();
        if let Some(hook) = hook {
            hook(handle);
        }
        self.check(handle)
    }

    fn start(&self, mount_id: &str) -> Result<()> {
        self.record(Call::Start(mount_id.to_string()));
        if self.fail_start.get() {
            return Err(anyhow!("engine refused to mount"));
        }
        Ok(())
    }

    fn namespace(&self) -> Option<String> {
        self.namespace.borrow().clone()
    }
}

pub fn node(page: &HostDocument, id: &str) -> NodeId {
    page.element_by_id(id).expect("element exists")
}
