use std::fmt;

use anyhow::Result;

use super::event::BridgeEvent;
use super::handle::{Handle, HandleResolver};

/// Operations the bridge needs from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    BubbleNotify,
    FocusClear,
    FocusAdd,
    Startup,
}

impl Capability {
    pub const REQUIRED: [Capability; 4] = [
        Capability::BubbleNotify,
        Capability::FocusClear,
        Capability::FocusAdd,
        Capability::Startup,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Capability::BubbleNotify => "bubble-notify",
            Capability::FocusClear => "focus-clear",
            Capability::FocusAdd => "focus-add",
            Capability::Startup => "startup",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Call interface of the embedded engine.
///
/// Every call is synchronous from the bridge's point of view and may fail; the
/// bridge logs failures and keeps going. Implementations are called
/// re-entrantly when a notification synchronously causes another DOM event, so
/// they must not hold interior borrows across calls back into the host.
pub trait Engine: HandleResolver {
    /// Whether the engine exposes `capability`. Checked once at bridge start.
    fn has_capability(&self, capability: Capability) -> bool {
        let _ = capability;
        true
    }

    /// Deliver `event` to the engine node `handle`. The engine may call
    /// `stop_propagation` or `prevent_default` on the event.
    fn notify_bubble(&self, handle: Handle, event: &mut BridgeEvent) -> Result<()>;

    fn clear_focused_set(&self) -> Result<()>;

    fn mark_focused(&self, handle: Handle) -> Result<()>;

    /// Mount the engine's UI at the element with id `mount_id`.
    fn start(&self, mount_id: &str) -> Result<()>;

    fn namespace(&self) -> Option<String> {
        None
    }
}
