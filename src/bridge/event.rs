use blitz_traits::events::{
    BlitzImeEvent, BlitzKeyEvent, BlitzMouseButtonEvent, DomEvent, DomEventData, MouseEventButton,
};
use keyboard_types::{Location, Modifiers};
use serde_json::{json, Map as JsonMap, Value as JsonValue};

use super::dom::NodeId;
use super::handle::Handle;

pub const FOCUS_IN: &str = "focusin";
pub const FOCUS_OUT: &str = "focusout";

/// An event travelling through the host document and into the engine.
///
/// `handle` is the bridge-attached field naming the engine node currently being
/// notified; it only lives for the duration of one bubble walk.
#[derive(Debug, Clone)]
pub struct BridgeEvent {
    event_type: String,
    target: NodeId,
    related_target: Option<NodeId>,
    current_target: Option<NodeId>,
    bubbles: bool,
    cancelable: bool,
    detail: JsonValue,
    handle: Option<Handle>,
    cancel_bubble: bool,
    default_prevented: bool,
    in_passive_listener: bool,
}

impl BridgeEvent {
    /// A bubbling, cancelable event with an empty detail payload.
    pub fn new(event_type: impl Into<String>, target: NodeId) -> Self {
        Self {
            event_type: event_type.into(),
            target,
            related_target: None,
            current_target: None,
            bubbles: true,
            cancelable: true,
            detail: JsonValue::Object(JsonMap::new()),
            handle: None,
            cancel_bubble: false,
            default_prevented: false,
            in_passive_listener: false,
        }
    }

    pub fn focus_in(target: NodeId, related_target: Option<NodeId>) -> Self {
        Self::new(FOCUS_IN, target)
            .with_related_target(related_target)
            .with_cancelable(false)
    }

    pub fn focus_out(target: NodeId, related_target: Option<NodeId>) -> Self {
        Self::new(FOCUS_OUT, target)
            .with_related_target(related_target)
            .with_cancelable(false)
    }

    pub fn with_related_target(mut self, related_target: Option<NodeId>) -> Self {
        self.related_target = related_target;
        self
    }

    pub fn with_bubbles(mut self, bubbles: bool) -> Self {
        self.bubbles = bubbles;
        self
    }

    pub fn with_cancelable(mut self, cancelable: bool) -> Self {
        self.cancelable = cancelable;
        self
    }

    pub fn with_detail(mut self, detail: JsonValue) -> Self {
        self.detail = detail;
        self
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn related_target(&self) -> Option<NodeId> {
        self.related_target
    }

    pub fn current_target(&self) -> Option<NodeId> {
        self.current_target
    }

    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    pub fn cancelable(&self) -> bool {
        self.cancelable
    }

    pub fn detail(&self) -> &JsonValue {
        &self.detail
    }

    pub fn handle(&self) -> Option<Handle> {
        self.handle
    }

    pub fn stop_propagation(&mut self) {
        self.cancel_bubble = true;
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.cancel_bubble
    }

    /// Ignored for non-cancelable events and inside passive listeners.
    pub fn prevent_default(&mut self) {
        if self.cancelable && !self.in_passive_listener {
            self.default_prevented = true;
        }
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    pub(crate) fn set_handle(&mut self, handle: Option<Handle>) {
        self.handle = handle;
    }

    pub(crate) fn enter_listener(&mut self, node: NodeId, passive: bool) {
        self.current_target = Some(node);
        self.in_passive_listener = passive;
    }

    pub(crate) fn leave_listeners(&mut self) {
        self.current_target = None;
        self.in_passive_listener = false;
    }

    /// JSON view handed to script engines.
    pub fn to_payload(&self) -> JsonValue {
        json!({
            "type": self.event_type,
            "target": self.target,
            "relatedTarget": self.related_target,
            "currentTarget": self.current_target,
            "handle": self.handle.map(Handle::value),
            "bubbles": self.bubbles,
            "cancelable": self.cancelable,
            "detail": self.detail,
            "cancelBubble": self.cancel_bubble,
            "defaultPrevented": self.default_prevented,
        })
    }
}

impl From<&DomEvent> for BridgeEvent {
    fn from(event: &DomEvent) -> Self {
        Self::new(event.data.name(), event.target)
            .with_bubbles(event.bubbles)
            .with_cancelable(event.cancelable)
            .with_detail(build_event_detail(&event.data))
    }
}

fn build_event_detail(data: &DomEventData) -> JsonValue {
    let mut map = JsonMap::new();

    match data {
        DomEventData::MouseMove(data)
        | DomEventData::MouseDown(data)
        | DomEventData::MouseUp(data)
        | DomEventData::Click(data) => insert_mouse_event(&mut map, data),
        DomEventData::KeyDown(data) | DomEventData::KeyUp(data) | DomEventData::KeyPress(data) => {
            insert_key_event(&mut map, data)
        }
        DomEventData::Input(data) => {
            map.insert("value".to_string(), JsonValue::String(data.value.clone()));
        }
        DomEventData::Ime(data) => insert_ime_event(&mut map, data),
    }

    JsonValue::Object(map)
}

fn insert_mouse_event(map: &mut JsonMap<String, JsonValue>, event: &BlitzMouseButtonEvent) {
    map.insert("clientX".to_string(), json!(event.x));
    map.insert("clientY".to_string(), json!(event.y));
    map.insert("button".to_string(), json!(mouse_button_code(event.button)));
    map.insert("buttons".to_string(), json!(event.buttons.bits()));
    insert_modifier_flags(map, &event.mods);
}

fn insert_key_event(map: &mut JsonMap<String, JsonValue>, event: &BlitzKeyEvent) {
    insert_modifier_flags(map, &event.modifiers);
    map.insert("key".to_string(), JsonValue::String(event.key.to_string()));
    map.insert("code".to_string(), JsonValue::String(event.code.to_string()));
    map.insert("location".to_string(), json!(location_code(event.location)));
    map.insert("repeat".to_string(), JsonValue::Bool(event.is_auto_repeating));
    if let Some(text) = &event.text {
        map.insert("text".to_string(), JsonValue::String(text.to_string()));
    }
}

fn insert_ime_event(map: &mut JsonMap<String, JsonValue>, event: &BlitzImeEvent) {
    let state = match event {
        BlitzImeEvent::Enabled => "enabled",
        BlitzImeEvent::Disabled => "disabled",
        BlitzImeEvent::Commit(value) => {
            map.insert("value".to_string(), JsonValue::String(value.clone()));
            "commit"
        }
        BlitzImeEvent::Preedit(value, cursor) => {
            map.insert("value".to_string(), JsonValue::String(value.clone()));
            if let Some((start, end)) = cursor {
                map.insert("preeditStart".to_string(), json!(*start));
                map.insert("preeditEnd".to_string(), json!(*end));
            }
            "preedit"
        }
    };
    map.insert("imeState".to_string(), JsonValue::String(state.into()));
}

fn insert_modifier_flags(map: &mut JsonMap<String, JsonValue>, mods: &Modifiers) {
    map.insert("altKey".to_string(), JsonValue::Bool(mods.alt()));
    map.insert("ctrlKey".to_string(), JsonValue::Bool(mods.ctrl()));
    map.insert("metaKey".to_string(), JsonValue::Bool(mods.meta()));
    map.insert("shiftKey".to_string(), JsonValue::Bool(mods.shift()));
}

fn mouse_button_code(button: MouseEventButton) -> i32 {
    match button {
        MouseEventButton::Main => 0,
        MouseEventButton::Auxiliary => 1,
        MouseEventButton::Secondary => 2,
        MouseEventButton::Fourth => 3,
        MouseEventButton::Fifth => 4,
    }
}

fn location_code(location: Location) -> i32 {
    match location {
        Location::Standard => 0,
        Location::Left => 1,
        Location::Right => 2,
        Location::Numpad => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blitz_traits::events::MouseEventButtons;

    #[test]
    fn passive_listener_cannot_prevent_default() {
        let mut event = BridgeEvent::new("wheel", 4);
        event.enter_listener(1, true);
        event.prevent_default();
        assert!(!event.default_prevented());

        event.enter_listener(1, false);
        event.prevent_default();
        assert!(event.default_prevented());
    }

    #[test]
    fn focus_events_are_not_cancelable() {
        let mut event = BridgeEvent::focus_in(3, None);
        event.prevent_default();
        assert!(!event.default_prevented());
        assert!(event.bubbles());
    }

    #[test]
    fn converts_click_with_mouse_detail() {
        let dom_event = DomEvent::new(
            9,
            DomEventData::Click(BlitzMouseButtonEvent {
                x: 12.0,
                y: 4.0,
                button: MouseEventButton::Secondary,
                buttons: MouseEventButtons::Primary,
                mods: Modifiers::default(),
            }),
        );
        let event = BridgeEvent::from(&dom_event);
        assert_eq!(event.event_type(), "click");
        assert_eq!(event.target(), 9);
        assert_eq!(event.detail()["button"], json!(2));
        assert_eq!(event.detail()["clientX"], json!(12.0));
        assert_eq!(event.detail()["shiftKey"], json!(false));
    }

    #[test]
    fn payload_carries_handle_and_flags() {
        let mut event = BridgeEvent::focus_out(5, Some(6));
        event.set_handle(Some(Handle(42)));
        event.stop_propagation();
        let payload = event.to_payload();
        assert_eq!(payload["handle"], json!(42));
        assert_eq!(payload["relatedTarget"], json!(6));
        assert_eq!(payload["cancelBubble"], json!(true));
    }
}
