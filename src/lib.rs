// Library exports for the binary and integration tests

pub mod bridge;
pub mod console;
pub mod host;
pub mod js;
pub mod overlay;

pub use bridge::{BridgeConfig, BridgeError, BridgeEvent, Engine, EventBridge, Handle};
pub use console::{LogConsole, LogLevel};
pub use host::HostDocument;
pub use js::ScriptEngine;
