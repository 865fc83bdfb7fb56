pub mod engine;
pub mod runtime;

pub use engine::ScriptEngine;
pub use runtime::QuickJsEngine;
