use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{Context as AnyhowContext, Result};
use rquickjs::function::Opt;
use rquickjs::{Ctx, Function, IntoJs, Object, Value};

use super::runtime::{capture_exception_message, QuickJsEngine};
use crate::bridge::{
    BridgeConfig, BridgeEvent, Capability, Engine, Handle, HandleResolver, HandleTable, NodeId,
};
use crate::console::{LogConsole, LogLevel};

const EXPORT_BUBBLE: &str = "invokeBubbleEvent";
const EXPORT_CLEAR_FOCUS: &str = "clearFocusedElements";
const EXPORT_ADD_FOCUS: &str = "addFocusedElement";
const EXPORT_START: &str = "createEngine";
const EXPORT_NAMESPACE: &str = "getNamespace";

fn export_name(capability: Capability) -> &'static str {
    match capability {
        Capability::BubbleNotify => EXPORT_BUBBLE,
        Capability::FocusClear => EXPORT_CLEAR_FOCUS,
        Capability::FocusAdd => EXPORT_ADD_FOCUS,
        Capability::Startup => EXPORT_START,
    }
}

/// An [`Engine`] whose entry points are functions exported by a script on a
/// module global object (`Module.invokeBubbleEvent`, ...).
///
/// The script owns its node handles and reports them through
/// `bridge.attachHandle(node, handle)`; it never touches the page directly.
pub struct ScriptEngine {
    runtime: QuickJsEngine,
    handles: Rc<HandleTable>,
    console: Rc<RefCell<LogConsole>>,
    module_global: String,
}

impl ScriptEngine {
    /// Create a runtime, install the `bridge` bindings and evaluate `source`.
    /// Exports are looked up on `config.module_global`; `config.debug` lets the
    /// script's `console.log` through at info level.
    pub fn load(
        source: &str,
        filename: &str,
        config: &BridgeConfig,
        console: Rc<RefCell<LogConsole>>,
    ) -> Result<Self> {
        let module_global = config.module_global.as_str();
        let runtime = QuickJsEngine::with_console_echo(config.debug)?;
        let handles = Rc::new(HandleTable::new());
        install_bindings(&runtime, Rc::clone(&handles), Rc::clone(&console))
            .context("failed to install bridge bindings")?;
        runtime
            .eval(BRIDGE_PRELUDE, "bridge-prelude.js")
            .context("failed to evaluate bridge prelude")?;
        runtime
            .eval(source, filename)
            .with_context(|| format!("failed to evaluate {filename}"))?;

        tracing::debug!(target: "engine", filename, module_global, "engine script loaded");
        Ok(Self {
            runtime,
            handles,
            console,
            module_global: module_global.to_string(),
        })
    }

    pub fn handles(&self) -> Rc<HandleTable> {
        Rc::clone(&self.handles)
    }

    pub fn console(&self) -> Rc<RefCell<LogConsole>> {
        Rc::clone(&self.console)
    }

    pub fn eval(&self, source: &str, filename: &str) -> Result<()> {
        self.runtime.eval(source, filename)
    }

    pub fn eval_with<V>(&self, source: &str, filename: &str) -> Result<V>
    where
        V: for<'js> rquickjs::FromJs<'js>,
    {
        self.runtime.eval_with(source, filename)
    }

    fn has_export(&self, name: &str) -> bool {
        self.runtime
            .with_context(|ctx| {
                let module: Option<Object> = ctx.globals().get(self.module_global.as_str())?;
                Ok(module
                    .and_then(|module| module.get::<_, Option<Function>>(name).ok().flatten())
                    .is_some())
            })
            .unwrap_or(false)
    }

    /// Look up export `name` and hand it to `call`; JS exceptions become errors
    /// carrying the thrown message.
    fn invoke<T>(
        &self,
        name: &'static str,
        call: impl for<'js> FnOnce(&Ctx<'js>, Function<'js>) -> rquickjs::Result<T>,
    ) -> Result<T> {
        let result = self.runtime.with_context(|ctx| {
            let module: Object = ctx.globals().get(self.module_global.as_str())?;
            let function: Function = module.get(name)?;
            call(&ctx, function).map_err(|err| describe_exception(&ctx, err, name))
        });
        self.runtime.run_pending_jobs();
        result
    }
}

impl HandleResolver for ScriptEngine {
    fn resolve(&self, node: NodeId) -> Option<Handle> {
        self.handles.resolve(node)
    }
}

impl Engine for ScriptEngine {
    fn has_capability(&self, capability: Capability) -> bool {
        self.has_export(export_name(capability))
    }

    fn notify_bubble(&self, handle: Handle, event: &mut BridgeEvent) -> Result<()> {
        let payload = serde_json::to_string(&event.to_payload())?;
        let (stopped, prevented) = self
            .invoke(EXPORT_BUBBLE, |ctx, function| {
                let make_event: Function = ctx.globals().get("__bridgeMakeEvent")?;
                let data = ctx.json_parse(payload.as_bytes())?;
                let event_object: Object = make_event.call((data,))?;
                let _: Value = function.call((event_object.clone(),))?;
                let stopped = event_object
                    .get::<_, Option<bool>>("cancelBubble")?
                    .unwrap_or(false);
                let prevented = event_object
                    .get::<_, Option<bool>>("defaultPrevented")?
                    .unwrap_or(false);
                Ok((stopped, prevented))
            })
            .with_context(|| format!("bubble notification for {handle} failed"))?;

        if stopped {
            event.stop_propagation();
        }
        if prevented {
            event.prevent_default();
        }
        Ok(())
    }

    fn clear_focused_set(&self) -> Result<()> {
        self.invoke(EXPORT_CLEAR_FOCUS, |_ctx, function| {
            let _: Value = function.call(())?;
            Ok(())
        })
    }

    fn mark_focused(&self, handle: Handle) -> Result<()> {
        let value = handle.value() as f64;
        self.invoke(EXPORT_ADD_FOCUS, |_ctx, function| {
            let _: Value = function.call((value,))?;
            Ok(())
        })
    }

    fn start(&self, mount_id: &str) -> Result<()> {
        let mount_id = mount_id.to_string();
        self.invoke(EXPORT_START, |_ctx, function| {
            let _: Value = function.call((mount_id,))?;
            Ok(())
        })
    }

    fn namespace(&self) -> Option<String> {
        if !self.has_export(EXPORT_NAMESPACE) {
            return None;
        }
        match self.invoke(EXPORT_NAMESPACE, |_ctx, function| {
            function.call::<_, Option<String>>(())
        }) {
            Ok(namespace) => namespace,
            Err(err) => {
                tracing::warn!(target: "engine", error = %err, "getNamespace failed");
                None
            }
        }
    }
}

fn describe_exception(ctx: &Ctx<'_>, err: rquickjs::Error, export: &str) -> rquickjs::Error {
    if !matches!(err, rquickjs::Error::Exception) {
        return err;
    }
    let message = capture_exception_message(ctx).unwrap_or_else(|| "unknown exception".into());
    rquickjs::Error::new_from_js_message("engine", "call", format!("{export} threw: {message}"))
}

fn binding_error<T>(ctx: &Ctx<'_>, message: String) -> rquickjs::Result<T> {
    tracing::error!(target: "quickjs", "{message}");
    let value = message.into_js(ctx)?;
    Err(ctx.throw(value))
}

fn install_bindings(
    runtime: &QuickJsEngine,
    handles: Rc<HandleTable>,
    console: Rc<RefCell<LogConsole>>,
) -> Result<()> {
    runtime.with_context(|ctx| {
        let global = ctx.globals();

        {
            let handles = Rc::clone(&handles);
            let func = Function::new(
                ctx.clone(),
                move |ctx: Ctx<'_>, node: u32, handle: f64| -> rquickjs::Result<()> {
                    if !handle.is_finite() || handle < 0.0 || handle.fract() != 0.0 {
                        return binding_error(&ctx, format!("invalid engine handle: {handle}"));
                    }
                    let handle = Handle(handle as u64);
                    if let Some(previous) = handles.attach(node as NodeId, handle) {
                        tracing::trace!(target: "engine", node, %previous, %handle, "handle replaced");
                    }
                    Ok(())
                },
            )?
            .with_name("__bridge_attach_handle")?;
            global.set("__bridge_attach_handle", func)?;
        }

        {
            let handles = Rc::clone(&handles);
            let func = Function::new(ctx.clone(), move |node: u32| -> bool {
                handles.detach(node as NodeId).is_some()
            })?
            .with_name("__bridge_detach_handle")?;
            global.set("__bridge_detach_handle", func)?;
        }

        {
            let console = Rc::clone(&console);
            let func = Function::new(
                ctx.clone(),
                move |level: u32, category: String, message: String, indent: Opt<u32>| -> bool {
                    let indent = indent.0.unwrap_or(0) as usize;
                    console
                        .borrow()
                        .print(LogLevel::from_code(level), &category, indent, &message)
                },
            )?
            .with_name("__bridge_log")?;
            global.set("__bridge_log", func)?;
        }

        {
            let console = Rc::clone(&console);
            let func = Function::new(ctx.clone(), move |prefix: String| {
                console.borrow_mut().on(&prefix);
            })?
            .with_name("__bridge_log_on")?;
            global.set("__bridge_log_on", func)?;
        }

        {
            let console = Rc::clone(&console);
            let func = Function::new(ctx.clone(), move |prefix: Opt<String>| {
                console.borrow_mut().off(prefix.0.as_deref());
            })?
            .with_name("__bridge_log_off")?;
            global.set("__bridge_log_off", func)?;
        }

        {
            let console = Rc::clone(&console);
            let func = Function::new(
                ctx.clone(),
                move |ctx: Ctx<'_>, level: String| -> rquickjs::Result<()> {
                    let result = console.borrow_mut().set_level(&level);
                    match result {
                        Ok(()) => Ok(()),
                        Err(err) => binding_error(&ctx, err.to_string()),
                    }
                },
            )?
            .with_name("__bridge_log_level")?;
            global.set("__bridge_log_level", func)?;
        }

        {
            let console = Rc::clone(&console);
            let func = Function::new(ctx.clone(), move || -> Vec<String> {
                console.borrow().show()
            })?
            .with_name("__bridge_log_show")?;
            global.set("__bridge_log_show", func)?;
        }

        {
            let console = Rc::clone(&console);
            let func = Function::new(ctx.clone(), move || -> String { console.borrow().help() })?
                .with_name("__bridge_log_help")?;
            global.set("__bridge_log_help", func)?;
        }

        Ok(())
    })
}

const BRIDGE_PRELUDE: &str = r#"
(() => {
    const global = globalThis;

    global.__bridgeMakeEvent = (data) => {
        const event = Object.assign({}, data);
        event.stopPropagation = function () {
            this.cancelBubble = true;
        };
        event.preventDefault = function () {
            if (this.cancelable) {
                this.defaultPrevented = true;
            }
        };
        return event;
    };

    const levels = { trace: 0, debug: 1, info: 2, warn: 3, error: 4 };

    global.bridge = Object.freeze({
        attachHandle(node, handle) {
            global.__bridge_attach_handle(node, handle);
        },
        detachHandle(node) {
            return global.__bridge_detach_handle(node);
        },
        log(level, category, message, indent) {
            const code = typeof level === 'number' ? level : (levels[String(level)] ?? 2);
            return global.__bridge_log(code, String(category), String(message), indent ?? 0);
        },
        logging: Object.freeze({
            on(category) {
                if (category === undefined) {
                    return global.__bridge_log_help();
                }
                global.__bridge_log_on(String(category));
            },
            off(category) {
                if (category === undefined) {
                    global.__bridge_log_off();
                } else {
                    global.__bridge_log_off(String(category));
                }
            },
            level(name) {
                global.__bridge_log_level(String(name));
            },
            show() {
                return global.__bridge_log_show();
            },
            help() {
                return global.__bridge_log_help();
            },
        }),
    });
})();
"#;
