use anyhow::{Context as AnyhowContext, Result};
use rquickjs::{Context, Ctx, Error as JsError, Function, Runtime, Value};
use tracing::Level;

/// Upper bound on promise jobs run after a single script call.
const MAX_JOBS: usize = 1000;

/// JavaScript runtime backed by QuickJS.
///
/// Owns the QuickJS runtime and context, evaluates scripts, and routes
/// `console.*` output into `tracing`.
pub struct QuickJsEngine {
    runtime: Runtime,
    context: Context,
}

impl QuickJsEngine {
    pub fn new() -> Result<Self> {
        Self::with_console_echo(false)
    }

    /// With `echo` set, `console.log` and `console.info` are reported at info
    /// level; otherwise they only show up at debug.
    pub fn with_console_echo(echo: bool) -> Result<Self> {
        let runtime = Runtime::new().context("failed to create QuickJS runtime")?;
        let context = Context::full(&runtime).context("failed to create QuickJS context")?;
        let engine = Self { runtime, context };
        engine.init_console(echo)?;
        Ok(engine)
    }

    /// Evaluate a script and discard the result.
    pub fn eval(&self, source: &str, filename: &str) -> Result<()> {
        self.eval_with::<()>(source, filename)
    }

    /// Evaluate a script and convert the result into `V`.
    pub fn eval_with<V>(&self, source: &str, filename: &str) -> Result<V>
    where
        V: for<'js> rquickjs::FromJs<'js>,
    {
        let script = Self::with_source_url(source, filename);
        let eval_result = self.context.with(|ctx| ctx.eval::<V, _>(script.clone()));

        let value = match eval_result {
            Ok(value) => Ok(value),
            Err(JsError::Exception) => {
                let message = self
                    .context
                    .with(|ctx| -> Result<Option<String>, JsError> {
                        Ok(capture_exception_message(&ctx))
                    })
                    .unwrap_or(None)
                    .unwrap_or_else(|| "QuickJS exception".to_string());
                Err(anyhow::anyhow!(message))
            }
            Err(err) => Err(anyhow::Error::from(err)),
        }?;

        self.run_pending_jobs();
        Ok(value)
    }

    /// Run queued promise jobs. Job failures are logged, not returned.
    pub fn run_pending_jobs(&self) -> usize {
        let mut job_count = 0;

        while self.runtime.is_job_pending() {
            match self.runtime.execute_pending_job() {
                Ok(true) => {
                    job_count += 1;
                    if job_count >= MAX_JOBS {
                        tracing::warn!(
                            target: "quickjs",
                            "stopped processing jobs after {} iterations",
                            MAX_JOBS
                        );
                        break;
                    }
                }
                Ok(false) => break,
                Err(job_exception) => {
                    tracing::error!(target: "quickjs", "job execution error: {:?}", job_exception);
                    break;
                }
            }
        }

        if job_count > 0 {
            tracing::debug!(target: "quickjs", "executed {} pending jobs", job_count);
        }
        job_count
    }

    pub fn with_context<T, F>(&self, f: F) -> Result<T>
    where
        F: for<'js> FnOnce(Ctx<'js>) -> rquickjs::Result<T>,
    {
        self.context.with(f).map_err(anyhow::Error::from)
    }

    fn init_console(&self, echo: bool) -> Result<()> {
        self.context
            .with(|ctx| {
                let global = ctx.globals();
                let log_fn = Function::new(ctx.clone(), move |level: u32, message: String| {
                    emit_console_line(console_level(level, echo), &message);
                })?
                .with_name("__bridge_console")?;
                global.set("__bridge_console", log_fn)?;
                ctx.eval::<(), _>(CONSOLE_BOOTSTRAP.as_bytes())
            })
            .map_err(anyhow::Error::from)
    }

    fn with_source_url(source: &str, filename: &str) -> Vec<u8> {
        let mut script = String::with_capacity(source.len() + filename.len() + 32);
        script.push_str(source);
        if !source.ends_with('\n') {
            script.push('\n');
        }
        script.push_str("//# sourceURL=");
        script.push_str(filename);
        script.push('\n');
        script.into_bytes()
    }
}

/// Map a `console.*` level code (0 trace .. 4 error) to a tracing level.
fn console_level(code: u32, echo: bool) -> Level {
    match code {
        0 | 1 => Level::DEBUG,
        3 => Level::WARN,
        4 => Level::ERROR,
        _ if echo => Level::INFO,
        _ => Level::DEBUG,
    }
}

fn emit_console_line(level: Level, message: &str) {
    if level == Level::ERROR {
        tracing::error!(target: "quickjs", message = %message);
    } else if level == Level::WARN {
        tracing::warn!(target: "quickjs", message = %message);
    } else if level == Level::INFO {
        tracing::info!(target: "quickjs", message = %message);
    } else {
        tracing::debug!(target: "quickjs", message = %message);
    }
}

/// Take the pending exception off the context and describe it.
pub(crate) fn capture_exception_message(ctx: &Ctx<'_>) -> Option<String> {
    let exception: Value = ctx.catch();

    if let Some(obj) = exception.as_object() {
        if let Ok(message) = obj.get::<_, String>("message") {
            if let Ok(stack) = obj.get::<_, String>("stack") {
                return Some(format!("Error: {}\nStack: {}", message, stack));
            }
            return Some(format!("Error: {}", message));
        }
    }

    if let Some(text) = exception.as_string().and_then(|s| s.to_string().ok()) {
        return Some(text);
    }

    Some(format!("{:?}", exception))
}

const CONSOLE_BOOTSTRAP: &str = r#"
(() => {
    const global = globalThis;
    const stringify = (value) => {
        try {
            if (typeof value === 'string') {
                return value;
            }
            if (value === undefined) {
                return 'undefined';
            }
            if (value === null) {
                return 'null';
            }
            return String(value);
        } catch (err) {
            return '[unprintable]';
        }
    };

    const logAt = (level) => (...args) => {
        try {
            global.__bridge_console(level, args.map(stringify).join(' '));
        } catch (err) {
            // console must never throw
        }
    };

    if (typeof global.console !== 'object' || global.console === null) {
        global.console = {};
    }

    global.console.debug = logAt(1);
    global.console.log = logAt(2);
    global.console.info = logAt(2);
    global.console.warn = logAt(3);
    global.console.error = logAt(4);
})();
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_inline_script() {
        let engine = QuickJsEngine::new().expect("engine");
        let result: i32 = engine
            .eval_with(
                "(() => { console.log('hello from test'); return 40 + 2; })()",
                "runtime_test.js",
            )
            .expect("script result");
        assert_eq!(result, 42);
    }

    #[test]
    fn console_output_is_quiet_unless_echoed() {
        assert_eq!(console_level(2, false), Level::DEBUG);
        assert_eq!(console_level(2, true), Level::INFO);
        assert_eq!(console_level(3, false), Level::WARN);
        assert_eq!(console_level(4, false), Level::ERROR);
        assert_eq!(console_level(1, true), Level::DEBUG);

        let engine = QuickJsEngine::with_console_echo(true).expect("engine");
        engine.eval("console.info('echoed')", "echo.js").expect("console works");
    }

    #[test]
    fn exceptions_carry_their_message() {
        let engine = QuickJsEngine::new().expect("engine");
        let err = engine
            .eval("throw new Error('boom')", "throwing.js")
            .expect_err("script should throw");
        assert!(err.to_string().contains("boom"));
    }
}
