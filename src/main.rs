use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use event_bridge::{BridgeConfig, BridgeEvent, HostDocument, LogConsole};
use tracing_subscriber::EnvFilter;

fn main() {
    let mut args = std::env::args().skip(1);
    let (Some(page_path), Some(script_path)) = (args.next(), args.next()) else {
        eprintln!("usage: event-bridge <page.html> <engine.js> [element-id ...]");
        std::process::exit(2);
    };
    let focus_ids: Vec<String> = args.collect();

    let subscriber_result = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .try_init();
    if subscriber_result.is_err() {
        // tracing was already initialised; continue silently
    }

    let config_path = std::env::var("BRIDGE_CONFIG").ok().map(PathBuf::from);
    let config = BridgeConfig::load(config_path).unwrap_or_else(|err| {
        eprintln!("Failed to load bridge configuration: {err}. Using defaults.");
        BridgeConfig::default()
    });

    let console = LogConsole::load_default().unwrap_or_else(|err| {
        tracing::warn!(target: "engine", error = %err, "log settings unavailable; not persisting");
        LogConsole::ephemeral()
    });
    let console = Rc::new(RefCell::new(console));

    let html = read_or_exit(&page_path);
    let source = read_or_exit(&script_path);

    let page = HostDocument::from_html(&html);
    let bridge = match page.start_script_bridge(&config, &source, &script_path, console) {
        Ok(bridge) => bridge,
        Err(err) => {
            eprintln!("Failed to start event bridge: {err}");
            std::process::exit(1);
        }
    };

    if let Some(namespace) = bridge.namespace() {
        tracing::info!(target: "bridge", %namespace, "engine ready");
    }

    for id in &focus_ids {
        let Some(node) = page.element_by_id(id) else {
            tracing::warn!(target: "bridge", %id, "no element with this id");
            continue;
        };
        page.focus(Some(node));
        let mut click = BridgeEvent::new("click", node);
        page.dispatch(&mut click);
        tracing::info!(
            target: "bridge",
            %id,
            stopped = click.is_propagation_stopped(),
            default_prevented = click.default_prevented(),
            "delivered click"
        );
    }

    page.blur();
    bridge.destroy();
}

fn read_or_exit(path: &str) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|err| {
        eprintln!("Failed to read {path}: {err}");
        std::process::exit(1);
    })
}
