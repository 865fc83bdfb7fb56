use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

use super::passive::{PassivePolicy, DEFAULT_PASSIVE_EVENTS};

/// DOM event types bridged when no explicit list is configured.
pub const DEFAULT_EVENTS: &[&str] = &[
    "abort",
    "afterprint",
    "beforeprint",
    "beforeunload",
    "blur",
    "canplay",
    "canplaythrough",
    "change",
    "click",
    "contextmenu",
    "copy",
    "cuechange",
    "cut",
    "dblclick",
    "drag",
    "dragend",
    "dragenter",
    "dragleave",
    "dragover",
    "dragstart",
    "drop",
    "durationchange",
    "emptied",
    "ended",
    "error",
    "focus",
    "focusin",
    "focusout",
    "hashchange",
    "input",
    "invalid",
    "keydown",
    "keypress",
    "keyup",
    "load",
    "loadeddata",
    "loadedmetadata",
    "loadstart",
    "mousedown",
    "mousemove",
    "mouseout",
    "mouseover",
    "mouseup",
    "mousewheel",
    "offline",
    "online",
    "pagehide",
    "pageshow",
    "paste",
    "pause",
    "play",
    "playing",
    "pointerover",
    "pointerdown",
    "pointermove",
    "pointerup",
    "pointercancel",
    "pointerout",
    "pointerrawupdate",
    "popstate",
    "progress",
    "ratechange",
    "reset",
    "resize",
    "scroll",
    "search",
    "seeked",
    "seeking",
    "select",
    "stalled",
    "storage",
    "submit",
    "suspend",
    "timeupdate",
    "toggle",
    "touchstart",
    "touchmove",
    "unload",
    "volumechange",
    "waiting",
    "wheel",
];

const DEFAULT_CONTAINER_ID: &str = "app-container";
const DEFAULT_MOUNT_ID: &str = "root";
const DEFAULT_MODULE_GLOBAL: &str = "Module";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read bridge config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid bridge config: {0}")]
    Invalid(String),
}

/// Start-up options for the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Element id of the delegation root that receives every listener.
    pub container_id: String,
    /// Element id handed to the engine at start; `None` mounts into the container.
    pub mount_id: Option<String>,
    pub events: Vec<String>,
    pub passive_events: Vec<String>,
    /// Global object that exports the script engine's call interface.
    pub module_global: String,
    /// Report bootstrap progress at info level instead of debug.
    pub debug: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            container_id: DEFAULT_CONTAINER_ID.to_string(),
            mount_id: Some(DEFAULT_MOUNT_ID.to_string()),
            events: DEFAULT_EVENTS.iter().map(|s| s.to_string()).collect(),
            passive_events: DEFAULT_PASSIVE_EVENTS.iter().map(|s| s.to_string()).collect(),
            module_global: DEFAULT_MODULE_GLOBAL.to_string(),
            debug: false,
        }
    }
}

impl BridgeConfig {
    /// Read a YAML config; a missing path or file yields the defaults.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = match config_path {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path)?;
                serde_yaml::from_str::<BridgeConfig>(&contents)?
            }
            _ => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.container_id.trim().is_empty() {
            return Err(ConfigError::Invalid("container_id must not be empty".into()));
        }
        if self.mount_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
            return Err(ConfigError::Invalid("mount_id must not be empty".into()));
        }
        if self.events.iter().any(|name| name.trim().is_empty()) {
            return Err(ConfigError::Invalid("event names must not be empty".into()));
        }
        Ok(())
    }

    pub fn mount_id(&self) -> &str {
        self.mount_id.as_deref().unwrap_or(&self.container_id)
    }

    pub fn passive_policy(&self) -> PassivePolicy {
        PassivePolicy::from_names(self.passive_events.iter().cloned())
    }

    /// Configured event types with duplicates removed, first occurrence wins.
    pub fn unique_events(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.events
            .iter()
            .map(String::as_str)
            .filter(|name| seen.insert(*name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn loads_default() {
        let config = BridgeConfig::load(None).unwrap();
        assert_eq!(config.container_id, "app-container");
        assert_eq!(config.mount_id(), "root");
        assert!(config.events.iter().any(|e| e == "focusin"));
        assert!(config.passive_policy().is_passive("wheel"));
    }

    #[test]
    fn loads_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "container_id: shell\nmount_id: null\nevents:\n  - click\n  - focusin\n  - click\npassive_events: []\ndebug: true"
        )
        .unwrap();
        let config = BridgeConfig::load(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.mount_id(), "shell");
        assert_eq!(config.unique_events(), vec!["click", "focusin"]);
        assert!(!config.passive_policy().is_passive("wheel"));
        assert_eq!(config.module_global, "Module");
        assert!(config.debug);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = BridgeConfig::load(Some(dir.path().join("absent.yaml"))).unwrap();
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn rejects_empty_container() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "container_id: \"\"").unwrap();
        let err = BridgeConfig::load(Some(file.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
