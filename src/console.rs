//! Category/level filter for engine log output, persisted between sessions.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("failed to access log settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("unknown log level '{0}' (valid: trace, debug, info, warn, error)")]
    UnknownLevel(String),
    #[error("unable to determine data directory")]
    DataDir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Numeric levels as sent by the engine, 0 (trace) to 4 (error).
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => Self::Trace,
            1 => Self::Debug,
            2 => Self::Info,
            3 => Self::Warn,
            _ => Self::Error,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ConsoleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(ConsoleError::UnknownLevel(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSettings {
    pub enabled: BTreeSet<String>,
    pub level: LogLevel,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            enabled: BTreeSet::new(),
            level: LogLevel::Trace,
        }
    }
}

pub struct LogConsole {
    settings: LogSettings,
    path: Option<PathBuf>,
}

impl LogConsole {
    /// In-memory console; nothing is persisted.
    pub fn ephemeral() -> Self {
        Self {
            settings: LogSettings::default(),
            path: None,
        }
    }

    /// Console backed by the settings file in the platform data directory.
    pub fn load_default() -> Result<Self, ConsoleError> {
        Ok(Self::load(settings_path()?))
    }

    /// Restore settings from `path`; unreadable or malformed files fall back to
    /// defaults.
    pub fn load(path: PathBuf) -> Self {
        let settings = match read_settings(&path) {
            Ok(Some(settings)) => {
                tracing::info!(
                    target: "engine",
                    enabled = ?settings.enabled,
                    level = %settings.level,
                    "engine logging restored from storage"
                );
                settings
            }
            Ok(None) => LogSettings::default(),
            Err(err) => {
                tracing::warn!(target: "engine", error = %err, "failed to restore log settings");
                LogSettings::default()
            }
        };
        Self {
            settings,
            path: Some(path),
        }
    }

    pub fn settings(&self) -> &LogSettings {
        &self.settings
    }

    /// Enable every category starting with `prefix`.
    pub fn on(&mut self, prefix: &str) {
        self.settings.enabled.insert(prefix.to_string());
        self.persist();
    }

    /// Disable one prefix, or with `None` disable everything and reset the
    /// level to info.
    pub fn off(&mut self, prefix: Option<&str>) {
        match prefix {
            Some(prefix) => {
                self.settings.enabled.remove(prefix);
            }
            None => {
                self.settings.enabled.clear();
                self.settings.level = LogLevel::Info;
            }
        }
        self.persist();
    }

    pub fn set_level(&mut self, level: &str) -> Result<(), ConsoleError> {
        self.settings.level = level.parse()?;
        self.persist();
        Ok(())
    }

    pub fn show(&self) -> Vec<String> {
        self.settings.enabled.iter().cloned().collect()
    }

    pub fn help(&self) -> String {
        let enabled = if self.settings.enabled.is_empty() {
            "<none>".to_string()
        } else {
            self.show().join(", ")
        };
        format!(
            "bridge.logging.on(\"<category>\")   enable a category (prefix match)\n\
             bridge.logging.off(\"<category>\")  disable a category; no argument resets\n\
             bridge.logging.show()             list enabled categories\n\
             bridge.logging.level(\"<level>\")   minimum level: trace, debug, info, warn, error\n\
             \n\
             level   = {}\n\
             enabled = {}",
            self.settings.level, enabled
        )
    }

    pub fn should_print(&self, level: LogLevel, category: &str) -> bool {
        if level < self.settings.level {
            return false;
        }
        self.settings
            .enabled
            .iter()
            .any(|prefix| category.starts_with(prefix.as_str()))
    }

    /// Emit an engine log line through `tracing` if the filter lets it pass.
    pub fn print(&self, level: LogLevel, category: &str, indent: usize, message: &str) -> bool {
        if !self.should_print(level, category) {
            return false;
        }
        let line = format!("{}{}", "  ".repeat(indent), message);
        match level {
            LogLevel::Trace => tracing::trace!(target: "engine", category, "{line}"),
            LogLevel::Debug => tracing::debug!(target: "engine", category, "{line}"),
            LogLevel::Info => tracing::info!(target: "engine", category, "{line}"),
            LogLevel::Warn => tracing::warn!(target: "engine", category, "{line}"),
            LogLevel::Error => tracing::error!(target: "engine", category, "{line}"),
        }
        true
    }

    pub fn save(&self) -> Result<(), ConsoleError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&self.settings)?)?;
        Ok(())
    }

    fn persist(&self) {
        if let Err(err) = self.save() {
            tracing::warn!(target: "engine", error = %err, "failed to persist log settings");
        }
    }
}

fn read_settings(path: &Path) -> Result<Option<LogSettings>, ConsoleError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&raw)?))
}

fn settings_path() -> Result<PathBuf, ConsoleError> {
    if let Some(dirs) = ProjectDirs::from("org", "EventBridge", "EventBridge") {
        let mut path = dirs.config_dir().to_path_buf();
        path.push("log-settings.json");
        Ok(path)
    } else {
        Err(ConsoleError::DataDir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn nothing_prints_until_a_category_is_enabled() {
        let mut console = LogConsole::ephemeral();
        assert!(!console.should_print(LogLevel::Error, "DiffPatch"));
        console.on("Diff");
        assert!(console.should_print(LogLevel::Trace, "DiffPatch.apply"));
        assert!(!console.should_print(LogLevel::Error, "Runtime"));
    }

    #[test]
    fn level_threshold_applies() {
        let mut console = LogConsole::ephemeral();
        console.on("Runtime");
        console.set_level("warn").unwrap();
        assert!(!console.should_print(LogLevel::Info, "Runtime"));
        assert!(console.should_print(LogLevel::Error, "Runtime"));
    }

    #[test]
    fn unknown_level_is_rejected() {
        let mut console = LogConsole::ephemeral();
        let err = console.set_level("loud").unwrap_err();
        assert!(matches!(err, ConsoleError::UnknownLevel(_)));
        assert_eq!(console.settings().level, LogLevel::Trace);
    }

    #[test]
    fn reset_clears_categories_and_restores_info() {
        let mut console = LogConsole::ephemeral();
        console.on("A");
        console.on("B");
        console.set_level("error").unwrap();
        console.off(Some("A"));
        assert_eq!(console.show(), vec!["B".to_string()]);
        console.off(None);
        assert!(console.show().is_empty());
        assert_eq!(console.settings().level, LogLevel::Info);
        assert!(console.help().contains("<none>"));
    }

    #[test]
    fn settings_survive_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("log-settings.json");

        let mut console = LogConsole::load(path.clone());
        console.on("DiffPatch");
        console.set_level("debug").unwrap();

        let restored = LogConsole::load(path);
        assert_eq!(restored.show(), vec!["DiffPatch".to_string()]);
        assert_eq!(restored.settings().level, LogLevel::Debug);
    }

    #[test]
    fn malformed_settings_fall_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log-settings.json");
        fs::write(&path, "{not json").unwrap();
        let console = LogConsole::load(path);
        assert_eq!(console.settings(), &LogSettings::default());
    }

    #[test]
    fn level_codes_map_like_the_engine() {
        assert_eq!(LogLevel::from_code(0), LogLevel::Trace);
        assert_eq!(LogLevel::from_code(3), LogLevel::Warn);
        assert_eq!(LogLevel::from_code(9), LogLevel::Error);
    }
}
