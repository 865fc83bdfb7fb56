use thiserror::Error;

use super::config::ConfigError;
use super::engine::Capability;

/// Fatal bridge start-up failures, returned to the caller of `start`.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("delegation root element with id=\"{0}\" not found")]
    MissingContainer(String),
    #[error("mount element with id=\"{0}\" not found")]
    MissingMount(String),
    #[error("engine does not provide the `{0}` capability")]
    MissingCapability(Capability),
    #[error("engine script failed to load: {0:#}")]
    EngineLoad(anyhow::Error),
    #[error("engine failed to start: {0:#}")]
    Startup(anyhow::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl BridgeError {
    /// Failures that happened after the page was found, which the host reports
    /// inside the page itself.
    pub fn is_engine_failure(&self) -> bool {
        matches!(
            self,
            Self::EngineLoad(_) | Self::MissingCapability(_) | Self::Startup(_)
        )
    }
}
