use std::collections::BTreeSet;

/// Event types that are registered passively unless configured otherwise.
pub const DEFAULT_PASSIVE_EVENTS: &[&str] = &["touchstart", "touchmove", "wheel"];

/// Static classification of event types whose listeners never block the
/// browser's default action (scrolling, touch gestures).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassivePolicy {
    names: BTreeSet<String>,
}

impl Default for PassivePolicy {
    fn default() -> Self {
        Self::from_names(DEFAULT_PASSIVE_EVENTS.iter().copied())
    }
}

impl PassivePolicy {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_passive(&self, event_type: &str) -> bool {
        self.names.contains(event_type)
    }
}
