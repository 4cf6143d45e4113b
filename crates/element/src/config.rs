//! Configuration settings for custom elements.
//!
//! The value is built programmatically or from the environment and handed to the
//! host at construction. Code without a host handle can read the process-wide
//! default through [`ElementConfig::global`].

use core::time::Duration;
use std::env;

use once_cell::sync::OnceCell;

static GLOBAL_CONFIG: OnceCell<ElementConfig> = OnceCell::new();

/// Runtime configuration shared by the host and every element lifecycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementConfig {
    /// Prefix joined to each element's base name to form its tag, e.g. `ui` + `counter`
    pub tag_prefix: String,
    /// Minimum time between two frames when the host is ticked
    pub frame_budget_ms: u64,
    /// Whether to log lifecycle counters as JSON after each frame
    pub telemetry_enabled: bool,
}

impl Default for ElementConfig {
    fn default() -> Self {
        Self {
            tag_prefix: String::from("ui"),
            frame_budget_ms: 16,
            telemetry_enabled: false,
        }
    }
}

impl ElementConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `ELEMENTS_TAG_PREFIX`: Tag prefix (default: `ui`)
    /// - `ELEMENTS_FRAME_BUDGET_MS`: Frame budget in milliseconds (default: 16, minimum 1)
    /// - `ELEMENTS_TELEMETRY`: Set to "1" to enable telemetry (default: disabled)
    #[inline]
    #[must_use]
    pub fn from_env() -> Self {
        let tag_prefix = env::var("ELEMENTS_TAG_PREFIX")
            .ok()
            .map(|val| val.trim().to_ascii_lowercase())
            .filter(|val| !val.is_empty())
            .unwrap_or_else(|| String::from("ui"));
        let frame_budget_ms = env::var("ELEMENTS_FRAME_BUDGET_MS")
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
            .unwrap_or(16)
            .max(1);
        let telemetry_enabled = env::var("ELEMENTS_TELEMETRY").ok().as_deref() == Some("1");
        Self {
            tag_prefix,
            frame_budget_ms,
            telemetry_enabled,
        }
    }

    /// Get the frame budget as a `Duration`.
    #[inline]
    #[must_use]
    pub const fn frame_budget(&self) -> Duration {
        Duration::from_millis(self.frame_budget_ms)
    }

    /// Full tag for an element base name: `{prefix}-{base}`, or `base` alone when
    /// the prefix is empty.
    #[must_use]
    pub fn tag_name(&self, base: &str) -> String {
        if self.tag_prefix.is_empty() {
            base.to_ascii_lowercase()
        } else {
            format!("{}-{}", self.tag_prefix, base).to_ascii_lowercase()
        }
    }

    /// Process-wide configuration. Falls back to the default when nothing was installed.
    pub fn global() -> &'static Self {
        GLOBAL_CONFIG.get_or_init(Self::default)
    }

    /// Install the process-wide configuration.
    /// Returns true on first successful installation; false if a value was already
    /// installed or already read through [`ElementConfig::global`].
    pub fn install(config: Self) -> bool {
        GLOBAL_CONFIG.set(config).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_name_joins_prefix() {
        let config = ElementConfig::default();
        assert_eq!(config.tag_name("Counter"), "ui-counter");

        let bare = ElementConfig {
            tag_prefix: String::new(),
            ..ElementConfig::default()
        };
        assert_eq!(bare.tag_name("x-card"), "x-card");
    }

    #[test]
    fn global_is_installed_once() {
        let first = ElementConfig::global().clone();
        assert!(!ElementConfig::install(ElementConfig {
            tag_prefix: String::from("late"),
            ..ElementConfig::default()
        }));
        assert_eq!(*ElementConfig::global(), first);
    }

    #[test]
    fn budget_is_a_duration() {
        let config = ElementConfig {
            frame_budget_ms: 5,
            ..ElementConfig::default()
        };
        assert_eq!(config.frame_budget(), Duration::from_millis(5));
    }
}
