// ABOUTME: Room configuration passed unchanged to every strategy's join.
// ABOUTME: App id plus free-form options, with TOML loading and probe-window default.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default health-probe window: how long the connector waits for a candidate
/// strategy's relay socket to open before rejecting it.
pub const DEFAULT_PROBE_WINDOW: Duration = Duration::from_millis(5000);

fn default_probe_window_ms() -> u64 {
    DEFAULT_PROBE_WINDOW.as_millis() as u64
}

/// Configuration shared by all strategies for a room session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Application identifier shared by every peer in the swarm
    pub app_id: String,

    /// Free-form strategy options (relay URLs, tracker lists, ...), passed
    /// through verbatim to every strategy's `join_room`
    #[serde(default)]
    pub options: serde_json::Map<String, serde_json::Value>,

    /// Health-probe window in milliseconds
    #[serde(default = "default_probe_window_ms")]
    pub probe_window_ms: u64,
}

impl RoomConfig {
    /// Create a config with the given app id and default probe window
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            options: serde_json::Map::new(),
            probe_window_ms: default_probe_window_ms(),
        }
    }

    /// Add a strategy option
    pub fn with_option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Override the health-probe window
    pub fn with_probe_window(mut self, window: Duration) -> Self {
        self.probe_window_ms = window.as_millis() as u64;
        self
    }

    /// Health-probe window as a Duration
    pub fn probe_window(&self) -> Duration {
        Duration::from_millis(self.probe_window_ms)
    }

    /// Parse configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse room config TOML")
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_default_probe_window() {
        let config = RoomConfig::new("chitchatter");
        assert_eq!(config.app_id, "chitchatter");
        assert!(config.options.is_empty());
        assert_eq!(config.probe_window(), DEFAULT_PROBE_WINDOW);
    }

    #[test]
    fn test_builder_options_and_window() {
        let config = RoomConfig::new("app")
            .with_option("relay_urls", serde_json::json!(["wss://relay.example"]))
            .with_probe_window(Duration::from_millis(250));
        assert_eq!(config.options["relay_urls"][0], "wss://relay.example");
        assert_eq!(config.probe_window(), Duration::from_millis(250));
    }

    #[test]
    fn test_parse_toml_with_defaults() {
        let config = RoomConfig::parse(r#"app_id = "demo""#).unwrap();
        assert_eq!(config.app_id, "demo");
        assert_eq!(config.probe_window_ms, 5000);
    }

    #[test]
    fn test_parse_toml_with_options() {
        let config = RoomConfig::parse(
            r#"
app_id = "demo"
probe_window_ms = 1200

[options]
tracker = "wss://tracker.example"
"#,
        )
        .unwrap();
        assert_eq!(config.probe_window_ms, 1200);
        assert_eq!(config.options["tracker"], "wss://tracker.example");
    }

    #[test]
    fn test_parse_rejects_missing_app_id() {
        assert!(RoomConfig::parse("probe_window_ms = 10").is_err());
    }
}
