/// Config schema types (bridge tuning, channel instances, routes).
use std::{collections::BTreeMap, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use rarsms_channels::MessageType;

/// Channel types the bridge binary knows how to build.
pub const KNOWN_CHANNEL_TYPES: &[&str] = &["aprs", "discord", "pocketbase"];

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub bridge: BridgeSettings,
    pub channels: BTreeMap<String, ChannelConfig>,
    pub routes: BTreeMap<String, RouteConfig>,
    /// One authorized callsign per line. Defaults to `callsigns.txt` when that
    /// file exists.
    pub callsigns_file: Option<PathBuf>,
    pub metrics: MetricsSettings,
}

/// Routing engine tuning and process-level timers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    pub max_history: usize,
    pub queue_capacity: usize,
    pub dispatch_workers: usize,
    pub connect_timeout_secs: u64,
    /// Seconds between status log lines. `0` disables them.
    pub status_interval_secs: u64,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            max_history: 1000,
            queue_capacity: 256,
            dispatch_workers: 1,
            connect_timeout_secs: 30,
            status_interval_secs: 300,
        }
    }
}

impl BridgeSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn status_interval(&self) -> Option<Duration> {
        (self.status_interval_secs > 0).then(|| Duration::from_secs(self.status_interval_secs))
    }
}

/// One channel instance. Everything besides `type` and `enabled` is handed
/// to the driver untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

impl ChannelConfig {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            enabled: true,
            settings: serde_json::Map::new(),
        }
    }

    /// Driver settings as a JSON object.
    pub fn settings_value(&self) -> serde_json::Value {
        serde_json::Value::Object(self.settings.clone())
    }

    /// Set a driver key, replacing any previous value.
    pub fn set(&mut self, key: &str, value: impl Into<serde_json::Value>) {
        self.settings.insert(key.to_string(), value.into());
    }
}

/// A named routing rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    pub source_protocols: Vec<String>,
    pub target_protocols: Vec<String>,
    pub message_types: Vec<MessageType>,
    /// Regex matched against the sender id.
    pub source_filter: Option<String>,
    pub bidirectional: bool,
    pub enabled: bool,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            source_protocols: Vec::new(),
            target_protocols: Vec::new(),
            message_types: vec![MessageType::Text],
            source_filter: None,
            bidirectional: false,
            enabled: true,
        }
    }
}

/// Metrics recorder settings. Only effective in builds with the
/// `prometheus` feature.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    pub enabled: bool,
    pub labels: BTreeMap<String, String>,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn channel_settings_are_flattened() {
        let cfg: BridgeConfig = toml::from_str(
            r#"
[channels.aprs_main]
type = "aprs"
callsign = "W1AW"
passcode = 12345

[channels.archive]
type = "pocketbase"
enabled = false
"#,
        )
        .unwrap();
        let aprs = &cfg.channels["aprs_main"];
        assert_eq!(aprs.kind, "aprs");
        assert!(aprs.enabled);
        assert_eq!(aprs.settings_value()["callsign"], "W1AW");
        assert_eq!(aprs.settings_value()["passcode"], 12345);
        assert!(!aprs.settings.contains_key("type"));
        assert!(!cfg.channels["archive"].enabled);
    }

    #[test]
    fn route_defaults_to_text_only() {
        let cfg: BridgeConfig = toml::from_str(
            r#"
[routes.radio_to_chat]
source_protocols = ["aprs_main"]
target_protocols = ["discord_main"]

[routes.positions]
source_protocols = ["aprs_main"]
target_protocols = ["archive"]
message_types = ["POSITION", "emergency"]
"#,
        )
        .unwrap();
        let route = &cfg.routes["radio_to_chat"];
        assert_eq!(route.message_types, vec![MessageType::Text]);
        assert!(route.enabled && !route.bidirectional);
        assert_eq!(
            cfg.routes["positions"].message_types,
            vec![MessageType::Position, MessageType::Emergency]
        );
    }

    #[test]
    fn bridge_defaults() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.bridge.max_history, 1000);
        assert_eq!(cfg.bridge.status_interval(), Some(Duration::from_secs(300)));
        let quiet = BridgeSettings {
            status_interval_secs: 0,
            ..BridgeSettings::default()
        };
        assert!(quiet.status_interval().is_none());
    }
}
