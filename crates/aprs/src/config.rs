use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Deserializer, Serialize},
};

use crate::{Error, Result};

/// Configuration for one APRS-IS connection.
///
/// The flat key names used by older deployments (`aprs_server`,
/// `aprs_callsign`, ...) are accepted as aliases.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AprsConfig {
    #[serde(alias = "aprs_server")]
    pub server: String,

    #[serde(alias = "aprs_port")]
    pub port: u16,

    /// Station callsign used for login and as the frame source.
    #[serde(alias = "aprs_callsign")]
    pub callsign: String,

    /// APRS-IS passcode. Numeric values are accepted.
    #[serde(
        alias = "aprs_passcode",
        deserialize_with = "deserialize_passcode",
        serialize_with = "serialize_secret"
    )]
    pub passcode: Secret<String>,

    /// Centre and radius (km) of the server-side range filter.
    pub filter_lat: f64,
    pub filter_lon: f64,
    pub filter_distance: f64,

    /// Base callsigns allowed to send into the bridge. Empty admits all.
    pub authorized_callsigns: Vec<String>,

    /// Addressee or leading word that marks a text message for the bridge.
    pub message_prefix: String,

    /// Drop text messages that are neither addressed to nor prefixed with
    /// `message_prefix`.
    pub require_prefix: bool,

    #[serde(alias = "deduplication_timeout")]
    pub dedup_timeout_secs: u64,

    pub connect_timeout_secs: u64,

    /// How long to wait for the `# logresp` line after login.
    pub login_timeout_secs: u64,

    /// Idle period after which a `#keepalive` comment is sent.
    pub keepalive_secs: u64,
}

impl std::fmt::Debug for AprsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AprsConfig")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("callsign", &self.callsign)
            .field("passcode", &"[REDACTED]")
            .field("message_prefix", &self.message_prefix)
            .field("require_prefix", &self.require_prefix)
            .finish_non_exhaustive()
    }
}

impl Default for AprsConfig {
    fn default() -> Self {
        Self {
            server: "rotate.aprs2.net".into(),
            port: 14580,
            callsign: String::new(),
            passcode: Secret::new(String::new()),
            filter_lat: 35.7796,
            filter_lon: -78.6382,
            filter_distance: 100.0,
            authorized_callsigns: Vec::new(),
            message_prefix: "RARSMS".into(),
            require_prefix: true,
            dedup_timeout_secs: 300,
            connect_timeout_secs: 30,
            login_timeout_secs: 10,
            keepalive_secs: 30,
        }
    }
}

impl AprsConfig {
    /// Parse driver settings, upper-casing callsign and prefix.
    pub fn from_value(settings: &serde_json::Value) -> Result<Self> {
        let mut config: Self = if settings.is_null() {
            Self::default()
        } else {
            serde_json::from_value(settings.clone()).map_err(Error::Config)?
        };
        config.callsign = config.callsign.trim().to_uppercase();
        config.message_prefix = config.message_prefix.trim().to_uppercase();
        Ok(config)
    }

    pub fn is_configured(&self) -> bool {
        !self.callsign.is_empty() && !self.passcode.expose_secret().is_empty()
    }

    /// `r/LAT/LON/DIST` range filter sent with the login line.
    pub fn range_filter(&self) -> String {
        format!(
            "r/{}/{}/{}",
            self.filter_lat, self.filter_lon, self.filter_distance
        )
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

fn deserialize_passcode<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Secret<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(Secret::new(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s.trim().to_string(),
        Raw::Number(n) => n.to_string(),
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn defaults_match_the_raleigh_deployment() {
        let cfg = AprsConfig::default();
        assert_eq!(cfg.server, "rotate.aprs2.net");
        assert_eq!(cfg.port, 14580);
        assert_eq!(cfg.range_filter(), "r/35.7796/-78.6382/100");
        assert!(cfg.require_prefix);
        assert!(!cfg.is_configured());
    }

    #[test]
    fn accepts_legacy_keys_and_numeric_passcode() {
        let cfg = AprsConfig::from_value(&json!({
            "aprs_callsign": "w1aw-10",
            "aprs_passcode": 12345,
            "message_prefix": "rarsms",
            "deduplication_timeout": 60
        }))
        .unwrap();
        assert_eq!(cfg.callsign, "W1AW-10");
        assert_eq!(cfg.passcode.expose_secret(), "12345");
        assert_eq!(cfg.message_prefix, "RARSMS");
        assert_eq!(cfg.dedup_timeout_secs, 60);
        assert!(cfg.is_configured());
    }

    #[test]
    fn debug_redacts_passcode() {
        let cfg = AprsConfig::from_value(&json!({"callsign": "W1AW", "passcode": "98765"})).unwrap();
        let rendered = format!("{cfg:?}");
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("98765"));
    }

    #[test]
    fn rejects_malformed_settings() {
        assert!(AprsConfig::from_value(&json!({"port": "not a port"})).is_err());
    }
}
