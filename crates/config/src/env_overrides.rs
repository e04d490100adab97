//! Environment variables from flat `.env` deployments, mapped onto the
//! structured config.

use rarsms_channels::MessageType;

use crate::schema::{BridgeConfig, ChannelConfig, RouteConfig};

pub const APRS_CHANNEL: &str = "aprs_main";
pub const DISCORD_CHANNEL: &str = "discord_main";
pub const DEFAULT_ROUTE: &str = "aprs_discord";

#[derive(Clone, Copy)]
enum Kind {
    Text,
    Integer,
    Float,
    Flag,
}

const APRS_VARS: &[(&str, &str, Kind)] = &[
    ("APRS_CALLSIGN", "callsign", Kind::Text),
    ("APRS_PASSCODE", "passcode", Kind::Text),
    ("APRS_SERVER", "server", Kind::Text),
    ("APRS_PORT", "port", Kind::Integer),
    ("APRS_FILTER_LAT", "filter_lat", Kind::Float),
    ("APRS_FILTER_LON", "filter_lon", Kind::Float),
    ("APRS_FILTER_DISTANCE", "filter_distance", Kind::Float),
    ("MESSAGE_PREFIX", "message_prefix", Kind::Text),
    ("REQUIRE_PREFIX", "require_prefix", Kind::Flag),
];

const DISCORD_VARS: &[(&str, &str, Kind)] = &[
    ("DISCORD_WEBHOOK_URL", "webhook_url", Kind::Text),
    ("DISCORD_BOT_TOKEN", "bot_token", Kind::Text),
    ("DISCORD_CHANNEL_ID", "channel_id", Kind::Text),
    ("DISCORD_USERNAME", "username", Kind::Text),
];

/// Apply overrides from `lookup`, normally the process environment.
///
/// `APRS_CALLSIGN` with `APRS_PASSCODE` creates or updates the `aprs_main`
/// channel; `DISCORD_WEBHOOK_URL` does the same for `discord_main`. When both
/// channels exist and no route is configured a bidirectional text and
/// position route between them is added.
pub fn apply_env_overrides(
    config: &mut BridgeConfig,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let get = |name: &str| {
        lookup(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    if get("APRS_CALLSIGN").is_some() && get("APRS_PASSCODE").is_some() {
        let channel = config
            .channels
            .entry(APRS_CHANNEL.to_string())
            .or_insert_with(|| ChannelConfig::new("aprs"));
        apply_vars(channel, APRS_VARS, &get);
    }

    if get("DISCORD_WEBHOOK_URL").is_some() {
        let channel = config
            .channels
            .entry(DISCORD_CHANNEL.to_string())
            .or_insert_with(|| ChannelConfig::new("discord"));
        apply_vars(channel, DISCORD_VARS, &get);
    }

    if config.routes.is_empty()
        && config.channels.contains_key(APRS_CHANNEL)
        && config.channels.contains_key(DISCORD_CHANNEL)
    {
        config.routes.insert(DEFAULT_ROUTE.to_string(), RouteConfig {
            source_protocols: vec![APRS_CHANNEL.to_string()],
            target_protocols: vec![DISCORD_CHANNEL.to_string()],
            message_types: vec![MessageType::Text, MessageType::Position],
            bidirectional: true,
            ..RouteConfig::default()
        });
    }
}

fn apply_vars(
    channel: &mut ChannelConfig,
    vars: &[(&str, &str, Kind)],
    get: &impl Fn(&str) -> Option<String>,
) {
    for &(var, key, kind) in vars {
        let Some(raw) = get(var) else { continue };
        let value = match kind {
            Kind::Text => serde_json::Value::String(raw),
            Kind::Integer => match raw.parse::<i64>() {
                Ok(n) => n.into(),
                Err(_) => serde_json::Value::String(raw),
            },
            Kind::Float => match raw.parse::<f64>() {
                Ok(f) => f.into(),
                Err(_) => serde_json::Value::String(raw),
            },
            Kind::Flag => serde_json::Value::Bool(matches!(
                raw.to_ascii_lowercase().as_str(),
                "true" | "1" | "yes" | "on"
            )),
        };
        channel.set(key, value);
    }
}
