use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Deserializer, Serialize},
};

use crate::{Error, Result};

/// Configuration for one Discord channel instance.
///
/// Sending needs only the webhook; receiving additionally needs a bot token
/// and the id of the channel to poll.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    #[serde(alias = "discord_webhook_url", serialize_with = "serialize_secret")]
    pub webhook_url: Secret<String>,

    #[serde(alias = "discord_bot_token", serialize_with = "serialize_secret")]
    pub bot_token: Secret<String>,

    #[serde(alias = "discord_channel_id", deserialize_with = "deserialize_id")]
    pub channel_id: String,

    /// Webhook display name; messages from this author are never re-read.
    #[serde(alias = "discord_username")]
    pub username: String,

    #[serde(alias = "discord_timeout")]
    pub timeout_secs: u64,

    #[serde(alias = "discord_poll_interval")]
    pub poll_interval_secs: u64,

    /// REST API root, without trailing slash.
    pub api_base: String,

    /// Channel instance that bridged replies are addressed to.
    pub reply_target: String,

    /// How many bridged messages are remembered for reply matching.
    pub max_tracked: usize,
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("webhook_url", &"[REDACTED]")
            .field("bot_token", &"[REDACTED]")
            .field("channel_id", &self.channel_id)
            .field("username", &self.username)
            .field("reply_target", &self.reply_target)
            .finish_non_exhaustive()
    }
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            webhook_url: Secret::new(String::new()),
            bot_token: Secret::new(String::new()),
            channel_id: String::new(),
            username: "RARSMS Bridge".into(),
            timeout_secs: 10,
            poll_interval_secs: 5,
            api_base: "https://discord.com/api/v10".into(),
            reply_target: "aprs_main".into(),
            max_tracked: 100,
        }
    }
}

impl DiscordConfig {
    pub fn from_value(settings: &serde_json::Value) -> Result<Self> {
        let mut config: Self = if settings.is_null() {
            Self::default()
        } else {
            serde_json::from_value(settings.clone()).map_err(Error::Config)?
        };
        config.api_base = config.api_base.trim_end_matches('/').to_string();
        Ok(config)
    }

    /// Parsed webhook URL, if it is an absolute URL.
    pub fn webhook(&self) -> Option<url::Url> {
        url::Url::parse(self.webhook_url.expose_secret().trim())
            .ok()
            .filter(|url| url.has_host())
    }

    pub fn is_configured(&self) -> bool {
        self.webhook().is_some()
    }

    pub fn can_receive(&self) -> bool {
        !self.bot_token.expose_secret().trim().is_empty() && !self.channel_id.trim().is_empty()
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// Snowflake ids are strings on the wire but often written as numbers in
/// config files.
fn deserialize_id<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s.trim().to_string(),
        Raw::Number(n) => n.to_string(),
    })
}
