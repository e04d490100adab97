//! Discord channel: posts bridged traffic through a webhook and polls a
//! channel over the REST API for inbound messages and radio replies.

pub mod channel;
pub mod config;
pub mod error;
pub mod format;
pub mod replies;

use std::sync::Arc;

use rarsms_channels::{AdapterFactory, ChannelAdapter};

pub use {
    channel::DiscordChannel,
    config::DiscordConfig,
    error::{Error, Result},
};

pub const CHANNEL_TYPE: &str = "discord";

pub fn factory() -> AdapterFactory {
    Arc::new(|name: &str, settings: &serde_json::Value| {
        let config = DiscordConfig::from_value(settings)?;
        Ok(Arc::new(DiscordChannel::new(name, config)) as Arc<dyn ChannelAdapter>)
    })
}
