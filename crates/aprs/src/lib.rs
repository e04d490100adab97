//! APRS-IS channel: a line-oriented TCP client that logs in with a
//! callsign and passcode, receives a range-filtered packet feed and injects
//! messages and position reports.

pub mod channel;
pub mod config;
pub mod dedup;
pub mod error;
pub mod packet;

use std::sync::Arc;

use rarsms_channels::{AdapterFactory, ChannelAdapter};

pub use {
    channel::AprsChannel,
    config::AprsConfig,
    error::{Error, Result},
};

/// Channel type name used in configuration.
pub const CHANNEL_TYPE: &str = "aprs";

/// Factory for the channel type registry.
pub fn factory() -> AdapterFactory {
    Arc::new(|name: &str, settings: &serde_json::Value| {
        let config = AprsConfig::from_value(settings)?;
        Ok(Arc::new(AprsChannel::new(name, config)) as Arc<dyn ChannelAdapter>)
    })
}
