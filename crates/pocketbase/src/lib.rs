//! PocketBase storage sink: persists routed messages as collection records
//! over the PocketBase REST API.

pub mod channel;
pub mod config;
pub mod error;
pub mod record;

use std::sync::Arc;

use rarsms_channels::{AdapterFactory, ChannelAdapter};

pub use {
    channel::PocketBaseChannel,
    config::PocketBaseConfig,
    error::{Error, Result},
};

pub const CHANNEL_TYPE: &str = "pocketbase";

pub fn factory() -> AdapterFactory {
    Arc::new(|name: &str, settings: &serde_json::Value| {
        let config = PocketBaseConfig::from_value(settings)?;
        Ok(Arc::new(PocketBaseChannel::new(name, config)) as Arc<dyn ChannelAdapter>)
    })
}
