//! Channel adapter contract for the RARSMS bridge.
//!
//! Each transport (APRS-IS, Discord, PocketBase, ...) implements the
//! [`ChannelAdapter`] trait and exchanges canonical [`Message`]s with the
//! routing engine through a [`MessageSink`].

pub mod adapter;
pub mod capabilities;
pub mod error;
pub mod gating;
pub mod message;
pub mod registry;

pub use {
    adapter::{
        AdapterCore, ChannelAdapter, ChannelInfo, ConnectionState, MessageSink, validate_against,
    },
    capabilities::ProtocolCapabilities,
    error::{Error, Result},
    message::{Message, MessageMetadata, MessageType, Position, generate_message_id},
    registry::{AdapterFactory, ChannelTypeRegistry},
};
