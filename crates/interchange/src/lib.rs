//! Universal message interchange.
//!
//! A [`UniversalMessage`] carries content as prioritized [`ContentBlock`]s.
//! The [`ContentAdapter`] renders it for a destination's
//! [`ProtocolCapabilities`](rarsms_channels::ProtocolCapabilities): blocks are
//! sorted by priority, transformed for the destination's markup dialect and
//! fitted to its length limit, sacrificing the lowest-priority content first.

pub mod adapter;
pub mod block;
pub mod error;
pub mod markup;
pub mod truncate;
pub mod universal;

pub use {
    adapter::{AdaptedMessage, ContentAdapter},
    block::{ContentBlock, ContentPriority, content_type},
    error::{AdaptError, Result},
    markup::DestinationFamily,
    truncate::{smart_truncate, truncate_with_floor},
    universal::UniversalMessage,
};
