//! Rule-based routing between channel instances.
//!
//! Inbound flow:
//! 1. A channel hands a parsed [`Message`](rarsms_channels::Message) to the engine sink.
//! 2. The message is recorded and converted to a universal message, unless it
//!    is a direct reply.
//! 3. Every matching [`RoutingRule`] contributes targets; the source channel
//!    is always excluded.
//! 4. Each target gets a rendering adapted to its capabilities.

pub mod convert;
pub mod engine;
pub mod error;
pub mod history;
pub mod rule;
pub mod stats;

pub use {
    convert::to_universal,
    engine::{EngineConfig, RoutingEngine},
    error::{Error, Result},
    history::History,
    rule::{RoutingRule, RuleSummary},
    stats::{RoutingStats, StatisticsSnapshot},
};
