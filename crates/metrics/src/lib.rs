//! Metric names and recorder setup for the bridge.
//!
//! Crates record through the `metrics` facade macros re-exported here, gated
//! behind their own `metrics` feature:
//!
//! ```rust,ignore
//! use rarsms_metrics::{bridge, counter};
//!
//! counter!(bridge::MESSAGES_SENT_TOTAL).increment(1);
//! ```
//!
//! # Features
//!
//! - `prometheus`: install a Prometheus recorder in [`init_metrics`]

mod definitions;
mod recorder;

pub use {
    definitions::*,
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
