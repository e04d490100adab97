use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[cfg(feature = "metrics")]
use rarsms_metrics::{bridge as bridge_metrics, counter};

/// Process-lifetime delivery counters.
#[derive(Debug, Default)]
pub struct RoutingStats {
    received: AtomicU64,
    sent: AtomicU64,
    routed: AtomicU64,
    adapted: AtomicU64,
    routing_errors: AtomicU64,
    adaptation_errors: AtomicU64,
}

/// Point-in-time copy of [`RoutingStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatisticsSnapshot {
    pub messages_received: u64,
    pub messages_sent: u64,
    pub messages_routed: u64,
    pub messages_adapted: u64,
    pub routing_errors: u64,
    pub adaptation_errors: u64,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Counter {
    Received,
    Sent,
    Routed,
    Adapted,
    RoutingError,
    AdaptationError,
}

impl RoutingStats {
    pub(crate) fn record(&self, counter: Counter, n: u64) {
        let slot = match counter {
            Counter::Received => &self.received,
            Counter::Sent => &self.sent,
            Counter::Routed => &self.routed,
            Counter::Adapted => &self.adapted,
            Counter::RoutingError => &self.routing_errors,
            Counter::AdaptationError => &self.adaptation_errors,
        };
        slot.fetch_add(n, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        {
            let name = match counter {
                Counter::Received => bridge_metrics::MESSAGES_RECEIVED_TOTAL,
                Counter::Sent => bridge_metrics::MESSAGES_SENT_TOTAL,
                Counter::Routed => bridge_metrics::MESSAGES_ROUTED_TOTAL,
                Counter::Adapted => bridge_metrics::MESSAGES_ADAPTED_TOTAL,
                Counter::RoutingError => bridge_metrics::ROUTING_ERRORS_TOTAL,
                Counter::AdaptationError => bridge_metrics::ADAPTATION_ERRORS_TOTAL,
            };
            counter!(name).increment(n);
        }
    }

    pub(crate) fn incr(&self, counter: Counter) {
        self.record(counter, 1);
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            messages_received: self.received.load(Ordering::Relaxed),
            messages_sent: self.sent.load(Ordering::Relaxed),
            messages_routed: self.routed.load(Ordering::Relaxed),
            messages_adapted: self.adapted.load(Ordering::Relaxed),
            routing_errors: self.routing_errors.load(Ordering::Relaxed),
            adaptation_errors: self.adaptation_errors.load(Ordering::Relaxed),
        }
    }
}
