use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

/// Time-bounded set of recently seen packet keys.
///
/// APRS-IS delivers the same packet several times over different paths and
/// digipeaters; the key therefore ignores the path.
#[derive(Debug)]
pub struct Deduplicator {
    ttl: Duration,
    seen: HashMap<String, Instant>,
}

impl Deduplicator {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            seen: HashMap::new(),
        }
    }

    /// Record `key` and report whether it was already seen within the TTL.
    /// Expired keys are purged first.
    pub fn is_duplicate(&mut self, key: &str, now: Instant) -> bool {
        let ttl = self.ttl;
        self.seen
            .retain(|_, seen_at| now.saturating_duration_since(*seen_at) <= ttl);
        if self.seen.contains_key(key) {
            return true;
        }
        self.seen.insert(key.to_string(), now);
        false
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
