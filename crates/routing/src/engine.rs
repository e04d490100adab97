//! The routing engine owns the live channel set, the rule table, statistics
//! and bounded histories.
//!
//! Inbound messages arrive through an [`EngineSink`] registered on every
//! channel. The sink does the bookkeeping (counters, history, universal
//! conversion) and pushes a job onto a bounded queue; dispatch workers drain
//! the queue, adapt each message per target and call the target's
//! `send_message`. A slow target therefore never blocks a receive loop
//! unless the queue is saturated.

use std::{
    collections::BTreeMap,
    panic::AssertUnwindSafe,
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak},
    time::Duration,
};

use {
    async_trait::async_trait,
    futures::{FutureExt, future::join_all},
    tokio::{
        sync::{mpsc, watch},
        task::JoinHandle,
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use {
    rarsms_channels::{
        AdapterFactory, ChannelAdapter, ChannelInfo, ChannelTypeRegistry, Message, MessageSink,
        MessageType, ProtocolCapabilities,
    },
    rarsms_interchange::{ContentAdapter, UniversalMessage, smart_truncate},
};

#[cfg(feature = "metrics")]
use rarsms_metrics::{bridge as bridge_metrics, gauge};

use crate::{
    convert::to_universal,
    history::History,
    rule::RoutingRule,
    stats::{Counter, RoutingStats, StatisticsSnapshot},
};

// ── Configuration ───────────────────────────────────────────────────────────

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Cap for each of the two message histories.
    pub max_history: usize,
    /// Bounded dispatch queue length.
    pub queue_capacity: usize,
    /// Number of dispatch worker tasks.
    pub dispatch_workers: usize,
    /// Per-channel bound on `connect()` and `disconnect()`.
    pub connect_timeout: Duration,
    /// How long `shutdown()` waits for queued work.
    pub drain_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_history: 1000,
            queue_capacity: 256,
            dispatch_workers: 1,
            connect_timeout: Duration::from_secs(30),
            drain_timeout: Duration::from_secs(10),
        }
    }
}

// ── Shared state ────────────────────────────────────────────────────────────

enum DispatchJob {
    Universal(UniversalMessage),
    /// Replies whose per-channel target ids must reach the destination as-is.
    Direct(Message),
}

#[derive(Clone)]
struct ChannelEntry {
    adapter: Arc<dyn ChannelAdapter>,
    capabilities: ProtocolCapabilities,
}

struct EngineInner {
    config: EngineConfig,
    factories: RwLock<ChannelTypeRegistry>,
    channels: RwLock<BTreeMap<String, ChannelEntry>>,
    rules: RwLock<Vec<RoutingRule>>,
    stats: RoutingStats,
    history: Mutex<History<Message>>,
    universal_history: Mutex<History<UniversalMessage>>,
    content: ContentAdapter,
    queue: mpsc::Sender<DispatchJob>,
    /// Jobs queued or in flight.
    pending: watch::Sender<usize>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Receive sink handed to every channel. Holds the engine weakly so a
/// channel never keeps a dropped engine alive.
struct EngineSink {
    inner: Weak<EngineInner>,
}

#[async_trait]
impl MessageSink for EngineSink {
    async fn deliver(&self, message: Message) {
        match self.inner.upgrade() {
            Some(inner) => inner.on_message_received(message).await,
            None => debug!(
                channel = %message.source_protocol,
                "routing engine gone, dropping inbound message"
            ),
        }
    }
}

// ── Engine ──────────────────────────────────────────────────────────────────

/// Routing engine handle. Must be created inside a Tokio runtime.
pub struct RoutingEngine {
    inner: Arc<EngineInner>,
    cancel: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl RoutingEngine {
    pub fn new(config: EngineConfig) -> Self {
        let (queue, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let (pending, _) = watch::channel(0usize);
        let worker_count = config.dispatch_workers.max(1);

        let inner = Arc::new(EngineInner {
            history: Mutex::new(History::new(config.max_history)),
            universal_history: Mutex::new(History::new(config.max_history)),
            config,
            factories: RwLock::new(ChannelTypeRegistry::new()),
            channels: RwLock::new(BTreeMap::new()),
            rules: RwLock::new(Vec::new()),
            stats: RoutingStats::default(),
            content: ContentAdapter::new(),
            queue,
            pending,
        });

        let cancel = CancellationToken::new();
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let workers = (0..worker_count)
            .map(|worker| {
                tokio::spawn(dispatch_loop(
                    worker,
                    Arc::clone(&inner),
                    Arc::clone(&receiver),
                    cancel.clone(),
                ))
            })
            .collect();

        Self {
            inner,
            cancel,
            workers: Mutex::new(workers),
        }
    }

    /// Associate a channel type name with a factory. Last registration wins.
    pub fn register_protocol_type(&self, kind: &str, factory: AdapterFactory) {
        write(&self.inner.factories).register(kind, factory);
        info!(kind, "registered channel type");
    }

    /// Instantiate a channel through its registered factory and add it.
    ///
    /// Returns `false` for unknown types, factory errors and channels whose
    /// configuration is incomplete.
    pub async fn add_protocol(
        &self,
        instance_name: &str,
        kind: &str,
        config: &serde_json::Value,
    ) -> bool {
        let created = read(&self.inner.factories).create(kind, instance_name, config);
        match created {
            Ok(adapter) => self.add_adapter(adapter).await,
            Err(e) => {
                error!(channel = instance_name, kind, error = %e, "cannot create channel");
                false
            },
        }
    }

    /// Add an already constructed channel. A channel with the same name is
    /// replaced and disconnected.
    pub async fn add_adapter(&self, adapter: Arc<dyn ChannelAdapter>) -> bool {
        let name = adapter.name().to_string();
        if !adapter.is_configured() {
            warn!(channel = %name, kind = adapter.kind(), "channel is not configured, skipping");
            return false;
        }

        adapter.set_message_sink(Arc::new(EngineSink {
            inner: Arc::downgrade(&self.inner),
        }));
        let entry = ChannelEntry {
            capabilities: adapter.capabilities(),
            adapter: Arc::clone(&adapter),
        };
        let replaced = write(&self.inner.channels).insert(name.clone(), entry);
        if let Some(old) = replaced {
            warn!(channel = %name, "replacing existing channel");
            old.adapter.disconnect().await;
        }

        info!(channel = %name, kind = adapter.kind(), "added channel");
        #[cfg(feature = "metrics")]
        gauge!(bridge_metrics::CHANNELS_REGISTERED).set(read(&self.inner.channels).len() as f64);
        true
    }

    /// Append a rule; a bidirectional rule also appends its reverse.
    pub fn add_routing_rule(&self, rule: RoutingRule) {
        info!(
            sources = ?rule.source_protocols(),
            targets = ?rule.target_protocols(),
            bidirectional = rule.is_bidirectional(),
            "added routing rule"
        );
        let reverse = rule.is_bidirectional().then(|| rule.reversed());
        let mut rules = write(&self.inner.rules);
        rules.push(rule);
        rules.extend(reverse);
    }

    /// Connect every channel concurrently. One failure never blocks others.
    pub async fn connect_all(&self) -> BTreeMap<String, bool> {
        let timeout = self.inner.config.connect_timeout;
        let attempts = self.adapters().into_iter().map(|(name, adapter)| async move {
            let ok = match tokio::time::timeout(timeout, adapter.connect()).await {
                Ok(true) => {
                    info!(channel = %name, "channel connected");
                    true
                },
                Ok(false) => {
                    error!(channel = %name, "channel failed to connect");
                    false
                },
                Err(_) => {
                    error!(channel = %name, timeout_secs = timeout.as_secs(), "channel connect timed out");
                    false
                },
            };
            (name, ok)
        });
        let results: BTreeMap<String, bool> = join_all(attempts).await.into_iter().collect();

        #[cfg(feature = "metrics")]
        gauge!(bridge_metrics::CHANNELS_CONNECTED)
            .set(results.values().filter(|ok| **ok).count() as f64);
        results
    }

    pub async fn disconnect_all(&self) -> BTreeMap<String, bool> {
        let timeout = self.inner.config.connect_timeout;
        let attempts = self.adapters().into_iter().map(|(name, adapter)| async move {
            let ok = match tokio::time::timeout(timeout, adapter.disconnect()).await {
                Ok(ok) => ok,
                Err(_) => {
                    warn!(channel = %name, "channel disconnect timed out");
                    false
                },
            };
            (name, ok)
        });
        let results = join_all(attempts).await.into_iter().collect();

        #[cfg(feature = "metrics")]
        gauge!(bridge_metrics::CHANNELS_CONNECTED).set(0.0);
        results
    }

    /// Send a message from outside any channel.
    ///
    /// With explicit targets the message goes verbatim to each of them;
    /// otherwise it is routed by the rule table without adaptation. Returns
    /// whether at least one channel accepted it.
    pub async fn send_message(&self, mut message: Message, targets: &[String]) -> bool {
        if targets.is_empty() {
            return self.inner.route_direct(&message).await > 0;
        }

        for target in targets {
            message.add_target(target.as_str(), None);
        }
        let mut delivered = 0;
        for target in message.target_protocols() {
            match self.inner.channel(target) {
                Some(entry) => {
                    if self.inner.deliver(target, &entry, &message).await {
                        delivered += 1;
                    }
                },
                None => warn!(target_channel = %target, "target channel not registered"),
            }
        }
        delivered > 0
    }

    /// Resolves once no dispatch job is queued or in flight.
    pub async fn wait_idle(&self) {
        let mut pending = self.inner.pending.subscribe();
        // Only errors once the sender is dropped, which outlives `self`.
        let _ = pending.wait_for(|n| *n == 0).await;
    }

    /// Drain queued work (bounded), stop the workers and disconnect every
    /// channel. Work still queued after the drain timeout is dropped.
    pub async fn shutdown(&self) -> BTreeMap<String, bool> {
        let drain = self.inner.config.drain_timeout;
        if tokio::time::timeout(drain, self.wait_idle()).await.is_err() {
            warn!(
                pending = *self.inner.pending.borrow(),
                "dispatch queue not drained before shutdown"
            );
        }
        self.cancel.cancel();
        let workers = std::mem::take(&mut *lock(&self.workers));
        for handle in workers {
            if let Err(e) = handle.await {
                warn!(error = %e, "dispatch worker ended abnormally");
            }
        }
        // Jobs still queued after the workers stop are never processed.
        let discarded = self.inner.pending.send_replace(0);
        if discarded > 0 {
            warn!(discarded, "dropping undelivered dispatch jobs");
        }
        let results = self.disconnect_all().await;
        info!(statistics = ?self.statistics(), "routing engine stopped");
        results
    }

    // ── Status queries ──────────────────────────────────────────────────────

    pub fn protocol_status(&self) -> BTreeMap<String, ChannelInfo> {
        read(&self.inner.channels)
            .iter()
            .map(|(name, entry)| (name.clone(), entry.adapter.info()))
            .collect()
    }

    pub fn statistics(&self) -> StatisticsSnapshot {
        self.inner.stats.snapshot()
    }

    pub fn connected_protocols(&self) -> Vec<String> {
        read(&self.inner.channels)
            .iter()
            .filter(|(_, entry)| entry.adapter.is_connected())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// The newest `limit` inbound messages, oldest first. `0` returns all.
    pub fn recent_messages(&self, limit: usize) -> Vec<Message> {
        lock(&self.inner.history).recent(limit)
    }

    pub fn recent_universal_messages(&self, limit: usize) -> Vec<UniversalMessage> {
        lock(&self.inner.universal_history).recent(limit)
    }

    pub fn routing_rules(&self) -> Vec<RoutingRule> {
        read(&self.inner.rules).clone()
    }

    pub fn clear_history(&self) {
        lock(&self.inner.history).clear();
        lock(&self.inner.universal_history).clear();
        info!("message history cleared");
    }

    fn adapters(&self) -> Vec<(String, Arc<dyn ChannelAdapter>)> {
        read(&self.inner.channels)
            .iter()
            .map(|(name, entry)| (name.clone(), Arc::clone(&entry.adapter)))
            .collect()
    }
}

impl Drop for RoutingEngine {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Dispatch ────────────────────────────────────────────────────────────────

async fn dispatch_loop(
    worker: usize,
    inner: Arc<EngineInner>,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<DispatchJob>>>,
    cancel: CancellationToken,
) {
    debug!(worker, "dispatch worker started");
    loop {
        let job = {
            let mut receiver = receiver.lock().await;
            tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                job = receiver.recv() => job,
            }
        };
        let Some(job) = job else {
            break;
        };

        if AssertUnwindSafe(inner.process(job))
            .catch_unwind()
            .await
            .is_err()
        {
            error!(worker, "dispatch job panicked");
            inner.stats.incr(Counter::RoutingError);
        }
        inner.pending.send_modify(|n| *n = n.saturating_sub(1));
    }
    debug!(worker, "dispatch worker stopped");
}

impl EngineInner {
    fn channel(&self, name: &str) -> Option<ChannelEntry> {
        read(&self.channels).get(name).cloned()
    }

    async fn on_message_received(&self, message: Message) {
        self.stats.incr(Counter::Received);
        info!(
            channel = %message.source_protocol,
            sender = %message.source_id,
            kind = %message.message_type,
            id = message.message_id(),
            "received message"
        );

        lock(&self.history).push(message.clone());
        let job = if message.is_direct_reply() {
            DispatchJob::Direct(message)
        } else {
            let universal = to_universal(&message);
            lock(&self.universal_history).push(universal.clone());
            DispatchJob::Universal(universal)
        };
        self.enqueue(job).await;
    }

    async fn enqueue(&self, job: DispatchJob) {
        self.pending.send_modify(|n| *n += 1);
        let job = match self.queue.try_send(job) {
            Ok(()) => return,
            Err(mpsc::error::TrySendError::Full(job)) => {
                warn!(
                    capacity = self.config.queue_capacity,
                    "dispatch queue full, applying backpressure"
                );
                job
            },
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.pending.send_modify(|n| *n = n.saturating_sub(1));
                warn!("dispatch queue closed, dropping message");
                return;
            },
        };
        if self.queue.send(job).await.is_err() {
            self.pending.send_modify(|n| *n = n.saturating_sub(1));
            warn!("dispatch queue closed, dropping message");
        }
    }

    async fn process(&self, job: DispatchJob) {
        match job {
            DispatchJob::Universal(message) => {
                self.route_universal(&message).await;
            },
            DispatchJob::Direct(message) => {
                self.route_direct(&message).await;
            },
        }
    }

    /// Union of targets over every matching rule, minus the source.
    fn resolve_targets(&self, source: &str, kind: MessageType, sender: &str) -> Vec<String> {
        let rules = read(&self.rules);
        let mut targets: Vec<String> = Vec::new();
        for rule in rules.iter().filter(|r| r.matches(source, kind, sender)) {
            for target in rule.target_protocols() {
                if target != source && !targets.contains(target) {
                    targets.push(target.clone());
                }
            }
        }
        targets
    }

    async fn route_universal(&self, message: &UniversalMessage) -> usize {
        let targets = self.resolve_targets(
            &message.source_protocol,
            message.message_type,
            &message.source_id,
        );
        if targets.is_empty() {
            debug!(
                channel = %message.source_protocol,
                kind = %message.message_type,
                id = message.message_id(),
                "no routing targets, dropping message"
            );
            return 0;
        }

        let mut delivered = 0;
        for target in &targets {
            let Some(entry) = self.channel(target) else {
                warn!(target_channel = %target, "target channel not registered");
                continue;
            };
            let renderings = match self.content.try_adapt(message, &entry.capabilities, target) {
                Ok(renderings) => renderings,
                Err(e) => {
                    self.stats.incr(Counter::AdaptationError);
                    warn!(target_channel = %target, error = %e, "adaptation failed, using fallback");
                    vec![self.content.fallback(message, &entry.capabilities)]
                },
            };
            self.stats.record(Counter::Adapted, renderings.len() as u64);

            for rendering in renderings {
                let outbound = rendering.into_message(target);
                if self.deliver(target, &entry, &outbound).await {
                    delivered += 1;
                }
            }
        }
        if delivered > 0 {
            self.stats.incr(Counter::Routed);
        }
        delivered
    }

    async fn route_direct(&self, message: &Message) -> usize {
        let targets = self.resolve_targets(
            &message.source_protocol,
            message.message_type,
            &message.source_id,
        );
        if targets.is_empty() {
            debug!(
                channel = %message.source_protocol,
                id = message.message_id(),
                "no routing targets for direct message"
            );
            return 0;
        }

        let mut delivered = 0;
        for target in &targets {
            let Some(entry) = self.channel(target) else {
                warn!(target_channel = %target, "target channel not registered");
                continue;
            };
            let mut outbound = message.clone();
            outbound.add_target(target.as_str(), None);
            if let Some(max) = entry.capabilities.max_message_length
                && outbound.content.chars().count() > max
            {
                outbound.content = smart_truncate(&outbound.content, max);
            }
            if self.deliver(target, &entry, &outbound).await {
                delivered += 1;
            }
        }
        if delivered > 0 {
            self.stats.incr(Counter::Routed);
        }
        delivered
    }

    async fn deliver(&self, target: &str, entry: &ChannelEntry, message: &Message) -> bool {
        if let Err(reason) = entry.adapter.validate_message(message) {
            self.stats.incr(Counter::RoutingError);
            warn!(target_channel = target, id = message.message_id(), %reason, "message rejected");
            return false;
        }
        if entry.adapter.send_message(message).await {
            self.stats.incr(Counter::Sent);
            info!(target_channel = target, id = message.message_id(), "sent message");
            true
        } else {
            self.stats.incr(Counter::RoutingError);
            warn!(target_channel = target, id = message.message_id(), "target failed to send message");
            false
        }
    }
}
