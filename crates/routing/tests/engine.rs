#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use {async_trait::async_trait, serde_json::json};

use {
    rarsms_channels::{
        AdapterCore, AdapterFactory, ChannelAdapter, ConnectionState, Message, MessageSink,
        MessageType, ProtocolCapabilities,
    },
    rarsms_routing::{EngineConfig, RoutingEngine, RoutingRule},
};

// ── Test double ─────────────────────────────────────────────────────────────

struct MockChannel {
    core: AdapterCore,
    caps: ProtocolCapabilities,
    accept: bool,
    connect_ok: bool,
    connect_delay: Option<Duration>,
    send_delay: Option<Duration>,
    sent: Mutex<Vec<Message>>,
}

impl MockChannel {
    fn new(name: &str) -> Self {
        Self {
            core: AdapterCore::new(name, true),
            caps: ProtocolCapabilities {
                supports_position: true,
                ..ProtocolCapabilities::default()
            },
            accept: true,
            connect_ok: true,
            connect_delay: None,
            send_delay: None,
            sent: Mutex::new(Vec::new()),
        }
    }

    fn max_len(mut self, max: usize) -> Self {
        self.caps.max_message_length = Some(max);
        self
    }

    fn failing(mut self) -> Self {
        self.accept = false;
        self
    }

    fn unconfigured(name: &str) -> Self {
        Self {
            core: AdapterCore::new(name, false),
            ..Self::new(name)
        }
    }

    async fn inject(&self, message: Message) {
        assert!(self.core.emit(message).await, "no sink registered");
    }

    fn sent(&self) -> Vec<Message> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelAdapter for MockChannel {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn kind(&self) -> &str {
        "mock"
    }

    fn capabilities(&self) -> ProtocolCapabilities {
        self.caps
    }

    fn is_configured(&self) -> bool {
        self.core.state() != ConnectionState::Unconfigured
    }

    fn state(&self) -> ConnectionState {
        self.core.state()
    }

    async fn connect(&self) -> bool {
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if self.connect_ok {
            self.core.set_state(ConnectionState::Connected);
        }
        self.connect_ok
    }

    async fn disconnect(&self) -> bool {
        self.core.set_state(ConnectionState::Disconnected);
        true
    }

    async fn send_message(&self, message: &Message) -> bool {
        if let Some(delay) = self.send_delay {
            tokio::time::sleep(delay).await;
        }
        if !self.accept {
            return false;
        }
        self.sent.lock().unwrap().push(message.clone());
        true
    }

    fn set_message_sink(&self, sink: Arc<dyn MessageSink>) {
        self.core.set_sink(sink);
    }
}

fn text(source: &str, sender: &str, content: &str) -> Message {
    Message::new(source, sender, MessageType::Text, content)
}

async fn engine_with(channels: &[Arc<MockChannel>]) -> RoutingEngine {
    let engine = RoutingEngine::new(EngineConfig::default());
    for channel in channels {
        assert!(engine.add_adapter(Arc::clone(channel) as Arc<dyn ChannelAdapter>).await);
    }
    engine
}

// ── Routing ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn matching_rules_contribute_a_union_of_targets() {
    let a = Arc::new(MockChannel::new("a"));
    let b = Arc::new(MockChannel::new("b"));
    let c = Arc::new(MockChannel::new("c"));
    let engine = engine_with(&[a.clone(), b.clone(), c.clone()]).await;
    engine.add_routing_rule(RoutingRule::new(["a"], ["b"]).unwrap());
    engine.add_routing_rule(RoutingRule::new(["a"], ["c"]).unwrap().bidirectional(true));
    assert_eq!(engine.routing_rules().len(), 3);

    a.inject(text("a", "W1AW", "hello")).await;
    engine.wait_idle().await;
    assert_eq!(b.sent().len(), 1);
    assert_eq!(c.sent().len(), 1);
    assert!(a.sent().is_empty());

    c.inject(text("c", "alice", "reply")).await;
    engine.wait_idle().await;
    assert_eq!(a.sent().len(), 1);
    assert_eq!(b.sent().len(), 1);

    let stats = engine.statistics();
    assert_eq!(stats.messages_received, 2);
    assert_eq!(stats.messages_sent, 3);
    assert_eq!(stats.messages_routed, 2);
    assert_eq!(stats.routing_errors, 0);
}

#[tokio::test]
async fn source_is_never_a_target() {
    let a = Arc::new(MockChannel::new("a"));
    let b = Arc::new(MockChannel::new("b"));
    let engine = engine_with(&[a.clone(), b.clone()]).await;
    engine.add_routing_rule(RoutingRule::new(["a", "b"], ["a", "b"]).unwrap());

    a.inject(text("a", "W1AW", "no echo")).await;
    engine.wait_idle().await;
    assert!(a.sent().is_empty());
    assert_eq!(b.sent().len(), 1);
}

#[tokio::test]
async fn one_failing_target_does_not_block_others() {
    let a = Arc::new(MockChannel::new("a"));
    let b = Arc::new(MockChannel::new("b").failing());
    let c = Arc::new(MockChannel::new("c"));
    let engine = engine_with(&[a.clone(), b.clone(), c.clone()]).await;
    engine.add_routing_rule(RoutingRule::new(["a"], ["b", "c"]).unwrap());

    a.inject(text("a", "W1AW", "hello")).await;
    engine.wait_idle().await;

    assert_eq!(c.sent().len(), 1);
    let stats = engine.statistics();
    assert_eq!(stats.routing_errors, 1);
    assert_eq!(stats.messages_sent, 1);
    assert_eq!(stats.messages_routed, 1);
}

#[tokio::test]
async fn unmatched_messages_are_recorded_but_not_sent() {
    let a = Arc::new(MockChannel::new("a"));
    let b = Arc::new(MockChannel::new("b"));
    let engine = engine_with(&[a.clone(), b.clone()]).await;
    engine.add_routing_rule(
        RoutingRule::new(["a"], ["b"])
            .unwrap()
            .with_message_types([MessageType::Emergency]),
    );

    a.inject(text("a", "W1AW", "routine")).await;
    engine.wait_idle().await;

    assert!(b.sent().is_empty());
    assert_eq!(engine.statistics().messages_received, 1);
    assert_eq!(engine.statistics().messages_sent, 0);
    assert_eq!(engine.recent_messages(0).len(), 1);
}

#[tokio::test]
async fn source_filter_restricts_senders() {
    let a = Arc::new(MockChannel::new("a"));
    let b = Arc::new(MockChannel::new("b"));
    let engine = engine_with(&[a.clone(), b.clone()]).await;
    engine.add_routing_rule(
        RoutingRule::new(["a"], ["b"])
            .unwrap()
            .with_source_filter("^W1")
            .unwrap(),
    );

    a.inject(text("a", "K4XYZ", "filtered")).await;
    a.inject(text("a", "W1AW", "passes")).await;
    engine.wait_idle().await;

    let sent = b.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].content.starts_with("passes"));
}

#[tokio::test]
async fn unregistered_targets_are_skipped() {
    let a = Arc::new(MockChannel::new("a"));
    let b = Arc::new(MockChannel::new("b"));
    let engine = engine_with(&[a.clone(), b.clone()]).await;
    engine.add_routing_rule(RoutingRule::new(["a"], ["ghost", "b"]).unwrap());

    a.inject(text("a", "W1AW", "hello")).await;
    engine.wait_idle().await;

    assert_eq!(b.sent().len(), 1);
    assert_eq!(engine.statistics().routing_errors, 0);
}

// ── Adaptation ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn outbound_renderings_fit_the_target() {
    let discord = Arc::new(MockChannel::new("discord_main"));
    let aprs = Arc::new(MockChannel::new("aprs_main").max_len(20));
    let engine = engine_with(&[discord.clone(), aprs.clone()]).await;
    engine.add_routing_rule(RoutingRule::new(["discord_main"], ["aprs_main"]).unwrap());

    let inbound = text(
        "discord_main",
        "alice",
        "Net tonight at seven on the club repeater, bring your radios",
    );
    let id = inbound.message_id().to_string();
    discord.inject(inbound).await;
    engine.wait_idle().await;

    let sent = aprs.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].content.chars().count() <= 20);
    assert!(sent[0].content.ends_with("..."));
    assert_eq!(sent[0].message_id(), id);
    assert_eq!(sent[0].target_protocols(), ["aprs_main"]);
    assert_eq!(engine.statistics().messages_adapted, 1);
}

#[tokio::test]
async fn unlimited_targets_receive_attribution() {
    let aprs = Arc::new(MockChannel::new("aprs_main"));
    let discord = Arc::new(MockChannel::new("discord_main"));
    let engine = engine_with(&[aprs.clone(), discord.clone()]).await;
    engine.add_routing_rule(RoutingRule::new(["aprs_main"], ["discord_main"]).unwrap());

    aprs.inject(text("aprs_main", "W1AW", "hello")).await;
    engine.wait_idle().await;

    let sent = discord.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].content.starts_with("hello"));
    assert!(sent[0].content.contains("From: aprs_main:W1AW"));
}

#[tokio::test]
async fn zero_length_targets_use_the_fallback() {
    let a = Arc::new(MockChannel::new("a"));
    let b = Arc::new(MockChannel::new("b").max_len(0));
    let engine = engine_with(&[a.clone(), b.clone()]).await;
    engine.add_routing_rule(RoutingRule::new(["a"], ["b"]).unwrap());

    a.inject(text("a", "W1AW", "hello")).await;
    engine.wait_idle().await;

    let stats = engine.statistics();
    assert_eq!(stats.adaptation_errors, 1);
    assert_eq!(stats.messages_adapted, 1);
    assert_eq!(b.sent().len(), 1);
    assert!(b.sent()[0].content.is_empty());
}

// ── Direct replies ──────────────────────────────────────────────────────────

#[tokio::test]
async fn direct_replies_bypass_conversion() {
    let discord = Arc::new(MockChannel::new("discord_main"));
    let aprs = Arc::new(MockChannel::new("aprs_main").max_len(67));
    let engine = engine_with(&[discord.clone(), aprs.clone()]).await;
    engine.add_routing_rule(
        RoutingRule::new(["aprs_main"], ["discord_main"])
            .unwrap()
            .bidirectional(true),
    );

    let mut reply = text("discord_main", "alice", "Roger, see you on the net");
    reply.metadata.direct_reply = true;
    reply.add_target("aprs_main", Some("W1AW".into()));
    discord.inject(reply).await;
    engine.wait_idle().await;

    let sent = aprs.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].content, "Roger, see you on the net");
    assert_eq!(sent[0].target_ids["aprs_main"], "W1AW");
    assert!(engine.recent_universal_messages(0).is_empty());
    assert_eq!(engine.statistics().messages_adapted, 0);
}

#[tokio::test]
async fn direct_replies_are_cut_to_the_target_limit() {
    let discord = Arc::new(MockChannel::new("discord_main"));
    let aprs = Arc::new(MockChannel::new("aprs_main").max_len(20));
    let engine = engine_with(&[discord.clone(), aprs.clone()]).await;
    engine.add_routing_rule(RoutingRule::new(["discord_main"], ["aprs_main"]).unwrap());

    let mut reply = text(
        "discord_main",
        "alice",
        "This reply is far too long for a radio",
    );
    reply.metadata.direct_reply = true;
    discord.inject(reply).await;
    engine.wait_idle().await;

    let sent = aprs.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].content.chars().count() <= 20);
}

// ── Registration and lifecycle ──────────────────────────────────────────────

#[tokio::test]
async fn add_protocol_uses_registered_factories() {
    let engine = RoutingEngine::new(EngineConfig::default());
    let factory: AdapterFactory = Arc::new(|name: &str, config: &serde_json::Value| {
        let channel = if config["configured"].as_bool().unwrap_or(false) {
            MockChannel::new(name)
        } else {
            MockChannel::unconfigured(name)
        };
        Ok(Arc::new(channel) as Arc<dyn ChannelAdapter>)
    });
    engine.register_protocol_type("mock", factory);

    assert!(!engine.add_protocol("x", "missing", &json!({})).await);
    assert!(!engine.add_protocol("x", "mock", &json!({"configured": false})).await);
    assert!(engine.add_protocol("x", "mock", &json!({"configured": true})).await);

    let status = engine.protocol_status();
    assert_eq!(status.len(), 1);
    assert_eq!(status["x"].kind, "mock");
    assert_eq!(status["x"].state, ConnectionState::Configured);
}

#[tokio::test]
async fn connect_all_isolates_failures_and_timeouts() {
    let good = Arc::new(MockChannel::new("good"));
    let bad = Arc::new(MockChannel {
        connect_ok: false,
        ..MockChannel::new("bad")
    });
    let slow = Arc::new(MockChannel {
        connect_delay: Some(Duration::from_secs(5)),
        ..MockChannel::new("slow")
    });
    let engine = RoutingEngine::new(EngineConfig {
        connect_timeout: Duration::from_millis(50),
        ..EngineConfig::default()
    });
    for channel in [&good, &bad, &slow] {
        engine.add_adapter(Arc::clone(channel) as Arc<dyn ChannelAdapter>).await;
    }

    let results = engine.connect_all().await;
    assert!(results["good"]);
    assert!(!results["bad"]);
    assert!(!results["slow"]);
    assert_eq!(engine.connected_protocols(), vec!["good".to_string()]);

    let results = engine.shutdown().await;
    assert!(results.values().all(|ok| *ok));
    assert!(engine.connected_protocols().is_empty());
}

#[tokio::test]
async fn shutdown_drops_undrained_jobs_and_settles_idle() {
    let a = Arc::new(MockChannel::new("a"));
    let b = Arc::new(MockChannel {
        send_delay: Some(Duration::from_millis(200)),
        ..MockChannel::new("b")
    });
    let engine = RoutingEngine::new(EngineConfig {
        dispatch_workers: 1,
        drain_timeout: Duration::from_millis(20),
        ..EngineConfig::default()
    });
    for channel in [&a, &b] {
        engine.add_adapter(Arc::clone(channel) as Arc<dyn ChannelAdapter>).await;
    }
    engine.add_routing_rule(RoutingRule::new(["a"], ["b"]).unwrap());
    engine.connect_all().await;

    for n in 0..3 {
        a.inject(text("a", "W1AW", &format!("msg {n}"))).await;
    }
    engine.shutdown().await;

    tokio::time::timeout(Duration::from_secs(1), engine.wait_idle())
        .await
        .expect("wait_idle should resolve after shutdown");
    assert!(b.sent().len() < 3);
}

#[tokio::test]
async fn replacing_a_channel_disconnects_the_old_one() {
    let first = Arc::new(MockChannel::new("a"));
    let engine = engine_with(&[first.clone()]).await;
    engine.connect_all().await;

    let second = Arc::new(MockChannel::new("a"));
    assert!(engine.add_adapter(second as Arc<dyn ChannelAdapter>).await);
    assert_eq!(first.state(), ConnectionState::Disconnected);
    assert_eq!(engine.protocol_status().len(), 1);
}

#[tokio::test]
async fn history_is_bounded_and_clearable() {
    let a = Arc::new(MockChannel::new("a"));
    let engine = RoutingEngine::new(EngineConfig {
        max_history: 3,
        ..EngineConfig::default()
    });
    engine.add_adapter(a.clone() as Arc<dyn ChannelAdapter>).await;

    for i in 0..5 {
        a.inject(text("a", "W1AW", &format!("msg {i}"))).await;
    }
    engine.wait_idle().await;

    let recent = engine.recent_messages(0);
    assert_eq!(recent.len(), 3);
    assert_eq!(recent[0].content, "msg 2");
    assert_eq!(engine.recent_messages(1)[0].content, "msg 4");
    assert_eq!(engine.recent_universal_messages(0).len(), 3);

    engine.clear_history();
    assert!(engine.recent_messages(0).is_empty());
    assert!(engine.recent_universal_messages(0).is_empty());
}

#[tokio::test]
async fn send_message_with_explicit_targets() {
    let a = Arc::new(MockChannel::new("a"));
    let b = Arc::new(MockChannel::new("b"));
    let engine = engine_with(&[a.clone(), b.clone()]).await;

    let sent = engine
        .send_message(text("system", "bridge", "maintenance at noon"), &[
            "b".to_string(),
            "nowhere".to_string(),
        ])
        .await;
    assert!(sent);
    assert_eq!(b.sent()[0].content, "maintenance at noon");
    assert!(a.sent().is_empty());
    assert_eq!(engine.statistics().messages_sent, 1);
}

#[tokio::test]
async fn send_message_without_targets_follows_rules() {
    let a = Arc::new(MockChannel::new("a"));
    let b = Arc::new(MockChannel::new("b"));
    let engine = engine_with(&[a.clone(), b.clone()]).await;
    engine.add_routing_rule(RoutingRule::new(["a"], ["b"]).unwrap());

    assert!(engine.send_message(text("a", "bridge", "routed"), &[]).await);
    assert!(!engine.send_message(text("b", "bridge", "nowhere"), &[]).await);
    assert_eq!(b.sent().len(), 1);
}
