use std::sync::{Arc, RwLock};

use {async_trait::async_trait, serde::Serialize, tracing::debug};

use crate::{
    capabilities::ProtocolCapabilities,
    message::{Message, MessageType},
};

// ── Connection state ────────────────────────────────────────────────────────

/// Lifecycle of a channel adapter instance.
///
/// `Unconfigured → Configured → Connected → Disconnected`; a fresh
/// `connect()` is the only way out of `Disconnected`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Unconfigured,
    Configured,
    Connected,
    Disconnected,
}

// ── Receive side ────────────────────────────────────────────────────────────

/// Receiver for inbound messages. The routing engine provides the concrete
/// implementation; an adapter holds at most one.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Deliver one fully parsed inbound message.
    async fn deliver(&self, message: Message);
}

/// Status snapshot of a channel instance.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelInfo {
    pub name: String,
    pub kind: String,
    pub state: ConnectionState,
    pub connected: bool,
    pub capabilities: ProtocolCapabilities,
}

// ── Adapter contract ────────────────────────────────────────────────────────

/// Contract every transport (radio, chat, storage) implements so the routing
/// engine can treat them uniformly.
///
/// Expected failures (not connected, validation, transport errors) are
/// reported as `false`, never as panics.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Instance name, e.g. `aprs_main`.
    fn name(&self) -> &str;

    /// Channel type, e.g. `aprs`.
    fn kind(&self) -> &str;

    fn capabilities(&self) -> ProtocolCapabilities;

    /// Whether the adapter's own config is sufficient. No side effects.
    fn is_configured(&self) -> bool;

    fn state(&self) -> ConnectionState;

    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Establish connectivity and start any background receive loop.
    async fn connect(&self) -> bool;

    /// Tear down transport and background work. Safe to call repeatedly.
    async fn disconnect(&self) -> bool;

    async fn send_message(&self, message: &Message) -> bool;

    /// Register the receive sink, replacing any previous one.
    fn set_message_sink(&self, sink: Arc<dyn MessageSink>);

    /// Check whether `message` can be sent as-is.
    fn validate_message(&self, message: &Message) -> Result<(), String> {
        validate_against(&self.capabilities(), message)
    }

    /// Parse one raw inbound frame into a canonical message.
    fn parse_message(&self, _raw: &str) -> Option<Message> {
        None
    }

    fn info(&self) -> ChannelInfo {
        ChannelInfo {
            name: self.name().to_string(),
            kind: self.kind().to_string(),
            state: self.state(),
            connected: self.is_connected(),
            capabilities: self.capabilities(),
        }
    }
}

/// Capability-based validation shared by every adapter.
pub fn validate_against(caps: &ProtocolCapabilities, message: &Message) -> Result<(), String> {
    if !caps.can_send {
        return Err("channel does not support sending".into());
    }
    if message.message_type == MessageType::Position && !caps.supports_position {
        return Err("channel does not support position messages".into());
    }
    if let Some(max) = caps.max_message_length {
        let len = message.content.chars().count();
        if len > max {
            return Err(format!("message too long ({len} > {max} characters)"));
        }
    }
    Ok(())
}

// ── Shared adapter state ────────────────────────────────────────────────────

/// Name, lifecycle state and receive sink, shared by concrete adapters.
///
/// Locks are synchronous and never held across `.await` points.
pub struct AdapterCore {
    name: String,
    state: RwLock<ConnectionState>,
    sink: RwLock<Option<Arc<dyn MessageSink>>>,
}

impl AdapterCore {
    pub fn new(name: impl Into<String>, configured: bool) -> Self {
        let state = if configured {
            ConnectionState::Configured
        } else {
            ConnectionState::Unconfigured
        };
        Self {
            name: name.into(),
            state: RwLock::new(state),
            sink: RwLock::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_state(&self, state: ConnectionState) {
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = state;
    }

    pub fn set_sink(&self, sink: Arc<dyn MessageSink>) {
        *self.sink.write().unwrap_or_else(|e| e.into_inner()) = Some(sink);
    }

    fn sink(&self) -> Option<Arc<dyn MessageSink>> {
        self.sink.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Hand an inbound message to the registered sink.
    ///
    /// Returns `false` when no sink is registered.
    pub async fn emit(&self, message: Message) -> bool {
        let Some(sink) = self.sink() else {
            debug!(channel = %self.name, "no message sink registered, dropping inbound message");
            return false;
        };
        sink.deliver(message).await;
        true
    }
}
