//! Canonical, protocol-neutral message envelope.
//!
//! Every channel adapter parses its native frames into a [`Message`] before
//! handing them to the routing engine, and every outbound rendering is turned
//! back into a [`Message`] before it reaches a destination adapter.

use std::{collections::BTreeMap, fmt, str::FromStr};

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

use crate::Error;

/// Length of generated message identifiers.
const MESSAGE_ID_LEN: usize = 8;

/// Generate a short opaque message identifier.
#[must_use]
pub fn generate_message_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(MESSAGE_ID_LEN);
    id
}

// ── Message type ────────────────────────────────────────────────────────────

/// Classification of a message, independent of its urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[serde(alias = "TEXT")]
    Text,
    #[serde(alias = "POSITION")]
    Position,
    #[serde(alias = "STATUS")]
    Status,
    #[serde(alias = "EMERGENCY")]
    Emergency,
}

impl MessageType {
    pub const ALL: [Self; 4] = [Self::Text, Self::Position, Self::Status, Self::Emergency];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Position => "position",
            Self::Status => "status",
            Self::Emergency => "emergency",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::invalid_input(format!("unknown message type: {s}")))
    }
}

// ── Metadata ────────────────────────────────────────────────────────────────

/// Geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
}

impl Position {
    #[must_use]
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Link to a web map centred on this position.
    #[must_use]
    pub fn map_url(&self) -> String {
        format!("https://maps.google.com/?q={},{}", self.lat, self.lon)
    }
}

/// Protocol-specific extras carried alongside a message.
///
/// Well-known fields are typed; anything else a driver wants to keep goes in
/// `extra`, which is flattened on serialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Raw frame as received on the wire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_frame: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addressee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_no: Option<String>,
    /// Set on replies whose `target_ids` must reach the destination untouched.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub direct_reply: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl MessageMetadata {
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.extra.insert(key.into(), value.into());
    }

    /// Human-displayable `(key, value)` pairs, in a stable order.
    ///
    /// Position and raw frame are excluded; they are either rendered
    /// separately or meaningless to a reader.
    #[must_use]
    pub fn display_entries(&self) -> Vec<(String, String)> {
        let mut entries = Vec::new();
        if let Some(addressee) = &self.addressee {
            entries.push(("addressee".to_string(), addressee.clone()));
        }
        if let Some(msg_no) = &self.msg_no {
            entries.push(("msg_no".to_string(), msg_no.clone()));
        }
        for (key, value) in &self.extra {
            let rendered = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => continue,
                other => other.to_string(),
            };
            entries.push((key.clone(), rendered));
        }
        entries
    }
}

// ── Message ─────────────────────────────────────────────────────────────────

/// Canonical in-flight message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    message_id: String,
    pub source_protocol: String,
    pub source_id: String,
    pub message_type: MessageType,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: MessageMetadata,
    target_protocols: Vec<String>,
    pub target_ids: BTreeMap<String, String>,
    pub thread_id: Option<String>,
    pub reply_to: Option<String>,
}

impl Message {
    pub fn new(
        source_protocol: impl Into<String>,
        source_id: impl Into<String>,
        message_type: MessageType,
        content: impl Into<String>,
    ) -> Self {
        Self {
            message_id: generate_message_id(),
            source_protocol: source_protocol.into(),
            source_id: source_id.into(),
            message_type,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: MessageMetadata::default(),
            target_protocols: Vec::new(),
            target_ids: BTreeMap::new(),
            thread_id: None,
            reply_to: None,
        }
    }

    /// Use a specific identifier. An empty id keeps the generated one.
    #[must_use]
    pub fn with_id(mut self, message_id: impl Into<String>) -> Self {
        let id = message_id.into();
        if !id.is_empty() {
            self.message_id = id;
        }
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: MessageMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Attach a position; the message type is left as-is.
    #[must_use]
    pub fn with_position(mut self, lat: f64, lon: f64) -> Self {
        self.metadata.position = Some(Position::new(lat, lon));
        self
    }

    #[must_use]
    pub fn with_thread(mut self, thread_id: Option<String>, reply_to: Option<String>) -> Self {
        self.thread_id = thread_id;
        self.reply_to = reply_to;
        self
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn target_protocols(&self) -> &[String] {
        &self.target_protocols
    }

    /// Add a destination channel. Repeated names are ignored for the set but
    /// still update the per-channel target id when one is supplied.
    pub fn add_target(&mut self, protocol: impl Into<String>, target_id: Option<String>) {
        let protocol = protocol.into();
        if let Some(id) = target_id {
            self.target_ids.insert(protocol.clone(), id);
        }
        if !self.target_protocols.contains(&protocol) {
            self.target_protocols.push(protocol);
        }
    }

    /// Position data, only for POSITION messages.
    pub fn position(&self) -> Option<Position> {
        match self.message_type {
            MessageType::Position => self.metadata.position,
            _ => None,
        }
    }

    pub fn is_emergency(&self) -> bool {
        self.message_type == MessageType::Emergency
    }

    pub fn is_direct_reply(&self) -> bool {
        self.metadata.direct_reply
    }

    /// Serialization view with every field by name.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
