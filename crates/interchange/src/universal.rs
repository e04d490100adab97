use std::collections::BTreeMap;

use {
    chrono::{DateTime, Utc},
    serde::Serialize,
};

use rarsms_channels::{MessageMetadata, MessageType, Position, generate_message_id};

use crate::block::{ContentBlock, ContentPriority, content_type};

/// Prioritized, capability-agnostic message used as the adaptation source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UniversalMessage {
    message_id: String,
    pub source_protocol: String,
    pub source_id: String,
    pub timestamp: DateTime<Utc>,
    pub message_type: MessageType,
    pub urgency: ContentPriority,
    content_blocks: Vec<ContentBlock>,
    pub position: Option<Position>,
    pub attachments: Vec<serde_json::Value>,
    pub metadata: MessageMetadata,
    target_protocols: Vec<String>,
    pub target_ids: BTreeMap<String, String>,
    pub thread_id: Option<String>,
    pub reply_to: Option<String>,
}

impl UniversalMessage {
    pub fn new(
        source_protocol: impl Into<String>,
        source_id: impl Into<String>,
        message_type: MessageType,
    ) -> Self {
        Self {
            message_id: generate_message_id(),
            source_protocol: source_protocol.into(),
            source_id: source_id.into(),
            timestamp: Utc::now(),
            message_type,
            urgency: ContentPriority::Medium,
            content_blocks: Vec::new(),
            position: None,
            attachments: Vec::new(),
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
    pub fn with_urgency(mut self, urgency: ContentPriority) -> Self {
        self.urgency = urgency;
        self
    }

    /// Plain text message with a single text block.
    pub fn text(
        source_protocol: impl Into<String>,
        source_id: impl Into<String>,
        text: impl Into<String>,
        priority: ContentPriority,
    ) -> Self {
        let mut msg = Self::new(source_protocol, source_id, MessageType::Text);
        msg.add_text(text, priority);
        msg
    }

    /// Position report; the comment, if any, labels the location.
    pub fn position_report(
        source_protocol: impl Into<String>,
        source_id: impl Into<String>,
        lat: f64,
        lon: f64,
        comment: &str,
    ) -> Self {
        let mut msg = Self::new(source_protocol, source_id, MessageType::Position);
        msg.add_location(lat, lon, comment, ContentPriority::Medium);
        msg
    }

    /// Emergency message. Every block is CRITICAL.
    pub fn emergency(
        source_protocol: impl Into<String>,
        source_id: impl Into<String>,
        text: &str,
        position: Option<Position>,
    ) -> Self {
        let mut msg = Self::new(source_protocol, source_id, MessageType::Emergency)
            .with_urgency(ContentPriority::Critical);
        msg.add_text(format!("🚨 EMERGENCY: {text}"), ContentPriority::Critical);
        if let Some(pos) = position {
            msg.add_location(
                pos.lat,
                pos.lon,
                "Emergency location",
                ContentPriority::Critical,
            );
        }
        msg
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Blocks in insertion order.
    pub fn content_blocks(&self) -> &[ContentBlock] {
        &self.content_blocks
    }

    pub fn target_protocols(&self) -> &[String] {
        &self.target_protocols
    }

    pub fn add_content_block(&mut self, block: ContentBlock) -> &mut Self {
        self.content_blocks.push(block);
        self
    }

    pub fn add_text(&mut self, text: impl Into<String>, priority: ContentPriority) -> &mut Self {
        self.add_content_block(ContentBlock::text(text, priority))
    }

    /// Record the position; a non-empty description also becomes a
    /// location block.
    pub fn add_location(
        &mut self,
        lat: f64,
        lon: f64,
        description: &str,
        priority: ContentPriority,
    ) -> &mut Self {
        self.position = Some(Position::new(lat, lon));
        if !description.is_empty() {
            self.add_content_block(ContentBlock::new(
                description,
                priority,
                content_type::LOCATION,
            ));
        }
        self
    }

    /// Record a metadata entry and render it as an omittable block.
    pub fn add_metadata(
        &mut self,
        key: &str,
        value: &str,
        priority: ContentPriority,
    ) -> &mut Self {
        self.metadata.insert(key, value);
        self.add_content_block(ContentBlock::metadata(key, value, priority))
    }

    pub fn add_target(&mut self, protocol: impl Into<String>, target_id: Option<String>) {
        let protocol = protocol.into();
        if let Some(id) = target_id {
            self.target_ids.insert(protocol.clone(), id);
        }
        if !self.target_protocols.contains(&protocol) {
            self.target_protocols.push(protocol);
        }
    }

    /// Text blocks of CRITICAL or HIGH priority, joined in block order.
    pub fn primary_content(&self) -> String {
        join_blocks(
            self.content_blocks
                .iter()
                .filter(|b| b.is_type(content_type::TEXT) && b.priority.is_primary()),
        )
    }

    pub fn full_content(&self) -> String {
        join_blocks(self.content_blocks.iter())
    }
}

pub(crate) fn join_blocks<'a>(blocks: impl Iterator<Item = &'a ContentBlock>) -> String {
    blocks
        .map(|b| b.content.as_str())
        .filter(|c| !c.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
