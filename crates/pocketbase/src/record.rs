use {chrono::SecondsFormat, serde::Serialize};

use rarsms_channels::{Message, MessageMetadata};

/// Row written to the messages collection.
#[derive(Debug, Serialize)]
pub struct Record<'a> {
    pub message_id: &'a str,
    pub source_protocol: &'a str,
    pub source_id: &'a str,
    pub message_type: &'static str,
    pub content: &'a str,
    pub timestamp: String,
    pub thread_id: &'a str,
    pub reply_to: &'a str,
    pub latitude: f64,
    pub longitude: f64,
    pub target_protocols: &'a [String],
    pub metadata: &'a MessageMetadata,
    pub raw_packet: &'a str,
}

impl<'a> From<&'a Message> for Record<'a> {
    fn from(message: &'a Message) -> Self {
        let position = message.position();
        Self {
            message_id: message.message_id(),
            source_protocol: &message.source_protocol,
            source_id: &message.source_id,
            message_type: message.message_type.as_str(),
            content: &message.content,
            timestamp: message.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            thread_id: message.thread_id.as_deref().unwrap_or_default(),
            reply_to: message.reply_to.as_deref().unwrap_or_default(),
            latitude: position.map_or(0.0, |p| p.lat),
            longitude: position.map_or(0.0, |p| p.lon),
            target_protocols: message.target_protocols(),
            metadata: &message.metadata,
            raw_packet: message.metadata.raw_frame.as_deref().unwrap_or_default(),
        }
    }
}
