//! Rendering of outbound webhook payloads and decoding of polled messages.

use std::sync::LazyLock;

use {
    chrono::{DateTime, Utc},
    regex::Regex,
    serde::Deserialize,
    serde_json::{Value, json},
};

use rarsms_channels::{Message, MessageMetadata, MessageType, Position};

/// Hard character limit Discord applies to message content.
pub const MAX_CONTENT: usize = 2000;

const POSITION_COLOR: u32 = 0x00ff00;

static EMBED_COORDINATES: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(-?\d+\.?\d*)°.*?(-?\d+\.?\d*)°").ok());

// ── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Author {
    pub id: String,
    pub username: String,
    pub discriminator: Option<String>,
    pub bot: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Embed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub fields: Vec<EmbedField>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MessageReference {
    pub message_id: Option<String>,
}

/// A channel message as returned by the REST API.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WireMessage {
    pub id: String,
    pub channel_id: String,
    pub content: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub author: Author,
    pub webhook_id: Option<String>,
    pub embeds: Vec<Embed>,
    pub message_reference: Option<MessageReference>,
}

impl WireMessage {
    /// `username#discriminator`, or the bare username for accounts on the
    /// discriminator-less scheme.
    pub fn author_tag(&self) -> String {
        match self.author.discriminator.as_deref() {
            Some(d) if !d.is_empty() && d != "0" => format!("{}#{d}", self.author.username),
            _ => self.author.username.clone(),
        }
    }

    pub fn referenced_id(&self) -> Option<&str> {
        self.message_reference
            .as_ref()
            .and_then(|r| r.message_id.as_deref())
    }
}

// ── Outbound ────────────────────────────────────────────────────────────────

fn type_emoji(kind: MessageType) -> &'static str {
    match kind {
        MessageType::Text => "💬",
        MessageType::Position => "📍",
        MessageType::Emergency => "🚨",
        MessageType::Status => "ℹ️",
    }
}

/// Whether a message originated on the radio network, judged by the
/// instance-name family.
pub fn is_radio_source(message: &Message) -> bool {
    message.source_protocol.starts_with("aprs")
}

/// Cut `text` to at most `max` characters, never splitting a character.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Webhook `content` for a text-like message.
pub fn render_text(message: &Message) -> String {
    let mut out = format!(
        "{} **{}** ({})\n{}",
        type_emoji(message.message_type),
        message.source_id,
        message.source_protocol,
        message.content,
    );

    if let Some(pos) = message.metadata.position
        && !message.content.contains("maps.google.com")
    {
        out.push_str(&format!(
            "\n📍 Location: [{:.4}, {:.4}]({})",
            pos.lat,
            pos.lon,
            pos.map_url()
        ));
    }
    out.push_str(&format!("\n🕐 {} UTC", message.timestamp.format("%H:%M:%S")));

    if is_radio_source(message) {
        out.push_str(&format!(
            "\n\n*Reply with: `APRS {} <your message>`*",
            message.source_id
        ));
    }
    truncate_chars(&out, MAX_CONTENT)
}

/// Embed object for a position report.
pub fn position_embed(message: &Message, pos: Position) -> Value {
    json!({
        "title": format!("📍 Position Update from {}", message.source_id),
        "description": truncate_chars(&message.content, 4096),
        "color": POSITION_COLOR,
        "timestamp": message.timestamp.to_rfc3339(),
        "fields": [
            { "name": "Protocol", "value": message.source_protocol, "inline": true },
            {
                "name": "Location",
                "value": format!("{:.6}°, {:.6}°", pos.lat, pos.lon),
                "inline": true,
            },
            {
                "name": "Map Link",
                "value": format!("[View on Google Maps]({})", pos.map_url()),
                "inline": false,
            },
        ],
    })
}

/// Full webhook body for `message`.
pub fn webhook_payload(message: &Message, username: &str) -> Value {
    match message.position() {
        Some(pos) => json!({ "username": username, "embeds": [position_embed(message, pos)] }),
        None => json!({ "username": username, "content": render_text(message) }),
    }
}

// ── Inbound ─────────────────────────────────────────────────────────────────

fn parse_coordinates(text: &str) -> Option<Position> {
    let re = EMBED_COORDINATES.as_ref()?;
    let caps = re.captures(text)?;
    let lat = caps.get(1)?.as_str().parse().ok()?;
    let lon = caps.get(2)?.as_str().parse().ok()?;
    Some(Position::new(lat, lon))
}

/// Coordinates from the first embed whose title mentions a location.
pub fn extract_position(embeds: &[Embed]) -> Option<Position> {
    embeds
        .iter()
        .filter(|e| {
            e.title
                .as_deref()
                .is_some_and(|t| t.to_lowercase().contains("location"))
        })
        .find_map(|e| {
            e.fields
                .iter()
                .map(|f| f.value.as_str())
                .chain(e.description.as_deref())
                .find_map(parse_coordinates)
        })
}

fn base_metadata(wire: &WireMessage) -> MessageMetadata {
    let mut metadata = MessageMetadata::default();
    metadata.insert("discord_user_id", wire.author.id.clone());
    metadata.insert("discord_message_id", wire.id.clone());
    if !wire.channel_id.is_empty() {
        metadata.insert("discord_channel_id", wire.channel_id.clone());
    }
    metadata
}

/// Canonical message for a polled channel message.
///
/// Returns `None` for messages with neither text nor a location embed.
pub fn to_message(channel: &str, wire: &WireMessage) -> Option<Message> {
    let position = extract_position(&wire.embeds);
    let content = wire.content.trim();
    if content.is_empty() && position.is_none() {
        return None;
    }

    let mut metadata = base_metadata(wire);
    metadata.position = position;
    let message_type = if position.is_some() {
        MessageType::Position
    } else {
        MessageType::Text
    };
    let content = match (content.is_empty(), position) {
        (true, Some(_)) => format!("Location shared by {}", wire.author_tag()),
        _ => content.to_string(),
    };

    let mut message = Message::new(channel, wire.author_tag(), message_type, content)
        .with_metadata(metadata)
        .with_thread(None, wire.referenced_id().map(str::to_string));
    if let Some(ts) = wire.timestamp {
        message = message.with_timestamp(ts);
    }
    Some(message)
}

/// Direct reply addressed to a radio callsign through `reply_target`.
pub fn to_direct_reply(
    channel: &str,
    wire: &WireMessage,
    reply_target: &str,
    callsign: &str,
    text: &str,
) -> Message {
    let mut metadata = base_metadata(wire);
    metadata.direct_reply = true;
    let mut message = Message::new(channel, wire.author_tag(), MessageType::Text, text)
        .with_metadata(metadata)
        .with_thread(None, wire.referenced_id().map(str::to_string));
    if let Some(ts) = wire.timestamp {
        message = message.with_timestamp(ts);
    }
    message.add_target(reply_target, Some(callsign.to_string()));
    message
}
