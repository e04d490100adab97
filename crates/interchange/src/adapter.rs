//! Capability-driven rendering of a [`UniversalMessage`] for one destination.

use {
    chrono::{DateTime, Utc},
    serde::Serialize,
    tracing::warn,
};

use rarsms_channels::{Message, MessageMetadata, MessageType, Position, ProtocolCapabilities};

use crate::{
    block::{ContentBlock, ContentPriority, content_type},
    error::{AdaptError, Result},
    markup::{self, DestinationFamily},
    truncate::{ELLIPSIS, smart_truncate, truncate_chars, truncate_with_floor},
    universal::{UniversalMessage, join_blocks},
};

/// Minimum budget for force-truncating a CRITICAL block that otherwise
/// could not be placed.
const FORCE_TRUNCATE_MIN: usize = 10;

/// Length used by the fallback payload when the destination has no limit.
const FALLBACK_LENGTH: usize = 100;

/// One destination-ready rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdaptedMessage {
    pub content: String,
    pub message_id: String,
    pub source_protocol: String,
    pub source_id: String,
    pub timestamp: DateTime<Utc>,
    pub message_type: MessageType,
    pub metadata: MessageMetadata,
    pub position: Option<Position>,
    pub thread_id: Option<String>,
    pub reply_to: Option<String>,
    pub attachments: Vec<serde_json::Value>,
    pub target_id: Option<String>,
}

impl AdaptedMessage {
    fn bare(message: &UniversalMessage, content: String) -> Self {
        Self {
            content,
            message_id: message.message_id().to_string(),
            source_protocol: message.source_protocol.clone(),
            source_id: message.source_id.clone(),
            timestamp: message.timestamp,
            message_type: message.message_type,
            metadata: message.metadata.clone(),
            position: None,
            thread_id: None,
            reply_to: None,
            attachments: Vec::new(),
            target_id: None,
        }
    }

    /// Canonical message addressed to `target`, keeping the source identity.
    pub fn into_message(self, target: &str) -> Message {
        let mut metadata = self.metadata;
        metadata.position = self.position;
        let mut message = Message::new(
            self.source_protocol,
            self.source_id,
            self.message_type,
            self.content,
        )
        .with_id(self.message_id)
        .with_timestamp(self.timestamp)
        .with_metadata(metadata)
        .with_thread(self.thread_id, self.reply_to);
        message.add_target(target, self.target_id);
        message
    }
}

/// Fits universal messages into destination capabilities.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentAdapter;

impl ContentAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Adapt, falling back to the primary-content payload on failure.
    pub fn adapt(
        &self,
        message: &UniversalMessage,
        caps: &ProtocolCapabilities,
        target: &str,
    ) -> Vec<AdaptedMessage> {
        self.try_adapt(message, caps, target).unwrap_or_else(|e| {
            warn!(target_channel = target, error = %e, "adaptation failed, using fallback");
            vec![self.fallback(message, caps)]
        })
    }

    pub fn try_adapt(
        &self,
        message: &UniversalMessage,
        caps: &ProtocolCapabilities,
        target: &str,
    ) -> Result<Vec<AdaptedMessage>> {
        if caps.max_message_length == Some(0) {
            return Err(AdaptError::ZeroLengthLimit {
                target: target.to_string(),
            });
        }

        let mut blocks: Vec<&ContentBlock> = message.content_blocks().iter().collect();
        blocks.sort_by_key(|b| b.priority);

        let family = DestinationFamily::for_destination(target);
        let concise = (family == DestinationFamily::PlainText).then(|| RadioTrim {
            native_position: caps.supports_position
                && message.position.is_some()
                && message
                    .content_blocks()
                    .iter()
                    .any(|b| b.is_type(content_type::TEXT) && !b.content.trim().is_empty()),
        });
        let transformed: Vec<ContentBlock> = blocks
            .into_iter()
            .map(|b| markup::apply(b, family, caps, message.position))
            .filter(|b| concise.is_none_or(|trim| !trim.drops(b)))
            .collect();

        let fitted = fit_to_limit(transformed, caps.max_message_length);
        let content = join_blocks(fitted.iter());
        if content.is_empty() {
            return Err(AdaptError::NothingFits {
                target: target.to_string(),
                limit: caps.max_message_length,
            });
        }

        let mut adapted = AdaptedMessage::bare(message, content);
        if caps.supports_position {
            adapted.position = message.position;
        }
        if caps.supports_threading {
            adapted.thread_id = message.thread_id.clone();
            adapted.reply_to = message.reply_to.clone();
        }
        if caps.supports_attachments {
            adapted.attachments = message.attachments.clone();
        }
        adapted.target_id = message.target_ids.get(target).cloned();
        Ok(vec![adapted])
    }

    /// Primary content hard-cut to the destination limit.
    pub fn fallback(
        &self,
        message: &UniversalMessage,
        caps: &ProtocolCapabilities,
    ) -> AdaptedMessage {
        let limit = caps.max_message_length.unwrap_or(FALLBACK_LENGTH);
        let primary = message.primary_content();
        AdaptedMessage::bare(message, truncate_chars(&primary, limit).to_string())
    }
}

/// Plain-text destinations get the primary text only.
///
/// Omittable extras below HIGH are left out, and so is a location
/// description when the destination carries the position in its own field
/// and the message has text of its own. CRITICAL blocks are always kept.
#[derive(Debug, Clone, Copy)]
struct RadioTrim {
    native_position: bool,
}

impl RadioTrim {
    fn drops(self, block: &ContentBlock) -> bool {
        if block.priority == ContentPriority::Critical {
            return false;
        }
        (block.can_omit && !block.priority.is_primary())
            || (self.native_position && block.is_type(content_type::LOCATION))
    }
}

/// Walk blocks in priority order against the length budget.
///
/// The first block that does not fit whole is truncated, replaced by its
/// fallback, force-truncated (CRITICAL only) or dropped, and nothing after it
/// is considered. Joining separators are charged against the budget.
fn fit_to_limit(blocks: Vec<ContentBlock>, limit: Option<usize>) -> Vec<ContentBlock> {
    let Some(limit) = limit else {
        return blocks;
    };

    let mut fitted = Vec::new();
    let mut used = 0;
    for block in blocks {
        if block.content.trim().is_empty() {
            continue;
        }
        let separator = usize::from(!fitted.is_empty());
        let len = block.char_len();
        if used + separator + len <= limit {
            used += separator + len;
            fitted.push(block);
            continue;
        }

        let remaining = limit.saturating_sub(used + separator);
        let replacement = if block.can_truncate
            && remaining > ELLIPSIS.len()
            && remaining >= block.min_length
        {
            Some(truncate_with_floor(&block.content, remaining, block.min_length))
        } else if let Some(fallback) = block
            .fallback_text
            .as_ref()
            .filter(|f| !f.is_empty() && f.chars().count() <= remaining)
        {
            Some(fallback.clone())
        } else if block.priority == ContentPriority::Critical && remaining >= FORCE_TRUNCATE_MIN {
            Some(smart_truncate(&block.content, remaining))
        } else {
            None
        };

        if let Some(content) = replacement.filter(|c| !c.is_empty()) {
            fitted.push(ContentBlock { content, ..block });
        }
        break;
    }
    fitted
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, rstest::rstest};

    fn caps(max: Option<usize>) -> ProtocolCapabilities {
        ProtocolCapabilities {
            max_message_length: max,
            ..Default::default()
        }
    }

    fn block(content: &str, priority: ContentPriority) -> ContentBlock {
        ContentBlock::text(content, priority)
    }

    fn joined(blocks: &[ContentBlock]) -> String {
        join_blocks(blocks.iter())
    }

    #[test]
    fn unlimited_keeps_everything() {
        let blocks = vec![
            block("a", ContentPriority::High),
            block("b", ContentPriority::Low),
        ];
        assert_eq!(fit_to_limit(blocks.clone(), None), blocks);
    }

    #[test]
    fn stops_after_first_truncation() {
        let blocks = vec![
            block("0123456789", ContentPriority::High),
            block("a long medium block of words", ContentPriority::Medium),
            block("x", ContentPriority::Low),
        ];
        let out = fit_to_limit(blocks, Some(20));
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].content, "a long...");
        assert!(joined(&out).chars().count() <= 20);
    }

    #[test]
    fn uses_fallback_when_not_truncatable() {
        let blocks = vec![
            block("0123456789", ContentPriority::High),
            ContentBlock::new("timestamp 2024-06-01T12:00:00Z", ContentPriority::Medium, content_type::TIMESTAMP)
                .truncatable(false)
                .with_fallback("12:00Z"),
        ];
        let out = fit_to_limit(blocks, Some(20));
        assert_eq!(joined(&out), "0123456789 12:00Z");
    }

    #[test]
    fn min_length_blocks_truncation() {
        let blocks = vec![
            block("0123456789", ContentPriority::High),
            block("some words that will not fit", ContentPriority::Medium).with_min_length(15),
        ];
        let out = fit_to_limit(blocks, Some(20));
        assert_eq!(joined(&out), "0123456789");
    }

    #[test]
    fn truncation_keeps_the_min_length_floor() {
        let blocks = vec![
            block("0123456789", ContentPriority::High),
            block("Hi. this is a much longer trailing sentence here", ContentPriority::Medium)
                .with_min_length(15),
        ];
        let out = fit_to_limit(blocks, Some(40));
        assert_eq!(joined(&out), "0123456789 Hi. this is a much longer...");
        assert!(out[1].content.chars().count() >= 15);
    }

    #[test]
    fn critical_is_force_truncated() {
        let blocks = vec![
            ContentBlock::text("🚨 EMERGENCY: ".to_string() + &"help ".repeat(40), ContentPriority::Critical)
                .truncatable(false),
        ];
        let out = fit_to_limit(blocks, Some(20));
        assert_eq!(out.len(), 1);
        assert!(out[0].content.chars().count() <= 20);
        assert!(out[0].content.ends_with("..."));
    }

    #[test]
    fn critical_needs_ten_characters() {
        let blocks = vec![
            block("0123456789012", ContentPriority::High),
            ContentBlock::text("critical text that is long", ContentPriority::Critical)
                .truncatable(false),
        ];
        // Sorted: CRITICAL first, so it gets the whole budget.
        let mut sorted = blocks.clone();
        sorted.sort_by_key(|b| b.priority);
        let out = fit_to_limit(sorted, Some(9));
        assert!(out.is_empty());
    }

    #[test]
    fn drop_ends_processing_even_if_later_blocks_fit() {
        let blocks = vec![
            block("0123456789", ContentPriority::High),
            ContentBlock::new("meta: value that is long", ContentPriority::Low, content_type::METADATA)
                .omittable(true)
                .truncatable(false),
            ContentBlock::new("k: v", ContentPriority::Low, content_type::METADATA).omittable(true),
        ];
        let out = fit_to_limit(blocks, Some(20));
        assert_eq!(joined(&out), "0123456789");
    }

    #[rstest]
    #[case(5)]
    #[case(12)]
    #[case(20)]
    #[case(33)]
    #[case(67)]
    fn fitted_output_respects_limit(#[case] limit: usize) {
        let mut msg = UniversalMessage::new("discord_main", "user123", MessageType::Text);
        msg.add_text("Emergency meeting tonight at 7 PM", ContentPriority::High)
            .add_location(35.7796, -78.6382, "Raleigh, NC HQ", ContentPriority::Medium)
            .add_metadata("event_type", "club_meeting", ContentPriority::Low)
            .add_metadata("attendees", "all_members", ContentPriority::Low);
        let adapted = ContentAdapter::new().adapt(&msg, &caps(Some(limit)), "aprs_main");
        assert_eq!(adapted.len(), 1);
        assert!(adapted[0].content.chars().count() <= limit);
    }

    #[test]
    fn plain_text_keeps_location_when_it_is_the_only_content() {
        let msg = UniversalMessage::position_report("discord_main", "alice", 35.0, -78.0, "mobile");
        let radio = ProtocolCapabilities {
            supports_position: true,
            ..caps(Some(67))
        };
        let adapted = ContentAdapter::new().try_adapt(&msg, &radio, "aprs_main").unwrap();
        assert_eq!(adapted[0].content, "mobile");
    }

    #[test]
    fn plain_text_never_trims_critical_blocks() {
        let msg = UniversalMessage::emergency(
            "discord_main",
            "alice",
            "need help",
            Some(Position::new(35.0, -78.0)),
        );
        let radio = ProtocolCapabilities {
            supports_position: true,
            ..caps(Some(67))
        };
        let adapted = ContentAdapter::new().try_adapt(&msg, &radio, "aprs_main").unwrap();
        assert_eq!(adapted[0].content, "🚨 EMERGENCY: need help Emergency location");
    }

    #[test]
    fn unlimited_output_is_full_concatenation() {
        let mut msg = UniversalMessage::new("discord_main", "user123", MessageType::Text);
        msg.add_text("hello", ContentPriority::High)
            .add_text("world", ContentPriority::High);
        let adapted = ContentAdapter::new()
            .try_adapt(&msg, &caps(None), "pocketbase")
            .unwrap();
        assert_eq!(adapted[0].content, msg.full_content());
    }

    #[test]
    fn optional_fields_follow_capabilities() {
        let mut msg = UniversalMessage::position_report("aprs_main", "W4ABC-9", 35.0, -78.0, "mobile");
        msg.thread_id = Some("t1".into());
        msg.attachments.push(serde_json::json!({"url": "x"}));
        msg.add_target("discord_main", Some("chan".into()));

        let bare = ContentAdapter::new()
            .try_adapt(&msg, &caps(None), "discord_main")
            .unwrap();
        assert!(bare[0].position.is_none());
        assert!(bare[0].thread_id.is_none());
        assert!(bare[0].attachments.is_empty());
        assert_eq!(bare[0].target_id.as_deref(), Some("chan"));

        let rich = ProtocolCapabilities {
            supports_position: true,
            supports_threading: true,
            supports_attachments: true,
            ..caps(Some(2000))
        };
        let full = ContentAdapter::new()
            .try_adapt(&msg, &rich, "discord_main")
            .unwrap();
        assert_eq!(full[0].position, Some(Position::new(35.0, -78.0)));
        assert_eq!(full[0].thread_id.as_deref(), Some("t1"));
        assert_eq!(full[0].attachments.len(), 1);
        assert_eq!(full[0].message_id, msg.message_id());
    }

    #[test]
    fn zero_limit_is_an_error_with_empty_fallback() {
        let msg = UniversalMessage::text("a", "b", "hello", ContentPriority::High);
        let adapter = ContentAdapter::new();
        assert!(matches!(
            adapter.try_adapt(&msg, &caps(Some(0)), "aprs_main"),
            Err(AdaptError::ZeroLengthLimit { .. })
        ));
        let out = adapter.adapt(&msg, &caps(Some(0)), "aprs_main");
        assert_eq!(out[0].content, "");
    }

    #[test]
    fn fallback_cuts_primary_content() {
        let long = "x".repeat(150);
        let msg = UniversalMessage::text("a", "b", long, ContentPriority::High);
        let adapter = ContentAdapter::new();
        assert_eq!(adapter.fallback(&msg, &caps(None)).content.len(), 100);
        assert_eq!(adapter.fallback(&msg, &caps(Some(40))).content.len(), 40);
    }

    #[test]
    fn into_message_targets_destination() {
        let mut msg = UniversalMessage::text("discord_main", "alice", "hi", ContentPriority::High);
        msg.add_target("aprs_main", Some("W1AW".into()));
        let adapted = ContentAdapter::new().adapt(&msg, &caps(Some(67)), "aprs_main");
        let out = adapted.into_iter().next().unwrap().into_message("aprs_main");
        assert_eq!(out.message_id(), msg.message_id());
        assert_eq!(out.target_protocols(), ["aprs_main"]);
        assert_eq!(out.target_ids["aprs_main"], "W1AW");
        assert_eq!(out.source_protocol, "discord_main");
    }
}
