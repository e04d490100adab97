use rarsms_channels::{Message, MessageType};
use rarsms_interchange::{ContentBlock, ContentPriority, UniversalMessage, content_type};

/// Build the universal form of an inbound message.
///
/// Main content is CRITICAL for emergencies and HIGH otherwise. Positions
/// become a MEDIUM location block, metadata becomes LOW omittable blocks, and
/// a MEDIUM attribution block names the sender.
pub fn to_universal(message: &Message) -> UniversalMessage {
    let emergency = message.is_emergency();
    let (priority, urgency) = if emergency {
        (ContentPriority::Critical, ContentPriority::Critical)
    } else {
        (ContentPriority::High, ContentPriority::Medium)
    };

    let mut universal = UniversalMessage::new(
        &message.source_protocol,
        &message.source_id,
        message.message_type,
    )
    .with_id(message.message_id())
    .with_timestamp(message.timestamp)
    .with_urgency(urgency);
    universal.metadata = message.metadata.clone();

    if !message.content.trim().is_empty() {
        universal.add_text(&message.content, priority);
    }

    if let Some(pos) = message.position() {
        universal.add_location(
            pos.lat,
            pos.lon,
            &format!("Position: {:.4}, {:.4}", pos.lat, pos.lon),
            ContentPriority::Medium,
        );
    } else if let (MessageType::Emergency, Some(pos)) =
        (message.message_type, message.metadata.position)
    {
        universal.add_location(
            pos.lat,
            pos.lon,
            &format!("Emergency location: {:.4}, {:.4}", pos.lat, pos.lon),
            ContentPriority::Critical,
        );
    }

    if !message.is_direct_reply() {
        for (key, value) in message.metadata.display_entries() {
            universal.add_content_block(ContentBlock::metadata(&key, &value, ContentPriority::Low));
        }
        universal.add_content_block(
            ContentBlock::new(
                format!("From: {}:{}", message.source_protocol, message.source_id),
                ContentPriority::Medium,
                content_type::METADATA,
            )
            .omittable(true)
            .truncatable(false),
        );
    }

    for target in message.target_protocols() {
        universal.add_target(target, None);
    }
    universal.target_ids = message.target_ids.clone();
    universal.thread_id = message.thread_id.clone();
    universal.reply_to = message.reply_to.clone();
    universal
}

#[cfg(test)]
mod tests {
    use super::*;

    fn priorities(u: &UniversalMessage) -> Vec<(String, ContentPriority)> {
        u.content_blocks()
            .iter()
            .map(|b| (b.content_type.clone(), b.priority))
            .collect()
    }

    #[test]
    fn text_message_blocks() {
        let mut msg = Message::new("aprs_main", "W1AW", MessageType::Text, "hello");
        msg.metadata.addressee = Some("RARSMS".into());
        msg.metadata.raw_frame = Some("W1AW>APRS::RARSMS   :hello".into());

        let u = to_universal(&msg);
        assert_eq!(u.message_id(), msg.message_id());
        assert_eq!(u.primary_content(), "hello");
        assert_eq!(
            priorities(&u),
            vec![
                (content_type::TEXT.to_string(), ContentPriority::High),
                (content_type::METADATA.to_string(), ContentPriority::Low),
                (content_type::METADATA.to_string(), ContentPriority::Medium),
            ]
        );
        assert_eq!(u.content_blocks()[1].content, "addressee: RARSMS");
        assert_eq!(u.content_blocks()[2].content, "From: aprs_main:W1AW");
    }

    #[test]
    fn position_message_gets_location_block() {
        let msg = Message::new("aprs_main", "W4ABC-9", MessageType::Position, "mobile")
            .with_position(35.779_612, -78.638_179);
        let u = to_universal(&msg);
        assert_eq!(u.position.map(|p| p.lat), Some(35.779_612));
        let location = &u.content_blocks()[1];
        assert_eq!(location.content, "Position: 35.7796, -78.6382");
        assert_eq!(location.priority, ContentPriority::Medium);
    }

    #[test]
    fn emergency_is_critical() {
        let msg = Message::new("aprs_main", "W1AW", MessageType::Emergency, "need help")
            .with_position(35.0, -78.0);
        let u = to_universal(&msg);
        assert_eq!(u.urgency, ContentPriority::Critical);
        assert_eq!(u.content_blocks()[0].priority, ContentPriority::Critical);
        assert_eq!(u.content_blocks()[1].priority, ContentPriority::Critical);
        assert!(u.content_blocks()[1].content.starts_with("Emergency location"));
    }

    #[test]
    fn direct_replies_carry_no_metadata_blocks() {
        let mut msg = Message::new("discord_main", "alice", MessageType::Text, "copy that");
        msg.metadata.direct_reply = true;
        msg.add_target("aprs_main", Some("W1AW".into()));

        let u = to_universal(&msg);
        assert_eq!(u.content_blocks().len(), 1);
        assert_eq!(u.target_protocols(), ["aprs_main"]);
        assert_eq!(u.target_ids["aprs_main"], "W1AW");
    }
}
