use serde::{Deserialize, Serialize};

/// What a channel instance can carry.
///
/// Reported once by the adapter and cached by the routing engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolCapabilities {
    pub can_send: bool,
    pub can_receive: bool,
    pub supports_position: bool,
    pub supports_threading: bool,
    pub supports_attachments: bool,
    /// `None` means unlimited.
    pub max_message_length: Option<usize>,
}

impl Default for ProtocolCapabilities {
    fn default() -> Self {
        Self {
            can_send: true,
            can_receive: true,
            supports_position: false,
            supports_threading: false,
            supports_attachments: false,
            max_message_length: None,
        }
    }
}

impl ProtocolCapabilities {
    /// Whether `content` fits within the length limit, counted in characters.
    #[must_use]
    pub fn fits(&self, content: &str) -> bool {
        self.max_message_length
            .is_none_or(|max| content.chars().count() <= max)
    }
}
