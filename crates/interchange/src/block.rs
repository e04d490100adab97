use serde::{Deserialize, Serialize};

/// Well-known content block types. The tag is an open string so drivers can
/// introduce their own.
pub mod content_type {
    pub const TEXT: &str = "text";
    pub const LOCATION: &str = "location";
    pub const TIMESTAMP: &str = "timestamp";
    pub const METADATA: &str = "metadata";
    pub const MEDIA: &str = "media";
}

/// Precedence of a content block. Lower numeric value wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentPriority {
    /// Must be preserved (emergency info).
    Critical = 1,
    /// The main message.
    High = 2,
    /// Useful context: location, attribution.
    Medium = 3,
    /// Optional extras.
    Low = 4,
}

impl ContentPriority {
    #[must_use]
    pub fn value(self) -> u8 {
        self as u8
    }

    /// Whether this priority counts as primary content.
    #[must_use]
    pub fn is_primary(self) -> bool {
        matches!(self, Self::Critical | Self::High)
    }
}

/// One independently prioritizable piece of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub content: String,
    pub priority: ContentPriority,
    pub content_type: String,
    /// Truncation must not shrink the block below this many characters.
    pub min_length: usize,
    pub can_truncate: bool,
    pub can_omit: bool,
    /// Short substitute used when the block cannot be truncated to fit.
    pub fallback_text: Option<String>,
}

impl ContentBlock {
    pub fn new(
        content: impl Into<String>,
        priority: ContentPriority,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            priority,
            content_type: content_type.into(),
            min_length: 0,
            can_truncate: true,
            can_omit: false,
            fallback_text: None,
        }
    }

    pub fn text(content: impl Into<String>, priority: ContentPriority) -> Self {
        Self::new(content, priority, content_type::TEXT)
    }

    /// `key: value` block that may be dropped but is never cut in half.
    pub fn metadata(key: &str, value: &str, priority: ContentPriority) -> Self {
        Self::new(format!("{key}: {value}"), priority, content_type::METADATA)
            .omittable(true)
            .truncatable(false)
    }

    #[must_use]
    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = min_length;
        self
    }

    #[must_use]
    pub fn truncatable(mut self, can_truncate: bool) -> Self {
        self.can_truncate = can_truncate;
        self
    }

    #[must_use]
    pub fn omittable(mut self, can_omit: bool) -> Self {
        self.can_omit = can_omit;
        self
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback_text = Some(fallback.into());
        self
    }

    pub fn is_type(&self, content_type: &str) -> bool {
        self.content_type == content_type
    }

    /// Length in characters.
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}
