use {regex::Regex, serde::Serialize};

use rarsms_channels::MessageType;

use crate::{Error, Result};

/// Declarative mapping from source channels and message types to targets.
///
/// Every matching rule contributes its targets; rules are never first-match.
#[derive(Debug, Clone)]
pub struct RoutingRule {
    source_protocols: Vec<String>,
    target_protocols: Vec<String>,
    message_types: Vec<MessageType>,
    source_filter: Option<Regex>,
    bidirectional: bool,
}

/// Serializable view of a rule for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleSummary {
    pub source_protocols: Vec<String>,
    pub target_protocols: Vec<String>,
    pub message_types: Vec<MessageType>,
    pub source_filter: Option<String>,
    pub bidirectional: bool,
}

impl RoutingRule {
    /// Rule applying to every message type.
    pub fn new(
        sources: impl IntoIterator<Item = impl Into<String>>,
        targets: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self> {
        let source_protocols = dedup(sources.into_iter().map(Into::into));
        let target_protocols = dedup(targets.into_iter().map(Into::into));
        if source_protocols.is_empty() {
            return Err(Error::EmptyRule { side: "source" });
        }
        if target_protocols.is_empty() {
            return Err(Error::EmptyRule { side: "target" });
        }
        Ok(Self {
            source_protocols,
            target_protocols,
            message_types: MessageType::ALL.to_vec(),
            source_filter: None,
            bidirectional: false,
        })
    }

    /// Restrict to the given types. An empty set means all types.
    #[must_use]
    pub fn with_message_types(mut self, types: impl IntoIterator<Item = MessageType>) -> Self {
        let types = dedup(types);
        self.message_types = if types.is_empty() {
            MessageType::ALL.to_vec()
        } else {
            types
        };
        self
    }

    /// Only match senders whose id contains a match for `pattern`.
    pub fn with_source_filter(mut self, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|source| Error::InvalidSourceFilter {
            pattern: pattern.to_string(),
            source,
        })?;
        self.source_filter = Some(regex);
        Ok(self)
    }

    #[must_use]
    pub fn bidirectional(mut self, bidirectional: bool) -> Self {
        self.bidirectional = bidirectional;
        self
    }

    /// Sources and targets swapped. The reverse is never bidirectional.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            source_protocols: self.target_protocols.clone(),
            target_protocols: self.source_protocols.clone(),
            message_types: self.message_types.clone(),
            source_filter: self.source_filter.clone(),
            bidirectional: false,
        }
    }

    pub fn matches(&self, source_protocol: &str, message_type: MessageType, source_id: &str) -> bool {
        self.source_protocols.iter().any(|s| s == source_protocol)
            && self.message_types.contains(&message_type)
            && self
                .source_filter
                .as_ref()
                .is_none_or(|re| re.is_match(source_id))
    }

    pub fn source_protocols(&self) -> &[String] {
        &self.source_protocols
    }

    pub fn target_protocols(&self) -> &[String] {
        &self.target_protocols
    }

    pub fn message_types(&self) -> &[MessageType] {
        &self.message_types
    }

    pub fn source_filter(&self) -> Option<&str> {
        self.source_filter.as_ref().map(Regex::as_str)
    }

    pub fn is_bidirectional(&self) -> bool {
        self.bidirectional
    }

    pub fn summary(&self) -> RuleSummary {
        RuleSummary {
            source_protocols: self.source_protocols.clone(),
            target_protocols: self.target_protocols.clone(),
            message_types: self.message_types.clone(),
            source_filter: self.source_filter().map(str::to_string),
            bidirectional: self.bidirectional,
        }
    }
}

fn dedup<T: PartialEq>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut out = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}
