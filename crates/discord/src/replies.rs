//! Matching chat replies back to the radio operator they answer.

use std::{collections::VecDeque, sync::LazyLock};

use regex::Regex;

static REPLY_COMMAND: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?is)^APRS\s+([A-Z0-9\-/]+)\s+(.+)$").ok());

static CALLSIGN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^[A-Z]{1,2}[0-9][A-Z]{1,3}(-[0-9A-Z]+)?(/[A-Z0-9]+)?$").ok()
});

/// Whether `call` looks like an amateur callsign with optional SSID or
/// portable suffix. Expects upper case.
pub fn is_valid_callsign(call: &str) -> bool {
    CALLSIGN.as_ref().is_some_and(|re| re.is_match(call))
}

/// Split `APRS <CALLSIGN> <text>` into an upper-cased callsign and the text.
pub fn parse_reply_command(content: &str) -> Option<(String, String)> {
    let caps = REPLY_COMMAND.as_ref()?.captures(content.trim())?;
    let call = caps.get(1)?.as_str().to_uppercase();
    let text = caps.get(2)?.as_str().trim().to_string();
    if text.is_empty() || !is_valid_callsign(&call) {
        return None;
    }
    Some((call, text))
}

/// Bounded memory of bridged message ids and the callsign that sent them.
#[derive(Debug)]
pub struct ReplyTracker {
    entries: VecDeque<(String, String)>,
    capacity: usize,
}

impl ReplyTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn remember(&mut self, message_id: impl Into<String>, callsign: impl Into<String>) {
        let message_id = message_id.into();
        self.entries.retain(|(id, _)| *id != message_id);
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((message_id, callsign.into()));
    }

    pub fn sender_of(&self, message_id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(id, _)| id == message_id)
            .map(|(_, call)| call.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
