//! Per-destination textual transforms applied to content blocks before
//! length fitting.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use rarsms_channels::{Position, ProtocolCapabilities};

use crate::block::{ContentBlock, content_type};

static COORDINATES: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(-?\d{1,3}\.\d+)\s*,\s*(-?\d{1,3}\.\d+)").ok());

static TAGS: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"<[^>]+>").ok());

static EMPHASIS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*|\*(.+?)\*").ok());

/// Rendering dialect, selected by destination instance-name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationFamily {
    /// Packet radio: plain text only.
    PlainText,
    /// Discord-flavoured markdown with embeds.
    Discord,
    /// Slack mrkdwn.
    Slack,
    Other,
}

impl DestinationFamily {
    pub fn for_destination(name: &str) -> Self {
        let name = name.to_ascii_lowercase();
        if name.starts_with("aprs") {
            Self::PlainText
        } else if name.starts_with("discord") {
            Self::Discord
        } else if name.starts_with("slack") {
            Self::Slack
        } else {
            Self::Other
        }
    }
}

/// Transform a copy of `block` for the destination.
pub fn apply(
    block: &ContentBlock,
    family: DestinationFamily,
    caps: &ProtocolCapabilities,
    position: Option<Position>,
) -> ContentBlock {
    let mut out = block.clone();
    match family {
        DestinationFamily::PlainText => {
            if out.is_type(content_type::LOCATION) {
                out.content = strip_urls(&out.content);
            }
            out.content = strip_tags(&strip_markdown(&out.content));
            if out.is_type(content_type::METADATA) {
                out.can_omit = true;
            }
        },
        DestinationFamily::Discord => {
            if out.is_type(content_type::LOCATION) {
                out.content = map_link(&out.content, position);
            }
            if out.is_type(content_type::METADATA) {
                out.content = format!("**{}**", out.content);
            }
        },
        DestinationFamily::Slack => {
            out.content = to_slack_emphasis(&out.content);
        },
        DestinationFamily::Other => {
            if caps.supports_attachments && out.is_type(content_type::LOCATION) {
                out.content = map_link(&out.content, position);
            }
        },
    }

    if out.is_type(content_type::MEDIA) && !caps.supports_attachments {
        out.content = format!("[Media: {}]", block.content);
        out.content_type = content_type::TEXT.to_string();
    }
    out
}

fn strip_urls(text: &str) -> String {
    text.split_whitespace()
        .filter(|word| !(word.starts_with("http://") || word.starts_with("https://")))
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_markdown(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '*' | '_' | '~' | '`'))
        .collect()
}

/// Drop `<...>` spans (HTML tags, chat mentions). An unclosed `<` is kept.
fn strip_tags(text: &str) -> String {
    match TAGS.as_ref() {
        Some(re) => re.replace_all(text, "").into_owned(),
        None => text.to_string(),
    }
}

/// Render a location as a map link: `📍 label: [lat, lon](url)`.
///
/// Coordinates come from the text itself or, failing that, from the message
/// position. Without either the text is returned unchanged.
fn map_link(text: &str, position: Option<Position>) -> String {
    let found = COORDINATES.as_ref().and_then(|re| re.captures(text)).and_then(|caps| {
        let whole = caps.get(0)?;
        Some((caps[1].to_string(), caps[2].to_string(), whole.range()))
    });

    let (lat, lon, label) = match (found, position) {
        (Some((lat, lon, range)), _) => {
            let mut label = String::from(&text[..range.start]);
            label.push_str(&text[range.end..]);
            (lat, lon, label)
        },
        (None, Some(pos)) => (pos.lat.to_string(), pos.lon.to_string(), text.to_string()),
        (None, None) => return text.to_string(),
    };

    let label = label.trim().trim_end_matches([':', ',']).trim();
    let label = if label.is_empty() {
        "Location"
    } else {
        label
    };
    format!("📍 {label}: [{lat}, {lon}](https://maps.google.com/?q={lat},{lon})")
}

/// `**bold**` → `*bold*` and `*italic*` → `_italic_`, in one pass.
fn to_slack_emphasis(text: &str) -> String {
    let Some(re) = EMPHASIS.as_ref() else {
        return text.to_string();
    };
    re.replace_all(text, |caps: &Captures<'_>| match (caps.get(1), caps.get(2)) {
        (Some(bold), _) => format!("*{}*", bold.as_str()),
        (None, Some(italic)) => format!("_{}_", italic.as_str()),
        (None, None) => caps[0].to_string(),
    })
    .into_owned()
}
