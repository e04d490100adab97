//! APRS-IS line codec.
//!
//! Only the parts of the APRS protocol the bridge needs: uncompressed
//! position reports, addressed messages, and the login line.

/// Width of the padded addressee field in a message packet.
pub const ADDRESSEE_WIDTH: usize = 9;

/// Usable message text per packet: the 67-character data field minus the
/// `:ADDRESSEE:` framing (11) and the `{NNN` message number (4).
pub const MAX_MESSAGE_TEXT: usize = 67 - 11 - 4;

/// Software identifier sent in the login line.
pub const SOFTWARE: &str = "RARSMS-Bridge 2.0";

#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// Source callsign including SSID.
    pub source: String,
    /// Everything between `>` and `:`.
    pub path: String,
    pub body: PacketBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PacketBody {
    Position {
        lat: f64,
        lon: f64,
        comment: String,
    },
    Message {
        addressee: String,
        text: String,
        msg_no: Option<String>,
    },
    /// Any other data type; kept so callers can log it.
    Other(String),
}

impl PacketBody {
    /// Text that identifies the packet's payload independently of its path.
    pub fn fingerprint(&self) -> String {
        match self {
            Self::Position { lat, lon, comment } => format!("{lat:.4},{lon:.4},{comment}"),
            Self::Message {
                addressee, text, ..
            } => format!("{addressee}:{text}"),
            Self::Other(data) => data.clone(),
        }
    }
}

/// Parse one `SRC>PATH:DATA` line. Server comments and malformed lines
/// yield `None`.
pub fn parse(line: &str) -> Option<Packet> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.starts_with('#') {
        return None;
    }
    let (header, data) = line.split_once(':')?;
    let (source, path) = header.split_once('>')?;
    let source = source.trim();
    if source.is_empty() {
        return None;
    }

    let body = match data.chars().next() {
        Some('!' | '=' | '@' | '/') => parse_position(&data[1..])
            .map(|(lat, lon, comment)| PacketBody::Position { lat, lon, comment })
            .unwrap_or_else(|| PacketBody::Other(data.to_string())),
        Some(':') => parse_message(&data[1..]).unwrap_or_else(|| PacketBody::Other(data.to_string())),
        _ => PacketBody::Other(data.to_string()),
    };

    Some(Packet {
        source: source.to_string(),
        path: path.to_string(),
        body,
    })
}

/// `DDMM.mmN<sym>DDDMM.mmW<sym>comment`, optionally preceded by a 7-char
/// timestamp ending in `z`, `h` or `/`.
fn parse_position(data: &str) -> Option<(f64, f64, String)> {
    let start = match data.as_bytes().get(6) {
        Some(b'z' | b'h' | b'/') => 7,
        _ => 0,
    };
    let lat = parse_coordinate(data.get(start..start + 8)?, 2, b'N', b'S')?;
    let lon = parse_coordinate(data.get(start + 9..start + 18)?, 3, b'E', b'W')?;
    let comment = data.get(start + 19..).unwrap_or_default().trim().to_string();
    Some((lat, lon, comment))
}

fn parse_coordinate(field: &str, degree_digits: usize, positive: u8, negative: u8) -> Option<f64> {
    let hemisphere = *field.as_bytes().last()?;
    let number = field.get(..field.len() - 1)?;
    let degrees: f64 = number.get(..degree_digits)?.parse().ok()?;
    let minutes: f64 = number.get(degree_digits..)?.trim().parse().ok()?;
    let value = degrees + minutes / 60.0;
    if hemisphere == positive {
        Some(value)
    } else if hemisphere == negative {
        Some(-value)
    } else {
        None
    }
}

/// `ADDRESSEE:text{NNN`. The reply-ack form `{MM}AA` keeps only `MM`.
fn parse_message(data: &str) -> Option<PacketBody> {
    let (addressee, rest) = data.split_once(':')?;
    let (text, msg_no) = match rest.rsplit_once('{') {
        Some((text, tail)) => {
            let no = tail.split('}').next().unwrap_or_default();
            if !no.is_empty() && no.len() <= 5 && no.chars().all(|c| c.is_ascii_alphanumeric()) {
                (text, Some(no.to_string()))
            } else {
                (rest, None)
            }
        },
        None => (rest, None),
    };
    Some(PacketBody::Message {
        addressee: addressee.trim().to_string(),
        text: text.to_string(),
        msg_no,
    })
}

/// Whether a message body is a protocol acknowledgement rather than text.
pub fn is_ack(text: &str) -> bool {
    let text = text.trim();
    ["ack", "rej"].iter().any(|kind| {
        text.strip_prefix(kind)
            .is_some_and(|rest| !rest.is_empty() && rest.len() <= 5 && rest.chars().all(|c| c.is_ascii_alphanumeric()))
    })
}

/// Callsign without its `-SSID` suffix.
pub fn base_callsign(callsign: &str) -> &str {
    callsign.split('-').next().unwrap_or(callsign)
}

// ── Encoding ────────────────────────────────────────────────────────────────

/// `user CALL pass N vers SOFTWARE filter FILTER`
pub fn login_line(callsign: &str, passcode: &str, filter: &str) -> String {
    format!("user {callsign} pass {passcode} vers {SOFTWARE} filter {filter}")
}

/// Wrap a data field in a TCPIP-routed frame from `callsign`.
pub fn frame(callsign: &str, data: &str) -> String {
    format!("{callsign}>APRS,TCPIP*:{data}")
}

/// `:ADDRESSEE:text{NNN` with the addressee upper-cased and padded to nine.
pub fn format_message(addressee: &str, text: &str, msg_no: u16) -> String {
    let addressee: String = addressee.to_uppercase().chars().take(ADDRESSEE_WIDTH).collect();
    format!(
        ":{addressee:<width$}:{}{{{msg_no:03}",
        sanitize(text),
        width = ADDRESSEE_WIDTH
    )
}

/// `!DDMM.mmN/DDDMM.mmW> comment`
pub fn format_position(lat: f64, lon: f64, comment: &str) -> String {
    let lat = format_coordinate(lat, 2, 'N', 'S');
    let lon = format_coordinate(lon, 3, 'E', 'W');
    let comment = sanitize(comment);
    if comment.is_empty() {
        format!("!{lat}/{lon}>")
    } else {
        format!("!{lat}/{lon}> {comment}")
    }
}

/// Degrees and minutes rounded to hundredths of a minute, carrying into the
/// degree field so `59.996'` never prints as `60.00`.
fn format_coordinate(value: f64, degree_digits: usize, positive: char, negative: char) -> String {
    let hemisphere = if value >= 0.0 { positive } else { negative };
    let hundredths = (value.abs() * 6000.0).round() as u64;
    let degrees = hundredths / 6000;
    let minutes = hundredths % 6000;
    format!(
        "{degrees:0width$}{:02}.{:02}{hemisphere}",
        minutes / 100,
        minutes % 100,
        width = degree_digits
    )
}

/// Message text may not contain `|`, `~` or `{`, and a line break would
/// split the frame.
fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '|' | '~' | '{' => ' ',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}
