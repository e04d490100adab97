use std::{
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU16, Ordering},
    },
    time::{Duration, Instant},
};

use {
    async_trait::async_trait,
    secrecy::ExposeSecret,
    tokio::{
        io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
        net::{
            TcpStream,
            tcp::{OwnedReadHalf, OwnedWriteHalf},
        },
        task::JoinHandle,
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, trace, warn},
};

use rarsms_channels::{
    AdapterCore, ChannelAdapter, ConnectionState, Message, MessageMetadata, MessageSink,
    MessageType, Position, ProtocolCapabilities, gating::AllowList,
};

#[cfg(feature = "metrics")]
use rarsms_metrics::{aprs as aprs_metrics, counter, labels};

use crate::{
    CHANNEL_TYPE, Error, Result,
    config::AprsConfig,
    dedup::Deduplicator,
    packet::{self, Packet, PacketBody},
};

/// Addressee used when a message has no explicit target callsign.
const BROADCAST: &str = "CQ";

// ── Line reader ─────────────────────────────────────────────────────────────

/// Newline-delimited reader that tolerates non-UTF-8 bytes and keeps partial
/// lines across cancelled reads.
struct LineReader {
    inner: BufReader<OwnedReadHalf>,
    buf: Vec<u8>,
}

impl LineReader {
    fn new(read: OwnedReadHalf) -> Self {
        Self {
            inner: BufReader::new(read),
            buf: Vec::with_capacity(512),
        }
    }

    /// Next line without its terminator; `None` at end of stream.
    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        let n = self.inner.read_until(b'\n', &mut self.buf).await?;
        if n == 0 && self.buf.is_empty() {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&self.buf)
            .trim_end_matches(['\r', '\n'])
            .to_string();
        self.buf.clear();
        Ok(Some(line))
    }
}

// ── Shared state ────────────────────────────────────────────────────────────

/// A decoded packet that passed parsing, with what filtering needs.
struct Inbound {
    message: Message,
    /// Addressed to, or prefixed with, the bridge prefix.
    marked: bool,
    dedup_key: String,
}

struct Inner {
    core: AdapterCore,
    config: AprsConfig,
    allow: AllowList,
    dedup: Mutex<Deduplicator>,
    writer: tokio::sync::Mutex<Option<OwnedWriteHalf>>,
    msg_counter: AtomicU16,
}

impl Inner {
    async fn open(&self) -> Result<LineReader> {
        let secs = self.config.connect_timeout_secs;
        let stream = tokio::time::timeout(
            Duration::from_secs(secs),
            TcpStream::connect((self.config.server.as_str(), self.config.port)),
        )
        .await
        .map_err(|_| Error::ConnectTimeout {
            server: format!("{}:{}", self.config.server, self.config.port),
            secs,
        })??;
        let (read, mut write) = stream.into_split();

        let login = packet::login_line(
            &self.config.callsign,
            self.config.passcode.expose_secret(),
            &self.config.range_filter(),
        );
        write.write_all(format!("{login}\r\n").as_bytes()).await?;
        info!(
            channel = self.core.name(),
            callsign = %self.config.callsign,
            filter = %self.config.range_filter(),
            "sent APRS-IS login"
        );

        let mut reader = LineReader::new(read);
        let secs = self.config.login_timeout_secs;
        tokio::time::timeout(Duration::from_secs(secs), wait_for_logresp(&mut reader))
            .await
            .map_err(|_| Error::LoginTimeout { secs })??;

        *self.writer.lock().await = Some(write);
        Ok(reader)
    }

    async fn write_line(&self, line: &str) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(Error::NotConnected)?;
        writer.write_all(format!("{line}\r\n").as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn close_writer(&self) {
        if let Some(mut writer) = self.writer.lock().await.take()
            && let Err(e) = writer.shutdown().await
        {
            debug!(channel = self.core.name(), error = %e, "socket shutdown failed");
        }
    }

    fn next_msg_no(&self) -> u16 {
        self.msg_counter.fetch_add(1, Ordering::Relaxed) % 999 + 1
    }

    /// Turn a raw line into a message, without filtering.
    fn decode(&self, line: &str) -> Option<Inbound> {
        let Packet { source, body, .. } = packet::parse(line)?;
        let fingerprint = body.fingerprint();
        let mut metadata = MessageMetadata {
            raw_frame: Some(line.to_string()),
            ..MessageMetadata::default()
        };

        let (message_type, content, marked) = match body {
            PacketBody::Position { lat, lon, comment } => {
                metadata.position = Some(Position::new(lat, lon));
                let content = if comment.is_empty() {
                    format!("Position update from {source}")
                } else {
                    comment
                };
                (MessageType::Position, content, false)
            },
            PacketBody::Message {
                addressee,
                text,
                msg_no,
            } => {
                if packet::is_ack(&text) {
                    trace!(channel = self.core.name(), sender = %source, "ignoring ack/rej");
                    return None;
                }
                let (content, marked) = self.strip_prefix(&addressee, &text);
                metadata.addressee = Some(addressee);
                metadata.msg_no = msg_no;
                (MessageType::Text, content, marked)
            },
            PacketBody::Other(_) => return None,
        };

        let dedup_key = format!("{source}:{message_type}:{fingerprint}");
        let message =
            Message::new(self.core.name(), source, message_type, content).with_metadata(metadata);
        Some(Inbound {
            message,
            marked,
            dedup_key,
        })
    }

    /// Remove the bridge prefix from message text. The flag reports whether
    /// the message was marked for the bridge at all.
    fn strip_prefix(&self, addressee: &str, text: &str) -> (String, bool) {
        let prefix = self.config.message_prefix.as_str();
        if addressee.eq_ignore_ascii_case(prefix) {
            return (text.trim().to_string(), true);
        }
        let head = text.get(..prefix.len());
        if head.is_some_and(|h| h.eq_ignore_ascii_case(prefix)) {
            let rest = text[prefix.len()..].trim();
            let rest = rest.strip_prefix(':').unwrap_or(rest).trim();
            return (rest.to_string(), true);
        }
        (text.trim().to_string(), false)
    }

    fn is_authorized(&self, sender: &str) -> bool {
        self.allow.permits(packet::base_callsign(sender)) || self.allow.permits(sender)
    }

    fn is_duplicate(&self, key: &str) -> bool {
        self.dedup
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_duplicate(key, Instant::now())
    }

    async fn handle_line(&self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        if line.starts_with('#') {
            debug!(channel = self.core.name(), server = line, "APRS-IS comment");
            return;
        }
        #[cfg(feature = "metrics")]
        counter!(aprs_metrics::LINES_RECEIVED_TOTAL, labels::CHANNEL => self.core.name().to_string()).increment(1);

        let Some(inbound) = self.decode(line) else {
            trace!(channel = self.core.name(), line, "ignoring packet");
            return;
        };
        let sender = inbound.message.source_id.clone();

        if !self.is_authorized(&sender) {
            debug!(channel = self.core.name(), %sender, "sender not authorized");
            self.count_filtered("unauthorized");
            return;
        }
        if inbound.message.message_type == MessageType::Text
            && self.config.require_prefix
            && !inbound.marked
        {
            debug!(
                channel = self.core.name(),
                %sender,
                prefix = %self.config.message_prefix,
                "message not marked for the bridge"
            );
            self.count_filtered("unmarked");
            return;
        }
        if self.is_duplicate(&inbound.dedup_key) {
            debug!(channel = self.core.name(), %sender, "duplicate packet");
            self.count_filtered("duplicate");
            return;
        }

        info!(
            channel = self.core.name(),
            %sender,
            kind = %inbound.message.message_type,
            "received APRS packet"
        );
        self.core.emit(inbound.message).await;
    }

    #[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
    fn count_filtered(&self, reason: &'static str) {
        #[cfg(feature = "metrics")]
        counter!(aprs_metrics::PACKETS_FILTERED_TOTAL, labels::REASON => reason).increment(1);
    }
}

async fn wait_for_logresp(reader: &mut LineReader) -> Result<()> {
    while let Some(line) = reader.next_line().await? {
        let line = line.trim();
        debug!(server = line, "APRS-IS login phase");
        if line.starts_with("# logresp") {
            let verified = line
                .split(|c: char| c.is_whitespace() || c == ',')
                .any(|word| word.eq_ignore_ascii_case("verified"));
            return if verified {
                Ok(())
            } else {
                Err(Error::LoginRejected {
                    response: line.to_string(),
                })
            };
        }
    }
    Err(Error::Closed)
}

async fn read_loop(inner: Arc<Inner>, mut reader: LineReader, cancel: CancellationToken) {
    let keepalive = Duration::from_secs(inner.config.keepalive_secs.max(1));
    loop {
        let read = tokio::select! {
            () = cancel.cancelled() => break,
            read = tokio::time::timeout(keepalive, reader.next_line()) => read,
        };
        match read {
            Ok(Ok(Some(line))) => inner.handle_line(&line).await,
            Ok(Ok(None)) => {
                warn!(channel = inner.core.name(), "APRS-IS closed the connection");
                break;
            },
            Ok(Err(e)) => {
                warn!(channel = inner.core.name(), error = %e, "APRS-IS read failed");
                break;
            },
            Err(_) => {
                trace!(channel = inner.core.name(), "sending keepalive");
                if let Err(e) = inner.write_line("#keepalive").await {
                    warn!(channel = inner.core.name(), error = %e, "keepalive failed");
                    break;
                }
            },
        }
    }

    if !cancel.is_cancelled() {
        inner.core.set_state(ConnectionState::Disconnected);
        inner.close_writer().await;
    }
    debug!(channel = inner.core.name(), "APRS-IS read loop stopped");
}

// ── Channel ─────────────────────────────────────────────────────────────────

struct Session {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// APRS-IS client channel.
pub struct AprsChannel {
    inner: Arc<Inner>,
    session: Mutex<Option<Session>>,
}

impl AprsChannel {
    pub fn new(name: &str, config: AprsConfig) -> Self {
        let allow = AllowList::new(&config.authorized_callsigns);
        let dedup = Deduplicator::new(Duration::from_secs(config.dedup_timeout_secs));
        Self {
            inner: Arc::new(Inner {
                core: AdapterCore::new(name, config.is_configured()),
                allow,
                dedup: Mutex::new(dedup),
                writer: tokio::sync::Mutex::new(None),
                msg_counter: AtomicU16::new(0),
                config,
            }),
            session: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &AprsConfig {
        &self.inner.config
    }

    async fn stop_session(&self) {
        let session = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(session) = session {
            session.cancel.cancel();
            if let Err(e) = session.task.await {
                warn!(channel = self.name(), error = %e, "APRS-IS read loop ended abnormally");
            }
        }
    }

    fn target_callsign(&self, message: &Message) -> String {
        message
            .target_ids
            .get(self.name())
            .map(|call| call.trim().to_uppercase())
            .filter(|call| !call.is_empty())
            .unwrap_or_else(|| BROADCAST.to_string())
    }
}

#[async_trait]
impl ChannelAdapter for AprsChannel {
    fn name(&self) -> &str {
        self.inner.core.name()
    }

    fn kind(&self) -> &str {
        CHANNEL_TYPE
    }

    fn capabilities(&self) -> ProtocolCapabilities {
        ProtocolCapabilities {
            can_send: true,
            can_receive: true,
            supports_position: true,
            supports_threading: false,
            supports_attachments: false,
            max_message_length: Some(packet::MAX_MESSAGE_TEXT),
        }
    }

    fn is_configured(&self) -> bool {
        self.inner.config.is_configured()
    }

    fn state(&self) -> ConnectionState {
        self.inner.core.state()
    }

    async fn connect(&self) -> bool {
        if !self.is_configured() {
            error!(channel = self.name(), "APRS callsign or passcode missing");
            return false;
        }
        if self.is_connected() {
            return true;
        }
        self.stop_session().await;

        info!(
            channel = self.name(),
            server = %self.inner.config.server,
            port = self.inner.config.port,
            "connecting to APRS-IS"
        );
        let reader = match self.inner.open().await {
            Ok(reader) => reader,
            Err(e) => {
                error!(channel = self.name(), error = %e, "APRS-IS connect failed");
                self.inner.close_writer().await;
                return false;
            },
        };

        self.inner.core.set_state(ConnectionState::Connected);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(read_loop(Arc::clone(&self.inner), reader, cancel.clone()));
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(Session { cancel, task });
        info!(channel = self.name(), "APRS-IS connected");
        true
    }

    async fn disconnect(&self) -> bool {
        self.stop_session().await;
        self.inner.close_writer().await;
        if self.state() != ConnectionState::Unconfigured {
            self.inner.core.set_state(ConnectionState::Disconnected);
        }
        info!(channel = self.name(), "APRS-IS disconnected");
        true
    }

    async fn send_message(&self, message: &Message) -> bool {
        if !self.is_connected() {
            warn!(channel = self.name(), "APRS-IS not connected, cannot send");
            return false;
        }
        if let Err(reason) = self.validate_message(message) {
            warn!(channel = self.name(), %reason, "message rejected");
            return false;
        }

        let target = self.target_callsign(message);
        let data = match (message.message_type, message.metadata.position) {
            (MessageType::Position, Some(pos)) => {
                packet::format_position(pos.lat, pos.lon, &message.content)
            },
            _ => packet::format_message(&target, &message.content, self.inner.next_msg_no()),
        };
        let frame = packet::frame(&self.inner.config.callsign, &data);

        match self.inner.write_line(&frame).await {
            Ok(()) => {
                info!(channel = self.name(), %target, id = message.message_id(), "sent APRS packet");
                debug!(channel = self.name(), frame = %frame, "APRS frame");
                #[cfg(feature = "metrics")]
                counter!(aprs_metrics::FRAMES_SENT_TOTAL).increment(1);
                true
            },
            Err(e) => {
                warn!(channel = self.name(), error = %e, "APRS-IS write failed");
                false
            },
        }
    }

    fn set_message_sink(&self, sink: Arc<dyn MessageSink>) {
        self.inner.core.set_sink(sink);
    }

    fn parse_message(&self, raw: &str) -> Option<Message> {
        self.inner.decode(raw).map(|inbound| inbound.message)
    }
}

impl Drop for AprsChannel {
    fn drop(&mut self) {
        if let Some(session) = self
            .session
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            session.cancel.cancel();
        }
    }
}
