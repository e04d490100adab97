use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use {
    async_trait::async_trait,
    reqwest::{StatusCode, header::AUTHORIZATION},
    secrecy::ExposeSecret,
    serde::Deserialize,
    tokio::task::JoinHandle,
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use rarsms_channels::{
    AdapterCore, ChannelAdapter, ConnectionState, Message, MessageSink, ProtocolCapabilities,
};

#[cfg(feature = "metrics")]
use rarsms_metrics::{counter, discord as discord_metrics, histogram, labels};

use crate::{
    CHANNEL_TYPE, Error, Result,
    config::DiscordConfig,
    format::{self, WireMessage},
    replies::{self, ReplyTracker},
};

/// Messages requested per poll.
const POLL_LIMIT: &str = "10";

/// Wait applied to a 429 without a usable reset header.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct Posted {
    id: String,
}

// ── Shared state ────────────────────────────────────────────────────────────

struct Inner {
    core: AdapterCore,
    config: DiscordConfig,
    http: reqwest::Client,
    replies: Mutex<ReplyTracker>,
}

impl Inner {
    fn webhook_url(&self) -> Result<url::Url> {
        self.config.webhook().ok_or(Error::MissingWebhook)
    }

    async fn check_webhook(&self) -> Result<()> {
        let resp = self.http.get(self.webhook_url()?).send().await?;
        if !resp.status().is_success() {
            return Err(Error::from_response(resp).await);
        }
        Ok(())
    }

    /// Post to the webhook and return the created message id, when the API
    /// reports one.
    async fn post(&self, payload: &serde_json::Value) -> Result<Option<String>> {
        let mut url = self.webhook_url()?;
        url.query_pairs_mut().append_pair("wait", "true");

        #[cfg(feature = "metrics")]
        let started = std::time::Instant::now();
        let resp = self.http.post(url).json(payload).send().await?;
        let status = resp.status();

        #[cfg(feature = "metrics")]
        {
            histogram!(discord_metrics::WEBHOOK_DURATION_SECONDS)
                .record(started.elapsed().as_secs_f64());
            counter!(
                discord_metrics::WEBHOOK_POSTS_TOTAL,
                labels::STATUS => status.as_u16().to_string()
            )
            .increment(1);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(rate_limited(&resp));
        }
        if !status.is_success() {
            return Err(Error::from_response(resp).await);
        }
        let posted = resp.json::<Posted>().await.ok();
        Ok(posted.map(|p| p.id))
    }

    async fn fetch(&self, after: Option<&str>) -> Result<Vec<WireMessage>> {
        let url = format!(
            "{}/channels/{}/messages",
            self.config.api_base, self.config.channel_id
        );
        let mut request = self
            .http
            .get(url)
            .header(
                AUTHORIZATION,
                format!("Bot {}", self.config.bot_token.expose_secret()),
            )
            .query(&[("limit", POLL_LIMIT)]);
        if let Some(after) = after {
            request = request.query(&[("after", after)]);
        }

        let resp = request.send().await?;
        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(rate_limited(&resp));
        }
        if !resp.status().is_success() {
            return Err(Error::from_response(resp).await);
        }
        Ok(resp.json().await?)
    }

    fn is_own(&self, wire: &WireMessage) -> bool {
        wire.webhook_id.is_some() || wire.author.bot || wire.author.username == self.config.username
    }

    /// Decode one polled message and hand it to the sink.
    async fn handle(&self, wire: &WireMessage) {
        if self.is_own(wire) {
            debug!(channel = self.core.name(), id = %wire.id, "skipping bridge or bot message");
            return;
        }

        let original_sender = wire.referenced_id().and_then(|id| {
            self.replies
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .sender_of(id)
                .map(str::to_string)
        });

        if let Some(sender) = original_sender
            && let Some((callsign, text)) = replies::parse_reply_command(&wire.content)
        {
            if !callsign.eq_ignore_ascii_case(&sender) {
                warn!(
                    channel = self.core.name(),
                    author = %wire.author_tag(),
                    %callsign,
                    expected = %sender,
                    "reply callsign does not match original sender, dropping"
                );
                return;
            }
            info!(
                channel = self.core.name(),
                author = %wire.author_tag(),
                %callsign,
                target = %self.config.reply_target,
                "bridging reply to radio"
            );
            #[cfg(feature = "metrics")]
            counter!(discord_metrics::REPLIES_BRIDGED_TOTAL).increment(1);
            let reply = format::to_direct_reply(
                self.core.name(),
                wire,
                &self.config.reply_target,
                &callsign,
                &text,
            );
            self.core.emit(reply).await;
            return;
        }

        match format::to_message(self.core.name(), wire) {
            Some(message) => {
                info!(
                    channel = self.core.name(),
                    author = %message.source_id,
                    kind = %message.message_type,
                    "received Discord message"
                );
                self.core.emit(message).await;
            },
            None => debug!(channel = self.core.name(), id = %wire.id, "empty message ignored"),
        }
    }

    fn remember(&self, message_id: String, callsign: &str) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remember(message_id, callsign.to_uppercase());
    }
}

fn rate_limited(resp: &reqwest::Response) -> Error {
    #[cfg(feature = "metrics")]
    counter!(discord_metrics::RATE_LIMITED_TOTAL).increment(1);
    let retry_after = resp
        .headers()
        .get("X-RateLimit-Reset-After")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map_or(DEFAULT_RETRY_AFTER, Duration::from_secs_f64);
    Error::RateLimited { retry_after }
}

// ── Poller ──────────────────────────────────────────────────────────────────

/// Poll the channel until cancelled.
///
/// The first successful fetch only records the newest id so history that
/// predates the bridge is not replayed.
async fn poll_loop(inner: Arc<Inner>, cancel: CancellationToken) {
    let interval = Duration::from_secs(inner.config.poll_interval_secs.max(1));
    let mut last_seen: Option<String> = None;
    let mut primed = false;

    loop {
        let delay = match inner.fetch(last_seen.as_deref()).await {
            Ok(batch) => {
                if let Some(newest) = batch.first() {
                    last_seen = Some(newest.id.clone());
                }
                if primed {
                    for wire in batch.iter().rev() {
                        inner.handle(wire).await;
                    }
                } else {
                    debug!(channel = inner.core.name(), skipped = batch.len(), "poller primed");
                    primed = true;
                }
                interval
            },
            Err(Error::RateLimited { retry_after }) => {
                warn!(channel = inner.core.name(), ?retry_after, "Discord rate limit hit");
                retry_after
            },
            Err(e) => {
                warn!(channel = inner.core.name(), error = %e, "Discord poll failed");
                interval * 2
            },
        };

        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {},
        }
    }
    debug!(channel = inner.core.name(), "Discord poller stopped");
}

// ── Channel ─────────────────────────────────────────────────────────────────

struct Poller {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Discord channel: webhook for sending, REST polling for receiving.
pub struct DiscordChannel {
    inner: Arc<Inner>,
    poller: Mutex<Option<Poller>>,
}

impl DiscordChannel {
    pub fn new(name: &str, config: DiscordConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .unwrap_or_else(|e| {
                warn!(channel = name, error = %e, "falling back to default HTTP client");
                reqwest::Client::new()
            });
        Self {
            inner: Arc::new(Inner {
                core: AdapterCore::new(name, config.is_configured()),
                replies: Mutex::new(ReplyTracker::new(config.max_tracked)),
                http,
                config,
            }),
            poller: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &DiscordConfig {
        &self.inner.config
    }

    async fn stop_poller(&self) {
        let poller = self
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(poller) = poller {
            poller.cancel.cancel();
            if let Err(e) = poller.task.await {
                warn!(channel = self.name(), error = %e, "Discord poller ended abnormally");
            }
        }
    }
}

#[async_trait]
impl ChannelAdapter for DiscordChannel {
    fn name(&self) -> &str {
        self.inner.core.name()
    }

    fn kind(&self) -> &str {
        CHANNEL_TYPE
    }

    fn capabilities(&self) -> ProtocolCapabilities {
        ProtocolCapabilities {
            can_send: self.inner.config.is_configured(),
            can_receive: self.inner.config.can_receive(),
            supports_position: true,
            supports_threading: true,
            supports_attachments: true,
            max_message_length: Some(format::MAX_CONTENT),
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
            error!(channel = self.name(), "Discord webhook URL missing or invalid");
            return false;
        }
        if self.is_connected() {
            return true;
        }
        self.stop_poller().await;

        if let Err(e) = self.inner.check_webhook().await {
            error!(channel = self.name(), error = %e, "Discord webhook check failed");
            return false;
        }
        self.inner.core.set_state(ConnectionState::Connected);

        if self.inner.config.can_receive() {
            let cancel = CancellationToken::new();
            let task = tokio::spawn(poll_loop(Arc::clone(&self.inner), cancel.clone()));
            *self.poller.lock().unwrap_or_else(PoisonError::into_inner) = Some(Poller { cancel, task });
            info!(
                channel = self.name(),
                channel_id = %self.inner.config.channel_id,
                "Discord connected, polling for messages"
            );
        } else {
            info!(channel = self.name(), "Discord connected (send only)");
        }
        true
    }

    async fn disconnect(&self) -> bool {
        self.stop_poller().await;
        if self.state() != ConnectionState::Unconfigured {
            self.inner.core.set_state(ConnectionState::Disconnected);
        }
        info!(channel = self.name(), "Discord disconnected");
        true
    }

    async fn send_message(&self, message: &Message) -> bool {
        if !self.is_connected() {
            warn!(channel = self.name(), "Discord not connected, cannot send");
            return false;
        }
        if let Err(reason) = self.validate_message(message) {
            warn!(channel = self.name(), %reason, "message rejected");
            return false;
        }

        let payload = format::webhook_payload(message, &self.inner.config.username);
        match self.inner.post(&payload).await {
            Ok(posted) => {
                if let Some(id) = posted
                    && format::is_radio_source(message)
                {
                    self.inner.remember(id, &message.source_id);
                }
                info!(
                    channel = self.name(),
                    source = %message.source_id,
                    id = message.message_id(),
                    "sent Discord message"
                );
                true
            },
            Err(e) => {
                warn!(channel = self.name(), error = %e, "Discord webhook post failed");
                false
            },
        }
    }

    fn set_message_sink(&self, sink: Arc<dyn MessageSink>) {
        self.inner.core.set_sink(sink);
    }

    fn parse_message(&self, raw: &str) -> Option<Message> {
        let wire: WireMessage = serde_json::from_str(raw).ok()?;
        format::to_message(self.name(), &wire)
    }
}

impl Drop for DiscordChannel {
    fn drop(&mut self) {
        if let Some(poller) = self
            .poller
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            poller.cancel.cancel();
        }
    }
}
