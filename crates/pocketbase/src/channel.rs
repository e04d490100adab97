use std::{sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    reqwest::header::AUTHORIZATION,
    secrecy::ExposeSecret,
    tracing::{debug, error, info, warn},
};

use rarsms_channels::{
    AdapterCore, ChannelAdapter, ConnectionState, Message, MessageSink, ProtocolCapabilities,
};

#[cfg(feature = "metrics")]
use rarsms_metrics::{counter, histogram, labels, pocketbase as pb_metrics};

use crate::{CHANNEL_TYPE, Error, Result, config::PocketBaseConfig, record::Record};

/// Storage sink that writes every routed message as a PocketBase record.
///
/// It never produces inbound traffic; a registered sink is kept but unused.
pub struct PocketBaseChannel {
    core: AdapterCore,
    config: PocketBaseConfig,
    http: reqwest::Client,
}

impl PocketBaseChannel {
    pub fn new(name: &str, config: PocketBaseConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .unwrap_or_else(|e| {
                warn!(channel = name, error = %e, "falling back to default HTTP client");
                reqwest::Client::new()
            });
        Self {
            core: AdapterCore::new(name, config.is_configured()),
            config,
            http,
        }
    }

    pub fn config(&self) -> &PocketBaseConfig {
        &self.config
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.auth_token {
            Some(token) => request.header(AUTHORIZATION, token.expose_secret().as_str()),
            None => request,
        }
    }

    async fn health(&self) -> Result<()> {
        let resp = self.http.get(self.config.health_url()).send().await?;
        if !resp.status().is_success() {
            return Err(Error::from_response(resp).await);
        }
        Ok(())
    }

    async fn create_record(&self, message: &Message) -> Result<()> {
        #[cfg(feature = "metrics")]
        let started = std::time::Instant::now();

        let resp = self
            .authorize(self.http.post(self.config.records_url()))
            .json(&Record::from(message))
            .send()
            .await?;

        #[cfg(feature = "metrics")]
        {
            histogram!(pb_metrics::REQUEST_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
            counter!(
                pb_metrics::RECORDS_CREATED_TOTAL,
                labels::STATUS => resp.status().as_u16().to_string()
            )
            .increment(1);
        }

        if !resp.status().is_success() {
            return Err(Error::from_response(resp).await);
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for PocketBaseChannel {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn kind(&self) -> &str {
        CHANNEL_TYPE
    }

    fn capabilities(&self) -> ProtocolCapabilities {
        ProtocolCapabilities {
            can_send: true,
            can_receive: false,
            supports_position: true,
            supports_threading: true,
            supports_attachments: false,
            max_message_length: None,
        }
    }

    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    fn state(&self) -> ConnectionState {
        self.core.state()
    }

    async fn connect(&self) -> bool {
        if !self.is_configured() {
            error!(channel = self.name(), "PocketBase url or collection missing");
            return false;
        }
        match self.health().await {
            Ok(()) => {
                self.core.set_state(ConnectionState::Connected);
                info!(channel = self.name(), url = %self.config.url, "PocketBase connected");
                true
            },
            Err(e) => {
                error!(channel = self.name(), url = %self.config.url, error = %e, "PocketBase health check failed");
                false
            },
        }
    }

    async fn disconnect(&self) -> bool {
        if self.state() != ConnectionState::Unconfigured {
            self.core.set_state(ConnectionState::Disconnected);
        }
        info!(channel = self.name(), "PocketBase disconnected");
        true
    }

    async fn send_message(&self, message: &Message) -> bool {
        if !self.is_connected() {
            warn!(channel = self.name(), "PocketBase not connected, cannot store");
            return false;
        }
        if let Err(reason) = self.validate_message(message) {
            warn!(channel = self.name(), %reason, "message rejected");
            return false;
        }
        match self.create_record(message).await {
            Ok(()) => {
                debug!(
                    channel = self.name(),
                    id = message.message_id(),
                    source = %message.source_id,
                    "stored message"
                );
                true
            },
            Err(e) => {
                warn!(channel = self.name(), id = message.message_id(), error = %e, "PocketBase write failed");
                false
            },
        }
    }

    fn set_message_sink(&self, sink: Arc<dyn MessageSink>) {
        self.core.set_sink(sink);
    }
}
