//! Metric name and label definitions.
//!
//! Every metric the bridge emits is named here so dashboards have a single
//! place to look.

/// Routing engine metrics
pub mod bridge {
    /// Inbound messages handed to the engine by any channel
    pub const MESSAGES_RECEIVED_TOTAL: &str = "rarsms_messages_received_total";
    /// Outbound messages accepted by a target channel
    pub const MESSAGES_SENT_TOTAL: &str = "rarsms_messages_sent_total";
    /// Inbound messages delivered to at least one target
    pub const MESSAGES_ROUTED_TOTAL: &str = "rarsms_messages_routed_total";
    /// Renderings produced by content adaptation
    pub const MESSAGES_ADAPTED_TOTAL: &str = "rarsms_messages_adapted_total";
    /// Failed or rejected deliveries
    pub const ROUTING_ERRORS_TOTAL: &str = "rarsms_routing_errors_total";
    /// Adaptations that fell back to primary content
    pub const ADAPTATION_ERRORS_TOTAL: &str = "rarsms_adaptation_errors_total";
    /// Channels currently registered with the engine
    pub const CHANNELS_REGISTERED: &str = "rarsms_channels_registered";
    /// Channels currently connected
    pub const CHANNELS_CONNECTED: &str = "rarsms_channels_connected";
}

/// APRS-IS driver metrics
pub mod aprs {
    /// Raw lines read from the APRS-IS socket
    pub const LINES_RECEIVED_TOTAL: &str = "rarsms_aprs_lines_received_total";
    /// Packets dropped by prefix, authorization or duplicate filtering
    pub const PACKETS_FILTERED_TOTAL: &str = "rarsms_aprs_packets_filtered_total";
    /// Frames written to the APRS-IS socket
    pub const FRAMES_SENT_TOTAL: &str = "rarsms_aprs_frames_sent_total";
}

/// Discord driver metrics
pub mod discord {
    /// Webhook posts
    pub const WEBHOOK_POSTS_TOTAL: &str = "rarsms_discord_webhook_posts_total";
    /// Webhook post duration in seconds
    pub const WEBHOOK_DURATION_SECONDS: &str = "rarsms_discord_webhook_duration_seconds";
    /// Rate-limit responses received from the Discord API
    pub const RATE_LIMITED_TOTAL: &str = "rarsms_discord_rate_limited_total";
    /// Replies bridged back toward the radio side
    pub const REPLIES_BRIDGED_TOTAL: &str = "rarsms_discord_replies_bridged_total";
}

/// PocketBase driver metrics
pub mod pocketbase {
    /// Records written
    pub const RECORDS_CREATED_TOTAL: &str = "rarsms_pocketbase_records_created_total";
    /// Record write duration in seconds
    pub const REQUEST_DURATION_SECONDS: &str = "rarsms_pocketbase_request_duration_seconds";
}

/// Common label keys
pub mod labels {
    pub const CHANNEL: &str = "channel";
    pub const REASON: &str = "reason";
    pub const STATUS: &str = "status";
}

/// Histogram buckets
pub mod buckets {
    use std::sync::LazyLock;

    /// Outbound HTTP request duration buckets (in seconds)
    /// Covers 5ms to 30s
    pub static HTTP_DURATION: LazyLock<Vec<f64>> = LazyLock::new(|| {
        vec![
            0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
        ]
    });
}
