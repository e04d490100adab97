//! The `run` command: build the routing engine from config and keep it
//! running until interrupted.

use std::{sync::Arc, time::Duration};

use {
    anyhow::Result,
    rarsms_config::{BridgeConfig, RouteConfig, Severity},
    rarsms_routing::{EngineConfig, RoutingEngine, RoutingRule},
    tracing::{error, info, warn},
};

pub async fn run(config: BridgeConfig) -> Result<()> {
    let report = rarsms_config::validate(&config);
    for d in &report.diagnostics {
        match d.severity {
            Severity::Error => error!(path = %d.path, category = d.category, "{}", d.message),
            Severity::Warning => warn!(path = %d.path, category = d.category, "{}", d.message),
            Severity::Info => info!(path = %d.path, category = d.category, "{}", d.message),
        }
    }
    if report.has_errors() {
        anyhow::bail!(
            "configuration has {} error(s); run `rarsms check` for details",
            report.count(Severity::Error)
        );
    }

    #[cfg(feature = "metrics")]
    let _metrics = rarsms_metrics::init_metrics(rarsms_metrics::MetricsRecorderConfig {
        enabled: config.metrics.enabled,
        global_labels: config.metrics.labels.clone().into_iter().collect(),
    })?;

    let engine = Arc::new(build_engine(&config).await);

    if engine.protocol_status().is_empty() {
        warn!("no channels configured");
        warn!("set APRS_CALLSIGN and APRS_PASSCODE for the radio side");
        warn!("set DISCORD_WEBHOOK_URL for the chat side");
        anyhow::bail!("nothing to bridge");
    }

    let results = engine.connect_all().await;
    let connected = results.values().filter(|ok| **ok).count();
    for (name, ok) in &results {
        if !*ok {
            error!(channel = %name, "channel failed to connect");
        }
    }
    info!(
        connected,
        total = results.len(),
        rules = engine.routing_rules().len(),
        "bridge started"
    );
    if connected == 0 {
        engine.shutdown().await;
        anyhow::bail!("no channels connected");
    }

    let status = config
        .bridge
        .status_interval()
        .map(|every| spawn_status_reporter(Arc::clone(&engine), every));

    shutdown_signal().await;
    info!("shutting down");

    if let Some(task) = status {
        task.abort();
    }
    engine.shutdown().await;
    log_statistics(&engine, "final statistics");
    Ok(())
}

/// Build an engine with every driver type registered and every enabled
/// channel and route added.
pub async fn build_engine(config: &BridgeConfig) -> RoutingEngine {
    let bridge = &config.bridge;
    let engine = RoutingEngine::new(EngineConfig {
        max_history: bridge.max_history,
        queue_capacity: bridge.queue_capacity,
        dispatch_workers: bridge.dispatch_workers,
        connect_timeout: bridge.connect_timeout(),
        ..EngineConfig::default()
    });

    engine.register_protocol_type(rarsms_aprs::CHANNEL_TYPE, rarsms_aprs::factory());
    engine.register_protocol_type(rarsms_discord::CHANNEL_TYPE, rarsms_discord::factory());
    engine.register_protocol_type(rarsms_pocketbase::CHANNEL_TYPE, rarsms_pocketbase::factory());

    for (name, channel) in &config.channels {
        if !channel.enabled {
            info!(channel = %name, "channel disabled, skipping");
            continue;
        }
        if !engine
            .add_protocol(name, &channel.kind, &channel.settings_value())
            .await
        {
            error!(channel = %name, kind = %channel.kind, "failed to add channel");
        }
    }

    for (name, route) in config.routes.iter().filter(|(_, r)| r.enabled) {
        match build_rule(route) {
            Ok(rule) => engine.add_routing_rule(rule),
            Err(e) => error!(route = %name, error = %e, "invalid routing rule"),
        }
    }

    engine
}

fn build_rule(route: &RouteConfig) -> rarsms_routing::Result<RoutingRule> {
    let mut rule = RoutingRule::new(&route.source_protocols, &route.target_protocols)?
        .with_message_types(route.message_types.iter().copied())
        .bidirectional(route.bidirectional);
    if let Some(pattern) = &route.source_filter {
        rule = rule.with_source_filter(pattern)?;
    }
    Ok(rule)
}

fn spawn_status_reporter(
    engine: Arc<RoutingEngine>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            log_statistics(&engine, "bridge status");
            for (name, info) in engine.protocol_status() {
                if !info.connected {
                    warn!(channel = %name, state = ?info.state, "channel not connected");
                }
            }
        }
    })
}

fn log_statistics(engine: &RoutingEngine, label: &str) {
    let stats = engine.statistics();
    info!(
        received = stats.messages_received,
        sent = stats.messages_sent,
        routed = stats.messages_routed,
        adapted = stats.messages_adapted,
        routing_errors = stats.routing_errors,
        adaptation_errors = stats.adaptation_errors,
        connected = ?engine.connected_protocols(),
        "{label}"
    );
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            },
            Err(e) => {
                error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
