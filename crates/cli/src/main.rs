mod bridge;
mod check;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "rarsms", version, about = "RARSMS: bridge APRS radio, Discord and PocketBase")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (default: ./rarsms.toml, then ~/.config/rarsms/).
    #[arg(long, short, global = true, env = "RARSMS_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bridge (default when no subcommand is provided).
    Run,
    /// Validate the configuration and report errors and warnings.
    Check {
        /// Show informational diagnostics too.
        #[arg(long)]
        verbose: bool,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_thread_ids(false))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Check { verbose }) => {
            if !check::check(cli.config.as_deref(), *verbose)? {
                std::process::exit(1);
            }
            Ok(())
        },
        None | Some(Commands::Run) => {
            init_telemetry(&cli);
            info!(version = env!("CARGO_PKG_VERSION"), "rarsms starting");

            let loaded = rarsms_config::load(cli.config.as_deref())?;
            match &loaded.path {
                Some(path) => info!(path = %path.display(), "loaded config"),
                None => info!("no config file, using environment"),
            }
            bridge::run(loaded.config).await
        },
    }
}
