use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use hb_broker::{Broker, BrokerConfig};

#[derive(Parser)]
#[command(name = "hb", about = "Human-browser broker")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Port to listen on.
    #[arg(long, global = true, env = "HB_PORT")]
    port: Option<u16>,

    /// Seconds to wait for the extension before `--require-extension`
    /// startup fails.
    #[arg(long, global = true, default_value_t = 30)]
    connection_timeout: u64,

    /// Exit with an error if no extension connects within the timeout.
    #[arg(long, global = true, default_value_t = false)]
    require_extension: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the broker (default when no subcommand is provided).
    Broker,
}

fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.clone()));
    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    match cli.command {
        Some(Commands::Broker) | None => run_broker(&cli).await,
    }
}

async fn run_broker(cli: &Cli) -> anyhow::Result<()> {
    let mut config = BrokerConfig::default();
    if let Some(port) = cli.port {
        config.port = port;
    }
    config.connection_timeout_ms = cli.connection_timeout.saturating_mul(1000);

    let broker = Broker::start(config).await?;
    info!(url = %broker.url(), "waiting for extension and clients");

    if cli.require_extension {
        broker.wait_for_connection().await?;
        info!("extension connected");
    }

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    broker.close().await;
    Ok(())
}
