use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::Context;
use clap::Parser;
use threshold_bot::api::{BinanceFuturesClient, Credentials};
use threshold_bot::config::{BotConfig, Cli, LoggingSettings};
use threshold_bot::execution::DecisionLoop;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = BotConfig::load(&cli).context("Invalid configuration")?;
    setup_logging(&config.logging)?;

    let environment = config.environment();
    tracing::info!(
        environment = ?environment,
        base_url = environment.base_url(),
        log_file = %config.logging.file.display(),
        "Bot initialized"
    );

    let credentials = Credentials::from_env().context("Missing Binance credentials")?;
    let client = BinanceFuturesClient::new(environment, Some(credentials), config.request_timeout())
        .context("Failed to build HTTP client")?;

    let mut bot = DecisionLoop::bootstrap(
        client,
        config.threshold_config(),
        config.trading.leverage,
        config.throttle(),
    )
    .await;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C, shutting down...");
    };

    let summary = bot.run(shutdown).await.context("Trading loop aborted")?;

    tracing::info!(
        ticks = summary.ticks,
        fills = summary.fills,
        in_position = bot.in_position(),
        "👋 Bot stopped"
    );
    Ok(())
}

/// Console output plus an append-only plain-text log file
fn setup_logging(settings: &LoggingSettings) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.filter));

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&settings.file)
        .with_context(|| format!("Cannot open log file {}", settings.file.display()))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}
