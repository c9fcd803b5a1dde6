//! Layered configuration: built-in defaults, optional TOML file,
//! `BOT__*` environment variables, then command-line flags.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::api::BinanceEnvironment;
use crate::models::{OrderType, ThresholdConfig};
use crate::risk::{CooldownSchedule, RetryMode, SubmissionThrottle};

const DEFAULT_CONFIG_FILE: &str = "config/bot";
const MAX_LEVERAGE: u32 = 125;
const BACKOFF_JITTER: f64 = 0.1;
const MAX_COOLDOWN_SECS: u64 = 24 * 60 * 60;

/// Command-line flags; every flag overrides the file/env value when given
#[derive(Debug, Parser, Default)]
#[command(name = "threshold-bot", about = "Buy-low / sell-high threshold bot for Binance USDⓈ-M futures")]
pub struct Cli {
    /// TOML config file (defaults to config/bot.toml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub symbol: Option<String>,

    #[arg(long)]
    pub buy_threshold: Option<Decimal>,

    #[arg(long)]
    pub sell_threshold: Option<Decimal>,

    #[arg(long)]
    pub quantity: Option<Decimal>,

    /// MARKET or LIMIT
    #[arg(long)]
    pub order_type: Option<OrderType>,

    /// Seconds between price polls
    #[arg(long)]
    pub poll_interval: Option<u64>,

    #[arg(long)]
    pub leverage: Option<u32>,

    /// Trade on the production API instead of testnet
    #[arg(long)]
    pub production: bool,

    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// unthrottled or backoff
    #[arg(long)]
    pub retry: Option<RetryMode>,

    /// Per-request HTTP timeout in seconds
    #[arg(long)]
    pub request_timeout: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    pub trading: TradingSettings,
    pub exchange: ExchangeSettings,
    pub retry: RetrySettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradingSettings {
    pub symbol: String,
    pub buy_threshold: Decimal,
    pub sell_threshold: Decimal,
    pub quantity: Decimal,
    pub order_type: OrderType,
    pub poll_interval_secs: u64,
    pub leverage: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeSettings {
    pub production: bool,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    pub mode: RetryMode,
    pub max_delay_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    pub file: PathBuf,
    /// Used when RUST_LOG is not set
    pub filter: String,
}

impl BotConfig {
    /// Merge all configuration layers and validate the result
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("trading.symbol", "BTCUSDT")?
            .set_default("trading.buy_threshold", "90900")?
            .set_default("trading.sell_threshold", "91000")?
            .set_default("trading.quantity", "0.0012")?
            .set_default("trading.order_type", "MARKET")?
            .set_default("trading.poll_interval_secs", 3)?
            .set_default("trading.leverage", 1)?
            .set_default("exchange.production", false)?
            .set_default("exchange.request_timeout_secs", 10)?
            .set_default("retry.mode", "backoff")?
            .set_default("retry.max_delay_secs", 60)?
            .set_default("logging.file", "trading_bot.log")?
            .set_default("logging.filter", "threshold_bot=info")?;

        builder = match &cli.config {
            Some(path) => builder.add_source(File::from(path.as_path()).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        builder = builder
            .add_source(Environment::with_prefix("BOT").separator("__"))
            .set_override_option("trading.symbol", cli.symbol.clone())?
            .set_override_option("trading.buy_threshold", cli.buy_threshold.map(|d| d.to_string()))?
            .set_override_option("trading.sell_threshold", cli.sell_threshold.map(|d| d.to_string()))?
            .set_override_option("trading.quantity", cli.quantity.map(|d| d.to_string()))?
            .set_override_option("trading.order_type", cli.order_type.map(|t| t.as_str().to_string()))?
            .set_override_option("trading.poll_interval_secs", cli.poll_interval.map(|v| v as i64))?
            .set_override_option("trading.leverage", cli.leverage.map(i64::from))?
            .set_override_option("exchange.production", cli.production.then_some(true))?
            .set_override_option(
                "exchange.request_timeout_secs",
                cli.request_timeout.map(|v| v as i64),
            )?
            .set_override_option(
                "retry.mode",
                cli.retry.map(|m| match m {
                    RetryMode::Unthrottled => "unthrottled".to_string(),
                    RetryMode::Backoff => "backoff".to_string(),
                }),
            )?
            .set_override_option(
                "logging.file",
                cli.log_file.as_ref().map(|p| p.to_string_lossy().into_owned()),
            )?;

        let config: BotConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.trading;

        if t.symbol.trim().is_empty() {
            return Err(ConfigError::Message("symbol must not be empty".to_string()));
        }
        if t.buy_threshold <= Decimal::ZERO || t.sell_threshold <= Decimal::ZERO {
            return Err(ConfigError::Message("thresholds must be positive".to_string()));
        }
        if t.buy_threshold >= t.sell_threshold {
            return Err(ConfigError::Message(format!(
                "buy threshold {} must be below sell threshold {}",
                t.buy_threshold, t.sell_threshold
            )));
        }
        if t.quantity <= Decimal::ZERO {
            return Err(ConfigError::Message("quantity must be positive".to_string()));
        }
        if t.poll_interval_secs == 0 {
            return Err(ConfigError::Message("poll interval must be at least 1 second".to_string()));
        }
        if !(1..=MAX_LEVERAGE).contains(&t.leverage) {
            return Err(ConfigError::Message(format!(
                "leverage must be between 1 and {}",
                MAX_LEVERAGE
            )));
        }
        if self.retry.max_delay_secs > MAX_COOLDOWN_SECS {
            return Err(ConfigError::Message(format!(
                "retry max delay must be at most {} seconds",
                MAX_COOLDOWN_SECS
            )));
        }
        if self.exchange.request_timeout_secs == 0 {
            return Err(ConfigError::Message("request timeout must be positive".to_string()));
        }

        Ok(())
    }

    pub fn threshold_config(&self) -> ThresholdConfig {
        ThresholdConfig {
            symbol: self.trading.symbol.to_ascii_uppercase(),
            buy_threshold: self.trading.buy_threshold,
            sell_threshold: self.trading.sell_threshold,
            quantity: self.trading.quantity,
            order_type: self.trading.order_type,
            poll_interval: Duration::from_secs(self.trading.poll_interval_secs),
        }
    }

    pub fn environment(&self) -> BinanceEnvironment {
        if self.exchange.production {
            BinanceEnvironment::Production
        } else {
            BinanceEnvironment::Testnet
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.exchange.request_timeout_secs)
    }

    /// Cooldown starts at one poll interval and doubles up to the cap
    pub fn throttle(&self) -> SubmissionThrottle {
        let base = Duration::from_secs(self.trading.poll_interval_secs);
        let max_delay = Duration::from_secs(self.retry.max_delay_secs).max(base);

        SubmissionThrottle::new(
            self.retry.mode,
            CooldownSchedule::new(base, max_delay, BACKOFF_JITTER),
        )
    }
}
