use std::future::Future;
use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;
use tokio::time::{sleep, Instant};

use crate::api::{Exchange, ExchangeError};
use crate::execution::{build_order, load_rules, PositionTracker, RejectionReason};
use crate::models::{OrderSide, OrderType, SymbolRules, ThresholdConfig};
use crate::risk::{RetryMode, SubmissionThrottle};

const BALANCE_ASSET: &str = "USDT";
// Repeated rejections are logged at WARN on the first and every Nth tick
const REJECTION_WARN_EVERY: u32 = 20;

/// Result of a single poll
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// No threshold crossed for the current position state
    Idle,
    /// Trigger held but a previous submission failure is still cooling down
    CoolingDown { side: OrderSide, remaining: Duration },
    /// Trigger held but the order failed validation; nothing was sent
    Rejected { side: OrderSide, reason: RejectionReason },
    /// Exchange accepted the order and the position flipped
    Filled { side: OrderSide, order_id: u64 },
    /// Exchange or transport refused the order; position unchanged
    SubmissionFailed { side: OrderSide, error: String },
}

/// Errors that end the loop
#[derive(Debug, Error)]
pub enum LoopError {
    #[error("price fetch failed for {symbol}: {source}")]
    PriceFetchFailed {
        symbol: String,
        #[source]
        source: ExchangeError,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub fills: u64,
    pub rejections: u64,
    pub failed_submissions: u64,
}

impl RunSummary {
    fn record(&mut self, outcome: &TickOutcome) {
        self.ticks += 1;
        match outcome {
            TickOutcome::Filled { .. } => self.fills += 1,
            TickOutcome::Rejected { .. } => self.rejections += 1,
            TickOutcome::SubmissionFailed { .. } => self.failed_submissions += 1,
            TickOutcome::Idle | TickOutcome::CoolingDown { .. } => {}
        }
    }
}

/// Polls the price and trades a single symbol between flat and long
pub struct DecisionLoop<E> {
    exchange: E,
    config: ThresholdConfig,
    rules: SymbolRules,
    positions: PositionTracker,
    throttle: SubmissionThrottle,
    consecutive_rejections: u32,
}

impl<E: Exchange> DecisionLoop<E> {
    pub fn new(
        exchange: E,
        config: ThresholdConfig,
        rules: SymbolRules,
        throttle: SubmissionThrottle,
    ) -> Self {
        let positions = PositionTracker::with_symbol(&config.symbol);

        Self {
            exchange,
            config,
            rules,
            positions,
            throttle,
            consecutive_rejections: 0,
        }
    }

    /// Startup sequence: best-effort leverage, balance report, symbol rules.
    ///
    /// None of these steps can fail the run.
    pub async fn bootstrap(
        exchange: E,
        config: ThresholdConfig,
        leverage: u32,
        throttle: SubmissionThrottle,
    ) -> Self {
        let symbol = config.symbol.as_str();

        match exchange.set_leverage(symbol, leverage).await {
            Ok(()) => tracing::info!(symbol, leverage, "Leverage set"),
            Err(e) => tracing::warn!(symbol, leverage, error = %e, "Could not set leverage, continuing"),
        }

        match exchange.account_balance(BALANCE_ASSET).await {
            Ok(balance) => tracing::info!(asset = BALANCE_ASSET, balance = %balance, "Available balance"),
            Err(e) => tracing::warn!(asset = BALANCE_ASSET, error = %e, "Could not fetch balance"),
        }

        let loaded = load_rules(&exchange, symbol).await;

        Self::new(exchange, config, loaded.rules, throttle)
    }

    pub fn exchange(&self) -> &E {
        &self.exchange
    }

    pub fn config(&self) -> &ThresholdConfig {
        &self.config
    }

    pub fn rules(&self) -> &SymbolRules {
        &self.rules
    }

    pub fn positions(&self) -> &PositionTracker {
        &self.positions
    }

    pub fn in_position(&self) -> bool {
        self.positions.in_position(&self.config.symbol)
    }

    /// Which side, if any, the price triggers for the current position state
    pub fn trigger(&self, price: Decimal) -> Option<OrderSide> {
        let symbol = &self.config.symbol;

        if self.positions.can_buy(symbol) && price <= self.config.buy_threshold {
            Some(OrderSide::Buy)
        } else if self.positions.can_sell(symbol) && price >= self.config.sell_threshold {
            Some(OrderSide::Sell)
        } else {
            None
        }
    }

    /// Fetch one price and act on it
    pub async fn tick(&mut self) -> Result<TickOutcome, LoopError> {
        let price = self.fetch_price().await?;
        Ok(self.act_on_price(price).await)
    }

    /// Price phase of a tick. Nothing has been sent yet, so it is safe to drop.
    async fn fetch_price(&self) -> Result<Decimal, LoopError> {
        let symbol = self.config.symbol.as_str();

        self.exchange
            .current_price(symbol)
            .await
            .map_err(|source| LoopError::PriceFetchFailed {
                symbol: symbol.to_string(),
                source,
            })
    }

    /// Decision phase of a tick; runs to completion once started
    async fn act_on_price(&mut self, price: Decimal) -> TickOutcome {
        let symbol = self.config.symbol.as_str();

        tracing::info!(
            "Price: {:.2} | Target Buy: {} | Target Sell: {}",
            price,
            self.config.buy_threshold,
            self.config.sell_threshold
        );

        let Some(side) = self.trigger(price) else {
            self.consecutive_rejections = 0;
            return TickOutcome::Idle;
        };

        if let Some(remaining) = self.throttle.remaining(Instant::now()) {
            tracing::debug!(symbol, side = %side, ?remaining, "Trigger held, submission cooling down");
            return TickOutcome::CoolingDown { side, remaining };
        }

        let threshold = match side {
            OrderSide::Buy => self.config.buy_threshold,
            OrderSide::Sell => self.config.sell_threshold,
        };
        tracing::info!(symbol, price = %price, threshold = %threshold, ">> {} threshold hit", side);

        let limit_price = (self.config.order_type == OrderType::Limit).then_some(threshold);

        let order = match build_order(
            symbol,
            self.config.quantity,
            side,
            self.config.order_type,
            price,
            limit_price,
            &self.rules,
        ) {
            Ok(order) => order,
            Err(reason) => {
                self.consecutive_rejections = self.consecutive_rejections.saturating_add(1);
                let consecutive = self.consecutive_rejections;

                if consecutive == 1 || consecutive % REJECTION_WARN_EVERY == 0 {
                    tracing::warn!(
                        symbol,
                        side = %side,
                        quantity = %self.config.quantity,
                        price = %price,
                        threshold = %threshold,
                        consecutive,
                        "Trade ignored: {}",
                        reason
                    );
                } else {
                    tracing::debug!(symbol, side = %side, consecutive, "Trade ignored: {}", reason);
                }

                return TickOutcome::Rejected { side, reason };
            }
        };
        self.consecutive_rejections = 0;

        tracing::info!(
            symbol,
            side = %side,
            order_type = %order.order_type,
            quantity = %order.quantity,
            price = order.price.as_deref().unwrap_or("MARKET"),
            client_order_id = %order.client_order_id,
            "Placing order"
        );

        match self.exchange.submit_order(&order).await {
            Ok(ack) => {
                self.positions.record_fill(symbol, side);
                self.throttle.record_success();
                tracing::info!(
                    symbol,
                    order_id = ack.order_id,
                    status = %ack.status,
                    "SUCCESS: {} order {} filled/placed",
                    side,
                    ack.order_id
                );
                TickOutcome::Filled {
                    side,
                    order_id: ack.order_id,
                }
            }
            Err(e) => {
                let cooldown = self.throttle.record_failure(Instant::now());
                tracing::error!(
                    symbol,
                    side = %side,
                    client_order_id = %order.client_order_id,
                    failures = self.throttle.consecutive_failures(),
                    ?cooldown,
                    "Order submission failed: {}",
                    e
                );
                TickOutcome::SubmissionFailed {
                    side,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Poll until `shutdown` resolves or the price feed fails.
    ///
    /// The stop signal interrupts sleeps and price fetches immediately. Once
    /// a price has been received the tick runs to completion, so a submission
    /// in flight is never abandoned.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<RunSummary, LoopError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut summary = RunSummary::default();

        tracing::info!(
            symbol = %self.config.symbol,
            order_type = %self.config.order_type,
            retry = ?self.throttle.mode(),
            "Bot running on {}. CTRL+C to stop.",
            self.config.symbol
        );
        if self.throttle.mode() == RetryMode::Unthrottled {
            tracing::warn!("Unthrottled retry: failed submissions are retried on every tick");
        }

        loop {
            let fetched = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                fetched = self.fetch_price() => fetched,
            };

            let price = match fetched {
                Ok(price) => price,
                Err(e) => {
                    tracing::error!(ticks = summary.ticks, "Stopping: {}", e);
                    return Err(e);
                }
            };

            let outcome = self.act_on_price(price).await;
            summary.record(&outcome);

            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = sleep(self.config.poll_interval) => {}
            }
        }

        tracing::info!(
            ticks = summary.ticks,
            fills = summary.fills,
            rejections = summary.rejections,
            failed_submissions = summary.failed_submissions,
            "Bot stopped by user"
        );
        Ok(summary)
    }
}
