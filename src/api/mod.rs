pub mod binance;
pub mod error;

pub use binance::{BinanceEnvironment, BinanceFuturesClient, Credentials};
pub use error::ExchangeError;

use crate::models::{ExchangeInfo, OrderAck, OrderRequest};
use rust_decimal::Decimal;

/// The four exchange operations the decision engine consumes, plus leverage setup.
///
/// Implemented by [`BinanceFuturesClient`] for live trading and by scripted
/// fakes in tests.
#[allow(async_fn_in_trait)]
pub trait Exchange {
    /// Fetch metadata for all tradable symbols
    async fn exchange_info(&self) -> Result<ExchangeInfo, ExchangeError>;

    /// Latest traded price for `symbol`
    async fn current_price(&self, symbol: &str) -> Result<Decimal, ExchangeError>;

    /// Available balance of `asset` (0 when the asset is not held)
    async fn account_balance(&self, asset: &str) -> Result<Decimal, ExchangeError>;

    /// Submit an order; `Ok` means the exchange accepted it
    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderAck, ExchangeError>;

    /// Change leverage for `symbol`
    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), ExchangeError>;
}
