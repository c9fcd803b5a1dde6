use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::api::{Exchange, ExchangeError};
use crate::models::{ExchangeInfo, OrderAck, OrderRequest, SymbolFilter, SymbolInfo};

/// In-memory exchange driven by a script of prices and submission results
pub(crate) struct ScriptedExchange {
    info: Option<ExchangeInfo>,
    prices: RefCell<VecDeque<Decimal>>,
    submit_results: RefCell<VecDeque<Result<OrderAck, ExchangeError>>>,
    submitted: RefCell<Vec<OrderRequest>>,
    leverage_calls: RefCell<Vec<(String, u32)>>,
    fail_leverage: bool,
    price_delay: Option<Duration>,
    submit_delay: Option<Duration>,
    next_order_id: Cell<u64>,
}

impl ScriptedExchange {
    pub fn new() -> Self {
        Self {
            info: Some(ExchangeInfo {
                symbols: vec![SymbolInfo {
                    symbol: "BTCUSDT".to_string(),
                    quantity_precision: 3,
                    price_precision: 1,
                    filters: vec![SymbolFilter {
                        filter_type: "MIN_NOTIONAL".to_string(),
                        notional: Some("100".to_string()),
                    }],
                }],
            }),
            prices: RefCell::new(VecDeque::new()),
            submit_results: RefCell::new(VecDeque::new()),
            submitted: RefCell::new(Vec::new()),
            leverage_calls: RefCell::new(Vec::new()),
            fail_leverage: false,
            price_delay: None,
            submit_delay: None,
            next_order_id: Cell::new(1),
        }
    }

    pub fn failing_metadata(mut self) -> Self {
        self.info = None;
        self
    }

    pub fn failing_leverage(mut self) -> Self {
        self.fail_leverage = true;
        self
    }

    /// Every `current_price` call takes this long
    pub fn with_price_delay(mut self, delay: Duration) -> Self {
        self.price_delay = Some(delay);
        self
    }

    /// Every `submit_order` call takes this long; the order is recorded up front
    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = Some(delay);
        self
    }

    /// Prices returned by successive `current_price` calls; the feed fails once exhausted
    pub fn with_prices(self, prices: &[&str]) -> Self {
        self.prices
            .borrow_mut()
            .extend(prices.iter().map(|p| p.parse::<Decimal>().unwrap()));
        self
    }

    /// Queue a rejection for the next submission; unqueued submissions succeed
    pub fn reject_next_submission(self, code: i32, message: &str) -> Self {
        self.submit_results.borrow_mut().push_back(Err(ExchangeError::Api {
            code,
            message: message.to_string(),
        }));
        self
    }

    pub fn submitted(&self) -> Vec<OrderRequest> {
        self.submitted.borrow().clone()
    }

    pub fn leverage_calls(&self) -> Vec<(String, u32)> {
        self.leverage_calls.borrow().clone()
    }
}

impl Exchange for ScriptedExchange {
    async fn exchange_info(&self) -> Result<ExchangeInfo, ExchangeError> {
        self.info
            .clone()
            .ok_or_else(|| ExchangeError::Parse("metadata unavailable".to_string()))
    }

    async fn current_price(&self, _symbol: &str) -> Result<Decimal, ExchangeError> {
        if let Some(delay) = self.price_delay {
            tokio::time::sleep(delay).await;
        }
        self.prices
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| ExchangeError::Parse("price feed exhausted".to_string()))
    }

    async fn account_balance(&self, _asset: &str) -> Result<Decimal, ExchangeError> {
        Ok(Decimal::from(1000))
    }

    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderAck, ExchangeError> {
        self.submitted.borrow_mut().push(order.clone());
        if let Some(delay) = self.submit_delay {
            tokio::time::sleep(delay).await;
        }

        match self.submit_results.borrow_mut().pop_front() {
            Some(result) => result,
            None => {
                let order_id = self.next_order_id.get();
                self.next_order_id.set(order_id + 1);
                Ok(OrderAck {
                    order_id,
                    client_order_id: order.client_order_id.clone(),
                    status: "NEW".to_string(),
                })
            }
        }
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), ExchangeError> {
        self.leverage_calls
            .borrow_mut()
            .push((symbol.to_string(), leverage));
        if self.fail_leverage {
            return Err(ExchangeError::Api {
                code: -4028,
                message: "Leverage is not valid".to_string(),
            });
        }
        Ok(())
    }
}
