use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Order side
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order type accepted by the bot
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    #[default]
    Market,
    Limit,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "MARKET",
            OrderType::Limit => "LIMIT",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MARKET" => Ok(OrderType::Market),
            "LIMIT" => Ok(OrderType::Limit),
            other => Err(format!("unknown order type '{}' (expected MARKET or LIMIT)", other)),
        }
    }
}

/// Time in force. Only GTC is ever sent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    Gtc,
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInForce::Gtc => "GTC",
        }
    }
}

/// Per-symbol exchange constraints, fixed for the lifetime of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRules {
    pub quantity_precision: u32,
    pub price_precision: u32,
    pub min_notional: Decimal,
}

impl Default for SymbolRules {
    fn default() -> Self {
        Self {
            quantity_precision: 3,
            price_precision: 2,
            min_notional: Decimal::new(5, 0),
        }
    }
}

/// Validated, exchange-compliant order ready for submission
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Decimal,
    /// Fixed-point price string, LIMIT only
    pub price: Option<String>,
    /// GTC for LIMIT, absent for MARKET
    pub time_in_force: Option<TimeInForce>,
    pub client_order_id: String,
}

impl OrderRequest {
    /// Request parameters in the order the exchange documents them
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("symbol", self.symbol.clone()),
            ("side", self.side.as_str().to_string()),
            ("type", self.order_type.as_str().to_string()),
            ("quantity", self.quantity.to_string()),
        ];

        if let Some(price) = &self.price {
            params.push(("price", price.clone()));
        }
        if let Some(tif) = self.time_in_force {
            params.push(("timeInForce", tif.as_str().to_string()));
        }
        params.push(("newClientOrderId", self.client_order_id.clone()));

        params
    }
}

/// Position in the traded symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionState {
    pub symbol: String,
    pub in_position: bool,
}

impl PositionState {
    pub fn flat(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            in_position: false,
        }
    }
}

/// Trading parameters supplied once at startup
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdConfig {
    pub symbol: String,
    pub buy_threshold: Decimal,
    pub sell_threshold: Decimal,
    pub quantity: Decimal,
    pub order_type: OrderType,
    pub poll_interval: Duration,
}

// ============================================================================
// Exchange payloads
// ============================================================================

/// Subset of the futures exchange metadata the bot needs
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ExchangeInfo {
    #[serde(default)]
    pub symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    pub symbol: String,
    pub quantity_precision: u32,
    pub price_precision: u32,
    #[serde(default)]
    pub filters: Vec<SymbolFilter>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolFilter {
    pub filter_type: String,
    #[serde(default)]
    pub notional: Option<String>,
}

/// Acknowledgement returned by the exchange for an accepted order
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderAck {
    pub order_id: u64,
    #[serde(default)]
    pub client_order_id: String,
    #[serde(default)]
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_default_symbol_rules() {
        let rules = SymbolRules::default();
        assert_eq!(rules.quantity_precision, 3);
        assert_eq!(rules.price_precision, 2);
        assert_eq!(rules.min_notional, d("5.0"));
    }

    #[test]
    fn test_order_type_parsing() {
        assert_eq!("market".parse::<OrderType>().unwrap(), OrderType::Market);
        assert_eq!("LIMIT".parse::<OrderType>().unwrap(), OrderType::Limit);
        assert!("STOP".parse::<OrderType>().is_err());
    }

    #[test]
    fn test_limit_order_params() {
        let order = OrderRequest {
            symbol: "BTCUSDT".to_string(),
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            quantity: d("0.002"),
            price: Some("90900.00".to_string()),
            time_in_force: Some(TimeInForce::Gtc),
            client_order_id: "abc".to_string(),
        };

        let params = order.to_params();
        assert!(params.contains(&("price", "90900.00".to_string())));
        assert!(params.contains(&("timeInForce", "GTC".to_string())));
        assert!(params.contains(&("quantity", "0.002".to_string())));
    }

    #[test]
    fn test_market_order_params_have_no_price() {
        let order = OrderRequest {
            symbol: "BTCUSDT".to_string(),
            side: OrderSide::Sell,
            order_type: OrderType::Market,
            quantity: d("0.002"),
            price: None,
            time_in_force: None,
            client_order_id: "abc".to_string(),
        };

        let params = order.to_params();
        assert!(params.iter().all(|(k, _)| *k != "price" && *k != "timeInForce"));
        assert!(params.contains(&("side", "SELL".to_string())));
    }

    #[test]
    fn test_exchange_info_deserialization() {
        let json = r#"{
            "symbols": [{
                "symbol": "BTCUSDT",
                "quantityPrecision": 3,
                "pricePrecision": 2,
                "filters": [
                    {"filterType": "PRICE_FILTER", "tickSize": "0.10"},
                    {"filterType": "MIN_NOTIONAL", "notional": "100"}
                ]
            }]
        }"#;

        let info: ExchangeInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.symbols.len(), 1);
        assert_eq!(info.symbols[0].filters[1].notional.as_deref(), Some("100"));
        assert!(info.symbols[0].filters[0].notional.is_none());
    }
}
