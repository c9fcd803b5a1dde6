use crate::api::Exchange;
use crate::models::{ExchangeInfo, SymbolRules};
use rust_decimal::Decimal;
use std::str::FromStr;

const MIN_NOTIONAL_FILTER: &str = "MIN_NOTIONAL";

/// Where the active rules came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RulesSource {
    Exchange,
    /// Built-in defaults, with the reason metadata could not be used
    Default { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedRules {
    pub rules: SymbolRules,
    pub source: RulesSource,
}

impl LoadedRules {
    pub fn is_default(&self) -> bool {
        matches!(self.source, RulesSource::Default { .. })
    }
}

/// Fetch exchange metadata and extract the rules for `symbol`.
///
/// Never fails: a failed query or an unknown symbol yields
/// `SymbolRules::default()` tagged with `RulesSource::Default` and a WARN log.
pub async fn load_rules<E: Exchange>(exchange: &E, symbol: &str) -> LoadedRules {
    let loaded = match exchange.exchange_info().await {
        Ok(info) => rules_from_info(&info, symbol),
        Err(e) => LoadedRules {
            rules: SymbolRules::default(),
            source: RulesSource::Default {
                reason: format!("metadata fetch failed: {}", e),
            },
        },
    };

    match &loaded.source {
        RulesSource::Exchange => tracing::info!(
            symbol,
            qty_precision = loaded.rules.quantity_precision,
            price_precision = loaded.rules.price_precision,
            min_notional = %loaded.rules.min_notional,
            "Setup complete"
        ),
        RulesSource::Default { reason } => tracing::warn!(
            symbol,
            reason = %reason,
            qty_precision = loaded.rules.quantity_precision,
            price_precision = loaded.rules.price_precision,
            min_notional = %loaded.rules.min_notional,
            "Using default symbol rules"
        ),
    }

    loaded
}

/// Pure extraction step of [`load_rules`]
pub fn rules_from_info(info: &ExchangeInfo, symbol: &str) -> LoadedRules {
    let Some(entry) = info.symbols.iter().find(|s| s.symbol == symbol) else {
        return LoadedRules {
            rules: SymbolRules::default(),
            source: RulesSource::Default {
                reason: format!("{} not listed in exchange metadata", symbol),
            },
        };
    };

    let defaults = SymbolRules::default();
    let min_notional = entry
        .filters
        .iter()
        .filter(|f| f.filter_type == MIN_NOTIONAL_FILTER)
        .find_map(|f| f.notional.as_deref())
        .and_then(|raw| match Decimal::from_str(raw) {
            Ok(v) if v > Decimal::ZERO => Some(v),
            _ => {
                tracing::warn!(symbol, raw, "Ignoring unusable MIN_NOTIONAL value");
                None
            }
        })
        .unwrap_or(defaults.min_notional);

    LoadedRules {
        rules: SymbolRules {
            quantity_precision: entry.quantity_precision,
            price_precision: entry.price_precision,
            min_notional,
        },
        source: RulesSource::Exchange,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::testing::ScriptedExchange;
    use crate::models::{SymbolFilter, SymbolInfo};

    fn info_with(symbol: &str, filters: Vec<SymbolFilter>) -> ExchangeInfo {
        ExchangeInfo {
            symbols: vec![SymbolInfo {
                symbol: symbol.to_string(),
                quantity_precision: 4,
                price_precision: 1,
                filters,
            }],
        }
    }

    fn min_notional(value: &str) -> SymbolFilter {
        SymbolFilter {
            filter_type: "MIN_NOTIONAL".to_string(),
            notional: Some(value.to_string()),
        }
    }

    #[test]
    fn test_extracts_rules_for_symbol() {
        let info = info_with(
            "ETHUSDT",
            vec![
                SymbolFilter {
                    filter_type: "PRICE_FILTER".to_string(),
                    notional: None,
                },
                min_notional("20"),
            ],
        );

        let loaded = rules_from_info(&info, "ETHUSDT");

        assert_eq!(loaded.source, RulesSource::Exchange);
        assert_eq!(loaded.rules.quantity_precision, 4);
        assert_eq!(loaded.rules.price_precision, 1);
        assert_eq!(loaded.rules.min_notional, Decimal::from(20));
    }

    #[test]
    fn test_missing_filter_keeps_default_min_notional() {
        let loaded = rules_from_info(&info_with("ETHUSDT", vec![]), "ETHUSDT");

        assert!(!loaded.is_default());
        assert_eq!(loaded.rules.quantity_precision, 4);
        assert_eq!(loaded.rules.min_notional, Decimal::from(5));
    }

    #[test]
    fn test_unknown_symbol_falls_back_to_defaults() {
        let loaded = rules_from_info(&info_with("ETHUSDT", vec![min_notional("20")]), "BTCUSDT");

        assert!(loaded.is_default());
        assert_eq!(loaded.rules, SymbolRules::default());
    }

    #[tokio::test]
    async fn test_metadata_failure_falls_back_to_defaults() {
        let exchange = ScriptedExchange::new().failing_metadata();

        let loaded = load_rules(&exchange, "BTCUSDT").await;

        assert!(loaded.is_default());
        assert_eq!(loaded.rules.quantity_precision, 3);
        assert_eq!(loaded.rules.price_precision, 2);
        assert_eq!(loaded.rules.min_notional, Decimal::from(5));
        match loaded.source {
            RulesSource::Default { reason } => assert!(reason.contains("metadata fetch failed")),
            RulesSource::Exchange => panic!("expected default rules"),
        }
    }
}
