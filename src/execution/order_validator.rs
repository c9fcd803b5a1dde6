//! Turns a desired trade into an exchange-compliant order request.
//!
//! Quantities and prices are rounded half-to-even (banker's rounding) to the
//! precision the exchange publishes for the symbol.

use crate::models::{OrderRequest, OrderSide, OrderType, SymbolRules, TimeInForce};
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;
use uuid::Uuid;

const ROUNDING: RoundingStrategy = RoundingStrategy::MidpointNearestEven;

/// Why a desired trade was not turned into an order
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectionReason {
    #[error("quantity {raw} rounds to zero at {precision} decimals")]
    ZeroQuantity { raw: Decimal, precision: u32 },

    #[error("order value {notional} below minimum notional {min_notional}")]
    BelowMinNotional {
        notional: Decimal,
        min_notional: Decimal,
    },

    #[error("limit order requires a price")]
    MissingLimitPrice,
}

/// Round a quantity to `precision` decimal places
pub fn round_quantity(raw: Decimal, precision: u32) -> Decimal {
    raw.round_dp_with_strategy(precision, ROUNDING)
}

/// Fixed-point price string with exactly `precision` fractional digits
pub fn format_price(price: Decimal, precision: u32) -> String {
    let mut rounded = price.round_dp_with_strategy(precision, ROUNDING);
    rounded.rescale(precision);
    rounded.to_string()
}

/// Validate and normalise a desired trade.
///
/// `ref_price` is the latest observed market price; it prices MARKET orders
/// and stands in for a missing limit price during the notional check.
pub fn build_order(
    symbol: &str,
    raw_qty: Decimal,
    side: OrderSide,
    order_type: OrderType,
    ref_price: Decimal,
    limit_price: Option<Decimal>,
    rules: &SymbolRules,
) -> Result<OrderRequest, RejectionReason> {
    let quantity = round_quantity(raw_qty, rules.quantity_precision);
    if quantity <= Decimal::ZERO {
        return Err(RejectionReason::ZeroQuantity {
            raw: raw_qty,
            precision: rules.quantity_precision,
        });
    }

    // The notional is checked against the price that will actually be sent
    let limit_price = limit_price.map(|p| p.round_dp_with_strategy(rules.price_precision, ROUNDING));

    let effective_price = match order_type {
        OrderType::Limit => limit_price.unwrap_or(ref_price),
        OrderType::Market => ref_price,
    };

    let notional = quantity * effective_price;
    if notional < rules.min_notional {
        return Err(RejectionReason::BelowMinNotional {
            notional,
            min_notional: rules.min_notional,
        });
    }

    let (price, time_in_force) = match order_type {
        OrderType::Limit => {
            let limit = limit_price.ok_or(RejectionReason::MissingLimitPrice)?;
            (
                Some(format_price(limit, rules.price_precision)),
                Some(TimeInForce::Gtc),
            )
        }
        OrderType::Market => (None, None),
    };

    let order = OrderRequest {
        symbol: symbol.to_string(),
        side,
        order_type,
        quantity,
        price,
        time_in_force,
        client_order_id: Uuid::new_v4().simple().to_string(),
    };

    tracing::debug!(
        symbol,
        side = %side,
        order_type = %order_type,
        quantity = %quantity,
        notional = %notional,
        "Order validated"
    );

    Ok(order)
}
