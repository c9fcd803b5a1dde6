use std::collections::HashMap;

use crate::models::{OrderSide, PositionState};

/// Flat/long state per symbol.
///
/// Only [`PositionTracker::record_fill`] changes state, and callers invoke it
/// only after the exchange accepted the order.
#[derive(Debug, Default)]
pub struct PositionTracker {
    positions: HashMap<String, PositionState>,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker with `symbol` registered as flat
    pub fn with_symbol(symbol: &str) -> Self {
        let mut tracker = Self::new();
        tracker.track(symbol);
        tracker
    }

    /// Start tracking `symbol` as flat; no-op if already tracked
    pub fn track(&mut self, symbol: &str) {
        self.positions
            .entry(symbol.to_string())
            .or_insert_with(|| PositionState::flat(symbol));
    }

    pub fn in_position(&self, symbol: &str) -> bool {
        self.positions
            .get(symbol)
            .map(|p| p.in_position)
            .unwrap_or(false)
    }

    pub fn can_buy(&self, symbol: &str) -> bool {
        !self.in_position(symbol)
    }

    pub fn can_sell(&self, symbol: &str) -> bool {
        self.in_position(symbol)
    }

    /// Apply a confirmed fill: BUY opens the position, SELL closes it
    pub fn record_fill(&mut self, symbol: &str, side: OrderSide) {
        let state = self
            .positions
            .entry(symbol.to_string())
            .or_insert_with(|| PositionState::flat(symbol));

        let was = state.in_position;
        state.in_position = side == OrderSide::Buy;

        tracing::info!(
            symbol,
            side = %side,
            from = if was { "LONG" } else { "FLAT" },
            to = if state.in_position { "LONG" } else { "FLAT" },
            "Position updated"
        );
    }

    pub fn get(&self, symbol: &str) -> Option<&PositionState> {
        self.positions.get(symbol)
    }
}
