// Order validation, position state and the polling decision loop
pub mod decision_loop;
pub mod order_validator;
pub mod position_tracker;
pub mod symbol_rules;

#[cfg(test)]
pub(crate) mod testing;

pub use decision_loop::{DecisionLoop, LoopError, RunSummary, TickOutcome};
pub use order_validator::{build_order, format_price, round_quantity, RejectionReason};
pub use position_tracker::PositionTracker;
pub use symbol_rules::{load_rules, rules_from_info, LoadedRules, RulesSource};
