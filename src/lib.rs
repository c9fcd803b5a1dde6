// Core modules
pub mod api;
pub mod config;
pub mod execution;
pub mod models;
pub mod risk;

// Re-export commonly used types
pub use api::{Exchange, ExchangeError};
pub use execution::{DecisionLoop, RejectionReason, TickOutcome};
pub use models::*;
