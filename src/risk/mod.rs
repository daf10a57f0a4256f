//! Risk management module
//!
//! Position sizing, exchange filter compliance, and trade approval

mod evaluator;
mod sizing;
mod types;

pub use evaluator::{evaluate_pending_signal, round_down_step, RiskContext};
pub use sizing::{sizer_for, target_notional, LinearAbsSizer, LinearExcessSizer, PositionSizer};
pub use types::{RejectReason, TradeDecision};
