//! Execution types

use serde::{Serialize, Serializer};
use std::fmt;

use crate::risk::TradeDecision;
use crate::signal::Signal;

/// Order id reported for simulated orders
pub const SIMULATED_ORDER_ID: &str = "SIMULATED";
/// Order status reported for simulated orders
pub const DRY_RUN_STATUS: &str = "DRY_RUN";

/// What happened to a poll's decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionTaken {
    /// Nothing pending
    #[default]
    Hold,
    /// Decision rejected by risk
    Skip(Signal),
    /// Approved and simulated
    DryRun(Signal),
    /// Approved and sent to the exchange
    Live(Signal),
    /// The gateway failed while executing
    Error(Signal),
    /// Poll skipped on bad market data
    SkipPoll,
    /// Market data fetch failed
    PollError,
}

impl ActionTaken {
    /// True for the simulated execution path
    pub fn is_simulated(&self) -> bool {
        matches!(self, ActionTaken::DryRun(_))
    }
}

impl fmt::Display for ActionTaken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionTaken::Hold => f.write_str("HOLD"),
            ActionTaken::Skip(side) => write!(f, "SKIP_{}", side),
            ActionTaken::DryRun(side) => write!(f, "DRY_RUN_{}", side),
            ActionTaken::Live(side) => write!(f, "{}", side),
            ActionTaken::Error(side) => write!(f, "ERROR_{}", side),
            ActionTaken::SkipPoll => f.write_str("SKIP_POLL"),
            ActionTaken::PollError => f.write_str("POLL_ERROR"),
        }
    }
}

impl Serialize for ActionTaken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Result of handing a decision to a gateway
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct OrderResult {
    pub action: ActionTaken,
    pub approved: bool,
    /// Reject or failure code, empty on success
    pub reason: String,
    pub order_id: String,
    pub status: String,
    pub executed_qty: f64,
    pub cummulative_quote_qty: f64,
    pub avg_fill_px: f64,
    pub error: String,
    /// An order reached the exchange
    pub placed: bool,
    /// The exchange reported the order FILLED
    pub filled: bool,
}

impl OrderResult {
    /// Result for a decision with nothing to execute, if it has nothing to execute.
    ///
    /// Gateways call this first; `None` means the decision is approved and
    /// directional.
    pub fn preflight(decision: &TradeDecision) -> Option<Self> {
        if !decision.side.is_directional() {
            return Some(Self {
                action: ActionTaken::Hold,
                reason: "hold".to_string(),
                ..Default::default()
            });
        }
        if !decision.approved {
            return Some(Self {
                action: ActionTaken::Skip(decision.side),
                reason: decision.reason_str().to_string(),
                ..Default::default()
            });
        }
        None
    }

    /// A simulated fill of an approved decision
    pub fn dry_run(side: Signal) -> Self {
        Self {
            action: ActionTaken::DryRun(side),
            approved: true,
            order_id: SIMULATED_ORDER_ID.to_string(),
            status: DRY_RUN_STATUS.to_string(),
            ..Default::default()
        }
    }

    /// The gateway raised while executing an approved decision
    pub fn execution_error(side: Signal, error: impl fmt::Display) -> Self {
        Self {
            action: ActionTaken::Error(side),
            approved: false,
            reason: "execution_exception".to_string(),
            error: error.to_string(),
            ..Default::default()
        }
    }
}
