//! Execution module
//!
//! Order gateways (dry-run and live) and the paper ledger

mod ledger;
mod paper;
mod types;

pub use ledger::{LedgerError, PaperLedger, PaperTradeResult};
pub use paper::DryRunGateway;
pub use types::{ActionTaken, OrderResult, DRY_RUN_STATUS, SIMULATED_ORDER_ID};

use crate::risk::TradeDecision;
use async_trait::async_trait;

/// Trait for order gateway implementations
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Execute a risk decision
    async fn execute(&self, decision: &TradeDecision) -> anyhow::Result<OrderResult>;
    /// Cancel every open order for the traded symbol, returning how many were canceled
    async fn cancel_all(&self) -> anyhow::Result<usize>;
}
