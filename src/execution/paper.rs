//! Dry-run order gateway

use super::{OrderGateway, OrderResult};
use crate::risk::TradeDecision;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Gateway that simulates every approved decision and never contacts an exchange
#[derive(Debug, Default, Clone)]
pub struct DryRunGateway {
    simulated: Arc<RwLock<Vec<TradeDecision>>>,
}

impl DryRunGateway {
    /// Create a new dry-run gateway
    pub fn new() -> Self {
        Self::default()
    }

    /// Decisions simulated so far
    pub async fn simulated(&self) -> Vec<TradeDecision> {
        self.simulated.read().await.clone()
    }
}

#[async_trait]
impl OrderGateway for DryRunGateway {
    async fn execute(&self, decision: &TradeDecision) -> anyhow::Result<OrderResult> {
        if let Some(result) = OrderResult::preflight(decision) {
            return Ok(result);
        }

        self.simulated.write().await.push(decision.clone());
        tracing::debug!(side = %decision.side, "Dry-run order simulated");
        Ok(OrderResult::dry_run(decision.side))
    }

    async fn cancel_all(&self) -> anyhow::Result<usize> {
        Ok(0)
    }
}
