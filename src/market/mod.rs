//! Market data module
//!
//! Snapshot types, exchange trading filters, and the market data trait

mod snapshot;

pub use snapshot::{depth_qty_sums, imbalance_ratio, safe_mid, MarketSnapshot};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Exchange-imposed order constraints for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolFilters {
    /// Trading symbol (e.g., "BTCUSDT")
    pub symbol: String,
    /// Base asset (e.g., "BTC")
    pub base_asset: String,
    /// Quote asset (e.g., "USDT")
    pub quote_asset: String,
    /// Minimum order quantity
    pub min_qty: f64,
    /// Maximum order quantity (0 means unbounded)
    pub max_qty: f64,
    /// Quantity step size (0 means no rounding)
    pub step_size: f64,
    /// Minimum order notional in quote
    pub min_notional: f64,
}

/// Account balances for the traded pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Balances {
    /// Base asset held (free + locked)
    pub base: f64,
    /// Quote asset held (free + locked)
    pub quote: f64,
}

/// Trait for market data implementations
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fetch trading filters for the configured symbol
    async fn filters(&self) -> anyhow::Result<SymbolFilters>;
    /// Take one snapshot of the book
    async fn snapshot(&self) -> anyhow::Result<MarketSnapshot>;
    /// Fetch current balances for the pair
    async fn balances(&self, filters: &SymbolFilters) -> anyhow::Result<Balances>;
}
