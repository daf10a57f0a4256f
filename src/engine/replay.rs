//! Replay market data source backed by recorded snapshots

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use tokio::sync::Mutex;

use crate::data::ParquetReader;
use crate::market::{Balances, MarketDataSource, MarketSnapshot, SymbolFilters};

/// Serves recorded snapshots in order with fixed filters and balances
pub struct ReplayFeed {
    filters: SymbolFilters,
    balances: Balances,
    snapshots: Mutex<VecDeque<MarketSnapshot>>,
}

impl ReplayFeed {
    pub fn new(
        filters: SymbolFilters,
        balances: Balances,
        snapshots: impl IntoIterator<Item = MarketSnapshot>,
    ) -> Self {
        Self {
            filters,
            balances,
            snapshots: Mutex::new(snapshots.into_iter().collect()),
        }
    }

    /// Load every Parquet file under `path` (or the single file `path`)
    pub fn from_parquet(
        path: &Path,
        filters: SymbolFilters,
        balances: Balances,
    ) -> anyhow::Result<Self> {
        let mut snapshots = Vec::new();
        for file in ParquetReader::files_in(path)? {
            let loaded = ParquetReader::new(file.clone()).read_snapshots()?;
            tracing::debug!(path = ?file, count = loaded.len(), "Loaded snapshots");
            snapshots.extend(loaded);
        }
        snapshots.sort_by_key(|s| s.timestamp);
        Ok(Self::new(filters, balances, snapshots))
    }

    /// Snapshots not yet served
    pub async fn remaining(&self) -> usize {
        self.snapshots.lock().await.len()
    }
}

#[async_trait]
impl MarketDataSource for ReplayFeed {
    async fn filters(&self) -> anyhow::Result<SymbolFilters> {
        Ok(self.filters.clone())
    }

    async fn snapshot(&self) -> anyhow::Result<MarketSnapshot> {
        self.snapshots
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("Replay exhausted"))
    }

    async fn balances(&self, _filters: &SymbolFilters) -> anyhow::Result<Balances> {
        Ok(self.balances)
    }
}
