//! Replay command implementation

use clap::{Args, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{Config, ExecutionMode};
use crate::engine::{Pacing, ReplayFeed, SessionSummary, TradingLoop};
use crate::execution::DryRunGateway;
use crate::market::{Balances, SymbolFilters};

/// Summary output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Parquet file or directory of captured polls
    #[arg(default_value = "./data")]
    pub path: PathBuf,

    /// Minimum order quantity
    #[arg(long, default_value = "0.00001")]
    pub min_qty: f64,

    /// Maximum order quantity (0 for unbounded)
    #[arg(long, default_value = "9000")]
    pub max_qty: f64,

    /// Quantity step size
    #[arg(long, default_value = "0.00001")]
    pub step_size: f64,

    /// Minimum order notional
    #[arg(long, default_value = "5")]
    pub min_notional: f64,

    /// Fixed base balance (defaults to paper.start_base)
    #[arg(long)]
    pub base_balance: Option<f64>,

    /// Fixed quote balance (defaults to paper.start_quote)
    #[arg(long)]
    pub quote_balance: Option<f64>,

    /// Override the signal threshold
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Enable walk-forward threshold calibration
    #[arg(long)]
    pub calibrate: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

impl ReplayArgs {
    /// Filters for the replayed symbol
    pub fn filters(&self, config: &Config) -> SymbolFilters {
        SymbolFilters {
            symbol: config.exchange.symbol.clone(),
            base_asset: String::new(),
            quote_asset: String::new(),
            min_qty: self.min_qty,
            max_qty: self.max_qty,
            step_size: self.step_size,
            min_notional: self.min_notional,
        }
    }

    /// Balances the replay trades against
    pub fn balances(&self, config: &Config) -> Balances {
        Balances {
            base: self.base_balance.unwrap_or(config.paper.start_base),
            quote: self.quote_balance.unwrap_or(config.paper.start_quote),
        }
    }

    /// Replay-specific settings layered on the loaded config
    pub fn replay_config(&self, mut config: Config) -> anyhow::Result<Config> {
        config.execution.mode = ExecutionMode::Paper;
        config.data.capture_enabled = false;
        if let Some(threshold) = self.threshold {
            config.signal.threshold = threshold;
        }
        if self.calibrate {
            config.calibration.enabled = true;
        }
        Ok(config.validate()?)
    }

    /// Drive the loop over the recorded snapshots
    pub async fn replay(&self, config: Config) -> anyhow::Result<SessionSummary> {
        let mut config = self.replay_config(config)?;
        let feed = ReplayFeed::from_parquet(
            &self.path,
            self.filters(&config),
            self.balances(&config),
        )?;
        let snapshots = feed.remaining().await;
        if snapshots == 0 {
            anyhow::bail!("No snapshots found in {:?}", self.path);
        }
        tracing::info!(snapshots, path = ?self.path, "Replaying captured polls");
        config.runtime.max_polls = snapshots as u64;

        TradingLoop::new(config, Arc::new(feed), Arc::new(DryRunGateway::new()))
            .with_pacing(Pacing::Replay)
            .run()
            .await
    }

    pub async fn execute(&self, config: Config) -> anyhow::Result<()> {
        let summary = self.replay(config).await?;
        match self.format {
            OutputFormat::Table => println!("{}", summary.format_table()),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        }
        Ok(())
    }
}
