//! Run command implementation

use clap::Args;
use std::sync::Arc;

use crate::config::{Config, ExecutionMode};
use crate::data::{PollRecorder, RecorderConfig};
use crate::engine::TradingLoop;
use crate::exchange::{
    BinanceClient, BinanceOrderGateway, BinanceRestFeed, Credentials, API_KEY_ENV, API_SECRET_ENV,
};
use crate::execution::{DryRunGateway, OrderGateway};
use crate::market::Balances;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Force paper execution regardless of the configured mode
    #[arg(long)]
    pub dry_run: bool,

    /// Stop after this many polls (0 runs until interrupted)
    #[arg(long)]
    pub max_polls: Option<u64>,
}

impl RunArgs {
    /// Apply command-line overrides to `config`
    pub fn apply(&self, config: &mut Config) {
        if self.dry_run {
            config.execution.mode = ExecutionMode::Paper;
        }
        if let Some(max_polls) = self.max_polls {
            config.runtime.max_polls = max_polls;
        }
    }

    pub async fn execute(&self, mut config: Config) -> anyhow::Result<()> {
        self.apply(&mut config);
        let live = config.execution.mode == ExecutionMode::Live;

        let credentials = Credentials::from_env();
        if live && credentials.is_none() {
            anyhow::bail!(
                "Live execution requires {} and {} to be set",
                API_KEY_ENV,
                API_SECRET_ENV
            );
        }
        let has_credentials = credentials.is_some();

        let client = Arc::new(BinanceClient::new(&config.exchange, credentials)?);
        let _: serde_json::Value = client.get("/v3/ping", &[], false).await?;
        tracing::info!(base_url = %config.exchange.base_url, "Exchange reachable");

        let symbol = config.exchange.symbol.clone();
        let mut feed = BinanceRestFeed::new(client.clone(), symbol.clone(), config.market.clone());
        if !has_credentials {
            let balances = Balances {
                base: config.paper.start_base,
                quote: config.paper.start_quote,
            };
            tracing::warn!(
                base = balances.base,
                quote = balances.quote,
                "No API credentials, using paper starting balances"
            );
            feed = feed.with_fixed_balances(balances);
        }

        let gateway: Arc<dyn OrderGateway> = if live {
            tracing::warn!(%symbol, "LIVE execution enabled");
            Arc::new(BinanceOrderGateway::new(client, symbol))
        } else {
            Arc::new(DryRunGateway::new())
        };

        let mut engine = TradingLoop::new(config.clone(), Arc::new(feed), gateway);
        if config.data.capture_enabled {
            let recorder = PollRecorder::new(RecorderConfig::from(&config.data));
            tracing::info!(output_dir = ?recorder.output_dir(), "Capturing polls");
            engine = engine.with_recorder(recorder);
        }

        let summary = engine.run().await?;
        println!("{}", summary.format_table());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dry_run_overrides_live_mode() {
        let mut config = Config::default();
        config.execution.mode = ExecutionMode::Live;
        let args = RunArgs {
            dry_run: true,
            max_polls: Some(3),
        };
        args.apply(&mut config);

        assert_eq!(config.execution.mode, ExecutionMode::Paper);
        assert_eq!(config.runtime.max_polls, 3);
    }

    #[test]
    fn test_no_overrides() {
        let mut config = Config::default();
        let args = RunArgs {
            dry_run: false,
            max_polls: None,
        };
        args.apply(&mut config);
        assert_eq!(config.runtime.max_polls, Config::default().runtime.max_polls);
    }
}
