//! Scripted market source and recording gateway

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use imbalance_trader::config::Config;
use imbalance_trader::exchange::ExchangeError;
use imbalance_trader::execution::{ActionTaken, OrderGateway, OrderResult};
use imbalance_trader::market::{Balances, MarketDataSource, MarketSnapshot, SymbolFilters};
use imbalance_trader::risk::TradeDecision;

/// One scripted market data response
pub enum Step {
    Book(MarketSnapshot),
    HttpError(u16),
}

pub fn book(secs: i64, bid: f64, ask: f64, bid_qty: f64, ask_qty: f64) -> Step {
    Step::Book(MarketSnapshot::new(
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
        bid,
        ask,
        bid_qty,
        ask_qty,
    ))
}

pub fn filters() -> SymbolFilters {
    SymbolFilters {
        symbol: "BTCUSDT".to_string(),
        base_asset: "BTC".to_string(),
        quote_asset: "USDT".to_string(),
        min_qty: 0.00001,
        max_qty: 9000.0,
        step_size: 0.00001,
        min_notional: 5.0,
    }
}

/// Config with no cooldown and room for 100-notional trades
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.signal.threshold = 0.1;
    config.risk.cooldown_seconds = 0.0;
    config.risk.max_notional_per_trade = 100.0;
    config.risk.max_abs_position = 5.0;
    config
}

pub struct ScriptedSource {
    steps: Mutex<VecDeque<Step>>,
    balances: Balances,
    balance_calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(steps: Vec<Step>, balances: Balances) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            balances,
            balance_calls: AtomicUsize::new(0),
        }
    }

    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataSource for ScriptedSource {
    async fn filters(&self) -> anyhow::Result<SymbolFilters> {
        Ok(filters())
    }

    async fn snapshot(&self) -> anyhow::Result<MarketSnapshot> {
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Book(snapshot)) => Ok(snapshot),
            Some(Step::HttpError(status)) => Err(ExchangeError::Http {
                method: "GET".to_string(),
                path: "/v3/ticker/bookTicker".to_string(),
                status,
                body: "{\"code\":-1003}".to_string(),
            }
            .into()),
            None => Err(anyhow::anyhow!("script exhausted")),
        }
    }

    async fn balances(&self, _filters: &SymbolFilters) -> anyhow::Result<Balances> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.balances)
    }
}

/// Gateway that fills every approved decision as a live order
#[derive(Default)]
pub struct RecordingGateway {
    pub decisions: Mutex<Vec<TradeDecision>>,
    pub fail: bool,
    cancel_calls: AtomicUsize,
}

impl RecordingGateway {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderGateway for RecordingGateway {
    async fn execute(&self, decision: &TradeDecision) -> anyhow::Result<OrderResult> {
        if let Some(result) = OrderResult::preflight(decision) {
            return Ok(result);
        }
        self.decisions.lock().unwrap().push(decision.clone());
        if self.fail {
            anyhow::bail!("gateway unavailable");
        }
        Ok(OrderResult {
            action: ActionTaken::Live(decision.side),
            approved: true,
            order_id: "42".to_string(),
            status: "FILLED".to_string(),
            executed_qty: 0.001,
            cummulative_quote_qty: 100.0,
            avg_fill_px: 100_000.0,
            placed: true,
            filled: true,
            ..Default::default()
        })
    }

    async fn cancel_all(&self) -> anyhow::Result<usize> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        Ok(2)
    }
}
