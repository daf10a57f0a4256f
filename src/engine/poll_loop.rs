//! Poll loop tying market data, signals, risk and execution together

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use super::summary::SessionSummary;
use crate::calibration::WalkForwardCalibrator;
use crate::config::{Config, ExecutionMode};
use crate::data::{PollRecord, PollRecorder};
use crate::exchange::http_status;
use crate::execution::{ActionTaken, OrderGateway, OrderResult, PaperLedger, PaperTradeResult};
use crate::market::{Balances, MarketDataSource, MarketSnapshot, SymbolFilters};
use crate::risk::{evaluate_pending_signal, RejectReason, RiskContext, TradeDecision};
use crate::signal::{signal_from_imbalance, ConfirmationFilter, Signal};
use crate::telemetry::{increment, record_rejection, set_gauge, CounterMetric, GaugeMetric};

/// Calibration state reported when calibration is off
pub const CALIBRATION_DISABLED: &str = "DISABLED";

const RATE_LIMIT_STATUSES: [u16; 2] = [418, 429];

/// How the loop paces itself and tells time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pacing {
    /// Sleep between polls and use the wall clock
    #[default]
    RealTime,
    /// Never sleep; snapshot timestamps are the clock
    Replay,
}

/// What one poll produced
#[derive(Debug, Clone, Default)]
pub struct PollOutcome {
    /// Trade-log row for the poll
    pub record: PollRecord,
    /// Errors raised during the poll
    pub errors: u32,
    /// First rate-limit status seen during the poll
    pub rate_limit: Option<u16>,
    /// The poll stopped early on bad market data
    pub skipped: bool,
}

impl PollOutcome {
    /// A completed poll with no errors
    pub fn is_clean(&self) -> bool {
        !self.skipped && self.errors == 0
    }
}

/// Imbalance trading loop over a market data source and an order gateway
pub struct TradingLoop {
    config: Config,
    source: Arc<dyn MarketDataSource>,
    gateway: Arc<dyn OrderGateway>,
    recorder: Option<PollRecorder>,
    pacing: Pacing,
    calibrator: Option<WalkForwardCalibrator>,
    confirmation: ConfirmationFilter,
    ledger: Option<PaperLedger>,
    filters: Option<SymbolFilters>,
    balances: Option<Balances>,
    initial_equity: Option<f64>,
    pending_signal: Signal,
    last_trade_at: Option<DateTime<Utc>>,
    consecutive_errors: u32,
    backoff_secs: f64,
    summary: SessionSummary,
}

impl TradingLoop {
    pub fn new(
        config: Config,
        source: Arc<dyn MarketDataSource>,
        gateway: Arc<dyn OrderGateway>,
    ) -> Self {
        let calibrator = config
            .calibration
            .enabled
            .then(|| WalkForwardCalibrator::new(&config.calibration));
        let confirmation =
            ConfirmationFilter::new(config.signal.confirmation_m, config.signal.confirmation_k);
        let backoff_secs = config.runtime.backoff_base_secs;

        Self {
            config,
            source,
            gateway,
            recorder: None,
            pacing: Pacing::default(),
            calibrator,
            confirmation,
            ledger: None,
            filters: None,
            balances: None,
            initial_equity: None,
            pending_signal: Signal::Hold,
            last_trade_at: None,
            consecutive_errors: 0,
            backoff_secs,
            summary: SessionSummary::default(),
        }
    }

    /// Send every poll record to `recorder`
    pub fn with_recorder(mut self, recorder: PollRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn summary(&self) -> &SessionSummary {
        &self.summary
    }

    pub fn ledger(&self) -> Option<&PaperLedger> {
        self.ledger.as_ref()
    }

    pub fn calibrator(&self) -> Option<&WalkForwardCalibrator> {
        self.calibrator.as_ref()
    }

    /// Confirmed signal waiting for the next poll
    pub fn pending_signal(&self) -> Signal {
        self.pending_signal
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// Backoff applied on the next rate-limited poll
    pub fn backoff_secs(&self) -> f64 {
        self.backoff_secs
    }

    fn is_live(&self) -> bool {
        self.config.execution.mode == ExecutionMode::Live
    }

    /// Poll until max polls, the error limit or Ctrl-C, then shut down
    pub async fn run(mut self) -> anyhow::Result<SessionSummary> {
        tracing::info!(settings = %self.config.summary_line(), "Starting trading loop");

        let max_polls = self.config.runtime.max_polls;
        loop {
            if max_polls > 0 && self.summary.polls >= max_polls {
                tracing::info!(polls = self.summary.polls, "Reached max polls");
                break;
            }

            let outcome = self.poll_once().await;
            if !self.settle(&outcome) {
                tracing::warn!(
                    consecutive_errors = self.consecutive_errors,
                    "Stopping: max consecutive errors exceeded"
                );
                break;
            }

            let delay = self.next_delay(&outcome);
            if self.pacing == Pacing::RealTime {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Interrupt received, shutting down");
                        break;
                    }
                }
            }
        }

        self.shutdown().await
    }

    /// Reset error counters after a clean poll; false once the error limit is exceeded
    pub fn settle(&mut self, outcome: &PollOutcome) -> bool {
        if outcome.is_clean() {
            self.consecutive_errors = 0;
            self.backoff_secs = self.config.runtime.backoff_base_secs;
        }
        set_gauge(GaugeMetric::ConsecutiveErrors, self.consecutive_errors as f64);
        self.consecutive_errors <= self.config.runtime.max_consecutive_errors
    }

    /// Wait before the next poll, doubling the backoff on rate limits
    pub fn next_delay(&mut self, outcome: &PollOutcome) -> Duration {
        let runtime = &self.config.runtime;
        match outcome.rate_limit {
            Some(status) => {
                let sleep_secs = self.backoff_secs.min(runtime.backoff_cap_secs);
                tracing::warn!(status, sleep_secs, "Rate limit hit, backing off");
                self.backoff_secs = (self.backoff_secs * 2.0).min(runtime.backoff_cap_secs);
                Duration::from_secs_f64(sleep_secs)
            }
            None => Duration::from_secs_f64(runtime.poll_interval_secs),
        }
    }

    fn note_error(&mut self, err: &anyhow::Error, outcome: &mut PollOutcome) {
        self.summary.errors += 1;
        self.consecutive_errors += 1;
        outcome.errors += 1;
        increment(CounterMetric::Errors);
        if outcome.rate_limit.is_none() {
            outcome.rate_limit = http_status(err).filter(|s| RATE_LIMIT_STATUSES.contains(s));
        }
    }

    async fn fetch(&mut self) -> anyhow::Result<(MarketSnapshot, SymbolFilters, Balances)> {
        let filters = match self.filters.clone() {
            Some(filters) => filters,
            None => {
                let filters = self.source.filters().await?;
                tracing::info!(
                    symbol = %filters.symbol,
                    min_qty = filters.min_qty,
                    step_size = filters.step_size,
                    min_notional = filters.min_notional,
                    "Loaded symbol filters"
                );
                self.filters = Some(filters.clone());
                filters
            }
        };

        let snapshot = self.source.snapshot().await?;

        let resync = self.config.runtime.resync_every_n_polls;
        let balances = match self.balances {
            Some(balances) if self.summary.polls % resync != 0 => balances,
            _ => {
                let balances = self.source.balances(&filters).await?;
                tracing::debug!(base = balances.base, quote = balances.quote, "Balances refreshed");
                self.balances = Some(balances);
                balances
            }
        };

        Ok((snapshot, filters, balances))
    }

    async fn emit(&self, record: &PollRecord) {
        if let Some(recorder) = &self.recorder {
            if let Err(e) = recorder.record(record.clone()).await {
                tracing::warn!(error = %e, "Dropping poll record");
            }
        }
    }

    /// Run a single poll and record it
    pub async fn poll_once(&mut self) -> PollOutcome {
        self.summary.polls += 1;
        increment(CounterMetric::Polls);
        let poll = self.summary.polls;
        let pending_prev = self.pending_signal;

        let mut outcome = PollOutcome {
            record: PollRecord {
                timestamp: Utc::now(),
                pending_signal: pending_prev.to_string(),
                ..Default::default()
            },
            ..Default::default()
        };

        let (snapshot, filters, mut balances) = match self.fetch().await {
            Ok(fetched) => fetched,
            Err(e) => {
                self.note_error(&e, &mut outcome);
                let record = &mut outcome.record;
                record.action = ActionTaken::PollError.to_string();
                record.reason = "poll_exception".to_string();
                record.error = format!("{:#}", e);
                tracing::warn!(poll, error = %record.error, "Poll failed");
                self.emit(&outcome.record).await;
                return outcome;
            }
        };

        let now = match self.pacing {
            Pacing::RealTime => Utc::now(),
            Pacing::Replay => snapshot.timestamp,
        };
        fill_market(&mut outcome.record, &snapshot);

        if !snapshot.is_valid_top_of_book() {
            outcome.skipped = true;
            let record = &mut outcome.record;
            record.action = ActionTaken::SkipPoll.to_string();
            record.reason = "invalid_top_of_book".to_string();
            record.error = format!(
                "invalid_top_of_book bid={:.8} ask={:.8}",
                snapshot.bid, snapshot.ask
            );
            tracing::warn!(poll, bid = snapshot.bid, ask = snapshot.ask, "Invalid top of book, skipping poll");
            self.emit(&outcome.record).await;
            return outcome;
        }

        if self.ledger.is_none() {
            match PaperLedger::new(&self.config.paper, snapshot.mid) {
                Ok(ledger) => self.ledger = Some(ledger),
                Err(e) => tracing::error!(error = %e, "Paper ledger unavailable"),
            }
        }
        let initial_equity = *self
            .initial_equity
            .get_or_insert(balances.base * snapshot.mid + balances.quote);

        let threshold = self.apply_calibration(&snapshot, &mut outcome.record);
        let raw_signal = signal_from_imbalance(snapshot.imbalance, threshold);
        let confirmed = self.confirmation.confirm(raw_signal);
        outcome.record.threshold = threshold;
        outcome.record.raw_signal = raw_signal.to_string();
        outcome.record.confirmed_signal = confirmed.to_string();

        let ctx = RiskContext {
            pending_signal: pending_prev,
            mid: snapshot.mid,
            imbalance: snapshot.imbalance,
            threshold,
            position_base: balances.base,
            position_quote: balances.quote,
            now,
            last_trade_at: self.last_trade_at,
        };
        let decision = evaluate_pending_signal(&ctx, &filters, &self.config.risk);
        outcome.record.notional_target = decision.notional_target;
        if decision.approved {
            increment(CounterMetric::Approved);
        } else if let Some(reason) = decision.reject_reason.filter(|r| *r != RejectReason::Hold) {
            record_rejection(reason.as_str());
        }

        let result = match self.gateway.execute(&decision).await {
            Ok(result) => result,
            Err(e) => {
                self.note_error(&e, &mut outcome);
                tracing::warn!(poll, side = %decision.side, error = %e, "Execution failed");
                OrderResult::execution_error(decision.side, format!("{:#}", e))
            }
        };
        fill_order(&mut outcome.record, &result);
        if result.placed {
            self.summary.orders_placed += 1;
            increment(CounterMetric::OrdersPlaced);
        }
        if result.filled {
            self.summary.orders_filled += 1;
            increment(CounterMetric::OrdersFilled);
        }
        if !result.error.is_empty() && !matches!(result.action, ActionTaken::Error(_)) {
            self.summary.errors += 1;
            self.consecutive_errors += 1;
            outcome.errors += 1;
            increment(CounterMetric::Errors);
        }

        if decision.approved && (result.placed || result.action.is_simulated()) {
            let paper = self.apply_paper_trade(&result, &decision, &snapshot, &mut outcome);
            outcome.record.paper_trade_notional = paper.trade_notional;
            outcome.record.paper_fee = paper.fee;
            self.log_trade(&result, &decision, &paper, snapshot.mid);
            self.last_trade_at = Some(now);
        }

        self.pending_signal = confirmed;

        if result.placed {
            match self.source.balances(&filters).await {
                Ok(refreshed) => {
                    balances = refreshed;
                    self.balances = Some(refreshed);
                }
                Err(e) => {
                    self.note_error(&e, &mut outcome);
                    let msg = format!("{:#}", e);
                    let record = &mut outcome.record;
                    record.error = if record.error.is_empty() {
                        msg
                    } else {
                        format!("{} | {}", record.error, msg)
                    };
                }
            }
        }

        let pnl_proxy = balances.base * snapshot.mid + balances.quote - initial_equity;
        outcome.record.position_base = balances.base;
        outcome.record.position_quote = balances.quote;
        outcome.record.pnl_proxy = pnl_proxy;
        self.summary.observe_pnl_proxy(pnl_proxy);
        self.mark_ledger(snapshot.mid, &mut outcome);

        self.emit(&outcome.record).await;
        self.report(poll, &snapshot, &decision, &outcome.record);
        outcome
    }

    fn apply_calibration(&mut self, snapshot: &MarketSnapshot, record: &mut PollRecord) -> f64 {
        let default_threshold = self.config.signal.threshold;
        let Some(calibrator) = self.calibrator.as_mut() else {
            record.calibration_state = CALIBRATION_DISABLED.to_string();
            return default_threshold;
        };

        calibrator.update(snapshot);
        let threshold = calibrator.current_threshold(default_threshold);
        record.calibration_state = calibrator.state().as_str().to_string();
        if let Some(report) = calibrator.last_report() {
            record.theta_hat = report.theta_hat;
            record.calibration_score = Some(report.score_adj);
            record.calibration_n = Some(report.n as u64);
        }
        threshold
    }

    fn apply_paper_trade(
        &mut self,
        result: &OrderResult,
        decision: &TradeDecision,
        snapshot: &MarketSnapshot,
        outcome: &mut PollOutcome,
    ) -> PaperTradeResult {
        let Some(ledger) = self.ledger.as_mut() else {
            return PaperTradeResult::default();
        };
        match ledger.apply_trade(result, decision, snapshot.bid, snapshot.ask) {
            Ok(paper) => {
                if paper.traded {
                    increment(CounterMetric::PaperTrades);
                }
                paper
            }
            Err(e) => {
                tracing::error!(error = %e, side = %decision.side, "Paper trade rejected");
                let err = anyhow::Error::new(e);
                self.note_error(&err, outcome);
                PaperTradeResult::default()
            }
        }
    }

    fn mark_ledger(&mut self, mid: f64, outcome: &mut PollOutcome) {
        let Some(ledger) = self.ledger.as_mut() else {
            return;
        };
        match ledger.mark_to_market(mid) {
            Ok((equity, pnl)) => {
                let record = &mut outcome.record;
                record.paper_quote = ledger.quote;
                record.paper_base = ledger.base;
                record.paper_equity = equity;
                record.paper_pnl = pnl;
                self.summary.paper_equity_end = equity;
                self.summary.paper_pnl_end = pnl;
                set_gauge(GaugeMetric::PaperEquity, equity);
                set_gauge(GaugeMetric::PaperPnl, pnl);
                set_gauge(GaugeMetric::MaxDrawdown, ledger.max_drawdown);
            }
            Err(e) => {
                tracing::error!(error = %e, "Mark to market failed");
                let err = anyhow::Error::new(e);
                self.note_error(&err, outcome);
            }
        }
    }

    fn log_trade(
        &self,
        result: &OrderResult,
        decision: &TradeDecision,
        paper: &PaperTradeResult,
        mid: f64,
    ) {
        if result.action.is_simulated() {
            let slippage_bps = self.ledger.as_ref().map_or(0.0, |l| l.slippage_bps);
            tracing::info!(
                mode = "DRY_RUN",
                side = %decision.side,
                qty = paper.executed_qty,
                quote = paper.trade_notional,
                avg_fill_px = if paper.exec_px > 0.0 { paper.exec_px } else { mid },
                fee = paper.fee,
                slippage_bps,
                status = if paper.traded { "DRY_RUN_FILLED" } else { "DRY_RUN_NO_FILL" },
                order_id = %result.order_id,
                "TRADE"
            );
        } else {
            let quote = if result.cummulative_quote_qty > 0.0 {
                result.cummulative_quote_qty
            } else {
                decision.quote_order_qty
            };
            tracing::info!(
                mode = "LIVE",
                side = %decision.side,
                qty = result.executed_qty,
                quote,
                avg_fill_px = result.avg_fill_px,
                status = %result.status,
                order_id = %result.order_id,
                "TRADE"
            );
        }
    }

    fn report(&self, poll: u64, snapshot: &MarketSnapshot, decision: &TradeDecision, record: &PollRecord) {
        tracing::debug!(
            poll,
            mid = snapshot.mid,
            imbalance = snapshot.imbalance,
            threshold = record.threshold,
            raw = %record.raw_signal,
            action = %record.action,
            "Poll complete"
        );
        let every = self.config.runtime.print_every_n_polls;
        if poll % every == 0 {
            tracing::info!(
                poll,
                mid = %format!("{:.2}", snapshot.mid),
                imbalance = %format!("{:.6}", snapshot.imbalance),
                signal = %record.confirmed_signal,
                pending = %record.pending_signal,
                decision = %decision.side,
                approved = decision.approved,
                reason = if record.reason.is_empty() { "-" } else { record.reason.as_str() },
                pos_base = %format!("{:.8}", record.position_base),
                pos_quote = %format!("{:.2}", record.position_quote),
                "Heartbeat"
            );
        }

        set_gauge(GaugeMetric::Imbalance, snapshot.imbalance);
        set_gauge(GaugeMetric::Threshold, record.threshold);
        set_gauge(GaugeMetric::PnlProxy, record.pnl_proxy);
        set_gauge(GaugeMetric::PositionBase, record.position_base);
    }

    /// Cancel open orders in live mode, flush the recorder and return the totals
    pub async fn shutdown(mut self) -> anyhow::Result<SessionSummary> {
        if self.is_live() {
            match self.gateway.cancel_all().await {
                Ok(canceled) => self.summary.open_orders_canceled = canceled,
                Err(e) => tracing::warn!(error = %e, "Cancel open orders failed (best effort)"),
            }
        } else {
            tracing::info!("Paper mode, skipping cancel of open orders");
        }

        if let Some(ledger) = &self.ledger {
            self.summary.absorb_ledger(ledger);
        }

        if let Some(recorder) = self.recorder.take() {
            let stats = recorder.finish().await?;
            tracing::info!(
                records = stats.records_written,
                files = stats.files_written,
                "Poll capture flushed"
            );
        }

        let s = &self.summary;
        tracing::info!(
            polls = s.polls,
            orders_placed = s.orders_placed,
            orders_filled = s.orders_filled,
            errors = s.errors,
            pnl_proxy_end = s.pnl_proxy_end,
            pnl_proxy_min = s.pnl_proxy_min,
            pnl_proxy_max = s.pnl_proxy_max,
            open_orders_canceled = s.open_orders_canceled,
            paper_equity_end = s.paper_equity_end,
            paper_pnl_end = s.paper_pnl_end,
            paper_trades = s.paper_trades,
            paper_win_rate_pct = s.paper_win_rate_pct,
            paper_max_drawdown = s.paper_max_drawdown,
            "Session summary"
        );
        Ok(self.summary)
    }
}

fn fill_market(record: &mut PollRecord, snapshot: &MarketSnapshot) {
    record.timestamp = snapshot.timestamp;
    record.bid = snapshot.bid;
    record.ask = snapshot.ask;
    record.mid = snapshot.mid;
    record.spread = snapshot.spread();
    record.bid_qty = snapshot.bid_qty;
    record.ask_qty = snapshot.ask_qty;
    record.imbalance = snapshot.imbalance;
    record.depth_update_id = snapshot.depth_update_id;
}

fn fill_order(record: &mut PollRecord, result: &OrderResult) {
    record.action = result.action.to_string();
    record.approved = result.approved;
    record.reason = result.reason.clone();
    record.order_id = result.order_id.clone();
    record.status = result.status.clone();
    record.executed_qty = result.executed_qty;
    record.cummulative_quote_qty = result.cummulative_quote_qty;
    record.avg_fill_px = result.avg_fill_px;
    record.error = result.error.clone();
}
