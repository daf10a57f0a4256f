//! Integration tests for the trading loop

use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;

use imbalance_trader::config::ExecutionMode;
use imbalance_trader::engine::{Pacing, TradingLoop};
use imbalance_trader::execution::DryRunGateway;
use imbalance_trader::market::Balances;
use imbalance_trader::signal::Signal;

use crate::support::{book, test_config, RecordingGateway, ScriptedSource, Step};

fn balances() -> Balances {
    Balances {
        base: 0.5,
        quote: 1000.0,
    }
}

#[tokio::test]
async fn test_paper_round_trip_run() {
    let mut config = test_config();
    config.runtime.max_polls = 4;
    let source = Arc::new(ScriptedSource::new(
        vec![
            book(0, 100.0, 101.0, 9.0, 1.0),
            book(1, 100.0, 101.0, 1.0, 9.0),
            book(2, 100.0, 101.0, 1.0, 1.0),
            book(3, 100.0, 101.0, 1.0, 1.0),
        ],
        balances(),
    ));
    let gateway = DryRunGateway::new();

    let summary = assert_ok!(
        TradingLoop::new(config, source, Arc::new(gateway.clone()))
            .with_pacing(Pacing::Replay)
            .run()
            .await
    );

    assert_eq!(summary.polls, 4);
    assert_eq!(summary.errors, 0);
    assert_eq!(summary.orders_placed, 0);
    assert_eq!(summary.paper_trades, 2);
    assert!(summary.paper_pnl_end < 0.0);
    assert!(summary.paper_max_drawdown > 0.0);

    let simulated = gateway.simulated().await;
    assert_eq!(simulated.len(), 2);
    assert_eq!(simulated[0].side, Signal::Buy);
    assert_eq!(simulated[0].quote_order_qty, 100.0);
    assert_eq!(simulated[1].side, Signal::Sell);
    assert_eq!(simulated[1].quantity, 0.5);
}

#[tokio::test]
async fn test_confirmation_requires_k_of_m() {
    let mut config = test_config();
    config.signal.confirmation_m = 3;
    config.signal.confirmation_k = 2;
    let source = Arc::new(ScriptedSource::new(
        vec![
            book(0, 100.0, 101.0, 9.0, 1.0),
            book(1, 100.0, 101.0, 1.0, 1.0),
            book(2, 100.0, 101.0, 9.0, 1.0),
        ],
        balances(),
    ));
    let mut engine = TradingLoop::new(config, source, Arc::new(DryRunGateway::new()))
        .with_pacing(Pacing::Replay);

    let mut confirmed = Vec::new();
    for _ in 0..3 {
        confirmed.push(engine.poll_once().await.record.confirmed_signal);
    }
    assert_eq!(confirmed, vec!["HOLD", "HOLD", "BUY"]);
    assert_eq!(engine.pending_signal(), Signal::Buy);
}

#[tokio::test]
async fn test_rate_limit_backs_off_then_resets() {
    let mut config = test_config();
    config.runtime.backoff_base_secs = 1.0;
    config.runtime.backoff_cap_secs = 3.0;
    let source = Arc::new(ScriptedSource::new(
        vec![
            Step::HttpError(429),
            Step::HttpError(418),
            Step::HttpError(429),
            book(0, 100.0, 101.0, 1.0, 1.0),
        ],
        balances(),
    ));
    let mut engine = TradingLoop::new(config, source, Arc::new(DryRunGateway::new()))
        .with_pacing(Pacing::Replay);

    let mut delays = Vec::new();
    for _ in 0..3 {
        let outcome = engine.poll_once().await;
        assert_eq!(outcome.record.action, "POLL_ERROR");
        assert!(outcome.rate_limit.is_some());
        assert!(engine.settle(&outcome));
        delays.push(engine.next_delay(&outcome));
    }
    assert_eq!(
        delays,
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(3)
        ]
    );
    assert_eq!(engine.consecutive_errors(), 3);

    let clean = engine.poll_once().await;
    assert!(clean.is_clean());
    assert!(engine.settle(&clean));
    assert_eq!(engine.consecutive_errors(), 0);
    assert_eq!(engine.backoff_secs(), 1.0);
}

#[tokio::test]
async fn test_non_rate_limit_error_uses_poll_interval() {
    let mut config = test_config();
    config.runtime.poll_interval_secs = 0.5;
    let source = Arc::new(ScriptedSource::new(vec![Step::HttpError(500)], balances()));
    let mut engine = TradingLoop::new(config, source, Arc::new(DryRunGateway::new()))
        .with_pacing(Pacing::Replay);

    let outcome = engine.poll_once().await;
    assert!(outcome.rate_limit.is_none());
    assert!(outcome.record.error.contains("500"));
    assert_eq!(engine.next_delay(&outcome), Duration::from_millis(500));
}

#[tokio::test]
async fn test_run_stops_after_error_limit() {
    let mut config = test_config();
    config.runtime.max_consecutive_errors = 2;
    let source = Arc::new(ScriptedSource::new(Vec::new(), balances()));

    let summary = assert_ok!(
        TradingLoop::new(config, source, Arc::new(DryRunGateway::new()))
            .with_pacing(Pacing::Replay)
            .run()
            .await
    );
    assert_eq!(summary.polls, 3);
    assert_eq!(summary.errors, 3);
    assert_eq!(summary.pnl_samples, 0);
}

#[tokio::test]
async fn test_live_orders_refresh_balances_and_cancel_on_shutdown() {
    let mut config = test_config();
    config.execution.mode = ExecutionMode::Live;
    let source = Arc::new(ScriptedSource::new(
        vec![
            book(0, 100.0, 101.0, 9.0, 1.0),
            book(1, 100.0, 101.0, 9.0, 1.0),
        ],
        balances(),
    ));
    let gateway = Arc::new(RecordingGateway::default());
    let mut engine = TradingLoop::new(config, source.clone(), gateway.clone())
        .with_pacing(Pacing::Replay);

    engine.poll_once().await;
    assert_eq!(source.balance_calls(), 1);

    let outcome = engine.poll_once().await;
    assert_eq!(outcome.record.action, "BUY");
    assert_eq!(outcome.record.order_id, "42");
    assert_eq!(outcome.record.paper_trade_notional, 0.0);
    assert_eq!(source.balance_calls(), 2);
    assert_eq!(engine.ledger().unwrap().trade_count, 0);

    let summary = assert_ok!(engine.shutdown().await);
    assert_eq!(summary.orders_placed, 1);
    assert_eq!(summary.orders_filled, 1);
    assert_eq!(summary.open_orders_canceled, 2);
    assert_eq!(gateway.cancel_calls(), 1);
}

#[tokio::test]
async fn test_execution_error_marks_poll() {
    let source = Arc::new(ScriptedSource::new(
        vec![
            book(0, 100.0, 101.0, 9.0, 1.0),
            book(1, 100.0, 101.0, 1.0, 1.0),
        ],
        balances(),
    ));
    let gateway = Arc::new(RecordingGateway::failing());
    let mut engine = TradingLoop::new(test_config(), source, gateway.clone())
        .with_pacing(Pacing::Replay);

    engine.poll_once().await;
    let outcome = engine.poll_once().await;

    assert_eq!(outcome.record.action, "ERROR_BUY");
    assert_eq!(outcome.record.reason, "execution_exception");
    assert!(!outcome.record.approved);
    assert!(outcome.record.error.contains("gateway unavailable"));
    assert_eq!(outcome.errors, 1);
    assert_eq!(engine.summary().errors, 1);
    assert_eq!(gateway.decisions.lock().unwrap().len(), 1);
    assert_eq!(engine.ledger().unwrap().trade_count, 0);
}

#[tokio::test]
async fn test_cooldown_blocks_back_to_back_trades() {
    let mut config = test_config();
    config.risk.cooldown_seconds = 15.0;
    let source = Arc::new(ScriptedSource::new(
        vec![
            book(0, 100.0, 101.0, 9.0, 1.0),
            book(2, 100.0, 101.0, 9.0, 1.0),
            book(4, 100.0, 101.0, 9.0, 1.0),
            book(20, 100.0, 101.0, 9.0, 1.0),
        ],
        balances(),
    ));
    let mut engine = TradingLoop::new(config, source, Arc::new(DryRunGateway::new()))
        .with_pacing(Pacing::Replay);

    let mut actions = Vec::new();
    let mut reasons = Vec::new();
    for _ in 0..4 {
        let outcome = engine.poll_once().await;
        actions.push(outcome.record.action);
        reasons.push(outcome.record.reason);
    }
    assert_eq!(actions, vec!["HOLD", "DRY_RUN_BUY", "SKIP_BUY", "DRY_RUN_BUY"]);
    assert_eq!(reasons[2], "cooldown_active");
}
