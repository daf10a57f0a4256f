//! Walk-forward threshold calibrator
//!
//! Labels each imbalance reading with the mid-price return realized
//! `horizon_polls` later, keeps the most recent `window_polls` labels, and
//! re-fits the trading threshold by grid search. Labels only become available
//! once their outcome is known, so the fit never looks ahead.

use std::collections::VecDeque;

use super::grid::GridSearch;
use super::{CalibrationReport, CalibrationState, LabeledObservation};
use crate::config::{CalibrationConfig, CalibrationMode};
use crate::market::{safe_mid, MarketSnapshot};

/// Adaptive threshold estimator with a WARMUP → CALIBRATING → TRADING lifecycle
#[derive(Debug, Clone)]
pub struct WalkForwardCalibrator {
    mode: CalibrationMode,
    window_size: usize,
    trade_horizon: usize,
    horizon_polls: usize,
    ema_lambda: f64,
    search: GridSearch,

    state: CalibrationState,
    last_report: Option<CalibrationReport>,
    labeled: VecDeque<LabeledObservation>,
    pending: VecDeque<(f64, f64)>,
    theta_hat: Option<f64>,
    theta_live: Option<f64>,
    polls_since_calibration: usize,
}

impl WalkForwardCalibrator {
    /// Create a calibrator from configuration
    pub fn new(config: &CalibrationConfig) -> Self {
        let window_size = config.window_polls.max(1);
        Self {
            mode: config.mode,
            window_size,
            trade_horizon: config.trade_horizon_polls,
            horizon_polls: config.horizon_polls,
            ema_lambda: config.ema_lambda,
            search: GridSearch {
                grid_min: config.grid_min,
                grid_max: config.grid_max,
                grid_step: config.grid_step,
                min_trades: config.min_trades,
                turnover_penalty_alpha: config.turnover_penalty_alpha,
            },
            state: CalibrationState::Warmup,
            last_report: None,
            labeled: VecDeque::with_capacity(window_size),
            pending: VecDeque::new(),
            theta_hat: None,
            theta_live: None,
            polls_since_calibration: 0,
        }
    }

    /// Feed one snapshot through the labeling pipeline and the state machine
    pub fn update(&mut self, snapshot: &MarketSnapshot) {
        if self.state == CalibrationState::Calibrating {
            self.state = CalibrationState::Trading;
        }

        let mid = safe_mid(snapshot.bid, snapshot.ask);
        if mid <= 0.0 {
            return;
        }

        self.pending.push_back((snapshot.imbalance, mid));
        if self.pending.len() > self.horizon_polls {
            if let Some((prev_imbalance, prev_mid)) = self.pending.pop_front() {
                self.label(prev_imbalance, prev_mid, mid);
            }
        }

        match self.mode {
            CalibrationMode::WarmupThenTrade => self.update_warmup_then_trade(),
            CalibrationMode::RollingWalkForward => self.update_rolling(),
        }
    }

    fn label(&mut self, imbalance: f64, prev_mid: f64, mid: f64) {
        if prev_mid <= 0.0 {
            return;
        }
        let forward_return = mid / prev_mid - 1.0;
        if !imbalance.is_finite() || !forward_return.is_finite() {
            return;
        }
        if self.labeled.len() == self.window_size {
            self.labeled.pop_front();
        }
        self.labeled.push_back(LabeledObservation {
            imbalance,
            forward_return,
        });
    }

    /// Threshold to trade on this poll.
    ///
    /// Falls back to `max(default, 0)` until a calibration succeeds. In
    /// rolling mode each call while trading counts one poll toward the next
    /// recalibration.
    pub fn current_threshold(&mut self, default_threshold: f64) -> f64 {
        let threshold = self.theta_live.unwrap_or(default_threshold.max(0.0));
        if self.mode == CalibrationMode::RollingWalkForward
            && self.theta_live.is_some()
            && matches!(
                self.state,
                CalibrationState::Trading | CalibrationState::Calibrating
            )
        {
            self.polls_since_calibration += 1;
        }
        threshold
    }

    fn update_warmup_then_trade(&mut self) {
        if self.theta_live.is_some() {
            if self.state != CalibrationState::Calibrating {
                self.state = CalibrationState::Trading;
            }
            return;
        }
        if self.labeled.len() < self.window_size {
            self.state = CalibrationState::Warmup;
            return;
        }
        self.attempt_calibration();
    }

    fn update_rolling(&mut self) {
        if self.theta_live.is_none() {
            if self.labeled.len() < self.window_size {
                self.state = CalibrationState::Warmup;
                return;
            }
            self.attempt_calibration();
            return;
        }

        if self.polls_since_calibration >= self.trade_horizon {
            self.attempt_calibration();
            return;
        }

        if self.state != CalibrationState::Calibrating {
            self.state = CalibrationState::Trading;
        }
    }

    fn attempt_calibration(&mut self) {
        let mut report = self.calibrate_threshold();

        let Some(theta_hat) = report.theta_hat else {
            tracing::debug!(
                reason = %report.reason,
                window_obs = report.window_obs,
                "Calibration produced no threshold"
            );
            if self.theta_live.is_none() {
                self.state = CalibrationState::Warmup;
            } else {
                self.state = CalibrationState::Trading;
                self.polls_since_calibration = 0;
            }
            self.last_report = Some(report);
            return;
        };

        self.theta_hat = Some(theta_hat);
        let smoothed = match self.theta_live {
            Some(prev) if self.ema_lambda > 0.0 => {
                self.ema_lambda * theta_hat + (1.0 - self.ema_lambda) * prev
            }
            _ => theta_hat,
        };
        let theta_live = smoothed.max(0.0);

        self.theta_live = Some(theta_live);
        self.polls_since_calibration = 0;
        self.state = CalibrationState::Calibrating;
        report.theta_live = Some(theta_live);

        tracing::info!(
            theta_hat,
            theta_live,
            score = report.score,
            score_adj = report.score_adj,
            n = report.n,
            trade_rate = report.trade_rate,
            "Threshold calibrated"
        );
        self.last_report = Some(report);
    }

    /// Run the grid search over the current window without touching state
    pub fn calibrate_threshold(&self) -> CalibrationReport {
        let observations: Vec<LabeledObservation> = self.labeled.iter().copied().collect();
        self.search.run(&observations, self.window_size)
    }

    /// Current lifecycle state
    pub fn state(&self) -> CalibrationState {
        self.state
    }

    /// Report from the most recent calibration attempt
    pub fn last_report(&self) -> Option<&CalibrationReport> {
        self.last_report.as_ref()
    }

    /// Most recent raw grid-search threshold
    pub fn theta_hat(&self) -> Option<f64> {
        self.theta_hat
    }

    /// Smoothed threshold in use
    pub fn theta_live(&self) -> Option<f64> {
        self.theta_live
    }

    /// Labeled observations currently in the window
    pub fn observation_count(&self) -> usize {
        self.labeled.len()
    }

    /// Observations still waiting for their forward return
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Polls counted since the last calibration
    pub fn polls_since_calibration(&self) -> usize {
        self.polls_since_calibration
    }

    /// Labeled window, oldest first
    pub fn observations(&self) -> impl Iterator<Item = &LabeledObservation> {
        self.labeled.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationReason;
    use chrono::Utc;

    fn config(mode: CalibrationMode, window: usize, horizon: usize) -> CalibrationConfig {
        CalibrationConfig {
            enabled: true,
            mode,
            window_polls: window,
            trade_horizon_polls: 3,
            horizon_polls: horizon,
            grid_min: 0.1,
            grid_max: 0.5,
            grid_step: 0.1,
            min_trades: 1,
            turnover_penalty_alpha: 0.0,
            ema_lambda: 0.0,
        }
    }

    fn snap(mid: f64, imbalance: f64) -> MarketSnapshot {
        let mut s = MarketSnapshot::new(Utc::now(), mid - 0.5, mid + 0.5, 1.0, 1.0);
        s.imbalance = imbalance;
        s
    }

    /// Strong positive imbalance followed by a price rise, repeatedly
    fn trending(i: usize) -> MarketSnapshot {
        snap(100.0 + i as f64, 0.8)
    }

    #[test]
    fn test_starts_in_warmup() {
        let cal = WalkForwardCalibrator::new(&config(CalibrationMode::WarmupThenTrade, 5, 1));
        assert_eq!(cal.state(), CalibrationState::Warmup);
        assert!(cal.theta_live().is_none());
        assert!(cal.last_report().is_none());
    }

    #[test]
    fn test_labels_lag_by_horizon() {
        let mut cal = WalkForwardCalibrator::new(&config(CalibrationMode::WarmupThenTrade, 10, 2));
        cal.update(&snap(100.0, 0.5));
        cal.update(&snap(101.0, 0.1));
        assert_eq!(cal.observation_count(), 0);
        assert_eq!(cal.pending_count(), 2);

        cal.update(&snap(102.0, -0.3));
        assert_eq!(cal.observation_count(), 1);
        let first = cal.observations().next().copied().unwrap();
        assert_eq!(first.imbalance, 0.5);
        assert!((first.forward_return - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_unusable_mid_is_ignored() {
        let mut cal = WalkForwardCalibrator::new(&config(CalibrationMode::WarmupThenTrade, 10, 1));
        let mut bad = snap(100.0, 0.5);
        bad.bid = 0.0;
        cal.update(&bad);
        assert_eq!(cal.pending_count(), 0);
    }

    #[test]
    fn test_non_finite_imbalance_not_labeled() {
        let mut cal = WalkForwardCalibrator::new(&config(CalibrationMode::WarmupThenTrade, 10, 1));
        cal.update(&snap(100.0, f64::NAN));
        cal.update(&snap(101.0, 0.2));
        assert_eq!(cal.observation_count(), 0);
        cal.update(&snap(102.0, 0.2));
        assert_eq!(cal.observation_count(), 1);
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut cal = WalkForwardCalibrator::new(&config(CalibrationMode::WarmupThenTrade, 3, 1));
        for i in 0..10 {
            cal.update(&snap(100.0 + i as f64, i as f64 / 10.0));
        }
        assert_eq!(cal.observation_count(), 3);
        let imbalances: Vec<f64> = cal.observations().map(|o| o.imbalance).collect();
        assert_eq!(imbalances, vec![0.6, 0.7, 0.8]);
    }

    #[test]
    fn test_warmup_then_trade_lifecycle() {
        let mut cal = WalkForwardCalibrator::new(&config(CalibrationMode::WarmupThenTrade, 3, 1));

        // Three labels need four snapshots with H = 1
        for i in 0..3 {
            cal.update(&trending(i));
            assert_eq!(cal.state(), CalibrationState::Warmup);
        }
        cal.update(&trending(3));
        assert_eq!(cal.state(), CalibrationState::Calibrating);
        let theta = cal.theta_live().unwrap();
        assert_eq!(cal.last_report().unwrap().reason, CalibrationReason::Ok);

        cal.update(&trending(4));
        assert_eq!(cal.state(), CalibrationState::Trading);

        for i in 5..40 {
            cal.update(&snap(100.0 - i as f64, 0.8));
            assert_eq!(cal.current_threshold(0.06), theta);
            assert_eq!(cal.state(), CalibrationState::Trading);
        }
        assert_eq!(cal.theta_live(), Some(theta));
    }

    #[test]
    fn test_default_threshold_until_calibrated() {
        let mut cal = WalkForwardCalibrator::new(&config(CalibrationMode::RollingWalkForward, 5, 1));
        assert_eq!(cal.current_threshold(0.06), 0.06);
        assert_eq!(cal.current_threshold(-0.2), 0.0);
        assert_eq!(cal.polls_since_calibration(), 0);
    }

    #[test]
    fn test_failed_first_calibration_stays_in_warmup() {
        let mut cfg = config(CalibrationMode::WarmupThenTrade, 3, 1);
        cfg.min_trades = 10;
        let mut cal = WalkForwardCalibrator::new(&cfg);
        for i in 0..6 {
            cal.update(&trending(i));
        }
        assert_eq!(cal.state(), CalibrationState::Warmup);
        assert!(cal.theta_live().is_none());
        assert_eq!(
            cal.last_report().unwrap().reason,
            CalibrationReason::NoValidCandidate
        );
    }

    #[test]
    fn test_rolling_recalibrates_after_trade_horizon() {
        let mut cal = WalkForwardCalibrator::new(&config(CalibrationMode::RollingWalkForward, 3, 1));
        for i in 0..4 {
            cal.update(&trending(i));
            cal.current_threshold(0.06);
        }
        assert_eq!(cal.state(), CalibrationState::Calibrating);
        assert_eq!(cal.polls_since_calibration(), 1);

        // Two more counted polls reach the horizon of 3
        cal.update(&trending(4));
        cal.current_threshold(0.06);
        assert_eq!(cal.state(), CalibrationState::Trading);
        cal.update(&trending(5));
        cal.current_threshold(0.06);
        assert_eq!(cal.polls_since_calibration(), 3);

        cal.update(&trending(6));
        assert_eq!(cal.state(), CalibrationState::Calibrating);
        assert_eq!(cal.polls_since_calibration(), 0);
    }

    #[test]
    fn test_rolling_failed_recalibration_keeps_threshold() {
        let mut cal = WalkForwardCalibrator::new(&config(CalibrationMode::RollingWalkForward, 3, 1));
        for i in 0..4 {
            cal.update(&trending(i));
            cal.current_threshold(0.06);
        }
        let theta = cal.theta_live().unwrap();
        assert_eq!(cal.polls_since_calibration(), 1);

        // Flush the window with a quiet book; uncounted polls never trigger
        for i in 0..4 {
            cal.update(&snap(104.0 + i as f64, 0.0));
        }
        assert!(cal.observations().all(|o| o.imbalance == 0.0));
        cal.current_threshold(0.06);
        cal.current_threshold(0.06);
        assert_eq!(cal.polls_since_calibration(), 3);

        cal.update(&snap(108.0, 0.0));
        assert_eq!(cal.state(), CalibrationState::Trading);
        assert_eq!(cal.theta_live(), Some(theta));
        assert_eq!(cal.polls_since_calibration(), 0);
        assert_eq!(
            cal.last_report().unwrap().reason,
            CalibrationReason::NoValidCandidate
        );
    }

    #[test]
    fn test_ema_smoothing() {
        let mut cfg = config(CalibrationMode::RollingWalkForward, 2, 1);
        cfg.ema_lambda = 0.5;
        cfg.trade_horizon_polls = 1;
        cfg.grid_max = 0.9;
        let mut cal = WalkForwardCalibrator::new(&cfg);

        cal.update(&snap(100.0, 0.85));
        cal.update(&snap(101.0, 0.85));
        cal.update(&snap(102.0, 0.85));
        assert_eq!(cal.theta_live(), Some(0.1));

        cal.update(&snap(103.0, 0.3));
        assert_eq!(cal.state(), CalibrationState::Trading);
        cal.current_threshold(0.06);

        // Window: (0.85, up) and (0.3, down). Only thresholds >= 0.3 drop the loser.
        cal.update(&snap(102.0, 0.0));
        assert_eq!(cal.state(), CalibrationState::Calibrating);
        assert_eq!(cal.theta_hat(), Some(0.3));
        let live = cal.theta_live().unwrap();
        assert!((live - 0.2).abs() < 1e-12);
        assert_eq!(cal.last_report().unwrap().theta_live, Some(live));
    }

    #[test]
    fn test_calibrate_threshold_is_idempotent() {
        let mut cal = WalkForwardCalibrator::new(&config(CalibrationMode::WarmupThenTrade, 20, 2));
        for i in 0..30 {
            let x = (i as f64 * 0.7).sin();
            cal.update(&snap(100.0 + x, x));
        }
        let a = cal.calibrate_threshold();
        let b = cal.calibrate_threshold();
        assert_eq!(a, b);
    }
}
