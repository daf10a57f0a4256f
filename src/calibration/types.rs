//! Calibration types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Calibrator lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CalibrationState {
    /// Waiting for the first valid calibration
    Warmup,
    /// A new threshold became active on this poll
    Calibrating,
    /// Trading on a live threshold
    Trading,
}

impl CalibrationState {
    /// Log representation
    pub fn as_str(&self) -> &'static str {
        match self {
            CalibrationState::Warmup => "WARMUP",
            CalibrationState::Calibrating => "CALIBRATING",
            CalibrationState::Trading => "TRADING",
        }
    }
}

impl fmt::Display for CalibrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An imbalance reading paired with the return realized H polls later
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabeledObservation {
    /// Imbalance at observation time
    pub imbalance: f64,
    /// `mid[t+H] / mid[t] - 1`
    pub forward_return: f64,
}

/// Outcome code of a calibration attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationReason {
    /// A threshold was selected
    Ok,
    /// Fewer than W labeled observations
    InsufficientWindow,
    /// Grid bounds produced no candidate thresholds
    EmptyGrid,
    /// No candidate reached the minimum trade count
    NoValidCandidate,
}

impl CalibrationReason {
    /// Reason code as logged
    pub fn as_str(&self) -> &'static str {
        match self {
            CalibrationReason::Ok => "ok",
            CalibrationReason::InsufficientWindow => "insufficient_window",
            CalibrationReason::EmptyGrid => "empty_grid",
            CalibrationReason::NoValidCandidate => "no_valid_candidate",
        }
    }
}

impl fmt::Display for CalibrationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one calibration attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    /// Selected threshold, absent on failure
    pub theta_hat: Option<f64>,
    /// t-statistic of signed forward returns
    pub score: f64,
    /// Score minus turnover penalty
    pub score_adj: f64,
    /// Number of selected observations
    pub n: usize,
    /// `n / W`
    pub trade_rate: f64,
    /// Observations in the window at calibration time
    pub window_obs: usize,
    /// Outcome code
    pub reason: CalibrationReason,
    /// Smoothed threshold after applying this report
    pub theta_live: Option<f64>,
}

impl CalibrationReport {
    /// A report carrying no threshold
    pub fn failure(reason: CalibrationReason, window_obs: usize) -> Self {
        Self {
            theta_hat: None,
            score: f64::NEG_INFINITY,
            score_adj: f64::NEG_INFINITY,
            n: 0,
            trade_rate: 0.0,
            window_obs,
            reason,
            theta_live: None,
        }
    }

    /// True when a threshold was selected
    pub fn is_ok(&self) -> bool {
        self.theta_hat.is_some()
    }
}
