//! Threshold calibration module
//!
//! Walk-forward estimation of the imbalance threshold from realized returns

mod calibrator;
mod grid;
mod types;

pub use calibrator::WalkForwardCalibrator;
pub use grid::{sample_std, signed_returns, t_stat, threshold_grid, GridSearch, MAX_GRID_STEPS};
pub use types::{CalibrationReason, CalibrationReport, CalibrationState, LabeledObservation};
