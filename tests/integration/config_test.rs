//! Integration tests for configuration loading

use std::path::Path;

use imbalance_trader::config::{CalibrationMode, Config, ExecutionMode, SizingMode};
use imbalance_trader::telemetry::LogFormat;

#[test]
fn test_config_example_loads() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config.toml.example");
    let config = Config::load(path).unwrap();

    assert_eq!(config.exchange.symbol, "BTCUSDT");
    assert_eq!(config.signal.threshold, 0.06);
    assert_eq!(config.calibration.mode, CalibrationMode::WarmupThenTrade);
    assert_eq!(config.risk.sizing_mode, SizingMode::LinearExcess);
    assert_eq!(config.execution.mode, ExecutionMode::Paper);
    assert_eq!(config.paper.fee_rate, 0.001);
    assert_eq!(config.telemetry.log_format, LogFormat::Pretty);
}

#[test]
fn test_partial_config_uses_defaults() {
    let config: Config = toml::from_str(
        r#"
        [signal]
        threshold = 0.2

        [calibration]
        enabled = true
        mode = "rolling_walk_forward"
        "#,
    )
    .unwrap();
    let config = config.validate().unwrap();

    assert_eq!(config.signal.threshold, 0.2);
    assert_eq!(config.signal.confirmation_m, 1);
    assert_eq!(config.calibration.mode, CalibrationMode::RollingWalkForward);
    assert_eq!(config.calibration.window_polls, 300);
    assert_eq!(config.risk.cooldown_seconds, 15.0);
    assert_eq!(config.runtime.resync_every_n_polls, 30);
}

#[test]
fn test_impossible_calibration_rejected() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "[calibration]\nenabled = true\ngrid_min = 0.5\ngrid_max = 0.1\n",
    )
    .unwrap();

    let err = Config::load(&path).unwrap_err();
    assert!(err.to_string().contains("calibration.grid_max"));
}

#[test]
fn test_infinite_poll_interval_rejected() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[runtime]\npoll_interval_secs = inf\n").unwrap();

    let err = Config::load(&path).unwrap_err();
    assert!(err.to_string().contains("runtime.poll_interval_secs"));
}
