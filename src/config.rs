//! Configuration types for imbalance-trader

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::telemetry::LogFormat;

/// Configuration validation errors
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// A value makes the configured feature impossible to run
    #[error("invalid {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub signal: SignalConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub paper: PaperConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Exchange connectivity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// REST base URL including the `/api` prefix
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Traded symbol
    #[serde(default = "default_symbol")]
    pub symbol: String,
    /// Signed request validity window
    #[serde(default = "default_recv_window_ms")]
    pub recv_window_ms: u64,
    /// HTTP request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://testnet.binance.vision/api".to_string()
}
fn default_symbol() -> String {
    "BTCUSDT".to_string()
}
fn default_recv_window_ms() -> u64 {
    5000
}
fn default_timeout_secs() -> u64 {
    10
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            symbol: default_symbol(),
            recv_window_ms: default_recv_window_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Market data configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Aggregate quantities over the depth book instead of top of book
    #[serde(default)]
    pub use_depth: bool,
    /// Depth levels per side when `use_depth` is set
    #[serde(default = "default_depth_levels")]
    pub depth_levels: usize,
}

fn default_depth_levels() -> usize {
    10
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            use_depth: false,
            depth_levels: default_depth_levels(),
        }
    }
}

/// Signal generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Fixed threshold, and the fallback before calibration succeeds
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Confirmation window size (M)
    #[serde(default = "default_one")]
    pub confirmation_m: usize,
    /// Confirmations required within the window (K)
    #[serde(default = "default_one")]
    pub confirmation_k: usize,
}

fn default_threshold() -> f64 {
    0.06
}
fn default_one() -> usize {
    1
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            confirmation_m: 1,
            confirmation_k: 1,
        }
    }
}

/// Calibration schedule
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationMode {
    /// Calibrate once after warmup, then hold the threshold
    #[default]
    WarmupThenTrade,
    /// Recalibrate every `trade_horizon_polls`
    RollingWalkForward,
}

/// Walk-forward calibration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Use the calibrator instead of the fixed threshold
    #[serde(default)]
    pub enabled: bool,
    /// Calibration schedule
    #[serde(default)]
    pub mode: CalibrationMode,
    /// Labeled observations per window (W)
    #[serde(default = "default_window_polls")]
    pub window_polls: usize,
    /// Polls between rolling recalibrations
    #[serde(default = "default_trade_horizon_polls")]
    pub trade_horizon_polls: usize,
    /// Forward-return horizon in polls (H)
    #[serde(default = "default_horizon_polls")]
    pub horizon_polls: usize,
    /// Lowest candidate threshold
    #[serde(default = "default_grid_min")]
    pub grid_min: f64,
    /// Highest candidate threshold
    #[serde(default = "default_grid_max")]
    pub grid_max: f64,
    /// Candidate spacing
    #[serde(default = "default_grid_step")]
    pub grid_step: f64,
    /// Minimum selected observations per candidate
    #[serde(default = "default_min_trades")]
    pub min_trades: usize,
    /// Penalty per unit of trade rate
    #[serde(default = "default_turnover_penalty_alpha")]
    pub turnover_penalty_alpha: f64,
    /// EMA weight of a new estimate (0 disables smoothing)
    #[serde(default = "default_ema_lambda")]
    pub ema_lambda: f64,
}

fn default_window_polls() -> usize {
    300
}
fn default_trade_horizon_polls() -> usize {
    300
}
fn default_horizon_polls() -> usize {
    10
}
fn default_grid_min() -> f64 {
    0.02
}
fn default_grid_max() -> f64 {
    0.5
}
fn default_grid_step() -> f64 {
    0.02
}
fn default_min_trades() -> usize {
    20
}
fn default_turnover_penalty_alpha() -> f64 {
    0.5
}
fn default_ema_lambda() -> f64 {
    0.3
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: CalibrationMode::WarmupThenTrade,
            window_polls: default_window_polls(),
            trade_horizon_polls: default_trade_horizon_polls(),
            horizon_polls: default_horizon_polls(),
            grid_min: default_grid_min(),
            grid_max: default_grid_max(),
            grid_step: default_grid_step(),
            min_trades: default_min_trades(),
            turnover_penalty_alpha: default_turnover_penalty_alpha(),
            ema_lambda: default_ema_lambda(),
        }
    }
}

/// How imbalance scales the trade notional
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SizingMode {
    /// Scale by |imbalance|
    LinearAbs,
    /// Scale by how far |imbalance| exceeds the threshold
    #[default]
    LinearExcess,
}

impl SizingMode {
    /// Mode name as configured
    pub fn as_str(&self) -> &'static str {
        match self {
            SizingMode::LinearAbs => "linear_abs",
            SizingMode::LinearExcess => "linear_excess",
        }
    }
}

/// Risk management configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Minimum seconds between trades
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: f64,
    /// Notional cap per trade in quote
    #[serde(default = "default_max_notional")]
    pub max_notional_per_trade: f64,
    /// Smallest sized notional worth sending
    #[serde(default)]
    pub min_notional_per_trade: f64,
    /// Base asset position cap
    #[serde(default = "default_max_abs_position")]
    pub max_abs_position: f64,
    /// Scale notional by imbalance strength
    #[serde(default)]
    pub position_sizing_enabled: bool,
    /// Scaling rule when sizing is enabled
    #[serde(default)]
    pub sizing_mode: SizingMode,
}

fn default_cooldown_seconds() -> f64 {
    15.0
}
fn default_max_notional() -> f64 {
    10.0
}
fn default_max_abs_position() -> f64 {
    0.001
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            cooldown_seconds: default_cooldown_seconds(),
            max_notional_per_trade: default_max_notional(),
            min_notional_per_trade: 0.0,
            max_abs_position: default_max_abs_position(),
            position_sizing_enabled: false,
            sizing_mode: SizingMode::LinearExcess,
        }
    }
}

/// Execution engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub mode: ExecutionMode,
}

/// Execution mode: paper trading or live
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Paper,
    Live,
}

/// Paper ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperConfig {
    /// Starting quote balance
    #[serde(default = "default_start_quote")]
    pub start_quote: f64,
    /// Starting base balance
    #[serde(default)]
    pub start_base: f64,
    /// Fee charged on each simulated fill
    #[serde(default)]
    pub fee_rate: f64,
    /// Adverse price move applied to each simulated fill
    #[serde(default)]
    pub slippage_bps: f64,
}

fn default_start_quote() -> f64 {
    10_000.0
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            start_quote: default_start_quote(),
            start_base: 0.0,
            fee_rate: 0.0,
            slippage_bps: 0.0,
        }
    }
}

/// Poll loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Sleep between polls
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: f64,
    /// Stop after this many polls (0 runs forever)
    #[serde(default)]
    pub max_polls: u64,
    /// Refresh balances every N polls
    #[serde(default = "default_resync_every_n_polls")]
    pub resync_every_n_polls: u64,
    /// Heartbeat every N polls
    #[serde(default = "default_print_every_n_polls")]
    pub print_every_n_polls: u64,
    /// Halt once consecutive errors exceed this
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,
    /// First rate-limit backoff
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: f64,
    /// Rate-limit backoff ceiling
    #[serde(default = "default_backoff_cap_secs")]
    pub backoff_cap_secs: f64,
}

fn default_poll_interval_secs() -> f64 {
    2.0
}
fn default_resync_every_n_polls() -> u64 {
    30
}
fn default_print_every_n_polls() -> u64 {
    1
}
fn default_max_consecutive_errors() -> u32 {
    5
}
fn default_backoff_base_secs() -> f64 {
    2.0
}
fn default_backoff_cap_secs() -> f64 {
    60.0
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            max_polls: 0,
            resync_every_n_polls: default_resync_every_n_polls(),
            print_every_n_polls: default_print_every_n_polls(),
            max_consecutive_errors: default_max_consecutive_errors(),
            backoff_base_secs: default_backoff_base_secs(),
            backoff_cap_secs: default_backoff_cap_secs(),
        }
    }
}

/// Data capture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Write poll records to Parquet
    #[serde(default)]
    pub capture_enabled: bool,
    /// Output directory for Parquet files
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Records buffered before each file is written
    #[serde(default = "default_flush_every_n_polls")]
    pub flush_every_n_polls: usize,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_flush_every_n_polls() -> usize {
    500
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            capture_enabled: false,
            output_dir: default_output_dir(),
            flush_every_n_polls: default_flush_every_n_polls(),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Prometheus listener port (0 disables the exporter)
    #[serde(default)]
    pub metrics_port: u16,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::Pretty,
            metrics_port: 0,
        }
    }
}

fn invalid(field: &'static str, reason: &'static str) -> ConfigError {
    ConfigError::Invalid { field, reason }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config.validate()?)
    }

    /// Clamp out-of-range values and reject settings that cannot run.
    ///
    /// Counters are raised to at least 1, K is capped at M, and monetary
    /// values are floored at 0.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        let signal = &mut self.signal;
        if !signal.threshold.is_finite() {
            return Err(invalid("signal.threshold", "must be finite"));
        }
        signal.threshold = signal.threshold.max(0.0);
        signal.confirmation_m = signal.confirmation_m.max(1);
        signal.confirmation_k = signal.confirmation_k.clamp(1, signal.confirmation_m);

        self.market.depth_levels = self.market.depth_levels.max(1);

        let risk = &mut self.risk;
        risk.cooldown_seconds = risk.cooldown_seconds.max(0.0);
        risk.max_notional_per_trade = risk.max_notional_per_trade.max(0.0);
        risk.min_notional_per_trade = risk.min_notional_per_trade.max(0.0);
        risk.max_abs_position = risk.max_abs_position.max(0.0);

        let paper = &mut self.paper;
        paper.start_quote = paper.start_quote.max(0.0);
        paper.start_base = paper.start_base.max(0.0);
        paper.fee_rate = paper.fee_rate.max(0.0);
        paper.slippage_bps = paper.slippage_bps.max(0.0);

        let runtime = &mut self.runtime;
        for (field, value) in [
            ("runtime.poll_interval_secs", runtime.poll_interval_secs),
            ("runtime.backoff_base_secs", runtime.backoff_base_secs),
            ("runtime.backoff_cap_secs", runtime.backoff_cap_secs),
        ] {
            if !value.is_finite() {
                return Err(invalid(field, "must be finite"));
            }
        }
        runtime.poll_interval_secs = runtime.poll_interval_secs.max(0.1);
        runtime.resync_every_n_polls = runtime.resync_every_n_polls.max(1);
        runtime.print_every_n_polls = runtime.print_every_n_polls.max(1);
        runtime.max_consecutive_errors = runtime.max_consecutive_errors.max(1);
        runtime.backoff_base_secs = runtime.backoff_base_secs.max(0.1);
        runtime.backoff_cap_secs = runtime.backoff_cap_secs.max(1.0);

        self.data.flush_every_n_polls = self.data.flush_every_n_polls.max(1);

        if self.calibration.enabled {
            let cal = &self.calibration;
            if cal.window_polls == 0 {
                return Err(invalid("calibration.window_polls", "must be at least 1"));
            }
            if cal.horizon_polls == 0 {
                return Err(invalid("calibration.horizon_polls", "must be at least 1"));
            }
            if !(cal.grid_step > 0.0) {
                return Err(invalid("calibration.grid_step", "must be positive"));
            }
            if !(cal.grid_max >= cal.grid_min) {
                return Err(invalid("calibration.grid_max", "must not be below grid_min"));
            }
            if !(0.0..=1.0).contains(&cal.ema_lambda) {
                return Err(invalid("calibration.ema_lambda", "must be within [0, 1]"));
            }
        }

        Ok(self)
    }

    /// One-line summary of the settings that shape trading
    pub fn summary_line(&self) -> String {
        format!(
            "symbol={} mode={:?} threshold={} poll_interval={} cooldown={} max_notional={} \
             max_abs_position={} use_depth={} max_errors={} resync_every={} max_polls={} \
             confirmation_m={} confirmation_k={} threshold_calibration={} calibration_mode={:?} \
             calibration_w={} calibration_h={}",
            self.exchange.symbol,
            self.execution.mode,
            self.signal.threshold,
            self.runtime.poll_interval_secs,
            self.risk.cooldown_seconds,
            self.risk.max_notional_per_trade,
            self.risk.max_abs_position,
            self.market.use_depth,
            self.runtime.max_consecutive_errors,
            self.runtime.resync_every_n_polls,
            self.runtime.max_polls,
            self.signal.confirmation_m,
            self.signal.confirmation_k,
            self.calibration.enabled,
            self.calibration.mode,
            self.calibration.window_polls,
            self.calibration.horizon_polls,
        )
    }
}
