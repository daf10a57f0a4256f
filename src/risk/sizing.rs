//! Position sizing implementations
//!
//! Scales the per-trade notional by the strength of the imbalance.

use crate::config::{RiskConfig, SizingMode};

/// Trait for notional scaling rules
pub trait PositionSizer: Send + Sync {
    /// Fraction of the notional cap to use, in [0, 1] for finite inputs
    fn scale(&self, imbalance: f64, threshold: f64) -> f64;

    /// Get the sizing mode name
    fn mode_name(&self) -> &'static str;
}

/// Scale linearly with |imbalance|
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearAbsSizer;

impl PositionSizer for LinearAbsSizer {
    fn scale(&self, imbalance: f64, _threshold: f64) -> f64 {
        imbalance.abs().clamp(0.0, 1.0)
    }

    fn mode_name(&self) -> &'static str {
        "linear_abs"
    }
}

/// Scale by the excess of |imbalance| over the threshold.
///
/// The excess is normalized by the remaining room `1 - threshold`, so a
/// reading at the threshold sizes to zero and a one-sided book sizes to 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearExcessSizer;

impl PositionSizer for LinearExcessSizer {
    fn scale(&self, imbalance: f64, threshold: f64) -> f64 {
        if threshold >= 1.0 {
            return 0.0;
        }
        let abs_imb = imbalance.abs().clamp(0.0, 1.0);
        ((abs_imb - threshold) / (1.0 - threshold)).clamp(0.0, 1.0)
    }

    fn mode_name(&self) -> &'static str {
        "linear_excess"
    }
}

/// Sizer for a configured mode
pub fn sizer_for(mode: SizingMode) -> &'static dyn PositionSizer {
    match mode {
        SizingMode::LinearAbs => &LinearAbsSizer,
        SizingMode::LinearExcess => &LinearExcessSizer,
    }
}

/// Quote notional to trade for this imbalance.
///
/// Returns the full cap when sizing is disabled. NaN inputs propagate so the
/// caller can reject them.
pub fn target_notional(cfg: &RiskConfig, imbalance: f64, threshold: f64) -> f64 {
    let cap = cfg.max_notional_per_trade;
    if !cfg.position_sizing_enabled {
        return cap;
    }
    let scale = sizer_for(cfg.sizing_mode).scale(imbalance, threshold);
    (cap * scale).clamp(0.0, cap.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sized(mode: SizingMode) -> RiskConfig {
        RiskConfig {
            max_notional_per_trade: 10.0,
            position_sizing_enabled: true,
            sizing_mode: mode,
            ..Default::default()
        }
    }

    #[test]
    fn test_linear_abs() {
        let s = LinearAbsSizer;
        assert_eq!(s.scale(0.4, 0.1), 0.4);
        assert_eq!(s.scale(-0.25, 0.1), 0.25);
        assert_eq!(s.scale(1.7, 0.1), 1.0);
        assert_eq!(s.mode_name(), "linear_abs");
    }

    #[test]
    fn test_linear_excess() {
        let s = LinearExcessSizer;
        assert_eq!(s.scale(0.1, 0.1), 0.0);
        assert_eq!(s.scale(0.05, 0.1), 0.0);
        assert!((s.scale(0.55, 0.1) - 0.5).abs() < 1e-12);
        assert_eq!(s.scale(-1.0, 0.1), 1.0);
        assert_eq!(s.scale(0.9, 1.0), 0.0);
    }

    #[test]
    fn test_target_notional_disabled_uses_cap() {
        let cfg = RiskConfig {
            max_notional_per_trade: 10.0,
            ..Default::default()
        };
        assert_eq!(target_notional(&cfg, 0.01, 0.5), 10.0);
    }

    #[test]
    fn test_target_notional_scaled() {
        let cfg = sized(SizingMode::LinearAbs);
        assert!((target_notional(&cfg, 0.3, 0.1) - 3.0).abs() < 1e-12);

        let cfg = sized(SizingMode::LinearExcess);
        assert!((target_notional(&cfg, 0.55, 0.1) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_target_notional_nan_propagates() {
        let cfg = sized(SizingMode::LinearAbs);
        assert!(target_notional(&cfg, f64::NAN, 0.1).is_nan());
    }
}
