//! Signal types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Directional trading signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    /// Buy the base asset with quote
    Buy,
    /// Sell the base asset for quote
    Sell,
    /// No action
    #[default]
    Hold,
}

impl Signal {
    /// Wire/log representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
            Signal::Hold => "HOLD",
        }
    }

    /// True for BUY and SELL
    pub fn is_directional(&self) -> bool {
        !matches!(self, Signal::Hold)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map an imbalance reading onto a signal.
///
/// BUY when `imbalance > threshold`, SELL when `imbalance < -threshold`,
/// HOLD otherwise (including exact equality). The caller is responsible for
/// passing a non-negative threshold.
pub fn signal_from_imbalance(imbalance: f64, threshold: f64) -> Signal {
    if imbalance > threshold {
        return Signal::Buy;
    }
    if imbalance < -threshold {
        return Signal::Sell;
    }
    Signal::Hold
}
