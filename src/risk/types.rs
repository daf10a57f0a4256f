//! Risk decision types

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::signal::Signal;

/// Why a pending signal was not approved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    Hold,
    BadMid,
    InvalidImbalance,
    CooldownActive,
    NotionalBelowMin,
    BelowMinNotionalBuy,
    InsufficientUsdt,
    BelowMinQtyBuy,
    AboveMaxQtyBuy,
    MaxAbsPositionExceeded,
    RoundedToZero,
    InsufficientBtc,
    BelowMinQtySell,
    AboveMaxQtySell,
    BelowMinNotionalSell,
}

impl RejectReason {
    /// Reason code as recorded in the trade log
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::Hold => "hold",
            RejectReason::BadMid => "bad_mid",
            RejectReason::InvalidImbalance => "invalid_imbalance",
            RejectReason::CooldownActive => "cooldown_active",
            RejectReason::NotionalBelowMin => "notional_below_min",
            RejectReason::BelowMinNotionalBuy => "below_min_notional_buy",
            RejectReason::InsufficientUsdt => "insufficient_usdt",
            RejectReason::BelowMinQtyBuy => "below_min_qty_buy",
            RejectReason::AboveMaxQtyBuy => "above_max_qty_buy",
            RejectReason::MaxAbsPositionExceeded => "max_abs_position_exceeded",
            RejectReason::RoundedToZero => "rounded_to_zero",
            RejectReason::InsufficientBtc => "insufficient_btc",
            RejectReason::BelowMinQtySell => "below_min_qty_sell",
            RejectReason::AboveMaxQtySell => "above_max_qty_sell",
            RejectReason::BelowMinNotionalSell => "below_min_notional_sell",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of evaluating a pending signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeDecision {
    /// Side of the pending signal
    pub side: Signal,
    pub approved: bool,
    /// Set exactly when not approved
    pub reject_reason: Option<RejectReason>,
    /// Quote amount to spend (BUY)
    pub quote_order_qty: f64,
    /// Base quantity to sell (SELL), already step-rounded
    pub quantity: f64,
    /// Quote notional the sizer asked for before exchange rounding
    #[serde(default)]
    pub notional_target: f64,
}

impl TradeDecision {
    /// A rejected decision
    pub fn reject(side: Signal, reason: RejectReason) -> Self {
        Self {
            side,
            approved: false,
            reject_reason: Some(reason),
            quote_order_qty: 0.0,
            quantity: 0.0,
            notional_target: 0.0,
        }
    }

    /// An approved market buy spending `quote_order_qty`
    pub fn buy(quote_order_qty: f64) -> Self {
        Self {
            side: Signal::Buy,
            approved: true,
            reject_reason: None,
            quote_order_qty,
            quantity: 0.0,
            notional_target: quote_order_qty,
        }
    }

    /// An approved market sell of `quantity`
    pub fn sell(quantity: f64) -> Self {
        Self {
            side: Signal::Sell,
            approved: true,
            reject_reason: None,
            quote_order_qty: 0.0,
            quantity,
            notional_target: 0.0,
        }
    }

    /// Record the sized notional behind a decision
    pub fn with_notional_target(mut self, notional_target: f64) -> Self {
        self.notional_target = notional_target;
        self
    }

    /// Reject code, empty when approved
    pub fn reason_str(&self) -> &'static str {
        self.reject_reason.map(|r| r.as_str()).unwrap_or("")
    }
}
