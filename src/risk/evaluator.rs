//! Pending-signal risk evaluation
//!
//! Turns the confirmed signal of the previous poll into an exchange-compliant
//! order size, or a reject code. The evaluator holds no state.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

use super::sizing::target_notional;
use super::{RejectReason, TradeDecision};
use crate::config::RiskConfig;
use crate::market::SymbolFilters;
use crate::signal::Signal;

/// Inputs for one evaluation
#[derive(Debug, Clone, Copy)]
pub struct RiskContext {
    /// Confirmed signal from the previous poll
    pub pending_signal: Signal,
    /// Current mid price
    pub mid: f64,
    /// Current imbalance
    pub imbalance: f64,
    /// Threshold in effect this poll
    pub threshold: f64,
    /// Base asset balance
    pub position_base: f64,
    /// Quote asset balance
    pub position_quote: f64,
    pub now: DateTime<Utc>,
    pub last_trade_at: Option<DateTime<Utc>>,
}

fn to_decimal(value: f64) -> Option<Decimal> {
    Decimal::from_str(&value.to_string()).ok()
}

/// Round `quantity` down to a multiple of `step_size`.
///
/// Uses the shortest decimal form of each input so 0.0057 with a 0.001 step
/// yields exactly 0.005. A non-positive step only floors at zero.
pub fn round_down_step(quantity: f64, step_size: f64) -> f64 {
    let quantity = quantity.max(0.0);
    if step_size <= 0.0 {
        return quantity;
    }
    let exact = to_decimal(quantity)
        .zip(to_decimal(step_size))
        .and_then(|(q, step)| {
            let units = q.checked_div(step)?.trunc();
            units.checked_mul(step)?.to_f64()
        });
    exact.unwrap_or_else(|| (quantity / step_size).floor() * step_size)
}

fn cooldown_active(now: DateTime<Utc>, last_trade_at: Option<DateTime<Utc>>, cooldown: f64) -> bool {
    match last_trade_at {
        Some(last) => {
            let elapsed = (now - last).num_milliseconds() as f64 / 1000.0;
            elapsed < cooldown
        }
        None => false,
    }
}

/// Evaluate the pending signal against balances, filters and limits.
///
/// Checks run in a fixed order and the first failing check names the
/// reject reason.
pub fn evaluate_pending_signal(
    ctx: &RiskContext,
    filters: &SymbolFilters,
    cfg: &RiskConfig,
) -> TradeDecision {
    let side = ctx.pending_signal;
    if !side.is_directional() {
        return TradeDecision::reject(side, RejectReason::Hold);
    }
    if !(ctx.mid > 0.0) {
        return TradeDecision::reject(side, RejectReason::BadMid);
    }

    let target = target_notional(cfg, ctx.imbalance, ctx.threshold);
    if cfg.position_sizing_enabled && !target.is_finite() {
        return TradeDecision::reject(side, RejectReason::InvalidImbalance);
    }
    if cooldown_active(ctx.now, ctx.last_trade_at, cfg.cooldown_seconds) {
        return TradeDecision::reject(side, RejectReason::CooldownActive);
    }
    if cfg.position_sizing_enabled && target < cfg.min_notional_per_trade {
        return TradeDecision::reject(side, RejectReason::NotionalBelowMin);
    }

    match side {
        Signal::Buy => evaluate_buy(ctx, filters, cfg, target),
        _ => evaluate_sell(ctx, filters, target),
    }
}

fn evaluate_buy(
    ctx: &RiskContext,
    filters: &SymbolFilters,
    cfg: &RiskConfig,
    target: f64,
) -> TradeDecision {
    let side = Signal::Buy;
    if target < filters.min_notional {
        return TradeDecision::reject(side, RejectReason::BelowMinNotionalBuy);
    }
    if ctx.position_quote < target {
        return TradeDecision::reject(side, RejectReason::InsufficientUsdt);
    }

    let est_qty = target / ctx.mid;
    if est_qty < filters.min_qty {
        return TradeDecision::reject(side, RejectReason::BelowMinQtyBuy);
    }
    if filters.max_qty > 0.0 && est_qty > filters.max_qty {
        return TradeDecision::reject(side, RejectReason::AboveMaxQtyBuy);
    }
    if ctx.position_base + est_qty > cfg.max_abs_position {
        return TradeDecision::reject(side, RejectReason::MaxAbsPositionExceeded);
    }
    if est_qty <= 0.0 {
        return TradeDecision::reject(side, RejectReason::RoundedToZero);
    }

    TradeDecision::buy(target)
}

fn evaluate_sell(ctx: &RiskContext, filters: &SymbolFilters, target: f64) -> TradeDecision {
    let side = Signal::Sell;
    let available = ctx.position_base.max(0.0);
    if available <= 0.0 {
        return TradeDecision::reject(side, RejectReason::InsufficientBtc);
    }

    let raw_qty = available.min(target / ctx.mid);
    let mut qty = round_down_step(raw_qty, filters.step_size);
    if qty <= 0.0 {
        return TradeDecision::reject(side, RejectReason::RoundedToZero);
    }
    if qty < filters.min_qty {
        return TradeDecision::reject(side, RejectReason::BelowMinQtySell);
    }
    if filters.max_qty > 0.0 && qty > filters.max_qty {
        qty = round_down_step(filters.max_qty, filters.step_size);
        if qty < filters.min_qty {
            return TradeDecision::reject(side, RejectReason::AboveMaxQtySell);
        }
    }
    if qty * ctx.mid < filters.min_notional {
        return TradeDecision::reject(side, RejectReason::BelowMinNotionalSell);
    }

    TradeDecision::sell(qty).with_notional_target(target)
}
