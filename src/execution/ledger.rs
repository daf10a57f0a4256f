//! Paper ledger
//!
//! Simulated balances that absorb dry-run fills at the touch, with fees and
//! slippage, and track equity, drawdown and win rate.

use serde::Serialize;
use thiserror::Error;

use super::OrderResult;
use crate::config::PaperConfig;
use crate::risk::TradeDecision;
use crate::signal::Signal;

/// Non-finite ledger state
#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("non-finite mark price: {0}")]
    NonFiniteMid(f64),
    #[error("non-finite equity {equity} at mid {mid}")]
    NonFiniteEquity { equity: f64, mid: f64 },
    #[error("non-finite {side} fill result")]
    NonFiniteTrade { side: Signal },
}

/// Outcome of one simulated fill
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PaperTradeResult {
    pub traded: bool,
    pub side: Option<Signal>,
    pub exec_px: f64,
    /// Base quantity bought or sold
    pub executed_qty: f64,
    /// Quote spent (BUY) or gross proceeds (SELL)
    pub trade_notional: f64,
    pub fee: f64,
    /// Equity change at the current mid
    pub trade_pnl: f64,
}

/// Simulated account
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaperLedger {
    pub quote: f64,
    pub base: f64,
    pub fee_rate: f64,
    pub slippage_bps: f64,
    pub initial_equity: f64,
    pub trade_count: u64,
    pub win_count: u64,
    pub equity_peak: f64,
    pub max_drawdown: f64,
}

fn ensure_finite(values: &[f64], side: Signal) -> Result<(), LedgerError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(LedgerError::NonFiniteTrade { side })
    }
}

impl PaperLedger {
    /// Open a ledger valued at `initial_mid`
    pub fn new(config: &PaperConfig, initial_mid: f64) -> Result<Self, LedgerError> {
        if !initial_mid.is_finite() {
            return Err(LedgerError::NonFiniteMid(initial_mid));
        }
        let initial_equity = config.start_quote + config.start_base * initial_mid;
        if !initial_equity.is_finite() {
            return Err(LedgerError::NonFiniteEquity {
                equity: initial_equity,
                mid: initial_mid,
            });
        }
        Ok(Self {
            quote: config.start_quote,
            base: config.start_base,
            fee_rate: config.fee_rate,
            slippage_bps: config.slippage_bps,
            initial_equity,
            trade_count: 0,
            win_count: 0,
            equity_peak: initial_equity,
            max_drawdown: 0.0,
        })
    }

    fn equity_at(&self, mid: f64) -> f64 {
        self.quote + self.base * mid
    }

    /// Value the ledger at `mid`, returning `(equity, pnl)`.
    ///
    /// Updates the equity peak and the running max drawdown.
    pub fn mark_to_market(&mut self, mid: f64) -> Result<(f64, f64), LedgerError> {
        if !mid.is_finite() {
            return Err(LedgerError::NonFiniteMid(mid));
        }
        let equity = self.equity_at(mid);
        let pnl = equity - self.initial_equity;
        if !equity.is_finite() || !pnl.is_finite() {
            return Err(LedgerError::NonFiniteEquity { equity, mid });
        }

        if equity > self.equity_peak {
            self.equity_peak = equity;
        }
        let drawdown = self.equity_peak - equity;
        if drawdown > self.max_drawdown {
            self.max_drawdown = drawdown;
        }
        Ok((equity, pnl))
    }

    /// Percentage of trades with positive P&L
    pub fn win_rate_pct(&self) -> f64 {
        if self.trade_count == 0 {
            return 0.0;
        }
        self.win_count as f64 / self.trade_count as f64 * 100.0
    }

    fn slip(&self) -> f64 {
        self.slippage_bps.max(0.0) / 10_000.0
    }

    /// Apply a simulated fill at the touch.
    ///
    /// Returns an empty result unless the order was approved on the dry-run
    /// path with a usable book. On error the ledger is left untouched.
    ///
    /// The book checks differ by side on purpose. BUY fills on a locked book
    /// (bid == ask), so a buy at 100/100 marks back to unchanged equity.
    /// SELL requires bid < ask and returns an empty result on a locked book.
    /// `TradingLoop` skips any poll without bid < ask before it gets here, so
    /// only direct callers see the difference.
    pub fn apply_trade(
        &mut self,
        order: &OrderResult,
        decision: &TradeDecision,
        best_bid: f64,
        best_ask: f64,
    ) -> Result<PaperTradeResult, LedgerError> {
        if !order.approved || !order.action.is_simulated() {
            return Ok(PaperTradeResult::default());
        }
        if !(best_bid > 0.0 && best_ask > 0.0) {
            return Ok(PaperTradeResult::default());
        }

        let mid = (best_bid + best_ask) / 2.0;
        match decision.side {
            Signal::Buy if best_bid <= best_ask => {
                self.fill_buy(decision.quote_order_qty, best_ask * (1.0 + self.slip()), mid)
            }
            Signal::Sell if best_bid < best_ask => {
                self.fill_sell(decision.quantity, best_bid * (1.0 - self.slip()), mid)
            }
            _ => Ok(PaperTradeResult::default()),
        }
    }

    fn fill_buy(&mut self, quote_qty: f64, exec_px: f64, mid: f64) -> Result<PaperTradeResult, LedgerError> {
        let side = Signal::Buy;
        let spend = quote_qty.max(0.0).min(self.quote);
        if !(spend > 0.0) || !(exec_px > 0.0) {
            return Ok(PaperTradeResult::default());
        }

        let before = self.equity_at(mid);
        let fee = spend * self.fee_rate;
        let bought = (spend - fee).max(0.0) / exec_px;
        let quote = self.quote - spend;
        let base = self.base + bought;
        let after = quote + base * mid;
        let pnl = after - before;
        ensure_finite(&[fee, bought, quote, base, pnl], side)?;

        self.quote = quote;
        self.base = base;
        self.record_trade(pnl);
        Ok(PaperTradeResult {
            traded: true,
            side: Some(side),
            exec_px,
            executed_qty: bought,
            trade_notional: spend,
            fee,
            trade_pnl: pnl,
        })
    }

    fn fill_sell(&mut self, quantity: f64, exec_px: f64, mid: f64) -> Result<PaperTradeResult, LedgerError> {
        let side = Signal::Sell;
        let qty = quantity.max(0.0).min(self.base);
        if !(qty > 0.0) || !(exec_px > 0.0) {
            return Ok(PaperTradeResult::default());
        }

        let before = self.equity_at(mid);
        let gross = qty * exec_px;
        let fee = gross * self.fee_rate;
        let quote = self.quote + gross - fee;
        let base = self.base - qty;
        let after = quote + base * mid;
        let pnl = after - before;
        ensure_finite(&[gross, fee, quote, base, pnl], side)?;

        self.quote = quote;
        self.base = base;
        self.record_trade(pnl);
        Ok(PaperTradeResult {
            traded: true,
            side: Some(side),
            exec_px,
            executed_qty: qty,
            trade_notional: gross,
            fee,
            trade_pnl: pnl,
        })
    }

    fn record_trade(&mut self, pnl: f64) {
        self.trade_count += 1;
        if pnl > 0.0 {
            self.win_count += 1;
        }
    }
}
