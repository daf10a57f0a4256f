//! Session summary and reporting

use serde::Serialize;

use crate::execution::PaperLedger;

/// Totals reported when a session ends
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSummary {
    /// Polls attempted, including failed and skipped ones
    pub polls: u64,
    pub orders_placed: u64,
    pub orders_filled: u64,
    /// Every poll, execution and balance error
    pub errors: u64,
    /// Exchange-balance P&L at the last completed poll
    pub pnl_proxy_end: f64,
    pub pnl_proxy_min: f64,
    pub pnl_proxy_max: f64,
    /// Completed polls that produced a P&L proxy
    pub pnl_samples: u64,
    pub open_orders_canceled: usize,
    pub paper_equity_end: f64,
    pub paper_pnl_end: f64,
    pub paper_trades: u64,
    pub paper_win_rate_pct: f64,
    pub paper_max_drawdown: f64,
}

impl SessionSummary {
    /// Track the P&L proxy of a completed poll
    pub fn observe_pnl_proxy(&mut self, pnl_proxy: f64) {
        if self.pnl_samples == 0 {
            self.pnl_proxy_min = pnl_proxy;
            self.pnl_proxy_max = pnl_proxy;
        } else {
            self.pnl_proxy_min = self.pnl_proxy_min.min(pnl_proxy);
            self.pnl_proxy_max = self.pnl_proxy_max.max(pnl_proxy);
        }
        self.pnl_proxy_end = pnl_proxy;
        self.pnl_samples += 1;
    }

    /// Copy the paper ledger's final statistics
    pub fn absorb_ledger(&mut self, ledger: &PaperLedger) {
        self.paper_trades = ledger.trade_count;
        self.paper_win_rate_pct = ledger.win_rate_pct();
        self.paper_max_drawdown = ledger.max_drawdown;
    }

    /// Format as table for CLI output
    pub fn format_table(&self) -> String {
        format!(
            r#"
══════════════════════════════════════════════════════
               SESSION SUMMARY
══════════════════════════════════════════════════════

ACTIVITY
───────────────────────────────────────────────────────
Polls:            {}
Orders Placed:    {}
Orders Filled:    {}
Errors:           {}
Orders Canceled:  {}

EXCHANGE P&L PROXY
───────────────────────────────────────────────────────
End:              {:+.8}
Min:              {:+.8}
Max:              {:+.8}

PAPER LEDGER
───────────────────────────────────────────────────────
Equity:           {:.8}
P&L:              {:+.8}
Trades:           {}
Win Rate:         {:.1}%
Max Drawdown:     {:.8}
══════════════════════════════════════════════════════
"#,
            self.polls,
            self.orders_placed,
            self.orders_filled,
            self.errors,
            self.open_orders_canceled,
            self.pnl_proxy_end,
            self.pnl_proxy_min,
            self.pnl_proxy_max,
            self.paper_equity_end,
            self.paper_pnl_end,
            self.paper_trades,
            self.paper_win_rate_pct,
            self.paper_max_drawdown,
        )
    }
}
