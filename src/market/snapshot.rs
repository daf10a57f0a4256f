//! Market snapshot and book math

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Normalized order-flow imbalance `(bid - ask) / (bid + ask)`.
///
/// Returns 0 when there is no resting quantity on either side.
pub fn imbalance_ratio(bid_qty: f64, ask_qty: f64) -> f64 {
    let denom = bid_qty + ask_qty;
    if denom <= 0.0 {
        return 0.0;
    }
    (bid_qty - ask_qty) / denom
}

/// Mid price, or 0 when either side is missing
pub fn safe_mid(best_bid: f64, best_ask: f64) -> f64 {
    if best_bid <= 0.0 || best_ask <= 0.0 {
        return 0.0;
    }
    (best_bid + best_ask) / 2.0
}

/// Sum the quantities of the first `levels` price levels on each side
pub fn depth_qty_sums(bids: &[(f64, f64)], asks: &[(f64, f64)], levels: usize) -> (f64, f64) {
    let bid_sum = bids.iter().take(levels).map(|(_, qty)| qty).sum();
    let ask_sum = asks.iter().take(levels).map(|(_, qty)| qty).sum();
    (bid_sum, ask_sum)
}

/// One poll's view of the book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Local time the snapshot was taken
    pub timestamp: DateTime<Utc>,
    /// Best bid price
    pub bid: f64,
    /// Best ask price
    pub ask: f64,
    /// Mid price (0 when the book is one-sided)
    pub mid: f64,
    /// Bid quantity (top of book or depth aggregate)
    pub bid_qty: f64,
    /// Ask quantity (top of book or depth aggregate)
    pub ask_qty: f64,
    /// Imbalance in [-1, 1]
    pub imbalance: f64,
    /// Depth snapshot sequence when depth was used
    pub depth_update_id: Option<u64>,
}

impl MarketSnapshot {
    /// Build a snapshot from prices and quantities, deriving mid and imbalance
    pub fn new(timestamp: DateTime<Utc>, bid: f64, ask: f64, bid_qty: f64, ask_qty: f64) -> Self {
        Self {
            timestamp,
            bid,
            ask,
            mid: safe_mid(bid, ask),
            bid_qty,
            ask_qty,
            imbalance: imbalance_ratio(bid_qty, ask_qty),
            depth_update_id: None,
        }
    }

    /// Replace quantities with depth aggregates and recompute imbalance
    pub fn with_depth(mut self, bid_qty: f64, ask_qty: f64, update_id: Option<u64>) -> Self {
        self.bid_qty = bid_qty;
        self.ask_qty = ask_qty;
        self.imbalance = imbalance_ratio(bid_qty, ask_qty);
        self.depth_update_id = update_id;
        self
    }

    /// Ask minus bid
    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }

    /// Both sides present and not crossed
    pub fn is_valid_top_of_book(&self) -> bool {
        self.bid > 0.0 && self.ask > 0.0 && self.bid < self.ask
    }
}
