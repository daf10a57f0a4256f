//! Trading engine
//!
//! The poll loop, its session summary, and a replay market source

mod poll_loop;
mod replay;
mod summary;

pub use poll_loop::{Pacing, PollOutcome, TradingLoop, CALIBRATION_DISABLED};
pub use replay::ReplayFeed;
pub use summary::SessionSummary;
