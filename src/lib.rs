//! imbalance-trader: order-book imbalance trading bot for Binance spot
//!
//! This library provides the core components for:
//! - Top-of-book and depth snapshots from Binance REST
//! - Imbalance signals with M-of-K confirmation
//! - Walk-forward threshold calibration
//! - Risk evaluation against exchange filters and balances
//! - Dry-run and live order execution
//! - A paper ledger with fees, slippage and drawdown
//! - Data capture to Parquet and offline replay
//! - Structured logging and Prometheus metrics

pub mod calibration;
pub mod cli;
pub mod config;
pub mod data;
pub mod engine;
pub mod exchange;
pub mod execution;
pub mod market;
pub mod risk;
pub mod signal;
pub mod telemetry;
