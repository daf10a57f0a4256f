//! Integration tests for imbalance-trader

mod capture_test;
mod config_test;
mod engine_test;
mod support;
