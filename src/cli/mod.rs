//! CLI interface for imbalance-trader
//!
//! Provides subcommands for:
//! - `run`: Poll the exchange and trade (paper or live)
//! - `replay`: Re-run recorded polls through the loop in paper mode
//! - `config`: Show the effective configuration

mod replay;
mod run;

pub use replay::{OutputFormat, ReplayArgs};
pub use run::RunArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "imbalance-trader")]
#[command(about = "Order-book imbalance trading bot with walk-forward threshold calibration")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll the exchange and trade
    Run(RunArgs),
    /// Replay captured polls in paper mode
    Replay(ReplayArgs),
    /// Show effective configuration
    Config,
}
