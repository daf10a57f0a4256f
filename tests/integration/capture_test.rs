//! Integration tests for poll capture and replay

use clap::Parser;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_test::assert_ok;

use imbalance_trader::cli::{Cli, Commands, ReplayArgs};
use imbalance_trader::data::{ParquetReader, PollRecorder, RecorderConfig};
use imbalance_trader::engine::{Pacing, ReplayFeed, TradingLoop};
use imbalance_trader::execution::DryRunGateway;
use imbalance_trader::market::Balances;

use crate::support::{book, filters, test_config, ScriptedSource, Step};

async fn capture(dir: &TempDir) {
    let mut config = test_config();
    config.runtime.max_polls = 5;
    let source = Arc::new(ScriptedSource::new(
        vec![
            book(0, 100.0, 101.0, 9.0, 1.0),
            Step::HttpError(503),
            book(2, 100.0, 101.0, 1.0, 1.0),
            book(3, 100.0, 101.0, 1.0, 9.0),
            book(4, 100.0, 101.0, 1.0, 1.0),
        ],
        Balances {
            base: 0.0,
            quote: 1000.0,
        },
    ));
    let recorder = PollRecorder::new(RecorderConfig {
        output_dir: dir.path().to_path_buf(),
        buffer_size: 2,
    });

    let summary = assert_ok!(
        TradingLoop::new(config, source, Arc::new(DryRunGateway::new()))
            .with_recorder(recorder)
            .with_pacing(Pacing::Replay)
            .run()
            .await
    );
    assert_eq!(summary.polls, 5);
    assert_eq!(summary.errors, 1);
}

fn replay_args(dir: &TempDir) -> ReplayArgs {
    let path = dir.path().to_string_lossy().to_string();
    let cli = Cli::parse_from(["imbalance-trader", "replay", path.as_str(), "--threshold", "0.1"]);
    match cli.command {
        Commands::Replay(args) => args,
        other => panic!("unexpected command {:?}", other),
    }
}

#[tokio::test]
async fn test_captured_polls_written_to_parquet() {
    let dir = TempDir::new().unwrap();
    capture(&dir).await;

    let files = ParquetReader::files_in(dir.path()).unwrap();
    assert_eq!(files.len(), 3);

    let feed = ReplayFeed::from_parquet(dir.path(), filters(), Balances::default()).unwrap();
    assert_eq!(feed.remaining().await, 4);
}

#[tokio::test]
async fn test_replay_recomputes_session() {
    let dir = TempDir::new().unwrap();
    capture(&dir).await;

    let mut config = test_config();
    config.paper.start_base = 0.0;
    config.paper.start_quote = 1000.0;
    let summary = assert_ok!(replay_args(&dir).replay(config).await);

    assert_eq!(summary.polls, 4);
    assert_eq!(summary.errors, 0);
    assert_eq!(summary.paper_trades, 1);
}

#[tokio::test]
async fn test_replay_empty_directory_fails() {
    let dir = TempDir::new().unwrap();
    let result = replay_args(&dir).replay(test_config()).await;
    assert!(result.is_err());
}
