//! Parquet storage for poll records

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, StringArray, TimestampMicrosecondArray,
    UInt64Array,
};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::market::MarketSnapshot;

/// One row of the trade log, written once per poll
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PollRecord {
    pub timestamp: DateTime<Utc>,
    pub bid: f64,
    pub ask: f64,
    pub mid: f64,
    pub spread: f64,
    pub bid_qty: f64,
    pub ask_qty: f64,
    pub imbalance: f64,
    pub depth_update_id: Option<u64>,
    pub threshold: f64,
    pub calibration_state: String,
    pub theta_hat: Option<f64>,
    pub calibration_score: Option<f64>,
    pub calibration_n: Option<u64>,
    pub raw_signal: String,
    pub confirmed_signal: String,
    pub pending_signal: String,
    pub action: String,
    pub approved: bool,
    pub reason: String,
    pub notional_target: f64,
    pub order_id: String,
    pub status: String,
    pub executed_qty: f64,
    pub cummulative_quote_qty: f64,
    pub avg_fill_px: f64,
    pub position_base: f64,
    pub position_quote: f64,
    pub pnl_proxy: f64,
    pub paper_quote: f64,
    pub paper_base: f64,
    pub paper_equity: f64,
    pub paper_pnl: f64,
    pub paper_trade_notional: f64,
    pub paper_fee: f64,
    pub error: String,
}

fn f64_col(records: &[PollRecord], f: impl Fn(&PollRecord) -> f64) -> ArrayRef {
    Arc::new(Float64Array::from_iter_values(records.iter().map(f)))
}

fn opt_f64_col(records: &[PollRecord], f: impl Fn(&PollRecord) -> Option<f64>) -> ArrayRef {
    Arc::new(records.iter().map(f).collect::<Float64Array>())
}

fn opt_u64_col(records: &[PollRecord], f: impl Fn(&PollRecord) -> Option<u64>) -> ArrayRef {
    Arc::new(records.iter().map(f).collect::<UInt64Array>())
}

fn str_col<'a>(records: &'a [PollRecord], f: impl Fn(&'a PollRecord) -> &'a str) -> ArrayRef {
    Arc::new(StringArray::from_iter_values(records.iter().map(f)))
}

/// Build an Arrow batch from poll records
pub fn poll_record_batch(records: &[PollRecord]) -> anyhow::Result<RecordBatch> {
    let timestamps: Vec<i64> = records
        .iter()
        .map(|r| r.timestamp.timestamp_micros())
        .collect();
    let approved: ArrayRef = Arc::new(BooleanArray::from(
        records.iter().map(|r| r.approved).collect::<Vec<_>>(),
    ));

    let batch = RecordBatch::try_from_iter_with_nullable(vec![
        (
            "timestamp",
            Arc::new(TimestampMicrosecondArray::from(timestamps).with_timezone("UTC")) as ArrayRef,
            false,
        ),
        ("bid", f64_col(records, |r| r.bid), false),
        ("ask", f64_col(records, |r| r.ask), false),
        ("mid", f64_col(records, |r| r.mid), false),
        ("spread", f64_col(records, |r| r.spread), false),
        ("bid_qty", f64_col(records, |r| r.bid_qty), false),
        ("ask_qty", f64_col(records, |r| r.ask_qty), false),
        ("imbalance", f64_col(records, |r| r.imbalance), false),
        ("depth_update_id", opt_u64_col(records, |r| r.depth_update_id), true),
        ("threshold", f64_col(records, |r| r.threshold), false),
        ("calibration_state", str_col(records, |r| r.calibration_state.as_str()), false),
        ("theta_hat", opt_f64_col(records, |r| r.theta_hat), true),
        ("calibration_score", opt_f64_col(records, |r| r.calibration_score), true),
        ("calibration_n", opt_u64_col(records, |r| r.calibration_n), true),
        ("raw_signal", str_col(records, |r| r.raw_signal.as_str()), false),
        ("confirmed_signal", str_col(records, |r| r.confirmed_signal.as_str()), false),
        ("pending_signal", str_col(records, |r| r.pending_signal.as_str()), false),
        ("action", str_col(records, |r| r.action.as_str()), false),
        ("approved", approved, false),
        ("reason", str_col(records, |r| r.reason.as_str()), false),
        ("notional_target", f64_col(records, |r| r.notional_target), false),
        ("order_id", str_col(records, |r| r.order_id.as_str()), false),
        ("status", str_col(records, |r| r.status.as_str()), false),
        ("executed_qty", f64_col(records, |r| r.executed_qty), false),
        ("cummulative_quote_qty", f64_col(records, |r| r.cummulative_quote_qty), false),
        ("avg_fill_px", f64_col(records, |r| r.avg_fill_px), false),
        ("position_base", f64_col(records, |r| r.position_base), false),
        ("position_quote", f64_col(records, |r| r.position_quote), false),
        ("pnl_proxy", f64_col(records, |r| r.pnl_proxy), false),
        ("paper_quote", f64_col(records, |r| r.paper_quote), false),
        ("paper_base", f64_col(records, |r| r.paper_base), false),
        ("paper_equity", f64_col(records, |r| r.paper_equity), false),
        ("paper_pnl", f64_col(records, |r| r.paper_pnl), false),
        ("paper_trade_notional", f64_col(records, |r| r.paper_trade_notional), false),
        ("paper_fee", f64_col(records, |r| r.paper_fee), false),
        ("error", str_col(records, |r| r.error.as_str()), false),
    ])?;
    Ok(batch)
}

/// Parquet file writer for poll records
pub struct ParquetWriter {
    output_dir: PathBuf,
    sequence: u64,
}

impl ParquetWriter {
    /// Create a new Parquet writer
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            output_dir,
            sequence: 0,
        }
    }

    /// Ensure output directory exists
    pub fn ensure_dir(&self) -> anyhow::Result<()> {
        fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }

    /// Next file path; names sort chronologically
    pub fn next_path(&mut self, prefix: &str, timestamp: DateTime<Utc>) -> PathBuf {
        let filename = format!(
            "{}_{}_{:05}.parquet",
            prefix,
            timestamp.format("%Y%m%d_%H%M%S"),
            self.sequence
        );
        self.sequence += 1;
        self.output_dir.join(filename)
    }

    /// Write poll records to a Parquet file
    pub fn write_poll_records(&self, path: &Path, records: &[PollRecord]) -> anyhow::Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        self.ensure_dir()?;

        let batch = poll_record_batch(records)?;
        let file = File::create(path)?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();

        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
        writer.write(&batch)?;
        writer.close()?;

        tracing::debug!(path = ?path, count = records.len(), "Wrote poll records to Parquet");

        Ok(())
    }
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> anyhow::Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| anyhow::anyhow!("Invalid {} column", name))
}

/// Reader for recorded poll files
pub struct ParquetReader {
    path: PathBuf,
}

impl ParquetReader {
    /// Create a new reader for a Parquet file
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Parquet files at `path`: the file itself, or a directory's files sorted by name
    pub fn files_in(path: &Path) -> anyhow::Result<Vec<PathBuf>> {
        if path.is_file() {
            return Ok(vec![path.to_path_buf()]);
        }
        let mut files: Vec<PathBuf> = fs::read_dir(path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "parquet"))
            .collect();
        files.sort();
        Ok(files)
    }

    /// Read market snapshots back, skipping rows where the fetch failed
    pub fn read_snapshots(&self) -> anyhow::Result<Vec<MarketSnapshot>> {
        let file = File::open(&self.path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

        let mut snapshots = Vec::new();
        for batch_result in reader {
            let batch = batch_result?;

            let timestamps = column::<TimestampMicrosecondArray>(&batch, "timestamp")?;
            let bids = column::<Float64Array>(&batch, "bid")?;
            let asks = column::<Float64Array>(&batch, "ask")?;
            let bid_qtys = column::<Float64Array>(&batch, "bid_qty")?;
            let ask_qtys = column::<Float64Array>(&batch, "ask_qty")?;
            let update_ids = column::<UInt64Array>(&batch, "depth_update_id")?;
            let actions = column::<StringArray>(&batch, "action")?;

            for i in 0..batch.num_rows() {
                if actions.value(i) == "POLL_ERROR" {
                    continue;
                }
                let timestamp = DateTime::from_timestamp_micros(timestamps.value(i))
                    .ok_or_else(|| anyhow::anyhow!("Invalid timestamp"))?;
                let snapshot = MarketSnapshot::new(
                    timestamp,
                    bids.value(i),
                    asks.value(i),
                    bid_qtys.value(i),
                    ask_qtys.value(i),
                );
                let snapshot = if update_ids.is_null(i) {
                    snapshot
                } else {
                    snapshot.with_depth(bid_qtys.value(i), ask_qtys.value(i), Some(update_ids.value(i)))
                };
                snapshots.push(snapshot);
            }
        }

        Ok(snapshots)
    }

    /// Get the file path
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}
