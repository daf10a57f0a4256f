//! Data capture module
//!
//! Stores per-poll trade-log rows to Parquet for replay and analysis

mod parquet;
mod recorder;

pub use parquet::{poll_record_batch, ParquetReader, ParquetWriter, PollRecord};
pub use recorder::{PollRecorder, RecorderConfig, RecorderStats};
