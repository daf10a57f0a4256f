//! Poll recorder for trade-log capture

use super::parquet::{ParquetWriter, PollRecord};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

/// Configuration for poll recording
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Output directory for Parquet files
    pub output_dir: PathBuf,
    /// Records buffered before each file is written
    pub buffer_size: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./data"),
            buffer_size: 500,
        }
    }
}

impl From<&crate::config::DataConfig> for RecorderConfig {
    fn from(config: &crate::config::DataConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            buffer_size: config.flush_every_n_polls.max(1),
        }
    }
}

/// Recording statistics
#[derive(Debug, Default, Clone)]
pub struct RecorderStats {
    pub records_received: u64,
    pub records_written: u64,
    pub files_written: u64,
    pub last_flush: Option<chrono::DateTime<Utc>>,
}

/// Records poll rows to Parquet files from a background task
pub struct PollRecorder {
    config: RecorderConfig,
    tx: mpsc::Sender<PollRecord>,
    writer_task: JoinHandle<()>,
    stats: Arc<RwLock<RecorderStats>>,
}

impl PollRecorder {
    /// Create a new recorder and spawn its writer task
    pub fn new(config: RecorderConfig) -> Self {
        let (tx, rx) = mpsc::channel(10_000);
        let stats = Arc::new(RwLock::new(RecorderStats::default()));

        let writer = ParquetWriter::new(config.output_dir.clone());
        let task_stats = stats.clone();
        let task_config = config.clone();
        let writer_task = tokio::spawn(async move {
            Self::run_writer(rx, writer, task_config, task_stats).await;
        });

        Self {
            config,
            tx,
            writer_task,
            stats,
        }
    }

    async fn run_writer(
        mut rx: mpsc::Receiver<PollRecord>,
        mut writer: ParquetWriter,
        config: RecorderConfig,
        stats: Arc<RwLock<RecorderStats>>,
    ) {
        let mut buffer: Vec<PollRecord> = Vec::with_capacity(config.buffer_size);

        while let Some(record) = rx.recv().await {
            stats.write().await.records_received += 1;
            buffer.push(record);

            if buffer.len() >= config.buffer_size {
                Self::flush_buffer(&mut buffer, &mut writer, &stats).await;
            }
        }

        // Channel closed, flush remaining and exit
        Self::flush_buffer(&mut buffer, &mut writer, &stats).await;
        tracing::info!("Poll writer shutting down");
    }

    /// Flush the buffer to a new file
    async fn flush_buffer(
        buffer: &mut Vec<PollRecord>,
        writer: &mut ParquetWriter,
        stats: &Arc<RwLock<RecorderStats>>,
    ) {
        if buffer.is_empty() {
            return;
        }

        let now = Utc::now();
        let path = writer.next_path("polls", now);
        let count = buffer.len();

        match writer.write_poll_records(&path, buffer) {
            Ok(()) => {
                let mut s = stats.write().await;
                s.records_written += count as u64;
                s.files_written += 1;
                s.last_flush = Some(now);
                tracing::debug!(count, path = ?path, "Flushed poll records");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to write poll records");
            }
        }

        buffer.clear();
    }

    /// Queue a poll record
    pub async fn record(&self, record: PollRecord) -> anyhow::Result<()> {
        self.tx
            .send(record)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send poll record: {}", e))?;
        Ok(())
    }

    /// Close the channel and wait for the final flush
    pub async fn finish(self) -> anyhow::Result<RecorderStats> {
        drop(self.tx);
        self.writer_task.await?;
        let stats = self.stats.read().await.clone();
        Ok(stats)
    }

    /// Get output directory
    pub fn output_dir(&self) -> &PathBuf {
        &self.config.output_dir
    }

    /// Get current statistics
    pub async fn stats(&self) -> RecorderStats {
        self.stats.read().await.clone()
    }
}
