use std::{sync::Arc, time::Duration};

use clap::{Args, ValueEnum};
use dotlake_sidecar::SidecarArgs;
use error_stack::{report, Result, ResultExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::common::{PartitionArgs, StorageArgs};
use crate::error::{IngestError, StoreReportExt};
use crate::ingestor::{IngestReport, Ingestor, IngestorOptions};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngestMode {
    /// Follow the chain head.
    Live,
    /// Ingest a fixed block range.
    Historical,
}

#[derive(Args, Debug)]
pub struct IngestCommand {
    #[clap(flatten)]
    pub partition: PartitionArgs,
    #[clap(flatten)]
    pub storage: StorageArgs,
    #[clap(flatten)]
    pub sidecar: SidecarArgs,
    #[clap(flatten)]
    pub ingestion: IngestionArgs,
}

#[derive(Args, Clone, Debug)]
pub struct IngestionArgs {
    /// Ingestion mode.
    #[arg(long = "mode", env = "DOTLAKE_INGEST_MODE", value_enum, default_value = "live")]
    pub mode: IngestMode,
    /// First block to ingest. In live mode, only used when the lake is empty.
    #[arg(long = "start", env = "DOTLAKE_START_BLOCK")]
    pub start: Option<u64>,
    /// Last block to ingest (inclusive). Required in historical mode.
    #[arg(long = "end", env = "DOTLAKE_END_BLOCK")]
    pub end: Option<u64>,
    /// Number of blocks ingested concurrently.
    #[arg(long = "concurrency", env = "DOTLAKE_CONCURRENCY", default_value = "8")]
    pub concurrency: usize,
    /// Attempts of each fetch and write before giving up.
    #[arg(long = "retries", env = "DOTLAKE_RETRIES", default_value = "8")]
    pub retries: u32,
    /// Head polling interval in live mode, in milliseconds.
    #[arg(
        long = "poll-interval-ms",
        env = "DOTLAKE_POLL_INTERVAL_MS",
        default_value = "6000"
    )]
    pub poll_interval_ms: u64,
    /// Create tables and indexes before ingesting.
    #[arg(long = "init-schema", env = "DOTLAKE_INIT_SCHEMA")]
    pub init_schema: bool,
}

impl IngestionArgs {
    pub fn to_ingestor_options(&self) -> Result<IngestorOptions, IngestError> {
        if self.concurrency == 0 {
            return Err(report!(IngestError::Configuration))
                .attach_printable("concurrency must be at least 1");
        }

        Ok(IngestorOptions {
            concurrency: self.concurrency,
            retries: self.retries.max(1),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            ..IngestorOptions::default()
        })
    }

    /// The inclusive range of historical mode.
    pub fn block_range(&self) -> Result<(u64, u64), IngestError> {
        let (Some(start), Some(end)) = (self.start, self.end) else {
            return Err(report!(IngestError::Configuration))
                .attach_printable("historical mode requires --start and --end");
        };
        if start > end {
            return Err(report!(IngestError::Configuration))
                .attach_printable(format!("start block {start} is after end block {end}"));
        }
        Ok((start, end))
    }
}

impl IngestCommand {
    pub async fn run(self, ct: CancellationToken) -> Result<(), IngestError> {
        let partition = self.partition.to_partition()?;
        let options = self.ingestion.to_ingestor_options()?;
        let source = self
            .sidecar
            .to_sidecar_provider()
            .change_context(IngestError::Configuration)
            .attach_printable("invalid sidecar options")?;

        let storage = self.storage.connect().await?;
        if self.ingestion.init_schema {
            storage
                .initialize()
                .await
                .map_err(|err| err.ingest_error("failed to create schema"))?;
        }

        let ingestor = Ingestor::new(
            Arc::new(source),
            storage.into_block_store(),
            partition,
            options,
        );

        let report = match self.ingestion.mode {
            IngestMode::Historical => {
                let (start, end) = self.ingestion.block_range()?;
                ingestor.run_range(start, end, &ct).await?
            }
            IngestMode::Live => ingestor.run_live(self.ingestion.start, &ct).await?,
        };

        log_report(&report);
        Ok(())
    }
}

fn log_report(report: &IngestReport) {
    if !report.malformed.is_empty() {
        warn!(heights = ?report.malformed, "malformed blocks were skipped");
    }
    info!(
        written = report.written.len(),
        malformed = report.malformed.len(),
        cancelled = report.cancelled,
        "ingestion finished"
    );
}
