//! Drives blocks from a [`BlockSource`] into a [`BlockStore`].
use std::{future::Future, sync::Arc, time::Duration};

use dotlake_core::{normalize_block, BlockSource, MalformedBlockError, Partition, SourceError};
use dotlake_storage::{BlockStore, StoreError, WriteSummary};
use error_stack::{report, Context, Report, Result, ResultExt};
use exponential_backoff::Backoff;
use futures::{stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{IngestError, StoreReportExt};

#[derive(Debug, Clone)]
pub struct IngestorOptions {
    /// Number of heights processed concurrently.
    pub concurrency: usize,
    /// Attempts of each fetch and write before giving up.
    pub retries: u32,
    pub min_retry_delay: Duration,
    pub max_retry_delay: Duration,
    /// How often the chain head is polled in live mode.
    pub poll_interval: Duration,
    /// Maximum number of heights ingested per live iteration.
    pub live_batch_size: u64,
}

/// What happened to a single height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeightOutcome {
    Written(WriteSummary),
    /// The block failed validation and was not written.
    Malformed(MalformedBlockError),
    Cancelled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Heights written, ascending.
    pub written: Vec<u64>,
    /// Heights skipped because the block was malformed, ascending.
    pub malformed: Vec<u64>,
    /// Whether ingestion stopped because it was cancelled.
    pub cancelled: bool,
}

pub struct Ingestor {
    source: Arc<dyn BlockSource>,
    store: Arc<dyn BlockStore>,
    partition: Partition,
    options: IngestorOptions,
}

impl Ingestor {
    pub fn new(
        source: Arc<dyn BlockSource>,
        store: Arc<dyn BlockStore>,
        partition: Partition,
        options: IngestorOptions,
    ) -> Self {
        Self {
            source,
            store,
            partition,
            options,
        }
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// Fetch, normalize and write one height.
    ///
    /// Transient fetch and write failures are retried. Malformed blocks are
    /// reported in the outcome and never written.
    #[tracing::instrument(name = "ingest_height", skip(self, ct), fields(partition = %self.partition))]
    pub async fn ingest_height(
        &self,
        number: u64,
        ct: &CancellationToken,
    ) -> Result<HeightOutcome, IngestError> {
        let fetched = self
            .retry(ct, |err: &SourceError| err.is_transient(), || {
                self.source.fetch_block(number)
            })
            .await
            .attach_printable_lazy(|| format!("failed to fetch block {number}"))?;

        let Some(raw) = fetched else {
            return Ok(HeightOutcome::Cancelled);
        };

        let bundle = match normalize_block(number, &self.partition, &raw) {
            Ok(bundle) => bundle,
            Err(err) => {
                error!(number, err = ?err, "malformed block, skipping");
                return Ok(HeightOutcome::Malformed(*err.current_context()));
            }
        };

        // Writes are not interrupted once started.
        if ct.is_cancelled() {
            return Ok(HeightOutcome::Cancelled);
        }

        let written = self
            .retry(ct, |err: &StoreError| err.is_transient(), || {
                self.store.write_bundle(&bundle)
            })
            .await
            .attach_printable_lazy(|| format!("failed to write block {number}"))?;

        match written {
            None => Ok(HeightOutcome::Cancelled),
            Some(summary) => {
                info!(
                    number,
                    extrinsics = summary.extrinsics,
                    events = summary.events,
                    logs = summary.logs,
                    "block ingested"
                );
                Ok(HeightOutcome::Written(summary))
            }
        }
    }

    /// Ingest the inclusive range `[start, end]`.
    pub async fn run_range(
        &self,
        start: u64,
        end: u64,
        ct: &CancellationToken,
    ) -> Result<IngestReport, IngestError> {
        if start > end {
            return Err(report!(IngestError::Configuration))
                .attach_printable(format!("invalid block range {start}..={end}"));
        }

        info!(start, end, partition = %self.partition, "ingesting block range");

        let mut outcomes = stream::iter(start..=end)
            .map(|number| async move { (number, self.ingest_height(number, ct).await) })
            .buffer_unordered(self.options.concurrency.max(1));

        let mut report = IngestReport::default();
        while let Some((number, outcome)) = outcomes.next().await {
            match outcome? {
                HeightOutcome::Written(_) => report.written.push(number),
                HeightOutcome::Malformed(_) => report.malformed.push(number),
                HeightOutcome::Cancelled => report.cancelled = true,
            }
        }

        report.written.sort_unstable();
        report.malformed.sort_unstable();
        Ok(report)
    }

    /// Follow the chain head until cancelled.
    ///
    /// Starts after the highest persisted height, or at `start` if nothing
    /// was ingested yet.
    pub async fn run_live(
        &self,
        start: Option<u64>,
        ct: &CancellationToken,
    ) -> Result<IngestReport, IngestError> {
        let latest = self
            .store
            .latest_block_number(&self.partition)
            .await
            .map_err(|err| err.ingest_error("failed to read latest block number"))?;

        let mut next = match (latest, start) {
            (Some(latest), Some(start)) => (latest + 1).max(start),
            (Some(latest), None) => latest + 1,
            (None, start) => start.unwrap_or(0),
        };

        info!(next, partition = %self.partition, "following chain head");

        let mut report = IngestReport::default();
        loop {
            let head = self
                .retry(ct, |err: &SourceError| err.is_transient(), || {
                    self.source.head_number()
                })
                .await
                .attach_printable("failed to fetch chain head")?;

            let Some(head) = head else {
                report.cancelled = true;
                break;
            };

            if head >= next {
                let end = head.min(next + self.options.live_batch_size.max(1) - 1);
                let batch = self.run_range(next, end, ct).await?;
                let cancelled = batch.cancelled;
                report.extend(batch);
                if cancelled {
                    break;
                }
                next = end + 1;
                continue;
            }

            debug!(head, next, "waiting for new blocks");
            tokio::select! {
                _ = tokio::time::sleep(self.options.poll_interval) => {}
                _ = ct.cancelled() => {
                    report.cancelled = true;
                    break;
                }
            }
        }

        Ok(report)
    }

    /// Run `attempt` until it succeeds, fails with a permanent error, or the
    /// backoff is exhausted. Returns `None` if cancelled while waiting.
    async fn retry<T, C, F, Fut>(
        &self,
        ct: &CancellationToken,
        is_transient: impl Fn(&C) -> bool,
        mut attempt: F,
    ) -> Result<Option<T>, IngestError>
    where
        C: Context,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, C>>,
    {
        let backoff = Backoff::new(
            self.options.retries.max(1),
            self.options.min_retry_delay,
            Some(self.options.max_retry_delay),
        );

        let mut last_error: Option<Report<C>> = None;
        for duration in &backoff {
            if ct.is_cancelled() {
                return Ok(None);
            }

            match attempt().await {
                Ok(value) => return Ok(Some(value)),
                Err(err) if !is_transient(err.current_context()) => {
                    return Err(err.change_context(IngestError::Fatal));
                }
                Err(err) => {
                    warn!(err = ?err, retry_in = ?duration, "attempt failed");
                    last_error = Some(err);
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(duration) => {}
                _ = ct.cancelled() => return Ok(None),
            }
        }

        match last_error {
            Some(err) => Err(err
                .change_context(IngestError::Temporary)
                .attach_printable("retries exhausted")),
            None => Err(report!(IngestError::Temporary).attach_printable("retries exhausted")),
        }
    }
}

impl IngestReport {
    pub fn extend(&mut self, other: IngestReport) {
        self.written.extend(other.written);
        self.malformed.extend(other.malformed);
        self.cancelled |= other.cancelled;
    }
}

impl Default for IngestorOptions {
    fn default() -> Self {
        Self {
            concurrency: 8,
            retries: 8,
            min_retry_delay: Duration::from_millis(500),
            max_retry_delay: Duration::from_secs(60),
            poll_interval: Duration::from_secs(6),
            live_batch_size: 100,
        }
    }
}
