use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use assert_matches::assert_matches;
use async_trait::async_trait;
use dotlake_core::{BlockSource, Partition, RawBlock, SourceError};
use dotlake_ingest::{HeightOutcome, IngestError, Ingestor, IngestorOptions};
use dotlake_storage::{BlockQuery, BlockStore, BlockWriter, SqliteSession, Store, StoreError};
use error_stack::{report, Result};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct MockSource {
    blocks: HashMap<u64, RawBlock>,
    head: AtomicU64,
    /// Remaining `Unavailable` answers per height.
    failures: Mutex<HashMap<u64, u32>>,
    /// Heights answered with an invalid response.
    invalid: HashSet<u64>,
}

#[async_trait]
impl BlockSource for MockSource {
    async fn fetch_block(&self, number: u64) -> Result<RawBlock, SourceError> {
        if self.invalid.contains(&number) {
            return Err(report!(SourceError::InvalidResponse));
        }

        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(&number) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(report!(SourceError::Unavailable));
                }
            }
        }

        self.blocks
            .get(&number)
            .cloned()
            .ok_or_else(|| report!(SourceError::NotFound))
    }

    async fn head_number(&self) -> Result<u64, SourceError> {
        Ok(self.head.load(Ordering::SeqCst))
    }
}

impl MockSource {
    fn with_blocks(numbers: impl IntoIterator<Item = u64>) -> Self {
        let blocks = numbers
            .into_iter()
            .map(|number| (number, raw_block(number)))
            .collect::<HashMap<_, _>>();
        let head = blocks.keys().max().copied().unwrap_or_default();
        MockSource {
            blocks,
            head: AtomicU64::new(head),
            ..MockSource::default()
        }
    }

    fn fail(self, number: u64, times: u32) -> Self {
        self.failures.lock().unwrap().insert(number, times);
        self
    }
}

fn partition() -> Partition {
    Partition::new("polkadot", "statemint")
}

fn raw_block_value(number: u64) -> Value {
    json!({
        "number": number.to_string(),
        "hash": format!("0x{number:064x}"),
        "parentHash": format!("0x{:064x}", number.saturating_sub(1)),
        "stateRoot": "0x5f",
        "extrinsicsRoot": "0x6e",
        "authorId": null,
        "logs": [],
        "onInitialize": { "events": [] },
        "extrinsics": [{
            "method": { "pallet": "timestamp", "method": "set" },
            "signature": null,
            "nonce": null,
            "args": { "now": (1_600_000_000_000u64 + number * 6_000).to_string() },
            "tip": null,
            "hash": null,
            "info": {},
            "era": { "immortalEra": "0x00" },
            "events": [{
                "method": { "pallet": "system", "method": "ExtrinsicSuccess" },
                "data": []
            }],
            "success": true,
            "paysFee": false
        }],
        "onFinalize": { "events": [] },
        "finalized": true
    })
}

fn raw_block(number: u64) -> RawBlock {
    serde_json::from_value(raw_block_value(number)).unwrap()
}

fn options() -> IngestorOptions {
    IngestorOptions {
        concurrency: 4,
        retries: 3,
        min_retry_delay: Duration::from_millis(1),
        max_retry_delay: Duration::from_millis(5),
        poll_interval: Duration::from_millis(10),
        live_batch_size: 2,
    }
}

async fn new_store() -> Arc<Store<SqliteSession>> {
    let store = Store::new(SqliteSession::open_in_memory().unwrap());
    store.initialize().await.unwrap();
    Arc::new(store)
}

fn ingestor(source: MockSource, store: Arc<Store<SqliteSession>>) -> Ingestor {
    let store: Arc<dyn BlockStore> = store;
    Ingestor::new(Arc::new(source), store, partition(), options())
}

#[tokio::test]
async fn test_ingest_range() {
    let store = new_store().await;
    let ingestor = ingestor(MockSource::with_blocks(1..=5), store.clone());
    let ct = CancellationToken::new();

    let report = ingestor.run_range(1, 5, &ct).await.unwrap();
    assert_eq!(report.written, vec![1, 2, 3, 4, 5]);
    assert!(report.malformed.is_empty());
    assert!(!report.cancelled);

    assert_eq!(store.latest_block_number(&partition()).await.unwrap(), Some(5));
    let block = store.block_by_number(&partition(), 3).await.unwrap();
    assert_eq!(block.timestamp, 1_600_000_018_000);
    assert_eq!(block.events_count, 1);
}

#[tokio::test]
async fn test_reingest_range_is_idempotent() {
    let store = new_store().await;
    let ingestor = ingestor(MockSource::with_blocks(1..=3), store.clone());
    let ct = CancellationToken::new();

    ingestor.run_range(1, 3, &ct).await.unwrap();
    let report = ingestor.run_range(1, 3, &ct).await.unwrap();
    assert_eq!(report.written, vec![1, 2, 3]);

    let recent = store.recent_blocks(&partition(), 10).await.unwrap();
    assert_eq!(recent.len(), 3);
}

#[tokio::test]
async fn test_malformed_block_is_skipped() {
    let mut source = MockSource::with_blocks(1..=4);
    let mut malformed = raw_block_value(3);
    malformed["extrinsics"][0]["success"] = json!("yes");
    source
        .blocks
        .insert(3, serde_json::from_value(malformed).unwrap());

    let store = new_store().await;
    let ingestor = ingestor(source, store.clone());
    let ct = CancellationToken::new();

    let report = ingestor.run_range(1, 4, &ct).await.unwrap();
    assert_eq!(report.written, vec![1, 2, 4]);
    assert_eq!(report.malformed, vec![3]);

    let err = store.block_by_number(&partition(), 3).await.unwrap_err();
    assert_matches!(err.current_context(), StoreError::NotFound);
}

#[tokio::test]
async fn test_height_mismatch_is_malformed() {
    let mut source = MockSource::with_blocks(1..=2);
    source.blocks.insert(2, raw_block(1));

    let ingestor = ingestor(source, new_store().await);
    let ct = CancellationToken::new();

    let outcome = ingestor.ingest_height(2, &ct).await.unwrap();
    assert_matches!(outcome, HeightOutcome::Malformed(_));
}

#[tokio::test]
async fn test_transient_errors_are_retried() {
    let store = new_store().await;
    let source = MockSource::with_blocks(1..=2).fail(2, 1);
    let ingestor = ingestor(source, store.clone());
    let ct = CancellationToken::new();

    let report = ingestor.run_range(1, 2, &ct).await.unwrap();
    assert_eq!(report.written, vec![1, 2]);
}

#[tokio::test]
async fn test_exhausted_retries_are_temporary() {
    let source = MockSource::with_blocks(1..=2).fail(2, 100);
    let ingestor = ingestor(source, new_store().await);
    let ct = CancellationToken::new();

    let err = ingestor.run_range(1, 2, &ct).await.unwrap_err();
    assert_matches!(err.current_context(), IngestError::Temporary);
}

#[tokio::test]
async fn test_invalid_response_is_fatal() {
    let mut source = MockSource::with_blocks(1..=2);
    source.invalid.insert(2);
    let ingestor = ingestor(source, new_store().await);
    let ct = CancellationToken::new();

    let err = ingestor.run_range(1, 2, &ct).await.unwrap_err();
    assert_matches!(err.current_context(), IngestError::Fatal);
}

#[tokio::test]
async fn test_invalid_range() {
    let ingestor = ingestor(MockSource::with_blocks(1..=2), new_store().await);
    let ct = CancellationToken::new();

    let err = ingestor.run_range(5, 1, &ct).await.unwrap_err();
    assert_matches!(err.current_context(), IngestError::Configuration);
}

#[tokio::test]
async fn test_cancelled_range_writes_nothing() {
    let store = new_store().await;
    let ingestor = ingestor(MockSource::with_blocks(1..=5), store.clone());
    let ct = CancellationToken::new();
    ct.cancel();

    let report = ingestor.run_range(1, 5, &ct).await.unwrap();
    assert!(report.cancelled);
    assert!(report.written.is_empty());
    assert_eq!(store.latest_block_number(&partition()).await.unwrap(), None);
}

#[tokio::test]
async fn test_live_resumes_after_latest_block() {
    let store = new_store().await;
    let source = MockSource::with_blocks(1..=5);

    // Blocks 1 and 2 were ingested by a previous run.
    for number in 1..=2 {
        let bundle = dotlake_core::normalize_block(number, &partition(), &raw_block(number)).unwrap();
        store.write_bundle(&bundle).await.unwrap();
    }

    let ingestor = ingestor(source, store.clone());
    let ct = CancellationToken::new();

    let watcher = async {
        for _ in 0..500 {
            if store.latest_block_number(&partition()).await.unwrap() == Some(5) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        ct.cancel();
    };

    let (report, _) = tokio::join!(ingestor.run_live(None, &ct), watcher);
    let report = report.unwrap();

    assert_eq!(report.written, vec![3, 4, 5]);
    assert!(report.cancelled);
}

#[tokio::test]
async fn test_live_starts_at_requested_height_on_empty_lake() {
    let store = new_store().await;
    let ingestor = ingestor(MockSource::with_blocks(1..=4), store.clone());
    let ct = CancellationToken::new();

    let watcher = async {
        for _ in 0..500 {
            if store.latest_block_number(&partition()).await.unwrap() == Some(4) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        ct.cancel();
    };

    let (report, _) = tokio::join!(ingestor.run_live(Some(3), &ct), watcher);
    let report = report.unwrap();

    assert_eq!(report.written, vec![3, 4]);
    let err = store.block_by_number(&partition(), 1).await.unwrap_err();
    assert_matches!(err.current_context(), StoreError::NotFound);
}
