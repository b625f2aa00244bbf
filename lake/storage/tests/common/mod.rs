#![allow(dead_code)]

use dotlake_core::{normalize_block, BlockBundle, Partition, RawBlock};
use dotlake_storage::{SqliteSession, Store};
use serde_json::{json, Value};
use testcontainers::{core::WaitFor, GenericImage};

pub fn new_postgres_image() -> GenericImage {
    GenericImage::new("postgres", "15-alpine")
        .with_exposed_port(5432)
        .with_env_var("POSTGRES_DB", "postgres")
        .with_env_var("POSTGRES_HOST_AUTH_METHOD", "trust")
        .with_wait_for(WaitFor::message_on_stderr(
            "database system is ready to accept connections",
        ))
}

pub async fn new_sqlite_store() -> Store<SqliteSession> {
    let store = Store::new(SqliteSession::open_in_memory().unwrap());
    store.initialize().await.unwrap();
    store
}

pub fn partition() -> Partition {
    Partition::new("polkadot", "statemint")
}

pub fn event(pallet: &str, method: &str) -> Value {
    json!({
        "method": { "pallet": pallet, "method": method },
        "data": [pallet, method]
    })
}

pub fn extrinsic(pallet: &str, method: &str, events: Vec<Value>) -> Value {
    json!({
        "method": { "pallet": pallet, "method": method },
        "signature": null,
        "nonce": null,
        "args": {},
        "tip": null,
        "hash": null,
        "info": {},
        "era": { "immortalEra": "0x00" },
        "events": events,
        "success": true,
        "paysFee": false
    })
}

pub fn timestamp_extrinsic(now: i64, events: Vec<Value>) -> Value {
    let mut extrinsic = extrinsic("timestamp", "set", events);
    extrinsic["args"] = json!({ "now": now.to_string() });
    extrinsic
}

pub fn block_hash(number: u64) -> String {
    format!("0x{number:064x}")
}

pub fn raw_block(number: u64, extrinsics: Vec<Value>) -> Value {
    json!({
        "number": number.to_string(),
        "hash": block_hash(number),
        "parentHash": block_hash(number.saturating_sub(1)),
        "stateRoot": "0x5f",
        "extrinsicsRoot": "0x6e",
        "authorId": "5GNJqTPyNqANBkUVMN1LPPrxXnFouWXoe2wNSmmEoLctxiZY",
        "logs": [
            { "type": "PreRuntime", "index": "6", "value": ["0x42414245", "0x01"] },
            { "type": "Seal", "index": "5", "value": ["0x42414245", "0x02"] }
        ],
        "onInitialize": { "events": [] },
        "extrinsics": extrinsics,
        "onFinalize": { "events": [] },
        "finalized": true
    })
}

pub fn bundle(number: u64, raw: Value) -> BlockBundle {
    bundle_in(&partition(), number, raw)
}

pub fn bundle_in(partition: &Partition, number: u64, raw: Value) -> BlockBundle {
    let raw: RawBlock = serde_json::from_value(raw).unwrap();
    normalize_block(number, partition, &raw).unwrap()
}

/// Block 100: a timestamp extrinsic with one event, a transfer without
/// events and one `onInitialize` event.
pub fn scenario_block() -> BlockBundle {
    let mut raw = raw_block(
        100,
        vec![
            timestamp_extrinsic(
                1_590_507_378_000,
                vec![event("system", "ExtrinsicSuccess")],
            ),
            extrinsic("balances", "transferKeepAlive", vec![]),
        ],
    );
    raw["onInitialize"]["events"] = json!([event("paraInclusion", "CandidateIncluded")]);
    raw["extrinsics"][1]["hash"] = json!("0xfeed");
    bundle(100, raw)
}

/// A block with `count` extrinsics, each emitting one `balances.Transfer`
/// and one `system.ExtrinsicSuccess` event.
pub fn transfers_block(number: u64, count: usize) -> BlockBundle {
    let extrinsics = (0..count)
        .map(|i| {
            let mut extrinsic = extrinsic(
                "balances",
                "transfer",
                vec![event("balances", "Transfer"), event("system", "ExtrinsicSuccess")],
            );
            extrinsic["hash"] = json!(format!("0x{number:x}{i:04x}"));
            extrinsic
        })
        .collect();
    bundle(number, raw_block(number, extrinsics))
}
