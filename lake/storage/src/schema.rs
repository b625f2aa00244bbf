//! Tables and indexes of the lake.
//!
//! Every table carries the `(relay_chain, chain)` partition columns. Rows
//! within a block are keyed by integer positions so that ordering is always
//! numeric.
use crate::codec::DocumentCodec;

pub const BLOCKS_TABLE: &str = "blocks";
pub const EXTRINSICS_TABLE: &str = "extrinsics";
pub const EVENTS_TABLE: &str = "events";
pub const LOGS_TABLE: &str = "logs";

/// Tables holding per-block children, cleared before a block is rewritten.
pub const CHILD_TABLES: [&str; 3] = [EXTRINSICS_TABLE, EVENTS_TABLE, LOGS_TABLE];

pub const BLOCK_COLUMNS: &[&str] = &[
    "relay_chain",
    "chain",
    "number",
    "timestamp",
    "hash",
    "parenthash",
    "stateroot",
    "extrinsicsroot",
    "authorid",
    "finalized",
    "extrinsics_count",
    "events_count",
    "logs_count",
];

pub const EXTRINSIC_COLUMNS: &[&str] = &[
    "relay_chain",
    "chain",
    "number",
    "timestamp",
    "hash",
    "ordinal",
    "extrinsic_id",
    "pallet",
    "method",
    "args",
    "info",
    "extrinsic_hash",
    "tip",
    "nonce",
    "signature",
    "era",
    "success",
    "pays_fee",
    "event_count",
];

pub const EVENT_COLUMNS: &[&str] = &[
    "relay_chain",
    "chain",
    "number",
    "timestamp",
    "hash",
    "seq",
    "event_id",
    "extrinsic_id",
    "pallet",
    "method",
    "data",
    "source",
];

pub const LOG_COLUMNS: &[&str] = &[
    "relay_chain",
    "chain",
    "number",
    "timestamp",
    "hash",
    "position",
    "\"type\"",
    "\"index\"",
    "value",
];

/// Idempotent script creating all tables and indexes.
pub fn create_script(codec: DocumentCodec) -> String {
    let document = codec.column_type();
    format!(
        r#"
CREATE TABLE IF NOT EXISTS blocks (
    relay_chain TEXT NOT NULL,
    chain TEXT NOT NULL,
    number BIGINT NOT NULL,
    timestamp BIGINT NOT NULL,
    hash TEXT NOT NULL,
    parenthash TEXT NOT NULL,
    stateroot TEXT NOT NULL,
    extrinsicsroot TEXT NOT NULL,
    authorid TEXT,
    finalized BOOLEAN NOT NULL,
    extrinsics_count BIGINT NOT NULL,
    events_count BIGINT NOT NULL,
    logs_count BIGINT NOT NULL,
    PRIMARY KEY (relay_chain, chain, number)
);
CREATE INDEX IF NOT EXISTS idx_blocks_hash ON blocks (relay_chain, chain, hash);
CREATE INDEX IF NOT EXISTS idx_blocks_author ON blocks (relay_chain, chain, authorid);

CREATE TABLE IF NOT EXISTS extrinsics (
    relay_chain TEXT NOT NULL,
    chain TEXT NOT NULL,
    number BIGINT NOT NULL,
    timestamp BIGINT NOT NULL,
    hash TEXT NOT NULL,
    ordinal INTEGER NOT NULL,
    extrinsic_id TEXT NOT NULL,
    pallet TEXT NOT NULL,
    method TEXT NOT NULL,
    args {document} NOT NULL,
    info {document} NOT NULL,
    extrinsic_hash TEXT,
    tip TEXT,
    nonce TEXT,
    signature {document} NOT NULL,
    era {document} NOT NULL,
    success BOOLEAN NOT NULL,
    pays_fee BOOLEAN NOT NULL,
    event_count BIGINT NOT NULL,
    UNIQUE (relay_chain, chain, number, ordinal)
);
CREATE INDEX IF NOT EXISTS idx_extrinsics_hash ON extrinsics (relay_chain, chain, extrinsic_hash);
CREATE INDEX IF NOT EXISTS idx_extrinsics_call ON extrinsics (relay_chain, chain, pallet, method);

CREATE TABLE IF NOT EXISTS events (
    relay_chain TEXT NOT NULL,
    chain TEXT NOT NULL,
    number BIGINT NOT NULL,
    timestamp BIGINT NOT NULL,
    hash TEXT NOT NULL,
    seq INTEGER NOT NULL,
    event_id TEXT NOT NULL,
    extrinsic_id TEXT,
    pallet TEXT NOT NULL,
    method TEXT NOT NULL,
    data {document} NOT NULL,
    source TEXT NOT NULL CHECK (source IN ('onInitialize', 'onFinalize', 'extrinsic')),
    CHECK ((source = 'extrinsic') = (extrinsic_id IS NOT NULL)),
    UNIQUE (relay_chain, chain, number, seq)
);
CREATE INDEX IF NOT EXISTS idx_events_extrinsic ON events (relay_chain, chain, extrinsic_id);
CREATE INDEX IF NOT EXISTS idx_events_call ON events (relay_chain, chain, pallet, method);

CREATE TABLE IF NOT EXISTS logs (
    relay_chain TEXT NOT NULL,
    chain TEXT NOT NULL,
    number BIGINT NOT NULL,
    timestamp BIGINT NOT NULL,
    hash TEXT NOT NULL,
    position INTEGER NOT NULL,
    "type" TEXT NOT NULL,
    "index" TEXT NOT NULL,
    value {document} NOT NULL,
    UNIQUE (relay_chain, chain, number, position)
);
"#
    )
}
