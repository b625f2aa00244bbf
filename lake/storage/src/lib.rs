//! Persistence and queries of normalized blocks.
//!
//! A [`Store`] wraps a [`SqlSession`] (postgres or sqlite) and implements both
//! the write path ([`BlockWriter`]) and the read path ([`BlockQuery`]).
mod codec;
mod error;
pub mod postgres;
mod query;
pub mod schema;
mod session;
pub mod sql;
mod sqlite;
mod writer;

use async_trait::async_trait;
use dotlake_core::{
    BlockBundle, BlockSearch, BlockSummary, Event, EventFilter, Extrinsic, ExtrinsicFilter, Log,
    Page, PageRequest, Partition,
};
use error_stack::Result;
use tracing::info;

pub use self::codec::{decode_text, encode_text, DocumentCodec, InvalidCodecError};
pub use self::error::StoreError;
pub use self::postgres::{PostgresConfiguration, PostgresOptions, PostgresSession};
pub use self::session::SqlSession;
pub use self::sqlite::SqliteSession;
pub use self::writer::WriteSummary;

/// Persists normalized blocks.
#[async_trait]
pub trait BlockWriter: Send + Sync {
    /// Atomically persist the block summary and all its children.
    ///
    /// Writing a block that already exists replaces it.
    async fn write_bundle(&self, bundle: &BlockBundle) -> Result<WriteSummary, StoreError>;
}

/// Read operations of the explorer.
///
/// Every operation is scoped to one partition.
#[async_trait]
pub trait BlockQuery: Send + Sync {
    /// Most recent blocks, number descending.
    async fn recent_blocks(
        &self,
        partition: &Partition,
        limit: u32,
    ) -> Result<Vec<BlockSummary>, StoreError>;

    async fn block_by_number(
        &self,
        partition: &Partition,
        number: u64,
    ) -> Result<BlockSummary, StoreError>;

    async fn block_by_hash(
        &self,
        partition: &Partition,
        hash: &str,
    ) -> Result<BlockSummary, StoreError>;

    /// Blocks matching all the set fields of `search`, number descending.
    async fn search_blocks(
        &self,
        partition: &Partition,
        search: &BlockSearch,
        limit: u32,
    ) -> Result<Vec<BlockSummary>, StoreError>;

    /// Highest persisted block number, if any.
    async fn latest_block_number(&self, partition: &Partition) -> Result<Option<u64>, StoreError>;

    /// Events of a block in sequence order.
    async fn block_events(
        &self,
        partition: &Partition,
        number: u64,
        filter: &EventFilter,
        page: PageRequest,
    ) -> Result<Page<Event>, StoreError>;

    /// Extrinsics of a block in ordinal order.
    async fn block_extrinsics(
        &self,
        partition: &Partition,
        number: u64,
        filter: &ExtrinsicFilter,
        page: PageRequest,
    ) -> Result<Page<Extrinsic>, StoreError>;

    /// Most recent extrinsics, ordered by block number then ordinal, both
    /// descending.
    async fn recent_extrinsics(
        &self,
        partition: &Partition,
        filter: &ExtrinsicFilter,
        limit: u32,
    ) -> Result<Vec<Extrinsic>, StoreError>;

    /// Digest logs of a block in position order.
    async fn block_logs(&self, partition: &Partition, number: u64)
        -> Result<Vec<Log>, StoreError>;

    /// Extrinsic with the given transaction hash. If the same hash appears
    /// in more than one block, the most recent one is returned.
    async fn extrinsic_by_hash(
        &self,
        partition: &Partition,
        hash: &str,
    ) -> Result<Extrinsic, StoreError>;
}

/// A store that can both write and read blocks.
pub trait BlockStore: BlockWriter + BlockQuery {}

impl<T> BlockStore for T where T: BlockWriter + BlockQuery {}

/// Block store backed by a SQL session.
pub struct Store<S> {
    session: S,
}

impl<S: SqlSession> Store<S> {
    pub fn new(session: S) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    /// Create tables and indexes if they don't exist.
    pub async fn initialize(&self) -> Result<(), StoreError> {
        let codec = self.session.codec();
        info!(dialect = ?self.session.dialect(), codec = %codec, "initializing schema");
        self.session
            .execute_script(&schema::create_script(codec))
            .await
    }
}
