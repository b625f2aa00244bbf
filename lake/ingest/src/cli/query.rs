use clap::{Args, Subcommand};
use dotlake_core::{
    pagination::{DEFAULT_LIMIT, DEFAULT_PAGE_SIZE},
    BlockSearch, EventFilter, ExtrinsicFilter, PageRequest, Partition,
};
use dotlake_storage::{BlockStore, StoreError};
use error_stack::{Result, ResultExt};
use serde::Serialize;

use super::common::{PartitionArgs, StorageArgs};
use crate::error::{IngestError, StoreReportExt};

/// Read the lake and print the result as JSON.
#[derive(Args, Debug)]
pub struct QueryCommand {
    #[clap(flatten)]
    pub partition: PartitionArgs,
    #[clap(flatten)]
    pub storage: StorageArgs,
    #[command(subcommand)]
    pub query: Query,
}

#[derive(Args, Clone, Debug)]
pub struct PageArgs {
    /// One-based page number.
    #[arg(long, default_value = "1")]
    pub page: u32,
    /// Number of items per page.
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: u32,
}

#[derive(Args, Clone, Debug, Default)]
pub struct ExtrinsicFilterArgs {
    /// Only extrinsics of this pallet (case insensitive).
    #[arg(long)]
    pub pallet: Option<String>,
    /// Only extrinsics calling this method (case insensitive).
    #[arg(long)]
    pub method: Option<String>,
    #[arg(long)]
    pub success: Option<bool>,
    #[arg(long)]
    pub pays_fee: Option<bool>,
    /// Only the extrinsic with this id, e.g. `100-1`.
    #[arg(long)]
    pub extrinsic_id: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Query {
    /// Most recent blocks.
    RecentBlocks {
        #[arg(long, default_value_t = DEFAULT_LIMIT)]
        limit: u32,
    },
    /// Block summary by number.
    Block { number: u64 },
    /// Block summary by hash.
    BlockByHash { hash: String },
    /// Blocks matching all the given criteria.
    SearchBlocks {
        #[arg(long)]
        number: Option<u64>,
        #[arg(long)]
        hash: Option<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        finalized: Option<bool>,
        #[arg(long, default_value_t = DEFAULT_LIMIT)]
        limit: u32,
    },
    /// Highest ingested block number.
    Latest,
    /// Events of a block.
    Events {
        number: u64,
        #[arg(long)]
        pallet: Option<String>,
        #[arg(long)]
        method: Option<String>,
        #[arg(long)]
        extrinsic_id: Option<String>,
        #[clap(flatten)]
        page: PageArgs,
    },
    /// Extrinsics of a block.
    Extrinsics {
        number: u64,
        #[clap(flatten)]
        filter: ExtrinsicFilterArgs,
        #[clap(flatten)]
        page: PageArgs,
    },
    /// Most recent extrinsics across blocks.
    RecentExtrinsics {
        #[clap(flatten)]
        filter: ExtrinsicFilterArgs,
        #[arg(long, default_value_t = DEFAULT_LIMIT)]
        limit: u32,
    },
    /// Digest logs of a block.
    Logs { number: u64 },
    /// Extrinsic by transaction hash.
    Extrinsic { hash: String },
}

impl PageArgs {
    fn to_page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.page_size)
    }
}

impl From<ExtrinsicFilterArgs> for ExtrinsicFilter {
    fn from(args: ExtrinsicFilterArgs) -> Self {
        ExtrinsicFilter {
            pallet: args.pallet,
            method: args.method,
            success: args.success,
            pays_fee: args.pays_fee,
            extrinsic_id: args.extrinsic_id,
        }
    }
}

impl QueryCommand {
    pub async fn run(self) -> Result<(), IngestError> {
        let partition = self.partition.to_partition()?;
        let store = self.storage.connect().await?.into_block_store();
        let output = self.query.execute(store.as_ref(), &partition).await?;
        println!("{output}");
        Ok(())
    }
}

impl Query {
    /// Run the query and render its result as pretty JSON.
    pub async fn execute(
        self,
        store: &dyn BlockStore,
        partition: &Partition,
    ) -> Result<String, IngestError> {
        match self {
            Query::RecentBlocks { limit } => {
                render(store.recent_blocks(partition, limit).await)
            }
            Query::Block { number } => render(store.block_by_number(partition, number).await),
            Query::BlockByHash { hash } => render(store.block_by_hash(partition, &hash).await),
            Query::SearchBlocks {
                number,
                hash,
                author,
                finalized,
                limit,
            } => {
                let search = BlockSearch {
                    number,
                    hash,
                    author,
                    finalized,
                };
                render(store.search_blocks(partition, &search, limit).await)
            }
            Query::Latest => render(store.latest_block_number(partition).await),
            Query::Events {
                number,
                pallet,
                method,
                extrinsic_id,
                page,
            } => {
                let filter = EventFilter {
                    pallet,
                    method,
                    extrinsic_id,
                };
                render(
                    store
                        .block_events(partition, number, &filter, page.to_page_request())
                        .await,
                )
            }
            Query::Extrinsics {
                number,
                filter,
                page,
            } => {
                let filter = ExtrinsicFilter::from(filter);
                render(
                    store
                        .block_extrinsics(partition, number, &filter, page.to_page_request())
                        .await,
                )
            }
            Query::RecentExtrinsics { filter, limit } => {
                let filter = ExtrinsicFilter::from(filter);
                render(store.recent_extrinsics(partition, &filter, limit).await)
            }
            Query::Logs { number } => render(store.block_logs(partition, number).await),
            Query::Extrinsic { hash } => render(store.extrinsic_by_hash(partition, &hash).await),
        }
    }
}

fn render<T: Serialize>(
    result: core::result::Result<T, error_stack::Report<StoreError>>,
) -> Result<String, IngestError> {
    let value = result.map_err(|err| err.ingest_error("query failed"))?;
    serde_json::to_string_pretty(&value)
        .change_context(IngestError::Fatal)
        .attach_printable("failed to serialize query result")
}
