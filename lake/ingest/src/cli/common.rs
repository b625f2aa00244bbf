use std::{path::PathBuf, sync::Arc};

use clap::Args;
use dotlake_core::Partition;
use dotlake_storage::{
    BlockStore, PostgresOptions, PostgresSession, SqliteSession, Store, StoreError,
};
use error_stack::{report, Result, ResultExt};

use crate::error::{IngestError, StoreReportExt};

#[derive(Args, Clone, Debug)]
pub struct PartitionArgs {
    /// Relay chain the blocks belong to, e.g. `polkadot`.
    #[arg(long = "relay-chain", env = "DOTLAKE_RELAY_CHAIN")]
    pub relay_chain: String,
    /// Chain (parachain or relay chain) name, e.g. `statemint`.
    #[arg(long = "chain", env = "DOTLAKE_CHAIN")]
    pub chain: String,
}

impl PartitionArgs {
    pub fn to_partition(&self) -> Result<Partition, IngestError> {
        if self.relay_chain.trim().is_empty() || self.chain.trim().is_empty() {
            return Err(report!(IngestError::Configuration))
                .attach_printable("relay chain and chain must not be empty");
        }
        Ok(Partition::new(self.relay_chain.trim(), self.chain.trim()))
    }
}

#[derive(Args, Clone, Debug, Default)]
pub struct StorageArgs {
    #[clap(flatten)]
    pub postgres: PostgresOptions,
    /// Path to a SQLite database, used instead of PostgreSQL.
    #[arg(long = "sqlite.path", env = "DOTLAKE_SQLITE_PATH")]
    pub sqlite_path: Option<PathBuf>,
}

/// A connected storage backend.
pub enum Storage {
    Postgres(Store<PostgresSession>),
    Sqlite(Store<SqliteSession>),
}

impl StorageArgs {
    pub async fn connect(self) -> Result<Storage, IngestError> {
        match (self.sqlite_path, self.postgres.is_configured()) {
            (Some(_), true) => Err(report!(IngestError::Configuration))
                .attach_printable("both a postgres connection string and a sqlite path are set"),
            (None, false) => Err(report!(IngestError::Configuration))
                .attach_printable("missing storage: set a postgres connection string or a sqlite path"),
            (Some(path), false) => {
                let session = SqliteSession::open(&path)
                    .map_err(|err| err.ingest_error("failed to open sqlite database"))?;
                Ok(Storage::Sqlite(Store::new(session)))
            }
            (None, true) => {
                let config = self
                    .postgres
                    .to_postgres_configuration()
                    .map_err(|err| err.ingest_error("invalid postgres options"))?;
                let session = PostgresSession::connect(&config)
                    .await
                    .map_err(|err| err.ingest_error("failed to connect to postgres"))?;
                Ok(Storage::Postgres(Store::new(session)))
            }
        }
    }
}

impl Storage {
    pub async fn initialize(&self) -> Result<(), StoreError> {
        match self {
            Storage::Postgres(store) => store.initialize().await,
            Storage::Sqlite(store) => store.initialize().await,
        }
    }

    pub fn into_block_store(self) -> Arc<dyn BlockStore> {
        match self {
            Storage::Postgres(store) => Arc::new(store),
            Storage::Sqlite(store) => Arc::new(store),
        }
    }
}
