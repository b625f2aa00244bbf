mod common;
mod ingest;
mod init;
mod query;

use clap::{Parser, Subcommand};
use error_stack::Result;
use tokio_util::sync::CancellationToken;

use crate::error::IngestError;

pub use self::common::{PartitionArgs, Storage, StorageArgs};
pub use self::ingest::{IngestCommand, IngestMode, IngestionArgs};
pub use self::init::InitCommand;
pub use self::query::{ExtrinsicFilterArgs, PageArgs, Query, QueryCommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the lake tables and indexes.
    Init(InitCommand),
    /// Ingest blocks from the sidecar.
    Ingest(IngestCommand),
    /// Query the lake.
    Query(QueryCommand),
}

impl Cli {
    pub async fn run(self, ct: CancellationToken) -> Result<(), IngestError> {
        match self.command {
            Command::Init(command) => command.run().await,
            Command::Ingest(command) => command.run(ct).await,
            Command::Query(command) => command.run().await,
        }
    }
}
