use clap::Args;
use error_stack::Result;
use tracing::info;

use super::common::StorageArgs;
use crate::error::{IngestError, StoreReportExt};

#[derive(Args, Debug)]
pub struct InitCommand {
    #[clap(flatten)]
    pub storage: StorageArgs,
}

impl InitCommand {
    pub async fn run(self) -> Result<(), IngestError> {
        let storage = self.storage.connect().await?;
        storage
            .initialize()
            .await
            .map_err(|err| err.ingest_error("failed to create schema"))?;
        info!("schema initialized");
        Ok(())
    }
}
