use std::process::ExitCode;

use clap::Parser;
use dotlake_ingest::{cli::Cli, IngestError, IngestResultExt, ReportExt};
use dotlake_observability::init_tracing;
use error_stack::{Result, ResultExt};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let args = Cli::parse();
    run_with_args(args).await.to_exit_code()
}

async fn run_with_args(args: Cli) -> Result<(), IngestError> {
    init_tracing()
        .change_context(IngestError::Configuration)
        .attach_printable("failed to initialize logging")?;

    let ct = CancellationToken::new();

    ctrlc::set_handler({
        let ct = ct.clone();
        move || {
            info!("SIGINT received");
            ct.cancel();
        }
    })
    .configuration("failed to set SIGINT handler")?;

    args.run(ct).await
}
