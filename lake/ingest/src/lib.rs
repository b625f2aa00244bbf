//! Ingestion driver and command line interface of dotlake.
pub mod cli;
mod error;
mod ingestor;

pub use self::error::{IngestError, IngestResultExt, ReportExt, StoreReportExt};
pub use self::ingestor::{HeightOutcome, IngestReport, Ingestor, IngestorOptions};
