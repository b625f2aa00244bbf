use std::{fmt, process::ExitCode};

use dotlake_storage::StoreError;
use error_stack::{Context, Report, Result, ResultExt};

/// Ingestion error.
///
/// `Configuration` errors are never retried, `Temporary` errors may succeed
/// if the command is run again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestError {
    /// Invalid options or environment.
    Configuration,
    /// Upstream or storage unavailable, retries exhausted.
    Temporary,
    /// Unrecoverable error.
    Fatal,
}

impl IngestError {
    /// Process exit code, based on sysexits.h.
    pub fn exit_code(&self) -> u8 {
        match self {
            IngestError::Configuration => 78,
            IngestError::Temporary => 75,
            IngestError::Fatal => 1,
        }
    }
}

impl error_stack::Context for IngestError {}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::Configuration => f.write_str("configuration error"),
            IngestError::Temporary => f.write_str("temporary error"),
            IngestError::Fatal => f.write_str("fatal error"),
        }
    }
}

pub trait ReportExt {
    fn to_exit_code(&self) -> ExitCode;
}

impl<T> ReportExt for Result<T, IngestError> {
    fn to_exit_code(&self) -> ExitCode {
        match self {
            Ok(_) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("{:?}", err);
                ExitCode::from(err.current_context().exit_code())
            }
        }
    }
}

pub trait IngestResultExt {
    type Ok;
    fn configuration(self, reason: &str) -> Result<Self::Ok, IngestError>;
    fn temporary(self, reason: &str) -> Result<Self::Ok, IngestError>;
    fn fatal(self, reason: &str) -> Result<Self::Ok, IngestError>;
}

impl<T, C> IngestResultExt for core::result::Result<T, C>
where
    C: Context,
{
    type Ok = T;

    fn configuration(self, reason: &str) -> Result<T, IngestError> {
        self.change_context(IngestError::Configuration)
            .attach_printable(format!("configuration error: {reason}"))
    }

    fn temporary(self, reason: &str) -> Result<T, IngestError> {
        self.change_context(IngestError::Temporary)
            .attach_printable(format!("temporary error: {reason}"))
    }

    fn fatal(self, reason: &str) -> Result<T, IngestError> {
        self.change_context(IngestError::Fatal)
            .attach_printable(format!("fatal error: {reason}"))
    }
}

pub trait StoreReportExt {
    /// Classify a storage error by its retry semantics.
    fn ingest_error(self, reason: &str) -> Report<IngestError>;
}

impl StoreReportExt for Report<StoreError> {
    fn ingest_error(self, reason: &str) -> Report<IngestError> {
        let context = match self.current_context() {
            StoreError::Unavailable => IngestError::Temporary,
            StoreError::Configuration => IngestError::Configuration,
            StoreError::NotFound | StoreError::Rejected | StoreError::Corrupt => IngestError::Fatal,
        };
        self.change_context(context)
            .attach_printable(reason.to_string())
    }
}
