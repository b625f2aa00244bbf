use std::fmt;

use async_trait::async_trait;
use error_stack::Result;

use crate::raw::RawBlock;

/// Upstream provider of block documents.
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Fetch the block document at `number`.
    async fn fetch_block(&self, number: u64) -> Result<RawBlock, SourceError>;

    /// Height of the current chain head.
    async fn head_number(&self) -> Result<u64, SourceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceError {
    /// The block is not (yet) available upstream.
    NotFound,
    /// The source could not be reached or failed to answer.
    Unavailable,
    /// The source answered with something that is not a block document.
    InvalidResponse,
}

impl SourceError {
    /// Whether the same request may succeed later.
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::NotFound | SourceError::Unavailable)
    }
}

impl error_stack::Context for SourceError {}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::NotFound => f.write_str("block not found upstream"),
            SourceError::Unavailable => f.write_str("block source unavailable"),
            SourceError::InvalidResponse => f.write_str("invalid response from block source"),
        }
    }
}
