//! Block model and normalization for the dotlake explorer.
//!
//! A [`RawBlock`] fetched from a [`BlockSource`] is turned into a
//! [`BlockBundle`] by [`normalize_block`]. Bundles are what the storage layer
//! persists and reads back.
mod error;
mod filter;
mod ids;
mod model;
mod normalize;
pub mod pagination;
mod partition;
pub mod raw;
mod source;

pub use self::error::MalformedBlockError;
pub use self::filter::{BlockSearch, EventFilter, ExtrinsicFilter};
pub use self::ids::{EventId, ExtrinsicId, InvalidIdError};
pub use self::model::{
    BlockBundle, BlockSummary, CallMethod, Event, EventSource, Extrinsic,
    InvalidEventSourceError, Log,
};
pub use self::normalize::{extract_timestamp, normalize_block, EventSequence};
pub use self::pagination::{Page, PageRequest};
pub use self::partition::Partition;
pub use self::raw::RawBlock;
pub use self::source::{BlockSource, SourceError};
