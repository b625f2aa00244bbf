use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::partition::Partition;

/// Pallet and call (or event) name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallMethod {
    pub pallet: String,
    pub method: String,
}

/// Where an event was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventSource {
    #[serde(rename = "onInitialize")]
    OnInitialize,
    #[serde(rename = "onFinalize")]
    OnFinalize,
    #[serde(rename = "extrinsic")]
    Extrinsic,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockSummary {
    pub relay_chain: String,
    pub chain: String,
    pub number: String,
    pub hash: String,
    pub parent_hash: String,
    pub state_root: String,
    pub extrinsics_root: String,
    pub author_id: Option<String>,
    pub finalized: bool,
    /// Milliseconds since epoch, `0` when the block has no timestamp call.
    pub timestamp: i64,
    pub extrinsics_count: u32,
    pub events_count: u32,
    pub logs_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Extrinsic {
    pub number: String,
    pub block_hash: String,
    pub timestamp: i64,
    pub extrinsic_id: String,
    pub ordinal: u32,
    pub method: CallMethod,
    pub args: Value,
    pub info: Value,
    /// Chain-level transaction hash.
    pub extrinsic_hash: Option<String>,
    pub tip: Option<String>,
    pub nonce: Option<String>,
    pub signature: Value,
    pub era: Value,
    pub success: bool,
    pub pays_fee: bool,
    pub event_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub number: String,
    pub block_hash: String,
    pub timestamp: i64,
    pub event_id: String,
    pub seq: u32,
    /// Set if and only if `source` is [`EventSource::Extrinsic`].
    pub extrinsic_id: Option<String>,
    pub method: CallMethod,
    pub data: Value,
    pub source: EventSource,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Log {
    pub number: String,
    pub block_hash: String,
    pub timestamp: i64,
    /// Position of the log in the block digest.
    pub position: u32,
    #[serde(rename = "type")]
    pub log_type: String,
    pub index: String,
    pub value: Value,
}

/// Everything the normalizer produces for one block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockBundle {
    pub summary: BlockSummary,
    pub extrinsics: Vec<Extrinsic>,
    pub events: Vec<Event>,
    pub logs: Vec<Log>,
}

impl BlockBundle {
    pub fn partition(&self) -> Partition {
        Partition::new(&self.summary.relay_chain, &self.summary.chain)
    }

    pub fn number(&self) -> &str {
        &self.summary.number
    }
}

impl EventSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSource::OnInitialize => "onInitialize",
            EventSource::OnFinalize => "onFinalize",
            EventSource::Extrinsic => "extrinsic",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidEventSourceError(String);

impl FromStr for EventSource {
    type Err = InvalidEventSourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "onInitialize" => Ok(EventSource::OnInitialize),
            "onFinalize" => Ok(EventSource::OnFinalize),
            "extrinsic" => Ok(EventSource::Extrinsic),
            other => Err(InvalidEventSourceError(other.to_string())),
        }
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for InvalidEventSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid event source: {:?}", self.0)
    }
}

impl std::error::Error for InvalidEventSourceError {}
