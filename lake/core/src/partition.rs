use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical namespace of one indexed network.
///
/// Every stored row carries both labels and every query binds them as
/// parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Partition {
    pub relay_chain: String,
    pub chain: String,
}

impl Partition {
    pub fn new(relay_chain: impl Into<String>, chain: impl Into<String>) -> Self {
        Self {
            relay_chain: relay_chain.into(),
            chain: chain.into(),
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.relay_chain, self.chain)
    }
}
