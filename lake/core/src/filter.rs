//! Optional filters of the read operations. `None` fields match everything.
use serde::{Deserialize, Serialize};

/// Filter for the events of one block.
///
/// `pallet` and `method` match exactly, ignoring case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    pub pallet: Option<String>,
    pub method: Option<String>,
    pub extrinsic_id: Option<String>,
}

/// Filter for extrinsics.
///
/// `pallet` and `method` match exactly, ignoring case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtrinsicFilter {
    pub pallet: Option<String>,
    pub method: Option<String>,
    pub success: Option<bool>,
    pub pays_fee: Option<bool>,
    pub extrinsic_id: Option<String>,
}

/// Block search criteria. All set fields must match exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSearch {
    pub number: Option<u64>,
    pub hash: Option<String>,
    pub author: Option<String>,
    pub finalized: Option<bool>,
}

impl EventFilter {
    pub fn with_pallet(mut self, pallet: impl Into<String>) -> Self {
        self.pallet = Some(pallet.into());
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_extrinsic_id(mut self, extrinsic_id: impl Into<String>) -> Self {
        self.extrinsic_id = Some(extrinsic_id.into());
        self
    }
}

impl ExtrinsicFilter {
    pub fn with_pallet(mut self, pallet: impl Into<String>) -> Self {
        self.pallet = Some(pallet.into());
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_success(mut self, success: bool) -> Self {
        self.success = Some(success);
        self
    }

    pub fn with_pays_fee(mut self, pays_fee: bool) -> Self {
        self.pays_fee = Some(pays_fee);
        self
    }

    pub fn with_extrinsic_id(mut self, extrinsic_id: impl Into<String>) -> Self {
        self.extrinsic_id = Some(extrinsic_id.into());
        self
    }
}
