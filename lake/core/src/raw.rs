//! Block document as returned by the substrate sidecar `/blocks/{number}`.
//!
//! Flags that must be booleans are kept as raw JSON values so that the
//! normalizer can reject the whole block instead of failing deserialization
//! of a single field.
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBlock {
    #[serde(deserialize_with = "scalar_string")]
    pub number: String,
    pub hash: String,
    pub parent_hash: String,
    pub state_root: String,
    pub extrinsics_root: String,
    #[serde(default, deserialize_with = "optional_scalar_string")]
    pub author_id: Option<String>,
    #[serde(default)]
    pub finalized: Value,
    #[serde(default)]
    pub logs: Vec<RawLog>,
    #[serde(default)]
    pub on_initialize: RawHook,
    #[serde(default)]
    pub on_finalize: RawHook,
    #[serde(default)]
    pub extrinsics: Vec<RawExtrinsic>,
}

/// Events emitted outside of any extrinsic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawHook {
    #[serde(default)]
    pub events: Vec<RawEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMethod {
    pub pallet: String,
    pub method: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawExtrinsic {
    pub method: RawMethod,
    #[serde(default)]
    pub args: Value,
    #[serde(default)]
    pub info: Value,
    #[serde(default, deserialize_with = "optional_scalar_string")]
    pub hash: Option<String>,
    #[serde(default, deserialize_with = "optional_scalar_string")]
    pub tip: Option<String>,
    #[serde(default, deserialize_with = "optional_scalar_string")]
    pub nonce: Option<String>,
    #[serde(default)]
    pub signature: Value,
    #[serde(default)]
    pub era: Value,
    #[serde(default)]
    pub success: Value,
    #[serde(default)]
    pub pays_fee: Value,
    #[serde(default)]
    pub events: Vec<RawEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub method: RawMethod,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLog {
    #[serde(rename = "type")]
    pub log_type: String,
    #[serde(deserialize_with = "scalar_string")]
    pub index: String,
    #[serde(default)]
    pub value: Value,
}

/// The sidecar encodes most integers as strings, but older versions (and
/// hand-written fixtures) use plain numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(Number),
}

impl From<Scalar> for String {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Text(text) => text,
            Scalar::Number(number) => number.to_string(),
        }
    }
}

fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Scalar::deserialize(deserializer).map(String::from)
}

fn optional_scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Scalar>::deserialize(deserializer).map(|value| value.map(String::from))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::RawBlock;

    #[test]
    pub fn test_deserialize_sidecar_block() {
        let block = json!({
            "number": "7",
            "hash": "0xaa",
            "parentHash": "0xbb",
            "stateRoot": "0xcc",
            "extrinsicsRoot": "0xdd",
            "authorId": "5Grw",
            "logs": [{ "type": "PreRuntime", "index": 6, "value": ["0x01", "0x02"] }],
            "onInitialize": { "events": [] },
            "extrinsics": [{
                "method": { "pallet": "timestamp", "method": "set" },
                "signature": null,
                "nonce": null,
                "args": { "now": "1590507378000" },
                "tip": 0,
                "hash": "0xee",
                "info": {},
                "era": { "immortalEra": "0x00" },
                "events": [],
                "success": true,
                "paysFee": false
            }],
            "onFinalize": { "events": [] },
            "finalized": true
        });

        let block: RawBlock = serde_json::from_value(block).unwrap();
        assert_eq!(block.number, "7");
        assert_eq!(block.author_id.as_deref(), Some("5Grw"));
        assert_eq!(block.logs[0].index, "6");
        assert_eq!(block.extrinsics[0].tip.as_deref(), Some("0"));
        assert_eq!(block.extrinsics[0].nonce, None);
        assert_eq!(block.extrinsics[0].pays_fee, json!(false));
    }

    #[test]
    pub fn test_deserialize_missing_hooks() {
        let block = json!({
            "number": 0,
            "hash": "0xaa",
            "parentHash": "0x00",
            "stateRoot": "0xcc",
            "extrinsicsRoot": "0xdd",
            "finalized": true
        });

        let block: RawBlock = serde_json::from_value(block).unwrap();
        assert_eq!(block.number, "0");
        assert!(block.author_id.is_none());
        assert!(block.on_initialize.events.is_empty());
        assert!(block.on_finalize.events.is_empty());
        assert!(block.extrinsics.is_empty());
    }
}
