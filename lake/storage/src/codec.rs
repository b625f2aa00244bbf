//! Reading and writing document (JSON) columns.
//!
//! Some deployments store documents in a native JSON column and get
//! structured values back, others store encoded text that must be parsed on
//! read. The choice is made once when the session is created.
use std::{fmt, str::FromStr};

use error_stack::{report, Result};
use serde_json::{json, Value};
use tracing::warn;

use crate::error::StoreError;
use crate::sql::Cell;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DocumentCodec {
    /// Native JSON columns (postgres `JSONB`).
    #[default]
    Structured,
    /// JSON encoded as text.
    EncodedText,
}

impl DocumentCodec {
    /// SQL type of document columns.
    pub fn column_type(&self) -> &'static str {
        match self {
            DocumentCodec::Structured => "JSONB",
            DocumentCodec::EncodedText => "TEXT",
        }
    }

    /// Decode the document stored in `column`.
    pub fn decode(&self, column: &str, cell: &Cell) -> Result<Value, StoreError> {
        match (self, cell) {
            (_, Cell::Null) => Ok(Value::Null),
            (DocumentCodec::Structured, Cell::Document(value)) => Ok(value.clone()),
            (DocumentCodec::EncodedText, Cell::Text(text)) => Ok(decode_text(column, text)),
            (codec, cell) => Err(report!(StoreError::Corrupt)
                .attach_printable(format!("column {column} does not match the {codec} codec"))
                .attach_printable(format!("cell: {cell:?}"))),
        }
    }
}

/// Parse a text-encoded document.
///
/// Text that is not valid JSON is kept as `{"raw": text}`.
pub fn decode_text(column: &str, text: &str) -> Value {
    match serde_json::from_str(text) {
        Ok(value) => value,
        Err(err) => {
            warn!(column, err = ?err, "failed to decode document column");
            json!({ "raw": text })
        }
    }
}

pub fn encode_text(value: &Value) -> String {
    value.to_string()
}

impl fmt::Display for DocumentCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentCodec::Structured => f.write_str("structured"),
            DocumentCodec::EncodedText => f.write_str("text"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidCodecError(String);

impl FromStr for DocumentCodec {
    type Err = InvalidCodecError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "structured" | "jsonb" | "json" => Ok(DocumentCodec::Structured),
            "text" | "encoded-text" => Ok(DocumentCodec::EncodedText),
            _ => Err(InvalidCodecError(s.to_string())),
        }
    }
}

impl fmt::Display for InvalidCodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown document codec {:?}, expected structured or text", self.0)
    }
}

impl std::error::Error for InvalidCodecError {}
