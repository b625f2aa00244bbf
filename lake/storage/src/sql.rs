//! Backend-neutral statements and rows.
use error_stack::{report, Result, ResultExt};
use serde_json::Value;

use crate::codec::DocumentCodec;
use crate::error::StoreError;

/// SQL flavour spoken by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Placeholder for the one-based parameter `index`.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Sqlite => format!("?{index}"),
        }
    }
}

/// A statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    OptionalText(Option<String>),
    BigInt(i64),
    Int(i32),
    Bool(bool),
    /// A document column, encoded by the session's [`DocumentCodec`].
    Document(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// Builds a [`SqlQuery`], numbering placeholders as parameters are bound.
#[derive(Debug)]
pub struct SqlBuilder {
    dialect: Dialect,
    sql: String,
    params: Vec<SqlValue>,
}

impl SqlBuilder {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sql: String::new(),
            params: Vec::new(),
        }
    }

    pub fn push(&mut self, fragment: &str) -> &mut Self {
        self.sql.push_str(fragment);
        self
    }

    /// Append a placeholder for `value`.
    pub fn bind(&mut self, value: impl Into<SqlValue>) -> &mut Self {
        self.params.push(value.into());
        let placeholder = self.dialect.placeholder(self.params.len());
        self.sql.push_str(&placeholder);
        self
    }

    /// Append a comma separated list of placeholders, one per value.
    pub fn bind_list(&mut self, values: impl IntoIterator<Item = SqlValue>) -> &mut Self {
        for (i, value) in values.into_iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.bind(value);
        }
        self
    }

    pub fn build(self) -> SqlQuery {
        SqlQuery {
            sql: self.sql,
            params: self.params,
        }
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<&String> for SqlValue {
    fn from(value: &String) -> Self {
        SqlValue::Text(value.clone())
    }
}

impl From<Option<String>> for SqlValue {
    fn from(value: Option<String>) -> Self {
        SqlValue::OptionalText(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::BigInt(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<Value> for SqlValue {
    fn from(value: Value) -> Self {
        SqlValue::Document(value)
    }
}

/// A column value read back from the database.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Int(i64),
    Bool(bool),
    Text(String),
    Document(Value),
}

/// A row, addressed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    cells: Vec<(String, Cell)>,
}

impl Record {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cells: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, column: impl Into<String>, cell: Cell) {
        self.cells.push((column.into(), cell));
    }

    pub fn cell(&self, column: &str) -> Result<&Cell, StoreError> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, cell)| cell)
            .ok_or_else(|| {
                report!(StoreError::Corrupt).attach_printable(format!("missing column {column}"))
            })
    }

    pub fn text(&self, column: &str) -> Result<String, StoreError> {
        match self.cell(column)? {
            Cell::Text(text) => Ok(text.clone()),
            cell => Err(unexpected(column, "text", cell)),
        }
    }

    pub fn optional_text(&self, column: &str) -> Result<Option<String>, StoreError> {
        match self.cell(column)? {
            Cell::Null => Ok(None),
            Cell::Text(text) => Ok(Some(text.clone())),
            cell => Err(unexpected(column, "text or null", cell)),
        }
    }

    pub fn int(&self, column: &str) -> Result<i64, StoreError> {
        match self.cell(column)? {
            Cell::Int(value) => Ok(*value),
            cell => Err(unexpected(column, "integer", cell)),
        }
    }

    pub fn optional_int(&self, column: &str) -> Result<Option<i64>, StoreError> {
        match self.cell(column)? {
            Cell::Null => Ok(None),
            Cell::Int(value) => Ok(Some(*value)),
            cell => Err(unexpected(column, "integer or null", cell)),
        }
    }

    pub fn u32(&self, column: &str) -> Result<u32, StoreError> {
        let value = self.int(column)?;
        u32::try_from(value)
            .change_context(StoreError::Corrupt)
            .attach_printable_lazy(|| format!("column {column} out of range: {value}"))
    }

    pub fn u64(&self, column: &str) -> Result<u64, StoreError> {
        let value = self.int(column)?;
        u64::try_from(value)
            .change_context(StoreError::Corrupt)
            .attach_printable_lazy(|| format!("column {column} out of range: {value}"))
    }

    /// Booleans are stored as integers by sqlite.
    pub fn bool(&self, column: &str) -> Result<bool, StoreError> {
        match self.cell(column)? {
            Cell::Bool(value) => Ok(*value),
            Cell::Int(0) => Ok(false),
            Cell::Int(1) => Ok(true),
            cell => Err(unexpected(column, "boolean", cell)),
        }
    }

    pub fn document(&self, column: &str, codec: DocumentCodec) -> Result<Value, StoreError> {
        codec.decode(column, self.cell(column)?)
    }
}

fn unexpected(column: &str, expected: &str, cell: &Cell) -> error_stack::Report<StoreError> {
    report!(StoreError::Corrupt)
        .attach_printable(format!("column {column}: expected {expected}, got {cell:?}"))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::{Cell, Dialect, Record, SqlBuilder, SqlValue};
    use crate::error::StoreError;

    #[test]
    pub fn test_builder_numbers_placeholders() {
        let mut builder = SqlBuilder::new(Dialect::Postgres);
        builder
            .push("SELECT * FROM blocks WHERE relay_chain = ")
            .bind("polkadot")
            .push(" AND number = ")
            .bind(7i64);
        let query = builder.build();
        assert_eq!(
            query.sql,
            "SELECT * FROM blocks WHERE relay_chain = $1 AND number = $2"
        );
        assert_eq!(
            query.params,
            vec![SqlValue::Text("polkadot".to_string()), SqlValue::BigInt(7)]
        );

        let mut builder = SqlBuilder::new(Dialect::Sqlite);
        builder
            .push("VALUES (")
            .bind_list([SqlValue::Int(1), SqlValue::Bool(true), json!({}).into()])
            .push(")");
        assert_eq!(builder.build().sql, "VALUES (?1, ?2, ?3)");
    }

    #[test]
    pub fn test_record_accessors() {
        let mut record = Record::with_capacity(4);
        record.push("number", Cell::Int(7));
        record.push("finalized", Cell::Int(1));
        record.push("authorid", Cell::Null);
        record.push("hash", Cell::Text("0xaa".to_string()));

        assert_eq!(record.u64("number").unwrap(), 7);
        assert!(record.bool("finalized").unwrap());
        assert_eq!(record.optional_text("authorid").unwrap(), None);
        assert_eq!(record.text("hash").unwrap(), "0xaa");

        let err = record.text("number").unwrap_err();
        assert_matches!(err.current_context(), StoreError::Corrupt);
        let err = record.text("missing").unwrap_err();
        assert_matches!(err.current_context(), StoreError::Corrupt);
    }

    #[test]
    pub fn test_negative_count_is_corrupt() {
        let mut record = Record::default();
        record.push("events_count", Cell::Int(-1));
        let err = record.u32("events_count").unwrap_err();
        assert_matches!(err.current_context(), StoreError::Corrupt);
    }
}
