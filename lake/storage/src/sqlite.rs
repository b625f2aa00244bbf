//! Embedded SQLite session.
//!
//! Documents are always stored as encoded text. Statements run on the
//! blocking thread pool. File databases use WAL with a dedicated read-only
//! connection, so reads proceed while a write batch is open. In-memory
//! databases cannot be shared between connections and run everything on one.
use std::{
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use error_stack::{report, Report, Result, ResultExt};
use rusqlite::{
    params_from_iter,
    types::{Value as SqliteValue, ValueRef},
    Connection, ErrorCode, OpenFlags, TransactionBehavior,
};
use tracing::{debug, info};

use crate::codec::{encode_text, DocumentCodec};
use crate::error::StoreError;
use crate::session::SqlSession;
use crate::sql::{Cell, Dialect, Record, SqlQuery, SqlValue};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct SqliteSession {
    writer: Arc<Mutex<Connection>>,
    reader: Arc<Mutex<Connection>>,
}

impl SqliteSession {
    /// Open (or create) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening sqlite database");
        let connection = Connection::open(path)
            .sqlite_error()
            .attach_printable_lazy(|| format!("failed to open {}", path.display()))?;
        connection
            .execute_batch(
                "PRAGMA journal_mode=WAL;
                 PRAGMA synchronous=NORMAL;",
            )
            .sqlite_error()
            .attach_printable("failed to configure sqlite")?;
        let writer = with_busy_timeout(connection)?;

        let reader = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .sqlite_error()
        .attach_printable_lazy(|| format!("failed to open {} for reading", path.display()))?;
        let reader = with_busy_timeout(reader)?;

        Ok(Self {
            writer: Arc::new(Mutex::new(writer)),
            reader: Arc::new(Mutex::new(reader)),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let connection = Connection::open_in_memory()
            .sqlite_error()
            .attach_printable("failed to open in-memory database")?;
        Self::from_connection(connection)
    }

    /// Use `connection` for both reads and writes.
    pub fn from_connection(connection: Connection) -> Result<Self, StoreError> {
        let connection = Arc::new(Mutex::new(with_busy_timeout(connection)?));
        Ok(Self {
            writer: connection.clone(),
            reader: connection,
        })
    }

    async fn read<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        run(self.reader.clone(), f).await
    }

    async fn write<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        run(self.writer.clone(), f).await
    }
}

fn with_busy_timeout(connection: Connection) -> Result<Connection, StoreError> {
    connection
        .busy_timeout(BUSY_TIMEOUT)
        .sqlite_error()
        .attach_printable("failed to set busy timeout")?;
    Ok(connection)
}

async fn run<T, F>(connection: Arc<Mutex<Connection>>, f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut connection = connection.lock().map_err(|_| {
            report!(StoreError::Unavailable).attach_printable("sqlite connection poisoned")
        })?;
        f(&mut connection)
    })
    .await
    .change_context(StoreError::Unavailable)
    .attach_printable("sqlite task failed")?
}

#[async_trait]
impl SqlSession for SqliteSession {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn codec(&self) -> DocumentCodec {
        DocumentCodec::EncodedText
    }

    async fn fetch(&self, query: SqlQuery) -> Result<Vec<Record>, StoreError> {
        self.read(move |connection| {
            let mut statement = connection
                .prepare(&query.sql)
                .sqlite_error()
                .attach_printable_lazy(|| format!("failed to prepare: {}", query.sql))?;
            let columns = statement
                .column_names()
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>();

            let mut rows = statement
                .query(params_from_iter(to_sqlite_params(&query.params)))
                .sqlite_error()
                .attach_printable_lazy(|| format!("query failed: {}", query.sql))?;

            let mut records = Vec::new();
            while let Some(row) = rows.next().sqlite_error()? {
                let mut record = Record::with_capacity(columns.len());
                for (idx, column) in columns.iter().enumerate() {
                    let value = row.get_ref(idx).sqlite_error()?;
                    record.push(column.as_str(), cell_from_value(column, value)?);
                }
                records.push(record);
            }
            Ok(records)
        })
        .await
    }

    async fn execute_atomically(
        &self,
        lease: &str,
        statements: Vec<SqlQuery>,
    ) -> Result<Vec<u64>, StoreError> {
        let lease = lease.to_string();
        self.write(move |connection| {
            // IMMEDIATE takes the database write lock up front, serializing
            // writers of the same block.
            let transaction = connection
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .sqlite_error()
                .attach_printable("failed to start transaction")?;

            let mut affected = Vec::with_capacity(statements.len());
            for statement in &statements {
                let rows = transaction
                    .execute(
                        &statement.sql,
                        params_from_iter(to_sqlite_params(&statement.params)),
                    )
                    .sqlite_error()
                    .attach_printable_lazy(|| format!("statement failed: {}", statement.sql))?;
                affected.push(rows as u64);
            }

            transaction
                .commit()
                .sqlite_error()
                .attach_printable("failed to commit transaction")?;
            debug!(lease = %lease, statements = affected.len(), "transaction committed");
            Ok(affected)
        })
        .await
    }

    async fn execute_script(&self, script: &str) -> Result<(), StoreError> {
        let script = script.to_string();
        self.write(move |connection| {
            connection
                .execute_batch(&script)
                .sqlite_error()
                .attach_printable("failed to run script")
        })
        .await
    }
}

fn to_sqlite_params(params: &[SqlValue]) -> Vec<SqliteValue> {
    params
        .iter()
        .map(|value| match value {
            SqlValue::Text(text) => SqliteValue::Text(text.clone()),
            SqlValue::OptionalText(Some(text)) => SqliteValue::Text(text.clone()),
            SqlValue::OptionalText(None) => SqliteValue::Null,
            SqlValue::BigInt(value) => SqliteValue::Integer(*value),
            SqlValue::Int(value) => SqliteValue::Integer((*value).into()),
            SqlValue::Bool(value) => SqliteValue::Integer((*value).into()),
            SqlValue::Document(document) => SqliteValue::Text(encode_text(document)),
        })
        .collect()
}

fn cell_from_value(column: &str, value: ValueRef<'_>) -> Result<Cell, StoreError> {
    match value {
        ValueRef::Null => Ok(Cell::Null),
        ValueRef::Integer(value) => Ok(Cell::Int(value)),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .map(|text| Cell::Text(text.to_string()))
            .change_context(StoreError::Corrupt)
            .attach_printable_lazy(|| format!("column {column} is not valid utf-8")),
        ValueRef::Real(_) | ValueRef::Blob(_) => {
            Err(report!(StoreError::Corrupt).attach_printable(format!(
                "unexpected {:?} value in column {column}",
                value.data_type()
            )))
        }
    }
}

/// Busy and locked databases are worth retrying, any other failure is not.
fn classify(err: &rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(failure, _)
            if matches!(failure.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) =>
        {
            StoreError::Unavailable
        }
        _ => StoreError::Rejected,
    }
}

trait SqliteResultExt<T> {
    fn sqlite_error(self) -> Result<T, StoreError>;
}

impl<T> SqliteResultExt<T> for std::result::Result<T, rusqlite::Error> {
    fn sqlite_error(self) -> Result<T, StoreError> {
        self.map_err(|err| {
            let context = classify(&err);
            Report::new(err).change_context(context)
        })
    }
}
