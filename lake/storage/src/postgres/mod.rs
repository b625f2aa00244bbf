//! Postgres session.
//!
//! Reads go through a shared client while writes are funneled through a
//! dedicated connection, one transaction at a time.
mod configuration;

use async_trait::async_trait;
use error_stack::{Result, ResultExt};
use native_tls::{Certificate, TlsConnector};
use postgres_native_tls::MakeTlsConnector;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_postgres::types::{Json, ToSql, Type};
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, info};

use crate::codec::{encode_text, DocumentCodec};
use crate::error::StoreError;
use crate::session::SqlSession;
use crate::sql::{Cell, Dialect, Record, SqlQuery, SqlValue};

pub use self::configuration::{PostgresConfiguration, PostgresOptions, TlsConfiguration};

pub struct PostgresSession {
    reader: Client,
    writer: Mutex<Client>,
    codec: DocumentCodec,
}

type BoxedParam = Box<dyn ToSql + Sync + Send>;

impl PostgresSession {
    /// Open the reader and writer connections.
    pub async fn connect(config: &PostgresConfiguration) -> Result<Self, StoreError> {
        info!(codec = %config.codec, "connecting to postgres");
        let reader = connect_client(config).await?;
        let writer = connect_client(config).await?;
        info!("postgres clients connected successfully");
        Ok(Self::from_clients(reader, writer, config.codec))
    }

    pub fn from_clients(reader: Client, writer: Client, codec: DocumentCodec) -> Self {
        Self {
            reader,
            writer: Mutex::new(writer),
            codec,
        }
    }

    fn params(&self, params: &[SqlValue]) -> Vec<BoxedParam> {
        params
            .iter()
            .map(|value| -> BoxedParam {
                match value {
                    SqlValue::Text(text) => Box::new(text.clone()),
                    SqlValue::OptionalText(text) => Box::new(text.clone()),
                    SqlValue::BigInt(value) => Box::new(*value),
                    SqlValue::Int(value) => Box::new(*value),
                    SqlValue::Bool(value) => Box::new(*value),
                    SqlValue::Document(document) => match self.codec {
                        DocumentCodec::Structured => Box::new(Json(document.clone())),
                        DocumentCodec::EncodedText => Box::new(encode_text(document)),
                    },
                }
            })
            .collect()
    }
}

fn as_refs(params: &[BoxedParam]) -> Vec<&(dyn ToSql + Sync)> {
    params
        .iter()
        .map(|param| param.as_ref() as &(dyn ToSql + Sync))
        .collect()
}

#[async_trait]
impl SqlSession for PostgresSession {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn codec(&self) -> DocumentCodec {
        self.codec
    }

    async fn fetch(&self, query: SqlQuery) -> Result<Vec<Record>, StoreError> {
        let params = self.params(&query.params);
        let rows = self
            .reader
            .query(query.sql.as_str(), &as_refs(&params))
            .await
            .store_error()
            .attach_printable_lazy(|| format!("query failed: {}", query.sql))?;
        rows.iter().map(record_from_row).collect()
    }

    async fn execute_atomically(
        &self,
        lease: &str,
        statements: Vec<SqlQuery>,
    ) -> Result<Vec<u64>, StoreError> {
        let mut writer = self.writer.lock().await;
        let transaction = writer
            .transaction()
            .await
            .store_error()
            .attach_printable("failed to start transaction")?;

        // Held until the transaction ends.
        transaction
            .execute("SELECT pg_advisory_xact_lock(hashtext($1)::bigint)", &[&lease])
            .await
            .store_error()
            .attach_printable_lazy(|| format!("failed to acquire write lease {lease}"))?;

        let mut affected = Vec::with_capacity(statements.len());
        for statement in &statements {
            let params = self.params(&statement.params);
            let rows = transaction
                .execute(statement.sql.as_str(), &as_refs(&params))
                .await
                .store_error()
                .attach_printable_lazy(|| format!("statement failed: {}", statement.sql))?;
            affected.push(rows);
        }

        transaction
            .commit()
            .await
            .store_error()
            .attach_printable("failed to commit transaction")?;
        debug!(lease, statements = affected.len(), "transaction committed");

        Ok(affected)
    }

    async fn execute_script(&self, script: &str) -> Result<(), StoreError> {
        let writer = self.writer.lock().await;
        writer
            .batch_execute(script)
            .await
            .store_error()
            .attach_printable("failed to run script")
    }
}

fn record_from_row(row: &Row) -> Result<Record, StoreError> {
    let mut record = Record::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let ty = column.type_();
        let cell = if *ty == Type::INT8 {
            row.try_get::<_, Option<i64>>(idx)
                .map(|value| value.map(Cell::Int))
        } else if *ty == Type::INT4 {
            row.try_get::<_, Option<i32>>(idx)
                .map(|value| value.map(|value| Cell::Int(value.into())))
        } else if *ty == Type::BOOL {
            row.try_get::<_, Option<bool>>(idx)
                .map(|value| value.map(Cell::Bool))
        } else if *ty == Type::TEXT || *ty == Type::VARCHAR {
            row.try_get::<_, Option<String>>(idx)
                .map(|value| value.map(Cell::Text))
        } else if *ty == Type::JSONB || *ty == Type::JSON {
            row.try_get::<_, Option<Json<Value>>>(idx)
                .map(|value| value.map(|Json(document)| Cell::Document(document)))
        } else {
            return Err(error_stack::report!(StoreError::Corrupt).attach_printable(format!(
                "unsupported type {ty} of column {}",
                column.name()
            )));
        };

        let cell = cell
            .change_context(StoreError::Corrupt)
            .attach_printable_lazy(|| format!("failed to read column {}", column.name()))?
            .unwrap_or(Cell::Null);
        record.push(column.name(), cell);
    }
    Ok(record)
}

/// Connection, transaction and resource failures are worth retrying, any
/// other database error is not.
fn classify(err: &tokio_postgres::Error) -> StoreError {
    let Some(state) = err.code() else {
        return StoreError::Unavailable;
    };
    match state.code().get(..2) {
        Some("08" | "40" | "53" | "57") => StoreError::Unavailable,
        _ => StoreError::Rejected,
    }
}

trait PostgresResultExt<T> {
    fn store_error(self) -> Result<T, StoreError>;
}

impl<T> PostgresResultExt<T> for std::result::Result<T, tokio_postgres::Error> {
    fn store_error(self) -> Result<T, StoreError> {
        self.map_err(|err| {
            let context = classify(&err);
            error_stack::Report::new(err).change_context(context)
        })
    }
}

async fn connect_client(config: &PostgresConfiguration) -> Result<Client, StoreError> {
    // Connector and connection types differ, so connect and spawn the
    // connection inside each branch.
    let client = match &config.tls {
        TlsConfiguration::NoTls => {
            info!("using insecure connection");
            let (client, connection) = config
                .pg
                .connect(NoTls)
                .await
                .store_error()
                .attach_printable("failed to connect to postgres (no tls)")?;
            tokio::spawn(connection);
            client
        }
        TlsConfiguration::Tls {
            certificate,
            accept_invalid_certificates,
            disable_system_roots,
            accept_invalid_hostnames,
            use_sni,
        } => {
            info!("configure tls connection");
            let mut builder = TlsConnector::builder();

            if let Some(certificate) = certificate {
                let pem = tokio::fs::read(certificate)
                    .await
                    .change_context(StoreError::Configuration)
                    .attach_printable_lazy(|| {
                        format!("failed to read tls certificate at {certificate:?}")
                    })?;
                let certificate = Certificate::from_pem(&pem)
                    .change_context(StoreError::Configuration)
                    .attach_printable("failed to build certificate from PEM file")?;
                builder.add_root_certificate(certificate);
            }

            if let Some(accept_invalid_certificates) = accept_invalid_certificates {
                builder.danger_accept_invalid_certs(*accept_invalid_certificates);
            }

            if let Some(disable_system_roots) = disable_system_roots {
                builder.disable_built_in_roots(*disable_system_roots);
            }

            if let Some(accept_invalid_hostnames) = accept_invalid_hostnames {
                builder.danger_accept_invalid_hostnames(*accept_invalid_hostnames);
            }

            if let Some(use_sni) = use_sni {
                builder.use_sni(*use_sni);
            }

            let connector = builder
                .build()
                .change_context(StoreError::Configuration)
                .attach_printable("failed to build tls connector")?;
            let connector = MakeTlsConnector::new(connector);
            let (client, connection) = config
                .pg
                .connect(connector)
                .await
                .store_error()
                .attach_printable("failed to connect to postgres (tls)")?;
            tokio::spawn(connection);
            client
        }
    };

    Ok(client)
}
