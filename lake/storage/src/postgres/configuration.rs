use std::{path::PathBuf, str::FromStr};

use clap::Args;
use error_stack::{Result, ResultExt};
use tokio_postgres::Config;

use crate::codec::DocumentCodec;
use crate::error::StoreError;

#[derive(Debug, Clone)]
pub enum TlsConfiguration {
    NoTls,
    Tls {
        certificate: Option<PathBuf>,
        accept_invalid_certificates: Option<bool>,
        disable_system_roots: Option<bool>,
        accept_invalid_hostnames: Option<bool>,
        use_sni: Option<bool>,
    },
}

#[derive(Debug, Clone)]
pub struct PostgresConfiguration {
    pub pg: Config,
    pub tls: TlsConfiguration,
    pub codec: DocumentCodec,
}

#[derive(Debug, Clone, Args, Default)]
pub struct PostgresOptions {
    /// Connection string to the PostgreSQL server.
    #[arg(long, env = "POSTGRES_CONNECTION_STRING")]
    pub connection_string: Option<String>,
    /// How document columns are stored: `structured` (JSONB) or `text`.
    #[arg(long, env = "POSTGRES_DOCUMENT_CODEC")]
    pub document_codec: Option<DocumentCodec>,
    /// Disable TLS when connecting to the PostgreSQL server.
    #[arg(long, env = "POSTGRES_NO_TLS")]
    pub no_tls: Option<bool>,
    /// Path to the PEM-formatted X509 TLS certificate file.
    #[arg(long, env = "POSTGRES_TLS_CERTIFICATE")]
    pub tls_certificate: Option<String>,
    /// Disable system root certificates.
    #[arg(long, env = "POSTGRES_TLS_DISABLE_SYSTEM_ROOTS")]
    pub tls_disable_system_roots: Option<bool>,
    /// Disable certificate validation.
    #[arg(long, env = "POSTGRES_TLS_ACCEPT_INVALID_CERTIFICATES")]
    pub tls_accept_invalid_certificates: Option<bool>,
    /// Disable hostname validation.
    #[arg(long, env = "POSTGRES_TLS_ACCEPT_INVALID_HOSTNAMES")]
    pub tls_accept_invalid_hostnames: Option<bool>,
    /// Use Server Name Indication (SNI).
    #[arg(long, env = "POSTGRES_TLS_USE_SNI")]
    pub tls_use_sni: Option<bool>,
}

impl PostgresOptions {
    pub fn is_configured(&self) -> bool {
        self.connection_string.is_some()
    }

    pub fn to_postgres_configuration(self) -> Result<PostgresConfiguration, StoreError> {
        let connection_string = self
            .connection_string
            .ok_or(StoreError::Configuration)
            .attach_printable("missing postgres connection string")?;
        let pg = Config::from_str(&connection_string)
            .change_context(StoreError::Configuration)
            .attach_printable("failed to build postgres config from connection string")?;

        let tls = if self.no_tls.unwrap_or(false) {
            TlsConfiguration::NoTls
        } else {
            TlsConfiguration::Tls {
                certificate: self.tls_certificate.map(PathBuf::from),
                accept_invalid_certificates: self.tls_accept_invalid_certificates,
                disable_system_roots: self.tls_disable_system_roots,
                accept_invalid_hostnames: self.tls_accept_invalid_hostnames,
                use_sni: self.tls_use_sni,
            }
        };

        Ok(PostgresConfiguration {
            pg,
            tls,
            codec: self.document_codec.unwrap_or_default(),
        })
    }
}
