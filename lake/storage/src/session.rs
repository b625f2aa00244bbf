use async_trait::async_trait;
use error_stack::Result;

use crate::codec::DocumentCodec;
use crate::error::StoreError;
use crate::sql::{Dialect, Record, SqlQuery};

/// A connection to one of the supported databases.
#[async_trait]
pub trait SqlSession: Send + Sync + 'static {
    fn dialect(&self) -> Dialect;

    /// How document columns are stored.
    fn codec(&self) -> DocumentCodec;

    /// Run a read query.
    async fn fetch(&self, query: SqlQuery) -> Result<Vec<Record>, StoreError>;

    /// Run `statements` in a single transaction while holding the exclusive
    /// write lease named `lease`. Returns the number of rows affected by each
    /// statement.
    ///
    /// Either all statements are committed or none are.
    async fn execute_atomically(
        &self,
        lease: &str,
        statements: Vec<SqlQuery>,
    ) -> Result<Vec<u64>, StoreError>;

    /// Run a script of `;` separated statements without parameters.
    async fn execute_script(&self, script: &str) -> Result<(), StoreError>;
}
