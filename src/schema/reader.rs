use async_trait::async_trait;

use crate::config::DatabaseConnection;
use crate::db::{Database, SampleRows, SchemaSnapshot};
use crate::error::Result;

/// Source of catalog facts for a [`SchemaAgent`](super::SchemaAgent).
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// Read a complete snapshot. Either every query succeeds or an error is
    /// returned; partial snapshots are never produced.
    async fn read_snapshot(&self) -> Result<SchemaSnapshot>;

    /// Fetch up to `limit` rows from a table already known to exist.
    async fn sample_rows(&self, table: &str, limit: i64) -> Result<SampleRows>;
}

/// Reads the live PostgreSQL catalog, opening one connection per call.
pub struct PgCatalogReader {
    connection: DatabaseConnection,
}

impl PgCatalogReader {
    pub fn new(connection: DatabaseConnection) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl CatalogReader for PgCatalogReader {
    async fn read_snapshot(&self) -> Result<SchemaSnapshot> {
        let db = Database::connect(&self.connection).await?;
        db.read_snapshot(&self.connection.schema).await
    }

    async fn sample_rows(&self, table: &str, limit: i64) -> Result<SampleRows> {
        let db = Database::connect(&self.connection).await?;
        db.sample_rows(&self.connection.schema, table, limit).await
    }
}
