use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::reader::{CatalogReader, PgCatalogReader};
use super::relevance::relevant_tables;
use super::render::render_schema;
use crate::config::Config;
use crate::db::{SampleRows, SchemaSnapshot};
use crate::error::{Result, SchemaError};

struct CacheEntry {
    snapshot: SchemaSnapshot,
    cached_at: Instant,
    // Filled on first request for prompt text
    rendered: Option<String>,
}

impl CacheEntry {
    fn new(snapshot: SchemaSnapshot) -> Self {
        Self {
            snapshot,
            cached_at: Instant::now(),
            rendered: None,
        }
    }

    fn is_valid_at(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.cached_at) < ttl
    }
}

/// Owns the cached schema of one database and refreshes it on demand.
///
/// Every operation that may refresh takes `&mut self`, so refreshes on a
/// single agent are serialized. Share one between tasks behind a
/// `tokio::sync::Mutex`.
pub struct SchemaAgent<R: CatalogReader = PgCatalogReader> {
    reader: R,
    ttl: Duration,
    cache: Option<CacheEntry>,
}

impl SchemaAgent<PgCatalogReader> {
    pub fn from_config(config: &Config) -> Self {
        SchemaAgent::new(
            PgCatalogReader::new(config.connection.clone()),
            config.cache_ttl(),
        )
    }
}

impl<R: CatalogReader> SchemaAgent<R> {
    pub fn new(reader: R, ttl: Duration) -> Self {
        Self {
            reader,
            ttl,
            cache: None,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_cache_valid(&self) -> bool {
        self.is_cache_valid_at(Instant::now())
    }

    fn is_cache_valid_at(&self, now: Instant) -> bool {
        self.cache
            .as_ref()
            .is_some_and(|entry| entry.is_valid_at(now, self.ttl))
    }

    /// The cached snapshot, if one exists and has not expired. Never refreshes.
    pub fn cached_snapshot(&self) -> Option<&SchemaSnapshot> {
        if self.is_cache_valid() {
            self.cache.as_ref().map(|entry| &entry.snapshot)
        } else {
            None
        }
    }

    async fn current_entry(&mut self, force_refresh: bool) -> Result<&mut CacheEntry> {
        let now = Instant::now();
        match self.cache.take() {
            Some(entry) if !force_refresh && entry.is_valid_at(now, self.ttl) => {
                debug!("schema cache hit");
                Ok(self.cache.insert(entry))
            }
            previous => match self.reader.read_snapshot().await {
                Ok(snapshot) => Ok(self.cache.insert(CacheEntry::new(snapshot))),
                Err(e) => {
                    // The last good snapshot stays installed
                    self.cache = previous;
                    Err(e)
                }
            },
        }
    }

    /// Return the cached snapshot, extracting a new one when the cache is
    /// empty, expired, or `force_refresh` is set.
    pub async fn extract_full_schema(&mut self, force_refresh: bool) -> Result<&SchemaSnapshot> {
        let entry = self.current_entry(force_refresh).await?;
        Ok(&entry.snapshot)
    }

    /// Prompt text for the full schema. Rendering happens once per snapshot.
    pub async fn get_schema_for_llm(&mut self, force_refresh: bool) -> Result<&str> {
        let CacheEntry {
            snapshot, rendered, ..
        } = self.current_entry(force_refresh).await?;
        let text = rendered.get_or_insert_with(|| render_schema(snapshot));
        Ok(text.as_str())
    }

    pub async fn get_relevant_tables(&mut self, query: &str) -> Result<Vec<String>> {
        let snapshot = self.extract_full_schema(false).await?;
        Ok(relevant_tables(snapshot, query))
    }

    /// Prompt text restricted to `table_names`, plus every foreign key that
    /// touches one of them. Unknown names are dropped.
    pub async fn get_partial_schema<S: AsRef<str>>(&mut self, table_names: &[S]) -> Result<String> {
        let snapshot = self.extract_full_schema(false).await?;
        Ok(render_schema(&snapshot.filtered(table_names)))
    }

    pub async fn get_relevant_schema(&mut self, query: &str) -> Result<String> {
        let tables = self.get_relevant_tables(query).await?;
        self.get_partial_schema(tables.as_slice()).await
    }

    pub async fn save_schema_to_file(&mut self, path: &Path) -> Result<()> {
        let snapshot = self.extract_full_schema(false).await?;
        snapshot.save_to_file(path)?;
        info!(path = %path.display(), "saved schema snapshot");
        Ok(())
    }

    /// Sample rows from a table. Only names present in the cached snapshot
    /// are accepted; anything else is rejected before a query is built.
    pub async fn get_table_sample_data(&mut self, table_name: &str, limit: i64) -> Result<SampleRows> {
        let snapshot = self.extract_full_schema(false).await?;
        if !snapshot.contains_table(table_name) {
            warn!(table = %table_name, "rejected sample request for unknown table");
            return Err(SchemaError::UnknownTable(table_name.to_string()));
        }
        self.reader.sample_rows(table_name, limit.max(0)).await
    }

    pub fn clear_cache(&mut self) {
        if self.cache.take().is_some() {
            info!("schema cache cleared");
        }
    }
}
