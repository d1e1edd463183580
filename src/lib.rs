//! Extracts, caches and renders a PostgreSQL schema for language-model
//! prompts.
//!
//! [`SchemaAgent`] owns one cached [`SchemaSnapshot`] with a time-to-live,
//! refreshes it from the live catalog on demand, and renders it (fully or
//! for a subset of tables) as compact text.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod schema;

pub use config::{Config, DatabaseConnection};
pub use db::{ColumnInfo, ForeignKeyEdge, IndexInfo, SampleRows, SchemaSnapshot, TableInfo};
pub use error::{Result, SchemaError};
pub use schema::{CatalogReader, PgCatalogReader, SchemaAgent};
