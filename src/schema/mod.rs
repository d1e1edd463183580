mod agent;
mod reader;
mod relevance;
mod render;

pub use agent::SchemaAgent;
pub use reader::{CatalogReader, PgCatalogReader};
pub use relevance::relevant_tables;
pub use render::{render_schema, FOREIGN_KEY_HEADER, METADATA_HEADER, SCHEMA_HEADER};
