mod client;
mod models;

pub use client::Database;
pub use models::{ColumnInfo, ForeignKeyEdge, IndexInfo, SampleRows, SchemaSnapshot, TableInfo};
