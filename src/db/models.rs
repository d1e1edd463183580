use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use crate::error::{Result, SchemaError};

/// Structural picture of the database schema at one point in time.
///
/// Serializes to the on-disk layout written by `save_schema_to_file`:
/// `tables`, `foreign_keys` and `extracted_at`. Any change to these types
/// changes that format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub tables: BTreeMap<String, TableInfo>,
    pub foreign_keys: Vec<ForeignKeyEdge>,
    pub extracted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    // Catalog ordinal order
    pub columns: Vec<ColumnInfo>,
    pub primary_keys: Vec<String>,
    pub indexes: Vec<IndexInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub definition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyEdge {
    pub source_table: String,
    pub source_column: String,
    pub target_table: String,
    pub target_column: String,
    pub constraint_name: String,
}

/// Rows returned by the sampling helper, every value rendered as text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableInfo {
    pub fn is_primary_key(&self, column: &str) -> bool {
        self.primary_keys.iter().any(|pk| pk == column)
    }
}

impl ForeignKeyEdge {
    pub fn touches(&self, tables: &HashSet<&str>) -> bool {
        tables.contains(self.source_table.as_str()) || tables.contains(self.target_table.as_str())
    }
}

impl SchemaSnapshot {
    pub fn new(extracted_at: DateTime<Utc>) -> Self {
        Self {
            tables: BTreeMap::new(),
            foreign_keys: Vec::new(),
            extracted_at,
        }
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    pub fn contains_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Copy restricted to `names`, keeping every foreign key that touches one
    /// of them. Names that are not in the snapshot are ignored.
    pub fn filtered<S: AsRef<str>>(&self, names: &[S]) -> SchemaSnapshot {
        let wanted: HashSet<&str> = names.iter().map(|n| n.as_ref()).collect();

        let tables = self
            .tables
            .iter()
            .filter(|(name, _)| wanted.contains(name.as_str()))
            .map(|(name, info)| (name.clone(), info.clone()))
            .collect();

        let foreign_keys = self
            .foreign_keys
            .iter()
            .filter(|fk| fk.touches(&wanted))
            .cloned()
            .collect();

        SchemaSnapshot {
            tables,
            foreign_keys,
            extracted_at: self.extracted_at,
        }
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| SchemaError::io(parent, e))?;
            }
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| SchemaError::io(path, e))?;
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| SchemaError::io(path, e))?;
        let snapshot: SchemaSnapshot = serde_json::from_str(&content)?;
        Ok(snapshot)
    }
}
