use chrono::Utc;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_postgres::types::FromSql;
use tokio_postgres::{Client, Connection, NoTls, Row};
use tracing::{debug, error, info};

use crate::config::DatabaseConnection;
use crate::db::{ColumnInfo, ForeignKeyEdge, IndexInfo, SampleRows, SchemaSnapshot, TableInfo};
use crate::error::{Result, SchemaError};

/// A single scoped session. Dropping it closes the connection.
pub struct Database {
    client: Client,
}

// Unexpected types or NULLs become a catalog error instead of a panic
fn column<'a, T: FromSql<'a>>(row: &'a Row, idx: usize, stage: &str) -> Result<T> {
    row.try_get(idx).map_err(|e| SchemaError::catalog(stage, e))
}

/// Declared type with its qualifier: `varchar(255)`, `numeric(10,2)`.
/// Precision and scale apply to `numeric` only; integer and float columns
/// also report a precision in the catalog but are declared without one.
pub(crate) fn column_type(
    data_type: &str,
    max_length: Option<i32>,
    numeric_precision: Option<i32>,
    numeric_scale: Option<i32>,
) -> String {
    match (max_length, numeric_precision, numeric_scale) {
        (Some(len), _, _) if len > 0 => format!("{}({})", data_type, len),
        (_, Some(precision), Some(scale)) if data_type == "numeric" => {
            format!("{}({},{})", data_type, precision, scale)
        }
        (_, Some(precision), None) if data_type == "numeric" => {
            format!("{}({})", data_type, precision)
        }
        _ => data_type.to_string(),
    }
}

pub(crate) fn column_info(
    name: String,
    data_type: String,
    is_nullable: &str,
    default: Option<String>,
) -> ColumnInfo {
    ColumnInfo {
        name,
        data_type,
        nullable: is_nullable == "YES",
        default: default.filter(|d| !d.is_empty()),
    }
}

/// One edge per column pair of a (possibly composite) foreign key, paired
/// by key position.
pub(crate) fn foreign_key_edges(
    constraint_name: &str,
    source_table: &str,
    source_columns: &[String],
    target_table: &str,
    target_columns: &[String],
) -> Vec<ForeignKeyEdge> {
    source_columns
        .iter()
        .zip(target_columns)
        .map(|(source_column, target_column)| ForeignKeyEdge {
            source_table: source_table.to_string(),
            source_column: source_column.clone(),
            target_table: target_table.to_string(),
            target_column: target_column.clone(),
            constraint_name: constraint_name.to_string(),
        })
        .collect()
}

/// Quote an identifier the way `quote_ident` does, doubling embedded quotes.
pub(crate) fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

// Every column cast to text so numeric, time, interval etc. keep their
// server-side rendering
pub(crate) fn text_projection_query(schema: &str, table: &str, columns: &[String]) -> String {
    let projection = columns
        .iter()
        .map(|c| format!("{}::text", quote_ident(c)))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "SELECT {} FROM {}.{} LIMIT $1",
        projection,
        quote_ident(schema),
        quote_ident(table)
    )
}

fn spawn_connection<S, T>(connection: Connection<S, T>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    // Drives the socket until the client is dropped
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!(error = %e, "database connection error");
        }
    });
}

impl Database {
    pub async fn connect(connection: &DatabaseConnection) -> Result<Self> {
        let connection_string = connection.to_connection_string();

        let client = if connection.use_tls {
            let connector = native_tls::TlsConnector::builder()
                .build()
                .map_err(SchemaError::connection)?;
            let tls = postgres_native_tls::MakeTlsConnector::new(connector);
            let (client, conn) = tokio_postgres::connect(&connection_string, tls)
                .await
                .map_err(SchemaError::connection)?;
            spawn_connection(conn);
            client
        } else {
            let (client, conn) = tokio_postgres::connect(&connection_string, NoTls)
                .await
                .map_err(SchemaError::connection)?;
            spawn_connection(conn);
            client
        };

        debug!(host = %connection.host, database = %connection.database, "opened catalog connection");
        Ok(Database { client })
    }

    pub async fn list_base_tables(&self, schema: &str) -> Result<Vec<String>> {
        let stage = "tables";
        let rows = self
            .client
            .query(
                "SELECT table_name::text FROM information_schema.tables
                 WHERE table_schema = $1
                 AND table_type = 'BASE TABLE'
                 ORDER BY table_name",
                &[&schema],
            )
            .await
            .map_err(|e| SchemaError::catalog(stage, e))?;

        rows.iter().map(|row| column(row, 0, stage)).collect()
    }

    pub async fn table_columns(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>> {
        let stage = format!("columns of {}", table);
        let rows = self
            .client
            .query(
                "SELECT
                    column_name::text,
                    data_type::text,
                    character_maximum_length::int4,
                    numeric_precision::int4,
                    numeric_scale::int4,
                    is_nullable::text,
                    column_default::text
                 FROM information_schema.columns
                 WHERE table_schema = $1 AND table_name = $2
                 ORDER BY ordinal_position",
                &[&schema, &table],
            )
            .await
            .map_err(|e| SchemaError::catalog(stage.as_str(), e))?;

        rows.iter()
            .map(|row| -> Result<ColumnInfo> {
                let data_type: String = column(row, 1, &stage)?;
                let is_nullable: String = column(row, 5, &stage)?;
                Ok(column_info(
                    column(row, 0, &stage)?,
                    column_type(
                        &data_type,
                        column(row, 2, &stage)?,
                        column(row, 3, &stage)?,
                        column(row, 4, &stage)?,
                    ),
                    &is_nullable,
                    column(row, 6, &stage)?,
                ))
            })
            .collect()
    }

    pub async fn primary_keys(&self, schema: &str, table: &str) -> Result<Vec<String>> {
        let stage = format!("primary key of {}", table);
        let rows = self
            .client
            .query(
                "SELECT a.attname::text
                 FROM pg_index i
                 JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey)
                 WHERE i.indrelid = (quote_ident($1) || '.' || quote_ident($2))::regclass
                 AND i.indisprimary
                 ORDER BY array_position(i.indkey::int2[], a.attnum)",
                &[&schema, &table],
            )
            .await
            .map_err(|e| SchemaError::catalog(stage.as_str(), e))?;

        rows.iter().map(|row| column(row, 0, &stage)).collect()
    }

    pub async fn indexes(&self, schema: &str, table: &str) -> Result<Vec<IndexInfo>> {
        let stage = format!("indexes of {}", table);
        let rows = self
            .client
            .query(
                "SELECT indexname::text, indexdef
                 FROM pg_indexes
                 WHERE schemaname = $1 AND tablename = $2
                 ORDER BY indexname",
                &[&schema, &table],
            )
            .await
            .map_err(|e| SchemaError::catalog(stage.as_str(), e))?;

        rows.iter()
            .map(|row| -> Result<IndexInfo> {
                Ok(IndexInfo {
                    name: column(row, 0, &stage)?,
                    definition: column(row, 1, &stage)?,
                })
            })
            .collect()
    }

    pub async fn table_info(&self, schema: &str, table: &str) -> Result<TableInfo> {
        Ok(TableInfo {
            columns: self.table_columns(schema, table).await?,
            primary_keys: self.primary_keys(schema, table).await?,
            indexes: self.indexes(schema, table).await?,
        })
    }

    pub async fn foreign_keys(&self, schema: &str) -> Result<Vec<ForeignKeyEdge>> {
        let stage = "foreign keys";
        // One pass over all constraints instead of one query per table.
        // Column lists come back in key order so composite keys pair up.
        let rows = self
            .client
            .query(
                "SELECT
                    c.conname::text,
                    src.relname::text,
                    tgt.relname::text,
                    ARRAY(
                        SELECT a.attname::text
                        FROM unnest(c.conkey) WITH ORDINALITY AS k(attnum, pos)
                        JOIN pg_attribute a ON a.attrelid = c.conrelid AND a.attnum = k.attnum
                        ORDER BY k.pos
                    ),
                    ARRAY(
                        SELECT a.attname::text
                        FROM unnest(c.confkey) WITH ORDINALITY AS k(attnum, pos)
                        JOIN pg_attribute a ON a.attrelid = c.confrelid AND a.attnum = k.attnum
                        ORDER BY k.pos
                    )
                 FROM pg_constraint c
                 JOIN pg_class src ON src.oid = c.conrelid
                 JOIN pg_namespace n ON n.oid = src.relnamespace
                 JOIN pg_class tgt ON tgt.oid = c.confrelid
                 WHERE c.contype = 'f'
                 AND n.nspname = $1
                 ORDER BY src.relname, c.conname",
                &[&schema],
            )
            .await
            .map_err(|e| SchemaError::catalog(stage, e))?;

        let mut edges = Vec::new();
        for row in &rows {
            let constraint_name: String = column(row, 0, stage)?;
            let source_table: String = column(row, 1, stage)?;
            let target_table: String = column(row, 2, stage)?;
            let source_columns: Vec<String> = column(row, 3, stage)?;
            let target_columns: Vec<String> = column(row, 4, stage)?;
            edges.extend(foreign_key_edges(
                &constraint_name,
                &source_table,
                &source_columns,
                &target_table,
                &target_columns,
            ));
        }
        Ok(edges)
    }

    /// Read the whole schema. Any failing query aborts the read.
    pub async fn read_snapshot(&self, schema: &str) -> Result<SchemaSnapshot> {
        let started = Instant::now();
        let mut snapshot = SchemaSnapshot::new(Utc::now());

        for table in self.list_base_tables(schema).await? {
            debug!(table = %table, "reading table metadata");
            let info = self.table_info(schema, &table).await?;
            snapshot.tables.insert(table, info);
        }

        snapshot.foreign_keys = self.foreign_keys(schema).await?;

        info!(
            schema = %schema,
            tables = snapshot.tables.len(),
            foreign_keys = snapshot.foreign_keys.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "extracted database schema"
        );
        Ok(snapshot)
    }

    /// `table` must already be checked against the known table names.
    pub async fn sample_rows(&self, schema: &str, table: &str, limit: i64) -> Result<SampleRows> {
        let stage = format!("sample of {}", table);

        // Column names only; the star query is never executed
        let described = self
            .client
            .prepare(&format!(
                "SELECT * FROM {}.{}",
                quote_ident(schema),
                quote_ident(table)
            ))
            .await
            .map_err(|e| SchemaError::catalog(stage.as_str(), e))?;
        let columns: Vec<String> = described
            .columns()
            .iter()
            .map(|col| col.name().to_string())
            .collect();

        let rows = self
            .client
            .query(&text_projection_query(schema, table, &columns), &[&limit])
            .await
            .map_err(|e| SchemaError::catalog(stage.as_str(), e))?;

        let rows = rows
            .iter()
            .map(|row| {
                (0..row.len())
                    .map(|i| -> Result<String> {
                        let value: Option<String> = column(row, i, &stage)?;
                        Ok(value.unwrap_or_else(|| "(NULL)".to_string()))
                    })
                    .collect::<Result<Vec<String>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(SampleRows { columns, rows })
    }
}
