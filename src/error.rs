use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, SchemaError>;

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("could not connect to database: {0}")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("catalog query failed while reading {stage}: {source}")]
    CatalogQuery {
        stage: String,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown table '{0}'")]
    UnknownTable(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SchemaError {
    pub fn connection(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        SchemaError::Connection(source.into())
    }

    pub fn catalog(stage: impl Into<String>, source: tokio_postgres::Error) -> Self {
        SchemaError::CatalogQuery {
            stage: stage.into(),
            source,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SchemaError::Io {
            path: path.into(),
            source,
        }
    }
}
