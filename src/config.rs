use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, SchemaError};

pub const DEFAULT_CACHE_DURATION_MINUTES: u64 = 60;
pub const DEFAULT_SAMPLE_LIMIT: i64 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConnection {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default)]
    pub use_tls: bool,
}

fn default_schema() -> String {
    "public".to_string()
}

impl Default for DatabaseConnection {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            database: "postgres".to_string(),
            schema: default_schema(),
            use_tls: false,
        }
    }
}

impl DatabaseConnection {
    pub fn to_connection_string(&self) -> String {
        let mut s = format!(
            "host={} port={} user={} dbname={}",
            quote_value(&self.host),
            self.port,
            quote_value(&self.user),
            quote_value(&self.database)
        );
        if !self.password.is_empty() {
            s.push_str(&format!(" password={}", quote_value(&self.password)));
        }
        s
    }
}

// libpq key/value syntax: single-quote values containing spaces or quotes
fn quote_value(value: &str) -> String {
    if !value.is_empty() && !value.contains([' ', '\'', '\\']) {
        return value.to_string();
    }
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub connection: DatabaseConnection,
    #[serde(default = "default_cache_duration")]
    pub cache_duration_minutes: u64,
    #[serde(default = "default_sample_limit")]
    pub sample_limit: i64,
}

fn default_cache_duration() -> u64 {
    DEFAULT_CACHE_DURATION_MINUTES
}

fn default_sample_limit() -> i64 {
    DEFAULT_SAMPLE_LIMIT
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection: DatabaseConnection::default(),
            cache_duration_minutes: DEFAULT_CACHE_DURATION_MINUTES,
            sample_limit: DEFAULT_SAMPLE_LIMIT,
        }
    }
}

impl Config {
    /// Load from the default location, falling back to defaults when the
    /// file does not exist. Environment overrides are applied on top.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        let mut config = if config_path.exists() {
            Self::read_file(&config_path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::read_file(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| SchemaError::io(path, e))?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;

        // Create parent directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| SchemaError::io(parent, e))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(&config_path, content).map_err(|e| SchemaError::io(&config_path, e))?;
        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| SchemaError::Config("could not find home directory".to_string()))?;
        Ok(home.join(".config").join("schema-agent").join("config.json"))
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let conn = &mut self.connection;
        if let Some(host) = lookup("DB_HOST") {
            conn.host = host;
        }
        if let Some(database) = lookup("DB_NAME") {
            conn.database = database;
        }
        if let Some(user) = lookup("DB_USER") {
            conn.user = user;
        }
        if let Some(password) = lookup("DB_PASSWORD") {
            conn.password = password;
        }
        if let Some(schema) = lookup("DB_SCHEMA") {
            conn.schema = schema;
        }
        if let Some(port) = lookup("DB_PORT") {
            conn.port = parse_override("DB_PORT", &port)?;
        }
        if let Some(minutes) = lookup("SCHEMA_CACHE_DURATION_MINUTES") {
            self.cache_duration_minutes = parse_override("SCHEMA_CACHE_DURATION_MINUTES", &minutes)?;
        }
        if let Some(limit) = lookup("SAMPLE_LIMIT") {
            self.sample_limit = parse_override("SAMPLE_LIMIT", &limit)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let conn = &self.connection;
        let required = [
            ("host", &conn.host),
            ("database", &conn.database),
            ("user", &conn.user),
            ("schema", &conn.schema),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(SchemaError::Config(format!("database '{}' is not set", key)));
            }
        }
        if conn.port == 0 {
            return Err(SchemaError::Config("database port must be non-zero".to_string()));
        }
        if self.sample_limit <= 0 {
            return Err(SchemaError::Config("sample_limit must be positive".to_string()));
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_duration_minutes.saturating_mul(60))
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| SchemaError::Config(format!("{} has invalid value '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.cache_ttl(), Duration::from_secs(3600));
        assert_eq!(config.connection.schema, "public");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_connection_string_quotes_awkward_values() {
        let conn = DatabaseConnection {
            password: "p@ss word".to_string(),
            ..DatabaseConnection::default()
        };
        assert_eq!(
            conn.to_connection_string(),
            "host=localhost port=5432 user=postgres dbname=postgres password='p@ss word'"
        );
    }

    #[test]
    fn test_connection_string_omits_empty_password() {
        let conn = DatabaseConnection::default();
        assert!(!conn.to_connection_string().contains("password"));
    }

    #[test]
    fn test_env_overrides() {
        let vars = env(&[
            ("DB_HOST", "db.internal"),
            ("DB_PORT", "6543"),
            ("DB_NAME", "shop"),
            ("SCHEMA_CACHE_DURATION_MINUTES", "5"),
        ]);
        let mut config = Config::default();
        config
            .apply_overrides_from(|key| vars.get(key).cloned())
            .unwrap();

        assert_eq!(config.connection.host, "db.internal");
        assert_eq!(config.connection.port, 6543);
        assert_eq!(config.connection.database, "shop");
        assert_eq!(config.connection.user, "postgres");
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
    }

    #[test]
    fn test_invalid_numeric_override_is_rejected() {
        let vars = env(&[("DB_PORT", "not-a-port")]);
        let mut config = Config::default();
        let err = config
            .apply_overrides_from(|key| vars.get(key).cloned())
            .unwrap_err();
        assert!(matches!(err, SchemaError::Config(_)));
    }

    #[test]
    fn test_validate_rejects_missing_host() {
        let mut config = Config::default();
        config.connection.host = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let json = r#"{"connection": {"host": "h", "port": 5432, "user": "u", "password": "", "database": "d"}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.cache_duration_minutes, DEFAULT_CACHE_DURATION_MINUTES);
        assert_eq!(config.sample_limit, DEFAULT_SAMPLE_LIMIT);
        assert_eq!(config.connection.schema, "public");
        assert!(!config.connection.use_tls);
    }
}
