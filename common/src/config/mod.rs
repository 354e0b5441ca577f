use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::err::{CResult, EngineError};

/// Full engine configuration, loaded from a TOML file and merged with CLI
/// overrides by the binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub server: ServerConfig,
    pub log: LogConfig,
    pub sources: Vec<DataSourceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    /// Empty password means auth is skipped.
    pub password: String,
    pub default_database: String,
    /// Worker threads for parallel scans.
    pub workers: usize,
    pub slow_query_ms: u64,
    /// 0 disables the per-query deadline.
    pub query_timeout_ms: u64,
    pub cache_capacity: usize,
    pub cache_ttl_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            default_database: "main".to_string(),
            workers: 4,
            slow_query_ms: 300,
            query_timeout_ms: 0,
            cache_capacity: 256,
            cache_ttl_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub debug: bool,
    /// Absent means stdout only.
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Memory,
    Mysql,
    Postgresql,
    Sqlite,
    Csv,
    Json,
    Parquet,
    Excel,
    Http,
}

impl SourceType {
    pub fn is_file(&self) -> bool {
        matches!(
            self,
            SourceType::Csv | SourceType::Json | SourceType::Parquet | SourceType::Excel
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceConfig {
    #[serde(rename = "type")]
    pub source_type: SourceType,
    /// Identifier; for file sources this is the file path.
    pub name: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub writable: Option<bool>,
    #[serde(default)]
    pub options: HashMap<String, String>,
}

impl DataSourceConfig {
    pub fn memory(name: impl Into<String>) -> Self {
        DataSourceConfig {
            source_type: SourceType::Memory,
            name: name.into(),
            host: None,
            port: None,
            username: None,
            password: None,
            database: None,
            writable: None,
            options: HashMap::new(),
        }
    }

    /// Memory sources default writable, file sources read only.
    pub fn is_writable(&self) -> bool {
        self.writable.unwrap_or(!self.source_type.is_file())
    }
}

pub fn read_config(path: &Path) -> CResult<EngineConfig> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        EngineError::Config(format!("cannot read config file {}: {}", path.display(), e))
    })?;
    toml::from_str(&raw)
        .map_err(|e| EngineError::Config(format!("cannot parse config file {}: {}", path.display(), e)))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.server.port, 3306);
        assert_eq!(cfg.server.default_database, "main");
        assert!(cfg.sources.is_empty());
    }

    #[test]
    fn writable_defaults_by_type() {
        let mem = DataSourceConfig::memory("main");
        assert!(mem.is_writable());
        let mut csv = DataSourceConfig::memory("/tmp/a.csv");
        csv.source_type = SourceType::Csv;
        assert!(!csv.is_writable());
        csv.writable = Some(true);
        assert!(csv.is_writable());
    }

    #[test]
    fn parse_toml() {
        let cfg: EngineConfig = toml::from_str(
            r#"
            [server]
            port = 3310
            user = "admin"

            [[sources]]
            type = "memory"
            name = "main"

            [[sources]]
            type = "csv"
            name = "/data/users.csv"
            [sources.options]
            delimiter = ","
            header = "true"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.port, 3310);
        assert_eq!(cfg.sources.len(), 2);
        assert_eq!(cfg.sources[1].options["delimiter"], ",");
        assert!(!cfg.sources[1].is_writable());
    }
}
