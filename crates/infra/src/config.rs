//! Process configuration, read once from the environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Which storage engine backs both the ledger and the read store.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EngineKind {
    InMemory,
    Sqlite,
    Postgres,
}

impl EngineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EngineKind::InMemory => "inmemory",
            EngineKind::Sqlite => "sqlite",
            EngineKind::Postgres => "postgres",
        }
    }
}

impl core::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inmemory" | "memory" => Ok(EngineKind::InMemory),
            "sqlite" => Ok(EngineKind::Sqlite),
            "postgres" | "postgresql" => Ok(EngineKind::Postgres),
            other => Err(ConfigError::invalid(
                "TANIA_PERSISTENCE_ENGINE",
                format!("unknown engine `{other}` (expected inmemory, sqlite or postgres)"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("tania.db"),
            max_connections: 4,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub username: String,
    pub password: String,
    pub max_connections: u32,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5432,
            dbname: "tania".to_string(),
            username: "tania".to_string(),
            password: "tania".to_string(),
            max_connections: 10,
        }
    }
}

impl core::fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceConfig {
    pub engine: EngineKind,
    pub sqlite: SqliteConfig,
    pub postgres: PostgresConfig,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::InMemory,
            sqlite: SqliteConfig::default(),
            postgres: PostgresConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaniaConfig {
    pub persistence: PersistenceConfig,
    /// How often the due-date sweep runs.
    pub due_sweep_interval: Duration,
    pub rebuild_on_start: bool,
}

impl Default for TaniaConfig {
    fn default() -> Self {
        Self {
            persistence: PersistenceConfig::default(),
            due_sweep_interval: Duration::from_secs(60),
            rebuild_on_start: true,
        }
    }
}

impl TaniaConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.persistence.engine = EngineKind::Sqlite;
        config.persistence.sqlite.path = path.into();
        config
    }

    /// Read `TANIA_*` variables; unset ones keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`TaniaConfig::from_env`] over an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(engine) = get("TANIA_PERSISTENCE_ENGINE") {
            config.persistence.engine = engine.parse()?;
        }

        let sqlite = &mut config.persistence.sqlite;
        if let Some(path) = get("TANIA_SQLITE_PATH") {
            sqlite.path = PathBuf::from(path);
        }

        let postgres = &mut config.persistence.postgres;
        if let Some(host) = get("TANIA_POSTGRES_HOST") {
            postgres.host = host;
        }
        if let Some(port) = get("TANIA_POSTGRES_PORT") {
            postgres.port = parse("TANIA_POSTGRES_PORT", &port)?;
        }
        if let Some(dbname) = get("TANIA_POSTGRES_DBNAME") {
            postgres.dbname = dbname;
        }
        if let Some(username) = get("TANIA_POSTGRES_USERNAME") {
            postgres.username = username;
        }
        if let Some(password) = lookup("TANIA_POSTGRES_PASSWORD") {
            postgres.password = password;
        }

        if let Some(secs) = get("TANIA_DUE_SWEEP_SECS") {
            let secs: u64 = parse("TANIA_DUE_SWEEP_SECS", &secs)?;
            if secs == 0 {
                return Err(ConfigError::invalid("TANIA_DUE_SWEEP_SECS", "must be at least 1"));
            }
            config.due_sweep_interval = Duration::from_secs(secs);
        }
        if let Some(flag) = get("TANIA_REBUILD_ON_START") {
            config.rebuild_on_start = parse_bool("TANIA_REBUILD_ON_START", &flag)?;
        }

        Ok(config)
    }
}

fn parse<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: core::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::invalid(key, format!("`{raw}`: {e}")))
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, format!("`{raw}` is not a boolean"))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<TaniaConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        TaniaConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_select_the_in_memory_engine() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, TaniaConfig::in_memory());
        assert_eq!(config.due_sweep_interval, Duration::from_secs(60));
        assert!(config.rebuild_on_start);
    }

    #[test]
    fn postgres_settings_are_read() {
        let config = config_from(&[
            ("TANIA_PERSISTENCE_ENGINE", "PostgreSQL"),
            ("TANIA_POSTGRES_HOST", "db.internal"),
            ("TANIA_POSTGRES_PORT", "6432"),
            ("TANIA_POSTGRES_PASSWORD", "s3cret"),
            ("TANIA_REBUILD_ON_START", "no"),
        ])
        .unwrap();

        assert_eq!(config.persistence.engine, EngineKind::Postgres);
        assert_eq!(config.persistence.postgres.host, "db.internal");
        assert_eq!(config.persistence.postgres.port, 6432);
        assert!(!config.rebuild_on_start);
        assert!(!format!("{:?}", config.persistence.postgres).contains("s3cret"));
    }

    #[test]
    fn bad_values_name_their_key() {
        let err = config_from(&[("TANIA_POSTGRES_PORT", "lots")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "TANIA_POSTGRES_PORT", .. }));

        let err = config_from(&[("TANIA_PERSISTENCE_ENGINE", "mysql")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "TANIA_PERSISTENCE_ENGINE", .. }));

        let err = config_from(&[("TANIA_DUE_SWEEP_SECS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "TANIA_DUE_SWEEP_SECS", .. }));
    }

    #[test]
    fn sqlite_constructor_sets_the_path() {
        let config = TaniaConfig::sqlite("/var/lib/tania/farm.db");
        assert_eq!(config.persistence.engine, EngineKind::Sqlite);
        assert_eq!(config.persistence.sqlite.path, PathBuf::from("/var/lib/tania/farm.db"));
    }
}
