use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

/// Which record store the process runs on. Chosen once at startup.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Sqlite,
    Memory,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Sqlite => "sqlite",
            StorageBackend::Memory => "memory",
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageBackend {
    type Err = config::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" => Ok(StorageBackend::Sqlite),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(config::ConfigError::Message(format!(
                "FATAL: 'STORAGE_BACKEND' must be 'sqlite' or 'memory', got '{}'.",
                other
            ))),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub web: WebConfig,
    pub storage_backend: StorageBackend,
    pub database_path: Option<String>,
    pub allowed_origins: String,
    pub log_level: String,
    pub seed_demo_data: bool,
}

/// The sqlite backend needs an absolute directory; the memory backend
/// ignores the setting.
fn validate_database_path(
    backend: StorageBackend,
    database_path: Option<String>,
) -> Result<Option<String>, config::ConfigError> {
    match (backend, database_path) {
        (StorageBackend::Memory, path) => Ok(path),
        (StorageBackend::Sqlite, None) => Err(config::ConfigError::Message(
            "FATAL: Environment variable 'DATABASE_PATH' is required when STORAGE_BACKEND=sqlite.".to_string(),
        )),
        (StorageBackend::Sqlite, Some(path)) if Path::new(&path).is_relative() => {
            Err(config::ConfigError::Message(format!(
                "FATAL: The 'DATABASE_PATH' in your .env file is a relative path ('{}'). It MUST be an absolute path.",
                path
            )))
        }
        (StorageBackend::Sqlite, Some(path)) => Ok(Some(path)),
    }
}

fn parse_flag(name: &str, raw: &str) -> Result<bool, config::ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(config::ConfigError::Message(format!(
            "FATAL: '{}' must be true or false, got '{}'.",
            name, other
        ))),
    }
}

impl Config {
    pub fn from_env(env_path: &Path) -> Result<Self, config::ConfigError> {
        dotenvy::from_path(env_path).map_err(|e| {
            config::ConfigError::Message(format!(
                "FATAL: Failed to load .env file from '{}'. Error: {}",
                env_path.display(),
                e
            ))
        })?;

        let storage_backend: StorageBackend = env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "memory".to_string())
            .parse()?;

        let database_path = env::var("DATABASE_PATH").ok().filter(|p| !p.trim().is_empty());
        let database_path = validate_database_path(storage_backend, database_path)?;

        let allowed_origins = env::var("ALLOWED_ORIGINS").unwrap_or_default();
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        // Seeding a persistent database has to be asked for.
        let seed_demo_data = match env::var("SEED_DEMO_DATA") {
            Ok(raw) => parse_flag("SEED_DEMO_DATA", &raw)?,
            Err(_) => storage_backend == StorageBackend::Memory,
        };

        let mut builder = config::Config::builder()
            .set_default("web.host", "127.0.0.1")?
            .set_default("web.port", 8080)?
            .add_source(config::File::new("config/default.toml", config::FileFormat::Toml).required(false))
            .set_override("storage_backend", storage_backend.as_str())?
            .set_override("allowed_origins", allowed_origins)?
            .set_override("log_level", log_level)?
            .set_override("seed_demo_data", seed_demo_data)?;
        if let Some(path) = database_path {
            builder = builder.set_override("database_path", path)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Location of the catalog database file inside its own folder.
    pub fn catalog_db_path(&self) -> Option<PathBuf> {
        self.database_path
            .as_ref()
            .map(|dir| PathBuf::from(dir).join("catalog").join("catalog.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names_parse_case_insensitively() {
        assert_eq!("SQLite".parse::<StorageBackend>().unwrap(), StorageBackend::Sqlite);
        assert_eq!(" memory ".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert!("postgres".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn sqlite_requires_an_absolute_database_path() {
        assert!(validate_database_path(StorageBackend::Sqlite, None).is_err());
        assert!(validate_database_path(StorageBackend::Sqlite, Some("data".to_string())).is_err());
        assert_eq!(
            validate_database_path(StorageBackend::Sqlite, Some("/var/lib/edusomal".to_string())).unwrap(),
            Some("/var/lib/edusomal".to_string())
        );
        assert_eq!(validate_database_path(StorageBackend::Memory, None).unwrap(), None);
    }

    #[test]
    fn flags_accept_common_spellings() {
        assert!(parse_flag("SEED_DEMO_DATA", "Yes").unwrap());
        assert!(!parse_flag("SEED_DEMO_DATA", "0").unwrap());
        assert!(parse_flag("SEED_DEMO_DATA", "maybe").is_err());
    }
}
