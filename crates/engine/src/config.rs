//! Engine configuration via `nousdata.toml`
//!
//! Selects the backend and location of every entity type. On first open a
//! default `nousdata.toml` is created next to the data; edit it and restart
//! to move an entity type to another backend.

use nousdata_core::{Error, Result};
use nousdata_storage::{BackendKind, LockOptions};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file name placed in the data directory.
pub const CONFIG_FILE_NAME: &str = "nousdata.toml";

/// File name of the shared SQLite database when no location is configured.
pub const DEFAULT_SQLITE_FILE: &str = "nousdata.db";

/// Backend selection for entity types without an override.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DefaultBackend {
    /// One of `sqlite`, `json`, `xml`, `csv`, `text`, `memory`
    #[serde(default = "default_backend_str")]
    pub backend: String,
    /// SQLite database file shared by every entity type on the `sqlite` backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqlite_file: Option<String>,
    /// Refuse inserts past this many records per location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_records: Option<usize>,
}

fn default_backend_str() -> String {
    "json".to_string()
}

impl Default for DefaultBackend {
    fn default() -> Self {
        Self {
            backend: default_backend_str(),
            sqlite_file: None,
            max_records: None,
        }
    }
}

/// Per entity type override, under `[entities.<Type>]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityBackend {
    /// Backend name; falls back to `[default]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    /// File path, relative to the data directory unless absolute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Falls back to `[default]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_records: Option<usize>,
}

/// Lock acquisition policy, under `[lock]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockConfig {
    /// Attempts after the first one
    #[serde(default = "default_lock_retries")]
    pub retries: u32,
    /// Pause between attempts in milliseconds
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

fn default_lock_retries() -> u32 {
    LockOptions::default().retries
}

fn default_retry_interval_ms() -> u64 {
    LockOptions::default().retry_interval.as_millis() as u64
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            retries: default_lock_retries(),
            retry_interval_ms: default_retry_interval_ms(),
        }
    }
}

impl LockConfig {
    /// As storage lock options
    pub fn options(&self) -> LockOptions {
        LockOptions {
            retries: self.retries,
            retry_interval: Duration::from_millis(self.retry_interval_ms),
        }
    }
}

/// Where and how one entity type is stored, after applying defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// Physical format
    pub kind: BackendKind,
    /// Data file (the database file for SQLite); `None` for memory
    pub path: Option<PathBuf>,
    /// Capacity limit
    pub max_records: Option<usize>,
}

/// Engine configuration loaded from `nousdata.toml`.
///
/// # Example
///
/// ```toml
/// data_dir = "data"
///
/// [default]
/// backend = "json"
///
/// [entities.Book]
/// backend = "sqlite"
///
/// [entities.Loan]
/// backend = "csv"
/// location = "loans/current.csv"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineConfig {
    /// Directory holding data files; relative paths resolve against the
    /// process working directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// Backend for entity types without an override
    #[serde(default)]
    pub default: DefaultBackend,
    /// Per entity type overrides
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub entities: BTreeMap<String, EntityBackend>,
    /// Lock retry policy
    #[serde(default)]
    pub lock: LockConfig,
}

impl EngineConfig {
    /// Config with every entity type on `backend`
    pub fn with_backend(kind: BackendKind) -> Self {
        Self {
            default: DefaultBackend {
                backend: kind.as_str().to_string(),
                ..DefaultBackend::default()
            },
            ..Self::default()
        }
    }

    /// Override the backend of one entity type.
    pub fn set_backend(&mut self, entity_type: &str, kind: BackendKind) {
        self.entities.entry(entity_type.to_string()).or_default().backend =
            Some(kind.as_str().to_string());
    }

    /// Directory data files live in
    pub fn data_dir(&self) -> &Path {
        self.data_dir.as_deref().unwrap_or_else(|| Path::new("data"))
    }

    /// Check every backend name and the lock policy.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first invalid entry.
    pub fn validate(&self) -> Result<()> {
        parse_backend(&self.default.backend, "[default]")?;
        for (name, entity) in &self.entities {
            if let Some(backend) = &entity.backend {
                parse_backend(backend, &format!("[entities.{}]", name))?;
            }
        }
        if self.lock.retry_interval_ms == 0 && self.lock.retries > 0 {
            return Err(Error::Config(
                "lock.retry_interval_ms must be positive when lock.retries is set".to_string(),
            ));
        }
        Ok(())
    }

    /// Backend kind configured for `entity_type`
    pub fn backend_for(&self, entity_type: &str) -> Result<BackendKind> {
        match self.entities.get(entity_type).and_then(|e| e.backend.as_deref()) {
            Some(backend) => parse_backend(backend, &format!("[entities.{}]", entity_type)),
            None => parse_backend(&self.default.backend, "[default]"),
        }
    }

    /// Resolve backend, location and limits for `entity_type`.
    ///
    /// Default locations: `<data_dir>/<type>.<ext>` for document formats
    /// (type name lowercased) and `<data_dir>/nousdata.db` for SQLite.
    pub fn binding_for(&self, entity_type: &str) -> Result<Binding> {
        let kind = self.backend_for(entity_type)?;
        let entity = self.entities.get(entity_type);
        let max_records = entity
            .and_then(|e| e.max_records)
            .or(self.default.max_records);

        let location = entity.and_then(|e| e.location.clone());
        let path = match kind {
            BackendKind::Memory => None,
            BackendKind::Sqlite => {
                let file = location
                    .or_else(|| self.default.sqlite_file.clone())
                    .unwrap_or_else(|| DEFAULT_SQLITE_FILE.to_string());
                Some(self.resolve(&file))
            }
            document => {
                let file = match location {
                    Some(file) => file,
                    None => format!(
                        "{}.{}",
                        entity_type.to_lowercase(),
                        document.file_extension().unwrap_or("dat")
                    ),
                };
                Some(self.resolve(&file))
            }
        };

        Ok(Binding {
            kind,
            path,
            max_records,
        })
    }

    fn resolve(&self, file: &str) -> PathBuf {
        let path = Path::new(file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir().join(path)
        }
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# NousData engine configuration
#
# Directory for data files (default: "data")
# data_dir = "data"

# Backend for every entity type without an override:
#   "sqlite", "json" (default), "xml", "csv", "text" or "memory"
[default]
backend = "json"
# sqlite_file = "nousdata.db"     # shared by all entity types on sqlite
# max_records = 100000            # refuse inserts past this many records

# Per entity type overrides
# [entities.Book]
# backend = "sqlite"
#
# [entities.Loan]
# backend = "csv"
# location = "loans.csv"

# Lock acquisition for concurrent writers
[lock]
retries = 50
retry_interval_ms = 20
"#
    }

    /// Read and parse config from a file path.
    ///
    /// A relative `data_dir` is taken relative to the file's directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let mut config: EngineConfig = toml::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.data_dir = Some(match config.data_dir.take() {
            Some(dir) if dir.is_relative() => base.join(dir),
            Some(dir) => dir,
            None => base.to_path_buf(),
        });
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::Config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::Config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}

fn parse_backend(name: &str, section: &str) -> Result<BackendKind> {
    BackendKind::parse(name).ok_or_else(|| {
        Error::Config(format!(
            "Invalid backend '{}' in {}. Expected one of: {}.",
            name,
            section,
            BackendKind::ALL
                .iter()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    })
}
