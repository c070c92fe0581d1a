//! Error types for NousData
//!
//! This module defines the error taxonomy shared by every layer:
//! repositories, storage adapters, the identity allocator and migrations.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use std::io;
use thiserror::Error;

/// Result type alias for NousData operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for NousData
#[derive(Debug, Error)]
pub enum Error {
    /// Entity failed a field constraint before any I/O happened
    #[error("Validation error on {entity_type}.{field}: {reason}")]
    Validation {
        /// Entity type being validated
        entity_type: String,
        /// Offending field
        field: String,
        /// Human readable reason
        reason: String,
    },

    /// A unique field collides with a different stored record
    #[error("Conflict on {entity_type}.{field}: value '{value}' already used by id {existing_id}")]
    Conflict {
        /// Entity type
        entity_type: String,
        /// Unique field
        field: String,
        /// Colliding value, rendered
        value: String,
        /// Id of the record already holding the value
        existing_id: u64,
    },

    /// Operation targets an id that does not exist
    #[error("{entity_type} with id {id} not found")]
    NotFound {
        /// Entity type
        entity_type: String,
        /// Missing id
        id: u64,
    },

    /// Physical data is unreadable or malformed
    #[error("Data corruption in {location}: {detail}")]
    Corruption {
        /// Backend location (file path or table)
        location: String,
        /// What was wrong
        detail: String,
    },

    /// No migration registered for an intermediate version
    #[error("Migration gap for {entity_type}: no migration registered from version {missing_from}")]
    MigrationGap {
        /// Entity type being migrated
        entity_type: String,
        /// Version with no outgoing step
        missing_from: u32,
    },

    /// Stored data is newer than this code understands
    #[error("Unsupported schema version in {location}: stored {stored}, supported up to {supported}")]
    UnsupportedVersion {
        /// Backend location
        location: String,
        /// Version marker found on disk
        stored: u32,
        /// Version this code expects
        supported: u32,
    },

    /// Lock or transaction acquisition timed out (retryable)
    #[error("Concurrency error in {location}: {detail}")]
    Concurrency {
        /// Backend location
        location: String,
        /// What could not be acquired
        detail: String,
    },

    /// A file-backed collection reached its configured size limit
    #[error("Capacity exceeded in {location}: limit is {limit} records")]
    CapacityExceeded {
        /// Backend location
        location: String,
        /// Configured limit
        limit: usize,
    },

    /// Entity type not registered with the entity manager
    #[error("Unknown entity type: {0}")]
    UnknownEntity(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Relational engine error
    #[error("Database error: {0}")]
    Database(String),
}

impl Error {
    /// Build a validation error
    pub fn validation(
        entity_type: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::Validation {
            entity_type: entity_type.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Build a corruption error
    pub fn corruption(location: impl Into<String>, detail: impl Into<String>) -> Self {
        Error::Corruption {
            location: location.into(),
            detail: detail.into(),
        }
    }

    /// Build a concurrency error
    pub fn concurrency(location: impl Into<String>, detail: impl Into<String>) -> Self {
        Error::Concurrency {
            location: location.into(),
            detail: detail.into(),
        }
    }

    /// Build a not-found error
    pub fn not_found(entity_type: impl Into<String>, id: u64) -> Self {
        Error::NotFound {
            entity_type: entity_type.into(),
            id,
        }
    }

    /// Callers may retry the operation that produced this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Concurrency { .. })
    }

    /// The error blocks a backend location from being used at all
    pub fn is_migration_failure(&self) -> bool {
        matches!(
            self,
            Error::MigrationGap { .. } | Error::UnsupportedVersion { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
