//! Migration manager
//!
//! Brings one location's stored records up to the schema version the
//! running code expects.
//!
//! ## State machine
//!
//! ```text
//! Unchecked -> VersionRead -> UpToDate ----------------> Ready
//!                          \-> Migrating -> UpToDate --/
//! ```
//!
//! The stored version marker is read, a plan of consecutive migrations is
//! built, and all steps are applied in memory. The migrated collection and
//! the new marker are written back in one rewrite under the location's
//! exclusive lock, so a failure anywhere leaves the old data and the old
//! marker in place.
//!
//! A location that has never been written has no marker and is not
//! migrated; its first write stamps it with the current version.

use crate::step::Migration;
use nousdata_core::{EntitySchema, Error, Result};
use nousdata_storage::StorageAdapter;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::{debug, info, warn};

/// Where a location is in the migration state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    /// Nothing read yet
    Unchecked,
    /// Marker read; `None` when the location holds no data
    VersionRead(Option<u32>),
    /// Applying migrations
    Migrating {
        /// Stored version
        from: u32,
        /// Target version
        to: u32,
    },
    /// Stored data matches the expected version
    UpToDate,
    /// Repositories may be handed out
    Ready,
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationState::Unchecked => f.write_str("unchecked"),
            MigrationState::VersionRead(Some(v)) => write!(f, "version-read({})", v),
            MigrationState::VersionRead(None) => f.write_str("version-read(empty)"),
            MigrationState::Migrating { from, to } => write!(f, "migrating({} -> {})", from, to),
            MigrationState::UpToDate => f.write_str("up-to-date"),
            MigrationState::Ready => f.write_str("ready"),
        }
    }
}

/// Outcome of [`MigrationManager::run`] on one location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Entity type of the location
    pub entity_type: String,
    /// Adapter location
    pub location: String,
    /// Marker found on disk; `None` for a location with no data
    pub stored_version: Option<u32>,
    /// Version the data is at now
    pub current_version: u32,
    /// `from_version` of each migration applied, ascending
    pub applied: Vec<u32>,
    /// Records rewritten
    pub records: usize,
    /// Final state, always [`MigrationState::Ready`] on success
    pub state: MigrationState,
}

impl MigrationReport {
    /// True when at least one migration was applied
    pub fn migrated(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// Registry of migrations, keyed by entity type and source version.
#[derive(Debug, Clone, Default)]
pub struct MigrationManager {
    migrations: HashMap<String, BTreeMap<u32, Migration>>,
}

impl MigrationManager {
    /// Manager with no migrations
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a migration.
    ///
    /// Two migrations out of the same version of the same type are a
    /// configuration error.
    pub fn register(&mut self, migration: Migration) -> Result<()> {
        let by_version = self
            .migrations
            .entry(migration.entity_type().to_string())
            .or_default();
        if by_version.contains_key(&migration.from_version()) {
            return Err(Error::Config(format!(
                "duplicate migration for {} from version {}",
                migration.entity_type(),
                migration.from_version()
            )));
        }
        by_version.insert(migration.from_version(), migration);
        Ok(())
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(mut self, migration: Migration) -> Result<Self> {
        self.register(migration)?;
        Ok(self)
    }

    /// Entity types with at least one migration
    pub fn entity_types(&self) -> impl Iterator<Item = &str> {
        self.migrations.keys().map(String::as_str)
    }

    /// Migrations taking `entity_type` from `stored` to `target`, ascending.
    ///
    /// Fails with `UnsupportedVersion` when `stored > target` and with
    /// `MigrationGap` naming the first version without a migration.
    pub fn plan(&self, entity_type: &str, stored: u32, target: u32) -> Result<Vec<&Migration>> {
        self.plan_at(entity_type, entity_type, stored, target)
    }

    fn plan_at(
        &self,
        location: &str,
        entity_type: &str,
        stored: u32,
        target: u32,
    ) -> Result<Vec<&Migration>> {
        if stored > target {
            return Err(Error::UnsupportedVersion {
                location: location.to_string(),
                stored,
                supported: target,
            });
        }
        let by_version = self.migrations.get(entity_type);
        (stored..target)
            .map(|version| {
                by_version
                    .and_then(|m| m.get(&version))
                    .ok_or_else(|| Error::MigrationGap {
                        entity_type: entity_type.to_string(),
                        missing_from: version,
                    })
            })
            .collect()
    }

    /// Bring the location behind `adapter` up to `schema.version()`.
    ///
    /// Running twice is a no-op the second time.
    pub fn run(&self, schema: &EntitySchema, adapter: &dyn StorageAdapter) -> Result<MigrationReport> {
        let entity_type = schema.entity_type();
        let target = schema.version();
        let location = adapter.location();
        let mut report = MigrationReport {
            entity_type: entity_type.to_string(),
            location: location.clone(),
            stored_version: None,
            current_version: target,
            applied: Vec::new(),
            records: 0,
            state: MigrationState::Unchecked,
        };

        // Cheap check without the exclusive lock
        let peek = adapter.metadata()?;
        match peek {
            None => {
                debug!(target: "nousdata::migration", entity_type, %location, "No stored data, nothing to migrate");
                report.state = MigrationState::Ready;
                return Ok(report);
            }
            Some(meta) if meta.schema_version == target => {
                debug!(target: "nousdata::migration", entity_type, %location, version = target, "Up to date");
                report.stored_version = Some(target);
                report.state = MigrationState::Ready;
                return Ok(report);
            }
            Some(meta) => {
                // Surface plan errors before taking the lock
                self.plan_at(&location, entity_type, meta.schema_version, target)?;
            }
        }

        let mut state = MigrationState::Unchecked;
        let mut applied = Vec::new();
        let mut stored_version = None;
        let mut records = 0;

        let result = adapter.rewrite(&mut |current| {
            let mut collection = match current {
                Some(c) => c,
                None => {
                    state = MigrationState::VersionRead(None);
                    return Ok(None);
                }
            };
            let stored = collection.meta.schema_version;
            stored_version = Some(stored);
            state = MigrationState::VersionRead(Some(stored));
            debug!(target: "nousdata::migration", entity_type, %location, %state, "Read version marker");

            if stored == target {
                state = MigrationState::UpToDate;
                return Ok(None);
            }

            let plan = self.plan_at(&location, entity_type, stored, target)?;
            state = MigrationState::Migrating {
                from: stored,
                to: target,
            };
            debug!(target: "nousdata::migration", entity_type, %location, %state, steps = plan.len(), "Migrating");

            for migration in plan {
                migration.apply(&mut collection.records)?;
                applied.push(migration.from_version());
                debug!(
                    target: "nousdata::migration",
                    entity_type,
                    from = migration.from_version(),
                    to = migration.to_version(),
                    steps = ?migration.steps(),
                    "Applied migration"
                );
            }
            collection.meta.schema_version = target;
            records = collection.records.len();
            state = MigrationState::UpToDate;
            Ok(Some(collection))
        });

        if let Err(e) = result {
            warn!(target: "nousdata::migration", entity_type, %location, error = %e, "Migration failed");
            return Err(e);
        }

        debug!(target: "nousdata::migration", entity_type, %location, %state, "Migration check finished");
        if !applied.is_empty() {
            info!(
                target: "nousdata::migration",
                entity_type,
                %location,
                from = ?stored_version,
                to = target,
                count = records,
                "Migration applied"
            );
        }

        report.stored_version = stored_version;
        report.applied = applied;
        report.records = records;
        report.state = MigrationState::Ready;
        Ok(report)
    }
}
