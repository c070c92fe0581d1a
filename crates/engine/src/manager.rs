//! Entity manager
//!
//! The single entry point for persistence: owns the configuration, the
//! registered schemas and migrations, the identity allocator and one cached
//! repository per entity type. There is no global instance; share a manager
//! between threads through `Arc`.
//!
//! The first request for an entity type binds its adapter and runs the
//! migration manager against its location. A failed migration is returned
//! to the caller and nothing is cached, so no repository is ever handed out
//! for a location whose data does not match the code.

use crate::config::{EngineConfig, CONFIG_FILE_NAME};
use crate::registry::AdapterRegistry;
use crate::repository::{RecordRepository, Repository};
use crate::stats::EntityStats;
use nousdata_core::{Entity, EntitySchema, Error, Result};
use nousdata_migration::{Migration, MigrationManager};
use nousdata_storage::{BackendKind, IdentityAllocator};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Registry of entity types and their repositories.
pub struct EntityManager {
    config: EngineConfig,
    schemas: BTreeMap<String, Arc<EntitySchema>>,
    migrations: MigrationManager,
    ids: Arc<IdentityAllocator>,
    adapters: AdapterRegistry,
    repositories: Mutex<HashMap<String, Arc<RecordRepository>>>,
}

impl EntityManager {
    /// Start configuring a manager
    pub fn builder() -> EntityManagerBuilder {
        EntityManagerBuilder::new()
    }

    /// Configuration in effect
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Registered entity types, sorted
    pub fn entity_types(&self) -> Vec<&str> {
        self.schemas.keys().map(String::as_str).collect()
    }

    /// Registered schema of `entity_type`
    pub fn schema(&self, entity_type: &str) -> Result<&Arc<EntitySchema>> {
        self.schemas
            .get(entity_type)
            .ok_or_else(|| Error::UnknownEntity(entity_type.to_string()))
    }

    /// Backend configured for `entity_type`
    pub fn backend_for(&self, entity_type: &str) -> Result<BackendKind> {
        self.schema(entity_type)?;
        self.config.backend_for(entity_type)
    }

    /// Typed repository for `T`.
    ///
    /// # Errors
    ///
    /// `UnknownEntity` when `T` was not registered; migration and I/O
    /// errors from binding its location on first use.
    pub fn get_repository<T: Entity>(&self) -> Result<Repository<T>> {
        Repository::new(self.get_repository_by_name(T::ENTITY_TYPE)?)
    }

    /// Shared untyped repository for `entity_type`.
    ///
    /// Repeated calls return the same instance.
    pub fn get_repository_by_name(&self, entity_type: &str) -> Result<Arc<RecordRepository>> {
        // Held through binding and migration so each location is migrated once
        let mut repositories = self.repositories.lock();
        if let Some(repo) = repositories.get(entity_type) {
            return Ok(Arc::clone(repo));
        }

        let schema = Arc::clone(self.schema(entity_type)?);
        let binding = self.config.binding_for(entity_type)?;
        let adapter = self.adapters.open_adapter(Arc::clone(&schema), &binding)?;

        let report = match self.migrations.run(&schema, adapter.as_ref()) {
            Ok(report) => report,
            Err(e) => {
                warn!(
                    target: "nousdata::engine",
                    entity_type,
                    location = %adapter.location(),
                    error = %e,
                    "Location blocked, repository not created"
                );
                return Err(e);
            }
        };

        self.ids.register(entity_type, Arc::clone(&adapter));
        let repo = Arc::new(RecordRepository::new(
            schema,
            Arc::clone(&adapter),
            Arc::clone(&self.ids),
        ));
        repositories.insert(entity_type.to_string(), Arc::clone(&repo));

        info!(
            target: "nousdata::engine",
            entity_type,
            backend = %binding.kind,
            location = %adapter.location(),
            stored_version = ?report.stored_version,
            migrated = report.migrated(),
            "Repository ready"
        );
        Ok(repo)
    }

    /// Statistics for every registered entity type, sorted by type.
    pub fn stats(&self) -> Result<Vec<EntityStats>> {
        self.schemas
            .iter()
            .map(|(name, schema)| -> Result<EntityStats> {
                let repo = self.get_repository_by_name(name)?;
                let adapter = repo.adapter();
                let meta = adapter.metadata()?;
                Ok(EntityStats {
                    entity_type: name.clone(),
                    backend: adapter.kind(),
                    location: adapter.location(),
                    count: adapter.count()?,
                    stored_version: meta.map(|m| m.schema_version),
                    schema_version: schema.version(),
                    last_id: meta.map_or(0, |m| m.last_id),
                })
            })
            .collect()
    }
}

/// Builder for [`EntityManager`].
///
/// ```ignore
/// let manager = EntityManager::builder()
///     .data_dir("/var/lib/library")
///     .register::<Author>()
///     .register::<Book>()
///     .migration(Migration::new("Book", 1).add_field("genre", "unknown"))
///     .build()?;
/// let books = manager.get_repository::<Book>()?;
/// ```
#[derive(Default)]
pub struct EntityManagerBuilder {
    config: Option<EngineConfig>,
    config_file: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    schemas: Vec<EntitySchema>,
    migrations: Vec<Migration>,
    eager_migrations: bool,
}

impl EntityManagerBuilder {
    /// Builder with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `config` as is
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Load configuration from `path`, creating a default file if missing.
    /// Ignored when [`config`](Self::config) is also given.
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Override the data directory of whichever configuration is used
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Register the typed entity `T`
    pub fn register<T: Entity>(self) -> Self {
        self.register_schema(T::schema())
    }

    /// Register an entity type by schema alone
    pub fn register_schema(mut self, schema: EntitySchema) -> Self {
        self.schemas.push(schema);
        self
    }

    /// Register a migration
    pub fn migration(mut self, migration: Migration) -> Self {
        self.migrations.push(migration);
        self
    }

    /// Bind and migrate every entity type during [`build`](Self::build)
    /// instead of on first use
    pub fn eager_migrations(mut self, eager: bool) -> Self {
        self.eager_migrations = eager;
        self
    }

    /// Build the manager.
    ///
    /// # Errors
    ///
    /// `Config` for an invalid configuration, a type registered twice or a
    /// migration for an unregistered type. With eager migrations, the first
    /// binding or migration error.
    pub fn build(self) -> Result<EntityManager> {
        let mut config = match (self.config, self.config_file) {
            (Some(config), _) => config,
            (None, Some(path)) => {
                let path = if path.is_dir() {
                    path.join(CONFIG_FILE_NAME)
                } else {
                    path
                };
                EngineConfig::write_default_if_missing(&path)?;
                EngineConfig::from_file(&path)?
            }
            (None, None) => EngineConfig::default(),
        };
        if let Some(dir) = self.data_dir {
            config.data_dir = Some(dir);
        }
        config.validate()?;

        let mut schemas = BTreeMap::new();
        for schema in self.schemas {
            let name = schema.entity_type().to_string();
            if schemas.insert(name.clone(), Arc::new(schema)).is_some() {
                return Err(Error::Config(format!(
                    "entity type {} registered twice",
                    name
                )));
            }
        }

        let mut migrations = MigrationManager::new();
        for migration in self.migrations {
            if !schemas.contains_key(migration.entity_type()) {
                return Err(Error::Config(format!(
                    "migration for unregistered entity type {}",
                    migration.entity_type()
                )));
            }
            migrations.register(migration)?;
        }

        let manager = EntityManager {
            adapters: AdapterRegistry::new(config.lock.options()),
            config,
            schemas,
            migrations,
            ids: Arc::new(IdentityAllocator::new()),
            repositories: Mutex::new(HashMap::new()),
        };

        info!(
            target: "nousdata::engine",
            data_dir = %manager.config.data_dir().display(),
            entity_types = manager.schemas.len(),
            default_backend = %manager.config.default.backend,
            "Entity manager built"
        );

        if self.eager_migrations {
            for name in manager.schemas.keys() {
                manager.get_repository_by_name(name)?;
            }
        }
        Ok(manager)
    }
}
