//! Repositories
//!
//! A [`RecordRepository`] serves one entity type over one storage adapter.
//! It is shared by every caller of the owning manager. [`Repository<T>`] is
//! the typed handle application code uses.
//!
//! Writes go through a per-repository mutex so the sequence
//! validate → uniqueness check → id allocation → write cannot interleave
//! with another write to the same entity type.

use nousdata_core::{Entity, EntitySchema, Error, Filter, Record, Result, Value};
use nousdata_storage::{IdentityAllocator, StorageAdapter};
use parking_lot::Mutex;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    /// Insert when the id is 0, replace otherwise
    Save,
    /// Replace an existing record only
    Update,
}

/// Untyped repository for one entity type.
pub struct RecordRepository {
    schema: Arc<EntitySchema>,
    adapter: Arc<dyn StorageAdapter>,
    ids: Arc<IdentityAllocator>,
    write_lock: Mutex<()>,
}

impl fmt::Debug for RecordRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordRepository")
            .field("entity_type", &self.schema.entity_type())
            .field("location", &self.adapter.location())
            .finish()
    }
}

impl RecordRepository {
    /// Repository over `adapter`; `ids` must have the entity type registered.
    pub fn new(
        schema: Arc<EntitySchema>,
        adapter: Arc<dyn StorageAdapter>,
        ids: Arc<IdentityAllocator>,
    ) -> Self {
        Self {
            schema,
            adapter,
            ids,
            write_lock: Mutex::new(()),
        }
    }

    /// Entity type served
    pub fn entity_type(&self) -> &str {
        self.schema.entity_type()
    }

    /// Declared schema
    pub fn schema(&self) -> &Arc<EntitySchema> {
        &self.schema
    }

    /// Underlying adapter
    pub fn adapter(&self) -> &Arc<dyn StorageAdapter> {
        &self.adapter
    }

    /// Validate and persist `record`, allocating an id when it has none.
    pub fn save(&self, record: Record) -> Result<Record> {
        self.schema.validate(&record)?;
        self.persist(record, WriteMode::Save)
    }

    /// Like [`save`](Self::save) but the id must already be stored.
    pub fn update(&self, record: Record) -> Result<Record> {
        self.schema.validate(&record)?;
        self.persist(record, WriteMode::Update)
    }

    fn persist(&self, mut record: Record, mode: WriteMode) -> Result<Record> {
        let _guard = self.write_lock.lock();

        let id = record.id();
        if mode == WriteMode::Update && (id == 0 || !self.adapter.exists(id)?) {
            return Err(Error::not_found(self.entity_type(), id));
        }

        self.check_unique(&record)?;

        if id == 0 {
            let id = self.ids.next(self.entity_type())?;
            record.set_id(id);
        }
        let saved = self.adapter.save(record)?;
        debug!(
            target: "nousdata::engine",
            entity_type = self.entity_type(),
            id = saved.id(),
            created = id == 0,
            "Saved record"
        );
        Ok(saved)
    }

    /// Fail with `Conflict` when a different stored record holds the same
    /// value in any unique field. Null values never conflict.
    fn check_unique(&self, record: &Record) -> Result<()> {
        let unique: Vec<(&str, &Value)> = self
            .schema
            .unique_fields()
            .map(|def| (def.name.as_str(), record.get_or_null(&def.name)))
            .filter(|(_, value)| !value.is_null())
            .collect();
        if unique.is_empty() {
            return Ok(());
        }

        let id = record.id();
        for (field, value) in unique {
            let clash = self
                .find_by(&Filter::eq(field, value.clone()))?
                .into_iter()
                .find(|existing| existing.id() != id);
            if let Some(existing) = clash {
                return Err(Error::Conflict {
                    entity_type: self.entity_type().to_string(),
                    field: field.to_string(),
                    value: value.to_string(),
                    existing_id: existing.id(),
                });
            }
        }
        Ok(())
    }

    fn conform(&self, record: Record) -> Result<Record> {
        self.schema
            .conform(record)
            .map_err(|detail| Error::corruption(self.adapter.location(), detail))
    }

    /// Record with `id`, if stored
    pub fn load(&self, id: u64) -> Result<Option<Record>> {
        self.adapter.load(id)?.map(|r| self.conform(r)).transpose()
    }

    /// Record with `id`; `NotFound` if absent
    pub fn get(&self, id: u64) -> Result<Record> {
        self.load(id)?
            .ok_or_else(|| Error::not_found(self.entity_type(), id))
    }

    /// Every record in backend order
    pub fn load_all(&self) -> Result<Vec<Record>> {
        self.adapter
            .load_all()?
            .into_iter()
            .map(|r| self.conform(r))
            .collect()
    }

    /// Remove the record with `id`; false when it was not stored
    pub fn delete(&self, id: u64) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let removed = self.adapter.delete(id)?;
        debug!(target: "nousdata::engine", entity_type = self.entity_type(), id, removed, "Deleted record");
        Ok(removed)
    }

    /// Whether `id` is stored
    pub fn exists(&self, id: u64) -> Result<bool> {
        self.adapter.exists(id)
    }

    /// Number of stored records
    pub fn count(&self) -> Result<usize> {
        self.adapter.count()
    }

    /// Records matching `filter`, in backend order
    pub fn find_by(&self, filter: &Filter) -> Result<Vec<Record>> {
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect())
    }

    /// First record matching `filter`
    pub fn find_one_by(&self, filter: &Filter) -> Result<Option<Record>> {
        Ok(self.load_all()?.into_iter().find(|r| filter.matches(r)))
    }
}

/// Typed repository handle. Cheap to clone; clones share one
/// [`RecordRepository`].
pub struct Repository<T: Entity> {
    inner: Arc<RecordRepository>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> fmt::Debug for Repository<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Repository").field(&self.inner).finish()
    }
}

impl<T: Entity> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> Repository<T> {
    /// Typed view over `inner`; its entity type must be `T::ENTITY_TYPE`.
    pub fn new(inner: Arc<RecordRepository>) -> Result<Self> {
        if inner.entity_type() != T::ENTITY_TYPE {
            return Err(Error::Config(format!(
                "repository for {} cannot serve {}",
                inner.entity_type(),
                T::ENTITY_TYPE
            )));
        }
        Ok(Self {
            inner,
            _entity: PhantomData,
        })
    }

    /// The shared untyped repository
    pub fn records(&self) -> &Arc<RecordRepository> {
        &self.inner
    }

    fn checked(&self, entity: &T) -> Result<Record> {
        let record = entity.to_record();
        self.inner.schema().validate(&record)?;
        entity.validate()?;
        Ok(record)
    }

    fn entity(record: &Record) -> Result<T> {
        T::from_record(record)
    }

    /// Persist `entity`; a new id is assigned when `entity.id()` is 0.
    ///
    /// # Errors
    ///
    /// `Validation` when a field rule fails, `Conflict` when a unique field
    /// is already used by another record. Nothing is written in either case.
    pub fn save(&self, entity: T) -> Result<T> {
        let record = self.checked(&entity)?;
        let saved = self.inner.persist(record, WriteMode::Save)?;
        let mut entity = entity;
        entity.set_id(saved.id());
        Ok(entity)
    }

    /// Replace a stored entity; `NotFound` when its id is 0 or not stored.
    pub fn update(&self, entity: T) -> Result<T> {
        let record = self.checked(&entity)?;
        self.inner.persist(record, WriteMode::Update)?;
        Ok(entity)
    }

    /// Entity with `id`, if stored
    pub fn load(&self, id: u64) -> Result<Option<T>> {
        self.inner.load(id)?.as_ref().map(Self::entity).transpose()
    }

    /// Entity with `id`; `NotFound` if absent
    pub fn get(&self, id: u64) -> Result<T> {
        Self::entity(&self.inner.get(id)?)
    }

    /// Every entity in backend order
    pub fn load_all(&self) -> Result<Vec<T>> {
        self.inner.load_all()?.iter().map(Self::entity).collect()
    }

    /// Remove the entity with `id`; false when it was not stored
    pub fn delete(&self, id: u64) -> Result<bool> {
        self.inner.delete(id)
    }

    /// Whether `id` is stored
    pub fn exists(&self, id: u64) -> Result<bool> {
        self.inner.exists(id)
    }

    /// Number of stored entities
    pub fn count(&self) -> Result<usize> {
        self.inner.count()
    }

    /// Entities matching `filter`, in backend order
    pub fn find_by(&self, filter: &Filter) -> Result<Vec<T>> {
        self.inner.find_by(filter)?.iter().map(Self::entity).collect()
    }

    /// First entity matching `filter`
    pub fn find_one_by(&self, filter: &Filter) -> Result<Option<T>> {
        self.inner
            .find_one_by(filter)?
            .as_ref()
            .map(Self::entity)
            .transpose()
    }

    /// Entities for which `predicate` holds, in backend order
    pub fn find_where(&self, predicate: impl Fn(&T) -> bool) -> Result<Vec<T>> {
        let mut out = Vec::new();
        for record in self.inner.load_all()? {
            let entity = Self::entity(&record)?;
            if predicate(&entity) {
                out.push(entity);
            }
        }
        Ok(out)
    }
}
