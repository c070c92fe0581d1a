//! Relational backend on SQLite
//!
//! One database file holds every entity type configured for it: one table
//! per entity type plus a shared metadata table,
//!
//! ```sql
//! CREATE TABLE _nousdata_meta (
//!     collection TEXT PRIMARY KEY,
//!     schema_version INTEGER NOT NULL,
//!     last_id INTEGER NOT NULL
//! );
//! ```
//!
//! Column types follow the declared field types: `bool` and `int` map to
//! INTEGER, `float` to REAL, `text` and `date` to TEXT. Declared fields
//! missing from an existing table are added with `ALTER TABLE ADD COLUMN`
//! before the next write.
//!
//! Writes run in `BEGIN IMMEDIATE` transactions. A connection is shared by
//! every adapter on the same file and guarded by a mutex; contention with
//! other processes is handled by SQLite's busy timeout and surfaces as
//! `Error::Concurrency` when it expires.

use crate::adapter::{
    apply_declared_types, require_id, BackendKind, Collection, CollectionMeta, LockOptions,
    RewriteFn, StorageAdapter,
};
use crate::codec::columns;
use nousdata_core::{EntitySchema, Error, FieldType, Record, Result, Value, ID_FIELD};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{
    params, params_from_iter, Connection, ErrorCode, OptionalExtension, TransactionBehavior,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const META_TABLE: &str = "_nousdata_meta";

/// A shared connection to one SQLite database file.
#[derive(Clone)]
pub struct SqliteDatabase {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
    lock: LockOptions,
}

impl SqliteDatabase {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>, lock: LockOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let location = path.display().to_string();
        let conn = Connection::open(&path).map_err(|e| map_sql_error(&location, e))?;
        let db = Self::init(path, conn, lock)?;
        info!(target: "nousdata::storage", path = %location, "Opened SQLite database");
        Ok(db)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| map_sql_error(":memory:", e))?;
        Self::init(PathBuf::from(":memory:"), conn, LockOptions::default())
    }

    fn init(path: PathBuf, conn: Connection, lock: LockOptions) -> Result<Self> {
        let location = path.display().to_string();
        conn.busy_timeout(lock.total_wait())
            .map_err(|e| map_sql_error(&location, e))?;
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                collection TEXT PRIMARY KEY,
                schema_version INTEGER NOT NULL,
                last_id INTEGER NOT NULL
            );",
            META_TABLE
        ))
        .map_err(|e| map_sql_error(&location, e))?;
        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
            lock,
        })
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connection(&self, location: &str) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .try_lock_for(self.lock.total_wait())
            .ok_or_else(|| Error::concurrency(location, "timed out waiting for the connection"))
    }
}

/// Options for one SQLite-backed collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqliteOptions {
    /// Schema version stamped on the first write
    pub initial_version: u32,
    /// Refuse inserts beyond this many records
    pub max_records: Option<usize>,
}

impl SqliteOptions {
    /// Defaults with the given initial schema version
    pub fn new(initial_version: u32) -> Self {
        Self {
            initial_version,
            max_records: None,
        }
    }
}

/// Adapter storing one entity type in one table.
pub struct SqliteAdapter {
    db: SqliteDatabase,
    schema: Arc<EntitySchema>,
    table: String,
    options: SqliteOptions,
}

impl SqliteAdapter {
    /// Adapter for `schema` in `db`. The table is created on first write.
    pub fn new(db: SqliteDatabase, schema: Arc<EntitySchema>, options: SqliteOptions) -> Self {
        let table = schema.entity_type().to_string();
        Self {
            db,
            schema,
            table,
            options,
        }
    }

    /// Table holding the records
    pub fn table(&self) -> &str {
        &self.table
    }

    fn err(&self, e: rusqlite::Error) -> Error {
        map_sql_error(&self.location(), e)
    }

    fn table_exists(&self, conn: &Connection) -> Result<bool> {
        conn.query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![self.table],
            |_| Ok(()),
        )
        .optional()
        .map(|found| found.is_some())
        .map_err(|e| self.err(e))
    }

    fn table_columns(&self, conn: &Connection) -> Result<HashSet<String>> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({})", quote(&self.table)))
            .map_err(|e| self.err(e))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .map_err(|e| self.err(e))?
            .collect::<rusqlite::Result<HashSet<_>>>()
            .map_err(|e| self.err(e))?;
        Ok(names)
    }

    /// SQL type of a column: declared type, else inferred from sample values.
    fn column_type<'a>(&self, name: &str, mut sample: impl Iterator<Item = &'a Value>) -> &'static str {
        let ty = self
            .schema
            .field_def(name)
            .map(|d| d.field_type)
            .or_else(|| sample.find_map(|v| v.field_type()));
        match ty {
            Some(FieldType::Bool) | Some(FieldType::Int) => "INTEGER",
            Some(FieldType::Float) => "REAL",
            Some(FieldType::Text) | Some(FieldType::Date) | None => "TEXT",
        }
    }

    fn column_def(&self, name: &str, records: &[Record]) -> String {
        if name == ID_FIELD {
            return format!("{} INTEGER PRIMARY KEY", quote(ID_FIELD));
        }
        let ty = self.column_type(name, records.iter().filter_map(|r| r.get(name)));
        format!("{} {}", quote(name), ty)
    }

    /// Create the table or add missing columns for `fields`.
    fn ensure_table<'a>(
        &self,
        conn: &Connection,
        fields: impl IntoIterator<Item = &'a str>,
        records: &[Record],
    ) -> Result<()> {
        let mut seen = HashSet::new();
        let fields: Vec<&str> = fields.into_iter().filter(|f| seen.insert(*f)).collect();
        if !self.table_exists(conn)? {
            let mut defs: Vec<String> = vec![self.column_def(ID_FIELD, records)];
            defs.extend(
                fields
                    .iter()
                    .filter(|f| **f != ID_FIELD)
                    .map(|f| self.column_def(f, records)),
            );
            conn.execute_batch(&format!(
                "CREATE TABLE {} ({});",
                quote(&self.table),
                defs.join(", ")
            ))
            .map_err(|e| self.err(e))?;
            debug!(target: "nousdata::storage", table = %self.table, "Created table");
            return Ok(());
        }

        let existing = self.table_columns(conn)?;
        for field in fields {
            if existing.contains(field) {
                continue;
            }
            conn.execute_batch(&format!(
                "ALTER TABLE {} ADD COLUMN {};",
                quote(&self.table),
                self.column_def(field, records)
            ))
            .map_err(|e| self.err(e))?;
            debug!(target: "nousdata::storage", table = %self.table, column = field, "Added column");
        }
        Ok(())
    }

    fn read_rows(&self, conn: &Connection, id: Option<u64>) -> Result<Vec<Record>> {
        if !self.table_exists(conn)? {
            return Ok(Vec::new());
        }
        let sql = match id {
            Some(_) => format!("SELECT * FROM {} WHERE {} = ?1", quote(&self.table), quote(ID_FIELD)),
            None => format!("SELECT * FROM {} ORDER BY {}", quote(&self.table), quote(ID_FIELD)),
        };
        let mut stmt = conn.prepare(&sql).map_err(|e| self.err(e))?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = match id {
            Some(id) => stmt.query(params![id as i64]),
            None => stmt.query([]),
        }
        .map_err(|e| self.err(e))?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().map_err(|e| self.err(e))? {
            let mut raw = Record::new();
            for (i, name) in names.iter().enumerate() {
                let value = match row.get_ref(i).map_err(|e| self.err(e))? {
                    ValueRef::Null => Value::Null,
                    ValueRef::Integer(n) => Value::Int(n),
                    ValueRef::Real(x) => Value::Float(x),
                    ValueRef::Text(bytes) => {
                        Value::Text(String::from_utf8(bytes.to_vec()).map_err(|e| {
                            Error::corruption(self.location(), format!("column '{}': {}", name, e))
                        })?)
                    }
                    ValueRef::Blob(_) => {
                        return Err(Error::corruption(
                            self.location(),
                            format!("column '{}' holds a blob", name),
                        ))
                    }
                };
                raw.set(name.clone(), value);
            }
            let record = apply_declared_types(&self.schema, raw)
                .map_err(|e| Error::corruption(self.location(), e))?;
            records.push(record);
        }
        Ok(records)
    }

    /// Stored metadata. Tables written without a metadata row are treated
    /// as current-version data, with `last_id` taken from the largest id.
    fn read_meta(&self, conn: &Connection) -> Result<Option<CollectionMeta>> {
        let stored = conn
            .query_row(
                &format!(
                    "SELECT schema_version, last_id FROM {} WHERE collection = ?1",
                    META_TABLE
                ),
                params![self.table],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()
            .map_err(|e| self.err(e))?;

        if let Some((version, last_id)) = stored {
            let schema_version = u32::try_from(version).map_err(|_| {
                Error::corruption(self.location(), format!("invalid schema_version {}", version))
            })?;
            let last_id = u64::try_from(last_id).map_err(|_| {
                Error::corruption(self.location(), format!("invalid last_id {}", last_id))
            })?;
            return Ok(Some(CollectionMeta {
                schema_version,
                last_id,
            }));
        }

        if !self.table_exists(conn)? {
            return Ok(None);
        }
        let max_id: Option<i64> = conn
            .query_row(
                &format!("SELECT MAX({}) FROM {}", quote(ID_FIELD), quote(&self.table)),
                [],
                |row| row.get(0),
            )
            .map_err(|e| self.err(e))?;
        Ok(max_id.map(|id| CollectionMeta {
            schema_version: self.options.initial_version,
            last_id: id.max(0) as u64,
        }))
    }

    fn write_meta(&self, conn: &Connection, meta: &CollectionMeta) -> Result<()> {
        conn.execute(
            &format!(
                "INSERT INTO {} (collection, schema_version, last_id) VALUES (?1, ?2, ?3)
                 ON CONFLICT(collection) DO UPDATE SET
                     schema_version = excluded.schema_version,
                     last_id = excluded.last_id",
                META_TABLE
            ),
            params![self.table, meta.schema_version, meta.last_id as i64],
        )
        .map_err(|e| self.err(e))?;
        Ok(())
    }

    fn insert(&self, conn: &Connection, record: &Record) -> Result<()> {
        let names: Vec<&str> = record.field_names().collect();
        let sql = format!(
            "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
            quote(&self.table),
            names.iter().map(|n| quote(n)).collect::<Vec<_>>().join(", "),
            (1..=names.len()).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ")
        );
        let values = record.iter().map(|(_, v)| to_sql(v));
        conn.execute(&sql, params_from_iter(values))
            .map_err(|e| self.err(e))?;
        Ok(())
    }

    fn count_rows(&self, conn: &Connection) -> Result<usize> {
        if !self.table_exists(conn)? {
            return Ok(0);
        }
        let n: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", quote(&self.table)), [], |row| {
                row.get(0)
            })
            .map_err(|e| self.err(e))?;
        Ok(n.max(0) as usize)
    }

    fn row_exists(&self, conn: &Connection, id: u64) -> Result<bool> {
        if !self.table_exists(conn)? {
            return Ok(false);
        }
        conn.query_row(
            &format!("SELECT 1 FROM {} WHERE {} = ?1", quote(&self.table), quote(ID_FIELD)),
            params![id as i64],
            |_| Ok(()),
        )
        .optional()
        .map(|found| found.is_some())
        .map_err(|e| self.err(e))
    }
}

impl StorageAdapter for SqliteAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn location(&self) -> String {
        format!("{}#{}", self.db.path.display(), self.table)
    }

    fn load_all(&self) -> Result<Vec<Record>> {
        let conn = self.db.connection(&self.location())?;
        self.read_rows(&conn, None)
    }

    fn load(&self, id: u64) -> Result<Option<Record>> {
        let conn = self.db.connection(&self.location())?;
        Ok(self.read_rows(&conn, Some(id))?.into_iter().next())
    }

    fn exists(&self, id: u64) -> Result<bool> {
        let conn = self.db.connection(&self.location())?;
        self.row_exists(&conn, id)
    }

    fn count(&self) -> Result<usize> {
        let conn = self.db.connection(&self.location())?;
        self.count_rows(&conn)
    }

    fn save(&self, record: Record) -> Result<Record> {
        let id = require_id(&self.location(), &record)?;
        let mut conn = self.db.connection(&self.location())?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| self.err(e))?;

        if let Some(limit) = self.options.max_records {
            if !self.row_exists(&tx, id)? && self.count_rows(&tx)? >= limit {
                return Err(Error::CapacityExceeded {
                    location: self.location(),
                    limit,
                });
            }
        }

        let mut meta = self
            .read_meta(&tx)?
            .unwrap_or_else(|| CollectionMeta::fresh(self.options.initial_version));
        self.ensure_table(
            &tx,
            self.schema.field_names().chain(record.field_names()),
            std::slice::from_ref(&record),
        )?;
        self.insert(&tx, &record)?;
        meta.observe(id);
        self.write_meta(&tx, &meta)?;
        tx.commit().map_err(|e| self.err(e))?;
        Ok(record)
    }

    fn delete(&self, id: u64) -> Result<bool> {
        let mut conn = self.db.connection(&self.location())?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| self.err(e))?;
        if !self.table_exists(&tx)? {
            return Ok(false);
        }
        let removed = tx
            .execute(
                &format!("DELETE FROM {} WHERE {} = ?1", quote(&self.table), quote(ID_FIELD)),
                params![id as i64],
            )
            .map_err(|e| self.err(e))?;
        tx.commit().map_err(|e| self.err(e))?;
        Ok(removed > 0)
    }

    fn metadata(&self) -> Result<Option<CollectionMeta>> {
        let conn = self.db.connection(&self.location())?;
        self.read_meta(&conn)
    }

    fn allocate_id(&self) -> Result<u64> {
        let mut conn = self.db.connection(&self.location())?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| self.err(e))?;
        let mut meta = self
            .read_meta(&tx)?
            .unwrap_or_else(|| CollectionMeta::fresh(self.options.initial_version));
        meta.last_id += 1;
        self.write_meta(&tx, &meta)?;
        tx.commit().map_err(|e| self.err(e))?;
        Ok(meta.last_id)
    }

    fn rewrite(&self, f: &mut RewriteFn<'_>) -> Result<bool> {
        let mut conn = self.db.connection(&self.location())?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| self.err(e))?;

        let current = match self.read_meta(&tx)? {
            Some(meta) => Some(Collection {
                meta,
                records: self.read_rows(&tx, None)?,
            }),
            None => None,
        };
        let next = match f(current)? {
            Some(next) => next,
            None => return Ok(false),
        };

        for record in &next.records {
            require_id(&self.location(), record)?;
        }
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {};", quote(&self.table)))
            .map_err(|e| self.err(e))?;
        let columns = columns(&self.schema, &next.records);
        self.ensure_table(&tx, columns.iter().map(String::as_str), &next.records)?;
        for record in &next.records {
            self.insert(&tx, record)?;
        }
        self.write_meta(&tx, &next.meta)?;
        tx.commit().map_err(|e| self.err(e))?;
        debug!(
            target: "nousdata::storage",
            location = %self.location(),
            records = next.records.len(),
            "Rewrote table"
        );
        Ok(true)
    }
}

/// Quote an SQL identifier
fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Date(_) => SqlValue::Text(value.to_string()),
    }
}

/// Busy and locked databases are retryable; everything else is a database error.
fn map_sql_error(location: &str, e: rusqlite::Error) -> Error {
    match e {
        rusqlite::Error::SqliteFailure(ref err, _)
            if matches!(err.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) =>
        {
            Error::concurrency(location, e.to_string())
        }
        rusqlite::Error::SqliteFailure(ref err, _)
            if matches!(err.code, ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase) =>
        {
            Error::corruption(location, e.to_string())
        }
        other => Error::Database(format!("{}: {}", location, other)),
    }
}
