//! File-backed adapters
//!
//! JSON, XML, CSV and delimited text share one adapter, [`FileAdapter`],
//! parameterized by a [`DocumentCodec`] that turns a whole [`Collection`]
//! into bytes and back.
//!
//! ## Whole-collection rewrite
//!
//! Each file holds the entire collection of one entity type. Every mutation
//! loads the document, modifies it in memory and rewrites the whole file.
//! This bounds file backends to collections that fit comfortably in memory;
//! `FileOptions::max_records` turns that into an explicit limit.
//!
//! ## Atomic replacement
//!
//! Writes go to `<file>.tmp`, are fsynced, then renamed over the original,
//! so concurrent readers see either the old or the new document, never a
//! partial one.
//!
//! ## Locking
//!
//! Mutations take an in-process mutex and an advisory `fs2` lock on
//! `<file>.lock`, held until the write is renamed into place. Both are
//! released on every exit path by [`LocationLock`]'s drop.

use crate::adapter::{
    require_id, BackendKind, Collection, CollectionMeta, LockOptions, RewriteFn, StorageAdapter,
};
use crate::codec::{get_codec, DocumentCodec};
use fs2::FileExt;
use nousdata_core::{EntitySchema, Error, Record, Result};
use parking_lot::{Mutex, MutexGuard};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-location options for file adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileOptions {
    /// Schema version stamped on the first write to a new file
    pub initial_version: u32,
    /// Lock acquisition policy
    pub lock: LockOptions,
    /// Refuse inserts beyond this many records
    pub max_records: Option<usize>,
}

impl FileOptions {
    /// Defaults with the given initial schema version
    pub fn new(initial_version: u32) -> Self {
        Self {
            initial_version,
            lock: LockOptions::default(),
            max_records: None,
        }
    }
}

/// Exclusive hold on one file location.
pub struct LocationLock<'a> {
    _local: MutexGuard<'a, ()>,
    file: File,
}

impl Drop for LocationLock<'_> {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// A storage adapter keeping one collection in one file.
pub struct FileAdapter {
    path: PathBuf,
    codec: Box<dyn DocumentCodec>,
    options: FileOptions,
    local: Mutex<()>,
}

impl FileAdapter {
    /// Create an adapter for `path`. The file is not touched until first write.
    pub fn new(path: impl Into<PathBuf>, codec: Box<dyn DocumentCodec>, options: FileOptions) -> Self {
        Self {
            path: path.into(),
            codec,
            options,
            local: Mutex::new(()),
        }
    }

    /// Adapter for a document format, picking the codec for `kind`.
    pub fn open(
        kind: BackendKind,
        path: impl Into<PathBuf>,
        schema: Arc<EntitySchema>,
        options: FileOptions,
    ) -> Result<Self> {
        Ok(Self::new(path, get_codec(kind, schema)?, options))
    }

    /// Path of the data file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        sidecar(&self.path, "lock")
    }

    fn location_str(&self) -> String {
        self.path.display().to_string()
    }

    /// Acquire the exclusive lock, retrying per [`LockOptions`].
    pub fn lock(&self) -> Result<LocationLock<'_>> {
        let opts = self.options.lock;
        let local = self.local.try_lock_for(opts.total_wait()).ok_or_else(|| {
            Error::concurrency(self.location_str(), "timed out waiting for in-process lock")
        })?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(self.lock_path())?;

        let mut attempt = 0;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    return Ok(LocationLock {
                        _local: local,
                        file,
                    })
                }
                Err(e) if attempt < opts.retries => {
                    attempt += 1;
                    warn!(
                        target: "nousdata::storage",
                        location = %self.path.display(),
                        attempt,
                        error = %e,
                        "File lock busy, retrying"
                    );
                    std::thread::sleep(opts.retry_interval);
                }
                Err(e) => {
                    return Err(Error::concurrency(
                        self.location_str(),
                        format!("file lock not acquired after {} attempts: {}", attempt + 1, e),
                    ))
                }
            }
        }
    }

    /// Read and decode the file; `None` when it does not exist.
    fn read(&self) -> Result<Option<Collection>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if bytes.is_empty() {
            return Err(Error::corruption(self.location_str(), "file is empty"));
        }
        self.codec
            .decode(&bytes)
            .map(Some)
            .map_err(|detail| Error::corruption(self.location_str(), detail))
    }

    fn read_or_fresh(&self) -> Result<Collection> {
        Ok(self
            .read()?
            .unwrap_or_else(|| Collection::empty(self.options.initial_version)))
    }

    /// Encode and atomically replace the file. Caller holds the lock.
    fn write(&self, collection: &Collection, _lock: &LocationLock<'_>) -> Result<()> {
        let bytes = self
            .codec
            .encode(collection)
            .map_err(Error::Serialization)?;
        write_atomic(&self.path, &bytes)?;
        debug!(
            target: "nousdata::storage",
            location = %self.path.display(),
            records = collection.records.len(),
            bytes = bytes.len(),
            "Rewrote collection"
        );
        Ok(())
    }

    fn check_capacity(&self, collection: &Collection) -> Result<()> {
        match self.options.max_records {
            Some(limit) if collection.records.len() >= limit => Err(Error::CapacityExceeded {
                location: self.location_str(),
                limit,
            }),
            _ => Ok(()),
        }
    }
}

impl StorageAdapter for FileAdapter {
    fn kind(&self) -> BackendKind {
        self.codec.kind()
    }

    fn location(&self) -> String {
        self.location_str()
    }

    fn load_all(&self) -> Result<Vec<Record>> {
        Ok(self.read()?.map(|c| c.records).unwrap_or_default())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.read()?.map(|c| c.records.len()).unwrap_or(0))
    }

    fn save(&self, record: Record) -> Result<Record> {
        let id = require_id(&self.location_str(), &record)?;
        let lock = self.lock()?;
        let mut collection = self.read_or_fresh()?;
        if collection.position(id).is_none() {
            self.check_capacity(&collection)?;
        }
        collection.upsert(record.clone());
        self.write(&collection, &lock)?;
        Ok(record)
    }

    fn delete(&self, id: u64) -> Result<bool> {
        let lock = self.lock()?;
        let mut collection = match self.read()? {
            Some(c) => c,
            None => return Ok(false),
        };
        if !collection.remove(id) {
            return Ok(false);
        }
        self.write(&collection, &lock)?;
        Ok(true)
    }

    fn metadata(&self) -> Result<Option<CollectionMeta>> {
        Ok(self.read()?.map(|c| c.meta))
    }

    fn allocate_id(&self) -> Result<u64> {
        let lock = self.lock()?;
        let mut collection = self.read_or_fresh()?;
        collection.meta.last_id += 1;
        self.write(&collection, &lock)?;
        Ok(collection.meta.last_id)
    }

    fn rewrite(&self, f: &mut RewriteFn<'_>) -> Result<bool> {
        let lock = self.lock()?;
        let current = self.read()?;
        match f(current)? {
            Some(next) => {
                self.write(&next, &lock)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// `<path>.<suffix>` next to `path`
fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Write `bytes` to `path` using write-fsync-rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let temp_path = sidecar(path, "tmp");

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&temp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    // Sync parent directory so the rename itself is durable
    #[cfg(unix)]
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            File::open(parent)?.sync_all()?;
        }
    }
    Ok(())
}
