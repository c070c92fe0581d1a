//! Data file corruption utilities
//!
//! # Corruption Types
//!
//! - Truncation: removes bytes from the file tail (crash during write)
//! - Garbage: appends invalid bytes (partial foreign write)
//! - Byte flip: overwrites one byte (storage degradation)

use crate::adapter::StorageAdapter;
use nousdata_core::Error;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Corrupts one data file in place.
pub struct FileCorruptionTester {
    path: PathBuf,
}

impl FileCorruptionTester {
    /// Tester for the data file at `path`
    pub fn new(path: impl AsRef<Path>) -> Self {
        FileCorruptionTester {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the file under test
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove `bytes_to_remove` bytes from the end of the file.
    ///
    /// Leaves the file untouched when it is not longer than that.
    pub fn truncate_tail(&self, bytes_to_remove: usize) -> std::io::Result<TruncationResult> {
        let original_size = fs::metadata(&self.path)?.len();
        if original_size <= bytes_to_remove as u64 {
            return Ok(TruncationResult {
                original_size,
                new_size: original_size,
                bytes_removed: 0,
            });
        }

        let new_size = original_size - bytes_to_remove as u64;
        let file = OpenOptions::new().write(true).open(&self.path)?;
        file.set_len(new_size)?;

        Ok(TruncationResult {
            original_size,
            new_size,
            bytes_removed: bytes_to_remove,
        })
    }

    /// Append `garbage` to the end of the file
    pub fn append_garbage(&self, garbage: &[u8]) -> std::io::Result<GarbageResult> {
        let original_size = fs::metadata(&self.path)?.len();
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(garbage)?;

        Ok(GarbageResult {
            original_size,
            new_size: original_size + garbage.len() as u64,
            bytes_appended: garbage.len(),
        })
    }

    /// Replace the byte at `offset` with `value`
    pub fn overwrite_byte(&self, offset: usize, value: u8) -> std::io::Result<bool> {
        let mut data = fs::read(&self.path)?;
        match data.get_mut(offset) {
            Some(byte) => {
                *byte = value;
                fs::write(&self.path, data)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Load everything through `adapter` and classify the outcome.
    pub fn verify_load(&self, adapter: &dyn StorageAdapter) -> LoadVerification {
        match adapter.load_all() {
            Ok(records) => LoadVerification {
                reported_corruption: false,
                records_loaded: records.len(),
                error: None,
            },
            Err(e) => LoadVerification {
                reported_corruption: matches!(e, Error::Corruption { .. }),
                records_loaded: 0,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Result of truncation
#[derive(Debug)]
pub struct TruncationResult {
    /// Original file size
    pub original_size: u64,
    /// New file size after truncation
    pub new_size: u64,
    /// Bytes removed
    pub bytes_removed: usize,
}

/// Result of appending garbage
#[derive(Debug)]
pub struct GarbageResult {
    /// Original file size
    pub original_size: u64,
    /// New file size after append
    pub new_size: u64,
    /// Bytes appended
    pub bytes_appended: usize,
}

/// Outcome of loading a possibly damaged file
#[derive(Debug)]
pub struct LoadVerification {
    /// Load failed with `Error::Corruption`
    pub reported_corruption: bool,
    /// Records returned when the load succeeded
    pub records_loaded: usize,
    /// Error message if the load failed
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_truncate_tail() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.txt");
        fs::write(&path, vec![b'x'; 100]).unwrap();

        let result = FileCorruptionTester::new(&path).truncate_tail(30).unwrap();
        assert_eq!(result.bytes_removed, 30);
        assert_eq!(result.new_size, 70);
        assert_eq!(fs::metadata(&path).unwrap().len(), 70);
    }

    #[test]
    fn test_truncate_more_than_file_is_noop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.txt");
        fs::write(&path, b"abc").unwrap();

        let result = FileCorruptionTester::new(&path).truncate_tail(10).unwrap();
        assert_eq!(result.bytes_removed, 0);
        assert_eq!(fs::read(&path).unwrap(), b"abc");
    }

    #[test]
    fn test_append_garbage_and_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.txt");
        fs::write(&path, b"abc").unwrap();

        let tester = FileCorruptionTester::new(&path);
        let result = tester.append_garbage(b"GARBAGE").unwrap();
        assert_eq!(result.new_size, 10);
        assert!(tester.overwrite_byte(0, b'z').unwrap());
        assert!(!tester.overwrite_byte(99, b'z').unwrap());
        assert_eq!(fs::read(&path).unwrap(), b"zbcGARBAGE");
    }
}
