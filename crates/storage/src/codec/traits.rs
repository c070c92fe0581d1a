//! Document codec trait definitions.

use crate::adapter::{BackendKind, Collection};

/// Encoding of a whole collection as one document.
///
/// File adapters read and write through a codec: every byte of a data file
/// is produced by `encode` and consumed by `decode`.
///
/// # Thread Safety
///
/// Codecs must be `Send + Sync`; one adapter serves every thread.
///
/// # Errors
///
/// Both directions report failures as plain messages. The adapter attaches
/// the file location and classifies decode failures as corruption.
pub trait DocumentCodec: Send + Sync {
    /// Format produced by this codec
    fn kind(&self) -> BackendKind;

    /// Serialize the collection
    fn encode(&self, collection: &Collection) -> Result<Vec<u8>, String>;

    /// Parse a document. Any malformation is an error; nothing is skipped.
    fn decode(&self, bytes: &[u8]) -> Result<Collection, String>;
}
