//! Format conversion
//!
//! Copies one entity type's whole collection, version marker and identity
//! counter included, from one adapter to another; for example from a JSON
//! file into a SQLite table. The source is read under its own lock and the
//! target is written under the target's exclusive lock. The source is left
//! untouched.

use nousdata_core::{Error, Result};
use nousdata_storage::{Collection, StorageAdapter};
use tracing::info;

/// Outcome of [`convert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionReport {
    /// Source location
    pub from: String,
    /// Target location
    pub to: String,
    /// Records copied
    pub records: usize,
    /// Version marker carried over; `None` when the source had no data
    pub schema_version: Option<u32>,
    /// Identity counter carried over
    pub last_id: u64,
}

/// Copy everything stored at `from` into `to`.
///
/// The target must hold no records. A source with no data copies nothing.
pub fn convert(from: &dyn StorageAdapter, to: &dyn StorageAdapter) -> Result<ConversionReport> {
    let mut snapshot: Option<Collection> = None;
    from.rewrite(&mut |current| {
        snapshot = current;
        Ok(None)
    })?;

    let mut report = ConversionReport {
        from: from.location(),
        to: to.location(),
        records: 0,
        schema_version: None,
        last_id: 0,
    };
    let source = match snapshot {
        Some(source) => source,
        None => return Ok(report),
    };

    let target_location = to.location();
    let mut payload = Some(source.clone());
    to.rewrite(&mut |existing| {
        if let Some(existing) = existing {
            if !existing.records.is_empty() {
                return Err(Error::Config(format!(
                    "cannot convert into {}: it already holds {} records",
                    target_location,
                    existing.records.len()
                )));
            }
        }
        Ok(payload.take())
    })?;

    report.records = source.records.len();
    report.schema_version = Some(source.meta.schema_version);
    report.last_id = source.meta.last_id;
    info!(
        target: "nousdata::migration",
        from = %report.from,
        to = %report.to,
        count = report.records,
        "Converted collection"
    );
    Ok(report)
}
