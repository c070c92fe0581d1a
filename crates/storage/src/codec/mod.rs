//! Document codecs for file-backed storage.
//!
//! Each file format is a [`DocumentCodec`] turning a whole collection into
//! bytes and back:
//!
//! - `json`: pretty-printed JSON document
//! - `xml`: XML document with typed fields
//! - `csv`: comma-separated values with a metadata line
//! - `text`: pipe-delimited text with a metadata line
//!
//! # Usage
//!
//! ```ignore
//! use nousdata_storage::codec::get_codec;
//!
//! let codec = get_codec(BackendKind::Json, schema)?;
//! let bytes = codec.encode(&collection)?;
//! let back = codec.decode(&bytes)?;
//! ```

mod csv;
mod json;
mod text;
mod traits;
mod xml;

pub use self::csv::CsvCodec;
pub use self::json::JsonCodec;
pub use self::text::TextCodec;
pub use self::traits::DocumentCodec;
pub use self::xml::XmlCodec;

use crate::adapter::{BackendKind, CollectionMeta};
use nousdata_core::{EntitySchema, Error, Record, Result};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Get the codec for a file-based backend kind.
///
/// # Known Codecs
///
/// - `json`, `xml`, `csv`, `text`
///
/// `sqlite` and `memory` are not document formats and are rejected.
pub fn get_codec(kind: BackendKind, schema: Arc<EntitySchema>) -> Result<Box<dyn DocumentCodec>> {
    match kind {
        BackendKind::Json => Ok(Box::new(JsonCodec::new(schema))),
        BackendKind::Xml => Ok(Box::new(XmlCodec::new(schema))),
        BackendKind::Csv => Ok(Box::new(CsvCodec::new(schema))),
        BackendKind::Text => Ok(Box::new(TextCodec::new(schema))),
        BackendKind::Sqlite | BackendKind::Memory => Err(Error::Config(format!(
            "'{}' is not a document format",
            kind
        ))),
    }
}

// ============================================================================
// Metadata line shared by the CSV and text codecs
// ============================================================================

const META_PREFIX: &str = "#nousdata";

/// Marker for Null in tabular formats.
pub(crate) const NULL_MARKER: &str = "\\N";

/// Render `#nousdata entity=<type> schema_version=<n> last_id=<n>`.
pub(crate) fn format_meta_line(entity_type: &str, meta: &CollectionMeta) -> String {
    format!(
        "{} entity={} schema_version={} last_id={}\n",
        META_PREFIX, entity_type, meta.schema_version, meta.last_id
    )
}

/// Split the metadata line off a document and parse it.
///
/// Returns the entity type, the metadata and the remainder of the document.
pub(crate) fn parse_meta_line(
    text: &str,
) -> std::result::Result<(String, CollectionMeta, &str), String> {
    let (line, rest) = text
        .split_once('\n')
        .ok_or_else(|| "missing metadata line".to_string())?;
    let mut tokens = line.trim_end_matches('\r').split_whitespace();
    if tokens.next() != Some(META_PREFIX) {
        return Err(format!("expected '{}' metadata line", META_PREFIX));
    }

    let mut entity = None;
    let mut version = None;
    let mut last_id = None;
    for token in tokens {
        let (key, value) = token
            .split_once('=')
            .ok_or_else(|| format!("malformed metadata token '{}'", token))?;
        match key {
            "entity" => entity = Some(value.to_string()),
            "schema_version" => {
                version = Some(value.parse::<u32>().map_err(|e| format!("schema_version: {}", e))?)
            }
            "last_id" => {
                last_id = Some(value.parse::<u64>().map_err(|e| format!("last_id: {}", e))?)
            }
            _ => {}
        }
    }

    match (entity, version, last_id) {
        (Some(entity), Some(schema_version), Some(last_id)) => Ok((
            entity,
            CollectionMeta {
                schema_version,
                last_id,
            },
            rest,
        )),
        _ => Err("metadata line lacks entity, schema_version or last_id".to_string()),
    }
}

/// Column order for tabular formats: declared fields, then any other
/// field found in the records, alphabetically.
pub(crate) fn columns(schema: &EntitySchema, records: &[Record]) -> Vec<String> {
    let mut columns: Vec<String> = schema.field_names().map(str::to_string).collect();
    let extra: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.field_names())
        .filter(|name| !schema.has_field(name))
        .collect();
    columns.extend(extra.into_iter().map(str::to_string));
    columns
}
