//! CSV codec
//!
//! ```text
//! #nousdata entity=Author schema_version=1 last_id=2
//! id,name,born
//! 1,Miguel de Cervantes,1547-09-29
//! 2,"Borges, Jorge Luis",\N
//! ```
//!
//! The first line carries the collection metadata, the second the column
//! header. Null is written as `\N`; a text value starting with a backslash
//! gets one more. Values are typed back using the schema.

use super::{columns, format_meta_line, parse_meta_line, DocumentCodec, NULL_MARKER};
use crate::adapter::{apply_declared_types, BackendKind, Collection};
use nousdata_core::{EntitySchema, Record, Value};
use std::sync::Arc;

/// Comma-separated values with a metadata line.
pub struct CsvCodec {
    schema: Arc<EntitySchema>,
}

impl CsvCodec {
    /// Codec for collections of `schema`
    pub fn new(schema: Arc<EntitySchema>) -> Self {
        Self { schema }
    }
}

fn encode_cell(value: &Value) -> String {
    match value {
        Value::Null => NULL_MARKER.to_string(),
        Value::Text(s) if s.starts_with('\\') => format!("\\{}", s),
        other => other.to_string(),
    }
}

fn decode_cell(cell: &str) -> Value {
    if cell == NULL_MARKER {
        Value::Null
    } else if let Some(rest) = cell.strip_prefix('\\') {
        Value::Text(rest.to_string())
    } else {
        Value::Text(cell.to_string())
    }
}

impl DocumentCodec for CsvCodec {
    fn kind(&self) -> BackendKind {
        BackendKind::Csv
    }

    fn encode(&self, collection: &Collection) -> Result<Vec<u8>, String> {
        let mut out = format_meta_line(self.schema.entity_type(), &collection.meta).into_bytes();
        let columns = columns(&self.schema, &collection.records);
        {
            let mut writer = csv::Writer::from_writer(&mut out);
            writer.write_record(&columns).map_err(|e| e.to_string())?;
            for record in &collection.records {
                let row = columns.iter().map(|c| encode_cell(record.get_or_null(c)));
                writer.write_record(row).map_err(|e| e.to_string())?;
            }
            writer.flush().map_err(|e| e.to_string())?;
        }
        Ok(out)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Collection, String> {
        let text = std::str::from_utf8(bytes).map_err(|e| format!("invalid UTF-8: {}", e))?;
        if !text.ends_with('\n') {
            return Err("file is truncated: missing final line break".to_string());
        }
        let (entity, meta, body) = parse_meta_line(text)?;
        if entity != self.schema.entity_type() {
            return Err(format!(
                "file holds '{}' records, expected '{}'",
                entity,
                self.schema.entity_type()
            ));
        }
        if body.is_empty() {
            return Err("missing column header".to_string());
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(body.as_bytes());
        let header = reader.headers().map_err(|e| e.to_string())?.clone();
        if !header.iter().any(|h| h == nousdata_core::ID_FIELD) {
            return Err("column header lacks 'id'".to_string());
        }

        let mut records = Vec::new();
        for (index, row) in reader.records().enumerate() {
            let row = row.map_err(|e| format!("row {}: {}", index + 1, e))?;
            let raw: Record = header
                .iter()
                .zip(row.iter())
                .map(|(name, cell)| (name.to_string(), decode_cell(cell)))
                .collect();
            let record = apply_declared_types(&self.schema, raw)
                .map_err(|e| format!("row {}: {}", index + 1, e))?;
            records.push(record);
        }

        Ok(Collection { meta, records })
    }
}
