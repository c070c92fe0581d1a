//! JSON document codec
//!
//! ```json
//! {
//!   "entity": "Author",
//!   "schema_version": 1,
//!   "last_id": 2,
//!   "records": [ { "id": 1, "name": "Miguel de Cervantes" } ]
//! }
//! ```
//!
//! Dates are ISO `YYYY-MM-DD` strings and are typed back using the schema.

use super::DocumentCodec;
use crate::adapter::{apply_declared_types, BackendKind, Collection, CollectionMeta};
use nousdata_core::{EntitySchema, Record, Value};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Serialize, Deserialize)]
struct JsonDocument {
    entity: String,
    schema_version: u32,
    last_id: u64,
    records: Vec<serde_json::Map<String, serde_json::Value>>,
}

/// Pretty-printed JSON, one document per entity type.
pub struct JsonCodec {
    schema: Arc<EntitySchema>,
}

impl JsonCodec {
    /// Codec for collections of `schema`
    pub fn new(schema: Arc<EntitySchema>) -> Self {
        Self { schema }
    }
}

impl DocumentCodec for JsonCodec {
    fn kind(&self) -> BackendKind {
        BackendKind::Json
    }

    fn encode(&self, collection: &Collection) -> Result<Vec<u8>, String> {
        let doc = JsonDocument {
            entity: self.schema.entity_type().to_string(),
            schema_version: collection.meta.schema_version,
            last_id: collection.meta.last_id,
            records: collection
                .records
                .iter()
                .map(|r| r.iter().map(|(k, v)| (k.to_string(), v.to_json())).collect())
                .collect(),
        };
        let mut bytes = serde_json::to_vec_pretty(&doc).map_err(|e| e.to_string())?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Collection, String> {
        let doc: JsonDocument = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
        if doc.entity != self.schema.entity_type() {
            return Err(format!(
                "document holds '{}' records, expected '{}'",
                doc.entity,
                self.schema.entity_type()
            ));
        }

        let mut records = Vec::with_capacity(doc.records.len());
        for (index, object) in doc.records.into_iter().enumerate() {
            let raw = object
                .into_iter()
                .map(|(k, v)| {
                    Value::from_json(v)
                        .map(|v| (k.clone(), v))
                        .map_err(|e| format!("record {} field '{}': {}", index, k, e))
                })
                .collect::<Result<Record, String>>()?;
            let record = apply_declared_types(&self.schema, raw)
                .map_err(|e| format!("record {}: {}", index, e))?;
            records.push(record);
        }

        Ok(Collection {
            meta: CollectionMeta {
                schema_version: doc.schema_version,
                last_id: doc.last_id,
            },
            records,
        })
    }
}
