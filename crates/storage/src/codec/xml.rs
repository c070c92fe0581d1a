//! XML document codec
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <collection entity="Author" schema_version="1" last_id="2">
//!   <record>
//!     <field name="id" type="int">1</field>
//!     <field name="name" type="text">Miguel de Cervantes</field>
//!     <field name="born" type="null"/>
//!   </record>
//! </collection>
//! ```
//!
//! Every field carries its type, so values come back typed without the
//! schema. Text is never trimmed; leading and trailing whitespace survives.

use super::DocumentCodec;
use crate::adapter::{apply_declared_types, BackendKind, Collection, CollectionMeta};
use nousdata_core::{EntitySchema, FieldType, Record, Value};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::sync::Arc;

const COLLECTION: &str = "collection";
const RECORD: &str = "record";
const FIELD: &str = "field";
const NULL_TYPE: &str = "null";

/// Indented XML, one document per entity type.
pub struct XmlCodec {
    schema: Arc<EntitySchema>,
}

impl XmlCodec {
    /// Codec for collections of `schema`
    pub fn new(schema: Arc<EntitySchema>) -> Self {
        Self { schema }
    }
}

impl DocumentCodec for XmlCodec {
    fn kind(&self) -> BackendKind {
        BackendKind::Xml
    }

    fn encode(&self, collection: &Collection) -> Result<Vec<u8>, String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        let err = |e: quick_xml::Error| e.to_string();

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(err)?;

        let version = collection.meta.schema_version.to_string();
        let last_id = collection.meta.last_id.to_string();
        let mut root = BytesStart::new(COLLECTION);
        root.push_attribute(("entity", self.schema.entity_type()));
        root.push_attribute(("schema_version", version.as_str()));
        root.push_attribute(("last_id", last_id.as_str()));

        if collection.records.is_empty() {
            writer.write_event(Event::Empty(root)).map_err(err)?;
        } else {
            writer.write_event(Event::Start(root)).map_err(err)?;
            for record in &collection.records {
                writer
                    .write_event(Event::Start(BytesStart::new(RECORD)))
                    .map_err(err)?;
                for (name, value) in record.iter() {
                    let mut field = BytesStart::new(FIELD);
                    field.push_attribute(("name", name));
                    match value.field_type() {
                        None => {
                            field.push_attribute(("type", NULL_TYPE));
                            writer.write_event(Event::Empty(field)).map_err(err)?;
                        }
                        Some(ty) => {
                            field.push_attribute(("type", ty.as_str()));
                            let text = value.to_string();
                            writer.write_event(Event::Start(field)).map_err(err)?;
                            writer
                                .write_event(Event::Text(BytesText::new(&text)))
                                .map_err(err)?;
                            writer
                                .write_event(Event::End(BytesEnd::new(FIELD)))
                                .map_err(err)?;
                        }
                    }
                }
                writer
                    .write_event(Event::End(BytesEnd::new(RECORD)))
                    .map_err(err)?;
            }
            writer
                .write_event(Event::End(BytesEnd::new(COLLECTION)))
                .map_err(err)?;
        }

        let mut bytes = writer.into_inner();
        bytes.push(b'\n');
        Ok(bytes)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Collection, String> {
        let text = std::str::from_utf8(bytes).map_err(|e| format!("invalid UTF-8: {}", e))?;
        let mut reader = Reader::from_str(text);

        let mut meta: Option<CollectionMeta> = None;
        let mut closed = false;
        let mut records = Vec::new();
        let mut current: Option<Record> = None;
        let mut field: Option<PendingField> = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| format!("at byte {}: {}", reader.buffer_position(), e))?;
            match event {
                Event::Eof => break,
                Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}

                Event::Start(e) | Event::Empty(e) if closed => {
                    return Err(format!(
                        "element <{}> after end of collection",
                        String::from_utf8_lossy(e.name().as_ref())
                    ))
                }

                Event::Start(e) => match e.name().as_ref() {
                    b"collection" => {
                        if meta.is_some() {
                            return Err("nested <collection>".to_string());
                        }
                        meta = Some(self.collection_meta(&e)?);
                    }
                    b"record" => {
                        if meta.is_none() || current.is_some() {
                            return Err("misplaced <record>".to_string());
                        }
                        current = Some(Record::new());
                    }
                    b"field" => {
                        if current.is_none() || field.is_some() {
                            return Err("misplaced <field>".to_string());
                        }
                        field = Some(PendingField::from_element(&e)?);
                    }
                    other => {
                        return Err(format!(
                            "unexpected element <{}>",
                            String::from_utf8_lossy(other)
                        ))
                    }
                },

                Event::Empty(e) => match e.name().as_ref() {
                    b"collection" => {
                        if meta.is_some() {
                            return Err("nested <collection>".to_string());
                        }
                        meta = Some(self.collection_meta(&e)?);
                        closed = true;
                    }
                    b"record" => {
                        if meta.is_none() || current.is_some() {
                            return Err("misplaced <record>".to_string());
                        }
                        records.push(self.finish_record(Record::new(), records.len())?);
                    }
                    b"field" => {
                        let record = current
                            .as_mut()
                            .ok_or_else(|| "misplaced <field>".to_string())?;
                        PendingField::from_element(&e)?.finish(record)?;
                    }
                    other => {
                        return Err(format!(
                            "unexpected element <{}>",
                            String::from_utf8_lossy(other)
                        ))
                    }
                },

                Event::Text(t) => {
                    let unescaped = t.unescape().map_err(|e| e.to_string())?;
                    match field.as_mut() {
                        Some(f) => f.text.push_str(&unescaped),
                        None if unescaped.trim().is_empty() => {}
                        None => return Err(format!("unexpected text '{}'", unescaped.trim())),
                    }
                }

                Event::CData(c) => match field.as_mut() {
                    Some(f) => f.text.push_str(
                        std::str::from_utf8(&c.into_inner())
                            .map_err(|e| format!("invalid UTF-8 in CDATA: {}", e))?,
                    ),
                    None => return Err("unexpected CDATA section".to_string()),
                },

                Event::End(e) => match e.name().as_ref() {
                    b"field" => {
                        let pending = field
                            .take()
                            .ok_or_else(|| "unbalanced </field>".to_string())?;
                        let record = current
                            .as_mut()
                            .ok_or_else(|| "misplaced </field>".to_string())?;
                        pending.finish(record)?;
                    }
                    b"record" => {
                        let record = current
                            .take()
                            .ok_or_else(|| "unbalanced </record>".to_string())?;
                        records.push(self.finish_record(record, records.len())?);
                    }
                    b"collection" => closed = true,
                    _ => {}
                },
            }
        }

        let meta = meta.ok_or_else(|| "missing <collection> element".to_string())?;
        if !closed {
            return Err("document is truncated: <collection> never closed".to_string());
        }
        Ok(Collection { meta, records })
    }
}

impl XmlCodec {
    fn collection_meta(&self, e: &BytesStart<'_>) -> Result<CollectionMeta, String> {
        let mut entity = None;
        let mut version = None;
        let mut last_id = None;
        for (key, value) in attributes(e)? {
            match key.as_str() {
                "entity" => entity = Some(value),
                "schema_version" => {
                    version = Some(value.parse::<u32>().map_err(|e| format!("schema_version: {}", e))?)
                }
                "last_id" => last_id = Some(value.parse::<u64>().map_err(|e| format!("last_id: {}", e))?),
                _ => {}
            }
        }
        match entity {
            Some(ref found) if found != self.schema.entity_type() => {
                return Err(format!(
                    "document holds '{}' records, expected '{}'",
                    found,
                    self.schema.entity_type()
                ))
            }
            Some(_) => {}
            None => return Err("<collection> lacks an entity attribute".to_string()),
        }
        match (version, last_id) {
            (Some(schema_version), Some(last_id)) => Ok(CollectionMeta {
                schema_version,
                last_id,
            }),
            _ => Err("<collection> lacks schema_version or last_id".to_string()),
        }
    }

    fn finish_record(&self, record: Record, index: usize) -> Result<Record, String> {
        apply_declared_types(&self.schema, record).map_err(|e| format!("record {}: {}", index, e))
    }
}

/// A `<field>` whose text is still being read.
struct PendingField {
    name: String,
    ty: Option<FieldType>,
    text: String,
}

impl PendingField {
    fn from_element(e: &BytesStart<'_>) -> Result<Self, String> {
        let mut name = None;
        let mut ty = None;
        for (key, value) in attributes(e)? {
            match key.as_str() {
                "name" => name = Some(value),
                "type" => ty = Some(value),
                _ => {}
            }
        }
        let name = name.ok_or_else(|| "<field> lacks a name attribute".to_string())?;
        let ty = match ty.as_deref() {
            Some(NULL_TYPE) => None,
            Some(other) => Some(
                FieldType::parse(other)
                    .ok_or_else(|| format!("field '{}' has unknown type '{}'", name, other))?,
            ),
            None => return Err(format!("field '{}' lacks a type attribute", name)),
        };
        Ok(Self {
            name,
            ty,
            text: String::new(),
        })
    }

    fn finish(self, record: &mut Record) -> Result<(), String> {
        if record.contains(&self.name) {
            return Err(format!("field '{}' appears twice", self.name));
        }
        let value = match self.ty {
            None => Value::Null,
            Some(FieldType::Text) => Value::Text(self.text),
            Some(ty) => Value::Text(self.text)
                .coerce(ty)
                .map_err(|e| format!("field '{}': {}", self.name, e))?,
        };
        record.set(self.name, value);
        Ok(())
    }
}

fn attributes(e: &BytesStart<'_>) -> Result<Vec<(String, String)>, String> {
    e.attributes()
        .map(|attr| {
            let attr = attr.map_err(|e| e.to_string())?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| e.to_string())?
                .into_owned();
            Ok((key, value))
        })
        .collect()
}
