//! Pipe-delimited text codec
//!
//! ```text
//! #nousdata entity=Author schema_version=1 last_id=2
//! id|name|born
//! 1|Miguel de Cervantes|1547-09-29
//! 2|Jorge Luis Borges|\N
//! ```
//!
//! One record per line. Inside a field `\\`, `\|`, `\n` and `\r` stand for
//! backslash, pipe, line feed and carriage return; a field consisting of
//! exactly `\N` is Null.

use super::{columns, format_meta_line, parse_meta_line, DocumentCodec, NULL_MARKER};
use crate::adapter::{apply_declared_types, BackendKind, Collection};
use nousdata_core::{EntitySchema, Record, Value};
use std::sync::Arc;

const DELIMITER: char = '|';

/// Delimited text with a metadata line.
pub struct TextCodec {
    schema: Arc<EntitySchema>,
}

impl TextCodec {
    /// Codec for collections of `schema`
    pub fn new(schema: Arc<EntitySchema>) -> Self {
        Self { schema }
    }
}

fn escape(raw: &str, out: &mut String) {
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            DELIMITER => out.push_str("\\|"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
}

fn write_line<'a>(fields: impl Iterator<Item = Field<'a>>, out: &mut String) {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            out.push(DELIMITER);
        }
        match field {
            Field::Null => out.push_str(NULL_MARKER),
            Field::Text(s) => escape(s, out),
        }
    }
    out.push('\n');
}

enum Field<'a> {
    Null,
    Text(&'a str),
}

/// Split one line into unescaped fields.
fn split_line(line: &str) -> Result<Vec<Value>, String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut escaped_null = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('\\') => current.push('\\'),
                Some('|') => current.push('|'),
                Some('n') => current.push('\n'),
                Some('r') => current.push('\r'),
                Some('N') if current.is_empty() && !escaped_null => escaped_null = true,
                Some(other) => return Err(format!("unknown escape '\\{}'", other)),
                None => return Err("line ends inside an escape".to_string()),
            },
            DELIMITER => {
                fields.push(finish_field(&mut current, &mut escaped_null)?);
            }
            c => {
                if escaped_null {
                    return Err("unexpected text after \\N".to_string());
                }
                current.push(c);
            }
        }
    }
    fields.push(finish_field(&mut current, &mut escaped_null)?);
    Ok(fields)
}

fn finish_field(current: &mut String, escaped_null: &mut bool) -> Result<Value, String> {
    if *escaped_null {
        if !current.is_empty() {
            return Err("unexpected text after \\N".to_string());
        }
        *escaped_null = false;
        return Ok(Value::Null);
    }
    Ok(Value::Text(std::mem::take(current)))
}

impl DocumentCodec for TextCodec {
    fn kind(&self) -> BackendKind {
        BackendKind::Text
    }

    fn encode(&self, collection: &Collection) -> Result<Vec<u8>, String> {
        let mut out = format_meta_line(self.schema.entity_type(), &collection.meta);
        let columns = columns(&self.schema, &collection.records);
        write_line(columns.iter().map(|c| Field::Text(c)), &mut out);

        let mut rendered = Vec::with_capacity(columns.len());
        for record in &collection.records {
            rendered.clear();
            rendered.extend(columns.iter().map(|c| match record.get_or_null(c) {
                Value::Null => None,
                v => Some(v.to_string()),
            }));
            write_line(
                rendered.iter().map(|v| match v {
                    None => Field::Null,
                    Some(s) => Field::Text(s),
                }),
                &mut out,
            );
        }
        Ok(out.into_bytes())
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

        let mut lines = body.lines();
        let header = lines
            .next()
            .ok_or_else(|| "missing column header".to_string())?;
        let header: Vec<String> = split_line(header)?
            .into_iter()
            .map(|v| match v {
                Value::Text(name) if !name.is_empty() => Ok(name),
                _ => Err("column header holds an empty or null name".to_string()),
            })
            .collect::<Result<_, String>>()?;
        if !header.iter().any(|h| h == nousdata_core::ID_FIELD) {
            return Err("column header lacks 'id'".to_string());
        }

        let mut records = Vec::new();
        for (index, line) in lines.enumerate() {
            let line_no = index + 3;
            let values = split_line(line).map_err(|e| format!("line {}: {}", line_no, e))?;
            if values.len() != header.len() {
                return Err(format!(
                    "line {}: expected {} fields, found {}",
                    line_no,
                    header.len(),
                    values.len()
                ));
            }
            let raw: Record = header.iter().cloned().zip(values).collect();
            let record = apply_declared_types(&self.schema, raw)
                .map_err(|e| format!("line {}: {}", line_no, e))?;
            records.push(record);
        }

        Ok(Collection { meta, records })
    }
}
