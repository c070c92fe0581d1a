//! Record: the serialized form of one entity instance
//!
//! A record maps field names to [`Value`]s. Storage adapters read and write
//! records; typed entities convert to and from them. The typed accessors
//! return [`Error::Serialization`] when a field is missing or has the wrong
//! type, which is what `Entity::from_record` implementations propagate.

use crate::error::{Error, Result};
use crate::schema::ID_FIELD;
use crate::value::Value;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field name → value mapping for one stored entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Set a field, replacing any previous value
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Get a field's value
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Get a field's value, treating a missing field as Null
    pub fn get_or_null(&self, field: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.fields.get(field).unwrap_or(&NULL)
    }

    /// Remove a field, returning its value
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// Check whether a field is present (Null counts as present)
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over fields in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Field names in name order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Identity of this record; 0 when absent, null or not a positive integer
    pub fn id(&self) -> u64 {
        match self.fields.get(ID_FIELD) {
            Some(Value::Int(i)) if *i > 0 => *i as u64,
            _ => 0,
        }
    }

    /// Set the identity field
    pub fn set_id(&mut self, id: u64) {
        self.fields.insert(ID_FIELD.to_string(), Value::Int(id as i64));
    }

    // ------------------------------------------------------------------
    // Typed accessors
    // ------------------------------------------------------------------

    fn typed<'a, T>(
        &'a self,
        field: &str,
        expected: &str,
        extract: impl Fn(&'a Value) -> Option<T>,
    ) -> Result<Option<T>> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => extract(v).map(Some).ok_or_else(|| {
                Error::Serialization(format!(
                    "field '{}' holds {} but {} was expected",
                    field,
                    v.type_name(),
                    expected
                ))
            }),
        }
    }

    fn required<T>(field: &str, value: Option<T>) -> Result<T> {
        value.ok_or_else(|| Error::Serialization(format!("field '{}' is missing", field)))
    }

    /// Optional text field
    pub fn opt_text(&self, field: &str) -> Result<Option<String>> {
        self.typed(field, "text", |v| v.as_str().map(str::to_string))
    }

    /// Required text field
    pub fn text(&self, field: &str) -> Result<String> {
        Self::required(field, self.opt_text(field)?)
    }

    /// Optional integer field
    pub fn opt_int(&self, field: &str) -> Result<Option<i64>> {
        self.typed(field, "int", Value::as_int)
    }

    /// Required integer field
    pub fn int(&self, field: &str) -> Result<i64> {
        Self::required(field, self.opt_int(field)?)
    }

    /// Optional float field; integers are widened
    pub fn opt_float(&self, field: &str) -> Result<Option<f64>> {
        self.typed(field, "float", Value::as_number)
    }

    /// Required float field
    pub fn float(&self, field: &str) -> Result<f64> {
        Self::required(field, self.opt_float(field)?)
    }

    /// Optional boolean field
    pub fn opt_bool(&self, field: &str) -> Result<Option<bool>> {
        self.typed(field, "bool", Value::as_bool)
    }

    /// Required boolean field
    pub fn bool(&self, field: &str) -> Result<bool> {
        Self::required(field, self.opt_bool(field)?)
    }

    /// Optional date field
    pub fn opt_date(&self, field: &str) -> Result<Option<NaiveDate>> {
        self.typed(field, "date", Value::as_date)
    }

    /// Required date field
    pub fn date(&self, field: &str) -> Result<NaiveDate> {
        Self::required(field, self.opt_date(field)?)
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Record {
            fields: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}
