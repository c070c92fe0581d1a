//! Entity schemas
//!
//! An [`EntitySchema`] declares an entity type's name, the schema version the
//! running code expects, and its fields. The `id` field is implicit and always
//! first. Schemas drive three things:
//!
//! - **Conformance** on load: unknown keys dropped, missing keys defaulted,
//!   values coerced to the declared type
//! - **Validation** on save: required fields present, values of the right type
//! - **Uniqueness**: fields flagged `unique` are checked by the repository

use crate::error::{Error, Result};
use crate::record::Record;
use crate::value::{FieldType, Value};

/// Name of the identity field present in every schema.
pub const ID_FIELD: &str = "id";

/// Declaration of one entity field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Declared type
    pub field_type: FieldType,
    /// Must be non-null (and non-blank for text) on save
    pub required: bool,
    /// No two records may share a non-null value
    pub unique: bool,
    /// Value used when a stored record lacks this field
    pub default: Value,
}

impl FieldDef {
    /// Optional field of the given type with a Null default
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            unique: false,
            default: Value::Null,
        }
    }

    /// Shorthand for a text field.
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Text)
    }

    /// Shorthand for an integer field.
    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Int)
    }

    /// Shorthand for a float field.
    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Float)
    }

    /// Shorthand for a boolean field.
    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Bool)
    }

    /// Shorthand for a date field.
    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Date)
    }

    /// Mark the field required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Mark the field unique
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Set the default used for records stored without this field
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = value.into();
        self
    }
}

/// Declared shape of one entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySchema {
    entity_type: String,
    version: u32,
    fields: Vec<FieldDef>,
}

impl EntitySchema {
    /// New schema with only the identity field.
    ///
    /// `version` is the schema version the running code expects to find on
    /// disk; the migration manager brings older data up to it.
    pub fn new(entity_type: impl Into<String>, version: u32) -> Self {
        Self {
            entity_type: entity_type.into(),
            version,
            fields: vec![FieldDef::int(ID_FIELD)],
        }
    }

    /// Add a field. A later declaration with the same name replaces the earlier one.
    pub fn field(mut self, def: FieldDef) -> Self {
        match self.fields.iter_mut().find(|f| f.name == def.name) {
            Some(existing) => *existing = def,
            None => self.fields.push(def),
        }
        self
    }

    /// Entity type name
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Expected schema version
    pub fn version(&self) -> u32 {
        self.version
    }

    /// All fields, `id` first, then declaration order
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Look up a field declaration
    pub fn field_def(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check whether a field is declared
    pub fn has_field(&self, name: &str) -> bool {
        self.field_def(name).is_some()
    }

    /// Field names in declaration order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Fields flagged unique
    pub fn unique_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.unique)
    }

    /// Bring a stored record into this schema's shape.
    ///
    /// Unknown keys are dropped, missing keys take the declared default and
    /// every value is coerced to its declared type. A value that cannot be
    /// coerced is reported as a message; callers turn it into a corruption
    /// error naming their location.
    pub fn conform(&self, mut record: Record) -> std::result::Result<Record, String> {
        let mut out = Record::new();
        for def in &self.fields {
            let value = record
                .remove(&def.name)
                .unwrap_or_else(|| def.default.clone());
            let value = value
                .coerce(def.field_type)
                .map_err(|e| format!("{}.{}: {}", self.entity_type, def.name, e))?;
            out.set(def.name.clone(), value);
        }
        Ok(out)
    }

    /// Check a record about to be saved.
    ///
    /// Fails with [`Error::Validation`] naming the first offending field:
    /// an undeclared field, a value of the wrong type, or a required field
    /// that is null, missing, or blank text.
    pub fn validate(&self, record: &Record) -> Result<()> {
        for name in record.field_names() {
            if !self.has_field(name) {
                return Err(Error::validation(
                    &self.entity_type,
                    name,
                    "field is not declared by the schema",
                ));
            }
        }
        for def in &self.fields {
            let value = record.get_or_null(&def.name);
            if !value.fits(def.field_type) {
                return Err(Error::validation(
                    &self.entity_type,
                    &def.name,
                    format!("expected {}, got {}", def.field_type, value.type_name()),
                ));
            }
            if let Value::Float(f) = value {
                if !f.is_finite() {
                    return Err(Error::validation(
                        &self.entity_type,
                        &def.name,
                        format!("{} is not a finite number", f),
                    ));
                }
            }
            if def.required {
                let blank = match value {
                    Value::Null => true,
                    Value::Text(s) => s.trim().is_empty(),
                    _ => false,
                };
                if blank {
                    return Err(Error::validation(
                        &self.entity_type,
                        &def.name,
                        "required field is missing",
                    ));
                }
            }
        }
        if let Some(Value::Int(i)) = record.get(ID_FIELD) {
            if *i < 0 {
                return Err(Error::validation(
                    &self.entity_type,
                    ID_FIELD,
                    "id must not be negative",
                ));
            }
        }
        Ok(())
    }

    /// A record holding every field's default, with id 0
    pub fn default_record(&self) -> Record {
        let mut r: Record = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.default.clone()))
            .collect();
        r.set_id(0);
        r
    }
}
