//! Migration steps
//!
//! A [`Migration`] moves one entity type's stored records from
//! `from_version` to `from_version + 1` by applying its
//! [`MigrationStep`]s, in order, to every record. Steps are pure
//! transformations over in-memory records; the manager decides when the
//! result is written back.

use nousdata_core::{Error, FieldType, Record, Result, Value};
use std::fmt;
use std::sync::Arc;

/// Record rewrite supplied by application code.
pub type TransformFn = dyn Fn(&mut Record) -> Result<()> + Send + Sync;

/// One transformation applied to every stored record.
#[derive(Clone)]
pub enum MigrationStep {
    /// Set `name` to `default` on records that lack it
    AddField {
        /// Field to add
        name: String,
        /// Value for existing records
        default: Value,
    },
    /// Move the value of `from` to `to`
    RenameField {
        /// Old name
        from: String,
        /// New name
        to: String,
    },
    /// Remove `name` from every record
    DropField {
        /// Field to remove
        name: String,
    },
    /// Coerce the value of `name` to `to`; inconvertible values fail the migration
    ConvertField {
        /// Field to convert
        name: String,
        /// Target type
        to: FieldType,
    },
    /// Arbitrary per-record rewrite
    Transform {
        /// Label used in logs
        name: String,
        /// The rewrite
        f: Arc<TransformFn>,
    },
}

impl MigrationStep {
    /// Apply to one record of `entity_type`.
    pub fn apply(&self, entity_type: &str, record: &mut Record) -> Result<()> {
        match self {
            MigrationStep::AddField { name, default } => {
                if !record.contains(name) {
                    record.set(name.clone(), default.clone());
                }
                Ok(())
            }
            MigrationStep::RenameField { from, to } => {
                if let Some(value) = record.remove(from) {
                    record.set(to.clone(), value);
                }
                Ok(())
            }
            MigrationStep::DropField { name } => {
                record.remove(name);
                Ok(())
            }
            MigrationStep::ConvertField { name, to } => {
                if let Some(value) = record.remove(name) {
                    let converted = value.coerce(*to).map_err(|reason| {
                        Error::validation(
                            entity_type,
                            name.clone(),
                            format!("record {}: {}", record.id(), reason),
                        )
                    })?;
                    record.set(name.clone(), converted);
                }
                Ok(())
            }
            MigrationStep::Transform { f, .. } => f(record),
        }
    }

    /// Short human readable form, used in logs
    pub fn describe(&self) -> String {
        match self {
            MigrationStep::AddField { name, default } => format!("add {} = {:?}", name, default),
            MigrationStep::RenameField { from, to } => format!("rename {} -> {}", from, to),
            MigrationStep::DropField { name } => format!("drop {}", name),
            MigrationStep::ConvertField { name, to } => format!("convert {} to {}", name, to),
            MigrationStep::Transform { name, .. } => format!("transform {}", name),
        }
    }
}

impl fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// All steps that take one entity type from `from_version` to the next.
#[derive(Debug, Clone)]
pub struct Migration {
    entity_type: String,
    from_version: u32,
    steps: Vec<MigrationStep>,
}

impl Migration {
    /// Empty migration of `entity_type` out of `from_version`
    pub fn new(entity_type: impl Into<String>, from_version: u32) -> Self {
        Self {
            entity_type: entity_type.into(),
            from_version,
            steps: Vec::new(),
        }
    }

    /// Append a step
    pub fn step(mut self, step: MigrationStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Append [`MigrationStep::AddField`]
    pub fn add_field(self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.step(MigrationStep::AddField {
            name: name.into(),
            default: default.into(),
        })
    }

    /// Append [`MigrationStep::RenameField`]
    pub fn rename_field(self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.step(MigrationStep::RenameField {
            from: from.into(),
            to: to.into(),
        })
    }

    /// Append [`MigrationStep::DropField`]
    pub fn drop_field(self, name: impl Into<String>) -> Self {
        self.step(MigrationStep::DropField { name: name.into() })
    }

    /// Append [`MigrationStep::ConvertField`]
    pub fn convert_field(self, name: impl Into<String>, to: FieldType) -> Self {
        self.step(MigrationStep::ConvertField {
            name: name.into(),
            to,
        })
    }

    /// Append [`MigrationStep::Transform`]
    pub fn transform(
        self,
        name: impl Into<String>,
        f: impl Fn(&mut Record) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.step(MigrationStep::Transform {
            name: name.into(),
            f: Arc::new(f),
        })
    }

    /// Entity type migrated
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Version the data must be at
    pub fn from_version(&self) -> u32 {
        self.from_version
    }

    /// Version the data is at afterwards
    pub fn to_version(&self) -> u32 {
        self.from_version + 1
    }

    /// Steps in application order
    pub fn steps(&self) -> &[MigrationStep] {
        &self.steps
    }

    /// Apply every step to every record. Stops at the first failure.
    pub fn apply(&self, records: &mut [Record]) -> Result<()> {
        for record in records.iter_mut() {
            for step in &self.steps {
                step.apply(&self.entity_type, record)?;
            }
        }
        Ok(())
    }
}
