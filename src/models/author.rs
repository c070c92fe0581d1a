use chrono::NaiveDate;
use nousdata_core::{Entity, EntitySchema, FieldDef, Record, Result};

/// A book author.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Author {
    pub id: u64,
    pub name: String,
    pub last_name: String,
    pub birth_date: Option<NaiveDate>,
    pub nationality: Option<String>,
}

impl Author {
    /// Author with the two required fields set
    pub fn new(name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last_name: last_name.into(),
            ..Self::default()
        }
    }

    pub fn born(mut self, date: NaiveDate) -> Self {
        self.birth_date = Some(date);
        self
    }

    pub fn nationality(mut self, nationality: impl Into<String>) -> Self {
        self.nationality = Some(nationality.into());
        self
    }

    /// "name last_name"
    pub fn full_name(&self) -> String {
        format!("{} {}", self.name, self.last_name)
    }
}

impl Entity for Author {
    const ENTITY_TYPE: &'static str = "Author";

    fn schema() -> EntitySchema {
        EntitySchema::new(Self::ENTITY_TYPE, 1)
            .field(FieldDef::text("name").required())
            .field(FieldDef::text("last_name").required())
            .field(FieldDef::date("birth_date"))
            .field(FieldDef::text("nationality"))
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("id", self.id)
            .with("name", self.name.as_str())
            .with("last_name", self.last_name.as_str())
            .with("birth_date", self.birth_date)
            .with("nationality", self.nationality.clone())
    }

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            id: record.id(),
            name: record.text("name")?,
            last_name: record.text("last_name")?,
            birth_date: record.opt_date("birth_date")?,
            nationality: record.opt_text("nationality")?,
        })
    }
}
