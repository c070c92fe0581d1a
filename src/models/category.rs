use nousdata_core::{Entity, EntitySchema, FieldDef, Record, Result};

/// A shelf category; names are unique.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Category {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl Entity for Category {
    const ENTITY_TYPE: &'static str = "Category";

    fn schema() -> EntitySchema {
        EntitySchema::new(Self::ENTITY_TYPE, 1)
            .field(FieldDef::text("name").required().unique())
            .field(FieldDef::text("description"))
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
            .with("description", self.description.clone())
    }

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            id: record.id(),
            name: record.text("name")?,
            description: record.opt_text("description")?,
        })
    }
}
