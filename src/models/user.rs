use nousdata_core::{Entity, EntitySchema, Error, FieldDef, Record, Result};

/// A library member. Emails are unique.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub role: String,
    pub active: bool,
}

impl User {
    /// Active user with the `user` role
    pub fn new(
        name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            name: name.into(),
            last_name: last_name.into(),
            email: email.into(),
            role: "user".to_string(),
            active: true,
        }
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.name, self.last_name)
    }
}

/// `local@domain.tld` with no whitespace.
pub fn email_is_valid(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}

impl Entity for User {
    const ENTITY_TYPE: &'static str = "User";

    fn schema() -> EntitySchema {
        EntitySchema::new(Self::ENTITY_TYPE, 1)
            .field(FieldDef::text("name").required())
            .field(FieldDef::text("last_name").required())
            .field(FieldDef::text("email").required().unique())
            .field(FieldDef::text("role").default_value("user"))
            .field(FieldDef::bool("active").default_value(true))
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
            .with("email", self.email.as_str())
            .with("role", self.role.as_str())
            .with("active", self.active)
    }

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            id: record.id(),
            name: record.text("name")?,
            last_name: record.text("last_name")?,
            email: record.text("email")?,
            role: record.opt_text("role")?.unwrap_or_else(|| "user".to_string()),
            active: record.opt_bool("active")?.unwrap_or(true),
        })
    }

    fn validate(&self) -> Result<()> {
        if !email_is_valid(&self.email) {
            return Err(Error::validation(
                Self::ENTITY_TYPE,
                "email",
                format!("'{}' is not an email address", self.email),
            ));
        }
        Ok(())
    }
}
