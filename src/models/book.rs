use nousdata_core::{Entity, EntitySchema, Error, FieldDef, Record, Result};

/// A catalogued book. The ISBN is unique across the collection and stored
/// in its compact form (see [`canonical_isbn`]).
#[derive(Debug, Clone, PartialEq)]
pub struct Book {
    pub id: u64,
    pub title: String,
    pub isbn: String,
    pub author_id: Option<u64>,
    pub genre: Option<String>,
    pub year: Option<i64>,
    pub pages: Option<u32>,
    pub available: bool,
}

impl Book {
    /// Available book with no optional fields set
    pub fn new(title: impl Into<String>, isbn: impl AsRef<str>) -> Self {
        Self {
            id: 0,
            title: title.into(),
            isbn: canonical_isbn(isbn.as_ref()),
            author_id: None,
            genre: None,
            year: None,
            pages: None,
            available: true,
        }
    }

    pub fn by(mut self, author_id: u64) -> Self {
        self.author_id = Some(author_id);
        self
    }

    pub fn genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    pub fn year(mut self, year: i64) -> Self {
        self.year = Some(year);
        self
    }

    pub fn pages(mut self, pages: u32) -> Self {
        self.pages = Some(pages);
        self
    }
}

/// Compact form of an ISBN: hyphens and spaces removed, check digit `x`
/// upper-cased. `978-84-376-0494-7` becomes `9788437604947`.
pub fn canonical_isbn(isbn: &str) -> String {
    isbn.chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// ISBN-10 or ISBN-13 with a correct check digit. Hyphens and spaces are
/// ignored.
pub fn isbn_is_valid(isbn: &str) -> bool {
    let chars: Vec<char> = canonical_isbn(isbn).chars().collect();
    match chars.len() {
        10 => {
            let mut sum = 0;
            for (i, c) in chars.iter().enumerate() {
                let digit = match (i, c) {
                    (9, 'X') => 10,
                    (_, c) => match c.to_digit(10) {
                        Some(d) => d,
                        None => return false,
                    },
                };
                sum += digit * (10 - i as u32);
            }
            sum % 11 == 0
        }
        13 => {
            let mut sum = 0;
            for (i, c) in chars.iter().enumerate() {
                let Some(digit) = c.to_digit(10) else {
                    return false;
                };
                sum += if i % 2 == 0 { digit } else { digit * 3 };
            }
            sum % 10 == 0
        }
        _ => false,
    }
}

impl Entity for Book {
    const ENTITY_TYPE: &'static str = "Book";

    fn schema() -> EntitySchema {
        EntitySchema::new(Self::ENTITY_TYPE, 1)
            .field(FieldDef::text("title").required())
            .field(FieldDef::text("isbn").required().unique())
            .field(FieldDef::int("author_id"))
            .field(FieldDef::text("genre"))
            .field(FieldDef::int("year"))
            .field(FieldDef::int("pages"))
            .field(FieldDef::bool("available").default_value(true))
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
            .with("title", self.title.as_str())
            .with("isbn", canonical_isbn(&self.isbn))
            .with("author_id", self.author_id)
            .with("genre", self.genre.clone())
            .with("year", self.year)
            .with("pages", self.pages)
            .with("available", self.available)
    }

    fn from_record(record: &Record) -> Result<Self> {
        let pages = record
            .opt_int("pages")?
            .map(|p| {
                u32::try_from(p)
                    .map_err(|_| Error::Serialization(format!("pages out of range: {}", p)))
            })
            .transpose()?;
        Ok(Self {
            id: record.id(),
            title: record.text("title")?,
            isbn: record.text("isbn")?,
            author_id: record.opt_int("author_id")?.map(|id| id as u64),
            genre: record.opt_text("genre")?,
            year: record.opt_int("year")?,
            pages,
            available: record.opt_bool("available")?.unwrap_or(true),
        })
    }

    fn validate(&self) -> Result<()> {
        if !isbn_is_valid(&self.isbn) {
            return Err(Error::validation(
                Self::ENTITY_TYPE,
                "isbn",
                format!("'{}' is not a valid ISBN-10 or ISBN-13", self.isbn),
            ));
        }
        if self.pages == Some(0) {
            return Err(Error::validation(
                Self::ENTITY_TYPE,
                "pages",
                "a book has at least one page",
            ));
        }
        Ok(())
    }
}
