use chrono::NaiveDate;
use nousdata_core::{Entity, EntitySchema, Error, FieldDef, Record, Result};
use std::fmt;
use std::str::FromStr;

/// Where a loan is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoanStatus {
    Active,
    Returned,
    Overdue,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "active",
            LoanStatus::Returned => "returned",
            LoanStatus::Overdue => "overdue",
        }
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoanStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(LoanStatus::Active),
            "returned" => Ok(LoanStatus::Returned),
            "overdue" => Ok(LoanStatus::Overdue),
            other => Err(Error::Serialization(format!(
                "unknown loan status '{}'",
                other
            ))),
        }
    }
}

/// A book lent to a user.
#[derive(Debug, Clone, PartialEq)]
pub struct Loan {
    pub id: u64,
    pub user_id: u64,
    pub book_id: u64,
    pub loan_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub status: LoanStatus,
}

impl Loan {
    /// Active loan starting on `loan_date` for `days` days
    pub fn new(user_id: u64, book_id: u64, loan_date: NaiveDate, days: u32) -> Self {
        Self {
            id: 0,
            user_id,
            book_id,
            loan_date,
            due_date: loan_date + chrono::Duration::days(i64::from(days)),
            return_date: None,
            status: LoanStatus::Active,
        }
    }

    /// Mark returned on `date`
    pub fn returned_on(mut self, date: NaiveDate) -> Self {
        self.return_date = Some(date);
        self.status = LoanStatus::Returned;
        self
    }
}

impl Entity for Loan {
    const ENTITY_TYPE: &'static str = "Loan";

    fn schema() -> EntitySchema {
        EntitySchema::new(Self::ENTITY_TYPE, 1)
            .field(FieldDef::int("user_id").required())
            .field(FieldDef::int("book_id").required())
            .field(FieldDef::date("loan_date").required())
            .field(FieldDef::date("due_date").required())
            .field(FieldDef::date("return_date"))
            .field(FieldDef::text("status").default_value("active"))
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
            .with("user_id", self.user_id)
            .with("book_id", self.book_id)
            .with("loan_date", self.loan_date)
            .with("due_date", self.due_date)
            .with("return_date", self.return_date)
            .with("status", self.status.as_str())
    }

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            id: record.id(),
            user_id: record.int("user_id")? as u64,
            book_id: record.int("book_id")? as u64,
            loan_date: record.date("loan_date")?,
            due_date: record.date("due_date")?,
            return_date: record.opt_date("return_date")?,
            status: match record.opt_text("status")? {
                Some(s) => s.parse()?,
                None => LoanStatus::Active,
            },
        })
    }

    fn validate(&self) -> Result<()> {
        if self.due_date < self.loan_date {
            return Err(Error::validation(
                Self::ENTITY_TYPE,
                "due_date",
                "due date precedes the loan date",
            ));
        }
        if let Some(returned) = self.return_date {
            if returned < self.loan_date {
                return Err(Error::validation(
                    Self::ENTITY_TYPE,
                    "return_date",
                    "return date precedes the loan date",
                ));
            }
        }
        if (self.status == LoanStatus::Returned) != self.return_date.is_some() {
            return Err(Error::validation(
                Self::ENTITY_TYPE,
                "status",
                "a loan is returned exactly when it has a return date",
            ));
        }
        Ok(())
    }
}
