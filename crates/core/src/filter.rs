//! Bounded predicate API for `find_by`
//!
//! Filters are evaluated in memory against conformed records, above the
//! storage adapter boundary, so the same filter selects the same records on
//! every backend.
//!
//! ```text
//! let f = Filter::eq("genre", "Novela").and(Filter::ge("year", 1960));
//! let hits = repo.find_by(&f)?;
//! ```

use crate::record::Record;
use crate::value::Value;
use std::cmp::Ordering;

/// A predicate over the fields of one record.
///
/// A field missing from a record is treated as Null.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every record
    All,
    /// Field equals value (Int/Float compare numerically; Null equals Null)
    Eq(String, Value),
    /// Negation of `Eq`
    Ne(String, Value),
    /// Field strictly less than value
    Lt(String, Value),
    /// Field less than or equal to value
    Le(String, Value),
    /// Field strictly greater than value
    Gt(String, Value),
    /// Field greater than or equal to value
    Ge(String, Value),
    /// Text field contains the substring, ignoring case
    Contains(String, String),
    /// Field is Null or absent
    IsNull(String),
    /// Field equals any of the values
    In(String, Vec<Value>),
    /// Every sub-filter matches
    And(Vec<Filter>),
    /// At least one sub-filter matches
    Or(Vec<Filter>),
    /// Sub-filter does not match
    Not(Box<Filter>),
}

impl Filter {
    /// `field == value`
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    /// `field != value`
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Ne(field.into(), value.into())
    }

    /// `field < value`
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Lt(field.into(), value.into())
    }

    /// `field <= value`
    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Le(field.into(), value.into())
    }

    /// `field > value`
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Gt(field.into(), value.into())
    }

    /// `field >= value`
    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Ge(field.into(), value.into())
    }

    /// Case-insensitive substring match on a text field
    pub fn contains(field: impl Into<String>, needle: impl Into<String>) -> Self {
        Filter::Contains(field.into(), needle.into())
    }

    /// Field is Null
    pub fn is_null(field: impl Into<String>) -> Self {
        Filter::IsNull(field.into())
    }

    /// Field is one of `values`
    pub fn any_of<V: Into<Value>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Filter::In(field.into(), values.into_iter().map(Into::into).collect())
    }

    /// Conjunction, flattening nested `And`s
    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::All, f) | (f, Filter::All) => f,
            (Filter::And(mut a), Filter::And(b)) => {
                a.extend(b);
                Filter::And(a)
            }
            (Filter::And(mut a), f) => {
                a.push(f);
                Filter::And(a)
            }
            (f, Filter::And(mut b)) => {
                b.insert(0, f);
                Filter::And(b)
            }
            (a, b) => Filter::And(vec![a, b]),
        }
    }

    /// Disjunction, flattening nested `Or`s
    pub fn or(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::Or(mut a), Filter::Or(b)) => {
                a.extend(b);
                Filter::Or(a)
            }
            (Filter::Or(mut a), f) => {
                a.push(f);
                Filter::Or(a)
            }
            (a, b) => Filter::Or(vec![a, b]),
        }
    }

    /// Evaluate against a record
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(field, v) => equals(record.get_or_null(field), v),
            Filter::Ne(field, v) => !equals(record.get_or_null(field), v),
            Filter::Lt(field, v) => ordered(record, field, v, |o| o == Ordering::Less),
            Filter::Le(field, v) => ordered(record, field, v, |o| o != Ordering::Greater),
            Filter::Gt(field, v) => ordered(record, field, v, |o| o == Ordering::Greater),
            Filter::Ge(field, v) => ordered(record, field, v, |o| o != Ordering::Less),
            Filter::Contains(field, needle) => match record.get_or_null(field) {
                Value::Text(s) => s.to_lowercase().contains(&needle.to_lowercase()),
                _ => false,
            },
            Filter::IsNull(field) => record.get_or_null(field).is_null(),
            Filter::In(field, values) => {
                let actual = record.get_or_null(field);
                values.iter().any(|v| equals(actual, v))
            }
            Filter::And(filters) => filters.iter().all(|f| f.matches(record)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(record)),
            Filter::Not(inner) => !inner.matches(record),
        }
    }

    /// Every field name this filter reads
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Filter::All => {}
            Filter::Eq(f, _)
            | Filter::Ne(f, _)
            | Filter::Lt(f, _)
            | Filter::Le(f, _)
            | Filter::Gt(f, _)
            | Filter::Ge(f, _)
            | Filter::Contains(f, _)
            | Filter::IsNull(f)
            | Filter::In(f, _) => {
                if !out.contains(&f.as_str()) {
                    out.push(f);
                }
            }
            Filter::And(fs) | Filter::Or(fs) => fs.iter().for_each(|f| f.collect_fields(out)),
            Filter::Not(inner) => inner.collect_fields(out),
        }
    }
}

impl std::ops::Not for Filter {
    type Output = Filter;

    fn not(self) -> Filter {
        match self {
            Filter::Not(inner) => *inner,
            f => Filter::Not(Box::new(f)),
        }
    }
}

fn equals(actual: &Value, expected: &Value) -> bool {
    actual.compare(expected) == Some(Ordering::Equal)
}

fn ordered(record: &Record, field: &str, v: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    let actual = record.get_or_null(field);
    if actual.is_null() || v.is_null() {
        return false;
    }
    actual.compare(v).map(accept).unwrap_or(false)
}
