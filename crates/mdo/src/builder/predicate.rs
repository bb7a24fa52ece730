//! WHERE / HAVING term accumulation shared by Select, Update and Delete.

use crate::quote::Quote;
use crate::value::Value;

/// A single condition, optionally with one bound value substituted for
/// every `?` in its text.
#[derive(Clone, Debug, PartialEq)]
pub enum Cond {
    Raw(String),
    Bind(String, Value),
}

impl Cond {
    pub fn raw(sql: impl Into<String>) -> Self {
        Cond::Raw(sql.into())
    }

    pub fn bind(sql: impl Into<String>, value: impl Into<Value>) -> Self {
        Cond::Bind(sql.into(), value.into())
    }

    /// Condition text with the value quoted in.
    pub fn render(&self, quoter: &dyn Quote) -> String {
        match self {
            Cond::Raw(sql) => sql.clone(),
            Cond::Bind(sql, value) => quoter.quote_into(sql, value),
        }
    }
}

impl From<&str> for Cond {
    fn from(sql: &str) -> Self {
        Cond::Raw(sql.to_string())
    }
}

impl From<String> for Cond {
    fn from(sql: String) -> Self {
        Cond::Raw(sql)
    }
}

impl<V: Into<Value>> From<(&str, V)> for Cond {
    fn from((sql, value): (&str, V)) -> Self {
        Cond::Bind(sql.to_string(), value.into())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Connective {
    And,
    Or,
}

/// Ordered predicate terms: `(a)`, `AND (b)`, `OR (c)`.
///
/// Each condition is parenthesized on entry; the first term never carries a
/// connective.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Predicate {
    terms: Vec<String>,
}

impl Predicate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, connective: Connective, condition: &str) {
        let term = if self.terms.is_empty() {
            format!("({condition})")
        } else {
            match connective {
                Connective::And => format!("AND ({condition})"),
                Connective::Or => format!("OR ({condition})"),
            }
        };
        self.terms.push(term);
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn clear(&mut self) {
        self.terms.clear();
    }

    /// Terms joined by single spaces, without the keyword.
    pub fn render(&self) -> String {
        self.terms.join(" ")
    }
}
