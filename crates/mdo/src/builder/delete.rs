//! DELETE statement builder (MySQL dialect).

use crate::builder::predicate::{Cond, Connective, Predicate};
use crate::builder::{Assemble, StatementKind};
use crate::error::{DbError, DbResult};
use crate::quote::{MySqlDialect, Quote};
use std::fmt;
use std::sync::Arc;

/// DELETE builder. Refuses to assemble without a WHERE predicate.
#[derive(Clone)]
pub struct Delete {
    quoter: Arc<dyn Quote>,
    table: String,
    where_terms: Predicate,
}

impl Delete {
    /// Create a DELETE from `table`.
    pub fn from(quoter: Arc<dyn Quote>, table: &str) -> Self {
        Self {
            quoter,
            table: table.to_string(),
            where_terms: Predicate::new(),
        }
    }

    /// Create a DELETE using the stock MySQL quoter.
    pub fn mysql(table: &str) -> Self {
        Self::from(Arc::new(MySqlDialect), table)
    }

    /// Add an AND-connected WHERE condition.
    pub fn and_where(mut self, cond: impl Into<Cond>) -> Self {
        let sql = cond.into().render(self.quoter.as_ref());
        self.where_terms.push(Connective::And, &sql);
        self
    }

    /// Add an OR-connected WHERE condition.
    pub fn or_where(mut self, cond: impl Into<Cond>) -> Self {
        let sql = cond.into().render(self.quoter.as_ref());
        self.where_terms.push(Connective::Or, &sql);
        self
    }
}

impl Assemble for Delete {
    fn assemble(&self) -> DbResult<String> {
        if self.where_terms.is_empty() {
            return Err(DbError::EmptyPredicateGuard {
                statement: "DELETE",
                table: self.table.clone(),
            });
        }
        Ok(format!(
            "DELETE FROM {} WHERE {}",
            self.quoter.quote_identifier(&self.table, true),
            self.where_terms.render()
        ))
    }

    fn kind(&self) -> StatementKind {
        StatementKind::Delete
    }
}

impl fmt::Debug for Delete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delete")
            .field("table", &self.table)
            .field("where", &self.where_terms)
            .finish()
    }
}
