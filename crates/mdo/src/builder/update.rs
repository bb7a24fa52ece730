//! UPDATE statement builder (MySQL dialect).

use crate::builder::predicate::{Cond, Connective, Predicate};
use crate::builder::{Assemble, StatementKind};
use crate::error::{DbError, DbResult};
use crate::quote::{MySqlDialect, Quote};
use crate::value::{Expr, Value};
use std::fmt;
use std::sync::Arc;

/// UPDATE builder. Refuses to assemble without a WHERE predicate.
#[derive(Clone)]
pub struct Update {
    quoter: Arc<dyn Quote>,
    /// Target table
    table: String,
    /// SET assignments
    set_fields: Vec<(String, Value)>,
    /// WHERE conditions
    where_terms: Predicate,
}

impl Update {
    /// Create an UPDATE of `table`.
    pub fn new(quoter: Arc<dyn Quote>, table: &str) -> Self {
        Self {
            quoter,
            table: table.to_string(),
            set_fields: Vec::new(),
            where_terms: Predicate::new(),
        }
    }

    /// Create an UPDATE using the stock MySQL quoter.
    pub fn mysql(table: &str) -> Self {
        Self::new(Arc::new(MySqlDialect), table)
    }

    /// Set a column value.
    pub fn set(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.set_fields.push((column.to_string(), value.into()));
        self
    }

    /// Set an optional column value (None => skip).
    pub fn set_opt<T: Into<Value>>(self, column: &str, value: Option<T>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    /// Set a column to a raw SQL expression.
    pub fn set_raw(self, column: &str, expr: &str) -> Self {
        self.set(column, Expr::new(expr))
    }

    /// Set several columns at once.
    pub fn set_pairs<I, K, V>(self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        pairs
            .into_iter()
            .fold(self, |update, (k, v)| update.set(k.as_ref(), v))
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

impl Assemble for Update {
    fn assemble(&self) -> DbResult<String> {
        if self.set_fields.is_empty() {
            return Err(DbError::malformed(format!(
                "UPDATE on `{}` has nothing to SET",
                self.table
            )));
        }
        if self.where_terms.is_empty() {
            return Err(DbError::EmptyPredicateGuard {
                statement: "UPDATE",
                table: self.table.clone(),
            });
        }

        let sets: Vec<String> = self
            .set_fields
            .iter()
            .map(|(c, v)| {
                format!(
                    "{} = {}",
                    self.quoter.quote_identifier(c, true),
                    self.quoter.quote(v)
                )
            })
            .collect();

        Ok(format!(
            "UPDATE {} SET {} WHERE {}",
            self.quoter.quote_identifier(&self.table, true),
            sets.join(", "),
            self.where_terms.render()
        ))
    }

    fn kind(&self) -> StatementKind {
        StatementKind::Update
    }
}

impl fmt::Debug for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Update")
            .field("table", &self.table)
            .field("set_fields", &self.set_fields)
            .field("where", &self.where_terms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_renders_sets_and_where() {
        let sql = Update::mysql("users")
            .set("name", "bob")
            .set_raw("updated_at", "NOW()")
            .set_opt::<i64>("age", None)
            .and_where(("id = ?", 7))
            .or_where("legacy = 1")
            .assemble()
            .unwrap();
        assert_eq!(
            sql,
            "UPDATE `users` SET `name` = 'bob', `updated_at` = NOW() WHERE (id = 7) OR (legacy = 1)"
        );
    }

    #[test]
    fn test_update_without_where_is_guarded() {
        let err = Update::mysql("users").set("name", "x").assemble().unwrap_err();
        assert!(matches!(
            err,
            DbError::EmptyPredicateGuard { statement: "UPDATE", ref table } if table == "users"
        ));
    }

    #[test]
    fn test_update_without_set_is_malformed() {
        let err = Update::mysql("users").and_where("id = 1").assemble().unwrap_err();
        assert!(matches!(err, DbError::MalformedClause(_)));
    }
}
