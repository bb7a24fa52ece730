//! INSERT statement builder (MySQL dialect).

use crate::builder::{Assemble, StatementKind};
use crate::error::{DbError, DbResult};
use crate::quote::{MySqlDialect, Quote};
use crate::value::{Expr, Value};
use std::fmt;
use std::sync::Arc;

/// Keyword placed between `INSERT` and `INTO`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertModifier {
    Delayed,
    Ignore,
    LowPriority,
    HighPriority,
}

impl InsertModifier {
    pub fn keyword(&self) -> &'static str {
        match self {
            InsertModifier::Delayed => "DELAYED",
            InsertModifier::Ignore => "IGNORE",
            InsertModifier::LowPriority => "LOW_PRIORITY",
            InsertModifier::HighPriority => "HIGH_PRIORITY",
        }
    }
}

/// INSERT builder; several value tuples render as one multi-row statement.
#[derive(Clone)]
pub struct Insert {
    quoter: Arc<dyn Quote>,
    /// Target table
    table: String,
    /// LOW_PRIORITY / DELAYED / HIGH_PRIORITY
    modifier: Option<InsertModifier>,
    /// Column list
    columns: Vec<String>,
    /// Value tuples, one per row
    rows: Vec<Vec<Value>>,
    /// ON DUPLICATE KEY UPDATE assignments
    on_duplicate: Vec<(String, Value)>,
    /// First contract violation
    build_error: Option<String>,
}

impl Insert {
    /// Create an INSERT into `table`.
    pub fn new(quoter: Arc<dyn Quote>, table: &str) -> Self {
        Self {
            quoter,
            table: table.to_string(),
            modifier: None,
            columns: Vec::new(),
            rows: Vec::new(),
            on_duplicate: Vec::new(),
            build_error: None,
        }
    }

    /// Create an INSERT using the stock MySQL quoter.
    pub fn mysql(table: &str) -> Self {
        Self::new(Arc::new(MySqlDialect), table)
    }

    fn fail(&mut self, message: impl Into<String>) {
        if self.build_error.is_none() {
            self.build_error = Some(message.into());
        }
    }

    /// Set the column list.
    pub fn columns(mut self, cols: &[&str]) -> Self {
        self.columns = cols.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Add one value tuple, in column order.
    pub fn values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.rows.push(values.into_iter().map(Into::into).collect());
        self
    }

    /// Add one row as column/value pairs.
    ///
    /// The first row fixes the column list when none was set; later rows
    /// must name the same columns in the same order.
    pub fn row<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let (cols, values): (Vec<String>, Vec<Value>) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        if self.columns.is_empty() {
            self.columns = cols;
        } else if self.columns != cols {
            self.fail(format!(
                "row columns ({}) do not match the insert columns ({})",
                cols.join(", "),
                self.columns.join(", ")
            ));
            return self;
        }
        self.rows.push(values);
        self
    }

    /// Set the `INSERT <modifier> INTO` keyword.
    pub fn modifier(mut self, modifier: InsertModifier) -> Self {
        self.modifier = Some(modifier);
        self
    }

    /// Add an `ON DUPLICATE KEY UPDATE column = value` assignment.
    pub fn on_duplicate_key_update(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.on_duplicate.push((column.to_string(), value.into()));
        self
    }

    /// `ON DUPLICATE KEY UPDATE column = VALUES(column)` for each column.
    pub fn on_duplicate_key_update_values(mut self, cols: &[&str]) -> Self {
        for col in cols {
            let expr = Expr::new(format!(
                "VALUES({})",
                self.quoter.quote_identifier(col, true)
            ));
            self.on_duplicate.push((col.to_string(), Value::Expr(expr)));
        }
        self
    }

    /// Number of value tuples.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

impl Assemble for Insert {
    fn assemble(&self) -> DbResult<String> {
        if let Some(err) = &self.build_error {
            return Err(DbError::malformed(err.clone()));
        }
        if self.table.trim().is_empty() {
            return Err(DbError::malformed("INSERT requires a table"));
        }
        if self.columns.is_empty() {
            return Err(DbError::malformed("INSERT requires at least one column"));
        }
        if self.rows.is_empty() {
            return Err(DbError::malformed("INSERT requires at least one value tuple"));
        }

        let mut tuples = Vec::with_capacity(self.rows.len());
        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != self.columns.len() {
                return Err(DbError::malformed(format!(
                    "value tuple #{} has {} values for {} columns",
                    i + 1,
                    row.len(),
                    self.columns.len()
                )));
            }
            tuples.push(format!("({})", self.quoter.quote_array(row)));
        }

        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| self.quoter.quote_identifier(c, true))
            .collect();

        let mut sql = String::from("INSERT");
        if let Some(modifier) = self.modifier {
            sql.push(' ');
            sql.push_str(modifier.keyword());
        }
        sql.push_str(&format!(
            " INTO {} ({}) VALUES {}",
            self.quoter.quote_identifier(&self.table, true),
            columns.join(", "),
            tuples.join(", ")
        ));

        if !self.on_duplicate.is_empty() {
            let sets: Vec<String> = self
                .on_duplicate
                .iter()
                .map(|(c, v)| {
                    format!(
                        "{} = {}",
                        self.quoter.quote_identifier(c, true),
                        self.quoter.quote(v)
                    )
                })
                .collect();
            sql.push_str(" ON DUPLICATE KEY UPDATE ");
            sql.push_str(&sets.join(", "));
        }
        Ok(sql)
    }

    fn kind(&self) -> StatementKind {
        StatementKind::Insert
    }
}

impl fmt::Debug for Insert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Insert")
            .field("table", &self.table)
            .field("modifier", &self.modifier)
            .field("columns", &self.columns)
            .field("rows", &self.rows.len())
            .field("on_duplicate", &self.on_duplicate)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_row() {
        let sql = Insert::mysql("users")
            .row([("name", Value::from("ann")), ("age", Value::from(30))])
            .assemble()
            .unwrap();
        assert_eq!(sql, "INSERT INTO `users` (`name`, `age`) VALUES ('ann', 30)");
    }

    #[test]
    fn test_multi_row_with_modifier_and_upsert() {
        let sql = Insert::mysql("shop.tags")
            .modifier(InsertModifier::Ignore)
            .columns(&["id", "label"])
            .values([Value::from(1), Value::from("a")])
            .values([Value::from(2), Value::from(Expr::new("UPPER('b')"))])
            .on_duplicate_key_update_values(&["label"])
            .assemble()
            .unwrap();
        assert_eq!(
            sql,
            "INSERT IGNORE INTO `shop`.`tags` (`id`, `label`) VALUES (1, 'a'), (2, UPPER('b')) \
             ON DUPLICATE KEY UPDATE `label` = VALUES(`label`)"
        );
    }

    #[test]
    fn test_arity_mismatch_is_malformed() {
        let err = Insert::mysql("t")
            .columns(&["a", "b"])
            .values([1])
            .assemble()
            .unwrap_err();
        assert!(matches!(err, DbError::MalformedClause(_)));

        let err = Insert::mysql("t")
            .row([("a", 1)])
            .row([("b", 2)])
            .assemble()
            .unwrap_err();
        assert!(err.is_builder_error());
    }

    #[test]
    fn test_empty_insert_is_malformed() {
        assert!(Insert::mysql("t").assemble().is_err());
    }
}
