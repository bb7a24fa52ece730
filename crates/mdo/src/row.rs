//! Field-ordered result rows.

use crate::error::{DbError, DbResult};
use crate::value::{FromValue, Value};
use std::sync::Arc;

/// One result row: values in select-list order plus the shared column names.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Field by ordinal position.
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Field by column name. On duplicate names the last one wins, as with
    /// an associative fetch.
    pub fn get_named(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .rposition(|c| c == name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Decode a named field.
    pub fn try_get<T: FromValue>(&self, name: &str) -> DbResult<T> {
        let value = self
            .get_named(name)
            .ok_or_else(|| DbError::decode(name, "no such column in row"))?;
        T::decode(name, value)
    }

    /// Decode a field by position.
    pub fn try_get_at<T: FromValue>(&self, idx: usize) -> DbResult<T> {
        let column = self
            .columns
            .get(idx)
            .map(String::as_str)
            .unwrap_or("<unnamed>");
        let value = self
            .values
            .get(idx)
            .ok_or_else(|| DbError::decode(format!("#{idx}"), "column index out of range"))?;
        T::decode(column, value)
    }

    /// `(column, value)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Owned `(column, value)` pairs in field order.
    pub fn into_pairs(self) -> Vec<(String, Value)> {
        self.columns.iter().cloned().zip(self.values).collect()
    }

    /// First field; the key of keyed fetches.
    pub(crate) fn first_value(&self) -> DbResult<&Value> {
        self.values
            .first()
            .ok_or_else(|| DbError::decode("#0", "row has no columns"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> Row {
        let cols: Arc<[String]> = vec!["id".to_string(), "name".to_string()].into();
        Row::new(cols, vec![Value::from(7), Value::from("ann")])
    }

    #[test]
    fn test_named_and_positional_access() {
        let r = row();
        assert_eq!(r.get(0), Some(&Value::Int(7)));
        assert_eq!(r.get_named("name"), Some(&Value::from("ann")));
        assert_eq!(r.try_get::<i64>("id").unwrap(), 7);
        assert_eq!(r.try_get_at::<String>(1).unwrap(), "ann");
        assert!(r.try_get::<i64>("missing").is_err());
    }

    #[test]
    fn test_pairs_keep_field_order() {
        let pairs = row().into_pairs();
        assert_eq!(pairs[0].0, "id");
        assert_eq!(pairs[1].0, "name");
    }
}
