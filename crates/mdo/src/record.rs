//! Hydrated rows.
//!
//! [`Hydrate`] is the row-constructor capability used by entity fetches;
//! [`Record`] is the stock implementation: an ordered field map with an
//! explicit modified-set, a read-only flag and an optional live table
//! reference that is never serialized.

use crate::error::{DbError, DbResult};
use crate::row::Row;
use crate::table::Table;
use crate::value::{FromValue, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Where a hydrated row came from.
#[derive(Clone, Debug, Default)]
pub struct RowOrigin {
    /// Copied from the originating select's `is_read_only()`.
    pub read_only: bool,
    /// Table bound to the originating select, if any.
    pub table: Option<Arc<dyn Table>>,
}

/// Build a typed object from a row already persisted in the database.
pub trait Hydrate: Sized + Send + 'static {
    fn hydrate(row: Row, origin: &RowOrigin) -> DbResult<Self>;
}

/// A loosely-typed entity row.
#[derive(Clone, Default)]
pub struct Record {
    fields: Vec<(String, Value)>,
    modified: BTreeSet<String>,
    stored: bool,
    read_only: bool,
    table: Option<Arc<dyn Table>>,
}

/// Serializable state of a [`Record`]; the table reference is not part of it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordSnapshot {
    pub fields: Vec<(String, Value)>,
    pub modified: BTreeSet<String>,
    pub read_only: bool,
    pub stored: bool,
}

impl Record {
    /// A new, not-yet-persisted record.
    pub fn new() -> Self {
        Self::default()
    }

    /// A new record with initial values; every given field counts as modified.
    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut record = Self::new();
        for (k, v) in values {
            record.put(k.into(), v.into());
        }
        record
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == field).map(|(_, v)| v)
    }

    pub fn try_get<T: FromValue>(&self, field: &str) -> DbResult<T> {
        let value = self
            .get(field)
            .ok_or_else(|| DbError::decode(field, "no such field in record"))?;
        T::decode(field, value)
    }

    /// Set a field and record it as modified.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> DbResult<()> {
        let field = field.into();
        if self.read_only {
            return Err(DbError::ReadOnly(format!(
                "cannot set `{field}`: record is marked read-only"
            )));
        }
        self.put(field, value.into());
        Ok(())
    }

    fn put(&mut self, field: String, value: Value) {
        match self.fields.iter_mut().find(|(k, _)| *k == field) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((field.clone(), value)),
        }
        self.modified.insert(field);
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_stored(&self) -> bool {
        self.stored
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn is_dirty(&self) -> bool {
        !self.modified.is_empty()
    }

    pub fn modified_fields(&self) -> impl Iterator<Item = &str> {
        self.modified.iter().map(String::as_str)
    }

    /// Modified fields with their current values, in field order.
    pub fn changes(&self) -> Vec<(&str, &Value)> {
        self.fields
            .iter()
            .filter(|(k, _)| self.modified.contains(k))
            .map(|(k, v)| (k.as_str(), v))
            .collect()
    }

    /// Forget pending modifications, e.g. after the caller persisted them.
    pub fn mark_clean(&mut self) {
        self.modified.clear();
        self.stored = true;
    }

    /// Primary-key values taken from the attached table's metadata.
    pub fn primary_key(&self) -> DbResult<Vec<(String, Value)>> {
        let table = self.table()?;
        table
            .info()
            .primary_keys
            .iter()
            .map(|key| {
                let value = self.get(key).cloned().ok_or_else(|| {
                    DbError::not_found(format!("primary key `{key}` missing from record"))
                })?;
                Ok((key.clone(), value))
            })
            .collect()
    }

    pub fn table(&self) -> DbResult<&Arc<dyn Table>> {
        self.table.as_ref().ok_or_else(|| {
            DbError::resource("record is not attached to a table; call attach() after restore")
        })
    }

    pub fn attach(&mut self, table: Arc<dyn Table>) {
        self.table = Some(table);
    }

    pub fn is_attached(&self) -> bool {
        self.table.is_some()
    }

    pub fn snapshot(&self) -> RecordSnapshot {
        RecordSnapshot {
            fields: self.fields.clone(),
            modified: self.modified.clone(),
            read_only: self.read_only,
            stored: self.stored,
        }
    }

    /// Rebuild a detached record from a snapshot.
    pub fn restore(snapshot: RecordSnapshot) -> Self {
        Self {
            fields: snapshot.fields,
            modified: snapshot.modified,
            stored: snapshot.stored,
            read_only: snapshot.read_only,
            table: None,
        }
    }

    pub fn to_json(&self) -> DbResult<String> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }

    pub fn from_json(json: &str) -> DbResult<Self> {
        let snapshot: RecordSnapshot = serde_json::from_str(json)?;
        Ok(Self::restore(snapshot))
    }
}

impl Hydrate for Record {
    fn hydrate(row: Row, origin: &RowOrigin) -> DbResult<Self> {
        Ok(Self {
            fields: row.into_pairs(),
            modified: BTreeSet::new(),
            stored: true,
            read_only: origin.read_only,
            table: origin.table.clone(),
        })
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("fields", &self.fields)
            .field("modified", &self.modified)
            .field("stored", &self.stored)
            .field("read_only", &self.read_only)
            .field("attached", &self.table.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TableInfo;

    fn stored(read_only: bool) -> Record {
        let cols: Arc<[String]> = vec!["id".to_string(), "name".to_string()].into();
        let row = Row::new(cols, vec![Value::from(1), Value::from("ann")]);
        let origin = RowOrigin {
            read_only,
            table: Some(Arc::new(TableInfo::new("users"))),
        };
        Record::hydrate(row, &origin).unwrap()
    }

    #[test]
    fn test_hydrated_record_is_clean_and_stored() {
        let r = stored(false);
        assert!(r.is_stored());
        assert!(!r.is_dirty());
        assert!(!r.is_read_only());
        assert_eq!(r.primary_key().unwrap(), vec![("id".to_string(), Value::Int(1))]);
    }

    #[test]
    fn test_set_tracks_only_modified_fields() {
        let mut r = stored(false);
        r.set("name", "bob").unwrap();
        assert!(r.is_dirty());
        assert_eq!(r.changes(), vec![("name", &Value::from("bob"))]);
        r.mark_clean();
        assert!(r.changes().is_empty());
    }

    #[test]
    fn test_read_only_record_rejects_writes() {
        let mut r = stored(true);
        let err = r.set("name", "bob").unwrap_err();
        assert!(matches!(err, DbError::ReadOnly(_)));
        assert!(!r.is_dirty());
    }

    #[test]
    fn test_restore_requires_reattach() {
        let mut r = stored(false);
        r.set("name", "cy").unwrap();
        let json = r.to_json().unwrap();

        let mut restored = Record::from_json(&json).unwrap();
        assert_eq!(restored.get("name"), Some(&Value::from("cy")));
        assert_eq!(restored.modified_fields().collect::<Vec<_>>(), vec!["name"]);
        assert!(restored.table().unwrap_err().is_resource_state());

        restored.attach(Arc::new(TableInfo::new("users")));
        assert!(restored.primary_key().is_ok());
    }
}
