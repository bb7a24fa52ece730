//! Materialization strategies.
//!
//! Every strategy is a [`RowMapper`]: it turns one [`Row`] into one item.
//! [`Statement`](crate::session::Statement) drives a mapper either eagerly
//! (collecting into a `Vec` or a [`KeyedMap`]) or lazily (as a stream that
//! fetches one row per item), so any mapper works with both.

use crate::error::{DbError, DbResult};
use crate::record::{Hydrate, RowOrigin};
use crate::row::Row;
use crate::value::Value;
use std::collections::HashMap;
use std::marker::PhantomData;

/// Row-at-a-time conversion.
pub trait RowMapper: Send {
    type Item: Send;

    fn map_row(&mut self, row: Row) -> DbResult<Self::Item>;
}

/// Each row as a field-ordered map.
#[derive(Clone, Copy, Debug, Default)]
pub struct RowMap;

impl RowMapper for RowMap {
    type Item = Row;

    fn map_row(&mut self, row: Row) -> DbResult<Row> {
        Ok(row)
    }
}

/// One column by ordinal position.
#[derive(Clone, Copy, Debug)]
pub struct ColumnAt(pub usize);

impl RowMapper for ColumnAt {
    type Item = Value;

    fn map_row(&mut self, row: Row) -> DbResult<Value> {
        let idx = self.0;
        row.into_values()
            .into_iter()
            .nth(idx)
            .ok_or_else(|| DbError::decode(format!("#{idx}"), "column index out of range"))
    }
}

/// One column by name.
#[derive(Clone, Debug)]
pub struct FieldNamed(pub String);

impl RowMapper for FieldNamed {
    type Item = Value;

    fn map_row(&mut self, row: Row) -> DbResult<Value> {
        row.get_named(&self.0)
            .cloned()
            .ok_or_else(|| DbError::decode(self.0.as_str(), "no such column in row"))
    }
}

/// First column as key, second as value.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeyPair;

impl RowMapper for KeyPair {
    type Item = (Value, Value);

    fn map_row(&mut self, row: Row) -> DbResult<(Value, Value)> {
        if row.len() < 2 {
            return Err(DbError::decode(
                "#1",
                format!("key/value fetch needs two columns, row has {}", row.len()),
            ));
        }
        let mut values = row.into_values().into_iter();
        match (values.next(), values.next()) {
            (Some(key), Some(value)) => Ok((key, value)),
            _ => Err(DbError::decode("#1", "key/value fetch needs two columns")),
        }
    }
}

/// First column as key, the whole row as value.
#[derive(Clone, Copy, Debug, Default)]
pub struct Assoc;

impl RowMapper for Assoc {
    type Item = (Value, Row);

    fn map_row(&mut self, row: Row) -> DbResult<(Value, Row)> {
        let key = row.first_value()?.clone();
        Ok((key, row))
    }
}

/// Typed construction from a row, with the originating select's context.
///
/// The factory may pick the concrete type from the row itself.
pub struct Hydrator<T, F> {
    origin: RowOrigin,
    factory: F,
    _marker: PhantomData<fn() -> T>,
}

impl<T, F> Hydrator<T, F>
where
    F: FnMut(Row, &RowOrigin) -> DbResult<T>,
{
    pub fn with(origin: RowOrigin, factory: F) -> Self {
        Self {
            origin,
            factory,
            _marker: PhantomData,
        }
    }
}

impl<T: Hydrate> Hydrator<T, fn(Row, &RowOrigin) -> DbResult<T>> {
    /// Hydrate through `T`'s own constructor.
    pub fn of(origin: RowOrigin) -> Self {
        Self::with(origin, T::hydrate)
    }
}

impl<T, F> RowMapper for Hydrator<T, F>
where
    T: Send,
    F: FnMut(Row, &RowOrigin) -> DbResult<T> + Send,
{
    type Item = T;

    fn map_row(&mut self, row: Row) -> DbResult<T> {
        (self.factory)(row, &self.origin)
    }
}

/// Arbitrary caller transform.
pub struct Transform<F>(pub F);

impl<T, F> RowMapper for Transform<F>
where
    T: Send,
    F: FnMut(Row) -> T + Send,
{
    type Item = T;

    fn map_row(&mut self, row: Row) -> DbResult<T> {
        Ok((self.0)(row))
    }
}

/// Insertion-ordered map keyed by [`Value`].
///
/// Re-inserting an existing key replaces its value in place (last write
/// wins), so the map holds one entry per distinct key.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyedMap<V> {
    entries: Vec<(Value, V)>,
    index: HashMap<Value, usize>,
}

impl<V> Default for KeyedMap<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<V> KeyedMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, returning the value previously stored under `key`.
    pub fn insert(&mut self, key: Value, value: V) -> Option<V> {
        match self.index.get(&key) {
            Some(&pos) => Some(std::mem::replace(&mut self.entries[pos].1, value)),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &Value) -> Option<&V> {
        self.index.get(key).map(|&pos| &self.entries[pos].1)
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &V)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }
}

impl<V> Extend<(Value, V)> for KeyedMap<V> {
    fn extend<I: IntoIterator<Item = (Value, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<V> FromIterator<(Value, V)> for KeyedMap<V> {
    fn from_iter<I: IntoIterator<Item = (Value, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<V> IntoIterator for KeyedMap<V> {
    type Item = (Value, V);
    type IntoIter = std::vec::IntoIter<(Value, V)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
