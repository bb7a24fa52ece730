//! Table metadata consumed by the select builder and by hydration.
//!
//! Persistence (save/delete, lifecycle hooks) lives outside this crate; a
//! [`Table`] only has to describe itself.

use std::fmt;

/// How new primary-key values are produced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SequencePolicy {
    /// Engine-assigned (`AUTO_INCREMENT`), read back via `last_insert_id`.
    #[default]
    AutoIncrement,
    /// Drawn from a named sequence via `next_sequence_id`.
    Named(String),
    /// Natural key supplied by the caller.
    None,
}

/// Static description of a table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableInfo {
    pub schema: Option<String>,
    pub name: String,
    pub primary_keys: Vec<String>,
    pub sequence: SequencePolicy,
}

impl TableInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
            primary_keys: vec!["id".to_string()],
            sequence: SequencePolicy::default(),
        }
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn primary_keys(mut self, keys: &[&str]) -> Self {
        self.primary_keys = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn sequence(mut self, sequence: SequencePolicy) -> Self {
        self.sequence = sequence;
        self
    }

    /// `schema.name` or just `name`.
    pub fn qualified_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{schema}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// A table gateway as seen by the query layer.
pub trait Table: Send + Sync {
    fn info(&self) -> &TableInfo;
}

impl Table for TableInfo {
    fn info(&self) -> &TableInfo {
        self
    }
}

impl fmt::Debug for dyn Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Table")
            .field(&self.info().qualified_name())
            .finish()
    }
}
