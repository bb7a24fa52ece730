//! Scripted in-memory engine.
//!
//! [`MemoryConnection`] answers statements from a FIFO script and records
//! everything it was asked to do, so queue ordering, cursor release and
//! failure handling can be checked without a server.

use crate::connection::{Connection, RawCursor, RawResult};
use crate::error::EngineResult;
use crate::quote::Quote;
use crate::value::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Error raised by the scripted engine.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct MemoryError(pub String);

#[derive(Debug)]
enum Scripted {
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
        /// Fail the fetch of this (0-based) row instead of returning it.
        fail_at: Option<usize>,
    },
    Affected {
        rows: u64,
        last_insert_id: Option<u64>,
    },
    Error(String),
}

#[derive(Debug, Default)]
struct MemoryState {
    script: VecDeque<Scripted>,
    executed: Vec<String>,
    releases: usize,
    fetches: usize,
    last_insert_id: Option<u64>,
    affected_rows: u64,
    sequences: HashMap<String, u64>,
    closed: bool,
}

/// In-memory [`Connection`] driven by a script of results.
///
/// Each executed statement takes the next scripted result. With an empty
/// script, SELECTs return an empty result set and everything else reports
/// zero affected rows. Clones share state.
#[derive(Clone, Debug, Default)]
pub struct MemoryConnection {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a result set.
    pub fn push_rows<I, R>(&self, columns: &[&str], rows: I) -> &Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = Value>,
    {
        self.push_rows_inner(columns, rows, None)
    }

    /// Queue a result set whose fetch fails when reaching row `fail_at`.
    pub fn push_rows_failing<I, R>(&self, columns: &[&str], rows: I, fail_at: usize) -> &Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = Value>,
    {
        self.push_rows_inner(columns, rows, Some(fail_at))
    }

    fn push_rows_inner<I, R>(&self, columns: &[&str], rows: I, fail_at: Option<usize>) -> &Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = Value>,
    {
        self.state().script.push_back(Scripted::Rows {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows.into_iter().map(|r| r.into_iter().collect()).collect(),
            fail_at,
        });
        self
    }

    /// Queue a mutation result.
    pub fn push_affected(&self, rows: u64, last_insert_id: Option<u64>) -> &Self {
        self.state().script.push_back(Scripted::Affected {
            rows,
            last_insert_id,
        });
        self
    }

    /// Queue an engine error.
    pub fn push_error(&self, message: &str) -> &Self {
        self.state()
            .script
            .push_back(Scripted::Error(message.to_string()));
        self
    }

    /// Start the named sequence after `value`.
    pub fn set_sequence(&self, name: &str, value: u64) {
        self.state().sequences.insert(name.to_string(), value);
    }

    /// Every statement sent so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.state().executed.clone()
    }

    /// Number of cursors released.
    pub fn release_count(&self) -> usize {
        self.state().releases
    }

    /// Number of row fetches served.
    pub fn fetch_count(&self) -> usize {
        self.state().fetches
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }
}

/// Cursor over a scripted result set.
#[derive(Debug)]
pub struct MemoryCursor {
    columns: Vec<String>,
    rows: VecDeque<Vec<Value>>,
    position: usize,
    fail_at: Option<usize>,
    state: Arc<Mutex<MemoryState>>,
}

impl RawCursor for MemoryCursor {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    async fn fetch(&mut self) -> EngineResult<Option<Vec<Value>>> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .fetches += 1;
        if self.fail_at == Some(self.position) {
            return Err(Box::new(MemoryError(format!(
                "fetch failed at row {}",
                self.position
            ))));
        }
        let row = self.rows.pop_front();
        if row.is_some() {
            self.position += 1;
        }
        Ok(row)
    }

    fn release(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .releases += 1;
    }
}

impl Quote for MemoryConnection {}

impl Connection for MemoryConnection {
    type Cursor = MemoryCursor;

    async fn execute(&self, sql: &str) -> EngineResult<RawResult<MemoryCursor>> {
        let mut state = self.state();
        if state.closed {
            return Err(Box::new(MemoryError("connection closed".to_string())));
        }
        state.executed.push(sql.to_string());
        let scripted = state.script.pop_front().unwrap_or_else(|| {
            if sql.trim_start().to_ascii_uppercase().starts_with("SELECT") {
                Scripted::Rows {
                    columns: Vec::new(),
                    rows: Vec::new(),
                    fail_at: None,
                }
            } else {
                Scripted::Affected {
                    rows: 0,
                    last_insert_id: None,
                }
            }
        });
        match scripted {
            Scripted::Rows {
                columns,
                rows,
                fail_at,
            } => {
                state.affected_rows = rows.len() as u64;
                Ok(RawResult::Rows(MemoryCursor {
                    columns,
                    rows: rows.into(),
                    position: 0,
                    fail_at,
                    state: Arc::clone(&self.state),
                }))
            }
            Scripted::Affected {
                rows,
                last_insert_id,
            } => {
                state.affected_rows = rows;
                if last_insert_id.is_some() {
                    state.last_insert_id = last_insert_id;
                }
                Ok(RawResult::Affected(rows))
            }
            Scripted::Error(message) => Err(Box::new(MemoryError(message))),
        }
    }

    async fn next_sequence_id(&self, name: &str) -> EngineResult<Option<u64>> {
        let mut state = self.state();
        let next = state.sequences.entry(name.to_string()).or_insert(0);
        *next += 1;
        Ok(Some(*next))
    }

    fn last_insert_id(&self) -> Option<u64> {
        self.state().last_insert_id
    }

    fn affected_rows(&self) -> u64 {
        self.state().affected_rows
    }

    async fn close(&self) -> EngineResult<()> {
        self.state().closed = true;
        Ok(())
    }
}
