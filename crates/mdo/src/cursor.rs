//! Result cursors owned by a [`Statement`](crate::session::Statement).

use crate::connection::RawCursor;
use crate::error::{DbError, DbResult};
use crate::row::Row;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

enum Body<Cur> {
    /// Fully read rows; restartable.
    Buffered { rows: Vec<Row>, position: usize },
    /// Live engine cursor; forward-only. `None` once released.
    Streamed {
        raw: Option<Cur>,
        open: Arc<AtomicBool>,
    },
}

/// Row sequence of one executed statement.
///
/// A buffered cursor can be rewound and read again. A streamed cursor is
/// read once and released exactly once, at the latest when dropped. Any
/// access after release, or after the owning session was closed, fails
/// with [`DbError::ResourceState`].
pub struct ResultCursor<Cur: RawCursor> {
    sql: Arc<str>,
    columns: Arc<[String]>,
    body: Body<Cur>,
    closed: Arc<AtomicBool>,
    released: bool,
}

impl<Cur: RawCursor> ResultCursor<Cur> {
    pub(crate) fn buffered(
        sql: Arc<str>,
        columns: Arc<[String]>,
        rows: Vec<Row>,
        closed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            sql,
            columns,
            body: Body::Buffered { rows, position: 0 },
            closed,
            released: false,
        }
    }

    /// `open` is the session flag that blocks further execution while this
    /// cursor is alive; it is cleared on release.
    pub(crate) fn streamed(
        sql: Arc<str>,
        raw: Cur,
        closed: Arc<AtomicBool>,
        open: Arc<AtomicBool>,
    ) -> Self {
        let columns: Arc<[String]> = raw.columns().to_vec().into();
        open.store(true, Ordering::SeqCst);
        Self {
            sql,
            columns,
            body: Body::Streamed {
                raw: Some(raw),
                open,
            },
            closed,
            released: false,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn is_buffered(&self) -> bool {
        matches!(self.body, Body::Buffered { .. })
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Number of rows, for buffered cursors.
    pub fn row_count(&self) -> Option<usize> {
        match &self.body {
            Body::Buffered { rows, .. } => Some(rows.len()),
            Body::Streamed { .. } => None,
        }
    }

    /// First row of a buffered cursor, without moving it.
    pub fn first_row(&self) -> DbResult<Option<&Row>> {
        self.check_usable()?;
        match &self.body {
            Body::Buffered { rows, .. } => Ok(rows.first()),
            Body::Streamed { .. } => Err(DbError::resource(
                "a streamed cursor cannot be peeked without consuming it",
            )),
        }
    }

    fn check_usable(&self) -> DbResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DbError::resource(
                "the connection this cursor belongs to has been closed",
            ));
        }
        if self.released {
            return Err(DbError::resource("the result cursor has already been released"));
        }
        Ok(())
    }

    /// Advance by exactly one row.
    pub async fn next_row(&mut self) -> DbResult<Option<Row>> {
        self.check_usable()?;
        match &mut self.body {
            Body::Buffered { rows, position } => {
                let row = rows.get(*position).cloned();
                if row.is_some() {
                    *position += 1;
                }
                Ok(row)
            }
            Body::Streamed { raw, .. } => {
                let Some(raw) = raw.as_mut() else {
                    return Err(DbError::resource("the result cursor has already been released"));
                };
                match raw.fetch().await {
                    Ok(Some(values)) => Ok(Some(Row::new(Arc::clone(&self.columns), values))),
                    Ok(None) => Ok(None),
                    Err(source) => Err(DbError::engine(self.sql.as_ref(), source)),
                }
            }
        }
    }

    /// Restart a buffered cursor from its first row.
    pub fn rewind(&mut self) -> DbResult<()> {
        self.check_usable()?;
        match &mut self.body {
            Body::Buffered { position, .. } => {
                *position = 0;
                Ok(())
            }
            Body::Streamed { .. } => Err(DbError::resource("a streamed cursor cannot be rewound")),
        }
    }

    /// Release engine resources. Idempotent; only the first call reaches
    /// the engine.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match &mut self.body {
            Body::Buffered { rows, position } => {
                rows.clear();
                *position = 0;
            }
            Body::Streamed { raw, open } => {
                if let Some(mut raw) = raw.take() {
                    raw.release();
                }
                open.store(false, Ordering::SeqCst);
                tracing::trace!(target: "mdo.sql", sql = %self.sql, "released streamed cursor");
            }
        }
    }
}

impl<Cur: RawCursor> Drop for ResultCursor<Cur> {
    fn drop(&mut self) {
        if !self.is_buffered() {
            self.release();
        }
    }
}

impl<Cur: RawCursor> std::fmt::Debug for ResultCursor<Cur> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCursor")
            .field("buffered", &self.is_buffered())
            .field("columns", &self.columns)
            .field("row_count", &self.row_count())
            .field("released", &self.released)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryCursor;
    use crate::value::Value;

    fn buffered(closed: Arc<AtomicBool>) -> ResultCursor<MemoryCursor> {
        let columns: Arc<[String]> = vec!["id".to_string()].into();
        let rows = (1..=2)
            .map(|i| Row::new(Arc::clone(&columns), vec![Value::from(i)]))
            .collect();
        ResultCursor::buffered("SELECT id FROM t".into(), columns, rows, closed)
    }

    #[tokio::test]
    async fn test_buffered_cursor_rewinds() {
        let mut cursor = buffered(Arc::new(AtomicBool::new(false)));
        assert_eq!(cursor.row_count(), Some(2));
        assert!(cursor.next_row().await.unwrap().is_some());
        assert!(cursor.next_row().await.unwrap().is_some());
        assert!(cursor.next_row().await.unwrap().is_none());
        cursor.rewind().unwrap();
        let first = cursor.next_row().await.unwrap().unwrap();
        assert_eq!(first.get(0), Some(&Value::from(1)));
    }

    #[tokio::test]
    async fn test_released_or_closed_cursor_is_unusable() {
        let mut cursor = buffered(Arc::new(AtomicBool::new(false)));
        cursor.release();
        cursor.release();
        assert!(cursor.is_released());
        assert!(cursor.next_row().await.unwrap_err().is_resource_state());

        let closed = Arc::new(AtomicBool::new(false));
        let mut cursor = buffered(Arc::clone(&closed));
        closed.store(true, Ordering::SeqCst);
        assert!(cursor.first_row().unwrap_err().is_resource_state());
        assert!(cursor.rewind().unwrap_err().is_resource_state());
    }
}
