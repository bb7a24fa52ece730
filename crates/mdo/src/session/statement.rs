//! Deferred statements and their materialization.

use crate::builder::StatementKind;
use crate::connection::Connection;
use crate::cursor::ResultCursor;
use crate::error::{DbError, DbResult};
use crate::fetch::{
    Assoc, ColumnAt, FieldNamed, Hydrator, KeyPair, KeyedMap, RowMap, RowMapper, Transform,
};
use crate::record::{Hydrate, RowOrigin};
use crate::row::Row;
use crate::session::queue::{ExecInfo, Executed, Inner, SharedSlot, lock};
use crate::value::Value;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use std::fmt;
use std::sync::Arc;

/// Lifecycle of a [`Statement`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatementState {
    /// Prepared, not yet observed by its owner.
    Queued,
    /// Raw result obtained.
    Executed,
    /// At least one fetch strategy ran over the result.
    Materialized,
    /// Execution failed; the error was reported once.
    Failed,
}

/// A prepared statement whose execution is deferred until its result is
/// first observed.
///
/// Observing it (any fetch, `execute()`, `affected_rows()`, ...) runs every
/// statement queued before it on the same session first. Eager `fetch_*`
/// methods return owned collections; a buffered result can be fetched any
/// number of times, a streamed one exactly once. Lazy `stream_*` methods
/// return single-pass streams that fetch one row per item and release a
/// streamed cursor when finished or dropped.
pub struct Statement<C: Connection> {
    inner: Arc<Inner<C>>,
    id: u64,
    sql: Arc<str>,
    kind: StatementKind,
    origin: RowOrigin,
    buffered: bool,
    slot: SharedSlot<C::Cursor>,
    state: StatementState,
    result: Option<Executed<C::Cursor>>,
}

impl<C: Connection> Statement<C> {
    pub(crate) fn new(
        inner: Arc<Inner<C>>,
        id: u64,
        sql: Arc<str>,
        kind: StatementKind,
        origin: RowOrigin,
        buffered: bool,
        slot: SharedSlot<C::Cursor>,
    ) -> Self {
        Self {
            inner,
            id,
            sql,
            kind,
            origin,
            buffered,
            slot,
            state: StatementState::Queued,
            result: None,
        }
    }

    /// Position in the session's submission order.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn state(&self) -> StatementState {
        self.state
    }

    /// Whether the statement asked for a buffered (restartable) result.
    pub fn is_buffered(&self) -> bool {
        self.buffered
    }

    pub fn origin(&self) -> &RowOrigin {
        &self.origin
    }

    /// Register a callback that runs once, right after execution and before
    /// any materialization. Only allowed while the statement is still
    /// queued. Callbacks are dropped without running if execution fails.
    pub fn on_executed<F>(&mut self, callback: F) -> DbResult<()>
    where
        F: FnOnce(&ExecInfo) + Send + 'static,
    {
        if self.state != StatementState::Queued {
            return Err(DbError::resource(format!(
                "statement #{} has already run; callbacks must be registered before execution",
                self.id
            )));
        }
        let mut slot = lock(&self.slot);
        if slot.outcome.is_some() {
            return Err(DbError::resource(format!(
                "statement #{} has already run; callbacks must be registered before execution",
                self.id
            )));
        }
        slot.callbacks.push(Box::new(callback));
        Ok(())
    }

    /// Run the statement (and everything queued before it) now.
    pub async fn execute(&mut self) -> DbResult<()> {
        self.ensure_executed().await
    }

    async fn ensure_executed(&mut self) -> DbResult<()> {
        match self.state {
            StatementState::Executed | StatementState::Materialized => return Ok(()),
            StatementState::Failed => {
                return Err(DbError::resource(format!(
                    "statement #{} previously failed",
                    self.id
                )));
            }
            StatementState::Queued => {}
        }

        self.inner.run_until(Some(self.id), self.buffered).await?;

        let outcome = lock(&self.slot).outcome.take();
        match outcome {
            Some(Ok(executed)) => {
                self.result = Some(executed);
                self.state = StatementState::Executed;
                Ok(())
            }
            Some(Err(err)) => {
                self.state = StatementState::Failed;
                Err(err)
            }
            None => Err(DbError::resource(format!(
                "statement #{} is no longer queued",
                self.id
            ))),
        }
    }

    fn cursor_mut(&mut self) -> DbResult<&mut ResultCursor<C::Cursor>> {
        match self.result.as_mut() {
            Some(Executed::Rows(cursor)) => Ok(cursor),
            Some(Executed::Affected { .. }) => Err(DbError::resource(format!(
                "statement #{} produced no result set",
                self.id
            ))),
            None => Err(DbError::resource(format!(
                "statement #{} has not been executed",
                self.id
            ))),
        }
    }

    /// Hand the cursor back after one materialization: buffered cursors are
    /// rewound for reuse, streamed ones released.
    fn finish_cursor(&mut self) {
        if let Some(Executed::Rows(cursor)) = self.result.as_mut() {
            if cursor.is_buffered() {
                let _ = cursor.rewind();
            } else {
                cursor.release();
            }
        }
        if self.state == StatementState::Executed {
            self.state = StatementState::Materialized;
        }
    }

    /// Release the result cursor now.
    pub fn release(&mut self) {
        if let Some(Executed::Rows(cursor)) = self.result.as_mut() {
            cursor.release();
        }
    }

    /// Rows affected by a mutation; for a result set, its buffered row
    /// count or the engine's count.
    pub async fn affected_rows(&mut self) -> DbResult<u64> {
        self.ensure_executed().await?;
        Ok(match &self.result {
            Some(Executed::Affected { rows, .. }) => *rows,
            Some(Executed::Rows(cursor)) => match cursor.row_count() {
                Some(n) => n as u64,
                None => self.inner.conn.affected_rows(),
            },
            None => 0,
        })
    }

    /// Id generated by this statement, if it was an insert.
    pub async fn last_insert_id(&mut self) -> DbResult<Option<u64>> {
        self.ensure_executed().await?;
        Ok(match &self.result {
            Some(Executed::Affected { last_insert_id, .. }) => *last_insert_id,
            _ => None,
        })
    }

    /// Row count of a buffered result set; `None` when streamed or for
    /// mutations.
    pub async fn row_count(&mut self) -> DbResult<Option<usize>> {
        self.ensure_executed().await?;
        Ok(match &self.result {
            Some(Executed::Rows(cursor)) => cursor.row_count(),
            _ => None,
        })
    }

    /// First row. A buffered cursor is left untouched; a streamed one is
    /// consumed and released.
    pub async fn first(&mut self) -> DbResult<Option<Row>> {
        self.ensure_executed().await?;
        let cursor = self.cursor_mut()?;
        if cursor.is_buffered() {
            return Ok(cursor.first_row()?.cloned());
        }
        let row = cursor.next_row().await;
        self.finish_cursor();
        row
    }

    // ==================== Drivers ====================

    async fn materialize<M, B>(&mut self, mut mapper: M) -> DbResult<B>
    where
        M: RowMapper,
        B: Default + Extend<M::Item>,
    {
        self.ensure_executed().await?;
        let drained = drain(self.cursor_mut()?, &mut mapper).await;
        self.finish_cursor();
        drained
    }

    fn stream_mapped<'a, M>(&'a mut self, mapper: M) -> BoxStream<'a, DbResult<M::Item>>
    where
        M: RowMapper + 'a,
    {
        let lease = Lease {
            stmt: self,
            started: false,
        };
        stream::try_unfold((lease, mapper), |(mut lease, mut mapper)| async move {
            if !lease.started {
                lease.stmt.ensure_executed().await?;
                lease.started = true;
            }
            match lease.stmt.cursor_mut()?.next_row().await? {
                Some(row) => {
                    let item = mapper.map_row(row)?;
                    Ok::<_, DbError>(Some((item, (lease, mapper))))
                }
                None => Ok(None),
            }
        })
        .boxed()
    }

    // ==================== Eager ====================

    /// Every row.
    pub async fn fetch_rows(&mut self) -> DbResult<Vec<Row>> {
        self.materialize(RowMap).await
    }

    /// One column, by ordinal, from every row.
    pub async fn fetch_column(&mut self, idx: usize) -> DbResult<Vec<Value>> {
        self.materialize(ColumnAt(idx)).await
    }

    /// One column, by name, from every row.
    pub async fn fetch_field(&mut self, name: &str) -> DbResult<Vec<Value>> {
        self.materialize(FieldNamed(name.to_string())).await
    }

    /// First column to second column; later rows overwrite earlier keys.
    pub async fn fetch_pairs(&mut self) -> DbResult<KeyedMap<Value>> {
        self.materialize(KeyPair).await
    }

    /// First column to the whole row; later rows overwrite earlier keys.
    pub async fn fetch_assoc_map(&mut self) -> DbResult<KeyedMap<Row>> {
        self.materialize(Assoc).await
    }

    /// Rows hydrated as `T`, tagged with the originating select's context.
    pub async fn fetch_entities<T: Hydrate>(&mut self) -> DbResult<Vec<T>> {
        let origin = self.origin.clone();
        self.materialize(Hydrator::<T, _>::of(origin)).await
    }

    /// Rows hydrated by `factory`, which may choose the type per row.
    pub async fn fetch_entities_with<T, F>(&mut self, factory: F) -> DbResult<Vec<T>>
    where
        T: Send,
        F: FnMut(Row, &RowOrigin) -> DbResult<T> + Send,
    {
        let origin = self.origin.clone();
        self.materialize(Hydrator::with(origin, factory)).await
    }

    /// Rows passed through `f`.
    pub async fn fetch_with<T, F>(&mut self, f: F) -> DbResult<Vec<T>>
    where
        T: Send,
        F: FnMut(Row) -> T + Send,
    {
        self.materialize(Transform(f)).await
    }

    // ==================== Lazy ====================

    pub fn stream_rows(&mut self) -> BoxStream<'_, DbResult<Row>> {
        self.stream_mapped(RowMap)
    }

    pub fn stream_column(&mut self, idx: usize) -> BoxStream<'_, DbResult<Value>> {
        self.stream_mapped(ColumnAt(idx))
    }

    pub fn stream_field(&mut self, name: &str) -> BoxStream<'_, DbResult<Value>> {
        self.stream_mapped(FieldNamed(name.to_string()))
    }

    /// `(key, value)` pairs in cursor order; duplicate keys are not merged.
    pub fn stream_pairs(&mut self) -> BoxStream<'_, DbResult<(Value, Value)>> {
        self.stream_mapped(KeyPair)
    }

    /// `(key, row)` pairs in cursor order; duplicate keys are not merged.
    pub fn stream_assoc(&mut self) -> BoxStream<'_, DbResult<(Value, Row)>> {
        self.stream_mapped(Assoc)
    }

    pub fn stream_entities<T: Hydrate>(&mut self) -> BoxStream<'_, DbResult<T>> {
        let origin = self.origin.clone();
        self.stream_mapped(Hydrator::<T, _>::of(origin))
    }

    pub fn stream_entities_with<'a, T, F>(&'a mut self, factory: F) -> BoxStream<'a, DbResult<T>>
    where
        T: Send + 'a,
        F: FnMut(Row, &RowOrigin) -> DbResult<T> + Send + 'a,
    {
        let origin = self.origin.clone();
        self.stream_mapped(Hydrator::with(origin, factory))
    }

    pub fn stream_with<'a, T, F>(&'a mut self, f: F) -> BoxStream<'a, DbResult<T>>
    where
        T: Send + 'a,
        F: FnMut(Row) -> T + Send + 'a,
    {
        self.stream_mapped(Transform(f))
    }
}

async fn drain<Cur, M, B>(cursor: &mut ResultCursor<Cur>, mapper: &mut M) -> DbResult<B>
where
    Cur: crate::connection::RawCursor,
    M: RowMapper,
    B: Default + Extend<M::Item>,
{
    let mut out = B::default();
    while let Some(row) = cursor.next_row().await? {
        out.extend(std::iter::once(mapper.map_row(row)?));
    }
    Ok(out)
}

/// Exclusive use of a statement's cursor by one lazy stream.
struct Lease<'a, C: Connection> {
    stmt: &'a mut Statement<C>,
    started: bool,
}

impl<C: Connection> Drop for Lease<'_, C> {
    fn drop(&mut self) {
        if self.started {
            self.stmt.finish_cursor();
        }
    }
}

impl<C: Connection> fmt::Debug for Statement<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("buffered", &self.buffered)
            .field("sql", &self.sql)
            .finish()
    }
}
