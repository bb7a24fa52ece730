//! Connection-scoped FIFO of prepared statements.
//!
//! Statements are queued at `prepare()` time and executed lazily. Running
//! statement N first runs every statement queued before it, in order, while
//! holding the engine lock; their outcomes are parked in per-statement
//! slots until the owning [`Statement`](super::Statement) asks for them.

use crate::builder::StatementKind;
use crate::connection::{Connection, RawCursor, RawResult};
use crate::cursor::ResultCursor;
use crate::error::{DbError, DbResult};
use crate::row::Row;
use crate::session::config::SessionConfig;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// What post-execution callbacks receive.
#[derive(Clone, Debug)]
pub struct ExecInfo {
    pub id: u64,
    pub sql: Arc<str>,
    pub kind: StatementKind,
    pub columns: Vec<String>,
    /// Row count of a buffered result set.
    pub row_count: Option<usize>,
    /// Affected rows of a mutation.
    pub affected_rows: Option<u64>,
    pub elapsed: Duration,
}

pub(crate) type Callback = Box<dyn FnOnce(&ExecInfo) + Send>;

pub(crate) enum Executed<Cur: RawCursor> {
    Rows(ResultCursor<Cur>),
    Affected {
        rows: u64,
        last_insert_id: Option<u64>,
    },
}

pub(crate) struct Slot<Cur: RawCursor> {
    pub(crate) callbacks: Vec<Callback>,
    pub(crate) outcome: Option<DbResult<Executed<Cur>>>,
}

impl<Cur: RawCursor> Default for Slot<Cur> {
    fn default() -> Self {
        Self {
            callbacks: Vec::new(),
            outcome: None,
        }
    }
}

pub(crate) type SharedSlot<Cur> = Arc<Mutex<Slot<Cur>>>;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) struct Pending<Cur: RawCursor> {
    pub(crate) id: u64,
    pub(crate) sql: Arc<str>,
    pub(crate) kind: StatementKind,
    pub(crate) slot: SharedSlot<Cur>,
}

pub(crate) struct Inner<C: Connection> {
    pub(crate) conn: Arc<C>,
    pub(crate) config: SessionConfig,
    pub(crate) queue: Mutex<VecDeque<Pending<C::Cursor>>>,
    /// Single-flight guard: held while anything talks to the engine.
    pub(crate) engine: tokio::sync::Mutex<()>,
    pub(crate) closed: Arc<AtomicBool>,
    /// Set while a streamed cursor holds the connection.
    pub(crate) stream_open: Arc<AtomicBool>,
    pub(crate) next_id: AtomicU64,
}

impl<C: Connection> Inner<C> {
    pub(crate) fn new(conn: C, config: SessionConfig) -> Self {
        Self {
            conn: Arc::new(conn),
            config,
            queue: Mutex::new(VecDeque::new()),
            engine: tokio::sync::Mutex::new(()),
            closed: Arc::new(AtomicBool::new(false)),
            stream_open: Arc::new(AtomicBool::new(false)),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn enqueue(&self, sql: Arc<str>, kind: StatementKind) -> (u64, SharedSlot<C::Cursor>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let slot: SharedSlot<C::Cursor> = Arc::new(Mutex::new(Slot::default()));
        lock(&self.queue).push_back(Pending {
            id,
            sql,
            kind,
            slot: Arc::clone(&slot),
        });
        (id, slot)
    }

    pub(crate) fn pending(&self) -> usize {
        lock(&self.queue).len()
    }

    /// Fail fast if the engine cannot take another statement right now.
    pub(crate) fn ensure_available(&self) -> DbResult<()> {
        if self.is_closed() {
            return Err(DbError::resource("the connection has been closed"));
        }
        if self.stream_open.load(Ordering::SeqCst) {
            return Err(DbError::resource(
                "a streamed result is still open on this connection; consume or drop it first",
            ));
        }
        Ok(())
    }

    /// Execute queued statements in order, up to and including `target`
    /// (everything when `None`). Only `target` may be left unbuffered.
    ///
    /// Errors returned here leave the queue untouched; per-statement
    /// failures are parked in the statement's slot instead.
    pub(crate) async fn run_until(&self, target: Option<u64>, target_buffered: bool) -> DbResult<()> {
        let _engine = self.engine.lock().await;
        loop {
            let next = {
                let mut queue = lock(&self.queue);
                match queue.front() {
                    Some(front) if target.is_none_or(|t| front.id <= t) => {
                        self.ensure_available()?;
                        queue.pop_front()
                    }
                    _ => None,
                }
            };
            let Some(pending) = next else {
                return Ok(());
            };

            let buffered = if Some(pending.id) == target {
                target_buffered
            } else {
                tracing::trace!(
                    target: "mdo.sql",
                    id = pending.id,
                    ahead_of = ?target,
                    "flushing queued statement"
                );
                true
            };

            let (outcome, elapsed) = self.execute_one(&pending, buffered).await;
            let info = outcome.as_ref().ok().map(|executed| ExecInfo {
                id: pending.id,
                sql: Arc::clone(&pending.sql),
                kind: pending.kind,
                columns: match executed {
                    Executed::Rows(cursor) => cursor.columns().to_vec(),
                    Executed::Affected { .. } => Vec::new(),
                },
                row_count: match executed {
                    Executed::Rows(cursor) => cursor.row_count(),
                    Executed::Affected { .. } => None,
                },
                affected_rows: match executed {
                    Executed::Rows(_) => None,
                    Executed::Affected { rows, .. } => Some(*rows),
                },
                elapsed,
            });

            let callbacks = {
                let mut slot = lock(&pending.slot);
                slot.outcome = Some(outcome);
                std::mem::take(&mut slot.callbacks)
            };
            if let Some(info) = info {
                for callback in callbacks {
                    callback(&info);
                }
            }
        }
    }

    async fn execute_one(
        &self,
        pending: &Pending<C::Cursor>,
        buffered: bool,
    ) -> (DbResult<Executed<C::Cursor>>, Duration) {
        let start = Instant::now();
        let outcome = match self.conn.execute(&pending.sql).await {
            Err(source) => Err(DbError::engine(pending.sql.as_ref(), source)),
            Ok(RawResult::Affected(rows)) => Ok(Executed::Affected {
                rows,
                last_insert_id: self.conn.last_insert_id(),
            }),
            Ok(RawResult::Rows(raw)) if buffered => self.buffer(&pending.sql, raw).await,
            Ok(RawResult::Rows(raw)) => Ok(Executed::Rows(ResultCursor::streamed(
                Arc::clone(&pending.sql),
                raw,
                Arc::clone(&self.closed),
                Arc::clone(&self.stream_open),
            ))),
        };
        let elapsed = start.elapsed();
        self.log(pending, &outcome, elapsed);
        (outcome, elapsed)
    }

    async fn buffer(&self, sql: &Arc<str>, mut raw: C::Cursor) -> DbResult<Executed<C::Cursor>> {
        let columns: Arc<[String]> = raw.columns().to_vec().into();
        let mut rows = Vec::new();
        let fetched = loop {
            match raw.fetch().await {
                Ok(Some(values)) => rows.push(Row::new(Arc::clone(&columns), values)),
                Ok(None) => break Ok(()),
                Err(source) => break Err(DbError::engine(sql.as_ref(), source)),
            }
        };
        raw.release();
        fetched.map(|()| {
            Executed::Rows(ResultCursor::buffered(
                Arc::clone(sql),
                columns,
                rows,
                Arc::clone(&self.closed),
            ))
        })
    }

    fn log(&self, pending: &Pending<C::Cursor>, outcome: &DbResult<Executed<C::Cursor>>, elapsed: Duration) {
        let config = &self.config;
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        match outcome {
            Err(err) => tracing::error!(
                target: "mdo.sql",
                id = pending.id,
                kind = pending.kind.as_str(),
                elapsed_ms,
                sql = %config.truncate_sql(&pending.sql),
                error = %err,
                "statement failed"
            ),
            Ok(_) => {
                if config
                    .slow_query_threshold
                    .is_some_and(|threshold| elapsed >= threshold)
                {
                    tracing::warn!(
                        target: "mdo.sql",
                        id = pending.id,
                        kind = pending.kind.as_str(),
                        elapsed_ms,
                        sql = %config.truncate_sql(&pending.sql),
                        "slow statement"
                    );
                } else if config.log_sql {
                    tracing::debug!(
                        target: "mdo.sql",
                        id = pending.id,
                        kind = pending.kind.as_str(),
                        elapsed_ms,
                        sql = %config.truncate_sql(&pending.sql),
                        "statement executed"
                    );
                }
            }
        }
    }

    /// Fail everything still queued; returns how many statements that was.
    pub(crate) fn abandon_pending(&self) -> usize {
        let abandoned: Vec<Pending<C::Cursor>> = lock(&self.queue).drain(..).collect();
        let count = abandoned.len();
        for pending in abandoned {
            lock(&pending.slot).outcome = Some(Err(DbError::resource(format!(
                "the connection was closed before statement #{} ran",
                pending.id
            ))));
        }
        count
    }
}
