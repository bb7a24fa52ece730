//! Statement execution against one connection.
//!
//! A [`Session`] owns a connection and the FIFO of statements prepared on
//! it. `prepare()` assembles and enqueues a statement without running it;
//! the returned [`Statement`] executes on first observation, after every
//! statement queued before it.
//!
//! ```ignore
//! let session = Session::new(conn);
//! let mut users = session.prepare(&session.select().from("users"))?;
//! let mut posts = session.prepare(&session.select().from("posts"))?;
//!
//! // Runs the users query first, then the posts query.
//! let posts = posts.fetch_rows().await?;
//! let users = users.fetch_rows().await?;
//! ```

mod config;
mod queue;
mod statement;

pub use config::SessionConfig;
pub use queue::ExecInfo;
pub use statement::{Statement, StatementState};

use crate::builder::{Assemble, Cond, Delete, Insert, Select, Update};
use crate::connection::Connection;
use crate::error::{DbError, DbResult};
use crate::quote::Quote;
use crate::record::Record;
use crate::row::Row;
use crate::value::Value;
use queue::Inner;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::Ordering;

/// Result of [`Session::execute`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExecSummary {
    pub affected_rows: u64,
    pub last_insert_id: Option<u64>,
}

/// Shared handle to one connection and its statement queue.
///
/// Cloning is cheap; clones share the queue and the closed state.
pub struct Session<C: Connection> {
    inner: Arc<Inner<C>>,
}

impl<C: Connection> Clone for Session<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connection> Session<C> {
    pub fn new(conn: C) -> Self {
        Self::with_config(conn, SessionConfig::default())
    }

    pub fn with_config(conn: C, config: SessionConfig) -> Self {
        Self {
            inner: Arc::new(Inner::new(conn, config)),
        }
    }

    pub fn connection(&self) -> &C {
        &self.inner.conn
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// The connection's quoting rules, for building statements by hand.
    pub fn quoter(&self) -> Arc<dyn Quote> {
        let conn: Arc<C> = Arc::clone(&self.inner.conn);
        conn
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    // ==================== Builders ====================

    /// An empty SELECT quoted by this connection.
    pub fn select(&self) -> Select {
        Select::new(self.quoter())
    }

    pub fn insert(&self, table: &str) -> Insert {
        Insert::new(self.quoter(), table)
    }

    pub fn update(&self, table: &str) -> Update {
        Update::new(self.quoter(), table)
    }

    pub fn delete(&self, table: &str) -> Delete {
        Delete::from(self.quoter(), table)
    }

    // ==================== Prepare / execute ====================

    /// Assemble and enqueue a statement using the session's default result
    /// mode. Nothing is sent to the engine yet.
    pub fn prepare<S: Assemble + ?Sized>(&self, stmt: &S) -> DbResult<Statement<C>> {
        self.enqueue(stmt, self.inner.config.buffered)
    }

    /// Like [`Session::prepare`], but the result streams from the engine
    /// and holds the connection until it is consumed or released.
    pub fn prepare_unbuffered<S: Assemble + ?Sized>(&self, stmt: &S) -> DbResult<Statement<C>> {
        self.enqueue(stmt, false)
    }

    fn enqueue<S: Assemble + ?Sized>(&self, stmt: &S, buffered: bool) -> DbResult<Statement<C>> {
        let sql: Arc<str> = stmt.assemble()?.into();
        if self.inner.is_closed() {
            return Err(DbError::resource("the connection has been closed"));
        }
        let kind = stmt.kind();
        let (id, slot) = self.inner.enqueue(Arc::clone(&sql), kind);
        tracing::trace!(target: "mdo.sql", id, kind = kind.as_str(), "statement queued");
        Ok(Statement::new(
            Arc::clone(&self.inner),
            id,
            sql,
            kind,
            stmt.origin(),
            buffered,
            slot,
        ))
    }

    /// Prepare and run a statement now, typically a mutation.
    pub async fn execute<S: Assemble + ?Sized>(&self, stmt: &S) -> DbResult<ExecSummary> {
        let mut statement = self.prepare(stmt)?;
        statement.execute().await?;
        Ok(ExecSummary {
            affected_rows: statement.affected_rows().await?,
            last_insert_id: statement.last_insert_id().await?,
        })
    }

    /// Insert one row given as `(column, value)` pairs.
    pub async fn insert_row<I, K, V>(&self, table: &str, pairs: I) -> DbResult<ExecSummary>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let insert = self.insert(table).row(pairs);
        self.execute(&insert).await
    }

    /// Update rows matching every condition in `conds`. An empty condition
    /// list is refused before anything reaches the engine.
    pub async fn update_rows<I, K, V, W>(&self, table: &str, pairs: I, conds: W) -> DbResult<u64>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
        W: IntoIterator<Item = Cond>,
    {
        let update = conds
            .into_iter()
            .fold(self.update(table).set_pairs(pairs), |update, cond| update.and_where(cond));
        Ok(self.execute(&update).await?.affected_rows)
    }

    /// Delete rows matching every condition in `conds`. An empty condition
    /// list is refused before anything reaches the engine.
    pub async fn delete_rows<W>(&self, table: &str, conds: W) -> DbResult<u64>
    where
        W: IntoIterator<Item = Cond>,
    {
        let delete = conds
            .into_iter()
            .fold(self.delete(table), |delete, cond| delete.and_where(cond));
        Ok(self.execute(&delete).await?.affected_rows)
    }

    // ==================== Convenience reads ====================

    /// First row of `select`, fetched with `LIMIT 1`.
    pub async fn fetch_row(&self, select: &Select) -> DbResult<Option<Row>> {
        let mut statement = self.prepare(&select.clone().limit(1))?;
        statement.first().await
    }

    /// First row of `select` hydrated as a [`Record`], attached to the
    /// select's bound table.
    pub async fn fetch_record(&self, select: &Select) -> DbResult<Option<Record>> {
        let mut statement = self.prepare(&select.clone().limit(1))?;
        let records: Vec<Record> = statement.fetch_entities().await?;
        Ok(records.into_iter().next())
    }

    /// First column of the first row.
    pub async fn fetch_one(&self, select: &Select) -> DbResult<Option<Value>> {
        Ok(self
            .fetch_row(select)
            .await?
            .and_then(|row| row.into_values().into_iter().next()))
    }

    // ==================== Queue ====================

    /// Run every pending statement now.
    pub async fn flush(&self) -> DbResult<()> {
        self.inner.run_until(None, true).await
    }

    /// Number of statements prepared but not yet executed.
    pub fn pending(&self) -> usize {
        self.inner.pending()
    }

    /// Close the connection. Statements still queued fail with
    /// [`DbError::ResourceState`], as does any later access to a cursor
    /// obtained from this session. Closing twice is a no-op.
    pub async fn close(&self) -> DbResult<()> {
        let _engine = self.inner.engine.lock().await;
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let abandoned = self.inner.abandon_pending();
        tracing::debug!(target: "mdo.sql", abandoned, "closing connection");
        self.inner
            .conn
            .close()
            .await
            .map_err(|source| DbError::engine("<close>", source))
    }

    // ==================== Engine state ====================

    /// Next value of the named sequence, after pending statements ran.
    pub async fn next_sequence_id(&self, name: &str) -> DbResult<Option<u64>> {
        self.flush().await?;
        let _engine = self.inner.engine.lock().await;
        self.inner.ensure_available()?;
        self.inner
            .conn
            .next_sequence_id(name)
            .await
            .map_err(|source| DbError::engine(format!("<sequence {name}>"), source))
    }

    /// Id generated by the most recent insert, after pending statements ran.
    pub async fn last_insert_id(&self) -> DbResult<Option<u64>> {
        self.flush().await?;
        if self.inner.is_closed() {
            return Err(DbError::resource("the connection has been closed"));
        }
        Ok(self.inner.conn.last_insert_id())
    }
}

impl<C: Connection> fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.inner.config)
            .field("pending", &self.inner.pending())
            .field("closed", &self.inner.is_closed())
            .finish()
    }
}
