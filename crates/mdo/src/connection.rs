//! Engine capability consumed by [`Session`](crate::session::Session).
//!
//! A connection is one single-flight channel to the server: the session
//! never calls [`Connection::execute`] while another statement or a
//! streamed cursor is still active on it.

use crate::error::EngineResult;
use crate::quote::Quote;
use crate::value::Value;
use std::future::Future;

/// Outcome of executing one statement.
#[derive(Debug)]
pub enum RawResult<Cur> {
    /// A result set (SELECT, SHOW, ...).
    Rows(Cur),
    /// Affected-row count of a mutation.
    Affected(u64),
}

/// Forward-only row source handed back by the engine.
pub trait RawCursor: Send + 'static {
    /// Column names, in select-list order.
    fn columns(&self) -> &[String];

    /// Fetch the next row; `None` once the result set is exhausted.
    fn fetch(&mut self) -> impl Future<Output = EngineResult<Option<Vec<Value>>>> + Send;

    /// Free server-side resources. Called exactly once per cursor.
    fn release(&mut self) {}
}

/// A database connection as seen by the statement executor.
///
/// Quoting is part of the capability so builders can be handed the
/// connection itself; the [`Quote`] defaults implement MySQL rules.
pub trait Connection: Quote + Send + Sync + 'static {
    type Cursor: RawCursor;

    /// Send one statement.
    fn execute(
        &self,
        sql: &str,
    ) -> impl Future<Output = EngineResult<RawResult<Self::Cursor>>> + Send;

    /// Next value of a named sequence; `None` when the engine has no
    /// sequences.
    fn next_sequence_id(
        &self,
        name: &str,
    ) -> impl Future<Output = EngineResult<Option<u64>>> + Send {
        let _ = name;
        async { Ok(None) }
    }

    /// Id generated by the most recent insert on this connection.
    fn last_insert_id(&self) -> Option<u64>;

    /// Rows affected by the most recent mutation on this connection.
    fn affected_rows(&self) -> u64;

    /// Close the underlying channel.
    fn close(&self) -> impl Future<Output = EngineResult<()>> + Send {
        async { Ok(()) }
    }
}
