//! Statement builders for the MySQL dialect.
//!
//! Builders are plain values: they never touch a connection. Every one of
//! them is constructed with a [`Quote`](crate::quote::Quote) capability
//! (usually the session's connection) and renders through [`Assemble`].
//! Contract violations are collected while building and reported by
//! `assemble()`, before any SQL could reach the engine.
//!
//! # Usage
//!
//! ```ignore
//! use mdo::builder::{self, Assemble, NO_COLUMNS};
//!
//! let sql = builder::select()
//!     .from_cols("orders", ["id", "total"])
//!     .join_left("items", "orders.id = items.order_id", NO_COLUMNS)
//!     .and_where(("orders.status = ?", "paid"))
//!     .order_by("orders.created_at DESC")
//!     .limit(20)
//!     .assemble()?;
//!
//! let sql = builder::update("users")
//!     .set("status", "inactive")
//!     .and_where(("id = ?", 7))
//!     .assemble()?;
//! ```

mod delete;
mod insert;
mod parts;
mod predicate;
mod select;
mod update;

pub use delete::Delete;
pub use insert::{Insert, InsertModifier};
pub use parts::{
    ClausePart, Column, ColumnEntry, ColumnExpr, Direction, FromEntry, JoinType, NO_COLUMNS,
    OrderExpr, OrderTerm, PartRef, TableRef, TableSource, UnionMember, UnionType,
};
pub use predicate::{Cond, Connective, Predicate};
pub use select::{MAX_LIMIT_COUNT, Select};
pub use update::Update;

use crate::error::DbResult;
use crate::record::RowOrigin;

/// Statement family, used for logging and to pick buffered vs. affected-row
/// handling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    /// Hand-written SQL.
    Raw,
}

impl StatementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::Select => "select",
            StatementKind::Insert => "insert",
            StatementKind::Update => "update",
            StatementKind::Delete => "delete",
            StatementKind::Raw => "raw",
        }
    }
}

/// Anything that renders to one SQL statement.
pub trait Assemble {
    /// Render the statement, or report the first contract violation.
    fn assemble(&self) -> DbResult<String>;

    fn kind(&self) -> StatementKind;

    /// Hydration context for rows produced by the statement.
    fn origin(&self) -> RowOrigin {
        RowOrigin::default()
    }
}

impl Assemble for str {
    fn assemble(&self) -> DbResult<String> {
        Ok(self.to_string())
    }

    fn kind(&self) -> StatementKind {
        StatementKind::Raw
    }
}

impl Assemble for String {
    fn assemble(&self) -> DbResult<String> {
        Ok(self.clone())
    }

    fn kind(&self) -> StatementKind {
        StatementKind::Raw
    }
}

/// Create an empty SELECT with the stock MySQL quoter.
///
/// # Example
/// ```ignore
/// let sql = mdo::builder::select().from("users").assemble()?;
/// ```
pub fn select() -> Select {
    Select::mysql()
}

/// Create an INSERT with the stock MySQL quoter.
pub fn insert(table: &str) -> Insert {
    Insert::mysql(table)
}

/// Create an UPDATE with the stock MySQL quoter.
pub fn update(table: &str) -> Update {
    Update::mysql(table)
}

/// Create a DELETE with the stock MySQL quoter.
pub fn delete(table: &str) -> Delete {
    Delete::mysql(table)
}

#[cfg(test)]
mod tests;
