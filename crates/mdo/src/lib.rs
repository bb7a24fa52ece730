//! # mdo
//!
//! MySQL-flavoured statement building with deferred, queued execution.
//!
//! ## Features
//!
//! - **Composable builders**: `Select` with joins, unions, grouping, index
//!   hints and replaceable parts; `Insert`, `Update`, `Delete`
//! - **Safe defaults**: UPDATE and DELETE refuse to assemble without WHERE
//! - **Deferred execution**: statements run in submission order, only when
//!   their result is first needed
//! - **Pluggable materialization**: rows, columns, key/value maps or
//!   hydrated entities, eagerly or as single-pass streams
//! - **Engine-agnostic**: anything implementing [`Connection`] can execute
//!
//! ## Example
//!
//! ```ignore
//! use mdo::{Cond, Session};
//!
//! let session = Session::new(conn);
//!
//! let select = session
//!     .select()
//!     .from_cols("users", ["id", "name"])
//!     .join_left("orders", "users.id = orders.user_id", ["total"])
//!     .and_where(("users.status = ?", "active"))
//!     .order_by("users.id")
//!     .limit(10);
//!
//! let mut stmt = session.prepare(&select)?;
//! let names = stmt.fetch_field("name").await?;
//!
//! session
//!     .update_rows("users", [("status", "inactive")], [Cond::bind("id = ?", 7)])
//!     .await?;
//! ```

pub mod builder;
pub mod connection;
pub mod cursor;
pub mod error;
pub mod fetch;
pub mod quote;
pub mod record;
pub mod row;
pub mod session;
pub mod table;
pub mod value;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use builder::{
    Assemble, Cond, Delete, Direction, Insert, InsertModifier, JoinType, NO_COLUMNS, Select,
    StatementKind, UnionType, Update,
};
pub use connection::{Connection, RawCursor, RawResult};
pub use cursor::ResultCursor;
pub use error::{BoxError, DbError, DbResult, EngineResult};
pub use fetch::{KeyedMap, RowMapper};
pub use quote::{MySqlDialect, Quote};
pub use record::{Hydrate, Record, RecordSnapshot, RowOrigin};
pub use row::Row;
pub use session::{ExecInfo, ExecSummary, Session, SessionConfig, Statement, StatementState};
pub use table::{SequencePolicy, Table, TableInfo};
pub use value::{Expr, FromValue, Value};
