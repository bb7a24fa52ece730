//! Error types for mdo

use thiserror::Error;

/// Result type alias for mdo operations
pub type DbResult<T> = Result<T, DbError>;

/// Boxed native error returned by engine implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for engine (`Connection` / `RawCursor`) implementations.
pub type EngineResult<T> = Result<T, BoxError>;

/// Error types for statement building, execution and materialization
#[derive(Debug, Error)]
pub enum DbError {
    /// Builder contract violation (WHERE/JOIN mixed with UNION, duplicate
    /// correlation name, invalid part accessor, ...)
    #[error("Malformed clause: {0}")]
    MalformedClause(String),

    /// UPDATE or DELETE assembled without a WHERE predicate
    #[error("Refusing to assemble {statement} on `{table}` without a WHERE predicate")]
    EmptyPredicateGuard {
        statement: &'static str,
        table: String,
    },

    /// Access to a released cursor, a failed statement or a closed connection
    #[error("Resource state error: {0}")]
    ResourceState(String),

    /// The engine rejected the statement
    #[error("Engine error: {source} (while executing: {sql})")]
    Engine {
        sql: String,
        #[source]
        source: BoxError,
    },

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Write attempted on a read-only record
    #[error("Read-only: {0}")]
    ReadOnly(String),

    /// Snapshot serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DbError {
    /// Create a malformed clause error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedClause(message.into())
    }

    /// Create a resource state error
    pub fn resource(message: impl Into<String>) -> Self {
        Self::ResourceState(message.into())
    }

    /// Wrap a native engine error together with the SQL that failed
    pub fn engine(sql: impl Into<String>, source: BoxError) -> Self {
        Self::Engine {
            sql: sql.into(),
            source,
        }
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Check if this is a builder contract violation (raised before any engine access)
    pub fn is_builder_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedClause(_) | Self::EmptyPredicateGuard { .. }
        )
    }

    /// Check if this is a resource state error
    pub fn is_resource_state(&self) -> bool {
        matches!(self, Self::ResourceState(_))
    }

    /// Check if this is an engine error
    pub fn is_engine(&self) -> bool {
        matches!(self, Self::Engine { .. })
    }

    /// The rendered SQL attached to an engine error
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::Engine { sql, .. } => Some(sql),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
