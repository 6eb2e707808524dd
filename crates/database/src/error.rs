//! Database error types.

use thiserror::Error;

use crate::identifier::IdentifierKind;

/// Errors that can occur during database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// SQLx error (query, constraint, missing table, etc.)
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// The pool failed its liveness probe and could not be re-created.
    #[error("database connection lost: {0}")]
    ConnectionLost(String),

    /// A table or column name failed validation.
    #[error("invalid {kind} name: {name:?}")]
    InvalidIdentifier { kind: IdentifierKind, name: String },

    /// An update or delete predicate matched zero rows.
    #[error("no matching record in {table}")]
    NoMatchingRecord { table: String },

    /// A record could not be used for the requested operation.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// A bound parameter could not be encoded.
    #[error("failed to encode parameter: {0}")]
    Encode(String),

    /// Record not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Record already exists
    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: String },
}

impl DatabaseError {
    /// Map a unique violation to `AlreadyExists`, everything else to `Sqlx`.
    pub(crate) fn from_insert(err: sqlx::Error, entity: &'static str, id: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                return DatabaseError::AlreadyExists {
                    entity,
                    id: id.to_string(),
                };
            }
        }
        DatabaseError::Sqlx(err)
    }
}

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;
