//! Validation of table and column names used in dynamically built SQL.
//!
//! Values are always bound as parameters, but identifiers cannot be, so every
//! table and column name that reaches a statement goes through these checks
//! first and is then double-quoted.

use std::fmt;

use crate::error::{DatabaseError, Result};

/// Which kind of identifier failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Table,
    Column,
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierKind::Table => write!(f, "table"),
            IdentifierKind::Column => write!(f, "column"),
        }
    }
}

/// PostgreSQL truncates identifiers longer than this.
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Validate a table name: `^[A-Za-z0-9_]+$`.
///
/// Task UUIDs are used as log table names, so a leading digit is allowed.
pub fn validate_table(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_IDENTIFIER_LENGTH
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(invalid(IdentifierKind::Table, name))
    }
}

/// Validate a column name: `^[A-Za-z_][A-Za-z0-9_]*$`.
pub fn validate_column(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
                && name.len() <= MAX_IDENTIFIER_LENGTH
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(invalid(IdentifierKind::Column, name))
    }
}

/// Validate every column in a list.
pub fn validate_columns<'a, I>(columns: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    columns.into_iter().try_for_each(validate_column)
}

/// Double-quote an identifier that has already been validated.
pub(crate) fn quote(name: &str) -> String {
    format!("\"{}\"", name)
}

fn invalid(kind: IdentifierKind, name: &str) -> DatabaseError {
    DatabaseError::InvalidIdentifier {
        kind,
        name: name.to_string(),
    }
}
