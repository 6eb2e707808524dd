//! Per-task log tables and recipient event capture.

use std::fmt;

use tracing::debug;

use crate::error::{DatabaseError, Result};
use crate::identifier::{quote, validate_table};
use crate::models::log_table_columns;
use crate::Database;

/// Which event arrays an event is appended to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Access,
    Click,
    File,
}

impl EventKind {
    fn prefix(&self) -> &'static str {
        match self {
            EventKind::Access => "access",
            EventKind::Click => "click",
            EventKind::File => "file",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// One recipient event: when, from where, with what.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub time: i64,
    pub src: String,
    pub dev: String,
}

/// Log table name for a task UUID (dashes removed).
pub fn log_table_name(sendtask_uuid: &str) -> Result<String> {
    let name: String = sendtask_uuid.chars().filter(|c| *c != '-').collect();
    validate_table(&name)?;
    Ok(name)
}

fn append_statement(table: &str, kind: EventKind) -> Result<String> {
    validate_table(table)?;
    let prefix = kind.prefix();
    Ok(format!(
        "UPDATE {table} SET \
         \"{p}_time\" = array_append(\"{p}_time\", $1::BIGINT), \
         \"{p}_src\" = array_append(\"{p}_src\", $2::TEXT), \
         \"{p}_dev\" = array_append(\"{p}_dev\", $3::TEXT) \
         WHERE \"uuid\" = $4 RETURNING \"uuid\"",
        table = quote(table),
        p = prefix
    ))
}

impl Database {
    /// Create the log table for a task if missing; returns its name.
    pub async fn ensure_log_table(&self, sendtask_uuid: &str) -> Result<String> {
        let table = log_table_name(sendtask_uuid)?;
        if self.cached_columns(&table).await.is_none() || !self.table_exists(&table).await? {
            self.create_table(&table, &log_table_columns()).await?;
        }
        Ok(table)
    }

    /// Append one event to a recipient's arrays in a single statement, so
    /// concurrent appends never lose entries.
    pub async fn append_event(&self, table: &str, recipient: &str, kind: EventKind, event: &Event) -> Result<()> {
        let stmt = append_statement(table, kind)?;
        let pool = self.pool().await?;

        let updated: Option<String> = sqlx::query_scalar(&stmt)
            .bind(event.time)
            .bind(&event.src)
            .bind(&event.dev)
            .bind(recipient)
            .fetch_optional(&pool)
            .await?;

        match updated {
            Some(_) => {
                debug!(table = %table, kind = %kind, "Event recorded");
                Ok(())
            }
            None => Err(DatabaseError::NoMatchingRecord {
                table: table.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_table_name() {
        assert_eq!(
            log_table_name("3f2a9c0d-6b1e-4e8f-9a7b-5c3d2e1f0a9b").unwrap(),
            "3f2a9c0d6b1e4e8f9a7b5c3d2e1f0a9b"
        );
        assert!(log_table_name("abc;drop").is_err());
        assert!(log_table_name("").is_err());
    }

    #[test]
    fn test_append_statement() {
        let sql = append_statement("abc", EventKind::Click).unwrap();
        assert!(sql.starts_with("UPDATE \"abc\" SET \"click_time\" = array_append(\"click_time\", $1::BIGINT)"));
        assert!(sql.contains("\"click_dev\" = array_append(\"click_dev\", $3::TEXT)"));
        assert!(sql.ends_with("WHERE \"uuid\" = $4 RETURNING \"uuid\""));
        assert!(append_statement("a b", EventKind::Access).is_err());
    }
}
