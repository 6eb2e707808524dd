//! SQL statement construction for the generic table operations.
//!
//! Builders here are pure: they validate identifiers, lay out placeholders and
//! collect the values to bind, but never touch a connection. Each value is
//! bound as a `jsonb` object `{"<column>": <value>}` and converted to the
//! column's declared type by `jsonb_populate_record`, so one statement shape
//! works for text, integer, boolean and array columns alike.

use serde_json::Value;

use crate::error::{DatabaseError, Result};
use crate::identifier::{quote, validate_column, validate_columns, validate_table};

/// A row as a JSON object keyed by column name.
pub type Record = serde_json::Map<String, Value>;

/// Tables that carry an `is_active` soft-delete flag.
pub const ACTIVE_FLAG_TABLES: &[&str] = &["sendtasks", "accts", "users", "customers"];

/// Whether reads from `table` get an implicit `is_active = TRUE` predicate.
pub fn has_active_flag(table: &str) -> bool {
    ACTIVE_FLAG_TABLES.contains(&table)
}

/// A statement and its `jsonb` parameters, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    fn new() -> Self {
        Self {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Push a value for `column` and return the typed expression reading it.
    fn bind(&mut self, table: &str, column: &str, value: Value) -> String {
        let mut wrapped = Record::new();
        wrapped.insert(column.to_string(), value);
        self.params.push(Value::Object(wrapped));
        format!(
            "(jsonb_populate_record(NULL::{}, ${})).{}",
            quote(table),
            self.params.len(),
            quote(column)
        )
    }
}

/// Column definition for dynamic table creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: String,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
        }
    }
}

/// Sort direction for paginated selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }
}

pub fn create_table(table: &str, columns: &[ColumnDef]) -> Result<String> {
    validate_table(table)?;
    if columns.is_empty() {
        return Err(DatabaseError::InvalidRecord(format!(
            "no column definitions for {}",
            table
        )));
    }

    let mut defs = Vec::with_capacity(columns.len());
    for column in columns {
        validate_column(&column.name)?;
        if column.sql_type.contains(';') || column.sql_type.contains("--") {
            return Err(DatabaseError::InvalidRecord(format!(
                "invalid type for column {}: {}",
                column.name, column.sql_type
            )));
        }
        defs.push(format!("{} {}", quote(&column.name), column.sql_type));
    }

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote(table),
        defs.join(", ")
    ))
}

pub fn drop_table(table: &str) -> Result<String> {
    validate_table(table)?;
    Ok(format!("DROP TABLE IF EXISTS {}", quote(table)))
}

pub fn clear_table(table: &str) -> Result<String> {
    validate_table(table)?;
    Ok(format!("DELETE FROM {}", quote(table)))
}

pub fn is_table_empty(table: &str) -> Result<String> {
    validate_table(table)?;
    Ok(format!("SELECT NOT EXISTS (SELECT 1 FROM {})", quote(table)))
}

/// `SELECT` returning one `jsonb` object per row.
///
/// With a filter, rows are restricted to `column IN (values...)`; an empty
/// value list matches nothing.
pub fn select(
    table: &str,
    columns: Option<&[String]>,
    filter: Option<(&str, &[Value])>,
    active_only: bool,
) -> Result<Statement> {
    validate_table(table)?;
    let mut stmt = Statement::new();

    let projection = match columns {
        Some(cols) if !cols.is_empty() => {
            validate_columns(cols.iter().map(String::as_str))?;
            cols.iter()
                .map(|c| format!("t.{}", quote(c)))
                .collect::<Vec<_>>()
                .join(", ")
        }
        _ => "t.*".to_string(),
    };

    let mut predicates = Vec::new();
    if let Some((column, values)) = filter {
        validate_column(column)?;
        if values.is_empty() {
            predicates.push("FALSE".to_string());
        } else {
            let exprs: Vec<String> = values
                .iter()
                .map(|v| stmt.bind(table, column, v.clone()))
                .collect();
            predicates.push(format!("t.{} IN ({})", quote(column), exprs.join(", ")));
        }
    }
    if active_only {
        predicates.push("t.\"is_active\" = TRUE".to_string());
    }

    stmt.sql = format!(
        "SELECT to_jsonb(s) FROM (SELECT {} FROM {} AS t{}) AS s",
        projection,
        quote(table),
        where_clause(&predicates)
    );
    Ok(stmt)
}

/// Count and page statements for a paginated select.
///
/// `clauses` are caller-built predicate fragments referencing the table as
/// `t` and its own `$n` placeholders; they are ANDed together.
pub fn select_page(
    table: &str,
    clauses: &[String],
    order_by: Option<&OrderBy>,
    window: Option<(u32, u32)>,
) -> Result<(String, String)> {
    validate_table(table)?;
    let filter = where_clause(clauses);

    let count = format!("SELECT COUNT(*) FROM {} AS t{}", quote(table), filter);

    let mut rows = format!(
        "SELECT to_jsonb(t) FROM {} AS t{}",
        quote(table),
        filter
    );
    if let Some(order) = order_by {
        validate_column(&order.column)?;
        rows.push_str(&format!(
            " ORDER BY t.{} {}",
            quote(&order.column),
            if order.descending { "DESC" } else { "ASC" }
        ));
    }
    if let Some((page, rows_per_page)) = window {
        let offset = u64::from(page) * u64::from(rows_per_page);
        rows.push_str(&format!(" LIMIT {} OFFSET {}", rows_per_page, offset));
    }

    Ok((count, rows))
}

/// Column list shared by a batch of records, sorted. Every record must carry
/// the same keys so no column silently falls back to `NULL`.
pub fn record_columns(records: &[Record]) -> Result<Vec<String>> {
    let first = records
        .first()
        .ok_or_else(|| DatabaseError::InvalidRecord("empty record list".to_string()))?;
    if first.is_empty() {
        return Err(DatabaseError::InvalidRecord("record has no columns".to_string()));
    }
    if let Some((index, _)) = records
        .iter()
        .enumerate()
        .find(|(_, r)| r.len() != first.len() || !r.keys().all(|k| first.contains_key(k)))
    {
        return Err(DatabaseError::InvalidRecord(format!(
            "record {} has a different column set than record 0",
            index
        )));
    }
    let mut columns: Vec<String> = first.keys().cloned().collect();
    columns.sort();
    validate_columns(columns.iter().map(String::as_str))?;
    Ok(columns)
}

/// Multi-row `INSERT ... RETURNING` over `columns`.
pub fn insert(table: &str, columns: &[String], records: &[Record]) -> Result<Statement> {
    validate_table(table)?;
    validate_columns(columns.iter().map(String::as_str))?;
    let mut stmt = Statement::new();

    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        let exprs: Vec<String> = columns
            .iter()
            .map(|c| {
                let value = record.get(c).cloned().unwrap_or(Value::Null);
                stmt.bind(table, c, value)
            })
            .collect();
        rows.push(format!("({})", exprs.join(", ")));
    }

    stmt.sql = format!(
        "INSERT INTO {} AS t ({}) VALUES {} RETURNING to_jsonb(t)",
        quote(table),
        quoted_list(columns),
        rows.join(", ")
    );
    Ok(stmt)
}

pub fn update(table: &str, values: &Record, condition: &Record) -> Result<Statement> {
    validate_table(table)?;
    if values.is_empty() {
        return Err(DatabaseError::InvalidRecord("update without values".to_string()));
    }
    if condition.is_empty() {
        return Err(DatabaseError::InvalidRecord("update without condition".to_string()));
    }
    validate_columns(values.keys().map(String::as_str))?;
    validate_columns(condition.keys().map(String::as_str))?;

    let mut stmt = Statement::new();
    let sets: Vec<String> = values
        .iter()
        .map(|(c, v)| format!("{} = {}", quote(c), stmt.bind(table, c, v.clone())))
        .collect();
    let predicates = equality(&mut stmt, table, condition);

    stmt.sql = format!(
        "UPDATE {} AS t SET {}{} RETURNING to_jsonb(t)",
        quote(table),
        sets.join(", "),
        where_clause(&predicates)
    );
    Ok(stmt)
}

pub fn delete(table: &str, condition: &Record) -> Result<Statement> {
    validate_table(table)?;
    if condition.is_empty() {
        return Err(DatabaseError::InvalidRecord("delete without condition".to_string()));
    }
    validate_columns(condition.keys().map(String::as_str))?;

    let mut stmt = Statement::new();
    let predicates = equality(&mut stmt, table, condition);
    stmt.sql = format!(
        "DELETE FROM {} AS t{} RETURNING to_jsonb(t)",
        quote(table),
        where_clause(&predicates)
    );
    Ok(stmt)
}

/// `INSERT ... ON CONFLICT DO UPDATE` that only rewrites the row when a
/// non-key column actually differs. The statement returns a row exactly when
/// something was inserted or changed.
pub fn upsert(table: &str, record: &Record, conflict_keys: &[&str]) -> Result<Statement> {
    validate_table(table)?;
    if record.is_empty() {
        return Err(DatabaseError::InvalidRecord("record has no columns".to_string()));
    }
    if conflict_keys.is_empty() {
        return Err(DatabaseError::InvalidRecord("upsert without conflict keys".to_string()));
    }
    validate_columns(record.keys().map(String::as_str))?;
    validate_columns(conflict_keys.iter().copied())?;
    if let Some(missing) = conflict_keys.iter().find(|k| !record.contains_key(**k)) {
        return Err(DatabaseError::InvalidRecord(format!(
            "conflict key {} missing from record",
            missing
        )));
    }

    let mut stmt = Statement::new();
    let mut columns: Vec<String> = record.keys().cloned().collect();
    columns.sort();
    let exprs: Vec<String> = columns
        .iter()
        .map(|c| stmt.bind(table, c, record[c].clone()))
        .collect();
    let keys: Vec<String> = conflict_keys.iter().map(|k| k.to_string()).collect();
    let updatable: Vec<&String> = columns.iter().filter(|c| !keys.contains(c)).collect();

    let action = if updatable.is_empty() {
        "DO NOTHING".to_string()
    } else {
        let sets: Vec<String> = updatable
            .iter()
            .map(|c| format!("{0} = EXCLUDED.{0}", quote(c)))
            .collect();
        let changed: Vec<String> = updatable
            .iter()
            .map(|c| format!("t.{0} IS DISTINCT FROM EXCLUDED.{0}", quote(c)))
            .collect();
        format!(
            "DO UPDATE SET {} WHERE {}",
            sets.join(", "),
            changed.join(" OR ")
        )
    };

    stmt.sql = format!(
        "INSERT INTO {} AS t ({}) VALUES ({}) ON CONFLICT ({}) {} RETURNING TRUE",
        quote(table),
        quoted_list(&columns),
        exprs.join(", "),
        quoted_list(&keys),
        action
    );
    Ok(stmt)
}

/// Rows per `INSERT` so that `rows * columns` stays within `max_params`.
pub fn rows_per_batch(max_params: usize, column_count: usize) -> usize {
    (max_params / column_count.max(1)).max(1)
}

/// Split `len` rows into consecutive batch ranges.
pub fn plan_batches(len: usize, column_count: usize, max_params: usize) -> Vec<std::ops::Range<usize>> {
    let size = rows_per_batch(max_params, column_count);
    (0..len)
        .step_by(size)
        .map(|start| start..(start + size).min(len))
        .collect()
}

fn equality(stmt: &mut Statement, table: &str, condition: &Record) -> Vec<String> {
    condition
        .iter()
        .map(|(c, v)| format!("t.{} = {}", quote(c), stmt.bind(table, c, v.clone())))
        .collect()
}

fn where_clause(predicates: &[String]) -> String {
    if predicates.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", predicates.join(" AND "))
    }
}

fn quoted_list(columns: &[String]) -> String {
    columns.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_select_all_active_only() {
        let stmt = select("sendtasks", None, None, true).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT to_jsonb(s) FROM (SELECT t.* FROM \"sendtasks\" AS t WHERE t.\"is_active\" = TRUE) AS s"
        );
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn test_select_columns_with_in_filter() {
        let columns = vec!["sendtask_uuid".to_string(), "sendtask_id".to_string()];
        let values = [json!("a"), json!("b")];
        let stmt = select(
            "sendtasks",
            Some(&columns),
            Some(("sendtask_uuid", &values)),
            false,
        )
        .unwrap();

        assert!(stmt.sql.starts_with(
            "SELECT to_jsonb(s) FROM (SELECT t.\"sendtask_uuid\", t.\"sendtask_id\" FROM \"sendtasks\" AS t WHERE t.\"sendtask_uuid\" IN ("
        ));
        assert!(stmt.sql.contains("(jsonb_populate_record(NULL::\"sendtasks\", $1)).\"sendtask_uuid\""));
        assert!(stmt.sql.contains("$2"));
        assert!(!stmt.sql.contains("is_active"));
        assert_eq!(
            stmt.params,
            vec![json!({"sendtask_uuid": "a"}), json!({"sendtask_uuid": "b"})]
        );
    }

    #[test]
    fn test_select_empty_filter_matches_nothing() {
        let stmt = select("accts", None, Some(("acct_id", &[])), true).unwrap();
        assert!(stmt.sql.contains("WHERE FALSE AND t.\"is_active\" = TRUE"));
    }

    #[test]
    fn test_select_rejects_bad_identifiers() {
        assert!(select("bad-table", None, None, false).is_err());
        let columns = vec!["ok".to_string(), "not ok".to_string()];
        assert!(select("t1", Some(&columns), None, false).is_err());
    }

    #[test]
    fn test_insert_layout() {
        let rows = vec![
            record(json!({"uuid": "r1", "plan_time": 10})),
            record(json!({"plan_time": 20, "uuid": "r2"})),
        ];
        let columns = record_columns(&rows).unwrap();
        let stmt = insert("abc123", &columns, &rows).unwrap();

        assert!(stmt.sql.starts_with("INSERT INTO \"abc123\" AS t (\"plan_time\", \"uuid\") VALUES ("));
        assert!(stmt.sql.ends_with("RETURNING to_jsonb(t)"));
        assert_eq!(stmt.params.len(), 4);
        assert_eq!(stmt.params[2], json!({"plan_time": 20}));
        assert_eq!(stmt.params[3], json!({"uuid": "r2"}));
    }

    #[test]
    fn test_record_columns_reject_mixed_key_sets() {
        // A later record missing a key
        let missing = vec![
            record(json!({"uuid": "r1", "plan_time": 10})),
            record(json!({"uuid": "r2"})),
        ];
        assert!(matches!(record_columns(&missing), Err(DatabaseError::InvalidRecord(_))));

        // A later record with an extra key
        let extra = vec![
            record(json!({"uuid": "r1"})),
            record(json!({"uuid": "r2", "plan_time": 20})),
        ];
        assert!(matches!(record_columns(&extra), Err(DatabaseError::InvalidRecord(_))));

        // Same size, different keys
        let swapped = vec![
            record(json!({"uuid": "r1", "plan_time": 10})),
            record(json!({"uuid": "r2", "send_time": 20})),
        ];
        assert!(matches!(record_columns(&swapped), Err(DatabaseError::InvalidRecord(_))));
    }

    #[test]
    fn test_update_and_delete() {
        let stmt = update(
            "sendtasks",
            &record(json!({"is_active": false})),
            &record(json!({"sendtask_uuid": "u1"})),
        )
        .unwrap();
        assert!(stmt.sql.starts_with("UPDATE \"sendtasks\" AS t SET \"is_active\" = "));
        assert!(stmt.sql.contains("WHERE t.\"sendtask_uuid\" = (jsonb_populate_record(NULL::\"sendtasks\", $2))"));
        assert_eq!(stmt.params.len(), 2);

        let stmt = delete("sendlog_stats", &record(json!({"sendtask_uuid": "u1"}))).unwrap();
        assert!(stmt.sql.starts_with("DELETE FROM \"sendlog_stats\" AS t WHERE t.\"sendtask_uuid\" = "));

        assert!(delete("sendlog_stats", &Record::new()).is_err());
        assert!(update("sendtasks", &Record::new(), &record(json!({"id": 1}))).is_err());
    }

    #[test]
    fn test_upsert_change_detection_clause() {
        let stmt = upsert(
            "sendlog_stats",
            &record(json!({"sendtask_uuid": "u1", "total_sent": 3, "total_planned": 5})),
            &["sendtask_uuid"],
        )
        .unwrap();

        assert!(stmt.sql.contains("ON CONFLICT (\"sendtask_uuid\") DO UPDATE SET"));
        assert!(stmt.sql.contains("\"total_sent\" = EXCLUDED.\"total_sent\""));
        assert!(stmt.sql.contains(
            "WHERE t.\"total_planned\" IS DISTINCT FROM EXCLUDED.\"total_planned\" OR t.\"total_sent\" IS DISTINCT FROM EXCLUDED.\"total_sent\""
        ));
        assert!(!stmt.sql.contains("t.\"sendtask_uuid\" IS DISTINCT FROM"));
        assert!(stmt.sql.ends_with("RETURNING TRUE"));
    }

    #[test]
    fn test_upsert_key_only_record_does_nothing_on_conflict() {
        let stmt = upsert("t1", &record(json!({"uuid": "x"})), &["uuid"]).unwrap();
        assert!(stmt.sql.contains("ON CONFLICT (\"uuid\") DO NOTHING RETURNING TRUE"));
    }

    #[test]
    fn test_upsert_requires_key_in_record() {
        let err = upsert("t1", &record(json!({"a": 1})), &["uuid"]).unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidRecord(_)));
    }

    #[test]
    fn test_create_table() {
        let sql = create_table(
            "abc",
            &[
                ColumnDef::new("id", "SERIAL PRIMARY KEY"),
                ColumnDef::new("click_time", "BIGINT[]"),
            ],
        )
        .unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"abc\" (\"id\" SERIAL PRIMARY KEY, \"click_time\" BIGINT[])"
        );

        assert!(create_table("abc", &[]).is_err());
        assert!(create_table("a-b", &[ColumnDef::new("id", "INT")]).is_err());
        assert!(create_table("abc", &[ColumnDef::new("1id", "INT")]).is_err());
        assert!(create_table("abc", &[ColumnDef::new("id", "INT); DROP TABLE x;")]).is_err());
    }

    #[test]
    fn test_select_page() {
        let clauses = vec!["t.\"target_email\" ILIKE $1".to_string()];
        let (count, rows) =
            select_page("abc", &clauses, Some(&OrderBy::desc("plan_time")), Some((2, 25))).unwrap();
        assert_eq!(
            count,
            "SELECT COUNT(*) FROM \"abc\" AS t WHERE t.\"target_email\" ILIKE $1"
        );
        assert_eq!(
            rows,
            "SELECT to_jsonb(t) FROM \"abc\" AS t WHERE t.\"target_email\" ILIKE $1 ORDER BY t.\"plan_time\" DESC LIMIT 25 OFFSET 50"
        );

        let (_, rows) = select_page("abc", &[], None, None).unwrap();
        assert_eq!(rows, "SELECT to_jsonb(t) FROM \"abc\" AS t");
    }

    #[test]
    fn test_batch_planning() {
        assert_eq!(rows_per_batch(30000, 16), 1875);
        assert_eq!(rows_per_batch(10, 3), 3);
        // Never below one row per batch
        assert_eq!(rows_per_batch(5, 10), 1);
        assert_eq!(rows_per_batch(10, 0), 10);

        // N = 7, C = 10, K = 3 -> ceil(7 / 3) = 3 batches
        let batches = plan_batches(7, 3, 10);
        assert_eq!(batches, vec![0..3, 3..6, 6..7]);

        assert!(plan_batches(0, 3, 10).is_empty());
        assert_eq!(plan_batches(4, 2, 8), vec![0..4]);
    }
}
