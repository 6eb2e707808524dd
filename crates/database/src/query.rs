//! Generic CRUD operations over a single table.

use serde::Serialize;
use serde_json::Value;
use sqlx::postgres::PgArguments;
use sqlx::types::Json;
use sqlx::Arguments;
use tracing::debug;

use crate::error::{DatabaseError, Result};
use crate::sql::{self, has_active_flag, OrderBy, Record, Statement};
use crate::Database;

/// Options for [`Database::select`].
///
/// Tables with an `is_active` flag only return active rows unless
/// [`Select::include_inactive`] is set.
#[derive(Debug, Clone, Default)]
pub struct Select {
    columns: Option<Vec<String>>,
    filter: Option<(String, Vec<Value>)>,
    include_inactive: bool,
}

impl Select {
    /// All columns, no filter.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict the projection to these columns.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Keep rows whose `column` is one of `values`. An empty list matches
    /// nothing.
    pub fn filter_in<I, V>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.filter = Some((column.into(), values.into_iter().map(Into::into).collect()));
        self
    }

    /// Keep rows whose `column` equals `value`.
    pub fn filter_eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter_in(column, [value.into()])
    }

    /// Also return rows with `is_active = FALSE`.
    pub fn include_inactive(mut self) -> Self {
        self.include_inactive = true;
        self
    }
}

/// A natively typed parameter for caller-built predicates in
/// [`Database::select_page`].
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Int(i64),
    Bool(bool),
    TextArray(Vec<String>),
    Json(Value),
}

/// A paginated select: predicate fragments (ANDed, referencing the table as
/// `t`, placeholders numbered from `$1` in `params` order), optional ordering
/// and an optional zero-based page window.
#[derive(Debug, Clone, Default)]
pub struct PageQuery {
    pub clauses: Vec<String>,
    pub params: Vec<SqlParam>,
    pub order_by: Option<OrderBy>,
    pub window: Option<(u32, u32)>,
}

impl PageQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predicate. `$?` in the fragment is replaced with the next
    /// placeholder number.
    pub fn filter(mut self, clause: &str, param: SqlParam) -> Self {
        self.params.push(param);
        self.clauses
            .push(clause.replace("$?", &format!("${}", self.params.len())));
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by = Some(order);
        self
    }

    /// Zero-based page of `rows_per_page` rows.
    pub fn page(mut self, page: u32, rows_per_page: u32) -> Self {
        self.window = Some((page, rows_per_page));
        self
    }
}

/// One page of rows and the count of all rows matching the predicates.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Page {
    pub records: Vec<Record>,
    pub total_count: i64,
}

/// Outcome of [`Database::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertStatus {
    /// Inserted, or updated with at least one differing column.
    Changed,
    /// Existing row already held identical values.
    Unchanged,
}

impl UpsertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpsertStatus::Changed => "changed",
            UpsertStatus::Unchanged => "unchanged",
        }
    }

    pub fn is_changed(&self) -> bool {
        matches!(self, UpsertStatus::Changed)
    }
}

impl std::fmt::Display for UpsertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Database {
    /// Read rows as records.
    pub async fn select(&self, table: &str, options: &Select) -> Result<Vec<Record>> {
        let active_only = has_active_flag(table) && !options.include_inactive;
        let filter = options
            .filter
            .as_ref()
            .map(|(column, values)| (column.as_str(), values.as_slice()));
        let stmt = sql::select(table, options.columns.as_deref(), filter, active_only)?;

        let pool = self.pool().await?;
        let rows: Vec<Value> = sqlx::query_scalar_with(&stmt.sql, json_args(stmt.params)?)
            .fetch_all(&pool)
            .await?;
        rows.into_iter().map(into_record).collect()
    }

    /// Read one page of rows plus the total number of matching rows.
    ///
    /// No implicit `is_active` filter is applied.
    pub async fn select_page(&self, table: &str, query: &PageQuery) -> Result<Page> {
        let (count_sql, rows_sql) = sql::select_page(
            table,
            &query.clauses,
            query.order_by.as_ref(),
            query.window,
        )?;

        let pool = self.pool().await?;
        let rows: Vec<Value> = sqlx::query_scalar_with(&rows_sql, typed_args(&query.params)?)
            .fetch_all(&pool)
            .await?;
        let records: Vec<Record> = rows.into_iter().map(into_record).collect::<Result<_>>()?;

        let total_count = match query.window {
            Some(_) => {
                sqlx::query_scalar_with::<_, i64, _>(&count_sql, typed_args(&query.params)?)
                    .fetch_one(&pool)
                    .await?
            }
            None => records.len() as i64,
        };

        Ok(Page {
            records,
            total_count,
        })
    }

    /// Insert one record and return the stored row.
    pub async fn insert_one(&self, table: &str, record: Record) -> Result<Record> {
        let mut rows = self.insert_many(table, vec![record]).await?;
        rows.pop()
            .ok_or_else(|| DatabaseError::InvalidRecord("insert returned no row".to_string()))
    }

    /// Insert records in batches that respect the parameter ceiling.
    ///
    /// The first record's keys define the column list. Batches are not
    /// wrapped in a transaction: a failure leaves earlier batches committed.
    pub async fn insert_many(&self, table: &str, records: Vec<Record>) -> Result<Vec<Record>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let columns = sql::record_columns(&records)?;
        let batches = sql::plan_batches(records.len(), columns.len(), self.config().max_params);

        let pool = self.pool().await?;
        let mut inserted = Vec::with_capacity(records.len());
        for range in batches {
            let stmt = sql::insert(table, &columns, &records[range.clone()])?;
            debug!(
                table = %table,
                rows = range.len(),
                params = stmt.params.len(),
                "Inserting batch"
            );
            let rows: Vec<Value> = sqlx::query_scalar_with(&stmt.sql, json_args(stmt.params)?)
                .fetch_all(&pool)
                .await?;
            for row in rows {
                inserted.push(into_record(row)?);
            }
        }
        Ok(inserted)
    }

    /// Update rows matching every key of `condition`; returns the updated
    /// rows, or `NoMatchingRecord` when none matched.
    pub async fn update(&self, table: &str, values: &Record, condition: &Record) -> Result<Vec<Record>> {
        let stmt = sql::update(table, values, condition)?;
        self.modify(table, stmt).await
    }

    /// Delete rows matching every key of `condition`; returns the deleted
    /// rows, or `NoMatchingRecord` when none matched.
    pub async fn delete(&self, table: &str, condition: &Record) -> Result<Vec<Record>> {
        let stmt = sql::delete(table, condition)?;
        self.modify(table, stmt).await
    }

    /// Insert or update by `conflict_keys`, reporting whether anything changed.
    ///
    /// The conflict keys must be covered by a unique index.
    pub async fn upsert(&self, table: &str, record: Record, conflict_keys: &[&str]) -> Result<UpsertStatus> {
        let stmt = sql::upsert(table, &record, conflict_keys)?;

        let pool = self.pool().await?;
        let touched: Option<bool> = sqlx::query_scalar_with(&stmt.sql, json_args(stmt.params)?)
            .fetch_optional(&pool)
            .await?;

        Ok(if touched.is_some() {
            UpsertStatus::Changed
        } else {
            UpsertStatus::Unchanged
        })
    }

    async fn modify(&self, table: &str, stmt: Statement) -> Result<Vec<Record>> {
        let pool = self.pool().await?;
        let rows: Vec<Value> = sqlx::query_scalar_with(&stmt.sql, json_args(stmt.params)?)
            .fetch_all(&pool)
            .await?;
        if rows.is_empty() {
            return Err(DatabaseError::NoMatchingRecord {
                table: table.to_string(),
            });
        }
        rows.into_iter().map(into_record).collect()
    }
}

/// Convert a JSON value into a record, failing on non-objects.
pub fn into_record(value: Value) -> Result<Record> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(DatabaseError::InvalidRecord(format!(
            "expected a JSON object row, got {}",
            other
        ))),
    }
}

fn json_args(params: Vec<Value>) -> Result<PgArguments> {
    let mut args = PgArguments::default();
    for param in params {
        args.add(Json(param)).map_err(encode_error)?;
    }
    Ok(args)
}

fn typed_args(params: &[SqlParam]) -> Result<PgArguments> {
    let mut args = PgArguments::default();
    for param in params {
        match param.clone() {
            SqlParam::Text(v) => args.add(v),
            SqlParam::Int(v) => args.add(v),
            SqlParam::Bool(v) => args.add(v),
            SqlParam::TextArray(v) => args.add(v),
            SqlParam::Json(v) => args.add(Json(v)),
        }
        .map_err(encode_error)?;
    }
    Ok(args)
}

fn encode_error(err: sqlx::error::BoxDynError) -> DatabaseError {
    DatabaseError::Encode(err.to_string())
}
