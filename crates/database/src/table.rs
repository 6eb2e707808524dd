//! Table lifecycle operations.

use tracing::info;

use crate::error::Result;
use crate::identifier::validate_table;
use crate::sql::{self, ColumnDef};
use crate::Database;

impl Database {
    /// Whether `table` exists in the current schema.
    pub async fn table_exists(&self, table: &str) -> Result<bool> {
        validate_table(table)?;
        let pool = self.pool().await?;
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM pg_tables WHERE schemaname = current_schema() AND tablename = $1)",
        )
        .bind(table)
        .fetch_one(&pool)
        .await?;
        Ok(exists)
    }

    /// Whether `table` has no rows. Fails if the table does not exist.
    pub async fn is_table_empty(&self, table: &str) -> Result<bool> {
        let stmt = sql::is_table_empty(table)?;
        let pool = self.pool().await?;
        let empty: bool = sqlx::query_scalar(&stmt).fetch_one(&pool).await?;
        Ok(empty)
    }

    /// Create `table` if it does not already exist.
    pub async fn create_table(&self, table: &str, columns: &[ColumnDef]) -> Result<()> {
        let stmt = sql::create_table(table, columns)?;
        let pool = self.pool().await?;
        sqlx::query(&stmt).execute(&pool).await?;

        self.remember_table(table, columns.iter().map(|c| c.name.clone()).collect())
            .await;
        info!(table = %table, "Table ensured");
        Ok(())
    }

    /// Drop `table` if it exists.
    pub async fn drop_table(&self, table: &str) -> Result<()> {
        let stmt = sql::drop_table(table)?;
        let pool = self.pool().await?;
        sqlx::query(&stmt).execute(&pool).await?;

        self.forget_table(table).await;
        info!(table = %table, "Table dropped");
        Ok(())
    }

    /// Delete every row of `table`, returning how many were removed.
    pub async fn clear_table(&self, table: &str) -> Result<u64> {
        let stmt = sql::clear_table(table)?;
        let pool = self.pool().await?;
        let result = sqlx::query(&stmt).execute(&pool).await?;
        Ok(result.rows_affected())
    }
}
