//! Customer accounts owned by users.

use sqlx::PgPool;

use crate::error::{DatabaseError, Result};
use crate::models::Customer;

const CUSTOMER_COLUMNS: &str = "id, owner, customer_name, customer_full_name, password_hash, sendtasks, create_time, is_active";

/// Create a customer under `owner`.
pub async fn create_customer(
    pool: &PgPool,
    owner: &str,
    customer_name: &str,
    customer_full_name: Option<&str>,
    password_hash: &str,
) -> Result<Customer> {
    sqlx::query_as::<_, Customer>(&format!(
        r#"
        INSERT INTO customers (owner, customer_name, customer_full_name, password_hash)
        VALUES ($1, $2, $3, $4)
        RETURNING {}
        "#,
        CUSTOMER_COLUMNS
    ))
    .bind(owner)
    .bind(customer_name)
    .bind(customer_full_name)
    .bind(password_hash)
    .fetch_one(pool)
    .await
    .map_err(|e| DatabaseError::from_insert(e, "Customer", customer_name))
}

/// List the active customers of `owner`.
pub async fn list_customers(pool: &PgPool, owner: &str) -> Result<Vec<Customer>> {
    let customers = sqlx::query_as::<_, Customer>(&format!(
        r#"
        SELECT {}
        FROM customers
        WHERE owner = $1 AND is_active = TRUE
        ORDER BY customer_name
        "#,
        CUSTOMER_COLUMNS
    ))
    .bind(owner)
    .fetch_all(pool)
    .await?;

    Ok(customers)
}

/// Replace the task UUIDs a customer may see. The list is stored sorted and
/// deduplicated.
pub async fn set_customer_tasks(
    pool: &PgPool,
    owner: &str,
    customer_name: &str,
    sendtasks: &[String],
) -> Result<Customer> {
    let mut tasks = sendtasks.to_vec();
    tasks.sort();
    tasks.dedup();

    sqlx::query_as::<_, Customer>(&format!(
        r#"
        UPDATE customers
        SET sendtasks = $1
        WHERE owner = $2 AND customer_name = $3 AND is_active = TRUE
        RETURNING {}
        "#,
        CUSTOMER_COLUMNS
    ))
    .bind(&tasks)
    .bind(owner)
    .bind(customer_name)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "Customer",
        id: customer_name.to_string(),
    })
}
