//! Local user storage.

use sqlx::PgPool;

use crate::error::{DatabaseError, Result};
use crate::models::{Account, User};

const USER_COLUMNS: &str =
    "id, acct_uuid, username, password_hash, email, full_name, orgs, create_time, is_active";

/// Fields needed to register a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub acct_uuid: Option<String>,
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub full_name: Option<String>,
    pub orgs: Vec<String>,
}

/// Create a new user.
pub async fn create_user(pool: &PgPool, user: &NewUser) -> Result<User> {
    let mut orgs = user.orgs.clone();
    orgs.sort();

    sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (acct_uuid, username, password_hash, email, full_name, orgs)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {}
        "#,
        USER_COLUMNS
    ))
    .bind(&user.acct_uuid)
    .bind(&user.username)
    .bind(&user.password_hash)
    .bind(&user.email)
    .bind(&user.full_name)
    .bind(&orgs)
    .fetch_one(pool)
    .await
    .map_err(|e| DatabaseError::from_insert(e, "User", &user.email))
}

/// Get an active user by email.
pub async fn get_user_by_email(pool: &PgPool, email: &str) -> Result<User> {
    sqlx::query_as::<_, User>(&format!(
        r#"
        SELECT {}
        FROM users
        WHERE email = $1 AND is_active = TRUE
        "#,
        USER_COLUMNS
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "User",
        id: email.to_string(),
    })
}

/// Replace a user's password hash.
pub async fn update_password(pool: &PgPool, email: &str, password_hash: &str) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET password_hash = $1
        WHERE email = $2 AND is_active = TRUE
        "#,
    )
    .bind(password_hash)
    .bind(email)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "User",
            id: email.to_string(),
        });
    }

    Ok(())
}

/// Find the active upstream account whose login id is `email`.
///
/// Only emails known upstream may register locally.
pub async fn find_account_by_login(pool: &PgPool, email: &str) -> Result<Option<Account>> {
    let row: Option<(String, String, Option<String>, Option<String>, Option<String>, Vec<String>, bool)> =
        sqlx::query_as(
            r#"
            SELECT acct_uuid, acct_id, acct_email, acct_full_name, acct_full_name_2nd, orgs, is_active
            FROM accts
            WHERE acct_id = $1 AND is_active = TRUE
            "#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(
        |(acct_uuid, acct_id, acct_email, acct_full_name, acct_full_name_2nd, orgs, is_active)| Account {
            acct_uuid,
            acct_id,
            acct_email,
            acct_full_name,
            acct_full_name_2nd,
            orgs,
            is_active,
        },
    ))
}
