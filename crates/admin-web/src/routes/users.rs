//! Registration, login and profile.

use axum::extract::State;
use axum::Json;
use database::user::{create_user, find_account_by_login, get_user_by_email, update_password, NewUser};
use database::{DatabaseError, User};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ok, Envelope};
use crate::auth::{hash_password, verify_password, Claims};
use crate::error::{ApiError, Result};
use crate::state::AppState;

const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct PasswordChange {
    pub old_password: String,
    pub new_password: String,
}

fn check_password_strength(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

/// Register a login for an email known upstream.
pub async fn register(State(state): State<AppState>, Json(req): Json<Credentials>) -> Result<Json<Envelope<User>>> {
    let email = req.email.trim();
    check_password_strength(&req.password)?;

    let pool = state.db().pool().await?;
    let account = find_account_by_login(&pool, email)
        .await?
        .ok_or_else(|| ApiError::Forbidden(format!("{} is not a known account", email)))?;

    let user = create_user(
        &pool,
        &NewUser {
            acct_uuid: Some(account.acct_uuid),
            username: account.acct_id,
            password_hash: hash_password(&req.password)?,
            email: email.to_string(),
            full_name: account.acct_full_name,
            orgs: account.orgs,
        },
    )
    .await?;

    info!(email = %user.email, "User registered");
    Ok(ok(user))
}

/// Exchange email and password for a session token.
pub async fn login(State(state): State<AppState>, Json(req): Json<Credentials>) -> Result<Json<Envelope<LoginResponse>>> {
    let invalid = || ApiError::Unauthorized("invalid email or password".to_string());

    let pool = state.db().pool().await?;
    let user = match get_user_by_email(&pool, req.email.trim()).await {
        Ok(user) => user,
        Err(DatabaseError::NotFound { .. }) => return Err(invalid()),
        Err(e) => return Err(e.into()),
    };
    if !verify_password(&req.password, &user.password_hash) {
        return Err(invalid());
    }

    let token = state.keys.issue(&user.email, &user.orgs)?;
    info!(email = %user.email, "User logged in");
    Ok(ok(LoginResponse { token, user }))
}

/// The caller's own user record.
pub async fn profile(State(state): State<AppState>, claims: Claims) -> Result<Json<Envelope<User>>> {
    let pool = state.db().pool().await?;
    let user = get_user_by_email(&pool, &claims.sub).await?;
    Ok(ok(user))
}

/// Change the caller's password after checking the current one.
pub async fn change_password(
    State(state): State<AppState>,
    claims: Claims,
    Json(req): Json<PasswordChange>,
) -> Result<Json<Envelope<&'static str>>> {
    check_password_strength(&req.new_password)?;

    let pool = state.db().pool().await?;
    let user = get_user_by_email(&pool, &claims.sub).await?;
    if !verify_password(&req.old_password, &user.password_hash) {
        return Err(ApiError::Unauthorized("current password is incorrect".to_string()));
    }

    update_password(&pool, &user.email, &hash_password(&req.new_password)?).await?;
    info!(email = %user.email, "Password changed");
    Ok(ok("password updated"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_strength() {
        assert!(check_password_strength("short").is_err());
        assert!(check_password_strength("long enough").is_ok());
    }
}
