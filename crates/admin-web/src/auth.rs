//! Password hashing, session tokens and the admin bootstrap.
//!
//! Tokens are HS256 JWTs carrying the user's email and organizations.
//! Handlers take [`Claims`] as an extractor to require a valid token.

use std::time::Duration;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::Utc;
use database::user::{create_user, get_user_by_email, NewUser};
use database::{Database, DatabaseError};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, Result};
use crate::state::AppState;

/// Organization that sees every task.
pub const ADMIN_ORG: &str = "admin";

/// Session token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User email.
    pub sub: String,
    #[serde(default)]
    pub orgs: Vec<String>,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.orgs.iter().any(|o| o == ADMIN_ORG)
    }

    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("administrator access required".to_string()))
        }
    }
}

/// Signing and verification keys.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    expire: Duration,
}

impl JwtKeys {
    pub fn new(secret: &SecretString, expire: Duration) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            validation: Validation::new(Algorithm::HS256),
            expire,
        }
    }

    /// Issue a token for `email`.
    pub fn issue(&self, email: &str, orgs: &[String]) -> Result<String> {
        let iat = Utc::now().timestamp();
        let claims = Claims {
            sub: email.to_string(),
            orgs: orgs.to_vec(),
            iat,
            exp: iat + self.expire.as_secs() as i64,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("failed to sign token: {}", e)))
    }

    /// Validate signature and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| ApiError::Unauthorized(format!("invalid token: {}", e)))
    }
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtKeys")
            .field("expire", &self.expire)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Claims {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::Unauthorized("missing authorization token".to_string()))?;

        state.keys.verify(token)
    }
}

/// Hash a password into an argon2id PHC string.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ApiError::Internal(format!("failed to hash password: {}", e)))
}

/// Verify a password against a stored hash. Malformed hashes never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Create the administrator login if it does not exist yet.
pub async fn bootstrap_admin(db: &Database, email: &str, password: &SecretString) -> Result<()> {
    let pool = db.pool().await?;
    match get_user_by_email(&pool, email).await {
        Ok(_) => {
            info!(email = %email, "Admin user already exists");
            Ok(())
        }
        Err(DatabaseError::NotFound { .. }) => {
            let user = NewUser {
                acct_uuid: None,
                username: email.to_string(),
                password_hash: hash_password(password.expose_secret())?,
                email: email.to_string(),
                full_name: Some("Administrator".to_string()),
                orgs: vec![ADMIN_ORG.to_string()],
            };
            create_user(&pool, &user).await?;
            info!(email = %email, "Created admin user");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
