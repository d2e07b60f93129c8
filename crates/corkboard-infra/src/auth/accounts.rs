//! Email/password accounts and bearer sessions stored in SQLite.
//!
//! Passwords are hashed with Argon2id (PHC string format). Session tokens
//! are 32 random bytes, hex encoded; only their SHA-256 digest is stored.

use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use chrono::Utc;
use corkboard_types::config::AuthConfig;
use corkboard_types::error::AuthError;
use corkboard_types::identity::{AuthUser, Credentials, ExternalAssertion, PrincipalId};
use rand::RngCore;
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};
use sqlx::Row;
use uuid::Uuid;

use crate::sqlite::pool::DatabasePool;

/// Account and session storage backing local sign-in.
#[derive(Clone)]
pub struct SqliteAccounts {
    pool: DatabasePool,
    min_password_len: usize,
}

impl SqliteAccounts {
    pub fn new(pool: DatabasePool, config: &AuthConfig) -> Self {
        Self {
            pool,
            min_password_len: config.min_password_len,
        }
    }

    /// Create an account. Fails with `InvalidEmail`, `WeakPassword` or
    /// `EmailTaken`.
    pub async fn create_account(&self, credentials: &Credentials) -> Result<AuthUser, AuthError> {
        let email = normalize_email(&credentials.email)?;
        let password = credentials.password.expose_secret();
        if password.chars().count() < self.min_password_len {
            return Err(AuthError::WeakPassword {
                min: self.min_password_len,
            });
        }

        let id = Uuid::now_v7().to_string();
        let hash = hash_password(password)?;
        let result = sqlx::query(
            "INSERT INTO accounts (id, email, password_hash, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&email)
        .bind(&hash)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(AuthError::EmailTaken(email));
            }
            Err(e) => return Err(transport(e)),
        }

        tracing::info!(principal = %id, "account created");
        Ok(AuthUser {
            id: PrincipalId::new(id),
            email: Some(email),
            display_name: None,
        })
    }

    /// Check email + password. Unknown email and wrong password are
    /// indistinguishable to the caller.
    pub async fn verify_credentials(&self, credentials: &Credentials) -> Result<AuthUser, AuthError> {
        let email = normalize_email(&credentials.email)?;
        let row = sqlx::query("SELECT id, email, password_hash FROM accounts WHERE email = ?")
            .bind(&email)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(transport)?;
        let Some(row) = row else {
            tracing::debug!("sign-in for unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        let stored: String = row.try_get("password_hash").map_err(transport)?;
        let parsed = PasswordHash::new(&stored)
            .map_err(|e| AuthError::Provider(format!("corrupt password hash: {e}")))?;
        if Argon2::default()
            .verify_password(credentials.password.expose_secret().as_bytes(), &parsed)
            .is_err()
        {
            tracing::debug!("sign-in with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        Ok(AuthUser {
            id: PrincipalId::new(row.try_get::<String, _>("id").map_err(transport)?),
            email: Some(row.try_get("email").map_err(transport)?),
            display_name: None,
        })
    }

    /// Issue a new bearer token for `user`.
    pub async fn issue_session(&self, user: &AuthUser) -> Result<String, AuthError> {
        let token = generate_token();
        sqlx::query(
            "INSERT INTO auth_sessions (token_hash, principal_id, email, display_name, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(hash_token(&token))
        .bind(user.id.as_str())
        .bind(user.email.as_deref())
        .bind(user.display_name.as_deref())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(transport)?;
        Ok(token)
    }

    /// Look up the principal behind a bearer token.
    pub async fn resolve_session(&self, token: &str) -> Result<Option<AuthUser>, AuthError> {
        let token_hash = hash_token(token);
        let row = sqlx::query(
            "SELECT principal_id, email, display_name FROM auth_sessions WHERE token_hash = ?",
        )
        .bind(&token_hash)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(transport)?;
        let Some(row) = row else {
            return Ok(None);
        };

        // Fire-and-forget usage tracking.
        let writer = self.pool.writer.clone();
        tokio::spawn(async move {
            let _ = sqlx::query("UPDATE auth_sessions SET last_used_at = ? WHERE token_hash = ?")
                .bind(Utc::now().to_rfc3339())
                .bind(&token_hash)
                .execute(&writer)
                .await;
        });

        Ok(Some(AuthUser {
            id: PrincipalId::new(row.try_get::<String, _>("principal_id").map_err(transport)?),
            email: row.try_get("email").map_err(transport)?,
            display_name: row.try_get("display_name").map_err(transport)?,
        }))
    }

    /// Record the display name resolved for a session that was issued
    /// without one, so later requests reuse it.
    pub async fn cache_display_name(&self, token: &str, display_name: &str) -> Result<(), AuthError> {
        sqlx::query(
            "UPDATE auth_sessions SET display_name = ? WHERE token_hash = ? AND display_name IS NULL",
        )
        .bind(display_name)
        .bind(hash_token(token))
        .execute(&self.pool.writer)
        .await
        .map_err(transport)?;
        Ok(())
    }

    /// Revoke a bearer token. Returns whether it existed.
    pub async fn revoke_session(&self, token: &str) -> Result<bool, AuthError> {
        let result = sqlx::query("DELETE FROM auth_sessions WHERE token_hash = ?")
            .bind(hash_token(token))
            .execute(&self.pool.writer)
            .await
            .map_err(transport)?;
        Ok(result.rows_affected() > 0)
    }
}

/// Map a trusted external assertion to a stable principal.
///
/// The principal id is derived from provider and subject, so the same
/// external identity always lands on the same profile. A blank subject
/// means the user backed out of the provider flow.
pub fn external_user(assertion: &ExternalAssertion) -> Result<AuthUser, AuthError> {
    let provider = assertion.provider.trim().to_lowercase();
    let subject = assertion.subject.trim();
    if subject.is_empty() {
        return Err(AuthError::Cancelled);
    }
    if provider.is_empty() || !provider.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(AuthError::Provider(format!(
            "unsupported provider name '{}'",
            assertion.provider
        )));
    }

    let digest = format!("{:x}", Sha256::digest(format!("{provider}:{subject}").as_bytes()));
    let email = match assertion.email.as_deref().map(str::trim) {
        Some(e) if !e.is_empty() => Some(normalize_email(e)?),
        _ => None,
    };
    Ok(AuthUser {
        id: PrincipalId::new(format!("ext-{provider}-{}", &digest[..24])),
        email,
        display_name: assertion
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string),
    })
}

/// Lowercase hex SHA-256 of a bearer token.
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let salt = SaltString::encode_b64(&salt).map_err(|e| AuthError::Provider(e.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Provider(format!("password hashing failed: {e}")))
}

/// Trim and lowercase; require `local@domain.tld` without whitespace.
fn normalize_email(raw: &str) -> Result<String, AuthError> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(AuthError::InvalidEmail(raw.to_string()))
    }
}

fn transport(e: sqlx::Error) -> AuthError {
    AuthError::Transport(e.to_string())
}
