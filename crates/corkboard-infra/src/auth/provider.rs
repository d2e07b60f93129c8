//! `AuthProvider` for a single local user of the CLI.
//!
//! The active session token is kept in `{data_dir}/session.token` so that a
//! later process picks the same user back up on startup.

use std::path::{Path, PathBuf};

use corkboard_core::repository::AuthProvider;
use corkboard_types::error::AuthError;
use corkboard_types::identity::{AuthUser, Credentials, ExternalAssertion};
use tokio::sync::{Mutex, watch};

use super::accounts::{SqliteAccounts, external_user};

const TOKEN_FILE: &str = "session.token";

pub struct LocalAuthProvider {
    accounts: SqliteAccounts,
    token_path: PathBuf,
    token: Mutex<Option<String>>,
    current: watch::Sender<Option<AuthUser>>,
}

impl LocalAuthProvider {
    /// Create the provider and restore a persisted session if its token is
    /// still valid. A stale token file is removed.
    pub async fn open(accounts: SqliteAccounts, data_dir: &Path) -> Self {
        let token_path = data_dir.join(TOKEN_FILE);
        let (restored_token, restored_user) = match restore(&accounts, &token_path).await {
            Some((token, user)) => (Some(token), Some(user)),
            None => (None, None),
        };
        let (current, _) = watch::channel(restored_user);
        Self {
            accounts,
            token_path,
            token: Mutex::new(restored_token),
            current,
        }
    }

    /// Bearer token of the current session, if any.
    pub async fn token(&self) -> Option<String> {
        self.token.lock().await.clone()
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.current.borrow().clone()
    }

    async fn start_session(&self, user: AuthUser) -> Result<AuthUser, AuthError> {
        let token = self.accounts.issue_session(&user).await?;
        write_token(&self.token_path, &token).await?;

        let previous = self.token.lock().await.replace(token);
        if let Some(previous) = previous {
            // Best effort; an orphaned session only lingers in the table.
            if let Err(e) = self.accounts.revoke_session(&previous).await {
                tracing::warn!(error = %e, "failed to revoke previous session");
            }
        }

        tracing::info!(principal = %user.id, "signed in");
        self.current.send_replace(Some(user.clone()));
        Ok(user)
    }
}

impl AuthProvider for LocalAuthProvider {
    fn auth_state_changes(&self) -> watch::Receiver<Option<AuthUser>> {
        self.current.subscribe()
    }

    async fn sign_in_with_credentials(&self, credentials: &Credentials) -> Result<AuthUser, AuthError> {
        let user = self.accounts.verify_credentials(credentials).await?;
        self.start_session(user).await
    }

    async fn sign_up_with_credentials(&self, credentials: &Credentials) -> Result<AuthUser, AuthError> {
        let user = self.accounts.create_account(credentials).await?;
        self.start_session(user).await
    }

    async fn sign_in_with_external_provider(
        &self,
        assertion: &ExternalAssertion,
    ) -> Result<AuthUser, AuthError> {
        let user = external_user(assertion)?;
        self.start_session(user).await
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let token = self.token.lock().await.take();
        self.current.send_replace(None);

        match tokio::fs::remove_file(&self.token_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(AuthError::Transport(format!("failed to remove session file: {e}"))),
        }
        if let Some(token) = token {
            self.accounts.revoke_session(&token).await?;
        }
        tracing::info!("signed out");
        Ok(())
    }
}

async fn restore(accounts: &SqliteAccounts, token_path: &Path) -> Option<(String, AuthUser)> {
    let token = match tokio::fs::read_to_string(token_path).await {
        Ok(content) => content.trim().to_string(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!("Failed to read {}: {e}", token_path.display());
            return None;
        }
    };

    match accounts.resolve_session(&token).await {
        Ok(Some(user)) => {
            tracing::debug!(principal = %user.id, "restored session");
            Some((token, user))
        }
        Ok(None) => {
            tracing::debug!("session token no longer valid, removing");
            let _ = tokio::fs::remove_file(token_path).await;
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not restore session");
            None
        }
    }
}

async fn write_token(path: &Path, token: &str) -> Result<(), AuthError> {
    let io_err = |e: std::io::Error| AuthError::Transport(format!("failed to write session file: {e}"));
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    tokio::fs::write(path, token).await.map_err(io_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .map_err(io_err)?;
    }
    Ok(())
}
