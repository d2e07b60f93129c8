//! Opening the signed-in CLI session.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use corkboard_core::identity::IdentitySessionManager;
use corkboard_core::repository::DocumentProfileStore;
use corkboard_infra::auth::LocalAuthProvider;
use corkboard_types::identity::{PrincipalId, Session};

use crate::state::{AppState, ConcreteIdentity};

/// Identity manager over the local provider, with its first auth event
/// already processed (so a stored session is restored).
pub async fn open_identity(state: &AppState) -> Result<ConcreteIdentity> {
    let provider = Arc::new(LocalAuthProvider::open(state.accounts.clone(), &state.data_dir).await);
    let identity = IdentitySessionManager::new(
        provider,
        DocumentProfileStore::new(state.store.clone()),
        Arc::new(state.notifications.clone()),
    );
    identity.initialize();
    identity
        .watch()
        .wait_for(|s| s.initialized)
        .await
        .context("identity listener stopped before the session was restored")?;
    Ok(identity)
}

/// The signed-in principal and display name, or an error telling the user
/// how to sign in.
pub fn require_login(session: &Session) -> Result<(PrincipalId, String)> {
    match (&session.principal, &session.display_name) {
        (Some(id), Some(name)) => Ok((id.clone(), name.clone())),
        (Some(id), None) => Ok((id.clone(), id.to_string())),
        _ => bail!("Not signed in. Run `cork login` or `cork register` first."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_login() {
        assert!(require_login(&Session::default()).is_err());

        let session = Session {
            principal: Some(PrincipalId::new("p1")),
            display_name: Some("Alice".to_string()),
            initialized: true,
            ..Default::default()
        };
        let (id, name) = require_login(&session).unwrap();
        assert_eq!(id.as_str(), "p1");
        assert_eq!(name, "Alice");
    }
}
