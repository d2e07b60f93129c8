//! Display name resolution from the profile store.

use chrono::Utc;
use corkboard_types::error::RepositoryError;
use corkboard_types::identity::{AuthUser, PrincipalId, Profile};

use super::username::generate_username;
use crate::repository::ProfileStore;

/// Username from the principal's profile, or a generated name when no
/// profile exists or the lookup fails. Generated names are not persisted.
pub async fn resolve_display_name<P: ProfileStore>(profiles: &P, id: &PrincipalId) -> String {
    match profiles.get_profile(id).await {
        Ok(Some(profile)) => profile.username,
        Ok(None) => {
            tracing::debug!(principal = %id, "no profile, using generated name");
            generate_username()
        }
        Err(e) => {
            tracing::warn!(principal = %id, error = %e, "profile lookup failed, using generated name");
            generate_username()
        }
    }
}

/// Load the profile for `user`, creating and persisting one if missing.
///
/// A new profile takes `preferred` (trimmed, if non-blank), else the
/// provider's display name, else a generated name.
pub async fn ensure_profile<P: ProfileStore>(
    profiles: &P,
    user: &AuthUser,
    preferred: Option<&str>,
) -> Result<Profile, RepositoryError> {
    if let Some(existing) = profiles.get_profile(&user.id).await? {
        return Ok(existing);
    }
    let profile = Profile {
        username: pick_username(preferred.or(user.display_name.as_deref())),
        email: user.email.clone().unwrap_or_default(),
        created_at: Utc::now(),
    };
    profiles.put_profile(&user.id, &profile).await?;
    tracing::info!(principal = %user.id, username = %profile.username, "created profile");
    Ok(profile)
}

/// Trimmed `desired` if non-blank, otherwise a generated name.
pub fn pick_username(desired: Option<&str>) -> String {
    desired
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map_or_else(generate_username, str::to_string)
}
