//! Identity provider trait definition.

use corkboard_types::error::AuthError;
use corkboard_types::identity::{AuthUser, Credentials, ExternalAssertion};
use tokio::sync::watch;

/// External identity provider: credential checks, account creation,
/// external sign-in and an observable "current user" state.
pub trait AuthProvider: Send + Sync {
    /// Receiver of the provider's current user. Every sign-in and sign-out
    /// publishes a new value; the initial value reflects a restored session.
    fn auth_state_changes(&self) -> watch::Receiver<Option<AuthUser>>;

    /// Verify email + password and make that user current.
    fn sign_in_with_credentials(
        &self,
        credentials: &Credentials,
    ) -> impl std::future::Future<Output = Result<AuthUser, AuthError>> + Send;

    /// Create an account and make it current.
    ///
    /// Fails with `EmailTaken`, `InvalidEmail` or `WeakPassword`.
    fn sign_up_with_credentials(
        &self,
        credentials: &Credentials,
    ) -> impl std::future::Future<Output = Result<AuthUser, AuthError>> + Send;

    /// Accept an identity asserted by an external provider and make it current.
    fn sign_in_with_external_provider(
        &self,
        assertion: &ExternalAssertion,
    ) -> impl std::future::Future<Output = Result<AuthUser, AuthError>> + Send;

    /// End the current session.
    fn sign_out(&self) -> impl std::future::Future<Output = Result<(), AuthError>> + Send;
}

impl<A: AuthProvider> AuthProvider for std::sync::Arc<A> {
    fn auth_state_changes(&self) -> watch::Receiver<Option<AuthUser>> {
        (**self).auth_state_changes()
    }

    fn sign_in_with_credentials(
        &self,
        credentials: &Credentials,
    ) -> impl std::future::Future<Output = Result<AuthUser, AuthError>> + Send {
        (**self).sign_in_with_credentials(credentials)
    }

    fn sign_up_with_credentials(
        &self,
        credentials: &Credentials,
    ) -> impl std::future::Future<Output = Result<AuthUser, AuthError>> + Send {
        (**self).sign_up_with_credentials(credentials)
    }

    fn sign_in_with_external_provider(
        &self,
        assertion: &ExternalAssertion,
    ) -> impl std::future::Future<Output = Result<AuthUser, AuthError>> + Send {
        (**self).sign_in_with_external_provider(assertion)
    }

    fn sign_out(&self) -> impl std::future::Future<Output = Result<(), AuthError>> + Send {
        (**self).sign_out()
    }
}
