//! Client-side identity session.
//!
//! [`IdentitySessionManager`] tracks who is signed in, resolves and caches
//! their display name, and exposes credential/external sign-in, registration
//! and sign-out. Session changes are observable through a
//! `tokio::sync::watch` channel.
//!
//! The `loading` flag is driven by an in-flight counter held under the
//! session channel's write lock, so it stays true while any mutating
//! operation runs and is reset on every exit path, including panics and
//! cancellation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use corkboard_types::error::AuthError;
use corkboard_types::event::Notification;
use corkboard_types::identity::{AuthUser, Credentials, ExternalAssertion, Profile, Session};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::profile::{ensure_profile, pick_username, resolve_display_name};
use super::username::generate_username;
use crate::event::Notifier;
use crate::repository::{AuthProvider, ProfileStore};

pub struct IdentitySessionManager<A, P> {
    inner: Arc<Inner<A, P>>,
}

struct Inner<A, P> {
    auth: A,
    profiles: P,
    notifier: Arc<dyn Notifier>,
    session: watch::Sender<Session>,
    in_flight: AtomicUsize,
    /// Cancels the running auth-state listener, if any.
    listener: Mutex<Option<CancellationToken>>,
}

/// Holds `loading = true` for as long as it lives.
struct LoadingGuard<'a> {
    session: &'a watch::Sender<Session>,
    in_flight: &'a AtomicUsize,
}

impl<'a> LoadingGuard<'a> {
    fn new(session: &'a watch::Sender<Session>, in_flight: &'a AtomicUsize) -> Self {
        session.send_modify(|s| {
            in_flight.fetch_add(1, Ordering::SeqCst);
            s.loading = true;
        });
        Self { session, in_flight }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let in_flight = self.in_flight;
        self.session.send_modify(|s| {
            let remaining = in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
            s.loading = remaining > 0;
        });
    }
}

impl<A, P> IdentitySessionManager<A, P>
where
    A: AuthProvider + 'static,
    P: ProfileStore + 'static,
{
    pub fn new(auth: A, profiles: P, notifier: Arc<dyn Notifier>) -> Self {
        let (session, _) = watch::channel(Session::default());
        Self {
            inner: Arc::new(Inner {
                auth,
                profiles,
                notifier,
                session,
                in_flight: AtomicUsize::new(0),
                listener: Mutex::new(None),
            }),
        }
    }

    /// Start following the provider's auth state. While a listener is
    /// running further calls do nothing; after [`dispose`](Self::dispose) a
    /// new one is registered.
    ///
    /// The current provider state is processed immediately, so a restored
    /// session is reflected (and `initialized` set) without further events.
    pub fn initialize(&self) {
        let shutdown = {
            let mut listener = self.inner.listener.lock().unwrap_or_else(PoisonError::into_inner);
            if listener.is_some() {
                tracing::debug!("identity listener already running");
                return;
            }
            let token = CancellationToken::new();
            *listener = Some(token.clone());
            token
        };
        let inner = self.inner.clone();
        let mut changes = inner.auth.auth_state_changes();
        tokio::spawn(async move {
            loop {
                let user = changes.borrow_and_update().clone();
                inner.on_auth_change(user).await;
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    changed = changes.changed() => {
                        if changed.is_err() {
                            tracing::debug!("auth provider closed its state channel");
                            break;
                        }
                    }
                }
            }
        });
    }

    /// Stop following the provider. Idempotent.
    pub fn dispose(&self) {
        self.inner.stop_listener();
    }

    pub fn session(&self) -> Session {
        self.inner.session.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Session> {
        self.inner.session.subscribe()
    }

    /// Sign in with email and password, then resolve the display name.
    pub async fn login(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let result = {
            let _loading = self.inner.loading();
            async {
                let user = self.inner.auth.sign_in_with_credentials(credentials).await?;
                let name = resolve_display_name(&self.inner.profiles, &user.id).await;
                self.inner.establish(&user, name);
                Ok::<_, AuthError>(())
            }
            .await
        };
        self.inner
            .report(result, "Logged in successfully!".to_string(), "Failed to log in")?;
        Ok(self.session())
    }

    /// Create an account and persist its profile.
    ///
    /// A blank or absent `desired_name` is replaced by a generated name.
    pub async fn register(
        &self,
        credentials: &Credentials,
        desired_name: Option<&str>,
    ) -> Result<Session, AuthError> {
        let result = {
            let _loading = self.inner.loading();
            async {
                let user = self.inner.auth.sign_up_with_credentials(credentials).await?;
                let profile = Profile {
                    username: pick_username(desired_name),
                    email: user.email.clone().unwrap_or_else(|| credentials.email.clone()),
                    created_at: Utc::now(),
                };
                self.inner.profiles.put_profile(&user.id, &profile).await?;
                tracing::info!(principal = %user.id, username = %profile.username, "registered");
                self.inner.establish(&user, profile.username);
                Ok::<_, AuthError>(())
            }
            .await
        };
        self.inner.report(
            result,
            "Account created successfully!".to_string(),
            "Failed to create account",
        )?;
        Ok(self.session())
    }

    /// Sign in through an external identity provider.
    ///
    /// First-time principals get a profile named after the provider's display
    /// name, or a generated name. Returning principals keep their stored name.
    pub async fn login_with_external_provider(
        &self,
        assertion: &ExternalAssertion,
    ) -> Result<Session, AuthError> {
        let result = {
            let _loading = self.inner.loading();
            async {
                let user = self
                    .inner
                    .auth
                    .sign_in_with_external_provider(assertion)
                    .await?;
                let profile = ensure_profile(&self.inner.profiles, &user, None).await?;
                self.inner.establish(&user, profile.username);
                Ok::<_, AuthError>(())
            }
            .await
        };
        self.inner.report(
            result,
            format!("Logged in with {}!", assertion.provider),
            "Failed to log in",
        )?;
        Ok(self.session())
    }

    /// Clear the local session and sign out at the provider.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let result = {
            let _loading = self.inner.loading();
            self.inner.clear();
            self.inner.auth.sign_out().await
        };
        self.inner
            .report(result, "Logged out successfully!".to_string(), "Failed to log out")
    }
}

impl<A, P: ProfileStore> Inner<A, P> {
    fn loading(&self) -> LoadingGuard<'_> {
        LoadingGuard::new(&self.session, &self.in_flight)
    }

    fn establish(&self, user: &AuthUser, display_name: String) {
        self.session.send_modify(|s| {
            s.principal = Some(user.id.clone());
            s.email = user.email.clone();
            s.display_name = Some(display_name);
            s.initialized = true;
        });
    }

    fn clear(&self) {
        self.session.send_modify(|s| {
            s.principal = None;
            s.email = None;
            s.display_name = None;
        });
    }

    async fn on_auth_change(&self, user: Option<AuthUser>) {
        let Some(user) = user else {
            tracing::debug!("provider reports no user");
            self.session.send_modify(|s| {
                s.principal = None;
                s.email = None;
                s.display_name = None;
                s.initialized = true;
            });
            return;
        };

        let cached = {
            let s = self.session.borrow();
            s.principal.as_ref() == Some(&user.id) && s.display_name.is_some()
        };
        let resolved = if cached {
            None
        } else {
            Some(resolve_display_name(&self.profiles, &user.id).await)
        };

        // An operation may have established this principal while the lookup
        // ran; its name wins.
        self.session.send_modify(|s| {
            if s.principal.as_ref() != Some(&user.id) || s.display_name.is_none() {
                s.principal = Some(user.id.clone());
                s.email = user.email.clone();
                s.display_name = Some(resolved.unwrap_or_else(generate_username));
            }
            s.initialized = true;
        });
        tracing::debug!(principal = %user.id, "session follows provider");
    }

    fn report<T>(&self, result: Result<T, AuthError>, ok: String, failed: &str) -> Result<T, AuthError> {
        match &result {
            Ok(_) => self.notifier.notify(Notification::success(ok)),
            Err(AuthError::Cancelled) => tracing::debug!("identity operation cancelled"),
            Err(e) => {
                tracing::warn!(error = %e, "{failed}");
                self.notifier.notify(Notification::error(format!("{failed}: {e}")));
            }
        }
        result
    }
}

impl<A, P> Inner<A, P> {
    fn stop_listener(&self) {
        let running = self.listener.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(token) = running {
            token.cancel();
        }
    }
}

impl<A, P> Drop for IdentitySessionManager<A, P> {
    fn drop(&mut self) {
        self.inner.stop_listener();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::username::is_generated_username;
    use crate::repository::DocumentProfileStore;
    use crate::testing::{FakeStore, RecordingNotifier};
    use corkboard_types::identity::PrincipalId;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(2);

    /// Provider with an in-memory account table. `gate` (when set) makes
    /// sign-in wait until released, to observe `loading` mid-flight.
    struct FakeAuth {
        accounts: Mutex<HashMap<String, (PrincipalId, String)>>,
        current: watch::Sender<Option<AuthUser>>,
        gate: Mutex<Option<Arc<tokio::sync::Notify>>>,
        fail_sign_out: AtomicBool,
    }

    impl FakeAuth {
        fn new() -> Self {
            Self {
                accounts: Mutex::new(HashMap::new()),
                current: watch::channel(None).0,
                gate: Mutex::new(None),
                fail_sign_out: AtomicBool::new(false),
            }
        }

        fn user(id: &PrincipalId, email: &str) -> AuthUser {
            AuthUser {
                id: id.clone(),
                email: Some(email.to_string()),
                display_name: None,
            }
        }
    }

    impl AuthProvider for FakeAuth {
        fn auth_state_changes(&self) -> watch::Receiver<Option<AuthUser>> {
            self.current.subscribe()
        }

        async fn sign_in_with_credentials(&self, credentials: &Credentials) -> Result<AuthUser, AuthError> {
            let gate = self.gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            let accounts = self.accounts.lock().unwrap();
            let (id, password) = accounts
                .get(&credentials.email)
                .ok_or(AuthError::InvalidCredentials)?;
            if password != credentials.password.expose_secret() {
                return Err(AuthError::InvalidCredentials);
            }
            let user = Self::user(id, &credentials.email);
            self.current.send_replace(Some(user.clone()));
            Ok(user)
        }

        async fn sign_up_with_credentials(&self, credentials: &Credentials) -> Result<AuthUser, AuthError> {
            let password = credentials.password.expose_secret();
            if password.len() < 6 {
                return Err(AuthError::WeakPassword { min: 6 });
            }
            let mut accounts = self.accounts.lock().unwrap();
            if accounts.contains_key(&credentials.email) {
                return Err(AuthError::EmailTaken(credentials.email.clone()));
            }
            let id = PrincipalId::new(format!("u{}", accounts.len() + 1));
            accounts.insert(credentials.email.clone(), (id.clone(), password.to_string()));
            let user = Self::user(&id, &credentials.email);
            self.current.send_replace(Some(user.clone()));
            Ok(user)
        }

        async fn sign_in_with_external_provider(
            &self,
            assertion: &ExternalAssertion,
        ) -> Result<AuthUser, AuthError> {
            if assertion.subject.is_empty() {
                return Err(AuthError::Cancelled);
            }
            let user = AuthUser {
                id: PrincipalId::new(format!("ext-{}", assertion.subject)),
                email: assertion.email.clone(),
                display_name: assertion.display_name.clone(),
            };
            self.current.send_replace(Some(user.clone()));
            Ok(user)
        }

        async fn sign_out(&self) -> Result<(), AuthError> {
            if self.fail_sign_out.load(Ordering::SeqCst) {
                return Err(AuthError::Transport("offline".to_string()));
            }
            self.current.send_replace(None);
            Ok(())
        }
    }

    type Manager = IdentitySessionManager<Arc<FakeAuth>, DocumentProfileStore<FakeStore>>;

    fn manager() -> (Manager, Arc<FakeAuth>, Arc<FakeStore>, Arc<RecordingNotifier>) {
        let auth = Arc::new(FakeAuth::new());
        let store = Arc::new(FakeStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let manager = IdentitySessionManager::new(
            auth.clone(),
            DocumentProfileStore::new(store.clone()),
            notifier.clone(),
        );
        (manager, auth, store, notifier)
    }

    fn external(subject: &str, display_name: Option<&str>) -> ExternalAssertion {
        ExternalAssertion {
            provider: "google".to_string(),
            subject: subject.to_string(),
            email: Some(format!("{subject}@example.com")),
            display_name: display_name.map(str::to_string),
        }
    }

    async fn wait_session(m: &Manager, pred: impl FnMut(&Session) -> bool) -> Session {
        let mut rx = m.watch();
        let found = tokio::time::timeout(WAIT, rx.wait_for(pred))
            .await
            .expect("timed out waiting for session")
            .unwrap()
            .clone();
        found
    }

    #[tokio::test]
    async fn register_uses_desired_name_and_persists_profile() {
        let (m, _, store, notifier) = manager();
        let session = m
            .register(&Credentials::new("a@x.io", "secret1"), Some("  Alice "))
            .await
            .unwrap();

        assert_eq!(session.display_name.as_deref(), Some("Alice"));
        assert_eq!(session.email.as_deref(), Some("a@x.io"));
        assert!(!session.loading);
        let profiles = DocumentProfileStore::new(store);
        let stored = profiles
            .get_profile(session.principal.as_ref().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.username, "Alice");
        assert_eq!(notifier.messages(), vec!["Account created successfully!"]);
    }

    #[tokio::test]
    async fn register_with_blank_name_generates_one() {
        let (m, _, _, _) = manager();
        let session = m
            .register(&Credentials::new("b@x.io", "secret1"), Some("   "))
            .await
            .unwrap();
        assert!(is_generated_username(session.display_name.as_deref().unwrap()));
    }

    #[tokio::test]
    async fn register_twice_fails_with_email_taken() {
        let (m, _, _, notifier) = manager();
        m.register(&Credentials::new("a@x.io", "secret1"), None)
            .await
            .unwrap();
        let err = m
            .register(&Credentials::new("a@x.io", "secret1"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken(_)));
        assert!(!m.session().loading);
        assert_eq!(notifier.errors(), 1);
    }

    #[tokio::test]
    async fn weak_password_leaves_session_anonymous() {
        let (m, _, _, _) = manager();
        let err = m
            .register(&Credentials::new("a@x.io", "123"), None)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::WeakPassword { min: 6 });
        let session = m.session();
        assert!(!session.is_authenticated());
        assert!(!session.loading);
    }

    #[tokio::test]
    async fn login_resolves_stored_username() {
        let (m, _, _, _) = manager();
        m.register(&Credentials::new("a@x.io", "secret1"), Some("Alice"))
            .await
            .unwrap();
        m.logout().await.unwrap();
        assert!(!m.session().is_authenticated());

        let session = m.login(&Credentials::new("a@x.io", "secret1")).await.unwrap();
        assert_eq!(session.display_name.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn login_with_wrong_password_fails() {
        let (m, _, _, _) = manager();
        m.register(&Credentials::new("a@x.io", "secret1"), None)
            .await
            .unwrap();
        m.logout().await.unwrap();

        let err = m.login(&Credentials::new("a@x.io", "nope-nope")).await.unwrap_err();
        assert_eq!(err, AuthError::InvalidCredentials);
        assert!(!m.session().is_authenticated());
    }

    #[tokio::test]
    async fn loading_is_true_while_in_flight() {
        let (m, auth, _, _) = manager();
        m.register(&Credentials::new("a@x.io", "secret1"), None)
            .await
            .unwrap();
        let gate = Arc::new(tokio::sync::Notify::new());
        *auth.gate.lock().unwrap() = Some(gate.clone());

        let m = Arc::new(m);
        let task = {
            let m = m.clone();
            tokio::spawn(async move { m.login(&Credentials::new("a@x.io", "secret1")).await })
        };

        wait_session(&m, |s| s.loading).await;
        gate.notify_one();
        task.await.unwrap().unwrap();
        assert!(!m.session().loading);
    }

    #[tokio::test]
    async fn external_login_creates_profile_once() {
        let (m, _, _, notifier) = manager();
        let first = m
            .login_with_external_provider(&external("g1", Some("Grace")))
            .await
            .unwrap();
        assert_eq!(first.display_name.as_deref(), Some("Grace"));

        // The provider name changed, the stored username did not.
        let second = m
            .login_with_external_provider(&external("g1", Some("Grace H.")))
            .await
            .unwrap();
        assert_eq!(second.display_name.as_deref(), Some("Grace"));
        assert_eq!(notifier.messages()[0], "Logged in with google!");
    }

    #[tokio::test]
    async fn external_login_without_name_generates() {
        let (m, _, _, _) = manager();
        let session = m
            .login_with_external_provider(&external("g2", None))
            .await
            .unwrap();
        assert!(is_generated_username(session.display_name.as_deref().unwrap()));
    }

    #[tokio::test]
    async fn cancelled_external_login_is_silent() {
        let (m, _, _, notifier) = manager();
        let err = m
            .login_with_external_provider(&external("", None))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::Cancelled);
        assert!(notifier.messages().is_empty());
        assert!(!m.session().loading);
    }

    #[tokio::test]
    async fn logout_clears_locally_even_if_provider_fails() {
        let (m, auth, _, notifier) = manager();
        m.register(&Credentials::new("a@x.io", "secret1"), None)
            .await
            .unwrap();
        auth.fail_sign_out.store(true, Ordering::SeqCst);

        let err = m.logout().await.unwrap_err();
        assert!(matches!(err, AuthError::Transport(_)));
        let session = m.session();
        assert!(session.principal.is_none());
        assert!(session.display_name.is_none());
        assert_eq!(notifier.errors(), 1);
    }

    #[tokio::test]
    async fn initialize_marks_initialized_when_anonymous() {
        let (m, _, _, _) = manager();
        assert!(!m.session().initialized);
        m.initialize();
        let session = wait_session(&m, |s| s.initialized).await;
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn initialize_follows_provider_changes() {
        let (m, auth, store, _) = manager();
        let profiles = DocumentProfileStore::new(store);
        let id = PrincipalId::new("u9");
        profiles
            .put_profile(
                &id,
                &Profile {
                    username: "Restored".to_string(),
                    email: "r@x.io".to_string(),
                    created_at: Utc::now(),
                },
            )
            .await
            .unwrap();

        m.initialize();
        m.initialize();
        wait_session(&m, |s| s.initialized).await;

        auth.current.send_replace(Some(FakeAuth::user(&id, "r@x.io")));
        let session = wait_session(&m, |s| s.principal.as_ref() == Some(&id)).await;
        assert_eq!(session.display_name.as_deref(), Some("Restored"));

        auth.current.send_replace(None);
        wait_session(&m, |s| s.principal.is_none()).await;
    }

    #[tokio::test]
    async fn listener_does_not_overwrite_registered_name() {
        let (m, _, _, _) = manager();
        m.initialize();
        wait_session(&m, |s| s.initialized).await;

        m.register(&Credentials::new("a@x.io", "secret1"), Some("Alice"))
            .await
            .unwrap();
        // Let the listener process the provider's sign-up event.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(m.session().display_name.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn dispose_stops_following_provider() {
        let (m, auth, _, _) = manager();
        m.initialize();
        wait_session(&m, |s| s.initialized).await;
        m.dispose();
        tokio::time::sleep(Duration::from_millis(10)).await;

        auth.current
            .send_replace(Some(FakeAuth::user(&PrincipalId::new("late"), "l@x.io")));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!m.session().is_authenticated());
    }

    #[tokio::test]
    async fn initialize_after_dispose_follows_again() {
        let (m, auth, _, _) = manager();
        m.initialize();
        wait_session(&m, |s| s.initialized).await;
        m.dispose();
        m.dispose();

        m.initialize();
        let id = PrincipalId::new("back");
        auth.current.send_replace(Some(FakeAuth::user(&id, "b@x.io")));
        let session = wait_session(&m, |s| s.principal.as_ref() == Some(&id)).await;
        assert_eq!(session.email.as_deref(), Some("b@x.io"));
    }
}
