use thiserror::Error;

/// Errors raised by identity operations (login, registration, logout).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("email '{0}' is already registered")]
    EmailTaken(String),

    #[error("password must be at least {min} characters")]
    WeakPassword { min: usize },

    #[error("invalid email address: '{0}'")]
    InvalidEmail(String),

    #[error("sign-in was cancelled")]
    Cancelled,

    #[error("identity provider error: {0}")]
    Provider(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Errors raised by message mutations (create, update, delete).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    #[error("invalid message: {0}")]
    Invalid(String),

    #[error("message not found")]
    NotFound,

    #[error("permission denied")]
    PermissionDenied,

    #[error("transport error: {0}")]
    Transport(String),
}

impl WriteError {
    /// True when the target document does not exist.
    ///
    /// Front ends treat a repeated delete of an already-gone message as
    /// success-equivalent by checking this.
    pub fn is_not_found(&self) -> bool {
        matches!(self, WriteError::NotFound)
    }
}

/// Errors raised by the live snapshot listener.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    #[error("snapshot stream failed: {0}")]
    Transport(String),

    #[error("snapshot stream closed")]
    Closed,
}

/// Errors from store adapters (used by the port traits in corkboard-core).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("permission denied")]
    PermissionDenied,
}

impl From<RepositoryError> for WriteError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => WriteError::NotFound,
            RepositoryError::PermissionDenied => WriteError::PermissionDenied,
            other => WriteError::Transport(other.to_string()),
        }
    }
}

impl From<RepositoryError> for SubscriptionError {
    fn from(e: RepositoryError) -> Self {
        SubscriptionError::Transport(e.to_string())
    }
}

impl From<RepositoryError> for AuthError {
    fn from(e: RepositoryError) -> Self {
        AuthError::Transport(e.to_string())
    }
}
