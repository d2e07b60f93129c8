//! Local identity provider: SQLite accounts, bearer sessions and the
//! CLI-side `AuthProvider`.

pub mod accounts;
pub mod provider;

pub use accounts::{SqliteAccounts, external_user, hash_token};
pub use provider::LocalAuthProvider;
