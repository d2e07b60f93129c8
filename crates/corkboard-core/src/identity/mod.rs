//! Identity session management and display name helpers.

pub mod manager;
pub mod profile;
pub mod username;

pub use manager::IdentitySessionManager;
pub use profile::{ensure_profile, pick_username, resolve_display_name};
pub use username::{generate_username, is_generated_username};
