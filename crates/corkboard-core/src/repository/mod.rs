//! Port trait definitions for the external collaborators.
//!
//! These traits define the document store, profile store and identity
//! provider interfaces that the infrastructure layer (corkboard-infra)
//! implements. The core crate never depends on any specific storage or
//! identity technology.

pub mod auth;
pub mod document;
pub mod profile;

pub use auth::AuthProvider;
pub use document::{DocumentStore, SnapshotStream};
pub use profile::{DocumentProfileStore, ProfileStore};
