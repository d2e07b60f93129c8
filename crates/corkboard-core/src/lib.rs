//! Business logic and port trait definitions for Corkboard.
//!
//! This crate defines the "ports" (repository traits) that the infrastructure
//! layer implements, plus the live message sync and identity session built
//! on top of them. It depends only on `corkboard-types` -- never on
//! `corkboard-infra` or any database/IO crate.

pub mod event;
pub mod identity;
pub mod repository;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;
