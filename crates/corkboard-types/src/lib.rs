//! Shared domain types for Corkboard.
//!
//! This crate contains the domain types used across the board: messages,
//! generic documents and snapshots, identities and sessions, board events,
//! configuration, and the error taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, chrono, secrecy, thiserror.

pub mod config;
pub mod document;
pub mod error;
pub mod event;
pub mod identity;
pub mod message;
