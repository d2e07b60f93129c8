//! Infrastructure layer for Corkboard.
//!
//! Contains implementations of the port traits defined in `corkboard-core`:
//! the SQLite and in-memory document stores, the ownership policy wrapper,
//! local accounts with bearer sessions, and data directory/config loading.

pub mod auth;
pub mod config;
pub mod filesystem;
pub mod memory;
pub mod policy;
pub mod sqlite;
