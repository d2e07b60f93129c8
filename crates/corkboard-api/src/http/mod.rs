//! HTTP/WebSocket API layer for Corkboard.
//!
//! Axum REST API at `/api/v1/` with bearer session authentication, envelope
//! response format and a live board WebSocket.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod router;
