//! HTTP request handlers for the REST API.

pub mod auth;
pub mod message;
pub mod ws;
