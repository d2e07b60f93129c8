//! Query parameter extractors for list endpoints.

use serde::Deserialize;

/// Query parameters for `GET /messages`.
#[derive(Debug, Deserialize, Default)]
pub struct MessageListQuery {
    /// Return at most this many messages (newest first).
    pub limit: Option<usize>,
    /// Only messages by this principal.
    pub author: Option<String>,
}
