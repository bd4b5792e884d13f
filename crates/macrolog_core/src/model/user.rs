//! User record.

use serde::{Deserialize, Serialize};

/// Account owner of meals and targets.
///
/// Created implicitly on the first meal write for an unknown identifier;
/// the identifier itself is an opaque caller-supplied string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    /// Unique when present; registration may not have provided one.
    pub email: Option<String>,
    /// Epoch milliseconds.
    pub created_at: i64,
}
