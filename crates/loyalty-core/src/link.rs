//! Short-link records.
//!
//! Only the soft-delete flag is managed by the ledger; creating and resolving
//! links belongs to the shortener that shares the store.

use serde::{Deserialize, Serialize};

use crate::UserId;

/// A shortened URL owned by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortLink {
    /// Public identifier of the link.
    pub slug: String,

    /// Target URL.
    pub url: String,

    /// Owner of the link.
    pub user_id: UserId,

    /// Set once and never cleared.
    pub deleted: bool,
}

impl ShortLink {
    /// Create a live link.
    #[must_use]
    pub fn new(slug: impl Into<String>, url: impl Into<String>, user_id: UserId) -> Self {
        Self {
            slug: slug.into(),
            url: url.into(),
            user_id,
            deleted: false,
        }
    }
}
