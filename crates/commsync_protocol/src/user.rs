//! User payloads.

use crate::ids::UserId;
use serde::{Deserialize, Serialize};

/// Public information about a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    /// User id.
    pub id: UserId,
    /// Username, if the account still exists.
    pub username: Option<String>,
}

/// The viewer's own account, or an anonymous placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUserInfo {
    /// User id, or the session id for anonymous viewers.
    pub id: UserId,
    /// Username of a logged-in viewer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Whether the viewer is logged out.
    #[serde(default)]
    pub anonymous: bool,
}

impl CurrentUserInfo {
    /// Creates info for a logged-in viewer.
    pub fn logged_in(id: impl Into<UserId>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: Some(username.into()),
            anonymous: false,
        }
    }

    /// Creates info for a logged-out viewer.
    pub fn anonymous(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            username: None,
            anonymous: true,
        }
    }
}
