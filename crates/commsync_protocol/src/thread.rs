//! Thread metadata.

use crate::ids::{ThreadId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// Visibility class of a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadType {
    /// Anyone in the parent community can join.
    Open,
    /// Joinable with an invitation.
    Closed,
    /// Invisible to non-members.
    Secret,
    /// Chat nested under a parent thread.
    ChatNested,
}

/// Per-viewer state attached to a thread.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadCurrentUserInfo {
    /// Whether the viewer is a member.
    pub member: bool,
    /// Whether the thread has unread messages for the viewer.
    pub unread: bool,
}

/// Thread metadata as seen by one viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadInfo {
    /// Thread id.
    pub id: ThreadId,
    /// Display name.
    pub name: String,
    /// Hex color without `#`.
    pub color: String,
    /// Visibility class.
    #[serde(rename = "type")]
    pub thread_type: ThreadType,
    /// Parent thread, if nested.
    #[serde(rename = "parentThreadID", default, skip_serializing_if = "Option::is_none")]
    pub parent_thread_id: Option<ThreadId>,
    /// Creation time.
    pub creation_time: Timestamp,
    /// Member user ids.
    pub members: Vec<UserId>,
    /// Viewer-specific state.
    pub current_user: ThreadCurrentUserInfo,
}

impl ThreadInfo {
    /// Creates an open thread with no members.
    pub fn new(id: impl Into<ThreadId>, name: impl Into<String>, creation_time: Timestamp) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: "4b87aa".into(),
            thread_type: ThreadType::Open,
            parent_thread_id: None,
            creation_time,
            members: Vec::new(),
            current_user: ThreadCurrentUserInfo::default(),
        }
    }

    /// Returns true if `user` is a member.
    pub fn has_member(&self, user: &UserId) -> bool {
        self.members.iter().any(|member| member == user)
    }
}
