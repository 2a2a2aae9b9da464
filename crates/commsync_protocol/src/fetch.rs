//! Explicit fetch of one thread's message history.
//!
//! Pings only carry messages newer than the client's global cursor. A
//! thread whose cached backlog was evicted gets its history back through
//! this exchange instead.

use crate::ids::{MessageId, ThreadId};
use crate::message::{RawMessageInfo, TruncationStatus};
use crate::ping::Outcome;
use crate::user::UserInfo;
use serde::{Deserialize, Serialize};

/// Asks for one page of a thread's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchMessagesRequest {
    /// Thread to read.
    #[serde(rename = "threadID")]
    pub thread_id: ThreadId,
    /// Only messages older than this one. The newest page when absent.
    #[serde(
        rename = "beforeMessageID",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub before: Option<MessageId>,
}

impl FetchMessagesRequest {
    /// Requests the newest page of `thread_id`.
    pub fn newest(thread_id: impl Into<ThreadId>) -> Self {
        Self {
            thread_id: thread_id.into(),
            before: None,
        }
    }

    /// Requests the page just older than `before`.
    pub fn before(thread_id: impl Into<ThreadId>, before: MessageId) -> Self {
        Self {
            thread_id: thread_id.into(),
            before: Some(before),
        }
    }
}

/// One page of a thread's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchMessagesResponse {
    /// Thread the page belongs to.
    #[serde(rename = "threadID")]
    pub thread_id: ThreadId,
    /// Messages ordered by id, newest last.
    pub raw_message_infos: Vec<RawMessageInfo>,
    /// `Exhaustive` when the page reaches the start of the thread,
    /// `Truncated` otherwise.
    pub truncation_status: TruncationStatus,
    /// Authors of the returned messages.
    pub user_infos: Vec<UserInfo>,
}

impl FetchMessagesResponse {
    /// Returns true if no older history remains on the server.
    pub fn is_exhaustive(&self) -> bool {
        self.truncation_status == TruncationStatus::Exhaustive
    }
}

/// Outcome of a message fetch.
pub type FetchMessagesOutcome = Outcome<FetchMessagesResponse>;
