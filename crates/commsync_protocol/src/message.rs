//! Message payloads and truncation bookkeeping.

use crate::ids::{EntryId, MessageId, ThreadId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// How complete the returned message history of a thread is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TruncationStatus {
    /// The full history was returned; nothing earlier exists.
    Exhaustive,
    /// Nothing new since the last sync beyond the returned delta.
    Unchanged,
    /// Only the most recent window was returned; earlier history exists.
    Truncated,
}

/// Body of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageContent {
    /// Plain text.
    Text {
        /// Message text.
        text: String,
    },
    /// The thread was created.
    CreateThread,
    /// Members were added.
    AddMembers {
        /// Newly added members.
        #[serde(rename = "addedUserIDs")]
        added_user_ids: Vec<UserId>,
    },
    /// A calendar entry was created.
    CreateEntry {
        /// The new entry.
        #[serde(rename = "entryID")]
        entry_id: EntryId,
        /// Entry date (`YYYY-MM-DD`).
        date: String,
        /// Entry text.
        text: String,
    },
}

/// A message as stored on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessageInfo {
    /// Server-assigned id.
    pub id: MessageId,
    /// Thread the message belongs to.
    #[serde(rename = "threadID")]
    pub thread_id: ThreadId,
    /// Author.
    #[serde(rename = "creatorID")]
    pub creator_id: UserId,
    /// Server timestamp of the message.
    pub time: Timestamp,
    /// Message body.
    pub content: MessageContent,
}

impl RawMessageInfo {
    /// Creates a text message.
    pub fn text(
        id: u64,
        thread_id: impl Into<ThreadId>,
        creator_id: impl Into<UserId>,
        time: Timestamp,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: MessageId(id),
            thread_id: thread_id.into(),
            creator_id: creator_id.into(),
            time,
            content: MessageContent::Text { text: text.into() },
        }
    }
}

/// Returns the latest timestamp among `messages`, or `previous` if it is
/// later. The result never regresses below `previous`.
pub fn most_recent_message_timestamp(messages: &[RawMessageInfo], previous: Timestamp) -> Timestamp {
    messages
        .iter()
        .map(|message| message.time)
        .fold(previous, Timestamp::max)
}
