//! Server-side update log entries.

use crate::ids::{ThreadId, Timestamp, UserId};
use crate::thread::ThreadInfo;
use serde::{Deserialize, Serialize};

/// What an update-log entry tells the client to change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateData {
    /// A user account was deleted.
    DeleteAccount {
        /// The deleted user.
        #[serde(rename = "deletedUserID")]
        deleted_user_id: UserId,
    },
    /// Thread metadata changed.
    UpdateThread {
        /// New metadata.
        #[serde(rename = "threadInfo")]
        thread_info: ThreadInfo,
    },
    /// The viewer's unread flag changed.
    UpdateThreadReadStatus {
        /// Affected thread.
        #[serde(rename = "threadID")]
        thread_id: ThreadId,
        /// New unread flag.
        unread: bool,
    },
    /// The thread was deleted.
    DeleteThread {
        /// Deleted thread.
        #[serde(rename = "threadID")]
        thread_id: ThreadId,
    },
    /// The viewer joined a thread.
    JoinThread {
        /// Metadata of the joined thread.
        #[serde(rename = "threadInfo")]
        thread_info: ThreadInfo,
    },
}

/// One entry of a viewer's update log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateInfo {
    /// Update id.
    pub id: u64,
    /// Time the update was recorded.
    pub time: Timestamp,
    /// Update payload.
    pub data: UpdateData,
}

/// Update-log delta returned when the client supplied an update cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatesResult {
    /// Updates newer than the client's cursor.
    pub new_updates: Vec<UpdateInfo>,
    /// New update cursor.
    pub current_as_of: Timestamp,
}

/// Returns the latest timestamp among `updates`, or `previous` if it is
/// later. The result never regresses below `previous`.
pub fn most_recent_update_timestamp(updates: &[UpdateInfo], previous: Timestamp) -> Timestamp {
    updates
        .iter()
        .map(|update| update.time)
        .fold(previous, Timestamp::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_wire_format() {
        let update = UpdateInfo {
            id: 1,
            time: 500,
            data: UpdateData::DeleteThread {
                thread_id: ThreadId::new("9"),
            },
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["data"]["type"], "DELETE_THREAD");
        assert_eq!(json["data"]["threadID"], "9");
    }

    #[test]
    fn most_recent_update() {
        let updates = vec![UpdateInfo {
            id: 1,
            time: 500,
            data: UpdateData::DeleteAccount {
                deleted_user_id: UserId::new("3"),
            },
        }];
        assert_eq!(most_recent_update_timestamp(&updates, 100), 500);
        assert_eq!(most_recent_update_timestamp(&updates, 900), 900);
        assert_eq!(most_recent_update_timestamp(&[], 7), 7);
    }
}
