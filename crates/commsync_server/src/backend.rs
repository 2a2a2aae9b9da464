//! Collaborators the responder reads from and writes to.
//!
//! The responder never touches storage directly. Everything it needs is
//! behind `PingBackend`, so the same reconciliation logic runs against
//! the in-memory `MemoryStore` in tests and a real database in production.

use crate::error::ServerResult;
use crate::viewer::Viewer;
use async_trait::async_trait;
use commsync_protocol::{
    CalendarQuery, CurrentUserInfo, DeviceType, MessageId, Platform, RawEntryInfo,
    RawMessageInfo, SessionId, ThreadId, ThreadInfo, Timestamp, TruncationStatus, UpdateInfo, UserId, UserInfo,
};
use std::collections::{BTreeMap, BTreeSet};

/// Which threads a message fetch covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadSelection {
    /// Threads explicitly requested by the client.
    pub watched: BTreeSet<ThreadId>,
    /// Whether to include every thread the viewer is a member of.
    pub joined_threads: bool,
}

/// Result of a message delta fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessagesResult {
    /// Messages across all selected threads.
    pub raw_message_infos: Vec<RawMessageInfo>,
    /// Status per thread that had a decision to report.
    pub truncation_statuses: BTreeMap<ThreadId, TruncationStatus>,
    /// Authors of the returned messages.
    pub user_infos: BTreeMap<UserId, UserInfo>,
}

/// Result of a thread metadata fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThreadsResult {
    /// Threads visible to the viewer.
    pub thread_infos: BTreeMap<ThreadId, ThreadInfo>,
    /// Members of those threads.
    pub user_infos: BTreeMap<UserId, UserInfo>,
}

/// Result of a calendar entry fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntriesResult {
    /// Entries matching the query.
    pub raw_entry_infos: Vec<RawEntryInfo>,
    /// Authors of the returned entries.
    pub user_infos: BTreeMap<UserId, UserInfo>,
}

/// Storage operations consumed by the ping responder.
///
/// Fetches are read-only and may run concurrently. Writes target disjoint
/// per-session state; the two timestamp writes must be monotonic.
#[async_trait]
pub trait PingBackend: Send + Sync {
    /// Returns true if `thread_id` exists and the caller may navigate to it.
    async fn verify_thread_id(&self, thread_id: &ThreadId) -> ServerResult<bool>;

    /// Returns messages newer than `since` for the selected threads, at most
    /// `per_thread` per thread, with a truncation status per thread.
    async fn fetch_messages_since(
        &self,
        viewer: &Viewer,
        selection: &ThreadSelection,
        since: Timestamp,
        per_thread: usize,
    ) -> ServerResult<MessagesResult>;

    /// Returns the newest `count` messages of one thread older than
    /// `before`, or the newest page when `before` is `None`. The status is
    /// `Exhaustive` when the page reaches the start of the thread. A thread
    /// the viewer cannot see yields an empty result with no status.
    async fn fetch_messages_before(
        &self,
        viewer: &Viewer,
        thread_id: &ThreadId,
        before: Option<MessageId>,
        count: usize,
    ) -> ServerResult<MessagesResult>;

    /// Returns all threads visible to the viewer.
    async fn fetch_thread_infos(&self, viewer: &Viewer) -> ServerResult<ThreadsResult>;

    /// Returns calendar entries matching `query`.
    async fn fetch_entry_infos(
        &self,
        viewer: &Viewer,
        query: &CalendarQuery,
    ) -> ServerResult<EntriesResult>;

    /// Returns the viewer's own account info.
    async fn fetch_current_user_info(&self, viewer: &Viewer) -> ServerResult<CurrentUserInfo>;

    /// Returns update-log entries newer than `since`.
    async fn fetch_update_infos(
        &self,
        viewer: &Viewer,
        since: Timestamp,
    ) -> ServerResult<Vec<UpdateInfo>>;

    /// Stamps the viewer's last activity. Older stamps are discarded.
    async fn update_activity_time(&self, viewer: &Viewer, time: Timestamp) -> ServerResult<()>;

    /// Persists the session's last delivered update. Values not greater
    /// than the persisted one are discarded.
    async fn record_delivered_update(
        &self,
        session_id: &SessionId,
        time: Timestamp,
    ) -> ServerResult<()>;

    /// Records the platform of a session.
    async fn set_session_platform(
        &self,
        session_id: &SessionId,
        platform: Platform,
    ) -> ServerResult<()>;

    /// Records the push token of an authenticated viewer's device.
    async fn update_device_token(
        &self,
        viewer: &Viewer,
        device_token: &str,
        device_type: DeviceType,
    ) -> ServerResult<()>;

    /// Reloads the persisted viewer record of a session.
    async fn fetch_viewer(&self, session_id: &SessionId) -> ServerResult<Viewer>;
}
