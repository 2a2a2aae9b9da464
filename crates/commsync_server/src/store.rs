//! In-memory reference backend.

use crate::backend::{EntriesResult, MessagesResult, PingBackend, ThreadSelection, ThreadsResult};
use crate::error::{ServerError, ServerResult};
use crate::viewer::Viewer;
use async_trait::async_trait;
use commsync_protocol::{
    CalendarQuery, CurrentUserInfo, DeviceType, MessageId, Platform, RawEntryInfo,
    RawMessageInfo, SessionId, ThreadId, ThreadInfo, ThreadType, Timestamp, TruncationStatus, UpdateInfo, UserId,
    UserInfo,
};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Backend operations that can be made to fail in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    /// `verify_thread_id`.
    VerifyThread,
    /// `fetch_messages_since` and `fetch_messages_before`.
    Messages,
    /// `fetch_thread_infos`.
    Threads,
    /// `fetch_entry_infos`.
    Entries,
    /// `fetch_current_user_info`.
    CurrentUser,
    /// `fetch_update_infos`.
    Updates,
    /// `update_activity_time`.
    ActivityTime,
    /// `record_delivered_update`.
    DeliveredUpdate,
    /// `set_session_platform` and `update_device_token`.
    Negotiation,
}

/// Persisted state of one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionRecord {
    /// Owner, if logged in.
    pub user_id: Option<UserId>,
    /// Recorded platform.
    pub platform: Option<Platform>,
    /// Recorded push token.
    pub device_token: Option<String>,
    /// Push service the token belongs to.
    pub device_type: Option<DeviceType>,
    /// Last activity stamp.
    pub last_activity: Timestamp,
    /// Last update-log time delivered to this session.
    pub last_delivered_update: Timestamp,
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<UserId, String>,
    sessions: HashMap<SessionId, SessionRecord>,
    threads: BTreeMap<ThreadId, ThreadInfo>,
    /// user -> thread -> time joined
    memberships: HashMap<UserId, BTreeMap<ThreadId, Timestamp>>,
    /// thread -> messages ordered by id
    messages: BTreeMap<ThreadId, Vec<RawMessageInfo>>,
    entries: Vec<RawEntryInfo>,
    updates: HashMap<UserId, Vec<UpdateInfo>>,
}

/// Thread-safe in-memory implementation of `PingBackend`.
///
/// Holds users, sessions, threads, memberships, messages, calendar entries
/// and per-user update logs. Used by tests, the CLI simulator and as a
/// template for real backends.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    failures: RwLock<HashSet<FailPoint>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or renames a user.
    pub fn add_user(&self, id: impl Into<UserId>, username: impl Into<String>) {
        self.tables.write().users.insert(id.into(), username.into());
    }

    /// Opens a session and returns its viewer.
    pub fn open_session(&self, session_id: impl Into<SessionId>, user_id: Option<UserId>) -> Viewer {
        let session_id = session_id.into();
        let record = SessionRecord {
            user_id: user_id.clone(),
            ..SessionRecord::default()
        };
        self.tables.write().sessions.insert(session_id.clone(), record);
        Viewer {
            session_id,
            user_id,
            platform: None,
            device_token: None,
        }
    }

    /// Returns a copy of a session record.
    pub fn session(&self, session_id: &SessionId) -> Option<SessionRecord> {
        self.tables.read().sessions.get(session_id).cloned()
    }

    /// Adds or replaces a thread.
    pub fn add_thread(&self, thread: ThreadInfo) {
        self.tables.write().threads.insert(thread.id.clone(), thread);
    }

    /// Makes `user_id` a member of `thread_id` as of `time`.
    pub fn join_thread(&self, user_id: &UserId, thread_id: &ThreadId, time: Timestamp) {
        let mut tables = self.tables.write();
        if let Some(thread) = tables.threads.get_mut(thread_id) {
            if !thread.has_member(user_id) {
                thread.members.push(user_id.clone());
            }
        }
        tables
            .memberships
            .entry(user_id.clone())
            .or_default()
            .insert(thread_id.clone(), time);
    }

    /// Stores a message, keeping each thread ordered by id.
    pub fn add_message(&self, message: RawMessageInfo) {
        let mut tables = self.tables.write();
        let thread = tables.messages.entry(message.thread_id.clone()).or_default();
        let at = thread.partition_point(|m| m.id < message.id);
        thread.insert(at, message);
    }

    /// Stores a calendar entry.
    pub fn add_entry(&self, entry: RawEntryInfo) {
        self.tables.write().entries.push(entry);
    }

    /// Appends to a user's update log.
    pub fn add_update(&self, user_id: &UserId, update: UpdateInfo) {
        self.tables
            .write()
            .updates
            .entry(user_id.clone())
            .or_default()
            .push(update);
    }

    /// Makes `point` fail until cleared.
    pub fn fail_on(&self, point: FailPoint) {
        self.failures.write().insert(point);
    }

    /// Clears all injected failures.
    pub fn clear_failures(&self) {
        self.failures.write().clear();
    }

    fn check(&self, point: FailPoint) -> ServerResult<()> {
        if self.failures.read().contains(&point) {
            Err(ServerError::Database(format!("injected failure at {point:?}")))
        } else {
            Ok(())
        }
    }

    fn user_info(tables: &Tables, id: &UserId) -> UserInfo {
        UserInfo {
            id: id.clone(),
            username: tables.users.get(id).cloned(),
        }
    }

    fn can_see(viewer: &Viewer, thread: &ThreadInfo) -> bool {
        thread.thread_type != ThreadType::Secret
            || viewer
                .user_id
                .as_ref()
                .is_some_and(|user| thread.has_member(user))
    }
}

/// Returns the delta for one thread and its status.
///
/// A thread joined after `since` is unseen: it gets the newest window, which
/// is exhaustive only if it holds the whole history. Otherwise the thread
/// gets everything newer than `since`, truncated to the newest window.
fn thread_delta(
    history: &[RawMessageInfo],
    since: Timestamp,
    unseen: bool,
    per_thread: usize,
) -> (Vec<RawMessageInfo>, TruncationStatus) {
    if unseen {
        let start = history.len().saturating_sub(per_thread);
        let status = if start > 0 {
            TruncationStatus::Truncated
        } else {
            TruncationStatus::Exhaustive
        };
        return (history[start..].to_vec(), status);
    }
    let newer: Vec<_> = history.iter().filter(|m| m.time > since).cloned().collect();
    if newer.len() > per_thread {
        let start = newer.len() - per_thread;
        (newer[start..].to_vec(), TruncationStatus::Truncated)
    } else {
        (newer, TruncationStatus::Unchanged)
    }
}

#[async_trait]
impl PingBackend for MemoryStore {
    async fn verify_thread_id(&self, thread_id: &ThreadId) -> ServerResult<bool> {
        self.check(FailPoint::VerifyThread)?;
        Ok(self.tables.read().threads.contains_key(thread_id))
    }

    async fn fetch_messages_since(
        &self,
        viewer: &Viewer,
        selection: &ThreadSelection,
        since: Timestamp,
        per_thread: usize,
    ) -> ServerResult<MessagesResult> {
        self.check(FailPoint::Messages)?;
        let tables = self.tables.read();
        let joined = viewer
            .user_id
            .as_ref()
            .and_then(|user| tables.memberships.get(user));

        let mut selected: BTreeMap<&ThreadId, bool> = BTreeMap::new();
        for id in &selection.watched {
            selected.insert(id, false);
        }
        if selection.joined_threads {
            for (id, joined_at) in joined.into_iter().flatten() {
                selected.insert(id, *joined_at > since);
            }
        }

        let mut result = MessagesResult::default();
        for (thread_id, unseen) in selected {
            let Some(thread) = tables.threads.get(thread_id) else {
                continue;
            };
            if !Self::can_see(viewer, thread) {
                continue;
            }
            let history = tables
                .messages
                .get(thread_id)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let (messages, status) = thread_delta(history, since, unseen, per_thread);
            for message in &messages {
                result
                    .user_infos
                    .entry(message.creator_id.clone())
                    .or_insert_with(|| Self::user_info(&tables, &message.creator_id));
            }
            result.raw_message_infos.extend(messages);
            result.truncation_statuses.insert(thread_id.clone(), status);
        }
        Ok(result)
    }

    async fn fetch_messages_before(
        &self,
        viewer: &Viewer,
        thread_id: &ThreadId,
        before: Option<MessageId>,
        count: usize,
    ) -> ServerResult<MessagesResult> {
        self.check(FailPoint::Messages)?;
        let tables = self.tables.read();
        let mut result = MessagesResult::default();
        let visible = tables
            .threads
            .get(thread_id)
            .is_some_and(|thread| Self::can_see(viewer, thread));
        if !visible {
            return Ok(result);
        }
        let history = tables
            .messages
            .get(thread_id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let end = before.map_or(history.len(), |before| {
            history.partition_point(|m| m.id < before)
        });
        let start = end.saturating_sub(count);
        let status = if start == 0 {
            TruncationStatus::Exhaustive
        } else {
            TruncationStatus::Truncated
        };
        for message in &history[start..end] {
            result
                .user_infos
                .entry(message.creator_id.clone())
                .or_insert_with(|| Self::user_info(&tables, &message.creator_id));
        }
        result.raw_message_infos = history[start..end].to_vec();
        result.truncation_statuses.insert(thread_id.clone(), status);
        Ok(result)
    }

    async fn fetch_thread_infos(&self, viewer: &Viewer) -> ServerResult<ThreadsResult> {
        self.check(FailPoint::Threads)?;
        let tables = self.tables.read();
        let mut result = ThreadsResult::default();
        for thread in tables.threads.values() {
            if !Self::can_see(viewer, thread) {
                continue;
            }
            let mut thread = thread.clone();
            thread.current_user.member = viewer
                .user_id
                .as_ref()
                .is_some_and(|user| thread.has_member(user));
            for member in &thread.members {
                result
                    .user_infos
                    .insert(member.clone(), Self::user_info(&tables, member));
            }
            result.thread_infos.insert(thread.id.clone(), thread);
        }
        Ok(result)
    }

    async fn fetch_entry_infos(
        &self,
        viewer: &Viewer,
        query: &CalendarQuery,
    ) -> ServerResult<EntriesResult> {
        self.check(FailPoint::Entries)?;
        let tables = self.tables.read();
        let mut result = EntriesResult::default();
        for entry in &tables.entries {
            let visible = tables
                .threads
                .get(&entry.thread_id)
                .is_some_and(|thread| Self::can_see(viewer, thread));
            if !visible || !query.matches(entry) {
                continue;
            }
            result
                .user_infos
                .insert(entry.creator_id.clone(), Self::user_info(&tables, &entry.creator_id));
            result.raw_entry_infos.push(entry.clone());
        }
        Ok(result)
    }

    async fn fetch_current_user_info(&self, viewer: &Viewer) -> ServerResult<CurrentUserInfo> {
        self.check(FailPoint::CurrentUser)?;
        let Some(user_id) = &viewer.user_id else {
            return Ok(CurrentUserInfo::anonymous(viewer.session_id.as_str()));
        };
        let tables = self.tables.read();
        let username = tables
            .users
            .get(user_id)
            .ok_or_else(|| ServerError::Database(format!("unknown user {user_id}")))?;
        Ok(CurrentUserInfo::logged_in(user_id.clone(), username.clone()))
    }

    async fn fetch_update_infos(
        &self,
        viewer: &Viewer,
        since: Timestamp,
    ) -> ServerResult<Vec<UpdateInfo>> {
        self.check(FailPoint::Updates)?;
        let Some(user_id) = &viewer.user_id else {
            return Ok(Vec::new());
        };
        let tables = self.tables.read();
        Ok(tables
            .updates
            .get(user_id)
            .map(|log| log.iter().filter(|u| u.time > since).cloned().collect())
            .unwrap_or_default())
    }

    async fn update_activity_time(&self, viewer: &Viewer, time: Timestamp) -> ServerResult<()> {
        self.check(FailPoint::ActivityTime)?;
        let mut tables = self.tables.write();
        let record = tables.sessions.entry(viewer.session_id.clone()).or_default();
        record.last_activity = record.last_activity.max(time);
        Ok(())
    }

    async fn record_delivered_update(
        &self,
        session_id: &SessionId,
        time: Timestamp,
    ) -> ServerResult<()> {
        self.check(FailPoint::DeliveredUpdate)?;
        let mut tables = self.tables.write();
        let record = tables.sessions.entry(session_id.clone()).or_default();
        if time > record.last_delivered_update {
            record.last_delivered_update = time;
        }
        Ok(())
    }

    async fn set_session_platform(
        &self,
        session_id: &SessionId,
        platform: Platform,
    ) -> ServerResult<()> {
        self.check(FailPoint::Negotiation)?;
        let mut tables = self.tables.write();
        tables.sessions.entry(session_id.clone()).or_default().platform = Some(platform);
        Ok(())
    }

    async fn update_device_token(
        &self,
        viewer: &Viewer,
        device_token: &str,
        device_type: DeviceType,
    ) -> ServerResult<()> {
        self.check(FailPoint::Negotiation)?;
        let mut tables = self.tables.write();
        let record = tables.sessions.entry(viewer.session_id.clone()).or_default();
        record.device_token = Some(device_token.to_string());
        record.device_type = Some(device_type);
        Ok(())
    }

    async fn fetch_viewer(&self, session_id: &SessionId) -> ServerResult<Viewer> {
        let tables = self.tables.read();
        let record = tables
            .sessions
            .get(session_id)
            .ok_or_else(|| ServerError::Database(format!("unknown session {session_id}")))?;
        Ok(Viewer {
            session_id: session_id.clone(),
            user_id: record.user_id.clone(),
            platform: record.platform,
            device_token: record.device_token.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commsync_protocol::UpdateData;

    fn history(count: u64) -> Vec<RawMessageInfo> {
        (1..=count)
            .map(|i| RawMessageInfo::text(i, "1", "5", i * 100, format!("m{i}")))
            .collect()
    }

    fn seeded() -> (MemoryStore, Viewer) {
        let store = MemoryStore::new();
        store.add_user("5", "ashoat");
        store.add_thread(ThreadInfo::new("1", "general", 0));
        store.join_thread(&UserId::new("5"), &ThreadId::new("1"), 0);
        for message in history(3) {
            store.add_message(message);
        }
        let viewer = store.open_session("s1", Some(UserId::new("5")));
        (store, viewer)
    }

    #[test]
    fn delta_of_known_thread() {
        let (messages, status) = thread_delta(&history(5), 300, false, 20);
        assert_eq!(messages.len(), 2);
        assert_eq!(status, TruncationStatus::Unchanged);

        let (messages, status) = thread_delta(&history(5), 0, false, 3);
        assert_eq!(
            messages.iter().map(|m| m.id.0).collect::<Vec<_>>(),
            vec![3, 4, 5]
        );
        assert_eq!(status, TruncationStatus::Truncated);
    }

    #[test]
    fn delta_of_unseen_thread() {
        let (messages, status) = thread_delta(&history(3), 10_000, true, 20);
        assert_eq!(messages.len(), 3);
        assert_eq!(status, TruncationStatus::Exhaustive);

        let (messages, status) = thread_delta(&history(30), 10_000, true, 20);
        assert_eq!(messages.len(), 20);
        assert_eq!(messages[0].id.0, 11);
        assert_eq!(status, TruncationStatus::Truncated);
    }

    #[tokio::test]
    async fn messages_are_kept_in_id_order() {
        let (store, viewer) = seeded();
        store.add_message(RawMessageInfo::text(0, "1", "5", 50, "early"));

        let selection = ThreadSelection {
            joined_threads: true,
            ..ThreadSelection::default()
        };
        let result = store
            .fetch_messages_since(&viewer, &selection, 0, 20)
            .await
            .unwrap();
        let ids: Vec<_> = result.raw_message_infos.iter().map(|m| m.id.0).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(result.user_infos.len(), 1);
    }

    #[tokio::test]
    async fn pages_backwards_through_history() {
        let (store, viewer) = seeded();
        let thread = ThreadId::new("1");

        let newest = store
            .fetch_messages_before(&viewer, &thread, None, 2)
            .await
            .unwrap();
        let ids: Vec<_> = newest.raw_message_infos.iter().map(|m| m.id.0).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(newest.truncation_statuses[&thread], TruncationStatus::Truncated);

        let older = store
            .fetch_messages_before(&viewer, &thread, Some(MessageId(2)), 2)
            .await
            .unwrap();
        let ids: Vec<_> = older.raw_message_infos.iter().map(|m| m.id.0).collect();
        assert_eq!(ids, vec![1]);
        assert_eq!(older.truncation_statuses[&thread], TruncationStatus::Exhaustive);

        let missing = store
            .fetch_messages_before(&viewer, &ThreadId::new("404"), None, 2)
            .await
            .unwrap();
        assert!(missing.truncation_statuses.is_empty());
    }

    #[tokio::test]
    async fn secret_threads_are_hidden_from_non_members() {
        let (store, member) = seeded();
        let mut secret = ThreadInfo::new("9", "secret", 0);
        secret.thread_type = ThreadType::Secret;
        store.add_thread(secret);

        let outsider = store.open_session("s2", None);
        let threads = store.fetch_thread_infos(&outsider).await.unwrap();
        assert!(threads.thread_infos.contains_key(&ThreadId::new("1")));
        assert!(!threads.thread_infos.contains_key(&ThreadId::new("9")));

        let threads = store.fetch_thread_infos(&member).await.unwrap();
        assert!(threads.thread_infos[&ThreadId::new("1")].current_user.member);
    }

    #[tokio::test]
    async fn timestamp_writes_are_monotonic() {
        let (store, viewer) = seeded();
        store.update_activity_time(&viewer, 500).await.unwrap();
        store.update_activity_time(&viewer, 200).await.unwrap();
        store
            .record_delivered_update(&viewer.session_id, 900)
            .await
            .unwrap();
        store
            .record_delivered_update(&viewer.session_id, 100)
            .await
            .unwrap();

        let record = store.session(&viewer.session_id).unwrap();
        assert_eq!(record.last_activity, 500);
        assert_eq!(record.last_delivered_update, 900);
    }

    #[tokio::test]
    async fn negotiation_writes_show_up_in_reloaded_viewer() {
        let (store, viewer) = seeded();
        store
            .set_session_platform(&viewer.session_id, Platform::Android)
            .await
            .unwrap();
        store
            .update_device_token(&viewer, "fcm-token", DeviceType::Android)
            .await
            .unwrap();

        let reloaded = store.fetch_viewer(&viewer.session_id).await.unwrap();
        assert_eq!(reloaded.platform, Some(Platform::Android));
        assert_eq!(reloaded.device_token.as_deref(), Some("fcm-token"));
    }

    #[tokio::test]
    async fn updates_since_cursor() {
        let (store, viewer) = seeded();
        let user = UserId::new("5");
        for (id, time) in [(1, 100), (2, 200)] {
            store.add_update(
                &user,
                UpdateInfo {
                    id,
                    time,
                    data: UpdateData::DeleteThread {
                        thread_id: ThreadId::new("7"),
                    },
                },
            );
        }
        assert_eq!(store.fetch_update_infos(&viewer, 100).await.unwrap().len(), 1);
        assert_eq!(store.fetch_update_infos(&viewer, 0).await.unwrap().len(), 2);

        let anonymous = store.open_session("s2", None);
        assert!(store.fetch_update_infos(&anonymous, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn injected_failures() {
        let (store, viewer) = seeded();
        store.fail_on(FailPoint::Threads);
        assert!(matches!(
            store.fetch_thread_infos(&viewer).await,
            Err(ServerError::Database(_))
        ));
        store.clear_failures();
        assert!(store.fetch_thread_infos(&viewer).await.is_ok());
    }
}
