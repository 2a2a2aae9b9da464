//! Client cache of synchronized state and per-thread bookkeeping.

use commsync_protocol::{
    CalendarQuery, ClientResponse, CurrentUserInfo, EntryId, FetchMessagesResponse, PingRequest,
    PingResponse,
    RawEntryInfo, RawMessageInfo, SyncCursors, ThreadId, ThreadInfo, Timestamp,
    TruncationStatus, UpdateData, UpdateInfo, UserId, UserInfo,
};
use std::collections::{BTreeMap, BTreeSet};

/// Sync bookkeeping for one thread known to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadSyncState {
    /// Last time the thread was opened. `0` if never.
    pub last_navigated_to: Timestamp,
    /// Last time the cached backlog was evicted.
    pub last_pruned: Timestamp,
    /// Cached backlog ordered by message id, newest last.
    pub messages: Vec<RawMessageInfo>,
    /// Completeness of the cached backlog.
    pub truncation_status: TruncationStatus,
}

impl ThreadSyncState {
    /// Creates the record of a thread first seen at `now`.
    pub fn new(now: Timestamp) -> Self {
        Self {
            last_navigated_to: 0,
            last_pruned: now,
            messages: Vec::new(),
            truncation_status: TruncationStatus::Truncated,
        }
    }

    fn replace(&mut self, messages: Vec<RawMessageInfo>) {
        self.messages = messages;
        self.messages.sort_by_key(|m| m.id);
        self.messages.dedup_by_key(|m| m.id);
    }

    fn append(&mut self, messages: impl IntoIterator<Item = RawMessageInfo>) {
        for message in messages {
            match self.messages.binary_search_by_key(&message.id, |m| m.id) {
                Ok(existing) => self.messages[existing] = message,
                Err(at) => self.messages.insert(at, message),
            }
        }
    }
}

/// Counts from one merged ping response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Messages received.
    pub messages: usize,
    /// Threads that got a new sync record.
    pub new_threads: usize,
    /// Update-log entries applied.
    pub updates: usize,
}

/// Everything the client has synchronized, plus per-thread bookkeeping.
///
/// The store is pure data: merging, navigation and pruning are explicit
/// calls, and it never schedules anything itself.
#[derive(Debug, Clone)]
pub struct ThreadCursorStore {
    cursors: SyncCursors,
    calendar_query: CalendarQuery,
    watched: BTreeSet<ThreadId>,
    threads: BTreeMap<ThreadId, ThreadSyncState>,
    thread_infos: BTreeMap<ThreadId, ThreadInfo>,
    entries: BTreeMap<EntryId, RawEntryInfo>,
    user_infos: BTreeMap<UserId, UserInfo>,
    current_user: Option<CurrentUserInfo>,
}

impl ThreadCursorStore {
    /// Creates an empty store that will query `calendar_query`.
    pub fn new(calendar_query: CalendarQuery) -> Self {
        Self {
            cursors: SyncCursors::default(),
            calendar_query,
            watched: BTreeSet::new(),
            threads: BTreeMap::new(),
            thread_infos: BTreeMap::new(),
            entries: BTreeMap::new(),
            user_infos: BTreeMap::new(),
            current_user: None,
        }
    }

    /// Returns the sync cursors.
    pub fn cursors(&self) -> SyncCursors {
        self.cursors
    }

    /// Returns the calendar query sent with each ping.
    pub fn calendar_query(&self) -> &CalendarQuery {
        &self.calendar_query
    }

    /// Replaces the calendar query.
    pub fn set_calendar_query(&mut self, query: CalendarQuery) {
        self.calendar_query = query;
    }

    /// Adds a thread to the watched set.
    pub fn watch(&mut self, thread_id: ThreadId) {
        self.watched.insert(thread_id);
    }

    /// Removes a thread from the watched set.
    pub fn unwatch(&mut self, thread_id: &ThreadId) {
        self.watched.remove(thread_id);
    }

    /// Returns the watched threads.
    pub fn watched(&self) -> &BTreeSet<ThreadId> {
        &self.watched
    }

    /// Returns the sync record of a thread.
    pub fn thread(&self, thread_id: &ThreadId) -> Option<&ThreadSyncState> {
        self.threads.get(thread_id)
    }

    /// Returns all sync records.
    pub fn threads(&self) -> &BTreeMap<ThreadId, ThreadSyncState> {
        &self.threads
    }

    /// Returns cached thread metadata.
    pub fn thread_infos(&self) -> &BTreeMap<ThreadId, ThreadInfo> {
        &self.thread_infos
    }

    /// Returns cached calendar entries.
    pub fn entries(&self) -> &BTreeMap<EntryId, RawEntryInfo> {
        &self.entries
    }

    /// Returns cached user infos.
    pub fn user_infos(&self) -> &BTreeMap<UserId, UserInfo> {
        &self.user_infos
    }

    /// Returns the viewer's own account, once known.
    pub fn current_user(&self) -> Option<&CurrentUserInfo> {
        self.current_user.as_ref()
    }

    /// Inserts a sync record directly. Used when restoring persisted state.
    pub fn insert_thread(&mut self, thread_id: ThreadId, state: ThreadSyncState) {
        self.threads.insert(thread_id, state);
    }

    /// Builds the next ping from the current cursors.
    pub fn ping_request(&self, client_responses: Vec<ClientResponse>) -> PingRequest {
        PingRequest::new(self.calendar_query.clone(), self.cursors)
            .with_watched_ids(self.watched.iter().cloned())
            .with_client_responses(client_responses)
    }

    /// Merges a ping response received at `now`.
    ///
    /// Cursors only move forward, so stale or duplicated responses are
    /// harmless. A `Truncated` or `Exhaustive` thread has its backlog
    /// replaced by the returned window; an `Unchanged` thread has the
    /// returned messages appended.
    pub fn merge_ping_response(&mut self, response: &PingResponse, now: Timestamp) -> MergeSummary {
        let mut summary = MergeSummary {
            messages: response.raw_message_infos.len(),
            ..MergeSummary::default()
        };
        self.cursors.advance(response);

        for (thread_id, info) in &response.thread_infos {
            self.thread_infos.insert(thread_id.clone(), info.clone());
            summary.new_threads += usize::from(self.ensure_thread(thread_id, now));
        }

        let mut by_thread: BTreeMap<&ThreadId, Vec<RawMessageInfo>> = BTreeMap::new();
        for message in &response.raw_message_infos {
            by_thread
                .entry(&message.thread_id)
                .or_default()
                .push(message.clone());
        }
        for (thread_id, status) in &response.truncation_statuses {
            let messages = by_thread.remove(thread_id).unwrap_or_default();
            if messages.is_empty() && !self.threads.contains_key(thread_id) {
                continue;
            }
            summary.new_threads += usize::from(self.ensure_thread(thread_id, now));
            if let Some(state) = self.threads.get_mut(thread_id) {
                match status {
                    TruncationStatus::Truncated | TruncationStatus::Exhaustive => {
                        state.replace(messages);
                        state.truncation_status = *status;
                    }
                    TruncationStatus::Unchanged => state.append(messages),
                }
            }
        }
        for (thread_id, messages) in by_thread {
            summary.new_threads += usize::from(self.ensure_thread(thread_id, now));
            if let Some(state) = self.threads.get_mut(thread_id) {
                state.append(messages);
            }
        }

        for entry in &response.raw_entry_infos {
            self.entries.insert(entry.id.clone(), entry.clone());
        }
        for user in &response.user_infos {
            self.user_infos.insert(user.id.clone(), user.clone());
        }
        self.current_user = Some(response.current_user_info.clone());

        if let Some(updates) = &response.updates_result {
            for update in &updates.new_updates {
                self.apply_update(update, now);
            }
            summary.updates = updates.new_updates.len();
        }
        summary
    }

    fn ensure_thread(&mut self, thread_id: &ThreadId, now: Timestamp) -> bool {
        if self.threads.contains_key(thread_id) {
            return false;
        }
        self.threads
            .insert(thread_id.clone(), ThreadSyncState::new(now));
        true
    }

    fn apply_update(&mut self, update: &UpdateInfo, now: Timestamp) {
        match &update.data {
            UpdateData::DeleteAccount { deleted_user_id } => {
                self.user_infos.remove(deleted_user_id);
            }
            UpdateData::UpdateThread { thread_info } => {
                self.thread_infos
                    .insert(thread_info.id.clone(), thread_info.clone());
            }
            UpdateData::UpdateThreadReadStatus { thread_id, unread } => {
                if let Some(info) = self.thread_infos.get_mut(thread_id) {
                    info.current_user.unread = *unread;
                }
            }
            UpdateData::DeleteThread { thread_id } => {
                self.threads.remove(thread_id);
                self.thread_infos.remove(thread_id);
                self.watched.remove(thread_id);
            }
            UpdateData::JoinThread { thread_info } => {
                self.thread_infos
                    .insert(thread_info.id.clone(), thread_info.clone());
                self.ensure_thread(&thread_info.id, now);
            }
        }
    }

    /// Merges an explicitly fetched page of older history. Only a backfill
    /// that reached the start of the thread marks it `Exhaustive`.
    pub fn apply_backfill(
        &mut self,
        thread_id: &ThreadId,
        messages: Vec<RawMessageInfo>,
        exhaustive: bool,
        now: Timestamp,
    ) {
        self.ensure_thread(thread_id, now);
        if let Some(state) = self.threads.get_mut(thread_id) {
            state.append(messages);
            if exhaustive {
                state.truncation_status = TruncationStatus::Exhaustive;
            }
        }
    }

    /// Records that the user opened a thread at `now`.
    ///
    /// Returns true when a known thread has no cached backlog and is not
    /// known to be complete, so its history must be fetched again. A thread
    /// seen for the first time waits for the next ping instead.
    pub fn navigate_to(&mut self, thread_id: &ThreadId, now: Timestamp) -> bool {
        let first_seen = self.ensure_thread(thread_id, now);
        let Some(state) = self.threads.get_mut(thread_id) else {
            return false;
        };
        state.last_navigated_to = now;
        !first_seen
            && state.messages.is_empty()
            && state.truncation_status == TruncationStatus::Truncated
    }

    /// Merges a fetched page of a thread's history. Pages for threads
    /// deleted while the fetch was in flight are dropped. Returns the
    /// number of messages merged.
    pub fn merge_fetched_messages(
        &mut self,
        page: &FetchMessagesResponse,
        now: Timestamp,
    ) -> usize {
        if !self.threads.contains_key(&page.thread_id) {
            return 0;
        }
        for user in &page.user_infos {
            self.user_infos.insert(user.id.clone(), user.clone());
        }
        self.apply_backfill(
            &page.thread_id,
            page.raw_message_infos.clone(),
            page.is_exhaustive(),
            now,
        );
        page.raw_message_infos.len()
    }

    /// Evicts a thread's cached backlog. Returns false for unknown threads.
    pub fn prune_thread(&mut self, thread_id: &ThreadId, now: Timestamp) -> bool {
        let Some(state) = self.threads.get_mut(thread_id) else {
            return false;
        };
        state.messages.clear();
        state.last_pruned = now;
        state.truncation_status = TruncationStatus::Truncated;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commsync_protocol::UpdatesResult;

    fn store() -> ThreadCursorStore {
        ThreadCursorStore::new(CalendarQuery::home("2024-01-01", "2024-01-31"))
    }

    fn response(messages: Vec<RawMessageInfo>) -> PingResponse {
        let messages_current_as_of = messages.iter().map(|m| m.time).max().unwrap_or(0);
        PingResponse {
            thread_infos: BTreeMap::from([(ThreadId::new("1"), ThreadInfo::new("1", "general", 0))]),
            current_user_info: CurrentUserInfo::logged_in("5", "ashoat"),
            raw_message_infos: messages,
            truncation_statuses: BTreeMap::new(),
            messages_current_as_of,
            server_time: messages_current_as_of,
            raw_entry_infos: Vec::new(),
            user_infos: vec![UserInfo {
                id: UserId::new("5"),
                username: Some("ashoat".into()),
            }],
            updates_result: None,
            server_requests: None,
        }
    }

    fn ids(store: &ThreadCursorStore, thread: &str) -> Vec<u64> {
        store
            .thread(&ThreadId::new(thread))
            .map(|t| t.messages.iter().map(|m| m.id.0).collect())
            .unwrap_or_default()
    }

    #[test]
    fn new_threads_start_never_navigated() {
        let mut store = store();
        let summary = store.merge_ping_response(&response(vec![]), 7_000);
        assert_eq!(summary.new_threads, 1);

        let thread = store.thread(&ThreadId::new("1")).unwrap();
        assert_eq!(thread.last_navigated_to, 0);
        assert_eq!(thread.last_pruned, 7_000);
        assert_eq!(store.current_user().unwrap().username.as_deref(), Some("ashoat"));
    }

    #[test]
    fn unchanged_appends_and_truncated_replaces() {
        let mut store = store();
        let mut first = response(vec![
            RawMessageInfo::text(1, "1", "5", 100, "a"),
            RawMessageInfo::text(2, "1", "5", 200, "b"),
        ]);
        first
            .truncation_statuses
            .insert(ThreadId::new("1"), TruncationStatus::Exhaustive);
        store.merge_ping_response(&first, 1_000);
        assert_eq!(ids(&store, "1"), vec![1, 2]);

        let mut second = response(vec![
            RawMessageInfo::text(3, "1", "5", 300, "c"),
            RawMessageInfo::text(2, "1", "5", 200, "b"),
        ]);
        second
            .truncation_statuses
            .insert(ThreadId::new("1"), TruncationStatus::Unchanged);
        store.merge_ping_response(&second, 2_000);
        assert_eq!(ids(&store, "1"), vec![1, 2, 3]);
        assert_eq!(
            store.thread(&ThreadId::new("1")).unwrap().truncation_status,
            TruncationStatus::Exhaustive
        );

        let mut third = response(vec![RawMessageInfo::text(9, "1", "5", 900, "z")]);
        third
            .truncation_statuses
            .insert(ThreadId::new("1"), TruncationStatus::Truncated);
        store.merge_ping_response(&third, 3_000);
        assert_eq!(ids(&store, "1"), vec![9]);
        assert_eq!(
            store.thread(&ThreadId::new("1")).unwrap().truncation_status,
            TruncationStatus::Truncated
        );
    }

    #[test]
    fn stale_response_does_not_regress_cursors() {
        let mut store = store();
        store.merge_ping_response(&response(vec![RawMessageInfo::text(5, "1", "5", 500, "x")]), 0);
        store.merge_ping_response(&response(vec![RawMessageInfo::text(4, "1", "5", 400, "y")]), 0);
        assert_eq!(store.cursors().messages_current_as_of, 500);
        assert_eq!(ids(&store, "1"), vec![4, 5]);
    }

    #[test]
    fn unknown_thread_without_messages_gets_no_record() {
        let mut store = store();
        let mut ping = response(vec![]);
        ping.truncation_statuses
            .insert(ThreadId::new("t9"), TruncationStatus::Unchanged);
        store.merge_ping_response(&ping, 0);
        assert!(store.thread(&ThreadId::new("t9")).is_none());
    }

    #[test]
    fn updates_are_applied() {
        let mut store = store();
        store.watch(ThreadId::new("1"));
        store.merge_ping_response(&response(vec![]), 0);

        let mut ping = response(vec![]);
        ping.thread_infos.clear();
        ping.updates_result = Some(UpdatesResult {
            new_updates: vec![
                UpdateInfo {
                    id: 1,
                    time: 10,
                    data: UpdateData::JoinThread {
                        thread_info: ThreadInfo::new("2", "random", 0),
                    },
                },
                UpdateInfo {
                    id: 2,
                    time: 20,
                    data: UpdateData::DeleteThread {
                        thread_id: ThreadId::new("1"),
                    },
                },
            ],
            current_as_of: 20,
        });
        let summary = store.merge_ping_response(&ping, 50);

        assert_eq!(summary.updates, 2);
        assert_eq!(store.cursors().updates_current_as_of, 20);
        assert!(store.thread(&ThreadId::new("1")).is_none());
        assert!(!store.watched().contains(&ThreadId::new("1")));
        assert_eq!(store.thread(&ThreadId::new("2")).unwrap().last_pruned, 50);
    }

    #[test]
    fn only_exhaustive_backfill_marks_exhaustive() {
        let mut store = store();
        let thread = ThreadId::new("1");
        store.apply_backfill(&thread, vec![RawMessageInfo::text(3, "1", "5", 3, "c")], false, 0);
        assert_eq!(
            store.thread(&thread).unwrap().truncation_status,
            TruncationStatus::Truncated
        );

        store.apply_backfill(&thread, vec![RawMessageInfo::text(1, "1", "5", 1, "a")], true, 0);
        assert_eq!(ids(&store, "1"), vec![1, 3]);
        assert_eq!(
            store.thread(&thread).unwrap().truncation_status,
            TruncationStatus::Exhaustive
        );
    }

    #[test]
    fn prune_clears_backlog_but_keeps_metadata() {
        let mut store = store();
        let mut ping = response(vec![RawMessageInfo::text(1, "1", "5", 100, "a")]);
        ping.truncation_statuses
            .insert(ThreadId::new("1"), TruncationStatus::Exhaustive);
        store.merge_ping_response(&ping, 0);
        store.navigate_to(&ThreadId::new("1"), 500);

        assert!(store.prune_thread(&ThreadId::new("1"), 9_000));
        let thread = store.thread(&ThreadId::new("1")).unwrap();
        assert!(thread.messages.is_empty());
        assert_eq!(thread.last_pruned, 9_000);
        assert_eq!(thread.last_navigated_to, 500);
        assert_eq!(thread.truncation_status, TruncationStatus::Truncated);
        assert!(store.thread_infos().contains_key(&ThreadId::new("1")));
        assert!(!store.prune_thread(&ThreadId::new("nope"), 0));
    }

    #[test]
    fn navigating_to_a_pruned_thread_needs_a_refetch() {
        let mut store = store();
        let thread = ThreadId::new("1");
        assert!(!store.navigate_to(&ThreadId::new("new"), 100));

        store.merge_ping_response(&response(vec![RawMessageInfo::text(1, "1", "5", 100, "a")]), 0);
        assert!(!store.navigate_to(&thread, 200));

        store.prune_thread(&thread, 300);
        assert!(store.navigate_to(&thread, 400));
        assert_eq!(store.thread(&thread).unwrap().last_navigated_to, 400);

        let merged = store.merge_fetched_messages(
            &FetchMessagesResponse {
                thread_id: thread.clone(),
                raw_message_infos: vec![
                    RawMessageInfo::text(1, "1", "7", 100, "a"),
                    RawMessageInfo::text(2, "1", "5", 150, "b"),
                ],
                truncation_status: TruncationStatus::Exhaustive,
                user_infos: vec![UserInfo {
                    id: UserId::new("7"),
                    username: Some("larry".into()),
                }],
            },
            500,
        );
        assert_eq!(merged, 2);
        assert_eq!(ids(&store, "1"), vec![1, 2]);
        assert_eq!(
            store.thread(&thread).unwrap().truncation_status,
            TruncationStatus::Exhaustive
        );
        assert!(store.user_infos().contains_key(&UserId::new("7")));
        assert!(!store.navigate_to(&thread, 600));
    }

    #[test]
    fn fetched_page_for_a_deleted_thread_is_dropped() {
        let mut store = store();
        let page = FetchMessagesResponse {
            thread_id: ThreadId::new("gone"),
            raw_message_infos: vec![RawMessageInfo::text(1, "gone", "5", 100, "a")],
            truncation_status: TruncationStatus::Truncated,
            user_infos: Vec::new(),
        };
        assert_eq!(store.merge_fetched_messages(&page, 0), 0);
        assert!(store.thread(&ThreadId::new("gone")).is_none());
    }

    #[test]
    fn ping_request_carries_cursors_and_watched_ids() {
        let mut store = store();
        store.watch(ThreadId::new("84"));
        store.merge_ping_response(&response(vec![RawMessageInfo::text(1, "1", "5", 100, "a")]), 0);

        let request = store.ping_request(Vec::new());
        assert_eq!(request.messages_current_as_of, Some(100));
        assert_eq!(request.watched_ids, vec![ThreadId::new("84")]);
        assert!(request.client_responses.is_none());
    }
}
