//! Seeded backends and common test scenarios.
//!
//! The demo world has two users, three threads and a short update log:
//!
//! | thread | type   | members | history            |
//! |--------|--------|---------|--------------------|
//! | `1`    | open   | 5, 6    | 30 messages        |
//! | `2`    | open   | 5       | 3 messages         |
//! | `3`    | secret | 6       | 2 messages         |

use commsync_protocol::{
    CalendarQuery, Clock, CurrentUserInfo, EntryId, ManualClock, PingRequest, PingResponse,
    RawEntryInfo, RawMessageInfo, SyncCursors, ThreadId, ThreadInfo, ThreadType, Timestamp,
    UpdateData, UpdateInfo, UserId,
};
use commsync_server::{MemoryStore, ServerConfig, SyncServer, Viewer};
use std::collections::BTreeMap;
use std::sync::Arc;

/// The logged-in demo user.
pub const DEMO_USER: &str = "5";

/// A second user who shares thread `1`.
pub const OTHER_USER: &str = "6";

/// Session opened for the demo user.
pub const DEMO_SESSION: &str = "demo-session";

/// Wall-clock time the demo world was seeded at.
pub const DEMO_NOW: Timestamp = 1_700_000_000_000;

/// Spacing between seeded messages.
pub const MESSAGE_SPACING: Timestamp = 60_000;

/// Returns `count` text messages in `thread_id`, ids starting at
/// `first_id`, the last one sent at `last_time`.
pub fn message_history(
    thread_id: &str,
    first_id: u64,
    count: u64,
    last_time: Timestamp,
) -> Vec<RawMessageInfo> {
    (0..count)
        .map(|i| {
            let time = last_time - (count - 1 - i) * MESSAGE_SPACING;
            let author = if i % 2 == 0 { DEMO_USER } else { OTHER_USER };
            RawMessageInfo::text(first_id + i, thread_id, author, time, format!("message {i}"))
        })
        .collect()
}

/// Returns a calendar entry on `2024-03-<day>`.
pub fn calendar_entry(id: &str, thread_id: &str, day: u8) -> RawEntryInfo {
    RawEntryInfo {
        id: EntryId::new(id),
        thread_id: ThreadId::new(thread_id),
        text: format!("entry {id}"),
        year: 2024,
        month: 3,
        day,
        creation_time: DEMO_NOW - 1_000,
        creator_id: UserId::new(DEMO_USER),
        deleted: false,
    }
}

/// Returns the home calendar query for March 2024.
pub fn demo_query() -> CalendarQuery {
    CalendarQuery::home("2024-03-01", "2024-03-31")
}

/// Returns a fresh client's first ping.
pub fn initial_request() -> PingRequest {
    PingRequest::new(demo_query(), SyncCursors::default())
}

/// Builds the demo world.
pub fn demo_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.add_user(DEMO_USER, "ashoat");
    store.add_user(OTHER_USER, "jonathan");

    let created = DEMO_NOW - 7 * 24 * 60 * 60 * 1000;
    store.add_thread(ThreadInfo::new("1", "general", created));
    store.add_thread(ThreadInfo::new("2", "notes", created));
    let mut secret = ThreadInfo::new("3", "surprise party", created);
    secret.thread_type = ThreadType::Secret;
    store.add_thread(secret);

    let user = UserId::new(DEMO_USER);
    let other = UserId::new(OTHER_USER);
    store.join_thread(&user, &ThreadId::new("1"), created);
    store.join_thread(&other, &ThreadId::new("1"), created);
    store.join_thread(&user, &ThreadId::new("2"), created);
    store.join_thread(&other, &ThreadId::new("3"), created);

    for message in message_history("1", 1, 30, DEMO_NOW - MESSAGE_SPACING)
        .into_iter()
        .chain(message_history("2", 101, 3, DEMO_NOW - MESSAGE_SPACING))
        .chain(message_history("3", 201, 2, DEMO_NOW - MESSAGE_SPACING))
    {
        store.add_message(message);
    }

    store.add_entry(calendar_entry("e1", "1", 4));
    store.add_entry(calendar_entry("e2", "2", 18));
    let mut deleted = calendar_entry("e3", "1", 20);
    deleted.deleted = true;
    store.add_entry(deleted);

    store.add_update(
        &user,
        UpdateInfo {
            id: 1,
            time: DEMO_NOW - 5_000,
            data: UpdateData::UpdateThreadReadStatus {
                thread_id: ThreadId::new("1"),
                unread: true,
            },
        },
    );
    store
}

/// Opens the demo user's session on `store`.
pub fn demo_viewer(store: &MemoryStore) -> Viewer {
    store.open_session(DEMO_SESSION, Some(UserId::new(DEMO_USER)))
}

/// Returns a server over the demo world whose clock reads `DEMO_NOW`.
pub fn demo_server() -> SyncServer<MemoryStore> {
    demo_server_with_clock(Arc::new(ManualClock::new(DEMO_NOW)))
}

/// Returns a server over the demo world using `clock`.
pub fn demo_server_with_clock(clock: Arc<dyn Clock>) -> SyncServer<MemoryStore> {
    SyncServer::with_clock(ServerConfig::default(), Arc::new(demo_store()), clock)
}

/// Returns a response carrying nothing but a message cursor.
pub fn empty_response(messages_current_as_of: Timestamp) -> PingResponse {
    PingResponse {
        thread_infos: BTreeMap::new(),
        current_user_info: CurrentUserInfo::logged_in(DEMO_USER, "ashoat"),
        raw_message_infos: Vec::new(),
        truncation_statuses: BTreeMap::new(),
        messages_current_as_of,
        server_time: messages_current_as_of,
        raw_entry_infos: Vec::new(),
        user_infos: Vec::new(),
        updates_result: None,
        server_requests: None,
    }
}
