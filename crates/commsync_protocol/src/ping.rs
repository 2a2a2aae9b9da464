//! Ping request and response.

use crate::entry::{CalendarQuery, RawEntryInfo};
use crate::ids::{ThreadId, Timestamp};
use crate::message::{RawMessageInfo, TruncationStatus};
use crate::request::{ClientResponse, ServerRequest};
use crate::thread::ThreadInfo;
use crate::update::UpdatesResult;
use crate::user::{CurrentUserInfo, UserInfo};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Client watermarks. Both fields only ever move forward within a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncCursors {
    /// Messages up to this time have been received.
    pub messages_current_as_of: Timestamp,
    /// Update-log entries up to this time have been received.
    pub updates_current_as_of: Timestamp,
}

impl SyncCursors {
    /// Creates cursors at the given positions.
    pub fn new(messages_current_as_of: Timestamp, updates_current_as_of: Timestamp) -> Self {
        Self {
            messages_current_as_of,
            updates_current_as_of,
        }
    }

    /// Advances the cursors from a response. Older values are ignored, so
    /// responses may be applied in any order.
    pub fn advance(&mut self, response: &PingResponse) {
        self.messages_current_as_of = self
            .messages_current_as_of
            .max(response.messages_current_as_of);
        if let Some(updates) = &response.updates_result {
            self.updates_current_as_of = self.updates_current_as_of.max(updates.current_as_of);
        }
    }
}

/// The recurring client→server sync request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingRequest {
    /// Calendar view whose entries should be returned.
    pub calendar_query: CalendarQuery,
    /// Deprecated message cursor, used only without `messages_current_as_of`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_ping: Option<Timestamp>,
    /// Message cursor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages_current_as_of: Option<Timestamp>,
    /// Update-log cursor; the update log is only read when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updates_current_as_of: Option<Timestamp>,
    /// Threads the client wants deltas for even when not open.
    #[serde(rename = "watchedIDs")]
    pub watched_ids: Vec<ThreadId>,
    /// Answers to earlier server requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_responses: Option<Vec<ClientResponse>>,
}

impl PingRequest {
    /// Creates a request from the client's cursors.
    pub fn new(calendar_query: CalendarQuery, cursors: SyncCursors) -> Self {
        Self {
            calendar_query,
            last_ping: None,
            messages_current_as_of: Some(cursors.messages_current_as_of),
            updates_current_as_of: Some(cursors.updates_current_as_of),
            watched_ids: Vec::new(),
            client_responses: None,
        }
    }

    /// Sets the watched thread ids.
    pub fn with_watched_ids(mut self, watched_ids: impl IntoIterator<Item = ThreadId>) -> Self {
        self.watched_ids = watched_ids.into_iter().collect();
        self
    }

    /// Attaches negotiation answers. An empty list is omitted.
    pub fn with_client_responses(mut self, responses: Vec<ClientResponse>) -> Self {
        self.client_responses = if responses.is_empty() {
            None
        } else {
            Some(responses)
        };
        self
    }

    /// Returns the effective message cursor: `messages_current_as_of`,
    /// falling back to the legacy `last_ping`.
    pub fn messages_cursor(&self) -> Option<Timestamp> {
        self.messages_current_as_of.or(self.last_ping)
    }

    /// Returns the negotiation answers, or an empty slice.
    pub fn client_responses(&self) -> &[ClientResponse] {
        self.client_responses.as_deref().unwrap_or_default()
    }
}

/// The server's reconciliation result for one ping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingResponse {
    /// All threads visible to the viewer.
    pub thread_infos: BTreeMap<ThreadId, ThreadInfo>,
    /// The viewer's own account.
    pub current_user_info: CurrentUserInfo,
    /// New messages across selected threads.
    pub raw_message_infos: Vec<RawMessageInfo>,
    /// Per-thread completeness of `raw_message_infos`.
    pub truncation_statuses: BTreeMap<ThreadId, TruncationStatus>,
    /// New message cursor.
    pub messages_current_as_of: Timestamp,
    /// Server time, equal to `messages_current_as_of`.
    pub server_time: Timestamp,
    /// Calendar entries matching the request's query.
    pub raw_entry_infos: Vec<RawEntryInfo>,
    /// Users referenced by the payload, deduplicated by id.
    pub user_infos: Vec<UserInfo>,
    /// Update-log delta, if the request carried an update cursor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updates_result: Option<UpdatesResult>,
    /// Items the server still needs from the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_requests: Option<Vec<ServerRequest>>,
}

impl PingResponse {
    /// Returns the server requests, or an empty slice.
    pub fn server_requests(&self) -> &[ServerRequest] {
        self.server_requests.as_deref().unwrap_or_default()
    }
}

/// Structured error body, e.g. `{"error": "invalid_parameters"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code.
    pub error: String,
}

impl ErrorResponse {
    /// Creates an error body.
    pub fn new(code: impl Into<String>) -> Self {
        Self { error: code.into() }
    }
}

/// Either a response or an error body, as sent over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Outcome<T> {
    /// Successful call.
    Success(Box<T>),
    /// Rejected or failed call; no partial payload.
    Failure(ErrorResponse),
}

impl<T> Outcome<T> {
    /// Converts into a `Result`.
    pub fn into_result(self) -> Result<T, ErrorResponse> {
        match self {
            Outcome::Success(response) => Ok(*response),
            Outcome::Failure(error) => Err(error),
        }
    }
}

/// Outcome of a ping.
pub type PingOutcome = Outcome<PingResponse>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::CurrentUserInfo;
    use serde_json::json;

    fn response(messages_as_of: Timestamp, updates_as_of: Option<Timestamp>) -> PingResponse {
        PingResponse {
            thread_infos: BTreeMap::new(),
            current_user_info: CurrentUserInfo::logged_in("5", "ashoat"),
            raw_message_infos: Vec::new(),
            truncation_statuses: BTreeMap::new(),
            messages_current_as_of: messages_as_of,
            server_time: messages_as_of,
            raw_entry_infos: Vec::new(),
            user_infos: Vec::new(),
            updates_result: updates_as_of.map(|current_as_of| UpdatesResult {
                new_updates: Vec::new(),
                current_as_of,
            }),
            server_requests: None,
        }
    }

    #[test]
    fn legacy_cursor_fallback() {
        let mut request = PingRequest::new(
            CalendarQuery::home("2024-01-01", "2024-01-31"),
            SyncCursors::default(),
        );
        request.messages_current_as_of = None;
        assert_eq!(request.messages_cursor(), None);

        request.last_ping = Some(10);
        assert_eq!(request.messages_cursor(), Some(10));

        request.messages_current_as_of = Some(20);
        assert_eq!(request.messages_cursor(), Some(20));
    }

    #[test]
    fn request_wire_format() {
        let request = PingRequest::new(
            CalendarQuery::home("2024-01-01", "2024-01-31"),
            SyncCursors::new(100, 50),
        )
        .with_watched_ids([ThreadId::new("1")])
        .with_client_responses(Vec::new());

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messagesCurrentAsOf"], json!(100));
        assert_eq!(json["updatesCurrentAsOf"], json!(50));
        assert_eq!(json["watchedIDs"], json!(["1"]));
        assert!(json.get("clientResponses").is_none());
        assert!(json.get("lastPing").is_none());
    }

    #[test]
    fn cursors_never_regress() {
        let mut cursors = SyncCursors::new(100, 100);
        cursors.advance(&response(50, Some(40)));
        assert_eq!(cursors, SyncCursors::new(100, 100));

        cursors.advance(&response(150, None));
        assert_eq!(cursors, SyncCursors::new(150, 100));

        cursors.advance(&response(150, Some(300)));
        assert_eq!(cursors, SyncCursors::new(150, 300));
    }

    #[test]
    fn outcome_decodes_both_shapes() {
        let ok = serde_json::to_value(PingOutcome::Success(Box::new(response(1, None)))).unwrap();
        let decoded: PingOutcome = serde_json::from_value(ok).unwrap();
        assert!(decoded.into_result().is_ok());

        let err: PingOutcome =
            serde_json::from_value(json!({ "error": "invalid_parameters" })).unwrap();
        assert_eq!(
            err.into_result().unwrap_err(),
            ErrorResponse::new("invalid_parameters")
        );
    }
}
