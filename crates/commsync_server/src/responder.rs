//! Authoritative ping reconciliation.

use crate::backend::{PingBackend, ThreadSelection};
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::negotiation::NegotiationTable;
use crate::viewer::Viewer;
use commsync_protocol::{
    is_valid_date, most_recent_message_timestamp, most_recent_update_timestamp, Clock,
    FetchMessagesRequest, FetchMessagesResponse, PingRequest, PingResponse, ThreadId,
    TruncationStatus, UpdatesResult, UserId, UserInfo,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Computes ping responses against a `PingBackend`.
///
/// One call runs in three steps:
/// 1. Validation. Failures return `InvalidParameters` or `NotLoggedIn`
///    before anything is written.
/// 2. Negotiation writes, the five reads, the activity stamp and the
///    delivered-update stamp, all joined concurrently. Any failure aborts
///    the call.
/// 3. Watermark computation and assembly.
pub struct PingResponder<B> {
    config: ServerConfig,
    backend: Arc<B>,
    clock: Arc<dyn Clock>,
    negotiation: NegotiationTable,
}

impl<B: PingBackend> PingResponder<B> {
    /// Creates a responder with the standard negotiation table.
    pub fn new(config: ServerConfig, backend: Arc<B>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            backend,
            clock,
            negotiation: NegotiationTable::standard(),
        }
    }

    /// Replaces the negotiation table.
    pub fn with_negotiation(mut self, negotiation: NegotiationTable) -> Self {
        self.negotiation = negotiation;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the backend.
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Answers one ping for `viewer`.
    pub async fn respond(
        &self,
        viewer: &Viewer,
        request: &PingRequest,
    ) -> ServerResult<PingResponse> {
        let since = request.messages_cursor().ok_or_else(|| {
            ServerError::InvalidParameters("messagesCurrentAsOf or lastPing required".into())
        })?;
        self.validate_query(request).await?;
        let plan = self.negotiation.plan(viewer, request.client_responses())?;

        let selection = ThreadSelection {
            watched: request.watched_ids.iter().cloned().collect(),
            joined_threads: true,
        };
        let backend = self.backend.as_ref();
        let now = self.clock.now_ms();

        let negotiate = async {
            if plan.is_empty() {
                return Ok(viewer.clone());
            }
            self.negotiation.apply(backend, viewer, &plan).await?;
            backend.fetch_viewer(&viewer.session_id).await
        };
        // The delivered-update marker is written only when something new
        // goes out, alongside the activity stamp.
        let updates = async {
            let Some(client_as_of) = request.updates_current_as_of else {
                return Ok(None);
            };
            let new_updates = backend.fetch_update_infos(viewer, client_as_of).await?;
            let current_as_of = most_recent_update_timestamp(&new_updates, client_as_of);
            if !new_updates.is_empty() {
                backend
                    .record_delivered_update(&viewer.session_id, current_as_of)
                    .await?;
            }
            Ok::<_, ServerError>(Some(UpdatesResult {
                new_updates,
                current_as_of,
            }))
        };

        let per_thread = self.config.messages_per_thread;
        let (record, messages, threads, entries, current_user_info, updates_result, ()) = tokio::try_join!(
            negotiate,
            backend.fetch_messages_since(viewer, &selection, since, per_thread),
            backend.fetch_thread_infos(viewer),
            backend.fetch_entry_infos(viewer, &request.calendar_query),
            backend.fetch_current_user_info(viewer),
            updates,
            backend.update_activity_time(viewer, now),
        )?;

        let mut truncation_statuses = messages.truncation_statuses;
        for thread_id in &request.watched_ids {
            truncation_statuses
                .entry(thread_id.clone())
                .or_insert(TruncationStatus::Unchanged);
        }

        let messages_current_as_of =
            most_recent_message_timestamp(&messages.raw_message_infos, since);
        let user_infos = merge_user_infos([
            messages.user_infos,
            entries.user_infos,
            threads.user_infos,
        ]);

        let server_requests = self.negotiation.missing(&record);

        debug!(
            session = %viewer.session_id,
            since,
            messages = messages.raw_message_infos.len(),
            threads = threads.thread_infos.len(),
            entries = entries.raw_entry_infos.len(),
            updates = updates_result.as_ref().map_or(0, |u| u.new_updates.len()),
            messages_current_as_of,
            ?server_requests,
            "ping reconciled"
        );

        Ok(PingResponse {
            thread_infos: threads.thread_infos,
            current_user_info,
            raw_message_infos: messages.raw_message_infos,
            truncation_statuses,
            messages_current_as_of,
            server_time: messages_current_as_of,
            raw_entry_infos: entries.raw_entry_infos,
            user_infos,
            updates_result,
            server_requests: (!server_requests.is_empty()).then_some(server_requests),
        })
    }

    /// Returns one page of a thread's history for `viewer`.
    ///
    /// Fails with `InvalidParameters` if the thread does not exist or the
    /// viewer cannot see it.
    pub async fn fetch_messages(
        &self,
        viewer: &Viewer,
        request: &FetchMessagesRequest,
    ) -> ServerResult<FetchMessagesResponse> {
        let page = self
            .backend
            .fetch_messages_before(
                viewer,
                &request.thread_id,
                request.before,
                self.config.messages_per_thread,
            )
            .await?;
        let truncation_status = page
            .truncation_statuses
            .get(&request.thread_id)
            .copied()
            .ok_or_else(|| {
                ServerError::InvalidParameters(format!("unknown thread {}", request.thread_id))
            })?;

        debug!(
            session = %viewer.session_id,
            thread = %request.thread_id,
            messages = page.raw_message_infos.len(),
            ?truncation_status,
            "messages fetched"
        );
        Ok(FetchMessagesResponse {
            thread_id: request.thread_id.clone(),
            raw_message_infos: page.raw_message_infos,
            truncation_status,
            user_infos: page.user_infos.into_values().collect(),
        })
    }

    async fn validate_query(&self, request: &PingRequest) -> ServerResult<()> {
        if request.watched_ids.len() > self.config.max_watched_ids {
            return Err(ServerError::InvalidParameters(format!(
                "{} watched ids exceeds limit of {}",
                request.watched_ids.len(),
                self.config.max_watched_ids
            )));
        }
        let query = &request.calendar_query;
        if !is_valid_date(&query.start_date) || !is_valid_date(&query.end_date) {
            return Err(ServerError::InvalidParameters(format!(
                "invalid date range {}..{}",
                query.start_date, query.end_date
            )));
        }
        if query.nav_id != self.config.home_nav_id
            && !self
                .backend
                .verify_thread_id(&ThreadId::new(query.nav_id.as_str()))
                .await?
        {
            return Err(ServerError::InvalidParameters(format!(
                "unknown navID {}",
                query.nav_id
            )));
        }
        Ok(())
    }
}

/// Unions user-info maps in order; later maps win on identical ids.
fn merge_user_infos<const N: usize>(maps: [BTreeMap<UserId, UserInfo>; N]) -> Vec<UserInfo> {
    let mut merged = BTreeMap::new();
    for map in maps {
        merged.extend(map);
    }
    merged.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FailPoint, MemoryStore};
    use commsync_protocol::{
        CalendarQuery, ClientResponse, ManualClock, Platform, RawMessageInfo, ServerRequest,
        SyncCursors, ThreadInfo, UpdateData, UpdateInfo,
    };

    const NOW: u64 = 50_000;

    fn fixture() -> (PingResponder<MemoryStore>, Viewer) {
        let store = MemoryStore::new();
        store.add_user("5", "ashoat");
        store.add_user("6", "jimmy");
        store.add_thread(ThreadInfo::new("1", "general", 0));
        store.add_thread(ThreadInfo::new("2", "random", 0));
        store.join_thread(&UserId::new("5"), &ThreadId::new("1"), 0);
        store.join_thread(&UserId::new("6"), &ThreadId::new("1"), 0);
        store.add_message(RawMessageInfo::text(1, "1", "5", 1_000, "hi"));
        store.add_message(RawMessageInfo::text(2, "1", "6", 2_000, "hey"));
        let viewer = store.open_session("s1", Some(UserId::new("5")));

        let responder = PingResponder::new(
            ServerConfig::default(),
            Arc::new(store),
            Arc::new(ManualClock::new(NOW)),
        );
        (responder, viewer)
    }

    fn request(messages_as_of: u64) -> PingRequest {
        PingRequest::new(
            CalendarQuery::home("2024-01-01", "2024-12-31"),
            SyncCursors::new(messages_as_of, 0),
        )
    }

    async fn register_platform(
        responder: &PingResponder<MemoryStore>,
        viewer: &mut Viewer,
        platform: Platform,
    ) {
        responder
            .backend()
            .set_session_platform(&viewer.session_id, platform)
            .await
            .unwrap();
        viewer.platform = Some(platform);
    }

    #[tokio::test]
    async fn watermark_covers_returned_messages() {
        let (responder, viewer) = fixture();

        let response = responder.respond(&viewer, &request(1_500)).await.unwrap();
        assert_eq!(response.raw_message_infos.len(), 1);
        assert_eq!(response.messages_current_as_of, 2_000);
        assert_eq!(response.server_time, 2_000);

        let response = responder.respond(&viewer, &request(9_000)).await.unwrap();
        assert!(response.raw_message_infos.is_empty());
        assert_eq!(response.messages_current_as_of, 9_000);
    }

    #[tokio::test]
    async fn legacy_last_ping_is_accepted() {
        let (responder, viewer) = fixture();
        let mut ping = request(0);
        ping.messages_current_as_of = None;
        ping.last_ping = Some(1_500);

        let response = responder.respond(&viewer, &ping).await.unwrap();
        assert_eq!(response.raw_message_infos.len(), 1);
    }

    #[tokio::test]
    async fn missing_cursor_is_rejected_before_any_write() {
        let (responder, viewer) = fixture();
        let mut ping = request(0).with_client_responses(vec![ClientResponse::Platform {
            platform: Platform::Web,
        }]);
        ping.messages_current_as_of = None;

        let err = responder.respond(&viewer, &ping).await.unwrap_err();
        assert!(matches!(err, ServerError::InvalidParameters(_)));

        let record = responder.backend().session(&viewer.session_id).unwrap();
        assert_eq!(record.last_activity, 0);
        assert_eq!(record.platform, None);
    }

    #[tokio::test]
    async fn nav_id_must_resolve() {
        let (responder, viewer) = fixture();
        let mut ping = request(0);

        ping.calendar_query.nav_id = "404".into();
        let err = responder.respond(&viewer, &ping).await.unwrap_err();
        assert_eq!(err.error_code(), "invalid_parameters");

        ping.calendar_query.nav_id = "2".into();
        assert!(responder.respond(&viewer, &ping).await.is_ok());
    }

    #[tokio::test]
    async fn watched_threads_always_get_a_status() {
        let (responder, viewer) = fixture();
        let ping = request(5_000).with_watched_ids([ThreadId::new("t1"), ThreadId::new("t2")]);

        let response = responder.respond(&viewer, &ping).await.unwrap();
        assert_eq!(
            response.truncation_statuses.get(&ThreadId::new("t1")),
            Some(&TruncationStatus::Unchanged)
        );
        assert_eq!(
            response.truncation_statuses.get(&ThreadId::new("t2")),
            Some(&TruncationStatus::Unchanged)
        );
    }

    #[tokio::test]
    async fn device_token_answer_clears_request() {
        let (responder, mut viewer) = fixture();
        register_platform(&responder, &mut viewer, Platform::Ios).await;

        let response = responder.respond(&viewer, &request(0)).await.unwrap();
        assert_eq!(response.server_requests(), &[ServerRequest::DeviceToken]);

        let ping = request(0).with_client_responses(vec![ClientResponse::DeviceToken {
            device_token: "x".into(),
        }]);
        let response = responder.respond(&viewer, &ping).await.unwrap();
        assert!(!response.server_requests().contains(&ServerRequest::DeviceToken));
        assert_eq!(response.server_requests, None);
    }

    #[tokio::test]
    async fn platform_and_token_in_one_batch() {
        let (responder, viewer) = fixture();

        let response = responder.respond(&viewer, &request(0)).await.unwrap();
        assert_eq!(response.server_requests(), &[ServerRequest::Platform]);

        let ping = request(0).with_client_responses(vec![
            ClientResponse::Platform {
                platform: Platform::Android,
            },
            ClientResponse::DeviceToken {
                device_token: "fcm".into(),
            },
        ]);
        let response = responder.respond(&viewer, &ping).await.unwrap();
        assert!(response.server_requests().is_empty());

        let record = responder.backend().session(&viewer.session_id).unwrap();
        assert_eq!(record.platform, Some(Platform::Android));
        assert_eq!(record.device_token.as_deref(), Some("fcm"));
    }

    #[tokio::test]
    async fn anonymous_device_token_is_rejected() {
        let (responder, _) = fixture();
        let mut viewer = responder.backend().open_session("anon", None);
        register_platform(&responder, &mut viewer, Platform::Ios).await;

        let ping = request(0).with_client_responses(vec![ClientResponse::DeviceToken {
            device_token: "x".into(),
        }]);
        let err = responder.respond(&viewer, &ping).await.unwrap_err();
        assert!(matches!(err, ServerError::NotLoggedIn));
        assert!(responder
            .backend()
            .session(&viewer.session_id)
            .unwrap()
            .device_token
            .is_none());
    }

    #[tokio::test]
    async fn delivered_update_recorded_only_when_updates_returned() {
        let (responder, viewer) = fixture();
        let user = UserId::new("5");

        let mut ping = request(0);
        ping.updates_current_as_of = Some(100);
        let response = responder.respond(&viewer, &ping).await.unwrap();
        let updates = response.updates_result.unwrap();
        assert!(updates.new_updates.is_empty());
        assert_eq!(updates.current_as_of, 100);
        assert_eq!(
            responder.backend().session(&viewer.session_id).unwrap().last_delivered_update,
            0
        );

        responder.backend().add_update(
            &user,
            UpdateInfo {
                id: 1,
                time: 700,
                data: UpdateData::UpdateThreadReadStatus {
                    thread_id: ThreadId::new("1"),
                    unread: false,
                },
            },
        );
        let response = responder.respond(&viewer, &ping).await.unwrap();
        assert_eq!(response.updates_result.unwrap().current_as_of, 700);
        assert_eq!(
            responder.backend().session(&viewer.session_id).unwrap().last_delivered_update,
            700
        );
    }

    #[tokio::test]
    async fn update_log_skipped_without_cursor() {
        let (responder, viewer) = fixture();
        let mut ping = request(0);
        ping.updates_current_as_of = None;

        let response = responder.respond(&viewer, &ping).await.unwrap();
        assert!(response.updates_result.is_none());
    }

    #[tokio::test]
    async fn activity_is_stamped() {
        let (responder, viewer) = fixture();
        responder.respond(&viewer, &request(0)).await.unwrap();
        let record = responder.backend().session(&viewer.session_id).unwrap();
        assert_eq!(record.last_activity, NOW);
    }

    #[tokio::test]
    async fn any_fetch_failure_fails_the_call() {
        for point in [
            FailPoint::Messages,
            FailPoint::Threads,
            FailPoint::Entries,
            FailPoint::CurrentUser,
            FailPoint::ActivityTime,
        ] {
            let (responder, viewer) = fixture();
            responder.backend().fail_on(point);
            let err = responder.respond(&viewer, &request(0)).await.unwrap_err();
            assert!(err.is_server_error(), "{point:?}");
        }
    }

    #[tokio::test]
    async fn delivered_update_failure_fails_the_call() {
        let (responder, viewer) = fixture();
        responder.backend().add_update(
            &UserId::new("5"),
            UpdateInfo {
                id: 1,
                time: 700,
                data: UpdateData::DeleteThread {
                    thread_id: ThreadId::new("2"),
                },
            },
        );
        responder.backend().fail_on(FailPoint::DeliveredUpdate);

        let mut ping = request(0);
        ping.updates_current_as_of = Some(100);
        let err = responder.respond(&viewer, &ping).await.unwrap_err();
        assert_eq!(err.error_code(), "database_error");

        // Without news there is nothing to write, so the call succeeds.
        ping.updates_current_as_of = Some(700);
        assert!(responder.respond(&viewer, &ping).await.is_ok());
    }

    #[tokio::test]
    async fn fetches_newest_page_of_a_thread() {
        let (responder, viewer) = fixture();
        let page = responder
            .fetch_messages(&viewer, &FetchMessagesRequest::newest("1"))
            .await
            .unwrap();
        let ids: Vec<_> = page.raw_message_infos.iter().map(|m| m.id.0).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(page.is_exhaustive());
        assert_eq!(page.user_infos.len(), 2);

        let err = responder
            .fetch_messages(&viewer, &FetchMessagesRequest::newest("404"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::InvalidParameters(_)));
    }

    #[tokio::test]
    async fn user_infos_are_deduplicated() {
        let (responder, viewer) = fixture();
        let response = responder.respond(&viewer, &request(0)).await.unwrap();

        let ids: Vec<_> = response.user_infos.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["5", "6"]);
        assert_eq!(response.user_infos[1].username.as_deref(), Some("jimmy"));
    }

    #[tokio::test]
    async fn too_many_watched_ids() {
        let (responder, viewer) = fixture();
        let responder = PingResponder {
            config: ServerConfig::new().with_max_watched_ids(1),
            ..responder
        };
        let ping = request(0).with_watched_ids([ThreadId::new("1"), ThreadId::new("2")]);
        assert!(matches!(
            responder.respond(&viewer, &ping).await,
            Err(ServerError::InvalidParameters(_))
        ));
    }

    #[test]
    fn later_user_info_wins() {
        let first = BTreeMap::from([(
            UserId::new("5"),
            UserInfo {
                id: UserId::new("5"),
                username: None,
            },
        )]);
        let second = BTreeMap::from([(
            UserId::new("5"),
            UserInfo {
                id: UserId::new("5"),
                username: Some("ashoat".into()),
            },
        )]);
        let merged = merge_user_infos([first, second]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].username.as_deref(), Some("ashoat"));
    }
}
