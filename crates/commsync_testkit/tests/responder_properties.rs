//! Server-side reconciliation properties, exercised through `SyncServer`.

use commsync_protocol::{
    ClientResponse, ErrorResponse, PingOutcome, PingRequest, PingResponse, Platform,
    RawMessageInfo, ServerRequest, SyncCursors, ThreadId, TruncationStatus,
};
use commsync_server::{FailPoint, MemoryStore, PingBackend, SyncServer, Viewer};
use commsync_testkit::prelude::*;
use proptest::prelude::*;
use serde_json::json;

fn success(outcome: PingOutcome) -> PingResponse {
    match outcome {
        PingOutcome::Success(response) => *response,
        PingOutcome::Failure(err) => panic!("ping failed: {}", err.error),
    }
}

fn setup() -> (SyncServer<MemoryStore>, Viewer) {
    let server = demo_server();
    let viewer = demo_viewer(server.backend());
    (server, viewer)
}

fn caught_up() -> PingRequest {
    PingRequest::new(demo_query(), SyncCursors::new(DEMO_NOW, DEMO_NOW))
}

#[tokio::test]
async fn first_ping_windows_joined_threads() {
    let (server, viewer) = setup();
    let response = success(server.handle_ping(&viewer, &initial_request()).await);

    let general = ThreadId::new("1");
    let notes = ThreadId::new("2");
    let secret = ThreadId::new("3");
    assert_eq!(
        response.truncation_statuses.get(&general),
        Some(&TruncationStatus::Truncated)
    );
    assert_eq!(
        response.truncation_statuses.get(&notes),
        Some(&TruncationStatus::Exhaustive)
    );
    assert!(!response.truncation_statuses.contains_key(&secret));
    assert!(!response.thread_infos.contains_key(&secret));

    let in_general = response
        .raw_message_infos
        .iter()
        .filter(|m| m.thread_id == general)
        .count();
    assert_eq!(in_general, 20);
    assert_eq!(response.raw_message_infos.len(), 23);

    assert_eq!(response.messages_current_as_of, DEMO_NOW - MESSAGE_SPACING);
    assert_eq!(response.server_time, response.messages_current_as_of);

    let entry_ids: Vec<_> = response
        .raw_entry_infos
        .iter()
        .map(|e| e.id.as_str())
        .collect();
    assert_eq!(entry_ids, ["e1", "e2"]);

    let updates = response
        .updates_result
        .as_ref()
        .expect("update cursor was supplied");
    assert_eq!(updates.new_updates.len(), 1);
    assert_eq!(updates.current_as_of, DEMO_NOW - 5_000);

    assert_eq!(response.server_requests(), &[ServerRequest::Platform]);

    let user_ids: Vec<_> = response.user_infos.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(user_ids, [DEMO_USER, OTHER_USER]);
}

#[tokio::test]
async fn watched_threads_without_news_report_unchanged() {
    let (server, viewer) = setup();
    let request = caught_up().with_watched_ids(["t1", "t2", "1"].map(ThreadId::new));
    let response = success(server.handle_ping(&viewer, &request).await);

    for id in ["t1", "t2", "1"] {
        assert_eq!(
            response.truncation_statuses.get(&ThreadId::new(id)),
            Some(&TruncationStatus::Unchanged),
            "missing status for {id}"
        );
    }
    assert!(response.raw_message_infos.is_empty());
    assert_eq!(response.messages_current_as_of, DEMO_NOW);
}

#[tokio::test]
async fn incremental_delta_after_new_message() {
    let (server, viewer) = setup();
    server
        .backend()
        .add_message(RawMessageInfo::text(31, "1", OTHER_USER, DEMO_NOW + 10, "late"));

    let response = success(server.handle_ping(&viewer, &caught_up()).await);
    assert_eq!(response.raw_message_infos.len(), 1);
    assert_eq!(
        response.truncation_statuses.get(&ThreadId::new("1")),
        Some(&TruncationStatus::Unchanged)
    );
    assert_eq!(response.messages_current_as_of, DEMO_NOW + 10);
}

#[tokio::test]
async fn device_token_answer_clears_request() {
    let (server, viewer) = setup();
    let store = server.backend();

    let request = caught_up().with_client_responses(vec![ClientResponse::Platform {
        platform: Platform::Ios,
    }]);
    let response = success(server.handle_ping(&viewer, &request).await);
    assert_eq!(response.server_requests(), &[ServerRequest::DeviceToken]);

    let viewer = store.fetch_viewer(&viewer.session_id).await.unwrap();
    let request = caught_up().with_client_responses(vec![ClientResponse::DeviceToken {
        device_token: "x".into(),
    }]);
    let response = success(server.handle_ping(&viewer, &request).await);
    assert!(response.server_requests.is_none());

    let record = store.session(&viewer.session_id).unwrap();
    assert_eq!(record.platform, Some(Platform::Ios));
    assert_eq!(record.device_token.as_deref(), Some("x"));
}

#[tokio::test]
async fn device_token_from_web_is_rejected() {
    let (server, viewer) = setup();
    let request = caught_up().with_client_responses(vec![
        ClientResponse::Platform {
            platform: Platform::Web,
        },
        ClientResponse::DeviceToken {
            device_token: "x".into(),
        },
    ]);
    let outcome = server.handle_ping(&viewer, &request).await;
    assert_eq!(
        outcome.into_result().unwrap_err(),
        ErrorResponse::new("invalid_parameters")
    );

    // Validation runs before any write.
    let record = server.backend().session(&viewer.session_id).unwrap();
    assert_eq!(record.platform, None);
    assert_eq!(record.last_activity, 0);
}

#[tokio::test]
async fn unknown_nav_id_is_rejected() {
    let (server, viewer) = setup();
    let mut request = caught_up();
    request.calendar_query.nav_id = "99".into();
    let outcome = server.handle_ping(&viewer, &request).await;
    assert_eq!(
        outcome.into_result().unwrap_err(),
        ErrorResponse::new("invalid_parameters")
    );

    request.calendar_query.nav_id = "2".into();
    assert!(server.handle_ping(&viewer, &request).await.into_result().is_ok());
}

#[tokio::test]
async fn raw_input_without_cursor_is_rejected() {
    let (server, viewer) = setup();
    let input = json!({
        "calendarQuery": {
            "navID": "home",
            "startDate": "2024-03-01",
            "endDate": "2024-03-31",
            "filters": []
        },
        "watchedIDs": []
    });
    let outcome = server.handle_ping_value(&viewer, input).await;
    assert_eq!(
        outcome.into_result().unwrap_err(),
        ErrorResponse::new("invalid_parameters")
    );
}

#[tokio::test]
async fn raw_input_with_legacy_cursor_is_accepted() {
    let (server, viewer) = setup();
    let input = json!({
        "calendarQuery": {
            "navID": "home",
            "startDate": "2024-03-01",
            "endDate": "2024-03-31",
            "filters": []
        },
        "lastPing": DEMO_NOW,
        "watchedIDs": ["1"]
    });
    let response = success(server.handle_ping_value(&viewer, input).await);
    assert_eq!(response.messages_current_as_of, DEMO_NOW);
    assert!(response.updates_result.is_none());
}

#[tokio::test]
async fn fetch_failure_returns_no_partial_payload() {
    let (server, viewer) = setup();
    server.backend().fail_on(FailPoint::Entries);

    let outcome = server.handle_ping(&viewer, &initial_request()).await;
    assert_eq!(
        outcome.into_result().unwrap_err(),
        ErrorResponse::new("database_error")
    );
    let record = server.backend().session(&viewer.session_id).unwrap();
    assert_eq!(record.last_delivered_update, 0);

    server.backend().clear_failures();
    assert!(server
        .handle_ping(&viewer, &initial_request())
        .await
        .into_result()
        .is_ok());
}

#[tokio::test]
async fn delivered_update_marker_only_moves_on_news() {
    let (server, viewer) = setup();
    success(server.handle_ping(&viewer, &initial_request()).await);
    let record = server.backend().session(&viewer.session_id).unwrap();
    assert_eq!(record.last_delivered_update, DEMO_NOW - 5_000);

    let response = success(server.handle_ping(&viewer, &caught_up()).await);
    let updates = response.updates_result.unwrap();
    assert!(updates.new_updates.is_empty());
    assert_eq!(updates.current_as_of, DEMO_NOW);

    let record = server.backend().session(&viewer.session_id).unwrap();
    assert_eq!(record.last_delivered_update, DEMO_NOW - 5_000);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn message_watermark_never_regresses(
        cursor in 0u64..DEMO_NOW + 1_000_000,
        watched in prop::collection::vec(thread_id_strategy(), 0..4),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let response = runtime.block_on(async {
            let (server, viewer) = setup();
            let request = PingRequest::new(demo_query(), SyncCursors::new(cursor, cursor))
                .with_watched_ids(watched);
            success(server.handle_ping(&viewer, &request).await)
        });

        prop_assert!(response.messages_current_as_of >= cursor);
        for message in &response.raw_message_infos {
            prop_assert!(response.messages_current_as_of >= message.time);
        }
        if let Some(updates) = &response.updates_result {
            prop_assert!(updates.current_as_of >= cursor);
        }
    }
}
