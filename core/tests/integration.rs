//! End-to-end tests against the live mock server.
//!
//! # Design
//! Each test starts its own mock server on a random port so per-server state
//! (transcript poll counters, created classifications) never leaks between
//! tests. The client authenticates through the real discovery and credential
//! endpoints and talks to the server over HTTP with the default ureq
//! transport.

use std::time::Duration;

use enreach_core::{
    CallFilter, ClassifiedType, ClientConfig, EnreachClient, EnreachError, ErrorKind,
    NewClassification, PollPolicy, SchemaQuery, TagValue, TranscriptStatus,
};
use mock_server::{
    CALL_LIST_ID, CLASSIFIED_CALL_ID, PASSWORD, QUEUE_ID, RATE_LIMITED_CALL_ID, RECORDING_ID,
    RETRY_AFTER_SECS, SCHEMA_ID, SECRET_KEY, TRANSCRIPT_READY, TRANSCRIPT_SLOW, TRANSCRIPT_STUCK,
    USERNAME, USER_ID,
};
use uuid::Uuid;

/// Start the mock server on a random port and return its base URL.
fn spawn_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn fast_polling() -> PollPolicy {
    PollPolicy::new(Duration::from_millis(10), Duration::from_millis(500))
}

fn connect(base: &str) -> EnreachClient {
    let config = ClientConfig::builder(USERNAME)
        .secret_key(SECRET_KEY)
        .discovery_url(base)
        .transcript_poll(fast_polling())
        .build()
        .unwrap();
    EnreachClient::connect(&config).unwrap()
}

// --- authentication ---

#[test]
fn secret_key_and_password_sessions_agree() {
    let base = spawn_server();

    let by_key = connect(&base);
    let config = ClientConfig::builder(USERNAME)
        .password(PASSWORD)
        .discovery_url(&base)
        .build()
        .unwrap();
    let by_password = EnreachClient::connect(&config).unwrap();

    for client in [&by_key, &by_password] {
        let session = client.session();
        assert_eq!(session.endpoint, base);
        assert_eq!(session.user_id, USER_ID);
        assert_eq!(session.secret_key, SECRET_KEY);
    }
}

#[test]
fn explicit_endpoint_skips_discovery() {
    let base = spawn_server();
    let config = ClientConfig::builder(USERNAME)
        .secret_key(SECRET_KEY)
        .discovery_url("http://127.0.0.1:1")
        .api_endpoint(format!("{base}/"))
        .build()
        .unwrap();
    let client = EnreachClient::connect(&config).unwrap();
    assert_eq!(client.session().endpoint, base);
}

#[test]
fn wrong_password_is_authentication_error() {
    let base = spawn_server();
    let config = ClientConfig::builder(USERNAME)
        .password("wrong")
        .discovery_url(&base)
        .build()
        .unwrap();
    let err = EnreachClient::connect(&config).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert_eq!(err.status_code(), Some(401));
}

#[test]
fn unknown_user_fails_discovery() {
    let base = spawn_server();
    let config = ClientConfig::builder("someone@else.example")
        .secret_key(SECRET_KEY)
        .discovery_url(&base)
        .build()
        .unwrap();
    let err = EnreachClient::connect(&config).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Authentication);
}

#[test]
fn wrong_secret_key_is_rejected_at_identity_check() {
    let base = spawn_server();
    let config = ClientConfig::builder(USERNAME)
        .secret_key("stale")
        .discovery_url(&base)
        .build()
        .unwrap();
    let err = EnreachClient::connect(&config).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Authentication);
}

// --- calls ---

#[test]
fn user_calls_by_call_id() {
    let client = connect(&spawn_server());
    let calls = client
        .get_usercalls(&CallFilter::by_call_id(CLASSIFIED_CALL_ID.to_string()))
        .unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].call_id.as_deref(), Some(CLASSIFIED_CALL_ID.to_string().as_str()));
    assert_eq!(calls[0].extra["Direction"], "Inbound");
}

#[test]
fn user_calls_by_time_range() {
    let client = connect(&spawn_server());
    let end = chrono::Utc::now();
    let start = end - chrono::Duration::days(7);
    let calls = client.get_usercalls(&CallFilter::between(start, end)).unwrap();
    assert_eq!(calls.len(), 2);
}

#[test]
fn queue_calls_by_call_id() {
    let client = connect(&spawn_server());
    let calls = client
        .get_inbound_queuecalls(&CallFilter::by_call_id(CLASSIFIED_CALL_ID.to_string()))
        .unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].extra["QueueId"], QUEUE_ID.to_string());
}

#[test]
fn rate_limit_carries_retry_after() {
    let client = connect(&spawn_server());
    let err = client
        .get_inbound_queuecalls(&CallFilter::by_call_id(RATE_LIMITED_CALL_ID))
        .unwrap_err();
    match err {
        EnreachError::RateLimit { retry_after, .. } => {
            assert_eq!(retry_after, Some(Duration::from_secs(RETRY_AFTER_SECS)));
        }
        other => panic!("expected rate limit, got {other:?}"),
    }
}

// --- recordings ---

#[test]
fn recording_is_saved_byte_for_byte() {
    let client = connect(&spawn_server());
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("nested").join("recordings");

    let path = client.get_recording_file(RECORDING_ID, &target).unwrap();

    assert_eq!(path, target.join(format!("{RECORDING_ID}.mp3")));
    assert_eq!(std::fs::read(&path).unwrap(), mock_server::recording_audio(RECORDING_ID));
}

#[test]
fn missing_recording_writes_nothing() {
    let client = connect(&spawn_server());
    let dir = tempfile::tempdir().unwrap();

    let err = client.get_recording_file("missing", dir.path()).unwrap_err();

    assert_eq!(err.status_code(), Some(404));
    assert!(!dir.path().join("missing.mp3").exists());
}

// --- transcripts ---

#[test]
fn ready_transcript_returns_immediately() {
    let client = connect(&spawn_server());
    let transcript = client.get_transcript(TRANSCRIPT_READY, true).unwrap();
    assert_eq!(transcript.transcript_status, TranscriptStatus::Completed);
    assert_eq!(transcript.extra["Text"], "Hello, thanks for calling.");
}

#[test]
fn slow_transcript_is_polled_until_complete() {
    let client = connect(&spawn_server());
    let transcript = client.get_transcript(TRANSCRIPT_SLOW, true).unwrap();
    assert_eq!(transcript.transcript_status, TranscriptStatus::Completed);
}

#[test]
fn pending_transcript_without_waiting_is_returned_as_is() {
    let client = connect(&spawn_server());
    let transcript = client.get_transcript(TRANSCRIPT_SLOW, false).unwrap();
    assert!(transcript.is_pending());
}

#[test]
fn stuck_transcript_times_out() {
    let client = connect(&spawn_server());
    let err = client.get_transcript(TRANSCRIPT_STUCK, true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TranscriptTimeout);
}

// --- classification ---

#[test]
fn schema_listing_and_lookup() {
    let client = connect(&spawn_server());

    let schemas = client
        .get_classification_schemas(&SchemaQuery {
            include_children: true,
            ..SchemaQuery::default()
        })
        .unwrap();
    assert_eq!(schemas.len(), 1);
    assert_eq!(schemas[0].id, SCHEMA_ID);
    assert_eq!(schemas[0].groups.len(), 3);

    let bare = client.get_classification_schema(SCHEMA_ID, false).unwrap();
    assert!(bare.groups.is_empty());

    let products = client
        .get_classification_schema(SCHEMA_ID, true)
        .unwrap()
        .groups
        .into_iter()
        .find(|g| g.name == "Products")
        .unwrap();
    assert_eq!(products.max_selections, Some(5));
    assert!(products.allows_multiple());
}

#[test]
fn queue_and_calllist_schemas() {
    let client = connect(&spawn_server());

    let queues = client.get_queue_schemas().unwrap();
    assert_eq!(queues[0].queue_id, QUEUE_ID);
    assert_eq!(queues[0].schema_id, SCHEMA_ID);

    let lists = client.get_calllist_schemas().unwrap();
    assert_eq!(lists[0].list_id, CALL_LIST_ID);
    assert_eq!(lists[0].schema_id, SCHEMA_ID);
}

#[test]
fn create_then_find_classification() {
    let client = connect(&spawn_server());
    let call_id = Uuid::new_v4();

    let input = NewClassification::for_call(call_id, SCHEMA_ID, vec![2557, 2561])
        .with_note("Follow up next week")
        .with_type(ClassifiedType::ServiceCall);
    let created = client.create_classification(&input).unwrap();
    assert_eq!(created.call_id, Some(call_id));
    assert_eq!(created.note.as_deref(), Some("Follow up next week"));

    let found = client.find_classifications(Some(call_id), None).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, created.id);

    let first = client.get_call_classification(call_id).unwrap().unwrap();
    assert_eq!(first.id, created.id);
}

#[test]
fn unclassified_call_has_no_classification() {
    let client = connect(&spawn_server());
    assert!(client.get_call_classification(Uuid::new_v4()).unwrap().is_none());
    assert!(client
        .get_call_classification_pretty(Uuid::new_v4())
        .unwrap()
        .is_none());
}

#[test]
fn pretty_classification_resolves_names() {
    let client = connect(&spawn_server());

    let pretty = client
        .get_call_classification_pretty(CLASSIFIED_CALL_ID)
        .unwrap()
        .unwrap();

    let tags = &pretty.tags.tags_pretty;
    assert_eq!(tags.get("Reason for call"), Some(&TagValue::Single("Sales demo".into())));
    assert_eq!(tags.get("Customer type"), Some(&TagValue::Single("Prospect".into())));
    assert_eq!(
        tags.get("Products"),
        Some(&TagValue::Multiple(vec!["Hammers".into(), "Screwdrivers".into()]))
    );
    assert!(pretty.tags.is_consistent());

    let json = serde_json::to_value(&pretty).unwrap();
    assert_eq!(json["TagsPretty"]["Products"][1], "Screwdrivers");
    assert_eq!(json["CallId"], CLASSIFIED_CALL_ID.to_string());
}
