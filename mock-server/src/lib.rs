//! In-process stand-in for the EnreachVoice REST API.
//!
//! Serves the discovery, credential, calls, recordings, transcripts and
//! classification endpoints with a small fixed data set so the client can be
//! exercised end to end over real HTTP. DTOs are plain JSON values rather than
//! the client's types; integration tests catch any drift between the two.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const USERNAME: &str = "agent@example.com";
pub const PASSWORD: &str = "correct horse";
pub const SECRET_KEY: &str = "s3cr3t";
pub const USER_ID: &str = "83ea47cd-d58e-f011-9949-00505689303a";

pub const SCHEMA_ID: Uuid = Uuid::from_u128(0xd045db9b_28a7_4b49_b5d8_fd4b4469c148);
pub const QUEUE_ID: Uuid = Uuid::from_u128(0x6f1c2a10_0000_4000_8000_000000000001);
pub const CALL_LIST_ID: Uuid = Uuid::from_u128(0x6f1c2a10_0000_4000_8000_000000000002);
/// A call that already carries a classification.
pub const CLASSIFIED_CALL_ID: Uuid = Uuid::from_u128(0x48c1222c_88ab_40c0_8693_a76d05b33814);

pub const RECORDING_ID: &str = "rec-1";
pub const TRANSCRIPT_READY: &str = "t-ready";
/// Reports `Pending` for its first [`SLOW_TRANSCRIPT_PENDING_POLLS`] fetches.
pub const TRANSCRIPT_SLOW: &str = "t-slow";
pub const SLOW_TRANSCRIPT_PENDING_POLLS: u32 = 2;
/// Never leaves `Pending`.
pub const TRANSCRIPT_STUCK: &str = "t-stuck";
/// Asking for this call id yields HTTP 429.
pub const RATE_LIMITED_CALL_ID: &str = "rate-limited";
pub const RETRY_AFTER_SECS: u64 = 7;

/// Audio bytes served for a recording. Covers every byte value so binary
/// corruption is visible.
pub fn recording_audio(recording_id: &str) -> Vec<u8> {
    let mut audio = b"ID3".to_vec();
    audio.extend((0..=255u8).cycle().take(8192));
    audio.extend(recording_id.as_bytes());
    audio
}

#[derive(Debug)]
pub struct MockState {
    base_url: String,
    classifications: Vec<Value>,
    transcript_polls: HashMap<String, u32>,
}

pub type Db = Arc<RwLock<MockState>>;

/// Router whose discovery endpoint advertises `base_url` as the API endpoint.
pub fn app(base_url: &str) -> Router {
    let state = MockState {
        base_url: base_url.trim_end_matches('/').to_string(),
        classifications: vec![seed_classification()],
        transcript_polls: HashMap::new(),
    };
    let db: Db = Arc::new(RwLock::new(state));
    Router::new()
        .route("/api/user", get(discover))
        .route("/authuser/{username}", post(password_grant))
        .route("/users/me", get(current_user))
        .route("/calls", get(user_calls))
        .route("/servicecall", get(queue_calls))
        .route("/calls/recordings/{id}", get(recording_metadata))
        .route("/recordings/{id}/audio", get(recording_file))
        .route("/calls/transcripts/{id}", get(transcript))
        .route("/classification/schemas", get(list_schemas))
        .route("/classification/schemas/{id}", get(get_schema))
        .route("/classification/queueschemas", get(queue_schemas))
        .route("/classification/calllistschemas", get(calllist_schemas))
        .route("/classification/instance", post(create_classification))
        .route("/classification/instance/", get(find_classifications))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    axum::serve(listener, app(&format!("http://{addr}"))).await
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "Message": message }))).into_response()
}

fn authorize(headers: &HeaderMap) -> Result<(), Response> {
    let expected = STANDARD.encode(format!("{USERNAME}:{SECRET_KEY}"));
    let supplied = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "));
    if supplied == Some(expected.as_str()) {
        Ok(())
    } else {
        Err(error(
            StatusCode::UNAUTHORIZED,
            "Authorization has been denied for this request.",
        ))
    }
}

// --- discovery & auth ---

async fn discover(
    State(db): State<Db>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let state = db.read().await;
    if params.get("user").map(String::as_str) == Some(USERNAME) {
        Json(json!([{ "apiEndpoint": format!("{}/", state.base_url) }]))
    } else {
        Json(json!([]))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PasswordGrant {
    pub user_name: String,
    pub password: String,
}

async fn password_grant(Path(username): Path<String>, Json(input): Json<PasswordGrant>) -> Response {
    if username == USERNAME && input.user_name == USERNAME && input.password == PASSWORD {
        Json(json!({ "SecretKey": SECRET_KEY })).into_response()
    } else {
        error(StatusCode::UNAUTHORIZED, "Invalid username or password.")
    }
}

async fn current_user(headers: HeaderMap) -> Response {
    if let Err(denied) = authorize(&headers) {
        return denied;
    }
    Json(json!({ "Id": USER_ID, "Email": USERNAME })).into_response()
}

// --- calls ---

fn call_filter_error(params: &HashMap<String, String>) -> Option<Response> {
    let has = |k: &str| params.contains_key(k);
    if params.get("CallId").map(String::as_str) == Some(RATE_LIMITED_CALL_ID) {
        let mut response = error(StatusCode::TOO_MANY_REQUESTS, "Too many requests.");
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, RETRY_AFTER_SECS.into());
        return Some(response);
    }
    if has("CallId") || (has("StartTime") && has("EndTime")) || (has("ModifiedAfter") && has("ModifiedBefore")) {
        None
    } else {
        Some(error(StatusCode::BAD_REQUEST, "Missing filter parameters."))
    }
}

fn filter_by_call_id(calls: Vec<Value>, params: &HashMap<String, String>) -> Vec<Value> {
    match params.get("CallId") {
        Some(id) => calls.into_iter().filter(|c| c["CallId"] == id.as_str()).collect(),
        None => calls,
    }
}

async fn user_calls(headers: HeaderMap, Query(params): Query<HashMap<String, String>>) -> Response {
    if let Err(denied) = authorize(&headers) {
        return denied;
    }
    if let Some(rejected) = call_filter_error(&params) {
        return rejected;
    }
    let calls = vec![
        json!({
            "CallId": CLASSIFIED_CALL_ID.to_string(),
            "StartTime": "2024-01-01 10:00:00",
            "EndTime": "2024-01-01 10:05:12",
            "UserId": USER_ID,
            "Direction": "Inbound",
            "RecordingId": RECORDING_ID,
        }),
        json!({
            "CallId": "4b415288-8604-4b6c-b604-e4eaeb90c938",
            "StartTime": "2024-01-01 11:30:00",
            "EndTime": "2024-01-01 11:31:40",
            "UserId": USER_ID,
            "Direction": "Outbound",
        }),
    ];
    Json(filter_by_call_id(calls, &params)).into_response()
}

async fn queue_calls(headers: HeaderMap, Query(params): Query<HashMap<String, String>>) -> Response {
    if let Err(denied) = authorize(&headers) {
        return denied;
    }
    if let Some(rejected) = call_filter_error(&params) {
        return rejected;
    }
    let calls = vec![json!({
        "CallId": CLASSIFIED_CALL_ID.to_string(),
        "StartTime": "2024-01-01 10:00:00",
        "EndTime": "2024-01-01 10:05:12",
        "QueueId": QUEUE_ID.to_string(),
        "QueueName": "Sales",
        "AnsweredBy": USER_ID,
    })];
    Json(filter_by_call_id(calls, &params)).into_response()
}

// --- recordings ---

async fn recording_metadata(headers: HeaderMap, Path(id): Path<String>) -> Response {
    if let Err(denied) = authorize(&headers) {
        return denied;
    }
    if id != RECORDING_ID {
        return error(StatusCode::NOT_FOUND, "Recording not found.");
    }
    Json(json!({ "RecordingId": id, "URL": format!("recordings/{id}/audio") })).into_response()
}

async fn recording_file(Path(id): Path<String>) -> Response {
    if id != RECORDING_ID {
        return StatusCode::NOT_FOUND.into_response();
    }
    ([(header::CONTENT_TYPE, "audio/mpeg")], recording_audio(&id)).into_response()
}

// --- transcripts ---

async fn transcript(State(db): State<Db>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    if let Err(denied) = authorize(&headers) {
        return denied;
    }
    let status = match id.as_str() {
        TRANSCRIPT_READY => "Completed",
        TRANSCRIPT_STUCK => "Pending",
        TRANSCRIPT_SLOW => {
            let mut state = db.write().await;
            let polls = state.transcript_polls.entry(id.clone()).or_insert(0);
            *polls += 1;
            if *polls <= SLOW_TRANSCRIPT_PENDING_POLLS {
                "Pending"
            } else {
                "Completed"
            }
        }
        _ => return error(StatusCode::NOT_FOUND, "Transcript not found."),
    };
    let mut body = json!({ "TranscriptId": id, "TranscriptStatus": status });
    if status == "Completed" {
        body["Text"] = json!("Hello, thanks for calling.");
    }
    Json(body).into_response()
}

// --- classification ---

fn schema_json(include_children: bool) -> Value {
    let mut schema = json!({ "Id": SCHEMA_ID.to_string(), "Name": "Sales calls" });
    if include_children {
        schema["Groups"] = json!([
            {
                "Id": 1, "Name": "Reason for call", "MinSelections": 1, "MaxSelections": 1,
                "Tags": [{ "Id": 2556, "Name": "Sales demo" }, { "Id": 2557, "Name": "Support" }]
            },
            {
                "Id": 2, "Name": "Customer type", "MinSelections": 1, "MaxSelections": 1,
                "Tags": [{ "Id": 2560, "Name": "Prospect" }, { "Id": 2561, "Name": "Customer" }]
            },
            {
                "Id": 3, "Name": "Products", "MinSelections": 0, "MaxSelections": 5,
                "Tags": [{ "Id": 2563, "Name": "Hammers" }, { "Id": 2569, "Name": "Screwdrivers" }]
            }
        ]);
    }
    schema
}

fn seed_classification() -> Value {
    json!({
        "Id": "f1590ff9-05b4-f011-9949-00505689303a",
        "TagSchemaId": SCHEMA_ID.to_string(),
        "TagSchemaName": "Sales calls",
        "CallId": CLASSIFIED_CALL_ID.to_string(),
        "TagSelections": [
            { "TagId": 2556 }, { "TagId": 2560 }, { "TagId": 2563 }, { "TagId": 2569 }
        ],
        "ClassifiedType": "ServiceCall",
        "CreatedBy": USER_ID,
        "ModifiedBy": USER_ID,
        "Modified": "2025-10-28T13:57:03.4Z",
    })
}

fn include_children(params: &HashMap<String, String>) -> bool {
    params
        .get("IncludeChildren")
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

async fn list_schemas(headers: HeaderMap, Query(params): Query<HashMap<String, String>>) -> Response {
    if let Err(denied) = authorize(&headers) {
        return denied;
    }
    Json(json!([schema_json(include_children(&params))])).into_response()
}

async fn get_schema(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Err(denied) = authorize(&headers) {
        return denied;
    }
    if id != SCHEMA_ID {
        return error(StatusCode::NOT_FOUND, "Schema not found.");
    }
    Json(schema_json(include_children(&params))).into_response()
}

async fn queue_schemas(headers: HeaderMap) -> Response {
    if let Err(denied) = authorize(&headers) {
        return denied;
    }
    Json(json!([{
        "QueueId": QUEUE_ID.to_string(),
        "SchemaId": SCHEMA_ID.to_string(),
        "QueueName": "Sales",
    }]))
    .into_response()
}

async fn calllist_schemas(headers: HeaderMap) -> Response {
    if let Err(denied) = authorize(&headers) {
        return denied;
    }
    Json(json!([{
        "ListId": CALL_LIST_ID.to_string(),
        "SchemaId": SCHEMA_ID.to_string(),
        "ListName": "Callbacks",
    }]))
    .into_response()
}

async fn create_classification(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<Value>,
) -> Response {
    if let Err(denied) = authorize(&headers) {
        return denied;
    }
    let has_selections = input["TagSelections"].as_array().is_some_and(|s| !s.is_empty());
    if input["TagSchemaId"].as_str().is_none() || !has_selections {
        return error(StatusCode::BAD_REQUEST, "TagSchemaId and TagSelections are required.");
    }

    let mut created = input;
    created["Id"] = json!(Uuid::new_v4().to_string());
    created["CreatedBy"] = json!(USER_ID);
    created["ModifiedBy"] = json!(USER_ID);
    created["Modified"] = json!("2025-10-28T13:57:03.4Z");
    db.write().await.classifications.push(created.clone());
    (StatusCode::CREATED, Json(created)).into_response()
}

async fn find_classifications(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Err(denied) = authorize(&headers) {
        return denied;
    }
    let call_id = params.get("CallId");
    let item_id = params.get("CallbackListItemId");
    if call_id.is_none() && item_id.is_none() {
        return error(StatusCode::BAD_REQUEST, "CallId or CallbackListItemId is required.");
    }
    let state = db.read().await;
    let found: Vec<Value> = state
        .classifications
        .iter()
        .filter(|c| {
            call_id.is_some_and(|id| c["CallId"] == id.as_str())
                || item_id.is_some_and(|id| c["CallListItemId"] == id.as_str())
        })
        .cloned()
        .collect();
    Json(found).into_response()
}
