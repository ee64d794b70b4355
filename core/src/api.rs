//! Stateless HTTP request builder and response parser for the EnreachVoice API.
//!
//! # Design
//! `EnreachApi` holds an authenticated [`Session`] and nothing else that
//! changes. Each operation is split into a `build_*` method that validates its
//! arguments and produces an [`HttpRequest`], and a `parse_*` method that
//! consumes the matching [`HttpResponse`]. Validation failures surface from
//! `build_*`, so a rejected call never reaches the transport.

use urlencoding::encode;
use uuid::Uuid;

use crate::auth::{default_headers, Session};
use crate::error::EnreachError;
use crate::filter::CallFilter;
use crate::http::{decode_json, ensure_success, HttpMethod, HttpRequest, HttpResponse};
use crate::types::{
    CallListSchema, CallRecord, Classification, ClassificationSchema, ClassifiedType,
    CreateClassificationBody, CurrentUser, NewClassification, QueueSchema, RecordingMetadata,
    SchemaQuery, TagSelection, Transcript,
};

/// Longest note the classification endpoint accepts.
pub const MAX_NOTE_CHARS: usize = 500;

const SCHEMA_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

#[derive(Debug, Clone)]
pub struct EnreachApi {
    session: Session,
    user_agent: String,
}

impl EnreachApi {
    pub fn new(session: Session, user_agent: impl Into<String>) -> Self {
        Self {
            session,
            user_agent: user_agent.into(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Authenticated request against `{endpoint}{path}`.
    fn request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        let mut request = HttpRequest::new(method, format!("{}{path}", self.session.endpoint));
        request.headers = default_headers(&self.user_agent);
        request
            .headers
            .push(("Authorization".to_string(), self.session.authorization()));
        request
    }

    pub fn build_current_user(&self) -> HttpRequest {
        self.request(HttpMethod::Get, "/users/me")
    }

    pub fn parse_current_user(&self, response: &HttpResponse) -> Result<CurrentUser, EnreachError> {
        ensure_success(response)?;
        decode_json(response)
    }

    // -- calls --------------------------------------------------------------

    pub fn build_user_calls(&self, filter: &CallFilter) -> Result<HttpRequest, EnreachError> {
        let mut request = self.request(HttpMethod::Get, "/calls");
        request.query = filter.to_query()?;
        Ok(request)
    }

    pub fn build_queue_calls(&self, filter: &CallFilter) -> Result<HttpRequest, EnreachError> {
        let mut request = self.request(HttpMethod::Get, "/servicecall");
        request.query = filter.to_query()?;
        Ok(request)
    }

    pub fn parse_calls(&self, response: &HttpResponse) -> Result<Vec<CallRecord>, EnreachError> {
        ensure_success(response)?;
        decode_json(response)
    }

    // -- recordings ---------------------------------------------------------

    pub fn build_recording_metadata(&self, recording_id: &str) -> Result<HttpRequest, EnreachError> {
        let id = path_segment("recording id", recording_id)?;
        Ok(self.request(HttpMethod::Get, &format!("/calls/recordings/{}", encode(id))))
    }

    pub fn parse_recording_metadata(
        &self,
        response: &HttpResponse,
    ) -> Result<RecordingMetadata, EnreachError> {
        ensure_success(response)?;
        decode_json(response)
    }

    /// The audio URL is usually relative to the API endpoint. It is fetched
    /// without credentials.
    pub fn build_recording_audio(&self, metadata: &RecordingMetadata) -> HttpRequest {
        let url = if metadata.url.starts_with("http://") || metadata.url.starts_with("https://") {
            metadata.url.clone()
        } else {
            format!(
                "{}/{}",
                self.session.endpoint,
                metadata.url.trim_start_matches('/')
            )
        };
        let mut request = HttpRequest::new(HttpMethod::Get, url);
        request
            .headers
            .push(("User-Agent".to_string(), self.user_agent.clone()));
        request
    }

    pub fn parse_recording_audio(&self, response: HttpResponse) -> Result<Vec<u8>, EnreachError> {
        ensure_success(&response)?;
        Ok(response.body)
    }

    // -- transcripts --------------------------------------------------------

    pub fn build_transcript(&self, transcript_id: &str) -> Result<HttpRequest, EnreachError> {
        let id = path_segment("transcript id", transcript_id)?;
        Ok(self.request(HttpMethod::Get, &format!("/calls/transcripts/{}", encode(id))))
    }

    pub fn parse_transcript(&self, response: &HttpResponse) -> Result<Transcript, EnreachError> {
        ensure_success(response)?;
        decode_json(response)
    }

    // -- classification schemas --------------------------------------------

    pub fn build_classification_schemas(&self, query: &SchemaQuery) -> HttpRequest {
        let mut request = self.request(HttpMethod::Get, "/classification/schemas");
        request.query = vec![
            ("IncludeChildren".to_string(), query.include_children.to_string()),
            ("IncludeArchived".to_string(), query.include_archived.to_string()),
            ("IncludeDeleted".to_string(), query.include_deleted.to_string()),
        ];
        if let Some(after) = query.modified_after {
            request.query.push((
                "ModifiedAfter".to_string(),
                after.format(SCHEMA_TIME_FORMAT).to_string(),
            ));
        }
        request
    }

    pub fn parse_classification_schemas(
        &self,
        response: &HttpResponse,
    ) -> Result<Vec<ClassificationSchema>, EnreachError> {
        ensure_success(response)?;
        decode_json(response)
    }

    pub fn build_classification_schema(&self, schema_id: Uuid, include_children: bool) -> HttpRequest {
        let mut request = self.request(HttpMethod::Get, &format!("/classification/schemas/{schema_id}"));
        request
            .query
            .push(("IncludeChildren".to_string(), include_children.to_string()));
        request
    }

    pub fn parse_classification_schema(
        &self,
        response: &HttpResponse,
    ) -> Result<ClassificationSchema, EnreachError> {
        ensure_success(response)?;
        decode_json(response)
    }

    pub fn build_queue_schemas(&self) -> HttpRequest {
        self.request(HttpMethod::Get, "/classification/queueschemas")
    }

    pub fn parse_queue_schemas(&self, response: &HttpResponse) -> Result<Vec<QueueSchema>, EnreachError> {
        ensure_success(response)?;
        decode_json(response)
    }

    pub fn build_calllist_schemas(&self) -> HttpRequest {
        self.request(HttpMethod::Get, "/classification/calllistschemas")
    }

    pub fn parse_calllist_schemas(
        &self,
        response: &HttpResponse,
    ) -> Result<Vec<CallListSchema>, EnreachError> {
        ensure_success(response)?;
        decode_json(response)
    }

    // -- classification instances -------------------------------------------

    pub fn build_create_classification(
        &self,
        input: &NewClassification,
    ) -> Result<HttpRequest, EnreachError> {
        if input.item_id.is_nil() {
            return Err(EnreachError::parameter("call id is required"));
        }
        if input.schema_id.is_nil() {
            return Err(EnreachError::parameter("schema id is required"));
        }
        if input.tag_ids.is_empty() {
            return Err(EnreachError::parameter("tag selections cannot be empty"));
        }
        let note = input.note.as_deref().filter(|n| !n.is_empty());
        if note.is_some_and(|n| n.chars().count() > MAX_NOTE_CHARS) {
            return Err(EnreachError::parameter(format!(
                "note cannot exceed {MAX_NOTE_CHARS} characters"
            )));
        }

        let (call_id, call_list_item_id) = match input.classified_type {
            ClassifiedType::CallListItem => (None, Some(input.item_id)),
            _ => (Some(input.item_id), None),
        };
        let body = CreateClassificationBody {
            tag_schema_id: input.schema_id,
            tag_selections: input.tag_ids.iter().copied().map(TagSelection::new).collect(),
            classified_type: input.classified_type,
            note,
            call_id,
            call_list_item_id,
        };
        let body = serde_json::to_string(&body).map_err(|e| EnreachError::Serialization(e.to_string()))?;

        let mut request = self.request(HttpMethod::Post, "/classification/instance");
        request.body = Some(body);
        Ok(request)
    }

    pub fn parse_create_classification(
        &self,
        response: &HttpResponse,
    ) -> Result<Classification, EnreachError> {
        ensure_success(response)?;
        decode_json(response)
    }

    pub fn build_find_classifications(
        &self,
        call_id: Option<Uuid>,
        callback_list_item_id: Option<Uuid>,
    ) -> Result<HttpRequest, EnreachError> {
        if call_id.is_none() && callback_list_item_id.is_none() {
            return Err(EnreachError::parameter(
                "either a call id or a callback list item id must be provided",
            ));
        }
        let mut request = self.request(HttpMethod::Get, "/classification/instance/");
        if let Some(id) = call_id {
            request.query.push(("CallId".to_string(), id.to_string()));
        }
        if let Some(id) = callback_list_item_id {
            request
                .query
                .push(("CallbackListItemId".to_string(), id.to_string()));
        }
        Ok(request)
    }

    pub fn parse_find_classifications(
        &self,
        response: &HttpResponse,
    ) -> Result<Vec<Classification>, EnreachError> {
        ensure_success(response)?;
        decode_json(response)
    }
}

/// Reject ids that are empty or would escape their URL or file path segment.
/// Callers percent-encode the returned value when formatting a URL.
pub(crate) fn path_segment<'a>(what: &str, value: &'a str) -> Result<&'a str, EnreachError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(EnreachError::parameter(format!("{what} is required")));
    }
    if value.contains(['/', '\\']) || value == "." || value == ".." {
        return Err(EnreachError::parameter(format!("{what} {value:?} is not a valid id")));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::error::ErrorKind;

    fn api() -> EnreachApi {
        let session = Session {
            endpoint: "https://api.test.com".to_string(),
            username: "user".to_string(),
            user_id: "user-1".to_string(),
            secret_key: "key".to_string(),
            authenticated_at: Utc::now(),
        };
        EnreachApi::new(session, "test-agent")
    }

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[test]
    fn every_request_is_authenticated() {
        let req = api().build_queue_schemas();
        assert_eq!(req.url, "https://api.test.com/classification/queueschemas");
        assert_eq!(req.header("Authorization"), Some("Basic dXNlcjprZXk="));
        assert_eq!(req.header("User-Agent"), Some("test-agent"));
    }

    #[test]
    fn reserved_characters_in_ids_are_percent_encoded() {
        let req = api().build_transcript("t-1?TranscriptId=other#x").unwrap();
        assert_eq!(
            req.url,
            "https://api.test.com/calls/transcripts/t-1%3FTranscriptId%3Dother%23x"
        );
        assert!(req.query.is_empty());

        let req = api().build_recording_metadata("rec 1%").unwrap();
        assert_eq!(req.url, "https://api.test.com/calls/recordings/rec%201%25");
    }

    #[test]
    fn user_calls_carry_filter_as_query() {
        let req = api().build_user_calls(&CallFilter::by_call_id("abc")).unwrap();
        assert_eq!(req.url, "https://api.test.com/calls");
        assert_eq!(req.query_param("CallId"), Some("abc"));
    }

    #[test]
    fn queue_calls_target_servicecall() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let req = api().build_queue_calls(&CallFilter::between(start, end)).unwrap();
        assert_eq!(req.url, "https://api.test.com/servicecall");
        assert_eq!(req.query_param("EndTime"), Some("2024-01-02 00:00:00"));
    }

    #[test]
    fn relative_recording_url_resolves_against_endpoint() {
        let meta: RecordingMetadata =
            serde_json::from_str(r#"{"URL":"/files/rec-1.mp3"}"#).unwrap();
        let req = api().build_recording_audio(&meta);
        assert_eq!(req.url, "https://api.test.com/files/rec-1.mp3");
        assert!(req.header("Authorization").is_none());

        let meta: RecordingMetadata =
            serde_json::from_str(r#"{"URL":"https://cdn.test.com/rec-1.mp3"}"#).unwrap();
        assert_eq!(api().build_recording_audio(&meta).url, "https://cdn.test.com/rec-1.mp3");
    }

    #[test]
    fn ids_with_separators_are_rejected() {
        for bad in ["", "  ", "../etc", "a/b", "a\\b", ".."] {
            let err = api().build_recording_metadata(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Parameter, "{bad:?}");
        }
        assert!(api().build_transcript("t-1").is_ok());
    }

    #[test]
    fn schema_query_flags_are_explicit() {
        let query = SchemaQuery {
            include_children: true,
            modified_after: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()),
            ..SchemaQuery::default()
        };
        let req = api().build_classification_schemas(&query);
        assert_eq!(req.query_param("IncludeChildren"), Some("true"));
        assert_eq!(req.query_param("IncludeArchived"), Some("false"));
        assert_eq!(req.query_param("ModifiedAfter"), Some("2024-05-01T12:30:00.000000Z"));
    }

    #[test]
    fn single_schema_path_and_children_flag() {
        let req = api().build_classification_schema(id(7), false);
        assert_eq!(
            req.url,
            format!("https://api.test.com/classification/schemas/{}", id(7))
        );
        assert_eq!(req.query_param("IncludeChildren"), Some("false"));
    }

    #[test]
    fn create_classification_body_for_service_call() {
        let input = NewClassification::for_call(id(1), id(2), vec![19, 23]).with_note("resolved");
        let req = api().build_create_classification(&input).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "https://api.test.com/classification/instance");

        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["TagSchemaId"], id(2).to_string());
        assert_eq!(body["CallId"], id(1).to_string());
        assert_eq!(body["ClassifiedType"], "ServiceCall");
        assert_eq!(body["Note"], "resolved");
        assert_eq!(body["TagSelections"], serde_json::json!([{"TagId": 19}, {"TagId": 23}]));
        assert!(body.get("CallListItemId").is_none());
    }

    #[test]
    fn create_classification_for_callback_item_uses_item_field() {
        let input = NewClassification::for_call(id(1), id(2), vec![5])
            .with_type(ClassifiedType::CallListItem);
        let req = api().build_create_classification(&input).unwrap();
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["CallListItemId"], id(1).to_string());
        assert!(body.get("CallId").is_none());
        assert!(body.get("Note").is_none());
    }

    #[test]
    fn create_classification_validates_locally() {
        let empty = NewClassification::for_call(id(1), id(2), Vec::new());
        assert_eq!(
            api().build_create_classification(&empty).unwrap_err().kind(),
            ErrorKind::Parameter
        );

        let nil_call = NewClassification::for_call(Uuid::nil(), id(2), vec![1]);
        assert_eq!(
            api().build_create_classification(&nil_call).unwrap_err().kind(),
            ErrorKind::Parameter
        );

        let long_note = NewClassification::for_call(id(1), id(2), vec![1]).with_note("x".repeat(501));
        assert_eq!(
            api().build_create_classification(&long_note).unwrap_err().kind(),
            ErrorKind::Parameter
        );
    }

    #[test]
    fn find_classifications_requires_a_key() {
        let err = api().build_find_classifications(None, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parameter);

        let req = api().build_find_classifications(Some(id(3)), None).unwrap();
        assert_eq!(req.url, "https://api.test.com/classification/instance/");
        assert_eq!(req.query_param("CallId"), Some(id(3).to_string().as_str()));
        assert!(req.query_param("CallbackListItemId").is_none());
    }

    #[test]
    fn parse_not_found_is_api_error() {
        let err = api()
            .parse_transcript(&HttpResponse::new(404, r#"{"Message":"No transcript"}"#))
            .unwrap_err();
        assert!(matches!(err, EnreachError::Api { status: 404, .. }));
    }

    #[test]
    fn parse_bad_json_is_decode_error() {
        let err = api()
            .parse_calls(&HttpResponse::new(200, "not json"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }
}
