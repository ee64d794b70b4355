//! Serde DTOs for the EnreachVoice REST API.
//!
//! # Design
//! Field names follow the vendor's PascalCase JSON. Shapes the client reasons
//! about (classification schemas, classifications, transcript status) are
//! fully typed; call events and transcripts keep every other field in an
//! open-ended `extra` map because their contents vary by tenant and API
//! version and the client only passes them through.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Open-ended remainder of a pass-through payload.
pub type ExtraFields = serde_json::Map<String, serde_json::Value>;

/// Identity returned by `GET /users/me`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct CurrentUser {
    pub id: String,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// A user call event or an inbound queue call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct CallRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// First hop of a recording download; `url` points at the audio itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordingMetadata {
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Processing state of a transcript. Statuses the client does not know are
/// kept verbatim in `Other` so they survive re-serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TranscriptStatus {
    Pending,
    Completed,
    Failed,
    Other(String),
}

impl From<String> for TranscriptStatus {
    fn from(status: String) -> Self {
        match status.as_str() {
            "Pending" => Self::Pending,
            "Completed" => Self::Completed,
            "Failed" => Self::Failed,
            _ => Self::Other(status),
        }
    }
}

impl From<TranscriptStatus> for String {
    fn from(status: TranscriptStatus) -> Self {
        match status {
            TranscriptStatus::Pending => "Pending".to_string(),
            TranscriptStatus::Completed => "Completed".to_string(),
            TranscriptStatus::Failed => "Failed".to_string(),
            TranscriptStatus::Other(raw) => raw,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Transcript {
    pub transcript_status: TranscriptStatus,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl Transcript {
    pub fn is_pending(&self) -> bool {
        self.transcript_status == TranscriptStatus::Pending
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// A named tree of tag groups.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ClassificationSchema {
    pub id: Uuid,
    pub name: String,
    /// Empty unless the schema was fetched with `include_children`.
    #[serde(default)]
    pub groups: Vec<TagGroup>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct TagGroup {
    pub id: i64,
    pub name: String,
    /// Absent or `null` means 0.
    #[serde(default, deserialize_with = "null_as_default")]
    pub min_selections: u32,
    /// Absent means 1; `null` or 0 means no upper bound.
    #[serde(default = "single_selection")]
    pub max_selections: Option<u32>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl TagGroup {
    /// Whether selections in this group flatten to a list rather than a
    /// single name.
    pub fn allows_multiple(&self) -> bool {
        match self.max_selections {
            None | Some(0) => true,
            Some(max) => max > 1,
        }
    }
}

fn single_selection() -> Option<u32> {
    Some(1)
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// What kind of item a classification is attached to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassifiedType {
    Undefined,
    #[serde(rename = "None")]
    NotSet,
    DirectCall,
    #[default]
    ServiceCall,
    Email,
    CallListItem,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct TagSelection {
    pub tag_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_group_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_group_name: Option<String>,
}

impl TagSelection {
    pub fn new(tag_id: i64) -> Self {
        Self {
            tag_id,
            tag_name: None,
            tag_group_id: None,
            tag_group_name: None,
        }
    }
}

/// A stored classification instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Classification {
    pub id: Uuid,
    #[serde(rename = "TagSchemaId")]
    pub schema_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_schema_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_list_item_id: Option<Uuid>,
    #[serde(default)]
    pub tag_selections: Vec<TagSelection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classified_type: Option<ClassifiedType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
}

/// Input for `create_classification`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewClassification {
    /// Call id, or callback list item id when `classified_type` is
    /// `CallListItem`.
    pub item_id: Uuid,
    pub schema_id: Uuid,
    pub tag_ids: Vec<i64>,
    pub note: Option<String>,
    pub classified_type: ClassifiedType,
}

impl NewClassification {
    pub fn for_call(call_id: Uuid, schema_id: Uuid, tag_ids: Vec<i64>) -> Self {
        Self {
            item_id: call_id,
            schema_id,
            tag_ids,
            note: None,
            classified_type: ClassifiedType::default(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_type(mut self, classified_type: ClassifiedType) -> Self {
        self.classified_type = classified_type;
        self
    }
}

/// Wire body of `POST /classification/instance`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct CreateClassificationBody<'a> {
    pub tag_schema_id: Uuid,
    pub tag_selections: Vec<TagSelection>,
    pub classified_type: ClassifiedType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_list_item_id: Option<Uuid>,
}

/// Binding between a service queue and the schema its calls use.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct QueueSchema {
    pub queue_id: Uuid,
    pub schema_id: Uuid,
    #[serde(default)]
    pub queue_name: Option<String>,
}

/// Binding between a callback list and the schema its items use.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct CallListSchema {
    pub list_id: Uuid,
    pub schema_id: Uuid,
    #[serde(default)]
    pub list_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_type_id: Option<Uuid>,
}

/// Query options for `get_classification_schemas`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaQuery {
    pub include_children: bool,
    pub include_archived: bool,
    pub include_deleted: bool,
    pub modified_after: Option<DateTime<Utc>>,
}
