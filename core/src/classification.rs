//! Human-readable view of a classification ("TagsPretty").
//!
//! # Design
//! A classification stores bare tag ids; names live in the schema tree.
//! [`flatten_tags`] joins the two. Nothing is dropped on the floor: ids the
//! schema does not know end up in `unresolved_tag_ids`, and extra selections
//! in a single-select group (last write wins) end up in `overridden`. Both are
//! also logged, since either means the classification and the schema version
//! disagree.

use std::collections::HashMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tracing::warn;

use crate::types::{Classification, ClassificationSchema};

/// Value of one group in [`TagsPretty`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TagValue {
    Single(String),
    Multiple(Vec<String>),
}

/// Group name → tag name(s), in order of first selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagsPretty {
    entries: Vec<(String, TagValue)>,
}

impl TagsPretty {
    pub fn get(&self, group: &str) -> Option<&TagValue> {
        self.entries.iter().find(|(g, _)| g == group).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TagValue)> {
        self.entries.iter().map(|(g, v)| (g.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&mut self, group: &str) -> Option<&mut TagValue> {
        self.entries.iter_mut().find(|(g, _)| g == group).map(|(_, v)| v)
    }
}

impl Serialize for TagsPretty {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (group, value) in &self.entries {
            map.serialize_entry(group, value)?;
        }
        map.end()
    }
}

/// A selection in a single-select group that a later selection replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OverriddenSelection {
    pub group: String,
    pub replaced: String,
    pub kept: String,
}

/// Result of joining a classification against its schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FlattenedTags {
    pub tags_pretty: TagsPretty,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unresolved_tag_ids: Vec<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub overridden: Vec<OverriddenSelection>,
}

impl FlattenedTags {
    /// True when every selection resolved and no single-select group was
    /// selected more than once.
    pub fn is_consistent(&self) -> bool {
        self.unresolved_tag_ids.is_empty() && self.overridden.is_empty()
    }
}

/// A classification together with its flattened tag names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrettyClassification {
    #[serde(flatten)]
    pub classification: Classification,
    #[serde(flatten)]
    pub tags: FlattenedTags,
}

struct IndexedTag<'a> {
    group: &'a str,
    name: &'a str,
    multiple: bool,
}

/// Join `classification.tag_selections` against `schema`'s group/tag tree.
pub fn flatten_tags(classification: &Classification, schema: &ClassificationSchema) -> FlattenedTags {
    if classification.schema_id != schema.id {
        warn!(
            classification = %classification.id,
            expected = %classification.schema_id,
            actual = %schema.id,
            "flattening classification against a different schema"
        );
    }

    let mut index: HashMap<i64, IndexedTag<'_>> = HashMap::new();
    for group in &schema.groups {
        let multiple = group.allows_multiple();
        for tag in &group.tags {
            if let Some(existing) = index.get(&tag.id) {
                warn!(
                    tag_id = tag.id,
                    kept = existing.group,
                    ignored = %group.name,
                    "tag id appears in more than one group"
                );
                continue;
            }
            index.insert(
                tag.id,
                IndexedTag {
                    group: &group.name,
                    name: &tag.name,
                    multiple,
                },
            );
        }
    }

    let mut out = FlattenedTags::default();
    for selection in &classification.tag_selections {
        let Some(tag) = index.get(&selection.tag_id) else {
            warn!(
                classification = %classification.id,
                tag_id = selection.tag_id,
                "selected tag is not part of the schema"
            );
            out.unresolved_tag_ids.push(selection.tag_id);
            continue;
        };

        match out.tags_pretty.entry(tag.group) {
            None => {
                let value = if tag.multiple {
                    TagValue::Multiple(vec![tag.name.to_string()])
                } else {
                    TagValue::Single(tag.name.to_string())
                };
                out.tags_pretty.entries.push((tag.group.to_string(), value));
            }
            Some(TagValue::Multiple(names)) => names.push(tag.name.to_string()),
            Some(TagValue::Single(previous)) => {
                warn!(
                    classification = %classification.id,
                    group = tag.group,
                    replaced = %previous,
                    kept = tag.name,
                    "single-select group has more than one selection"
                );
                out.overridden.push(OverriddenSelection {
                    group: tag.group.to_string(),
                    replaced: std::mem::replace(previous, tag.name.to_string()),
                    kept: tag.name.to_string(),
                });
            }
        }
    }
    out
}
