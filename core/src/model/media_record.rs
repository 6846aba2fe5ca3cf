use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MediaId;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum SourceKind {
    Upload,
    Remote,
}

/// One accepted clip. Never updated or removed once it is in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecord {
    pub id: MediaId,
    pub display_name: String,
    /// Path under the served media root, e.g. `/files/<id>.mp4`
    #[serde(rename = "relativeURL")]
    pub relative_url: String,
    pub created_at: DateTime<Utc>,
    pub source_kind: SourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec_tags: Option<BTreeMap<String, String>>,
}
