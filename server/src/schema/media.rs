use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use reelbin_core::model;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum SourceKind {
    Upload,
    Remote,
}

impl From<model::SourceKind> for SourceKind {
    fn from(value: model::SourceKind) -> Self {
        match value {
            model::SourceKind::Upload => SourceKind::Upload,
            model::SourceKind::Remote => SourceKind::Remote,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecord {
    pub id: String,
    pub display_name: String,
    #[serde(rename = "relativeURL")]
    pub relative_url: String,
    pub created_at: DateTime<Utc>,
    pub source_kind: SourceKind,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub codec_tags: Option<BTreeMap<String, String>>,
}

impl From<model::MediaRecord> for MediaRecord {
    fn from(value: model::MediaRecord) -> Self {
        MediaRecord {
            id: value.id.to_string(),
            display_name: value.display_name,
            relative_url: value.relative_url,
            created_at: value.created_at,
            source_kind: value.source_kind.into(),
            codec_tags: value.codec_tags,
        }
    }
}

/// JSON body of `POST /media` for remote links.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMediaRequest {
    pub remote_url: Option<String>,
    pub title: Option<String>,
}

/// Multipart body of `POST /media`. Exactly one of `file` and `remoteUrl`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadForm {
    #[schema(value_type = Option<String>, format = Binary)]
    pub file: Option<Vec<u8>>,
    pub remote_url: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Error kind, e.g. `InvalidInput` or `TranscodeFailed`
    pub error: String,
    pub details: String,
}
