use camino::Utf8PathBuf as PathBuf;

use crate::model::MediaId;

/// A file the HTTP layer has already written to disk. From the moment it is part of an
/// [`IngestRequest`] the pipeline owns it and removes it unless it becomes the final output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub path: PathBuf,
    /// MIME type declared by the client
    pub content_type: Option<String>,
    /// File name as sent by the client
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestRequest {
    /// Generated before anything is written; every file name this ingestion produces is
    /// derived from it.
    pub id: MediaId,
    pub upload: Option<UploadedFile>,
    pub remote_url: Option<String>,
    pub title: Option<String>,
}

impl IngestRequest {
    pub fn upload(id: MediaId, upload: UploadedFile, title: Option<String>) -> Self {
        Self {
            id,
            upload: Some(upload),
            remote_url: None,
            title,
        }
    }

    pub fn remote(id: MediaId, remote_url: impl Into<String>, title: Option<String>) -> Self {
        Self {
            id,
            upload: None,
            remote_url: Some(remote_url.into()),
            title,
        }
    }
}
