use camino::{Utf8Path as Path, Utf8PathBuf as PathBuf};
use eyre::{eyre, Context};
use itertools::Itertools;
use tracing::{debug, instrument, warn};

use super::{artifacts::IngestArtifacts, error::IngestError, request::IngestRequest};
use crate::{
    config::IngestConfig,
    model::SourceKind,
    processing::{video::transcode::CANONICAL_EXTENSION, yt_dlp::MediaDownloader},
};

/// A local file ready to be probed, plus byproducts of getting it that must be deleted later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub kind: SourceKind,
    pub path: PathBuf,
    /// Name the client gave the file, for uploads that had one
    pub original_name: Option<String>,
    pub temp_artifacts: Vec<PathBuf>,
}

#[derive(Debug)]
enum Source<'a> {
    Upload(&'a super::request::UploadedFile),
    Remote(&'a str),
}

fn classify(request: &IngestRequest) -> Result<Source<'_>, IngestError> {
    let remote_url = request
        .remote_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty());
    match (&request.upload, remote_url) {
        (Some(upload), None) => Ok(Source::Upload(upload)),
        (None, Some(url)) => Ok(Source::Remote(url)),
        (Some(_), Some(_)) => Err(IngestError::InvalidInput(
            "provide either a file or a remoteUrl, not both".into(),
        )),
        (None, None) => Err(IngestError::InvalidInput(
            "a file or a remoteUrl is required".into(),
        )),
    }
}

/// Turn the request into a local file.
///
/// Every file this creates (and the upload, which the pipeline owns) is tracked in `artifacts`
/// so the caller can clean up on any failure, including failures from this function.
#[instrument(skip_all, fields(id = %request.id))]
pub async fn resolve_source(
    request: &IngestRequest,
    config: &IngestConfig,
    downloader: &dyn MediaDownloader,
    artifacts: &mut IngestArtifacts,
) -> Result<ResolvedSource, IngestError> {
    if let Some(upload) = &request.upload {
        artifacts.track(&upload.path);
    }
    match classify(request)? {
        Source::Upload(upload) => {
            check_upload_type(upload.content_type.as_deref(), config)?;
            tokio::fs::metadata(&upload.path)
                .await
                .wrap_err(format!("uploaded file {} is missing", upload.path))
                .map_err(IngestError::StorageFailed)?;
            Ok(ResolvedSource {
                kind: SourceKind::Upload,
                path: upload.path.clone(),
                original_name: upload.file_name.clone(),
                temp_artifacts: Vec::new(),
            })
        }
        Source::Remote(url) => {
            check_remote_url(url, config)?;
            download(url, &request.id.to_string(), config, downloader, artifacts).await
        }
    }
}

pub fn check_upload_type(
    content_type: Option<&str>,
    config: &IngestConfig,
) -> Result<(), IngestError> {
    let content_type = content_type.ok_or_else(|| {
        IngestError::UnsupportedMediaType("upload has no declared content type".into())
    })?;
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if config.allowed_upload_types.iter().any(|t| *t == essence) {
        Ok(())
    } else {
        Err(IngestError::UnsupportedMediaType(format!(
            "'{}' is not an accepted video type",
            content_type
        )))
    }
}

pub fn check_remote_url(url: &str, config: &IngestConfig) -> Result<(), IngestError> {
    if url.chars().any(char::is_whitespace) {
        return Err(IngestError::InvalidInput(format!(
            "remoteUrl '{}' contains whitespace",
            url
        )));
    }
    if config.allowed_url_patterns.iter().any(|p| p.is_match(url)) {
        Ok(())
    } else {
        Err(IngestError::InvalidInput(format!(
            "remoteUrl '{}' is not a supported short video link",
            url
        )))
    }
}

async fn download(
    url: &str,
    prefix: &str,
    config: &IngestConfig,
    downloader: &dyn MediaDownloader,
    artifacts: &mut IngestArtifacts,
) -> Result<ResolvedSource, IngestError> {
    let download_result = downloader.download(url, &config.media_dir, prefix).await;
    // whatever happened, anything with our prefix is ours to clean up
    let produced = files_with_prefix(&config.media_dir, prefix)
        .await
        .map_err(IngestError::DownloadFailed)?;
    for path in &produced {
        artifacts.track(path);
    }
    download_result.map_err(IngestError::DownloadFailed)?;
    let (main, rest) = select_main_file(produced, prefix).ok_or_else(|| {
        IngestError::DownloadFailed(eyre!("downloader finished but produced no usable file"))
    })?;
    debug!(%main, temp_artifacts = rest.len(), "selected downloaded file");
    Ok(ResolvedSource {
        kind: SourceKind::Remote,
        path: main,
        original_name: None,
        temp_artifacts: rest,
    })
}

async fn files_with_prefix(dir: &Path, prefix: &str) -> eyre::Result<Vec<PathBuf>> {
    let mut read_dir = tokio::fs::read_dir(dir)
        .await
        .wrap_err(format!("could not list {}", dir))?;
    let mut found = Vec::new();
    while let Some(entry) = read_dir
        .next_entry()
        .await
        .wrap_err(format!("could not list {}", dir))?
    {
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.starts_with(prefix) {
            found.push(dir.join(name));
        } else if name.contains(prefix) {
            warn!(name, "file shares our id but not as a prefix, leaving it alone");
        }
    }
    Ok(found)
}

/// Leftovers from an interrupted or in-progress download; never a usable main file.
fn is_partial_download(path: &Path) -> bool {
    matches!(path.extension(), Some("part" | "ytdl" | "temp" | "tmp"))
        || path.as_str().contains(".part-Frag")
}

/// Pick the file to ingest among everything the downloader left behind.
///
/// Preference: exactly `<prefix>.mp4`, then any other `.mp4`, then the rest ordered by
/// extension and name. Returns `None` if no candidate is usable; otherwise the remaining files
/// are returned as temp artifacts.
pub fn select_main_file(
    mut produced: Vec<PathBuf>,
    prefix: &str,
) -> Option<(PathBuf, Vec<PathBuf>)> {
    let canonical_name = format!("{}.{}", prefix, CANONICAL_EXTENSION);
    let main_idx = produced
        .iter()
        .enumerate()
        .filter(|(_, p)| !is_partial_download(p))
        .sorted_by_key(|(_, p)| {
            let is_canonical_name = p.file_name() == Some(canonical_name.as_str());
            let is_mp4 = p
                .extension()
                .is_some_and(|e| e.eq_ignore_ascii_case(CANONICAL_EXTENSION));
            (
                !is_canonical_name,
                !is_mp4,
                p.extension().unwrap_or_default().to_ascii_lowercase(),
                p.file_name().unwrap_or_default().to_string(),
            )
        })
        .map(|(idx, _)| idx)
        .next()?;
    let main = produced.swap_remove(main_idx);
    produced.sort();
    Some((main, produced))
}
