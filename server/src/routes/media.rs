use axum::{
    extract::{multipart::Field, FromRequest, Multipart, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    routing::get,
    Json, Router,
};
use camino::{Utf8Path as Path, Utf8PathBuf as PathBuf};
use eyre::Context;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use reelbin_core::{
    ingest::{IngestError, IngestRequest, UploadedFile},
    model::MediaId,
};

use crate::{
    app_state::SharedState,
    http_error::{ApiResult, HttpError},
    mime_type::upload_extension,
    schema::{ErrorBody, MediaRecord, RemoteMediaRequest, UploadForm},
};

pub fn router() -> Router<SharedState> {
    Router::new().route("/media", get(get_media).post(post_media))
}

#[utoipa::path(get, path = "/media",
responses(
    (status = 200, body = [MediaRecord]),
    (status = 500, body = ErrorBody),
),
)]
pub async fn get_media(State(app_state): State<SharedState>) -> ApiResult<Json<Vec<MediaRecord>>> {
    let records = app_state
        .pipeline
        .catalog()
        .list()
        .await?
        .into_iter()
        .map(MediaRecord::from)
        .collect();
    Ok(Json(records))
}

/// Ingest one clip, from a multipart upload or a remote link.
///
/// Also accepts `application/json` with a `RemoteMediaRequest` body.
#[utoipa::path(post, path = "/media",
request_body(content = UploadForm, content_type = "multipart/form-data"),
responses(
    (status = 201, body = MediaRecord),
    (status = 400, description = "InvalidInput or UnsupportedMediaType", body = ErrorBody),
    (status = 413, description = "Upload exceeds the configured size limit", body = ErrorBody),
    (status = 500, description = "Download, probe, transcode or storage failure", body = ErrorBody),
),
)]
#[instrument(skip_all)]
pub async fn post_media(
    State(app_state): State<SharedState>,
    request: Request,
) -> ApiResult<(StatusCode, Json<MediaRecord>)> {
    let id = MediaId::generate();
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let ingest_request = if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|rejection| HttpError::from_rejection(rejection.status(), rejection.body_text()))?;
        read_multipart(multipart, id, &app_state.pipeline.config().media_dir).await?
    } else if content_type.starts_with("application/json") {
        let Json(body) = Json::<RemoteMediaRequest>::from_request(request, &())
            .await
            .map_err(|rejection| HttpError::from_rejection(rejection.status(), rejection.body_text()))?;
        IngestRequest {
            id,
            upload: None,
            remote_url: body.remote_url,
            title: body.title,
        }
    } else {
        return Err(HttpError::invalid_input(format!(
            "expected multipart/form-data or application/json, got '{}'",
            content_type
        )));
    };
    debug!(%id, "request read, handing over to the pipeline");
    let record = app_state.pipeline.ingest_detached(ingest_request).await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

/// Removes a partially received upload unless it was handed over to the pipeline, including
/// when the client disconnects mid-body and the handler is dropped.
struct PartialUpload {
    path: Option<PathBuf>,
}

impl PartialUpload {
    fn disarm(&mut self) {
        self.path = None;
    }
}

impl Drop for PartialUpload {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!(%path, "removed partial upload"),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => tracing::warn!(%path, %err, "could not remove partial upload"),
            }
        }
    }
}

async fn read_multipart(
    mut multipart: Multipart,
    id: MediaId,
    media_dir: &Path,
) -> ApiResult<IngestRequest> {
    let mut upload: Option<UploadedFile> = None;
    let mut partial = PartialUpload { path: None };
    let mut remote_url = None;
    let mut title = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                if upload.is_some() {
                    return Err(HttpError::invalid_input("more than one file field"));
                }
                let content_type = field.content_type().map(str::to_string);
                let file_name = field.file_name().map(str::to_string);
                let ext = upload_extension(content_type.as_deref(), file_name.as_deref());
                let path = media_dir.join(format!("{}.{}", id, ext));
                partial.path = Some(path.clone());
                let written = stream_field_to_file(field, &path).await?;
                if written == 0 {
                    // browsers send an empty file part when no file was picked
                    debug!("ignoring empty file field");
                    partial.path = None;
                    tokio::fs::remove_file(&path).await?;
                    continue;
                }
                upload = Some(UploadedFile {
                    path,
                    content_type,
                    file_name,
                });
            }
            "remoteUrl" => remote_url = Some(field.text().await.map_err(multipart_error)?),
            "title" => title = Some(field.text().await.map_err(multipart_error)?),
            other => debug!(field = other, "ignoring unknown multipart field"),
        }
    }
    partial.disarm();
    Ok(IngestRequest {
        id,
        upload,
        remote_url,
        title,
    })
}

async fn stream_field_to_file(mut field: Field<'_>, path: &Path) -> ApiResult<u64> {
    let mut file = tokio::fs::File::create(path)
        .await
        .wrap_err(format!("could not create {}", path))
        .map_err(|report| HttpError::Ingest(IngestError::StorageFailed(report)))?;
    let mut written: u64 = 0;
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        file.write_all(&chunk)
            .await
            .wrap_err(format!("could not write {}", path))
            .map_err(|report| HttpError::Ingest(IngestError::StorageFailed(report)))?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> HttpError {
    HttpError::from_rejection(err.status(), err.body_text())
}
