use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_TYPE, Request, StatusCode},
    Router,
};
use camino::Utf8PathBuf as PathBuf;
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tower::ServiceExt;

use reelbin_core::{
    catalog::CatalogHandle,
    config::IngestConfig,
    ingest::{IngestCommands, IngestPipeline},
    processing::mock::{
        probe_result, DownloaderMock, ProbeMock, TranscodeBehavior, TranscoderMock,
    },
};

use crate::{
    app_state::AppState,
    schema::{ErrorBody, MediaRecord, SourceKind},
};

const BOUNDARY: &str = "reelbin-test-boundary";

struct TestApp {
    _dir: TempDir,
    media_dir: PathBuf,
    router: Router,
}

impl TestApp {
    fn new(max_upload_size: u64) -> Self {
        let dir = TempDir::new().unwrap();
        let root = PathBuf::from_path_buf(dir.path().to_owned()).unwrap();
        let media_dir = root.join("media");
        std::fs::create_dir_all(&media_dir).unwrap();
        let config = IngestConfig {
            max_upload_size,
            ..IngestConfig::with_media_dir(media_dir.clone())
        };
        let commands = IngestCommands {
            probe: Arc::new(ProbeMock::sources_look_like(probe_result(
                "h264",
                Some("aac"),
                None,
            ))),
            transcoder: Arc::new(TranscoderMock::new(TranscodeBehavior::Succeed)),
            downloader: Arc::new(DownloaderMock::producing(&[(".mp4", b"remote bytes")])),
        };
        let pipeline =
            IngestPipeline::new(config, commands, CatalogHandle::new(root.join("catalog.json")));
        let router = super::app(Arc::new(AppState { pipeline }));
        TestApp {
            _dir: dir,
            media_dir,
            router,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    fn media_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.media_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        content_type: &'a str,
        file_name: &'a str,
        bytes: &'a [u8],
    },
}

fn multipart_request(parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                content_type,
                file_name,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        file_name, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    Request::post("/media")
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn json_request(json: serde_json::Value) -> Request<Body> {
    Request::post("/media")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

#[tokio::test]
async fn upload_is_listed_and_served() {
    let app = TestApp::new(1024 * 1024);
    let (status, body) = app
        .send(multipart_request(&[
            Part::Text("title", "Beach day"),
            Part::File {
                content_type: "video/mp4",
                file_name: "beach.mp4",
                bytes: b"h264 bytes",
            },
        ]))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", String::from_utf8_lossy(&body));
    let record: MediaRecord = serde_json::from_slice(&body).unwrap();
    assert_eq!(record.display_name, "Beach day");
    assert_eq!(record.source_kind, SourceKind::Upload);
    assert_eq!(record.relative_url, format!("/files/{}.mp4", record.id));
    let raw: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(raw.get("relativeURL").is_some());

    let (status, body) = app
        .send(Request::get("/media").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    let listed: Vec<MediaRecord> = serde_json::from_slice(&body).unwrap();
    assert_eq!(listed, vec![record.clone()]);

    let (status, body) = app
        .send(Request::get(&record.relative_url).body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"h264 bytes");
}

#[tokio::test]
async fn remote_link_as_json() {
    let app = TestApp::new(1024 * 1024);
    let (status, body) = app
        .send(json_request(serde_json::json!({
            "remoteUrl": "https://www.youtube.com/shorts/dQw4w9WgXcQ",
        })))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", String::from_utf8_lossy(&body));
    let record: MediaRecord = serde_json::from_slice(&body).unwrap();
    assert_eq!(record.source_kind, SourceKind::Remote);
    assert!(record.display_name.starts_with("Remote clip "));
    assert_eq!(app.media_files(), vec![format!("{}.mp4", record.id)]);
}

#[tokio::test]
async fn missing_source_is_bad_request() {
    let app = TestApp::new(1024 * 1024);
    let (status, body) = app
        .send(json_request(serde_json::json!({ "title": "nothing" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ErrorBody = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.error, "InvalidInput");
    assert!(app.media_files().is_empty());
}

#[tokio::test]
async fn both_sources_is_bad_request_and_upload_is_removed() {
    let app = TestApp::new(1024 * 1024);
    let (status, body) = app
        .send(multipart_request(&[
            Part::File {
                content_type: "video/mp4",
                file_name: "a.mp4",
                bytes: b"h264 bytes",
            },
            Part::Text("remoteUrl", "https://www.youtube.com/shorts/dQw4w9WgXcQ"),
        ]))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ErrorBody = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.error, "InvalidInput");
    assert!(app.media_files().is_empty());
}

#[tokio::test]
async fn non_video_upload_is_rejected() {
    let app = TestApp::new(1024 * 1024);
    let (status, body) = app
        .send(multipart_request(&[Part::File {
            content_type: "text/plain",
            file_name: "notes.txt",
            bytes: b"not a video",
        }]))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ErrorBody = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.error, "UnsupportedMediaType");
    assert!(app.media_files().is_empty());
}

#[tokio::test]
async fn unknown_content_type_is_bad_request() {
    let app = TestApp::new(1024 * 1024);
    let (status, _) = app
        .send(
            Request::post("/media")
                .header(CONTENT_TYPE, "text/plain")
                .body(Body::from("https://www.youtube.com/shorts/dQw4w9WgXcQ"))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_upload_is_rejected_and_removed() {
    let app = TestApp::new(1024);
    let bytes = vec![7u8; 64 * 1024];
    let (status, body) = app
        .send(multipart_request(&[Part::File {
            content_type: "video/mp4",
            file_name: "big.mp4",
            bytes: &bytes,
        }]))
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    let error: ErrorBody = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.error, "PayloadTooLarge");
    assert!(app.media_files().is_empty());
}
