use axum::{extract::DefaultBodyLimit, Router};
use tower_http::services::ServeDir;

use crate::app_state::SharedState;

pub mod media;

/// All routes plus the media file service, without the tracing and CORS layers.
pub fn app(shared_state: SharedState) -> Router {
    let ingest_config = shared_state.pipeline.config();
    let body_limit = usize::try_from(ingest_config.max_upload_size).unwrap_or(usize::MAX);
    let files = ServeDir::new(ingest_config.media_dir.as_std_path());
    Router::new()
        .merge(media::router())
        .nest_service(&ingest_config.public_url_prefix, files)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(shared_state)
}

#[cfg(test)]
mod test;
