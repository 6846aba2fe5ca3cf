use std::sync::Arc;

use reelbin_core::ingest::IngestPipeline;

pub struct AppState {
    pub pipeline: IngestPipeline,
}

pub type SharedState = Arc<AppState>;
