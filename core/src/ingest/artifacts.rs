use camino::{Utf8Path as Path, Utf8PathBuf as PathBuf};
use tracing::{debug, warn};

/// Files created by one ingestion that must not outlive it unless released as the final output.
#[derive(Debug, Default)]
pub struct IngestArtifacts {
    paths: Vec<PathBuf>,
}

impl IngestArtifacts {
    pub fn track(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    /// Stop tracking `path`, either because it was deleted or because it is the committed output.
    pub fn release(&mut self, path: &Path) {
        self.paths.retain(|p| p != path);
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Delete `path` and stop tracking it. Failures are logged, never returned.
    pub async fn remove(&mut self, path: &Path) {
        remove_logged(path).await;
        self.release(path);
    }

    /// Best-effort removal of everything still tracked.
    pub async fn remove_all(&mut self) {
        for path in std::mem::take(&mut self.paths) {
            remove_logged(&path).await;
        }
    }
}

pub async fn remove_logged(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(%path, "removed ingestion artifact"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(%path, %err, "could not remove ingestion artifact"),
    }
}
