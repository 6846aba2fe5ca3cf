use std::{process::Stdio, time::Duration};

use async_trait::async_trait;
use camino::{Utf8Path as Path, Utf8PathBuf as PathBuf};
use eyre::{eyre, Context, Result};
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::processing::process_control::{run_process, ProcessResult};

#[async_trait]
pub trait MediaDownloader: Send + Sync {
    /// Fetch `url` into `out_dir`. Every file written must have a name starting with
    /// `file_prefix`; the caller finds the results by that prefix.
    async fn download(&self, url: &str, out_dir: &Path, file_prefix: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct YtDlp {
    pub bin_path: Option<PathBuf>,
    pub timeout: Duration,
}

#[async_trait]
impl MediaDownloader for YtDlp {
    #[instrument(name = "yt-dlp", skip(self))]
    async fn download(&self, url: &str, out_dir: &Path, file_prefix: &str) -> Result<()> {
        let output_template = out_dir.join(format!("{}.%(ext)s", file_prefix));
        let mut command = Command::new(self.bin_path.as_deref().unwrap_or(Path::new("yt-dlp")));
        command
            .args(["--no-playlist", "--no-progress", "--quiet", "--no-warnings"])
            // prefer something that already is mp4/h264 so most downloads can skip the transcode
            .args(["-f", "bv*[ext=mp4]+ba[ext=m4a]/b[ext=mp4]/bv*+ba/b"])
            .args(["--merge-output-format", "mp4"])
            .arg("-o")
            .arg(output_template.as_str())
            .arg("--")
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        debug!(command = ?command.as_std(), "Invoking yt-dlp");
        let child = command.spawn().wrap_err("failed to call yt-dlp")?;
        match run_process(child, self.timeout).await {
            ProcessResult::RanToEnd(output) if output.status.success() => Ok(()),
            ProcessResult::RanToEnd(output) => Err(eyre!(
                "yt-dlp exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )),
            ProcessResult::TimedOut => {
                Err(eyre!("yt-dlp did not finish within {:?}", self.timeout))
            }
            ProcessResult::OtherError(err) => Err(err.wrap_err("error running yt-dlp")),
        }
    }
}
