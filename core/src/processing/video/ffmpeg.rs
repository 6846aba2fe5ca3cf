use std::{ffi::OsString, process::Stdio, time::Duration};

use async_trait::async_trait;
use camino::{Utf8Path as Path, Utf8PathBuf as PathBuf};
use eyre::{eyre, Context, Result};
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use super::transcode::canonical_ffmpeg_flags;
use crate::processing::process_control::{run_process, ProcessResult};

#[derive(thiserror::Error, Debug)]
pub enum FFmpegError {
    #[error("Error starting FFmpeg")]
    ErrorStarting,
    #[error("FFmpeg did not finish within {0:?}")]
    TimedOut(Duration),
    #[error("FFmpeg exited with an error: {0}")]
    Failed(String),
    #[error("FFmpeg produced an empty output file")]
    EmptyOutput,
}

#[async_trait]
pub trait MediaTranscoder: Send + Sync {
    /// Encode `input` into the canonical profile at `output`.
    ///
    /// On success `output` exists and is non-empty. On failure nothing is left at `output`.
    /// `input` is never modified.
    async fn transcode(&self, input: &Path, output: &Path) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FFmpeg {
    pre_input_flags: Vec<OsString>,
    flags: Vec<OsString>,
    bin_path: Option<PathBuf>,
    timeout: Duration,
}

impl FFmpeg {
    pub fn new(
        pre_input_flags: Vec<OsString>,
        flags: Vec<OsString>,
        bin_path: Option<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            pre_input_flags,
            flags,
            bin_path,
            timeout,
        }
    }

    pub fn canonical(bin_path: Option<PathBuf>, timeout: Duration) -> Self {
        Self::new(
            vec!["-loglevel".into(), "error".into()],
            canonical_ffmpeg_flags().into_iter().map(OsString::from).collect(),
            bin_path,
            timeout,
        )
    }

    #[instrument(err, name = "ffmpeg", skip(self))]
    async fn run_with_local_output(&self, input: &Path, output: &Path) -> Result<()> {
        let mut command = Command::new(self.bin_path.as_deref().unwrap_or(Path::new("ffmpeg")));
        command
            .arg("-nostdin")
            .arg("-y")
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        command.args(self.pre_input_flags.iter());
        command.arg("-i").arg(input);
        command.args(self.flags.iter());
        command.arg(output);
        debug!(command = ?command.as_std(), "Invoking ffmpeg");
        let child = command.spawn().wrap_err(FFmpegError::ErrorStarting)?;
        match run_process(child, self.timeout).await {
            ProcessResult::RanToEnd(out) if out.status.success() => {}
            ProcessResult::RanToEnd(out) => {
                return Err(FFmpegError::Failed(
                    String::from_utf8_lossy(&out.stderr).trim().to_string(),
                )
                .into())
            }
            ProcessResult::TimedOut => return Err(FFmpegError::TimedOut(self.timeout).into()),
            ProcessResult::OtherError(err) => return Err(err.wrap_err("error running ffmpeg")),
        }
        let written = tokio::fs::metadata(output)
            .await
            .wrap_err(format!("ffmpeg reported success but {} is missing", output))?;
        if written.len() == 0 {
            return Err(FFmpegError::EmptyOutput.into());
        }
        Ok(())
    }
}

#[async_trait]
impl MediaTranscoder for FFmpeg {
    async fn transcode(&self, input: &Path, output: &Path) -> Result<()> {
        let result = self.run_with_local_output(input, output).await;
        if result.is_err() {
            remove_partial_output(output).await;
        }
        result
    }
}

async fn remove_partial_output(output: &Path) {
    match tokio::fs::remove_file(output).await {
        Ok(()) => debug!(%output, "Removed partial ffmpeg output"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(%output, %err, "Could not remove partial ffmpeg output"),
    }
}

#[cfg(test)]
mod test {
    use std::os::unix::fs::PermissionsExt;

    use claims::assert_err;
    use tempfile::TempDir;

    use super::*;

    /// Stand-in encoder: writes something to the output path, then fails.
    #[tokio::test]
    async fn failed_encode_removes_partial_output() {
        let dir = TempDir::new().unwrap();
        let dir_path = Path::from_path(dir.path()).unwrap();
        let fake_ffmpeg = dir_path.join("fake-ffmpeg.sh");
        std::fs::write(
            &fake_ffmpeg,
            "#!/bin/sh\nfor last; do :; done\necho partial > \"$last\"\nexit 1\n",
        )
        .unwrap();
        std::fs::set_permissions(&fake_ffmpeg, std::fs::Permissions::from_mode(0o755)).unwrap();
        let input = dir_path.join("in.webm");
        std::fs::write(&input, b"source").unwrap();
        let output = dir_path.join("out.mp4");

        let ffmpeg = FFmpeg::canonical(Some(fake_ffmpeg), Duration::from_secs(10));
        assert_err!(ffmpeg.transcode(&input, &output).await);
        assert!(!output.exists());
        assert!(input.exists());
    }

    #[tokio::test]
    async fn empty_output_counts_as_failure() {
        let dir = TempDir::new().unwrap();
        let dir_path = Path::from_path(dir.path()).unwrap();
        let fake_ffmpeg = dir_path.join("fake-ffmpeg.sh");
        std::fs::write(
            &fake_ffmpeg,
            "#!/bin/sh\nfor last; do :; done\n: > \"$last\"\nexit 0\n",
        )
        .unwrap();
        std::fs::set_permissions(&fake_ffmpeg, std::fs::Permissions::from_mode(0o755)).unwrap();
        let input = dir_path.join("in.webm");
        std::fs::write(&input, b"source").unwrap();
        let output = dir_path.join("out.mp4");

        let ffmpeg = FFmpeg::canonical(Some(fake_ffmpeg), Duration::from_secs(10));
        let err = assert_err!(ffmpeg.transcode(&input, &output).await);
        assert!(matches!(
            err.downcast_ref::<FFmpegError>(),
            Some(FFmpegError::EmptyOutput)
        ));
        assert!(!output.exists());
    }
}
