//! Stand-ins for ffprobe, ffmpeg and yt-dlp so the pipeline can be driven without the real
//! binaries.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use camino::{Utf8Path as Path, Utf8PathBuf as PathBuf};
use eyre::{eyre, Context, Result};
use tokio_util::sync::CancellationToken;

use super::{
    video::{
        ffmpeg::MediaTranscoder,
        ffprobe::{MediaProbe, MediaType, ProbeResult, StreamInfo},
        transcode::{CANONICAL_AUDIO_CODEC, CANONICAL_VIDEO_CODEC},
    },
    yt_dlp::MediaDownloader,
};
use crate::ingest::pipeline::NORMALIZED_FILE_SUFFIX;

pub fn probe_result(video: &str, audio: Option<&str>, title: Option<&str>) -> ProbeResult {
    let mut streams = vec![StreamInfo {
        media_type: MediaType::Video,
        codec_name: video.to_string(),
    }];
    if let Some(audio) = audio {
        streams.push(StreamInfo {
            media_type: MediaType::Audio,
            codec_name: audio.to_string(),
        });
    }
    ProbeResult {
        streams,
        format_tags: title
            .map(|t| [("title".to_string(), t.to_string())].into())
            .unwrap_or_default(),
    }
}

fn is_transcoder_output(path: &Path) -> bool {
    path.file_stem()
        .is_some_and(|stem| stem.ends_with(NORMALIZED_FILE_SUFFIX))
}

type ProbeFn = dyn Fn(&Path) -> Result<ProbeResult> + Send + Sync;

pub struct ProbeMock {
    respond: Box<ProbeFn>,
    calls: Mutex<Vec<PathBuf>>,
}

impl ProbeMock {
    pub fn new(respond: impl Fn(&Path) -> Result<ProbeResult> + Send + Sync + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sources report `source`; transcoder outputs report the canonical codecs.
    pub fn sources_look_like(source: ProbeResult) -> Self {
        Self::new(move |path| {
            if is_transcoder_output(path) {
                Ok(probe_result(
                    CANONICAL_VIDEO_CODEC,
                    Some(CANONICAL_AUDIO_CODEC),
                    None,
                ))
            } else {
                Ok(source.clone())
            }
        })
    }

    /// Sources can't be probed; transcoder outputs report the canonical codecs.
    pub fn sources_unreadable() -> Self {
        Self::new(|path| {
            if is_transcoder_output(path) {
                Ok(probe_result(
                    CANONICAL_VIDEO_CODEC,
                    Some(CANONICAL_AUDIO_CODEC),
                    None,
                ))
            } else {
                Err(eyre!("Invalid data found when processing input"))
            }
        })
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl MediaProbe for ProbeMock {
    async fn probe(&self, path: &Path) -> Result<ProbeResult> {
        self.calls.lock().expect("lock poisoned").push(path.to_owned());
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(eyre!("{}: No such file or directory", path));
        }
        (self.respond)(path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscodeBehavior {
    Succeed,
    /// Fail and clean up, like the real transcoder.
    Fail,
    /// Fail but leave a half-written output behind.
    FailLeavingPartial,
}

pub struct TranscoderMock {
    behavior: TranscodeBehavior,
    delay: Option<Duration>,
    cancel_while_running: Option<CancellationToken>,
    calls: AtomicUsize,
}

impl TranscoderMock {
    pub fn new(behavior: TranscodeBehavior) -> Self {
        Self {
            behavior,
            delay: None,
            cancel_while_running: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Simulates the client disconnecting while the encoder runs.
    pub fn cancelling(mut self, token: CancellationToken) -> Self {
        self.cancel_while_running = Some(token);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaTranscoder for TranscoderMock {
    async fn transcode(&self, input: &Path, output: &Path) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let source = tokio::fs::read(input)
            .await
            .wrap_err(format!("could not read {}", input))?;
        if let Some(token) = &self.cancel_while_running {
            token.cancel();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.behavior {
            TranscodeBehavior::Succeed => {
                let mut encoded = b"normalized:".to_vec();
                encoded.extend_from_slice(&source);
                tokio::fs::write(output, encoded).await?;
                Ok(())
            }
            TranscodeBehavior::Fail => Err(eyre!("encoder exited with status 1")),
            TranscodeBehavior::FailLeavingPartial => {
                tokio::fs::write(output, b"normalized:trunc").await?;
                Err(eyre!("encoder exited with status 1"))
            }
        }
    }
}

pub struct DownloaderMock {
    /// Files to write, as (suffix after the prefix, contents)
    files: Vec<(String, Vec<u8>)>,
    fail: bool,
    calls: AtomicUsize,
}

impl DownloaderMock {
    pub fn producing(files: &[(&str, &[u8])]) -> Self {
        Self {
            files: files
                .iter()
                .map(|(suffix, bytes)| (suffix.to_string(), bytes.to_vec()))
                .collect(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Writes its files, then reports failure.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaDownloader for DownloaderMock {
    async fn download(&self, url: &str, out_dir: &Path, file_prefix: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        for (suffix, bytes) in &self.files {
            tokio::fs::write(out_dir.join(format!("{}{}", file_prefix, suffix)), bytes).await?;
        }
        if self.fail {
            Err(eyre!("ERROR: [generic] Unable to download {}", url))
        } else {
            Ok(())
        }
    }
}
