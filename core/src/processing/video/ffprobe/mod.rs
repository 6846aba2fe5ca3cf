use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;
use camino::{Utf8Path as Path, Utf8PathBuf as PathBuf};
use eyre::Result;

mod command;

pub use command::{ffprobe_get_streams, parse_ffprobe_output};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Video,
    Audio,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamInfo {
    pub media_type: MediaType,
    pub codec_name: String,
}

/// What the prober saw in a file: its audio/video streams in container order, plus the
/// container-level tags (title, encoder, ...).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProbeResult {
    pub streams: Vec<StreamInfo>,
    pub format_tags: BTreeMap<String, String>,
}

impl ProbeResult {
    pub fn video_codec(&self) -> Option<&str> {
        self.first_codec(MediaType::Video)
    }

    pub fn audio_codec(&self) -> Option<&str> {
        self.first_codec(MediaType::Audio)
    }

    /// Embedded title tag, if there is a non-blank one. Tag keys are matched case-insensitively
    /// since muxers disagree on `title` vs `TITLE`.
    pub fn title(&self) -> Option<&str> {
        self.format_tags
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case("title"))
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
    }

    fn first_codec(&self, media_type: MediaType) -> Option<&str> {
        self.streams
            .iter()
            .find(|s| s.media_type == media_type)
            .map(|s| s.codec_name.as_str())
    }
}

#[async_trait]
pub trait MediaProbe: Send + Sync {
    /// Inspect the file at `path` without modifying it.
    async fn probe(&self, path: &Path) -> Result<ProbeResult>;
}

#[derive(Debug, Clone)]
pub struct FFProbe {
    pub bin_path: Option<PathBuf>,
    pub timeout: Duration,
}

#[async_trait]
impl MediaProbe for FFProbe {
    async fn probe(&self, path: &Path) -> Result<ProbeResult> {
        ffprobe_get_streams(path, self.bin_path.as_deref(), self.timeout).await
    }
}

#[test]
fn probe_result_accessors() {
    let result = ProbeResult {
        streams: vec![
            StreamInfo {
                media_type: MediaType::Audio,
                codec_name: "opus".into(),
            },
            StreamInfo {
                media_type: MediaType::Video,
                codec_name: "vp9".into(),
            },
            StreamInfo {
                media_type: MediaType::Video,
                codec_name: "mjpeg".into(),
            },
        ],
        format_tags: [("TITLE".to_string(), "  Beach day ".to_string())].into(),
    };
    assert_eq!(result.video_codec(), Some("vp9"));
    assert_eq!(result.audio_codec(), Some("opus"));
    assert_eq!(result.title(), Some("Beach day"));
    assert_eq!(ProbeResult::default().title(), None);
}
