//! The canonical profile every ingested clip is normalized to: H.264 video, AAC audio in an
//! MP4 container with the moov atom up front so browsers can start playback before the whole
//! file is downloaded.

use super::ffprobe::ProbeResult;

pub const CANONICAL_VIDEO_CODEC: &str = "h264";
pub const CANONICAL_AUDIO_CODEC: &str = "aac";
pub const CANONICAL_EXTENSION: &str = "mp4";

const VIDEO_ENCODER: &str = "libx264";
const AUDIO_ENCODER: &str = "aac";
const CRF: u8 = 23;
const PRESET: &str = "veryfast";
const AUDIO_BITRATE: &str = "128k";

/// True when the probed file already carries both canonical codecs.
pub fn matches_canonical_profile(probe: &ProbeResult) -> bool {
    probe.video_codec() == Some(CANONICAL_VIDEO_CODEC)
        && probe.audio_codec() == Some(CANONICAL_AUDIO_CODEC)
}

pub fn ffmpeg_video_flags() -> Vec<String> {
    vec![
        format!("-c:v"),
        VIDEO_ENCODER.to_string(),
        format!("-crf"),
        CRF.to_string(),
        format!("-preset"),
        PRESET.to_string(),
        // yuv420p is the only chroma layout every browser decodes
        format!("-pix_fmt"),
        format!("yuv420p"),
    ]
}

pub fn ffmpeg_audio_flags() -> Vec<String> {
    vec![
        format!("-c:a"),
        AUDIO_ENCODER.to_string(),
        format!("-b:a"),
        AUDIO_BITRATE.to_string(),
    ]
}

pub fn ffmpeg_container_flags() -> Vec<String> {
    vec![format!("-movflags"), format!("+faststart")]
}

pub fn canonical_ffmpeg_flags() -> Vec<String> {
    let mut flags = ffmpeg_video_flags();
    flags.extend(ffmpeg_audio_flags());
    flags.extend(ffmpeg_container_flags());
    flags
}

#[test]
fn ffmpeg_canonical_flags_assembled_correctly() {
    let expected = [
        "-c:v",
        "libx264",
        "-crf",
        "23",
        "-preset",
        "veryfast",
        "-pix_fmt",
        "yuv420p",
        "-c:a",
        "aac",
        "-b:a",
        "128k",
        "-movflags",
        "+faststart",
    ];
    assert_eq!(expected.as_slice(), &canonical_ffmpeg_flags());
}

#[test]
fn canonical_profile_needs_both_codecs() {
    use super::ffprobe::{MediaType, StreamInfo};

    let probe = |video: &str, audio: Option<&str>| {
        let mut streams = vec![StreamInfo {
            media_type: MediaType::Video,
            codec_name: video.into(),
        }];
        if let Some(audio) = audio {
            streams.push(StreamInfo {
                media_type: MediaType::Audio,
                codec_name: audio.into(),
            });
        }
        ProbeResult {
            streams,
            ..Default::default()
        }
    };
    assert!(matches_canonical_profile(&probe("h264", Some("aac"))));
    assert!(!matches_canonical_profile(&probe("hevc", Some("aac"))));
    assert!(!matches_canonical_profile(&probe("h264", Some("opus"))));
    assert!(!matches_canonical_profile(&probe("h264", None)));
    assert!(!matches_canonical_profile(&ProbeResult::default()));
}
