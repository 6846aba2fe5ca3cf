use std::{collections::BTreeMap, process::Stdio, time::Duration};

use camino::Utf8Path as Path;
use eyre::{eyre, Context, Result};
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::{MediaType, ProbeResult, StreamInfo};
use crate::processing::process_control::{run_process, ProcessResult};

#[instrument(skip(ffprobe_bin_path))]
pub async fn ffprobe_get_streams(
    path: &Path,
    ffprobe_bin_path: Option<&Path>,
    timeout: Duration,
) -> Result<ProbeResult> {
    let mut command = Command::new(ffprobe_bin_path.map(|p| p.as_str()).unwrap_or("ffprobe"));
    command
        .args(["-v", "error", "-show_streams", "-show_format", "-of", "json=compact=1"])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    debug!(command = ?command.as_std(), "Invoking ffprobe");
    let child = command.spawn().wrap_err("failed to call ffprobe")?;
    let output = match run_process(child, timeout).await {
        ProcessResult::RanToEnd(output) if output.status.success() => output,
        ProcessResult::RanToEnd(output) => {
            return Err(eyre!(
                "ffprobe exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        ProcessResult::TimedOut => {
            return Err(eyre!("ffprobe did not finish within {:?}", timeout));
        }
        ProcessResult::OtherError(err) => return Err(err.wrap_err("error running ffprobe")),
    };
    parse_ffprobe_output(&output.stdout)
}

pub fn parse_ffprobe_output(json: &[u8]) -> Result<ProbeResult> {
    #[derive(Debug, Clone, Deserialize)]
    struct FFProbeStream {
        pub codec_name: Option<String>,
    }
    #[derive(Debug, Clone, Deserialize)]
    #[serde(tag = "codec_type")]
    enum FFProbeStreamType {
        #[serde(rename = "video")]
        Video(FFProbeStream),
        #[serde(rename = "audio")]
        Audio(FFProbeStream),
        #[serde(other)]
        Other,
    }
    #[derive(Debug, Clone, Default, Deserialize)]
    struct FFProbeFormat {
        #[serde(default)]
        pub tags: BTreeMap<String, String>,
    }
    #[derive(Debug, Clone, Deserialize)]
    struct FFProbeOutput {
        #[serde(default)]
        pub streams: Vec<FFProbeStreamType>,
        #[serde(default)]
        pub format: Option<FFProbeFormat>,
    }

    let parsed: FFProbeOutput =
        serde_json::from_slice(json).wrap_err("could not parse ffprobe output")?;
    let streams = parsed
        .streams
        .into_iter()
        .filter_map(|stream| match stream {
            FFProbeStreamType::Video(s) => Some((MediaType::Video, s)),
            FFProbeStreamType::Audio(s) => Some((MediaType::Audio, s)),
            FFProbeStreamType::Other => None,
        })
        // attachments and cover art sometimes come without a codec name
        .filter_map(|(media_type, s)| {
            s.codec_name.map(|codec_name| StreamInfo {
                media_type,
                codec_name,
            })
        })
        .collect();
    Ok(ProbeResult {
        streams,
        format_tags: parsed.format.unwrap_or_default().tags,
    })
}

#[test]
fn ffprobe_output_parsed_correctly() {
    use claims::assert_ok;
    use pretty_assertions::assert_eq;

    let output_video_audio = r#"
{
    "streams": [
        {
            "index": 0,
            "codec_name": "h264",
            "codec_long_name": "H.264 / AVC / MPEG-4 AVC / MPEG-4 part 10",
            "profile": "High",
            "codec_type": "video",
            "width": 1080,
            "height": 1920,
            "pix_fmt": "yuv420p",
            "r_frame_rate": "30/1",
            "duration": "14.966667",
            "bit_rate": "2034318"
        },
        {
            "index": 1,
            "codec_name": "aac",
            "codec_long_name": "AAC (Advanced Audio Coding)",
            "profile": "LC",
            "codec_type": "audio",
            "sample_rate": "44100",
            "channels": 2,
            "bit_rate": "128017"
        }
    ],
    "format": {
        "filename": "clip.mp4",
        "nb_streams": 2,
        "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
        "duration": "14.976000",
        "tags": {
            "major_brand": "isom",
            "title": "Skatepark",
            "encoder": "Lavf60.3.100"
        }
    }
}
    "#;
    let parsed = assert_ok!(parse_ffprobe_output(output_video_audio.as_bytes()));
    assert_eq!(
        parsed.streams,
        vec![
            StreamInfo {
                media_type: MediaType::Video,
                codec_name: "h264".into()
            },
            StreamInfo {
                media_type: MediaType::Audio,
                codec_name: "aac".into()
            },
        ]
    );
    assert_eq!(parsed.title(), Some("Skatepark"));
    assert_eq!(parsed.format_tags.len(), 3);

    // make sure we don't choke on unexpected codec_type values or a missing format section
    let output_video_and_unknown = r#"
{
    "streams": [
        {
            "index": 0,
            "codec_name": "vp9",
            "codec_type": "video"
        },
        {
            "index": 1,
            "codec_type": "couldbeanythingreally"
        },
        {
            "index": 2,
            "codec_type": "audio"
        }
    ]
}
    "#;
    let parsed = assert_ok!(parse_ffprobe_output(output_video_and_unknown.as_bytes()));
    assert_eq!(parsed.video_codec(), Some("vp9"));
    assert_eq!(parsed.audio_codec(), None);
    assert!(parsed.format_tags.is_empty());
}

#[test]
fn garbage_ffprobe_output_is_an_error() {
    claims::assert_err!(parse_ffprobe_output(b"Invalid data found when processing input"));
}
