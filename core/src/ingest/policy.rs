use serde::Deserialize;

use crate::processing::video::{ffprobe::ProbeResult, transcode::matches_canonical_profile};

/// Whether accepted sources are always re-encoded or only when they are not already in the
/// canonical profile. Chosen once from config at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, strum::EnumString, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum NormalizePolicy {
    Always,
    #[default]
    IfNeeded,
}

impl NormalizePolicy {
    pub fn requires_transcode(&self, probe: &ProbeResult) -> bool {
        match self {
            NormalizePolicy::Always => true,
            NormalizePolicy::IfNeeded => !matches_canonical_profile(probe),
        }
    }
}

#[test]
fn policy_decisions() {
    use crate::processing::video::ffprobe::{MediaType, StreamInfo};

    let canonical = ProbeResult {
        streams: vec![
            StreamInfo {
                media_type: MediaType::Video,
                codec_name: "h264".into(),
            },
            StreamInfo {
                media_type: MediaType::Audio,
                codec_name: "aac".into(),
            },
        ],
        ..Default::default()
    };
    assert!(NormalizePolicy::Always.requires_transcode(&canonical));
    assert!(!NormalizePolicy::IfNeeded.requires_transcode(&canonical));
    // nothing known about the source: play it safe
    assert!(NormalizePolicy::IfNeeded.requires_transcode(&ProbeResult::default()));
    assert_eq!("if-needed".parse::<NormalizePolicy>().unwrap(), NormalizePolicy::IfNeeded);
    assert_eq!("always".parse::<NormalizePolicy>().unwrap(), NormalizePolicy::Always);
}
