use camino::Utf8Path as Path;
use chrono::{DateTime, Utc};

use crate::model::SourceKind;

pub struct TitleInputs<'a> {
    /// Title given by the caller with the request
    pub explicit: Option<&'a str>,
    /// Title tag embedded in the source container
    pub embedded: Option<&'a str>,
    pub kind: SourceKind,
    pub created_at: DateTime<Utc>,
    /// Client-side name of the upload, if any
    pub original_name: Option<&'a str>,
    pub final_path: &'a Path,
    pub generated_titles: bool,
}

/// Caller title, then embedded tag, then a generated or file name based fallback.
/// Never returns an empty string.
pub fn resolve_display_name(inputs: &TitleInputs<'_>) -> String {
    non_blank(inputs.explicit)
        .or_else(|| non_blank(inputs.embedded))
        .map(str::to_string)
        .or_else(|| inputs.generated_titles.then(|| generated_title(inputs)))
        .unwrap_or_else(|| filename_title(inputs))
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn generated_title(inputs: &TitleInputs<'_>) -> String {
    let kind = match inputs.kind {
        SourceKind::Upload => "Uploaded",
        SourceKind::Remote => "Remote",
    };
    format!("{} clip {}", kind, inputs.created_at.format("%Y-%m-%d %H:%M:%S UTC"))
}

fn filename_title(inputs: &TitleInputs<'_>) -> String {
    let from_original = inputs
        .original_name
        .map(Path::new)
        .and_then(|p| p.file_stem())
        .and_then(|s| non_blank(Some(s)));
    let from_final = inputs.final_path.file_stem().and_then(|s| non_blank(Some(s)));
    from_original
        .or(from_final)
        .map(str::to_string)
        .unwrap_or_else(|| generated_title(inputs))
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::*;

    fn inputs<'a>(explicit: Option<&'a str>, embedded: Option<&'a str>) -> TitleInputs<'a> {
        TitleInputs {
            explicit,
            embedded,
            kind: SourceKind::Upload,
            created_at: "2024-05-01T10:00:00Z".parse().unwrap(),
            original_name: Some("holiday.mov"),
            final_path: Path::new("/m/0190f3a2.mp4"),
            generated_titles: true,
        }
    }

    #[test]
    fn explicit_beats_embedded() {
        assert_eq!(resolve_display_name(&inputs(Some("A"), Some("B"))), "A");
    }

    #[test]
    fn embedded_used_without_explicit() {
        assert_eq!(resolve_display_name(&inputs(None, Some("B"))), "B");
        assert_eq!(resolve_display_name(&inputs(Some("   "), Some("B"))), "B");
    }

    #[test]
    fn generated_fallback() {
        assert_eq!(
            resolve_display_name(&inputs(None, None)),
            "Uploaded clip 2024-05-01 10:00:00 UTC"
        );
        let remote = TitleInputs {
            kind: SourceKind::Remote,
            original_name: None,
            ..inputs(None, Some(""))
        };
        assert_eq!(
            resolve_display_name(&remote),
            "Remote clip 2024-05-01 10:00:00 UTC"
        );
    }

    #[test]
    fn filename_fallback_when_generated_titles_disabled() {
        let from_upload_name = TitleInputs {
            generated_titles: false,
            ..inputs(None, None)
        };
        assert_eq!(resolve_display_name(&from_upload_name), "holiday");
        let from_final_name = TitleInputs {
            generated_titles: false,
            original_name: None,
            ..inputs(None, None)
        };
        assert_eq!(resolve_display_name(&from_final_name), "0190f3a2");
    }

    proptest! {
        #[test]
        fn display_name_is_never_empty(
            explicit in proptest::option::of("\\PC{0,8}"),
            embedded in proptest::option::of("\\PC{0,8}"),
            original in proptest::option::of("[ .a-z]{0,8}"),
            generated_titles: bool,
        ) {
            let inputs = TitleInputs {
                explicit: explicit.as_deref(),
                embedded: embedded.as_deref(),
                kind: SourceKind::Remote,
                created_at: Utc::now(),
                original_name: original.as_deref(),
                final_path: Path::new("/m/x.mp4"),
                generated_titles,
            };
            let name = resolve_display_name(&inputs);
            prop_assert!(!name.trim().is_empty());
            if let Some(e) = explicit.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
                prop_assert_eq!(name, e);
            }
        }
    }
}
