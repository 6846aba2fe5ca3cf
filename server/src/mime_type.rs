/// File extension to store an upload under, from its declared MIME type.
pub fn extension_for_mime_type(mime_type: &str) -> Option<&'static str> {
    let essence = mime_type.split(';').next()?.trim().to_ascii_lowercase();
    match essence.as_str() {
        "video/mp4" => Some("mp4"),
        "video/quicktime" => Some("mov"),
        "video/webm" => Some("webm"),
        "video/x-matroska" => Some("mkv"),
        "video/x-msvideo" => Some("avi"),
        "video/mpeg" => Some("mpeg"),
        "video/3gpp" => Some("3gp"),
        "video/x-m4v" => Some("m4v"),
        _ => None,
    }
}

/// Extension for an uploaded file: from the MIME type if we know it, else from the client's
/// file name if it looks sane, else `bin`.
pub fn upload_extension(mime_type: Option<&str>, file_name: Option<&str>) -> String {
    if let Some(ext) = mime_type.and_then(extension_for_mime_type) {
        return ext.to_string();
    }
    file_name
        .and_then(|name| camino::Utf8Path::new(name).extension())
        .filter(|ext| {
            !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| {
            tracing::warn!(?mime_type, ?file_name, "can't guess extension for upload");
            "bin".to_string()
        })
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn extension_prefers_mime_type() {
        assert_eq!(upload_extension(Some("video/quicktime"), Some("a.mp4")), "mov");
        assert_eq!(upload_extension(Some("Video/MP4; codecs=avc1"), None), "mp4");
    }

    #[test]
    fn extension_falls_back_to_file_name_then_bin() {
        assert_eq!(upload_extension(Some("application/x-whatever"), Some("clip.MKV")), "mkv");
        assert_eq!(upload_extension(None, Some("../../etc/passwd")), "bin");
        assert_eq!(upload_extension(None, Some("x.sh;rm -rf")), "bin");
        assert_eq!(upload_extension(None, None), "bin");
    }
}
