use eyre::Report;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
pub enum IngestErrorKind {
    InvalidInput,
    UnsupportedMediaType,
    DownloadFailed,
    ProbeFailed,
    TranscodeFailed,
    StorageFailed,
    Cancelled,
}

/// Terminal failure of one ingestion. By the time a caller sees this, every file the ingestion
/// created has been removed.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),
    #[error("download failed")]
    DownloadFailed(#[source] Report),
    #[error("probe failed")]
    ProbeFailed(#[source] Report),
    #[error("transcode failed")]
    TranscodeFailed(#[source] Report),
    #[error("storage failed")]
    StorageFailed(#[source] Report),
    #[error("ingestion was cancelled")]
    Cancelled,
}

impl IngestError {
    pub fn kind(&self) -> IngestErrorKind {
        match self {
            IngestError::InvalidInput(_) => IngestErrorKind::InvalidInput,
            IngestError::UnsupportedMediaType(_) => IngestErrorKind::UnsupportedMediaType,
            IngestError::DownloadFailed(_) => IngestErrorKind::DownloadFailed,
            IngestError::ProbeFailed(_) => IngestErrorKind::ProbeFailed,
            IngestError::TranscodeFailed(_) => IngestErrorKind::TranscodeFailed,
            IngestError::StorageFailed(_) => IngestErrorKind::StorageFailed,
            IngestError::Cancelled => IngestErrorKind::Cancelled,
        }
    }

    /// Human readable detail including the whole cause chain.
    pub fn details(&self) -> String {
        match self {
            IngestError::InvalidInput(detail) | IngestError::UnsupportedMediaType(detail) => {
                detail.clone()
            }
            IngestError::DownloadFailed(report)
            | IngestError::ProbeFailed(report)
            | IngestError::TranscodeFailed(report)
            | IngestError::StorageFailed(report) => report
                .chain()
                .map(|cause| cause.to_string())
                .collect::<Vec<_>>()
                .join(": "),
            IngestError::Cancelled => "the request was aborted before the media was stored".into(),
        }
    }

    /// Client mistakes, as opposed to failures on our side.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.kind(),
            IngestErrorKind::InvalidInput | IngestErrorKind::UnsupportedMediaType
        )
    }
}

#[test]
fn details_include_cause_chain() {
    use eyre::WrapErr;

    let io_err = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
    let report = Err::<(), _>(io_err)
        .wrap_err("writing catalog")
        .unwrap_err();
    let err = IngestError::StorageFailed(report);
    assert_eq!(err.kind(), IngestErrorKind::StorageFailed);
    assert_eq!(err.kind().to_string(), "StorageFailed");
    assert_eq!(err.details(), "writing catalog: disk on fire");
    assert!(!err.is_client_error());
    assert!(IngestError::InvalidInput("x".into()).is_client_error());
}
