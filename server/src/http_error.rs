use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use eyre;
use reelbin_core::{catalog::CatalogError, ingest::IngestError};

use crate::schema::ErrorBody;

#[derive(Debug)]
pub enum HttpError {
    Ingest(IngestError),
    PayloadTooLarge(String),
    Internal(eyre::Report),
}

impl HttpError {
    pub fn invalid_input(details: impl Into<String>) -> Self {
        HttpError::Ingest(IngestError::InvalidInput(details.into()))
    }

    /// Map an axum extractor rejection, keeping the body limit's 413.
    pub fn from_rejection(status: StatusCode, body_text: String) -> Self {
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            HttpError::PayloadTooLarge(body_text)
        } else {
            HttpError::invalid_input(body_text)
        }
    }

    fn status_and_body(&self) -> (StatusCode, ErrorBody) {
        match self {
            HttpError::Ingest(err) => {
                let status = if err.is_client_error() {
                    StatusCode::BAD_REQUEST
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                (
                    status,
                    ErrorBody {
                        error: err.kind().to_string(),
                        details: err.details(),
                    },
                )
            }
            HttpError::PayloadTooLarge(details) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                ErrorBody {
                    error: "PayloadTooLarge".to_string(),
                    details: details.clone(),
                },
            ),
            HttpError::Internal(report) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    error: "StorageFailed".to_string(),
                    details: report
                        .chain()
                        .map(|cause| cause.to_string())
                        .collect::<Vec<_>>()
                        .join(": "),
                },
            ),
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        if status.is_server_error() {
            tracing::error!(error = %body.error, details = %body.details, "request failed");
        } else {
            tracing::debug!(%status, error = %body.error, details = %body.details, "request rejected");
        }
        (status, Json(body)).into_response()
    }
}

macro_rules! impl_from {
    ($from:ty) => {
        impl From<$from> for HttpError {
            fn from(err: $from) -> Self {
                Self::Internal(err.into())
            }
        }
    };
}

impl_from!(std::io::Error);
impl_from!(color_eyre::Report);
impl_from!(CatalogError);

impl From<IngestError> for HttpError {
    fn from(err: IngestError) -> Self {
        HttpError::Ingest(err)
    }
}

pub type ApiResult<T> = Result<T, HttpError>;

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (_, body) = self.status_and_body();
        write!(f, "{}: {}", body.error, body.details)
    }
}
