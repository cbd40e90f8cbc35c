//! JSON error responses for the merge API.
//!
//! Every failure leaves the server as `{"error": "<message>"}` with the
//! status taken from the core error classification. Internal failures share
//! one generic message; the underlying text is only attached as `detail`
//! when the server is configured to expose it.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::multipart::MultipartError;
use pdf_merge_core::{Error, ErrorKind};
use serde::Serialize;
use tracing::{error, warn};

/// Standard result type for API handlers.
pub type RouteResult<T> = Result<T, ApiError>;

/// Error response of the merge API.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: &'static str,
    detail: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<&'a str>,
}

const fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorKind::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorKind::MergeFailed => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    /// Map a core error, logging it at a level matching its status.
    pub fn from_merge(err: &Error, expose_detail: bool) -> Self {
        let status = status_for(err.kind());
        if status.is_server_error() {
            error!("Merge failed: {}", err);
        } else {
            warn!("Rejected merge request: {}", err);
        }

        Self {
            status,
            message: err.public_message(),
            detail: (expose_detail && status.is_server_error()).then(|| err.to_string()),
        }
    }

    /// Map a failure while reading the multipart body.
    ///
    /// Hitting the transport body limit is reported like any other
    /// oversized upload; everything else is an internal failure.
    pub fn from_multipart(err: &MultipartError, expose_detail: bool) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            warn!("Upload exceeded body limit: {}", err.body_text());
            return Self {
                status: StatusCode::PAYLOAD_TOO_LARGE,
                message: ErrorKind::PayloadTooLarge.public_message(),
                detail: None,
            };
        }

        Self::internal(err.body_text(), expose_detail)
    }

    /// Generic 500 for failures outside the merge itself.
    pub fn internal(reason: impl std::fmt::Display, expose_detail: bool) -> Self {
        let reason = reason.to_string();
        error!("Internal error: {}", reason);

        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: ErrorKind::MergeFailed.public_message(),
            detail: expose_detail.then_some(reason),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            detail: self.detail.as_deref(),
        });

        (self.status, body).into_response()
    }
}

/// Extension trait for converting results into [`ApiError`]s.
pub trait ResultExt<T> {
    /// Converts the error to a generic 500.
    fn or_internal_error(self, expose_detail: bool) -> RouteResult<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn or_internal_error(self, expose_detail: bool) -> RouteResult<T> {
        self.map_err(|e| ApiError::internal(e, expose_detail))
    }
}
