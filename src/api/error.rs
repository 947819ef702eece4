//! HTTP error responses
//!
//! Every failure leaves the API as `{success: false, error, code, message}`.
//! Client mistakes get a specific message; server-side failures are logged
//! with their cause and answered with a generic one.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::Error;

/// Error body returned by every endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    /// Machine-readable error code
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}

/// A core error on its way out of a handler.
#[derive(Debug)]
pub struct ApiError {
    error: Error,
    /// Title used for 5xx responses, e.g. "Upload failed"
    failure_title: &'static str,
}

impl ApiError {
    pub fn new(error: Error) -> Self {
        Self {
            error,
            failure_title: "Internal server error",
        }
    }

    /// Name the operation that failed, for server-side failures.
    pub fn during(mut self, failure_title: &'static str) -> Self {
        self.failure_title = failure_title;
        self
    }

    pub fn status(&self) -> StatusCode {
        match &self.error {
            Error::NoFile
            | Error::InvalidFileType { .. }
            | Error::InvalidUpload(_)
            | Error::InvalidRange(_)
            | Error::MultipleRanges => StatusCode::BAD_REQUEST,
            Error::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            Error::PathTraversal(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            Error::Configuration(_) | Error::Storage(_) | Error::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn body(&self) -> ErrorResponse {
        match &self.error {
            Error::NoFile => ErrorResponse::new(
                "No file uploaded",
                "NO_FILE",
                "Please select a file to upload",
            ),
            Error::InvalidFileType { .. } => ErrorResponse::new(
                "Invalid file type",
                "INVALID_FILE_TYPE",
                format!(
                    "{}. Only text files and audio files are allowed.",
                    self.error
                ),
            ),
            Error::FileTooLarge { limit } => ErrorResponse::new(
                "File too large",
                "FILE_TOO_LARGE",
                format!("File size must be less than {}MB", limit / (1024 * 1024)),
            ),
            Error::InvalidUpload(msg) => {
                ErrorResponse::new("Upload error", "INVALID_UPLOAD", msg.clone())
            }
            Error::InvalidRange(msg) => {
                ErrorResponse::new("Invalid range", "INVALID_RANGE", msg.clone())
            }
            Error::MultipleRanges => ErrorResponse::new(
                "Invalid range",
                "MULTIPLE_RANGES_UNSUPPORTED",
                "Only a single byte range per request is supported",
            ),
            Error::RangeNotSatisfiable { size } => ErrorResponse::new(
                "Range not satisfiable",
                "RANGE_NOT_SATISFIABLE",
                format!("No byte range can be served from a {} byte file", size),
            ),
            Error::PathTraversal(_) => ErrorResponse::new(
                "Access denied",
                "PATH_TRAVERSAL",
                "The requested path is outside the samples directory",
            ),
            Error::NotFound(_) => {
                ErrorResponse::new("Not found", "NOT_FOUND", "The requested file does not exist")
            }
            Error::NotImplemented(msg) => {
                ErrorResponse::new("Not implemented", "NOT_IMPLEMENTED", msg.clone())
            }
            Error::Configuration(_) => ErrorResponse::new(
                "Server configuration error",
                "CONFIGURATION_ERROR",
                "Cloud storage configuration is incomplete",
            ),
            Error::Storage(_) | Error::Io(_) => ErrorResponse::new(
                self.failure_title,
                "STORAGE_ERROR",
                "A storage error occurred while processing the request",
            ),
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        ApiError::new(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED {
            tracing::error!(error = %self.error, status = status.as_u16(), "{}", self.failure_title);
        } else {
            tracing::warn!(error = %self.error, status = status.as_u16(), "Request rejected");
        }

        let mut response = (status, Json(self.body())).into_response();

        if let Error::RangeNotSatisfiable { size } = self.error {
            if let Ok(value) = HeaderValue::try_from(format!("bytes */{}", size)) {
                response.headers_mut().insert(header::CONTENT_RANGE, value);
            }
        }

        response
    }
}
