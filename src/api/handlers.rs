//! API handlers

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use bytes::BytesMut;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::error::{ApiError, ErrorResponse};
use crate::api::AppState;
use crate::origin::RequestOrigin;
use crate::types::{StoryRecord, UploadReceipt};
use crate::upload::{ensure_cloud_ready, validate, IncomingFile, UPLOAD_FIELD};
use crate::Error;

/// Service liveness
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        timestamp: Utc::now(),
        service: state.service_name.clone(),
    })
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub service: String,
}

/// Accept a story file from the multipart field `story`
pub async fn upload(
    State(state): State<AppState>,
    origin: RequestOrigin,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let (mode, settings) = state.resolve_mode().await;

    // Refuse before reading the body when cloud mode cannot store anything.
    if !mode.is_test() {
        ensure_cloud_ready(&settings).map_err(|e| ApiError::new(e).during("Upload failed"))?;
    }

    let multipart = multipart
        .map_err(|rejection| Error::InvalidUpload(rejection.body_text()))?;
    let incoming = read_story_field(multipart, state.max_upload_bytes).await?;
    let upload = validate(incoming, state.max_upload_bytes)?;

    let receipt = state
        .uploads
        .store(upload, mode, &settings, &origin)
        .await
        .map_err(|e| ApiError::new(e).during("Upload failed"))?;

    tracing::info!(
        %mode,
        file = %receipt.file_name,
        storage_key = %receipt.storage_key,
        size_bytes = receipt.file_size,
        "Story uploaded"
    );

    Ok(Json(UploadResponse {
        success: true,
        message: "File uploaded successfully".to_string(),
        data: receipt,
    }))
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub data: UploadReceipt,
}

/// Pull the story file out of a multipart body.
///
/// Fields other than `story` are skipped, as are `story` fields that carry
/// no file name (plain form values).
async fn read_story_field(mut multipart: Multipart, max_bytes: u64) -> Result<IncomingFile, Error> {
    let to_error = |err: MultipartError| {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Error::FileTooLarge { limit: max_bytes }
        } else {
            Error::InvalidUpload(err.body_text())
        }
    };

    while let Some(mut field) = multipart.next_field().await.map_err(to_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let Some(original_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let mime_type = field.content_type().map(str::to_string);

        let mut data = BytesMut::new();
        while let Some(chunk) = field.chunk().await.map_err(to_error)? {
            if (data.len() + chunk.len()) as u64 > max_bytes {
                return Err(Error::FileTooLarge { limit: max_bytes });
            }
            data.extend_from_slice(&chunk);
        }

        // An empty file input still submits a part with an empty file name.
        if original_name.trim().is_empty() && data.is_empty() {
            return Err(Error::NoFile);
        }

        return Ok(IncomingFile {
            original_name,
            mime_type,
            data: data.freeze(),
        });
    }

    Err(Error::NoFile)
}

/// List stories from the sink of the current mode
pub async fn list_stories(
    State(state): State<AppState>,
    origin: RequestOrigin,
) -> Result<Json<StoriesResponse>, ApiError> {
    let (mode, _) = state.resolve_mode().await;

    let stories = state
        .catalog
        .list_stories(mode, &origin)
        .await
        .map_err(|e| ApiError::new(e).during("Failed to fetch stories"))?;

    Ok(Json(StoriesResponse {
        success: true,
        total_count: stories.len(),
        stories,
        test_mode: mode.is_test(),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoriesResponse {
    pub success: bool,
    pub stories: Vec<StoryRecord>,
    pub total_count: usize,
    pub test_mode: bool,
}

/// Stream a file from the samples directory, honouring `Range`
///
/// The name is taken from the raw request path so that it is
/// percent-decoded exactly once, by the samples directory.
pub async fn serve_file(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let (mode, _) = state.resolve_mode().await;
    if !mode.is_test() {
        return Err(Error::NotImplemented(
            "Files are served directly from cloud storage; use the story location URL".to_string(),
        )
        .into());
    }

    let requested = uri.path().strip_prefix("/file/").unwrap_or_default();

    let range = headers
        .get(header::RANGE)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| Error::invalid_range("range header is not valid ASCII"))
        })
        .transpose()?;

    let stream = state
        .streamer
        .serve_file(requested, range)
        .await
        .map_err(|e| ApiError::new(e).during("Failed to stream file"))?;

    Ok(stream.into_response())
}

/// JSON 404 for unknown routes
pub async fn not_found() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new(
            "Not found",
            "NOT_FOUND",
            "The requested endpoint does not exist",
        )),
    )
}
