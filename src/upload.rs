//! Upload intake
//!
//! Validates an uploaded file and persists it to the sink chosen by the
//! operating mode: the flat samples directory in local-test mode, the object
//! store under a generated key in cloud mode.

use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;

use crate::catalog::local_storage_key;
use crate::keys::{build_key, final_component};
use crate::media::{correct_generic_mime, extension_of, is_accepted_upload_type};
use crate::mode::{ModeSettings, OperatingMode};
use crate::origin::RequestOrigin;
use crate::storage::{PutOptions, SamplesDir, StorageBackend};
use crate::types::UploadReceipt;
use crate::{Error, Result};

/// Default upload ceiling: 100 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// Multipart field carrying the story file.
pub const UPLOAD_FIELD: &str = "story";

/// A file as received from the client, before validation.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub original_name: String,
    pub mime_type: Option<String>,
    pub data: Bytes,
}

/// A file that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedUpload {
    pub original_name: String,
    pub mime_type: String,
    pub data: Bytes,
}

/// Check type and size of an incoming file.
///
/// Generic binary types are corrected from the extension before the accepted
/// type list is consulted.
pub fn validate(file: IncomingFile, max_bytes: u64) -> Result<ValidatedUpload> {
    if file.data.len() as u64 > max_bytes {
        return Err(Error::FileTooLarge { limit: max_bytes });
    }

    let original_name = final_component(&file.original_name);
    if original_name.is_empty() {
        return Err(Error::InvalidUpload("file name is missing".to_string()));
    }

    let mime_type = correct_generic_mime(file.mime_type.as_deref(), &original_name);
    if !is_accepted_upload_type(&mime_type) {
        let extension = extension_of(&original_name)
            .map(|ext| format!(".{}", ext))
            .unwrap_or_else(|| "none".to_string());
        return Err(Error::InvalidFileType {
            mime_type,
            extension,
        });
    }

    Ok(ValidatedUpload {
        original_name,
        mime_type,
        data: file.data,
    })
}

/// Fail with a configuration error unless every cloud setting is present.
pub fn ensure_cloud_ready(settings: &ModeSettings) -> Result<()> {
    let missing = settings.cloud.missing();
    if missing.is_empty() {
        return Ok(());
    }
    Err(Error::configuration(format!(
        "cloud storage configuration is incomplete (missing: {})",
        missing.join(", ")
    )))
}

/// Persists validated uploads.
#[derive(Clone)]
pub struct UploadService {
    samples: SamplesDir,
    store: Option<Arc<dyn StorageBackend>>,
}

impl UploadService {
    pub fn new(samples: SamplesDir, store: Option<Arc<dyn StorageBackend>>) -> Self {
        Self { samples, store }
    }

    /// Store an upload according to the resolved mode.
    pub async fn store(
        &self,
        upload: ValidatedUpload,
        mode: OperatingMode,
        settings: &ModeSettings,
        origin: &RequestOrigin,
    ) -> Result<UploadReceipt> {
        match mode {
            OperatingMode::LocalTest => self.store_local(upload, origin).await,
            OperatingMode::Cloud => self.store_cloud(upload, settings).await,
        }
    }

    async fn store_local(
        &self,
        upload: ValidatedUpload,
        origin: &RequestOrigin,
    ) -> Result<UploadReceipt> {
        let saved = self.samples.save(&upload.original_name, &upload.data).await?;

        tracing::info!(
            file = %saved.file_name,
            size_bytes = upload.data.len(),
            mime_type = %upload.mime_type,
            "Stored upload in samples directory"
        );

        Ok(UploadReceipt {
            location: origin.file_url(&saved.file_name),
            storage_key: local_storage_key(&saved.file_name),
            file_name: saved.file_name,
            file_size: upload.data.len() as u64,
            file_type: upload.mime_type,
            uploaded_at: Utc::now(),
            test_mode: true,
        })
    }

    async fn store_cloud(
        &self,
        upload: ValidatedUpload,
        settings: &ModeSettings,
    ) -> Result<UploadReceipt> {
        ensure_cloud_ready(settings)?;
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| Error::configuration("cloud object store is not configured"))?;

        let key = build_key(&upload.original_name, &upload.mime_type);
        let uploaded_at = Utc::now();
        let file_size = upload.data.len() as u64;

        let options = PutOptions::default()
            .with_content_type(upload.mime_type.clone())
            .with_metadata("original-name", upload.original_name.clone())
            .with_metadata("uploaded-at", uploaded_at.to_rfc3339());

        store.put(&key, upload.data, options).await?;

        tracing::info!(
            key = %key,
            size_bytes = file_size,
            mime_type = %upload.mime_type,
            "Stored upload in object store"
        );

        Ok(UploadReceipt {
            file_name: upload.original_name,
            file_size,
            file_type: upload.mime_type,
            location: store.object_url(&key),
            storage_key: key,
            uploaded_at,
            test_mode: false,
        })
    }
}
