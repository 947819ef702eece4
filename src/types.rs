//! Core types for storyvault

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::media::Category;

/// A story as presented to clients by the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoryRecord {
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub storage_key: String,
    pub location: String,
    pub uploaded_at: DateTime<Utc>,
    pub category: Category,
}

impl StoryRecord {
    /// Build a record, deriving the category from the MIME type.
    pub fn new(
        file_name: impl Into<String>,
        file_size: u64,
        file_type: impl Into<String>,
        storage_key: impl Into<String>,
        location: impl Into<String>,
        uploaded_at: DateTime<Utc>,
    ) -> Self {
        let file_type = file_type.into();
        let category = Category::from_mime(&file_type);
        Self {
            file_name: file_name.into(),
            file_size,
            file_type,
            storage_key: storage_key.into(),
            location: location.into(),
            uploaded_at,
            category,
        }
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub storage_key: String,
    pub location: String,
    pub uploaded_at: DateTime<Utc>,
    pub test_mode: bool,
}

/// Metadata of one object returned by a prefix listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}
