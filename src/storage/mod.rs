//! Storage abstraction layer
//!
//! `StorageBackend` is the cloud object store used in cloud mode (S3, or a
//! filesystem emulation of a bucket for development). `SamplesDir` is the flat
//! directory used in local-test mode.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;

use crate::types::ObjectSummary;
use crate::Result;

pub mod local;
pub mod s3;
pub mod samples;

pub use samples::SamplesDir;

/// Largest number of keys a single catalog listing asks for.
pub const LIST_PAGE_SIZE: i32 = 100;

/// Options attached to a stored object
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    pub content_type: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl PutOptions {
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Object store backend trait
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write object to storage
    async fn put(&self, key: &str, data: Bytes, options: PutOptions) -> Result<()>;

    /// List at most `max_keys` objects under a prefix (single page)
    async fn list(&self, prefix: &str, max_keys: i32) -> Result<Vec<ObjectSummary>>;

    /// Direct URL clients can fetch the object from
    fn object_url(&self, key: &str) -> String;
}

/// Storage configuration
#[derive(Debug, Clone)]
pub enum StorageConfig {
    S3 {
        bucket: String,
        region: String,
        access_key_id: String,
        secret_access_key: String,
        endpoint: Option<String>,
    },
    Local {
        root_path: String,
        public_base_url: String,
    },
}

/// Create storage backend from config
pub async fn create_storage(config: StorageConfig) -> Result<Box<dyn StorageBackend>> {
    match config {
        StorageConfig::S3 {
            bucket,
            region,
            access_key_id,
            secret_access_key,
            endpoint,
        } => {
            let backend =
                s3::S3Storage::new(bucket, region, access_key_id, secret_access_key, endpoint)
                    .await?;
            Ok(Box::new(backend))
        }
        StorageConfig::Local {
            root_path,
            public_base_url,
        } => {
            let backend = local::LocalStorage::new(root_path, public_base_url)?;
            Ok(Box::new(backend))
        }
    }
}
