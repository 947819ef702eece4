//! S3 storage backend

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::types::ObjectSummary;
use crate::{Error, Result};

use super::{PutOptions, StorageBackend};

/// S3 storage backend
pub struct S3Storage {
    client: Client,
    bucket: String,
    region: String,
    endpoint: Option<String>,
}

impl S3Storage {
    pub async fn new(
        bucket: String,
        region: String,
        access_key_id: String,
        secret_access_key: String,
        endpoint: Option<String>,
    ) -> Result<Self> {
        let credentials = Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "storyvault-config",
        );

        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&config);

        if let Some(endpoint_url) = endpoint.as_deref() {
            s3_config_builder = s3_config_builder
                .endpoint_url(endpoint_url)
                .force_path_style(true);
        }

        let s3_config = s3_config_builder.build();
        let client = Client::from_conf(s3_config);

        Ok(Self {
            client,
            bucket,
            region,
            endpoint: endpoint.map(|e| e.trim_end_matches('/').to_string()),
        })
    }
}

#[async_trait]
impl StorageBackend for S3Storage {
    async fn put(&self, key: &str, data: Bytes, options: PutOptions) -> Result<()> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data));

        if let Some(content_type) = options.content_type {
            request = request.content_type(content_type);
        }
        for (name, value) in options.metadata {
            request = request.metadata(name, value);
        }

        request
            .send()
            .await
            .map_err(|e| Error::storage(format!("S3 put failed: {}", e)))?;

        tracing::info!(bucket = %self.bucket, key, "Object uploaded to S3");
        Ok(())
    }

    async fn list(&self, prefix: &str, max_keys: i32) -> Result<Vec<ObjectSummary>> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .max_keys(max_keys)
            .send()
            .await
            .map_err(|e| Error::storage(format!("S3 list failed: {}", e)))?;

        if response.is_truncated().unwrap_or(false) {
            tracing::debug!(prefix, max_keys, "S3 listing truncated to a single page");
        }

        let objects = response
            .contents()
            .iter()
            .filter_map(|obj| {
                let key = obj.key()?.to_string();
                let last_modified = obj.last_modified().and_then(|ts| {
                    DateTime::<Utc>::from_timestamp(ts.secs(), ts.subsec_nanos())
                });
                Some(ObjectSummary {
                    key,
                    size: obj.size().unwrap_or(0).max(0) as u64,
                    last_modified,
                })
            })
            .collect();

        Ok(objects)
    }

    fn object_url(&self, key: &str) -> String {
        match &self.endpoint {
            Some(endpoint) => format!("{}/{}/{}", endpoint, self.bucket, key),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, key
            ),
        }
    }
}
