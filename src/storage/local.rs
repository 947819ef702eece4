//! Local filesystem storage backend
//!
//! Emulates a bucket under a root directory so cloud mode can run without
//! network access. Keys map to relative paths.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::path::{Component, Path, PathBuf};
use tokio::fs;

use crate::types::ObjectSummary;
use crate::{Error, Result};

use super::{PutOptions, StorageBackend};

/// Local filesystem storage
pub struct LocalStorage {
    root_path: PathBuf,
    public_base_url: String,
}

impl LocalStorage {
    pub fn new(root_path: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Result<Self> {
        let root_path = root_path.into();
        std::fs::create_dir_all(&root_path)?;
        Ok(Self {
            root_path,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn resolve_path(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(Error::storage(format!("invalid object key: {}", key)));
        }
        Ok(self.root_path.join(relative))
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root_path).ok()?;
        let parts: Vec<&str> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        Some(parts.join("/"))
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    async fn put(&self, key: &str, data: Bytes, _options: PutOptions) -> Result<()> {
        let path = self.resolve_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, &data).await?;
        Ok(())
    }

    async fn list(&self, prefix: &str, max_keys: i32) -> Result<Vec<ObjectSummary>> {
        let limit = max_keys.max(0) as usize;
        let mut results = Vec::new();

        // Walk from the deepest directory the prefix names, then filter by
        // the full prefix string like S3 does.
        let dir_part = match prefix.rfind('/') {
            Some(idx) => &prefix[..idx],
            None => "",
        };
        let start = if dir_part.is_empty() {
            self.root_path.clone()
        } else {
            self.resolve_path(dir_part)?
        };

        if !fs::try_exists(&start).await? {
            return Ok(results);
        }

        let mut pending = vec![start];
        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Some(key) = self.key_for(&path) else {
                    continue;
                };
                if !key.starts_with(prefix) {
                    continue;
                }
                let metadata = entry.metadata().await?;
                results.push(ObjectSummary {
                    key,
                    size: metadata.len(),
                    last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
                });
            }
        }

        // S3 lists keys in lexicographic order
        results.sort_by(|a, b| a.key.cmp(&b.key));
        results.truncate(limit);
        Ok(results)
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }
}
