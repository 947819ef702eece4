//! Flat samples directory used in local-test mode.
//!
//! Files are stored directly under the directory by their original name.
//! Requested names are resolved with a lexical normalisation followed by a
//! prefix check, and a second check on the canonical path once the target is
//! known to exist.

use chrono::{DateTime, Utc};
use std::path::{Component, Path, PathBuf};
use tokio::fs;

use crate::keys::{final_component, split_file_name};
use crate::{Error, Result};

/// One regular file found in the samples directory.
#[derive(Debug, Clone)]
pub struct SampleEntry {
    pub file_name: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// A file written by [`SamplesDir::save`].
#[derive(Debug, Clone)]
pub struct SavedSample {
    pub file_name: String,
    pub path: PathBuf,
}

/// Local samples directory
#[derive(Debug, Clone)]
pub struct SamplesDir {
    root: PathBuf,
}

impl SamplesDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Create the directory if it does not exist yet.
    pub async fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Non-recursive listing of regular files.
    ///
    /// A missing directory is an error: it is created by the setup step and
    /// its absence means the deployment is broken, not that it is empty.
    pub async fn list(&self) -> Result<Vec<SampleEntry>> {
        let mut entries = fs::read_dir(&self.root).await.map_err(|e| {
            Error::storage(format!(
                "failed to read samples directory {}: {}",
                self.root.display(),
                e
            ))
        })?;

        let mut results = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            // Follow symlinks so linked samples are listed like plain files
            let metadata = match fs::metadata(entry.path()).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!(path = %entry.path().display(), error = %e, "Skipping unreadable sample");
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }
            let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };

            let modified = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());

            results.push(SampleEntry {
                file_name,
                size: metadata.len(),
                modified,
            });
        }

        Ok(results)
    }

    /// Store an upload under its original file name.
    ///
    /// Taken names get a numeric suffix: `story.txt`, `story-1.txt`,
    /// `story-2.txt`, ... The existence check and the write are separate
    /// steps, so two concurrent uploads of the same name can still race for
    /// the same slot.
    pub async fn save(&self, original_name: &str, data: &[u8]) -> Result<SavedSample> {
        let file_name = final_component(original_name);
        if file_name.is_empty() || file_name == "." || file_name == ".." {
            return Err(Error::InvalidUpload(format!(
                "unusable file name: {:?}",
                original_name
            )));
        }

        let (base_name, extension) = split_file_name(&file_name);
        let mut candidate = file_name.clone();
        let mut counter = 0u32;
        while fs::try_exists(self.root.join(&candidate)).await? {
            counter += 1;
            candidate = format!("{}-{}{}", base_name, counter, extension);
        }

        let path = self.root.join(&candidate);
        fs::write(&path, data).await.map_err(|e| {
            Error::storage(format!("failed to write {}: {}", path.display(), e))
        })?;

        if counter > 0 {
            tracing::info!(original = %file_name, stored = %candidate, "Disambiguated duplicate upload name");
        }

        Ok(SavedSample {
            file_name: candidate,
            path,
        })
    }

    /// Resolve a percent-encoded requested name to a file inside the
    /// directory.
    pub async fn resolve(&self, requested_name: &str) -> Result<PathBuf> {
        let decoded = urlencoding::decode(requested_name)
            .map_err(|_| Error::NotFound(requested_name.to_string()))?
            .into_owned();

        if decoded.contains('\0') {
            return Err(Error::NotFound(decoded));
        }

        // Both separator styles count, whatever the host platform.
        let relative = decoded.replace('\\', "/");
        let base = normalize(&std::path::absolute(&self.root)?);
        let target = normalize(&base.join(&relative));
        if !target.starts_with(&base) {
            return Err(Error::PathTraversal(decoded));
        }

        let metadata = match fs::metadata(&target).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(decoded))
            }
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_file() {
            return Err(Error::NotFound(decoded));
        }

        // Symlinks inside the directory must not lead out of it
        let canonical_base = fs::canonicalize(&base).await?;
        let canonical_target = fs::canonicalize(&target).await?;
        if !canonical_target.starts_with(&canonical_base) {
            return Err(Error::PathTraversal(decoded));
        }

        Ok(canonical_target)
    }
}

/// Lexically normalise a path: drop `.`, apply `..`, keep roots.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
            Component::RootDir => normalized.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            Component::Normal(part) => normalized.push(part),
        }
    }
    normalized
}
