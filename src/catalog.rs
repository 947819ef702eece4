//! Story catalog
//!
//! Produces the list of available stories either from the local samples
//! directory or from the cloud object store, normalised into `StoryRecord`.
//! Every call reads the backing store afresh.

use std::sync::Arc;

use crate::keys::{parse_key, STORIES_PREFIX};
use crate::media::{mime_for_categorized_name, mime_for_file_name};
use crate::mode::OperatingMode;
use crate::origin::RequestOrigin;
use crate::storage::{SamplesDir, StorageBackend, LIST_PAGE_SIZE};
use crate::types::StoryRecord;
use crate::{Error, Result};

/// Folder segment used in local-test storage keys.
pub const LOCAL_KEY_FOLDER: &str = "local";

/// Catalog assembler
#[derive(Clone)]
pub struct Catalog {
    samples: SamplesDir,
    store: Option<Arc<dyn StorageBackend>>,
}

impl Catalog {
    pub fn new(samples: SamplesDir, store: Option<Arc<dyn StorageBackend>>) -> Self {
        Self { samples, store }
    }

    /// List stories for the given mode, newest first.
    pub async fn list_stories(
        &self,
        mode: OperatingMode,
        origin: &RequestOrigin,
    ) -> Result<Vec<StoryRecord>> {
        match mode {
            OperatingMode::LocalTest => self.list_local(origin).await,
            OperatingMode::Cloud => self.list_cloud().await,
        }
    }

    /// Stories in the samples directory, with URLs pointing back at this
    /// server as the client reached it.
    pub async fn list_local(&self, origin: &RequestOrigin) -> Result<Vec<StoryRecord>> {
        let entries = self.samples.list().await?;

        let mut stories: Vec<StoryRecord> = entries
            .into_iter()
            .map(|entry| {
                let file_type = mime_for_file_name(&entry.file_name);
                StoryRecord::new(
                    entry.file_name.clone(),
                    entry.size,
                    file_type,
                    local_storage_key(&entry.file_name),
                    origin.file_url(&entry.file_name),
                    entry.modified,
                )
            })
            .collect();

        sort_newest_first(&mut stories);
        tracing::debug!(count = stories.len(), "Listed local stories");
        Ok(stories)
    }

    /// Stories in the object store under `stories/`, first page only.
    pub async fn list_cloud(&self) -> Result<Vec<StoryRecord>> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| Error::configuration("cloud object store is not configured"))?;

        let objects = store.list(STORIES_PREFIX, LIST_PAGE_SIZE).await?;

        let mut stories: Vec<StoryRecord> = objects
            .into_iter()
            .filter(|object| object.key != STORIES_PREFIX)
            .filter_map(|object| {
                let parsed = parse_key(&object.key)?;
                let file_type = mime_for_categorized_name(parsed.category, &parsed.original_name);
                let uploaded_at = object.last_modified.unwrap_or_default();
                Some(StoryRecord::new(
                    parsed.original_name,
                    object.size,
                    file_type,
                    object.key.clone(),
                    store.object_url(&object.key),
                    uploaded_at,
                ))
            })
            .collect();

        sort_newest_first(&mut stories);
        tracing::debug!(count = stories.len(), "Listed cloud stories");
        Ok(stories)
    }
}

/// Storage key reported for a file in the samples directory.
pub fn local_storage_key(file_name: &str) -> String {
    format!("{}{}/{}", STORIES_PREFIX, LOCAL_KEY_FOLDER, file_name)
}

fn sort_newest_first(stories: &mut [StoryRecord]) {
    stories.sort_by(|a, b| {
        b.uploaded_at
            .cmp(&a.uploaded_at)
            .then_with(|| a.file_name.cmp(&b.file_name))
    });
}
