//! Storage key generation for cloud uploads.
//!
//! Key format: `stories/{category}/{YYYY-MM-DD}/{uniqueId}-{baseName}{extension}`.
//! The unique id is a v4 UUID in its hyphen-free form, so the first hyphen of
//! the final segment always separates the id from the original file name.

use chrono::{NaiveDate, Utc};
use std::path::Path;
use uuid::Uuid;

use crate::media::Category;

/// Namespace every story key lives under.
pub const STORIES_PREFIX: &str = "stories/";

/// Build a fresh storage key for an uploaded file.
pub fn build_key(original_name: &str, mime_type: &str) -> String {
    let unique_id = Uuid::new_v4().simple().to_string();
    build_key_with(original_name, mime_type, Utc::now().date_naive(), &unique_id)
}

/// Build a storage key from an explicit date and unique id.
pub fn build_key_with(
    original_name: &str,
    mime_type: &str,
    date: NaiveDate,
    unique_id: &str,
) -> String {
    let (base_name, extension) = split_file_name(original_name);
    let folder = if mime_type.starts_with("audio/") {
        Category::Audio
    } else {
        Category::Text
    };

    format!(
        "{}{}/{}/{}-{}{}",
        STORIES_PREFIX,
        folder,
        date.format("%Y-%m-%d"),
        unique_id,
        base_name,
        extension
    )
}

/// Components recovered from a storage key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKey {
    pub category: Category,
    pub original_name: String,
}

/// Recover the category folder and the original file name from a key.
///
/// The original name is everything after the first hyphen of the last
/// segment. Keys whose id itself contains hyphens (hyphenated UUIDs) come
/// back with the id tail still attached. Returns `None` for directory
/// markers (keys ending in `/`) and keys outside `stories/`.
pub fn parse_key(key: &str) -> Option<ParsedKey> {
    let rest = key.strip_prefix(STORIES_PREFIX)?;
    let segments: Vec<&str> = rest.split('/').collect();
    let last = segments.last().copied().filter(|s| !s.is_empty())?;

    let category = if segments.len() > 1 {
        Category::from_folder(segments[0])
    } else {
        Category::Unknown
    };
    let original_name = match last.split_once('-') {
        Some((_, name)) if !name.is_empty() => name.to_string(),
        _ => last.to_string(),
    };

    Some(ParsedKey {
        category,
        original_name,
    })
}

/// Split a file name into base name and extension (with its dot).
///
/// Only the final path component is used, so names like `../../x.txt`
/// cannot introduce extra key segments.
pub fn split_file_name(original_name: &str) -> (String, String) {
    let file_name = final_component(original_name);
    let path = Path::new(&file_name);

    match (
        path.file_stem().and_then(|s| s.to_str()),
        path.extension().and_then(|s| s.to_str()),
    ) {
        (Some(stem), Some(ext)) => (stem.to_string(), format!(".{}", ext)),
        _ => (file_name.clone(), String::new()),
    }
}

/// Final component of a client-supplied file name, for either separator.
pub fn final_component(name: &str) -> String {
    name.rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}
