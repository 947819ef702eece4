//! Media type table
//!
//! The one place that maps file extensions to MIME types and MIME types to
//! story categories. Upload intake, key building, the catalog and the file
//! streamer all go through here.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Fallback for anything the table does not know.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Extension (lowercase, no dot) to MIME type.
const EXTENSION_TABLE: &[(&str, &str)] = &[
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("pdf", "application/pdf"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("m4a", "audio/m4a"),
    ("aac", "audio/aac"),
];

/// MIME types accepted by the upload endpoint.
pub const ACCEPTED_UPLOAD_TYPES: &[&str] = &[
    "text/plain",
    "text/markdown",
    "application/pdf",
    "audio/mpeg",
    "audio/mp3",
    "audio/wav",
    "audio/m4a",
    "audio/aac",
];

/// Story category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Audio,
    Text,
    Unknown,
}

impl Category {
    /// Derive the category of a MIME type.
    pub fn from_mime(mime_type: &str) -> Self {
        let mime = essence(mime_type);
        if mime.starts_with("audio/") {
            Category::Audio
        } else if mime.starts_with("text/") || mime == "application/pdf" {
            Category::Text
        } else {
            Category::Unknown
        }
    }

    /// Parse a key folder name (`audio` / `text`).
    pub fn from_folder(folder: &str) -> Self {
        match folder {
            "audio" => Category::Audio,
            "text" => Category::Text,
            _ => Category::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Audio => "audio",
            Category::Text => "text",
            Category::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercased extension of a file name, without the dot.
pub fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Look up the MIME type for an extension, if the table knows it.
pub fn mime_for_extension(extension: &str) -> Option<&'static str> {
    let extension = extension.trim_start_matches('.').to_ascii_lowercase();
    EXTENSION_TABLE
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, mime)| *mime)
}

/// MIME type for a file name, defaulting to `application/octet-stream`.
pub fn mime_for_file_name(file_name: &str) -> &'static str {
    extension_of(file_name)
        .and_then(|ext| mime_for_extension(&ext))
        .unwrap_or(OCTET_STREAM)
}

/// MIME type for a file name stored under a category folder.
///
/// The extension only counts when its category matches the folder the
/// object was filed under.
pub fn mime_for_categorized_name(category: Category, file_name: &str) -> &'static str {
    match extension_of(file_name).and_then(|ext| mime_for_extension(&ext)) {
        Some(mime) if Category::from_mime(mime) == category => mime,
        _ => OCTET_STREAM,
    }
}

/// Whether the upload endpoint accepts this MIME type.
pub fn is_accepted_upload_type(mime_type: &str) -> bool {
    ACCEPTED_UPLOAD_TYPES.contains(&essence(mime_type).as_str())
}

/// Replace generic binary MIME types with the type implied by the extension.
///
/// Mobile pickers frequently report `application/octet-stream` (or nothing)
/// for audio files, so the extension is the better signal there. Specific
/// types are returned unchanged.
pub fn correct_generic_mime(mime_type: Option<&str>, file_name: &str) -> String {
    let declared = mime_type.map(essence).unwrap_or_default();
    if declared.is_empty() || declared == OCTET_STREAM {
        if let Some(mime) = extension_of(file_name).and_then(|ext| mime_for_extension(&ext)) {
            return mime.to_string();
        }
        if declared.is_empty() {
            return OCTET_STREAM.to_string();
        }
    }
    declared
}

/// Strip parameters (`; charset=...`) and normalise case.
fn essence(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
