//! Range streamer
//!
//! Serves files from the samples directory with single-range HTTP byte range
//! support. Out-of-bounds and inverted ranges are clamped into the file
//! instead of being refused, which is what mobile audio players expect when
//! they probe past the end. Bodies are streamed in bounded chunks; dropping
//! the response (client disconnect) drops the file handle.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use std::io::SeekFrom;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, Take};
use tokio_util::io::ReaderStream;

use crate::media::mime_for_file_name;
use crate::storage::SamplesDir;
use crate::{Error, Result};

/// Read buffer size per chunk of a streamed body.
pub const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Cache directive for served files.
pub const CACHE_CONTROL: &str = "public, max-age=3600";

/// A parsed `Range` header value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSpec {
    /// `bytes=start-` or `bytes=start-end`
    FromStart { start: u64, end: Option<u64> },
    /// `bytes=-n`: the last `n` bytes
    Suffix(u64),
}

/// An inclusive byte window inside a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteWindow {
    pub start: u64,
    pub end: u64,
}

impl ByteWindow {
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` value for a file of `size` bytes.
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }
}

/// Parse a single-range `Range` header.
pub fn parse_range_header(value: &str) -> Result<RangeSpec> {
    let value = value.trim();
    let spec = value
        .get(..6)
        .filter(|unit| unit.eq_ignore_ascii_case("bytes="))
        .map(|_| &value[6..])
        .ok_or_else(|| Error::invalid_range(format!("unsupported range unit in {:?}", value)))?;

    if spec.contains(',') {
        return Err(Error::MultipleRanges);
    }

    let (start, end) = spec
        .split_once('-')
        .ok_or_else(|| Error::invalid_range(format!("missing '-' in {:?}", value)))?;
    let (start, end) = (start.trim(), end.trim());

    let parse = |part: &str| {
        part.parse::<u64>()
            .map_err(|_| Error::invalid_range(format!("invalid bound {:?} in {:?}", part, value)))
    };

    match (start.is_empty(), end.is_empty()) {
        (true, true) => Err(Error::invalid_range(format!("empty range in {:?}", value))),
        (true, false) => Ok(RangeSpec::Suffix(parse(end)?)),
        (false, true) => Ok(RangeSpec::FromStart {
            start: parse(start)?,
            end: None,
        }),
        (false, false) => Ok(RangeSpec::FromStart {
            start: parse(start)?,
            end: Some(parse(end)?),
        }),
    }
}

/// Clamp a range into a file of `size` bytes.
///
/// `start` lands in `[0, size - 1]` and `end` in `[start, size - 1]`. Only an
/// empty file has no satisfiable window.
pub fn clamp_range(spec: RangeSpec, size: u64) -> Result<ByteWindow> {
    if size == 0 {
        return Err(Error::RangeNotSatisfiable { size });
    }
    let last = size - 1;

    let (start, end) = match spec {
        RangeSpec::FromStart { start, end } => (start, end.unwrap_or(last)),
        RangeSpec::Suffix(count) => (size.saturating_sub(count), last),
    };

    let start = start.min(last);
    let end = end.clamp(start, last);
    Ok(ByteWindow { start, end })
}

/// An opened file ready to be written to the response.
pub struct FileStream {
    pub file_name: String,
    pub content_type: &'static str,
    pub size: u64,
    /// `Some` for partial content
    pub window: Option<ByteWindow>,
    reader: Take<File>,
}

impl std::fmt::Debug for FileStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStream")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("size", &self.size)
            .field("window", &self.window)
            .finish()
    }
}

impl FileStream {
    /// Number of body bytes this response carries.
    pub fn content_length(&self) -> u64 {
        self.window.map(|w| w.length()).unwrap_or(self.size)
    }
}

impl IntoResponse for FileStream {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(self.content_type),
        );
        headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL));
        headers.insert(
            header::CONTENT_LENGTH,
            HeaderValue::from(self.content_length()),
        );

        let status = match self.window {
            Some(window) => {
                if let Ok(value) = HeaderValue::try_from(window.content_range(self.size)) {
                    headers.insert(header::CONTENT_RANGE, value);
                }
                StatusCode::PARTIAL_CONTENT
            }
            None => StatusCode::OK,
        };

        let body = Body::from_stream(ReaderStream::with_capacity(self.reader, STREAM_CHUNK_SIZE));
        (status, headers, body).into_response()
    }
}

/// Serves files out of the samples directory.
#[derive(Debug, Clone)]
pub struct RangeStreamer {
    samples: SamplesDir,
}

impl RangeStreamer {
    pub fn new(samples: SamplesDir) -> Self {
        Self { samples }
    }

    /// Open `requested_name` (percent-encoded) for streaming, honouring an
    /// optional `Range` header.
    pub async fn serve_file(
        &self,
        requested_name: &str,
        range_header: Option<&str>,
    ) -> Result<FileStream> {
        let path = self.samples.resolve(requested_name).await?;

        let mut file = File::open(&path).await?;
        let size = file.metadata().await?.len();

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let content_type = mime_for_file_name(&file_name);

        let window = match range_header {
            Some(value) => Some(clamp_range(parse_range_header(value)?, size)?),
            None => None,
        };

        let reader = match window {
            Some(window) => {
                file.seek(SeekFrom::Start(window.start)).await?;
                tracing::debug!(
                    file = %file_name,
                    start = window.start,
                    end = window.end,
                    size,
                    "Serving partial content"
                );
                file.take(window.length())
            }
            None => {
                tracing::debug!(file = %file_name, size, "Serving full file");
                file.take(size)
            }
        };

        Ok(FileStream {
            file_name,
            content_type,
            size,
            window,
            reader,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(start: u64, end: u64) -> ByteWindow {
        ByteWindow { start, end }
    }

    #[test]
    fn test_parse_range_header() {
        assert_eq!(
            parse_range_header("bytes=10-19").unwrap(),
            RangeSpec::FromStart {
                start: 10,
                end: Some(19)
            }
        );
        assert_eq!(
            parse_range_header("bytes=500-").unwrap(),
            RangeSpec::FromStart {
                start: 500,
                end: None
            }
        );
        assert_eq!(parse_range_header("Bytes=-20").unwrap(), RangeSpec::Suffix(20));
    }

    #[test]
    fn test_parse_range_header_errors() {
        assert!(matches!(
            parse_range_header("bytes=0-1,5-9"),
            Err(Error::MultipleRanges)
        ));
        for bad in ["items=0-1", "bytes=", "bytes=-", "bytes=a-b", "bytes=5", "bytes=-1-2"] {
            assert!(
                matches!(parse_range_header(bad), Err(Error::InvalidRange(_))),
                "{bad} should be invalid"
            );
        }
    }

    #[test]
    fn test_clamp_within_bounds() {
        let spec = parse_range_header("bytes=10-19").unwrap();
        let w = clamp_range(spec, 100).unwrap();
        assert_eq!(w, window(10, 19));
        assert_eq!(w.length(), 10);
        assert_eq!(w.content_range(100), "bytes 10-19/100");
    }

    #[test]
    fn test_clamp_end_past_size() {
        let spec = parse_range_header("bytes=90-500").unwrap();
        let w = clamp_range(spec, 100).unwrap();
        assert_eq!(w.content_range(100), "bytes 90-99/100");
        assert_eq!(w.length(), 10);
    }

    #[test]
    fn test_clamp_start_past_size_and_inverted() {
        let spec = parse_range_header("bytes=250-300").unwrap();
        assert_eq!(clamp_range(spec, 100).unwrap(), window(99, 99));

        let spec = parse_range_header("bytes=50-10").unwrap();
        assert_eq!(clamp_range(spec, 100).unwrap(), window(50, 50));
    }

    #[test]
    fn test_clamp_suffix() {
        assert_eq!(clamp_range(RangeSpec::Suffix(20), 100).unwrap(), window(80, 99));
        assert_eq!(clamp_range(RangeSpec::Suffix(500), 100).unwrap(), window(0, 99));
    }

    #[test]
    fn test_zero_length_suffix_serves_last_byte() {
        let spec = parse_range_header("bytes=-0").unwrap();
        assert_eq!(spec, RangeSpec::Suffix(0));
        let w = clamp_range(spec, 10).unwrap();
        assert_eq!(w, window(9, 9));
        assert_eq!(w.content_range(10), "bytes 9-9/10");
    }

    #[test]
    fn test_clamp_empty_file() {
        assert!(matches!(
            clamp_range(RangeSpec::Suffix(1), 0),
            Err(Error::RangeNotSatisfiable { size: 0 })
        ));
    }

    #[test]
    fn test_clamped_windows_always_fit() {
        let sizes = [1u64, 2, 7, 100, 4096];
        let bounds = [0u64, 1, 5, 50, 99, 100, 101, 10_000, u64::MAX];
        for &size in &sizes {
            for &start in &bounds {
                for end in bounds.iter().copied().map(Some).chain([None]) {
                    let w = clamp_range(RangeSpec::FromStart { start, end }, size).unwrap();
                    assert!(w.start <= w.end && w.end <= size - 1);
                    assert_eq!(w.length(), w.end - w.start + 1);
                }
                let w = clamp_range(RangeSpec::Suffix(start), size).unwrap();
                assert!(w.start <= w.end && w.end <= size - 1);
            }
        }
    }
}
