use async_trait::async_trait;
use tokio::io::AsyncRead;

use super::error::StorageError;
use super::hash::ContentHash;

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Byte range for a partial read. `end` is inclusive; `None` reads to the end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

/// Content-addressed object storage.
///
/// Objects are keyed by the content's hex SHA-256 and nothing else; a single
/// object is shared by every file reference that deduplicates to it. The
/// decision whether an object must be uploaded belongs to the caller (it is
/// driven by the content metadata row), so `put` never hashes.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fast existence probe. Returns the stored size when the object is present.
    async fn head(&self, hash: &ContentHash) -> Result<Option<u64>, StorageError>;

    /// Upload an object. The key and size are known up front; large bodies
    /// stream in parts.
    async fn put(
        &self,
        hash: &ContentHash,
        reader: BoxReader,
        size: u64,
        mime: &str,
    ) -> Result<(), StorageError>;

    /// Open the object for reading, optionally restricted to a byte range.
    ///
    /// The returned stream's lifetime is owned by the caller; it must not be
    /// tied to a timeout that could interrupt a slow legitimate reader.
    async fn get(
        &self,
        hash: &ContentHash,
        range: Option<ByteRange>,
    ) -> Result<BoxReader, StorageError>;

    /// Delete the object. Deleting a key that does not exist is not an error.
    async fn delete(&self, hash: &ContentHash) -> Result<(), StorageError>;

    /// Produce a time-limited signed download URL, or `None` when the backend
    /// cannot presign (the caller streams the object itself instead).
    async fn presign_get(
        &self,
        hash: &ContentHash,
        filename: &str,
        mime: &str,
    ) -> Result<Option<String>, StorageError>;
}

/// `Content-Disposition` value for serving a stored file.
///
/// Browsers must never execute user-supplied content in the service origin, so
/// HTML and PDF are forced to download; everything else renders inline.
pub fn content_disposition(mime: &str, filename: &str) -> String {
    let kind = match mime {
        "text/html" | "application/pdf" => "attachment",
        _ => "inline",
    };

    let ascii_safe: String = filename
        .chars()
        .filter(|c| c.is_ascii_graphic() && !matches!(c, '"' | ';' | '\\'))
        .collect();
    let ascii_name = if ascii_safe.is_empty() {
        "download".to_string()
    } else {
        ascii_safe
    };

    // RFC 5987 percent-encoding for filename*.
    let encoded: String = filename
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'!'
            | b'#'
            | b'$'
            | b'&'
            | b'+'
            | b'-'
            | b'.'
            | b'^'
            | b'_'
            | b'`'
            | b'|'
            | b'~' => String::from(b as char),
            _ => format!("%{b:02X}"),
        })
        .collect();

    format!("{kind}; filename=\"{ascii_name}\"; filename*=UTF-8''{encoded}")
}
