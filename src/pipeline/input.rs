//! Input resolution: turn a user-supplied path or URL into an uploadable
//! [`DocumentFile`].
//!
//! The analysis service accepts PDFs and common raster images. The MIME type
//! sent with the upload is sniffed from the first bytes rather than trusted
//! from the file extension, and anything unrecognised is refused here so the
//! user gets a local error instead of an opaque upstream rejection.

use crate::error::ExtractError;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info};

/// A document ready to be uploaded to the analysis service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFile {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mime: String,
}

impl DocumentFile {
    /// Wrap bytes whose MIME type is already known.
    pub fn new(bytes: Vec<u8>, filename: impl Into<String>, mime: impl Into<String>) -> Self {
        Self {
            bytes,
            filename: filename.into(),
            mime: mime.into(),
        }
    }

    /// Wrap bytes, detecting the MIME type from their magic number.
    pub fn from_bytes(bytes: Vec<u8>, filename: impl Into<String>) -> Result<Self, ExtractError> {
        let filename = filename.into();
        match detect_mime(&bytes) {
            Some(mime) => Ok(Self::new(bytes, filename, mime)),
            None => Err(ExtractError::UnsupportedDocument {
                magic: bytes.iter().take(8).copied().collect(),
                name: filename,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Identify a PDF or supported image from its leading bytes.
pub fn detect_mime(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [b'%', b'P', b'D', b'F', ..] => Some("application/pdf"),
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some("image/png"),
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [b'I', b'I', 0x2A, 0x00, ..] | [b'M', b'M', 0x00, 0x2A, ..] => Some("image/tiff"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some("image/gif"),
        [b'B', b'M', ..] => Some("image/bmp"),
        _ => None,
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to an uploadable document.
///
/// URLs are downloaded into memory; anything else is read as a local path.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<DocumentFile, ExtractError> {
    if input.trim().is_empty() {
        return Err(ExtractError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(Path::new(input)).await
    }
}

async fn resolve_local(path: &Path) -> Result<DocumentFile, ExtractError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        ErrorKind::PermissionDenied => ExtractError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => ExtractError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());

    let doc = DocumentFile::from_bytes(bytes, filename)?;
    debug!(
        "Resolved local document: {} ({}, {} bytes)",
        path.display(),
        doc.mime,
        doc.len()
    );
    Ok(doc)
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<DocumentFile, ExtractError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ExtractError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ExtractError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ExtractError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(ExtractError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ExtractError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let doc = DocumentFile::from_bytes(bytes.to_vec(), filename_from_url(url))?;
    info!("Downloaded {} ({} bytes)", doc.filename, doc.len());
    Ok(doc)
}

/// Last path segment of the URL if it looks like a file name.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded-document".to_string()
}
