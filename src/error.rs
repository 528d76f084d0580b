//! Error types for the invoice-extract library.
//!
//! A single enum, [`ExtractError`], covers every failure the pipeline can
//! surface. Variants that originate in an upstream call carry the [`Stage`]
//! they came from so callers can tell the user *which* service failed
//! without parsing messages.
//!
//! Nothing in the library retries. A failed stage aborts the whole operation
//! and the error is returned unchanged; deciding whether to start over from
//! the upload is the caller's job.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The three upstream services, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// OCR / document analysis: document bytes in, markdown out.
    Analysis,
    /// LLM structuring: markdown in, invoice JSON out.
    Structuring,
    /// Translation of the structuring envelope to English.
    Translation,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Analysis => "analysis",
            Stage::Structuring => "structuring",
            Stage::Translation => "translation",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All errors returned by the invoice-extract library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Upstream errors ───────────────────────────────────────────────────
    /// The service answered with a non-2xx status.
    #[error("{stage} service returned HTTP {status}: {body}")]
    UpstreamError {
        stage: Stage,
        status: u16,
        body: String,
    },

    /// The service answered 2xx but its own success flag was false.
    #[error("{stage} service rejected the request: {message}")]
    UpstreamRejected { stage: Stage, message: String },

    /// A field the stage depends on was missing from an otherwise valid response.
    #[error("{stage} response is missing '{field}'")]
    IncompleteResponse { stage: Stage, field: String },

    /// The body could not be parsed as JSON by any strategy.
    #[error("{stage} response is not valid JSON: {detail}")]
    MalformedResponse { stage: Stage, detail: String },

    /// The body parsed, but matches none of the known envelope shapes.
    #[error("{stage} response has an unexpected shape: {detail}")]
    UnexpectedResponseShape { stage: Stage, detail: String },

    /// The request never produced a response (DNS, TLS, connection reset…).
    #[error("{stage} request failed: {detail}\nCheck your network connection and the endpoint URL.")]
    RequestFailed { stage: Stage, detail: String },

    /// The request exceeded the configured timeout.
    #[error("{stage} request timed out after {secs}s")]
    Timeout { stage: Stage, secs: u64 },

    // ── Session errors ────────────────────────────────────────────────────
    /// A newer document was started while this call was in flight; its result
    /// was discarded.
    #[error("session {session} was superseded by a newer document; result discarded")]
    SessionSuperseded { session: u64 },

    /// Translation or view selection was requested before any document was processed.
    #[error("No document has been processed yet")]
    NoActiveSession,

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// The file is neither a PDF nor a supported image format.
    #[error("'{name}' is not a PDF or supported image\nFirst bytes: {magic:?}")]
    UnsupportedDocument { name: String, magic: Vec<u8> },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output JSON file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExtractError {
    /// The upstream stage this error is attributed to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ExtractError::UpstreamError { stage, .. }
            | ExtractError::UpstreamRejected { stage, .. }
            | ExtractError::IncompleteResponse { stage, .. }
            | ExtractError::MalformedResponse { stage, .. }
            | ExtractError::UnexpectedResponseShape { stage, .. }
            | ExtractError::RequestFailed { stage, .. }
            | ExtractError::Timeout { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Map a transport-level reqwest failure to a stage error.
    pub(crate) fn from_reqwest(stage: Stage, timeout_secs: u64, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExtractError::Timeout {
                stage,
                secs: timeout_secs,
            }
        } else {
            ExtractError::RequestFailed {
                stage,
                detail: err.to_string(),
            }
        }
    }

    /// Re-attribute a normalizer error to another stage.
    ///
    /// The normalizer reports under [`Stage::Structuring`] by default; the
    /// translation stage reuses it and relabels the result.
    pub(crate) fn at_stage(self, stage: Stage) -> Self {
        match self {
            ExtractError::MalformedResponse { detail, .. } => {
                ExtractError::MalformedResponse { stage, detail }
            }
            ExtractError::UnexpectedResponseShape { detail, .. } => {
                ExtractError::UnexpectedResponseShape { stage, detail }
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_error_display() {
        let e = ExtractError::UpstreamError {
            stage: Stage::Analysis,
            status: 502,
            body: "bad gateway".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("analysis"), "got: {msg}");
        assert!(msg.contains("502"), "got: {msg}");
        assert!(msg.contains("bad gateway"), "got: {msg}");
    }

    #[test]
    fn rejected_display_carries_message() {
        let e = ExtractError::UpstreamRejected {
            stage: Stage::Analysis,
            message: "unsupported file".into(),
        };
        assert!(e.to_string().contains("unsupported file"));
    }

    #[test]
    fn stage_attribution() {
        let e = ExtractError::Timeout {
            stage: Stage::Translation,
            secs: 30,
        };
        assert_eq!(e.stage(), Some(Stage::Translation));
        assert_eq!(ExtractError::NoActiveSession.stage(), None);
        assert_eq!(
            ExtractError::SessionSuperseded { session: 3 }.stage(),
            None
        );
    }

    #[test]
    fn at_stage_relabels_normalizer_errors_only() {
        let e = ExtractError::UnexpectedResponseShape {
            stage: Stage::Structuring,
            detail: "x".into(),
        }
        .at_stage(Stage::Translation);
        assert_eq!(e.stage(), Some(Stage::Translation));

        let e = ExtractError::UpstreamError {
            stage: Stage::Structuring,
            status: 500,
            body: String::new(),
        }
        .at_stage(Stage::Translation);
        assert_eq!(e.stage(), Some(Stage::Structuring));
    }

    #[test]
    fn stage_serialises_lowercase() {
        let s = serde_json::to_string(&Stage::Structuring).unwrap();
        assert_eq!(s, "\"structuring\"");
    }
}
