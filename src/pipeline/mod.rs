//! Pipeline stages for invoice extraction.
//!
//! Each submodule wraps exactly one upstream call, so each can be tested
//! against a mock server on its own and the wire quirks of one service never
//! leak into another.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ analysis ──▶ structure ──▶ (on demand) translate
//! (path/URL)  (OCR)       (LLM JSON)     (English view)
//! ```
//!
//! 1. [`input`]: load a local file or download a URL, sniff its MIME type
//! 2. [`analysis`]: multipart upload; returns the document as markdown
//! 3. [`structure`]: form-encoded LLM call; returns invoice data plus the raw
//!    envelope
//! 4. [`translate`]: forwards the envelope (minus `data.raw`) as a raw JSON
//!    body; returns the English invoice data
//!
//! None of the stages retry. Sequencing, caching and session bookkeeping live
//! in [`crate::session`].

pub mod analysis;
pub mod input;
pub mod structure;
pub mod translate;

use crate::error::{ExtractError, Stage};
use tracing::warn;

/// Read the response body, turning a non-2xx status into
/// [`ExtractError::UpstreamError`].
pub(crate) async fn success_body(
    stage: Stage,
    timeout_secs: u64,
    response: reqwest::Response,
) -> Result<String, ExtractError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(
            "{} service returned HTTP {}: {}",
            stage,
            status,
            crate::normalize::preview(&body, 200)
        );
        return Err(ExtractError::UpstreamError {
            stage,
            status: status.as_u16(),
            body,
        });
    }

    response
        .text()
        .await
        .map_err(|e| ExtractError::from_reqwest(stage, timeout_secs, e))
}
