//! Progress-callback trait for per-stage pipeline events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractorConfigBuilder::progress_callback`] to be told
//! when each upstream call starts, finishes or fails. The CLI uses it to drive
//! a spinner; a server could forward the events to a websocket.
//!
//! # Example
//!
//! ```rust
//! use invoice_extract::{ExtractionProgressCallback, ExtractorConfig, Stage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     finished: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for CountingCallback {
//!     fn on_stage_complete(&self, _session: u64, stage: Stage, elapsed_ms: u64) {
//!         self.finished.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{stage} done in {elapsed_ms}ms");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { finished: AtomicUsize::new(0) });
//!
//! let config = ExtractorConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::Stage;
use std::sync::Arc;

/// Called by [`crate::InvoiceExtractor`] around each upstream call.
///
/// Every method has a no-op default so implementors only override what they
/// need. `session` is the id of the document session the call belongs to;
/// events for a superseded session may still arrive after a newer one starts.
pub trait ExtractionProgressCallback: Send + Sync {
    /// A new document session started.
    fn on_session_start(&self, session: u64, filename: &str) {
        let _ = (session, filename);
    }

    /// The request for `stage` is about to be sent.
    fn on_stage_start(&self, session: u64, stage: Stage) {
        let _ = (session, stage);
    }

    /// `stage` returned a usable result.
    fn on_stage_complete(&self, session: u64, stage: Stage, elapsed_ms: u64) {
        let _ = (session, stage, elapsed_ms);
    }

    /// `stage` failed; `error` is the rendered [`crate::ExtractError`].
    fn on_stage_error(&self, session: u64, stage: Stage, error: &str) {
        let _ = (session, stage, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractorConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
