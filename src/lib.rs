//! # invoice-extract
//!
//! Turn a scanned or digital invoice into structured JSON, in the document's
//! own language and, on request, in English.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / image
//!  │
//!  ├─ 1. Input      resolve local file or download from URL, sniff MIME type
//!  ├─ 2. Analysis   multipart upload to the OCR service → markdown
//!  ├─ 3. Structure  markdown + fixed prompt to the LLM service → invoice JSON
//!  ├─ 4. Normalize  unwrap whichever envelope shape came back
//!  └─ 5. Translate  (on demand) envelope → English invoice JSON, cached
//! ```
//!
//! All three upstream services are plain HTTP endpoints with their own
//! quirks. None of the stages retry, and a failure anywhere aborts the whole
//! document.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use invoice_extract::{extract, ExtractorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractorConfig::builder().translate(true).build()?;
//!     let output = extract("facture.pdf", &config).await?;
//!     println!("{}", serde_json::to_string_pretty(&output.translated)?);
//!     eprintln!("took {}ms", output.stats.total_ms);
//!     Ok(())
//! }
//! ```
//!
//! ## Interactive use
//!
//! [`InvoiceExtractor`] keeps the current document session, caches its
//! English view, and discards results from documents that have since been
//! replaced:
//!
//! ```rust,no_run
//! use invoice_extract::{ExtractorConfig, InvoiceExtractor, ViewMode};
//!
//! # async fn run() -> Result<(), invoice_extract::ExtractError> {
//! let extractor = InvoiceExtractor::new(ExtractorConfig::default())?;
//! extractor.process_input("factura.png").await?;
//! extractor.select_view(ViewMode::English).await?; // one upstream call
//! extractor.select_view(ViewMode::Original).await?;
//! extractor.select_view(ViewMode::English).await?; // cached
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! Endpoints, the analysis cookie, provider, model, prompt and timeouts are
//! set through [`ExtractorConfig::builder`]. The defaults target the
//! production services.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod invoice;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractorConfig, ExtractorConfigBuilder};
pub use error::{ExtractError, Stage};
pub use extract::{extract, extract_from_bytes, extract_sync, extract_to_file};
pub use invoice::{
    BankDetails, CustomerDetails, ExtractedInvoiceData, FieldValue, InvoiceDetails, LineItem,
    RawEnvelope, Summary, SupplierDetails,
};
pub use normalize::{normalize, STRUCTURING_TABLE, TRANSLATION_TABLE};
pub use output::{ExtractionOutput, ExtractionStats};
pub use pipeline::input::DocumentFile;
pub use pipeline::translate::translation_body;
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use session::{InvoiceExtractor, ProcessedDocument, SessionId, SessionSnapshot, ViewMode};
