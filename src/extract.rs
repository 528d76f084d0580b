//! One-shot extraction entry points.
//!
//! These wrap a throwaway [`InvoiceExtractor`]: one document, one session,
//! optionally followed by the translation when
//! [`ExtractorConfig::translate`] is set. Use [`InvoiceExtractor`] directly
//! when documents are processed interactively and the English view is only
//! fetched on demand.

use crate::config::ExtractorConfig;
use crate::error::ExtractError;
use crate::output::{ExtractionOutput, ExtractionStats};
use crate::pipeline::input::{self, DocumentFile};
use crate::session::InvoiceExtractor;
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Extract invoice data from a local file or HTTP/HTTPS URL.
///
/// # Errors
/// The first failing stage aborts the extraction; its error is returned
/// unchanged. Nothing is retried.
pub async fn extract(
    input_str: impl AsRef<str>,
    config: &ExtractorConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let input_str = input_str.as_ref();
    info!("Starting extraction: {}", input_str);
    let doc = input::resolve_input(input_str, config.download_timeout_secs).await?;
    run(doc, config).await
}

/// Extract invoice data from in-memory document bytes.
///
/// The MIME type is detected from the bytes; `filename` is only used as the
/// upload's file name.
///
/// # Example
/// ```rust,no_run
/// use invoice_extract::{extract_from_bytes, ExtractorConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("rechnung.pdf")?;
/// let output = extract_from_bytes(bytes, "rechnung.pdf", &ExtractorConfig::default()).await?;
/// println!("{:?}", output.original.invoice_number());
/// # Ok(())
/// # }
/// ```
pub async fn extract_from_bytes(
    bytes: Vec<u8>,
    filename: impl Into<String>,
    config: &ExtractorConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let doc = DocumentFile::from_bytes(bytes, filename)?;
    run(doc, config).await
}

/// Extract and write the output as pretty JSON to `output_path`.
///
/// The file is written atomically: a temp file in the same directory is
/// persisted over the target, so readers never see a partial file.
pub async fn extract_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ExtractorConfig,
) -> Result<ExtractionStats, ExtractError> {
    let output = extract(input_str, config).await?;
    write_output(&output, output_path.as_ref()).await?;
    Ok(output.stats)
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input_str: impl AsRef<str>,
    config: &ExtractorConfig,
) -> Result<ExtractionOutput, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(input_str, config))
}

/// Serialise `output` and atomically replace `path` with it.
pub async fn write_output(output: &ExtractionOutput, path: &Path) -> Result<(), ExtractError> {
    let write_err = |source: std::io::Error| ExtractError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let json = serde_json::to_vec_pretty(output)
        .map_err(|e| ExtractError::Internal(format!("serialise output: {e}")))?;

    let dir = parent_dir(path);
    tokio::fs::create_dir_all(dir).await.map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(&json).map_err(write_err)?;
    tmp.write_all(b"\n").map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    info!("Wrote {} ({} bytes)", path.display(), json.len() + 1);
    Ok(())
}

async fn run(doc: DocumentFile, config: &ExtractorConfig) -> Result<ExtractionOutput, ExtractError> {
    let total_start = Instant::now();
    let document_bytes = doc.len();
    let filename = doc.filename.clone();

    let extractor = InvoiceExtractor::new(config.clone())?;
    let processed = extractor.process_document(doc).await?;

    let (translated, translation_ms) = if config.translate {
        let start = Instant::now();
        let data = extractor.translation().await?;
        (Some(data), Some(start.elapsed().as_millis() as u64))
    } else {
        (None, None)
    };

    let stats = ExtractionStats {
        analysis_ms: processed.analysis_ms,
        structuring_ms: processed.structuring_ms,
        translation_ms,
        total_ms: total_start.elapsed().as_millis() as u64,
        document_bytes,
        line_items: processed.original.line_item_count(),
    };
    info!(
        "Extraction complete: {} line items in {}ms",
        stats.line_items, stats.total_ms
    );

    Ok(ExtractionOutput {
        session: processed.session,
        filename,
        original: processed.original,
        translated,
        envelope: processed.envelope,
        markdown: processed.markdown,
        stats,
    })
}

/// Directory that will hold `path`; `.` for bare file names.
fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}
