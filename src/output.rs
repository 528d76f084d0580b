//! Output types returned by the one-shot extraction entry points.

use crate::invoice::{ExtractedInvoiceData, RawEnvelope};
use crate::session::SessionId;
use serde::{Deserialize, Serialize};

/// Result of [`crate::extract()`] and friends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionOutput {
    /// Session the data belongs to.
    pub session: SessionId,

    /// Name of the uploaded document.
    pub filename: String,

    /// Invoice data in the document's own language.
    pub original: ExtractedInvoiceData,

    /// English invoice data; present only when translation was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated: Option<ExtractedInvoiceData>,

    /// Full structuring response, as received.
    pub envelope: RawEnvelope,

    /// Markdown produced by the analysis service.
    pub markdown: String,

    pub stats: ExtractionStats,
}

/// Per-stage wall-clock timings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub analysis_ms: u64,
    pub structuring_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation_ms: Option<u64>,
    pub total_ms: u64,
    /// Size of the uploaded document in bytes.
    pub document_bytes: usize,
    pub line_items: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn untranslated_output_omits_translation_fields() {
        let out = ExtractionOutput {
            session: 1,
            filename: "a.pdf".into(),
            original: ExtractedInvoiceData::default(),
            translated: None,
            envelope: RawEnvelope::new(json!({"data": {}})),
            markdown: "# Invoice".into(),
            stats: ExtractionStats::default(),
        };
        let v = serde_json::to_value(&out).unwrap();
        assert!(v.get("translated").is_none());
        assert!(v["stats"].get("translation_ms").is_none());
        assert_eq!(v["envelope"], json!({"data": {}}));
    }
}
