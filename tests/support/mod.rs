//! Shared helpers: a wiremock server standing in for all three services.

#![allow(dead_code)]

use invoice_extract::{DocumentFile, ExtractorConfig, InvoiceExtractor};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const COOKIE: &str = "client_id=test";

pub fn config_for(server: &MockServer) -> ExtractorConfig {
    ExtractorConfig::builder()
        .analysis_url(format!("{}/analysis", server.uri()))
        .structuring_url(format!("{}/structure", server.uri()))
        .translation_url(format!("{}/translate", server.uri()))
        .analysis_cookie(Some(COOKIE))
        .upload_timeout_secs(10)
        .api_timeout_secs(10)
        .build()
        .unwrap()
}

pub fn extractor_for(server: &MockServer) -> InvoiceExtractor {
    InvoiceExtractor::new(config_for(server)).unwrap()
}

/// A PDF-looking document whose bytes contain `marker`.
pub fn pdf(marker: &str) -> DocumentFile {
    DocumentFile::from_bytes(format!("%PDF-1.4 {marker}").into_bytes(), format!("{marker}.pdf"))
        .unwrap()
}

pub fn analysis_ok(markdown: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "message": "Document analysed",
        "data": {"full_markdown": markdown, "tables_markdown": [], "key_value_pairs": {}}
    }))
}

/// Structuring envelope in the common `data.Answer` shape, with a `raw` field.
pub fn structuring_envelope(invoice_number: &str, language: &str) -> Value {
    json!({
        "message": "success",
        "data": {
            "Answer": {
                "document_type": "invoice",
                "source_language": language,
                "invoice_details": {"invoice_number": invoice_number, "currency": "EUR"},
                "line_items": [{"description": "Beratung", "quantity": 2, "line_total": "300,00"}]
            },
            "raw": format!("```json\n{{\"invoice_number\": \"{invoice_number}\"}}\n```"),
            "model": "llama-3.3-70b-versatile"
        }
    })
}

/// Translation response in the doubly wrapped shape.
pub fn translation_response(invoice_number: &str) -> Value {
    json!({
        "message": "success",
        "data": {
            "message": "success",
            "data": {
                "Answer": {
                    "document_type": "invoice",
                    "source_language": "en",
                    "invoice_details": {"invoice_number": invoice_number, "currency": "EUR"},
                    "line_items": [{"description": "Consulting", "quantity": 2, "line_total": "300.00"}]
                }
            }
        }
    })
}

/// Mount analysis + structuring mocks for one document, keyed by `marker`.
///
/// The analysis mock only answers uploads containing `marker`, and returns
/// markdown `MARKDOWN_<marker>`; the structuring mock only answers requests
/// carrying that markdown.
pub async fn mount_document(server: &MockServer, marker: &str, invoice_number: &str) {
    mount_document_with_delay(server, marker, invoice_number, Duration::ZERO).await;
}

pub async fn mount_document_with_delay(
    server: &MockServer,
    marker: &str,
    invoice_number: &str,
    analysis_delay: Duration,
) {
    let markdown = format!("MARKDOWN_{marker}");
    Mock::given(method("POST"))
        .and(path("/analysis"))
        .and(body_string_contains(marker))
        .respond_with(analysis_ok(&markdown).set_delay(analysis_delay))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/structure"))
        .and(body_string_contains(markdown.as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(structuring_envelope(invoice_number, "de")),
        )
        .mount(server)
        .await;
}
