//! Structuring stage: markdown in, invoice JSON out.
//!
//! The request is a plain form post. The response is whatever the LLM front
//! end felt like returning that day, so the body is handed to
//! [`crate::normalize`] as text. Both the normalised invoice and the parsed
//! envelope are returned: translation needs the envelope verbatim.

use super::success_body;
use crate::config::ExtractorConfig;
use crate::error::{ExtractError, Stage};
use crate::invoice::{ExtractedInvoiceData, RawEnvelope};
use crate::normalize::{self, STRUCTURING_TABLE};
use std::time::Duration;
use tracing::{debug, info};

const STAGE: Stage = Stage::Structuring;

/// Output of the structuring stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Structured {
    pub data: ExtractedInvoiceData,
    pub envelope: RawEnvelope,
}

/// The four form fields, in wire order.
pub fn form_fields<'a>(config: &'a ExtractorConfig, markdown: &'a str) -> [(&'static str, &'a str); 4] {
    [
        ("input_text", markdown),
        ("prompt", config.prompt()),
        ("provider", config.provider.as_str()),
        ("model", config.model.as_str()),
    ]
}

/// Send `markdown` to the structuring service and normalise the answer.
pub async fn structure(
    client: &reqwest::Client,
    config: &ExtractorConfig,
    markdown: &str,
) -> Result<Structured, ExtractError> {
    info!(
        "Structuring {} chars of markdown with {}/{}",
        markdown.len(),
        config.provider,
        config.model
    );

    let response = client
        .post(&config.structuring_url)
        .timeout(Duration::from_secs(config.api_timeout_secs))
        .form(&form_fields(config, markdown))
        .send()
        .await
        .map_err(|e| ExtractError::from_reqwest(STAGE, config.api_timeout_secs, e))?;
    let body = success_body(STAGE, config.api_timeout_secs, response).await?;

    structured_from_body(&body)
}

/// Interpret a 2xx structuring body.
pub fn structured_from_body(body: &str) -> Result<Structured, ExtractError> {
    debug!(
        "Structuring response: {} bytes, starts {:?}",
        body.len(),
        normalize::preview(body, 120)
    );

    let (value, strategy) = normalize::parse_lenient(body)?;
    let data = normalize::normalize_value(&value, &STRUCTURING_TABLE)?;
    debug!(
        "Structured invoice ({:?} parse): language={:?}, {} line items",
        strategy,
        data.source_language,
        data.line_item_count()
    );

    Ok(Structured {
        data,
        envelope: RawEnvelope::new(value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn form_fields_use_fixed_selector_by_default() {
        let config = ExtractorConfig::default();
        let fields = form_fields(&config, "# Invoice");
        assert_eq!(fields[0], ("input_text", "# Invoice"));
        assert_eq!(fields[1].0, "prompt");
        assert_eq!(fields[1].1, crate::prompts::INVOICE_STRUCTURING_PROMPT);
        assert_eq!(fields[2], ("provider", "groq"));
        assert_eq!(fields[3], ("model", "llama-3.3-70b-versatile"));
    }

    #[test]
    fn envelope_is_the_full_parsed_body() {
        let body = json!({
            "message": "success",
            "data": {"Answer": {"document_type": "invoice"}, "raw": "…"}
        });
        let s = structured_from_body(&body.to_string()).unwrap();
        assert_eq!(s.envelope.as_value(), &body);
        assert_eq!(s.data.document_type.as_deref(), Some("invoice"));
    }

    #[test]
    fn fenced_body_envelope_is_the_extracted_object() {
        let s = structured_from_body("```json\n{\"document_type\":\"invoice\"}\n```").unwrap();
        assert_eq!(s.envelope.as_value(), &json!({"document_type": "invoice"}));
    }

    #[test]
    fn normalizer_errors_propagate_unchanged() {
        let err = structured_from_body("the model refused").unwrap_err();
        assert!(matches!(
            err,
            ExtractError::MalformedResponse {
                stage: Stage::Structuring,
                ..
            }
        ));
    }
}
