//! Translation stage: envelope in, English invoice out.
//!
//! ## Wire quirk
//!
//! The translation service is declared as form-encoded but reads the body as
//! one JSON document. The request therefore carries
//! `Content-Type: application/x-www-form-urlencoded` and a body that is the
//! envelope serialised as compact JSON, with no `key=value` encoding. That
//! contract is isolated in [`translation_body`] and this module; nothing
//! else in the crate knows about it.
//!
//! `data.raw` is dropped from the envelope first. It holds the model's raw
//! completion, which is large and not part of the translator's input
//! contract.

use super::success_body;
use crate::config::ExtractorConfig;
use crate::error::{ExtractError, Stage};
use crate::invoice::{ExtractedInvoiceData, RawEnvelope};
use crate::normalize::{self, TRANSLATION_TABLE};
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::{debug, info};

const STAGE: Stage = Stage::Translation;

pub const TRANSLATION_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// The exact request body sent to the translation service.
pub fn translation_body(envelope: &RawEnvelope) -> String {
    envelope.without_raw().to_string()
}

/// Translate the structuring envelope into English invoice data.
///
/// Only call this with an envelope returned by
/// [`super::structure::structure`] for the same document.
pub async fn translate(
    client: &reqwest::Client,
    config: &ExtractorConfig,
    envelope: &RawEnvelope,
) -> Result<ExtractedInvoiceData, ExtractError> {
    if envelope.has_raw() {
        debug!("Dropping data.raw from envelope before translation");
    }
    let body = translation_body(envelope);
    info!("Requesting English translation ({} byte body)", body.len());

    let response = client
        .post(&config.translation_url)
        .timeout(Duration::from_secs(config.api_timeout_secs))
        .header(CONTENT_TYPE, TRANSLATION_CONTENT_TYPE)
        .body(body)
        .send()
        .await
        .map_err(|e| ExtractError::from_reqwest(STAGE, config.api_timeout_secs, e))?;
    let body = success_body(STAGE, config.api_timeout_secs, response).await?;

    translated_from_body(&body)
}

/// Interpret a 2xx translation body.
pub fn translated_from_body(body: &str) -> Result<ExtractedInvoiceData, ExtractError> {
    let (value, _) = normalize::parse_lenient(body).map_err(|e| e.at_stage(STAGE))?;
    let data = normalize::normalize_value(&value, &TRANSLATION_TABLE)
        .map_err(|e| e.at_stage(STAGE))?;
    debug!(
        "Translated invoice: {} line items",
        data.line_item_count()
    );
    Ok(data)
}
