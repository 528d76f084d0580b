//! Analysis stage: upload the document, get its markdown back.
//!
//! The analysis service wraps its result in
//! `{"success": bool, "message": "...", "data": {"full_markdown": "...", ...}}`
//! and signals rejection through `success`, not the HTTP status. The markdown
//! is returned exactly as received; cleaning it up is the structuring model's
//! job.

use super::input::DocumentFile;
use super::success_body;
use crate::config::ExtractorConfig;
use crate::error::{ExtractError, Stage};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

const STAGE: Stage = Stage::Analysis;

#[derive(Debug, Deserialize)]
struct AnalysisResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<Value>,
    #[serde(default)]
    data: Option<AnalysisData>,
}

// `key_value_pairs` and `tables_markdown` are also returned; only the full
// markdown feeds the structuring stage.
#[derive(Debug, Deserialize)]
struct AnalysisData {
    #[serde(default)]
    full_markdown: Option<String>,
}

impl AnalysisResponse {
    fn message_text(&self) -> String {
        match &self.message {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }
}

/// Upload `doc` as the multipart field `file` and return its markdown.
pub async fn upload(
    client: &reqwest::Client,
    config: &ExtractorConfig,
    doc: &DocumentFile,
) -> Result<String, ExtractError> {
    info!(
        "Uploading '{}' ({}, {} bytes) for analysis",
        doc.filename,
        doc.mime,
        doc.len()
    );

    let part = Part::bytes(doc.bytes.clone())
        .file_name(doc.filename.clone())
        .mime_str(&doc.mime)
        .map_err(|e| ExtractError::UnsupportedDocument {
            name: format!("{} ({}: {e})", doc.filename, doc.mime),
            magic: doc.bytes.iter().take(8).copied().collect(),
        })?;
    let form = Form::new().part("file", part);

    let mut request = client
        .post(&config.analysis_url)
        .timeout(Duration::from_secs(config.upload_timeout_secs))
        .multipart(form);
    if let Some(cookie) = &config.analysis_cookie {
        request = request.header(reqwest::header::COOKIE, cookie);
    }

    let response = request
        .send()
        .await
        .map_err(|e| ExtractError::from_reqwest(STAGE, config.upload_timeout_secs, e))?;
    let body = success_body(STAGE, config.upload_timeout_secs, response).await?;

    markdown_from_body(&body)
}

/// Interpret a 2xx analysis body.
fn markdown_from_body(body: &str) -> Result<String, ExtractError> {
    let parsed: AnalysisResponse =
        serde_json::from_str(body).map_err(|e| ExtractError::MalformedResponse {
            stage: STAGE,
            detail: e.to_string(),
        })?;

    if !parsed.success {
        return Err(ExtractError::UpstreamRejected {
            stage: STAGE,
            message: parsed.message_text(),
        });
    }

    let markdown = parsed
        .data
        .and_then(|d| d.full_markdown)
        .filter(|md| !md.is_empty())
        .ok_or_else(|| ExtractError::IncompleteResponse {
            stage: STAGE,
            field: "data.full_markdown".into(),
        })?;

    debug!(
        "Analysis returned {} chars of markdown: {:?}…",
        markdown.len(),
        crate::normalize::preview(&markdown, 120)
    );
    Ok(markdown)
}
