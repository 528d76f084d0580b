//! Configuration types for invoice extraction.
//!
//! Every knob lives in [`ExtractorConfig`], built via its
//! [`ExtractorConfigBuilder`]. The defaults reproduce the production
//! deployment exactly: the three upstream endpoints, the `groq` provider with
//! `llama-3.3-70b-versatile`, and the built-in structuring prompt.

use crate::error::ExtractError;
use crate::progress::ProgressCallback;
use std::fmt;

/// Production document-analysis endpoint.
pub const DEFAULT_ANALYSIS_URL: &str =
    "https://raws.e42.ai/edith/api/core/documents/v3/azure-analysis";
/// Production LLM structuring endpoint.
pub const DEFAULT_STRUCTURING_URL: &str =
    "https://samarjit.lightinfosys.com/external_api/e42_llm_text";
/// Production translation endpoint.
pub const DEFAULT_TRANSLATION_URL: &str =
    "https://samarjit.lightinfosys.com/external_api/translate_json_to_english";
/// Cookie the analysis service expects from direct (non-relayed) callers.
pub const DEFAULT_ANALYSIS_COOKIE: &str =
    "elementor_split_test_client_id=c030c8dc-4c4b-48cc-badc-29301a57912a";
pub const DEFAULT_PROVIDER: &str = "groq";
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Configuration for an [`crate::InvoiceExtractor`].
///
/// # Example
/// ```rust
/// use invoice_extract::ExtractorConfig;
///
/// let config = ExtractorConfig::builder()
///     .analysis_url("http://localhost:3001/api/azure-analysis")
///     .analysis_cookie(None::<String>)
///     .upload_timeout_secs(180)
///     .build()
///     .unwrap();
/// assert_eq!(config.model, "llama-3.3-70b-versatile");
/// ```
#[derive(Clone)]
pub struct ExtractorConfig {
    /// Document-analysis (OCR) endpoint. Accepts a multipart upload.
    pub analysis_url: String,

    /// LLM structuring endpoint. Accepts a form-encoded body.
    pub structuring_url: String,

    /// Translation endpoint. Accepts raw JSON under a form content type.
    pub translation_url: String,

    /// `Cookie` header sent with the analysis upload. Default: the production
    /// client cookie.
    ///
    /// Set to `None` when `analysis_url` points at the analysis relay, which
    /// adds the cookie itself.
    pub analysis_cookie: Option<String>,

    /// `provider` form field of the structuring request. Default: `groq`.
    pub provider: String,

    /// `model` form field of the structuring request. Default: `llama-3.3-70b-versatile`.
    pub model: String,

    /// Replacement for [`crate::prompts::INVOICE_STRUCTURING_PROMPT`].
    pub structuring_prompt: Option<String>,

    /// Timeout for the analysis upload in seconds. Default: 120.
    ///
    /// OCR of a multi-page scan is the slowest of the three calls.
    pub upload_timeout_secs: u64,

    /// Timeout for the structuring and translation calls in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Timeout for downloading URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Whether the one-shot [`crate::extract()`] entry points also fetch the
    /// English view. Default: false.
    pub translate: bool,

    /// Optional stage-event callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            analysis_url: DEFAULT_ANALYSIS_URL.to_string(),
            structuring_url: DEFAULT_STRUCTURING_URL.to_string(),
            translation_url: DEFAULT_TRANSLATION_URL.to_string(),
            analysis_cookie: Some(DEFAULT_ANALYSIS_COOKIE.to_string()),
            provider: DEFAULT_PROVIDER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            structuring_prompt: None,
            upload_timeout_secs: 120,
            api_timeout_secs: 120,
            download_timeout_secs: 120,
            translate: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractorConfig")
            .field("analysis_url", &self.analysis_url)
            .field("structuring_url", &self.structuring_url)
            .field("translation_url", &self.translation_url)
            .field("analysis_cookie", &self.analysis_cookie.as_ref().map(|_| "<set>"))
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("structuring_prompt", &self.structuring_prompt.as_ref().map(String::len))
            .field("upload_timeout_secs", &self.upload_timeout_secs)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("translate", &self.translate)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractorConfig {
    /// Create a new builder for `ExtractorConfig`.
    pub fn builder() -> ExtractorConfigBuilder {
        ExtractorConfigBuilder {
            config: Self::default(),
        }
    }

    /// The prompt actually sent: the override if set, else the built-in one.
    pub fn prompt(&self) -> &str {
        self.structuring_prompt
            .as_deref()
            .unwrap_or(crate::prompts::INVOICE_STRUCTURING_PROMPT)
    }
}

/// Builder for [`ExtractorConfig`].
#[derive(Debug)]
pub struct ExtractorConfigBuilder {
    config: ExtractorConfig,
}

impl ExtractorConfigBuilder {
    pub fn analysis_url(mut self, url: impl Into<String>) -> Self {
        self.config.analysis_url = url.into();
        self
    }

    pub fn structuring_url(mut self, url: impl Into<String>) -> Self {
        self.config.structuring_url = url.into();
        self
    }

    pub fn translation_url(mut self, url: impl Into<String>) -> Self {
        self.config.translation_url = url.into();
        self
    }

    pub fn analysis_cookie(mut self, cookie: Option<impl Into<String>>) -> Self {
        self.config.analysis_cookie = cookie.map(Into::into);
        self
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.config.provider = provider.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn structuring_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.structuring_prompt = Some(prompt.into());
        self
    }

    pub fn upload_timeout_secs(mut self, secs: u64) -> Self {
        self.config.upload_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn translate(mut self, v: bool) -> Self {
        self.config.translate = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractorConfig, ExtractError> {
        let c = &self.config;
        for (name, url) in [
            ("analysis_url", &c.analysis_url),
            ("structuring_url", &c.structuring_url),
            ("translation_url", &c.translation_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ExtractError::InvalidConfig(format!(
                    "{name} must start with http:// or https://, got '{url}'"
                )));
            }
        }
        if c.provider.trim().is_empty() || c.model.trim().is_empty() {
            return Err(ExtractError::InvalidConfig(
                "provider and model must not be empty".into(),
            ));
        }
        if c.structuring_prompt.as_deref().is_some_and(|p| p.trim().is_empty()) {
            return Err(ExtractError::InvalidConfig(
                "structuring prompt override is empty".into(),
            ));
        }
        if c.upload_timeout_secs == 0 || c.api_timeout_secs == 0 || c.download_timeout_secs == 0 {
            return Err(ExtractError::InvalidConfig("timeouts must be ≥ 1s".into()));
        }
        Ok(self.config)
    }
}
