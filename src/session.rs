//! Document sessions: sequencing, translation cache and view selection.
//!
//! [`InvoiceExtractor`] owns at most one *current* session. Each call to
//! [`InvoiceExtractor::process_document`] allocates a new, strictly
//! increasing [`SessionId`] and clears the current session before the upload
//! starts. When a stage returns, its result is only applied if its session is
//! still the latest one; otherwise the caller gets
//! [`ExtractError::SessionSuperseded`] and nothing changes.
//!
//! ## Concurrency
//!
//! All methods take `&self`, so a newer document can be started while an older
//! call is still awaiting its HTTP round trip. The shared state sits behind a
//! `std::sync::Mutex` that is never held across an `.await`. The English view
//! of a session lives in a `tokio::sync::OnceCell`: it is written at most once,
//! and concurrent [`InvoiceExtractor::translation`] calls for one session share
//! a single upstream request.

use crate::config::ExtractorConfig;
use crate::error::{ExtractError, Stage};
use crate::invoice::{ExtractedInvoiceData, RawEnvelope};
use crate::pipeline::input::{self, DocumentFile};
use crate::pipeline::{analysis, structure, translate};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Identifier of one document session. Starts at 1.
pub type SessionId = u64;

/// Which rendition of the invoice is displayed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Data as structured, in the document's own language.
    #[default]
    Original,
    /// The translated data.
    English,
}

/// Result of [`InvoiceExtractor::process_document`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedDocument {
    pub session: SessionId,
    pub original: ExtractedInvoiceData,
    pub envelope: RawEnvelope,
    pub markdown: String,
    pub analysis_ms: u64,
    pub structuring_ms: u64,
}

/// Point-in-time copy of the current session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub filename: String,
    pub view: ViewMode,
    pub markdown: String,
    pub original: ExtractedInvoiceData,
    pub envelope: RawEnvelope,
    /// `Some` once translation has succeeded for this session.
    pub translated: Option<ExtractedInvoiceData>,
}

struct DocumentSession {
    id: SessionId,
    filename: String,
    markdown: String,
    original: ExtractedInvoiceData,
    envelope: RawEnvelope,
    translated: OnceCell<ExtractedInvoiceData>,
}

#[derive(Default)]
struct SessionState {
    current: Option<Arc<DocumentSession>>,
    view: ViewMode,
}

/// Runs the upload → structure → translate pipeline for one document at a
/// time.
///
/// # Example
/// ```rust,no_run
/// use invoice_extract::{ExtractorConfig, InvoiceExtractor, ViewMode};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let extractor = InvoiceExtractor::new(ExtractorConfig::default())?;
/// let doc = extractor.process_input("facture.pdf").await?;
/// println!("invoice {:?}", doc.original.invoice_number());
///
/// let english = extractor.select_view(ViewMode::English).await?;
/// println!("{}", serde_json::to_string_pretty(&english)?);
/// # Ok(())
/// # }
/// ```
pub struct InvoiceExtractor {
    config: ExtractorConfig,
    client: reqwest::Client,
    latest: AtomicU64,
    state: Mutex<SessionState>,
}

impl std::fmt::Debug for InvoiceExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvoiceExtractor")
            .field("config", &self.config)
            .field("latest", &self.latest.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl InvoiceExtractor {
    pub fn new(config: ExtractorConfig) -> Result<Self, ExtractError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("invoice-extract/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ExtractError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self::with_client(config, client))
    }

    /// Use a caller-supplied HTTP client. Per-request timeouts from `config`
    /// still apply.
    pub fn with_client(config: ExtractorConfig, client: reqwest::Client) -> Self {
        Self {
            config,
            client,
            latest: AtomicU64::new(0),
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Resolve a path or URL and process it as a new document.
    pub async fn process_input(&self, input: &str) -> Result<ProcessedDocument, ExtractError> {
        let doc = input::resolve_input(input, self.config.download_timeout_secs).await?;
        self.process_document(doc).await
    }

    /// Start a new session: upload `doc`, then structure its markdown.
    ///
    /// The previous session (and its translation cache) is discarded as soon
    /// as this is called. If the upload fails, structuring is never
    /// attempted. If another document is started before this one finishes,
    /// the result is dropped and [`ExtractError::SessionSuperseded`] is
    /// returned.
    pub async fn process_document(
        &self,
        doc: DocumentFile,
    ) -> Result<ProcessedDocument, ExtractError> {
        let id = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut state = self.lock();
            if let Some(old) = state.current.take() {
                debug!("Session {} discarded by session {}", old.id, id);
            }
            state.view = ViewMode::Original;
        }
        info!("Session {}: processing '{}'", id, doc.filename);
        if let Some(cb) = &self.config.progress_callback {
            cb.on_session_start(id, &doc.filename);
        }

        let (markdown, analysis_ms) = self
            .run_stage(
                id,
                Stage::Analysis,
                analysis::upload(&self.client, &self.config, &doc),
            )
            .await?;
        self.ensure_latest(id)?;

        let (structured, structuring_ms) = self
            .run_stage(
                id,
                Stage::Structuring,
                structure::structure(&self.client, &self.config, &markdown),
            )
            .await?;

        let session = Arc::new(DocumentSession {
            id,
            filename: doc.filename,
            markdown,
            original: structured.data,
            envelope: structured.envelope,
            translated: OnceCell::new(),
        });

        {
            let mut state = self.lock();
            // Checked under the lock so a newer start cannot slip in between.
            self.ensure_latest(id)?;
            state.current = Some(Arc::clone(&session));
            state.view = ViewMode::Original;
        }
        info!(
            "Session {}: structured {} line items",
            id,
            session.original.line_item_count()
        );

        Ok(ProcessedDocument {
            session: id,
            original: session.original.clone(),
            envelope: session.envelope.clone(),
            markdown: session.markdown.clone(),
            analysis_ms,
            structuring_ms,
        })
    }

    /// The English rendition of the current session.
    ///
    /// The translation service is called at most once per session; later
    /// calls return the cached value. Does not change the selected view.
    pub async fn translation(&self) -> Result<ExtractedInvoiceData, ExtractError> {
        let session = self.current().ok_or(ExtractError::NoActiveSession)?;
        self.translate_session(&session).await
    }

    /// Switch the displayed view and return the data it now shows.
    ///
    /// Selecting [`ViewMode::English`] waits for the translation if it has
    /// not run yet. If translation fails, or the session is replaced while
    /// waiting, the view is left as it was.
    pub async fn select_view(&self, mode: ViewMode) -> Result<ExtractedInvoiceData, ExtractError> {
        let session = self.current().ok_or(ExtractError::NoActiveSession)?;
        let data = match mode {
            ViewMode::Original => session.original.clone(),
            ViewMode::English => self.translate_session(&session).await?,
        };

        let mut state = self.lock();
        let still_current = state.current.as_ref().is_some_and(|c| c.id == session.id);
        if !still_current {
            return Err(ExtractError::SessionSuperseded {
                session: session.id,
            });
        }
        state.view = mode;
        debug!("Session {}: view set to {:?}", session.id, mode);
        Ok(data)
    }

    /// Data for the currently selected view, or `None` before any document.
    pub fn current_view(&self) -> Option<ExtractedInvoiceData> {
        let state = self.lock();
        let session = state.current.as_ref()?;
        let data = match state.view {
            ViewMode::English => session
                .translated
                .get()
                .unwrap_or(&session.original)
                .clone(),
            ViewMode::Original => session.original.clone(),
        };
        Some(data)
    }

    pub fn view_mode(&self) -> ViewMode {
        self.lock().view
    }

    pub fn current_session(&self) -> Option<SessionSnapshot> {
        let state = self.lock();
        state.current.as_ref().map(|s| SessionSnapshot {
            id: s.id,
            filename: s.filename.clone(),
            view: state.view,
            markdown: s.markdown.clone(),
            original: s.original.clone(),
            envelope: s.envelope.clone(),
            translated: s.translated.get().cloned(),
        })
    }

    /// Id of the session whose data is currently held.
    pub fn session_id(&self) -> Option<SessionId> {
        self.lock().current.as_ref().map(|s| s.id)
    }

    async fn translate_session(
        &self,
        session: &DocumentSession,
    ) -> Result<ExtractedInvoiceData, ExtractError> {
        if let Some(cached) = session.translated.get() {
            debug!("Session {}: translation cache hit", session.id);
            return Ok(cached.clone());
        }

        let translated = session
            .translated
            .get_or_try_init(|| async move {
                let (data, _) = self
                    .run_stage(
                        session.id,
                        Stage::Translation,
                        translate::translate(&self.client, &self.config, &session.envelope),
                    )
                    .await?;
                self.ensure_latest(session.id)?;
                Ok::<_, ExtractError>(data)
            })
            .await?;
        Ok(translated.clone())
    }

    /// Await one stage, reporting it to the log and the progress callback.
    async fn run_stage<T>(
        &self,
        session: SessionId,
        stage: Stage,
        fut: impl Future<Output = Result<T, ExtractError>>,
    ) -> Result<(T, u64), ExtractError> {
        let cb = self.config.progress_callback.as_ref();
        if let Some(cb) = cb {
            cb.on_stage_start(session, stage);
        }
        let start = Instant::now();

        match fut.await {
            Ok(value) => {
                let elapsed_ms = start.elapsed().as_millis() as u64;
                info!("Session {}: {} finished in {}ms", session, stage, elapsed_ms);
                if let Some(cb) = cb {
                    cb.on_stage_complete(session, stage, elapsed_ms);
                }
                Ok((value, elapsed_ms))
            }
            Err(e) => {
                warn!("Session {}: {} failed: {}", session, stage, e);
                if let Some(cb) = cb {
                    cb.on_stage_error(session, stage, &e.to_string());
                }
                Err(e)
            }
        }
    }

    fn ensure_latest(&self, id: SessionId) -> Result<(), ExtractError> {
        let latest = self.latest.load(Ordering::SeqCst);
        if latest == id {
            Ok(())
        } else {
            debug!("Session {} superseded by {}; discarding result", id, latest);
            Err(ExtractError::SessionSuperseded { session: id })
        }
    }

    fn current(&self) -> Option<Arc<DocumentSession>> {
        self.lock().current.clone()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> InvoiceExtractor {
        let config = ExtractorConfig::builder()
            .analysis_url("http://127.0.0.1:9/analysis")
            .structuring_url("http://127.0.0.1:9/structure")
            .translation_url("http://127.0.0.1:9/translate")
            .upload_timeout_secs(5)
            .build()
            .unwrap();
        InvoiceExtractor::new(config).unwrap()
    }

    #[test]
    fn extractor_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<InvoiceExtractor>();
    }

    #[test]
    fn fresh_extractor_has_no_session() {
        let ex = extractor();
        assert_eq!(ex.session_id(), None);
        assert!(ex.current_view().is_none());
        assert!(ex.current_session().is_none());
        assert_eq!(ex.view_mode(), ViewMode::Original);
    }

    #[tokio::test]
    async fn translation_without_session_fails() {
        let ex = extractor();
        assert!(matches!(
            ex.translation().await.unwrap_err(),
            ExtractError::NoActiveSession
        ));
        assert!(matches!(
            ex.select_view(ViewMode::English).await.unwrap_err(),
            ExtractError::NoActiveSession
        ));
    }

    #[tokio::test]
    async fn failed_upload_leaves_no_session() {
        let ex = extractor();
        let doc = DocumentFile::new(b"%PDF-1.4".to_vec(), "a.pdf", "application/pdf");
        let err = ex.process_document(doc).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Analysis), "{err:?}");
        assert_eq!(ex.session_id(), None);
    }

    #[test]
    fn view_mode_serialises_lowercase() {
        assert_eq!(
            serde_json::to_string(&ViewMode::English).unwrap(),
            "\"english\""
        );
        assert_eq!(ViewMode::default(), ViewMode::Original);
    }
}
