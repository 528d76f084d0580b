//! # analysis-relay
//!
//! A one-route HTTP relay in front of the document analysis service.
//!
//! Browsers cannot set the `Cookie` header the analysis service requires on
//! a cross-origin request, so a deployed front end posts its multipart upload
//! here instead. The relay:
//!
//! 1. adds the configured `Cookie` header,
//! 2. forwards the body and its `Content-Type` (multipart boundary included)
//!    byte for byte,
//! 3. returns the upstream status code and JSON body unchanged, with
//!    permissive CORS headers.
//!
//! ```text
//! POST    /api/azure-analysis  → upstream status + JSON
//! OPTIONS /api/azure-analysis  → 200 (CORS preflight)
//! *       /api/azure-analysis  → 405 {"error":"Method not allowed"}
//! failure                      → 500 {"error":"Internal server error","message":…}
//! ```
//!
//! ## Environment variables
//!
//! - `RELAY_TARGET_URL`: analysis endpoint to forward to
//! - `RELAY_COOKIE`: value of the `Cookie` header added upstream
//! - `RELAY_BIND_ADDR`: listen address (default `0.0.0.0:3001`)
//! - `RELAY_TIMEOUT_SECS`: upstream timeout (default 120)
//! - `RELAY_MAX_BODY_BYTES`: largest accepted upload (default 50 MiB)

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::header::{CONTENT_TYPE, COOKIE};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

// ── Public constants ─────────────────────────────────────────────────────────

/// Route the relay listens on.
pub const RELAY_PATH: &str = "/api/azure-analysis";

pub const DEFAULT_TARGET_URL: &str =
    "https://raws.e42.ai/edith/api/core/documents/v3/azure-analysis";
pub const DEFAULT_COOKIE: &str =
    "elementor_split_test_client_id=c030c8dc-4c4b-48cc-badc-29301a57912a";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3001";

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by the relay.
#[derive(Error, Debug)]
pub enum RelayError {
    /// The upstream request failed before a response arrived.
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    /// The upstream answered with something that is not JSON.
    #[error("upstream response is not JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// An environment variable held an unusable value.
    #[error("invalid {var}: {reason}")]
    Config { var: &'static str, reason: String },
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        error!("Analysis relay error: {}", self);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "Internal server error",
                "message": self.to_string(),
            })),
        )
            .into_response()
    }
}

// ── Configuration ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub target_url: String,
    pub cookie: String,
    pub bind_addr: SocketAddr,
    pub timeout_secs: u64,
    pub max_body_bytes: usize,
}

impl RelayConfig {
    /// Read `RELAY_*` variables from the process environment.
    pub fn from_env() -> Result<Self, RelayError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup; unset variables take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, RelayError> {
        let bind = lookup("RELAY_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind.parse::<SocketAddr>().map_err(|e| RelayError::Config {
            var: "RELAY_BIND_ADDR",
            reason: format!("'{bind}': {e}"),
        })?;

        let target_url = lookup("RELAY_TARGET_URL").unwrap_or_else(|| DEFAULT_TARGET_URL.to_string());
        if !target_url.starts_with("http://") && !target_url.starts_with("https://") {
            return Err(RelayError::Config {
                var: "RELAY_TARGET_URL",
                reason: format!("'{target_url}' is not an HTTP/HTTPS URL"),
            });
        }

        Ok(Self {
            target_url,
            cookie: lookup("RELAY_COOKIE").unwrap_or_else(|| DEFAULT_COOKIE.to_string()),
            bind_addr,
            timeout_secs: parse_number(&lookup, "RELAY_TIMEOUT_SECS", 120)?,
            max_body_bytes: parse_number(&lookup, "RELAY_MAX_BODY_BYTES", 50 * 1024 * 1024)?,
        })
    }
}

fn parse_number<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, RelayError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| RelayError::Config {
            var,
            reason: format!("'{raw}': {e}"),
        }),
    }
}

// ── Router ───────────────────────────────────────────────────────────────────

struct RelayState {
    config: RelayConfig,
    client: reqwest::Client,
}

/// Build the relay service.
pub fn router(config: RelayConfig) -> Result<Router, RelayError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    let body_limit = DefaultBodyLimit::max(config.max_body_bytes);
    let state = Arc::new(RelayState { config, client });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    Ok(Router::new()
        .route(
            RELAY_PATH,
            post(relay).options(preflight).fallback(method_not_allowed),
        )
        .layer(body_limit)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

async fn relay(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, RelayError> {
    debug!(
        "Relaying {} byte upload to {}",
        body.len(),
        state.config.target_url
    );

    let mut request = state
        .client
        .post(&state.config.target_url)
        .header(COOKIE, &state.config.cookie);
    if let Some(content_type) = headers.get(CONTENT_TYPE) {
        request = request.header(CONTENT_TYPE, content_type.clone());
    }

    let upstream = request.body(body).send().await?;
    let status = upstream.status();
    let data: Value = serde_json::from_slice(&upstream.bytes().await?)?;

    info!("Analysis upstream answered {}", status);
    Ok((status, Json(data)).into_response())
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({"error": "Method not allowed"})),
    )
        .into_response()
}
