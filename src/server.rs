//! HTTP front door of the service
//!
//! Two render endpoints share one handler body. Request bodies are parsed by
//! hand rather than with the `Json` extractor: the content type is not checked
//! and an empty body is treated as an empty request, which then gets the usual
//! "no content" 400 instead of an extractor rejection.

use crate::{ArtifactKind, Config, ErrorSeverity, RenderBackend, RenderError, RenderRequest};
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn RenderBackend>,
    /// Present only when the Prometheus recorder is installed.
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(backend: Arc<dyn RenderBackend>) -> Self {
        Self {
            backend,
            prometheus: None,
        }
    }

    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }
}

pub fn build_router(state: AppState, body_limit_bytes: usize) -> Router {
    Router::new()
        .route("/html-to-pdf", post(html_to_pdf))
        .route("/html-to-image", post(html_to_image))
        .route("/health", get(health))
        .route("/metrics", get(metrics_text))
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .with_state(state)
}

/// Bind the configured address and serve until `shutdown` resolves.
pub async fn serve<F>(config: &Config, state: AppState, shutdown: F) -> Result<(), RenderError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(config.socket_address()).await?;
    info!(
        "Listening on {} with the {} backend",
        listener.local_addr()?,
        state.backend.name()
    );

    axum::serve(listener, build_router(state, config.body_limit_bytes))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn html_to_pdf(State(state): State<AppState>, body: Bytes) -> Response {
    render(state, ArtifactKind::Pdf, body).await
}

async fn html_to_image(State(state): State<AppState>, body: Bytes) -> Response {
    render(state, ArtifactKind::Png, body).await
}

async fn render(state: AppState, kind: ArtifactKind, body: Bytes) -> Response {
    let request_id = Uuid::new_v4();
    let span = info_span!("render", %request_id, kind = kind.label());

    let mut response = async move {
        let request = match parse_request(&body) {
            Ok(request) => request,
            Err(error) => return RenderFailure { kind, error }.into_response(),
        };

        match state.backend.render(&request, kind).await {
            Ok(artifact) => {
                ([(header::CONTENT_TYPE, artifact.content_type())], artifact.bytes).into_response()
            }
            Err(error) => RenderFailure { kind, error }.into_response(),
        }
    }
    .instrument(span)
    .await;

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

fn parse_request(body: &[u8]) -> Result<RenderRequest, RenderError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RenderRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| RenderError::InvalidRequest(format!("Malformed request body: {e}")))
}

/// A failed render as the caller sees it
///
/// Client errors carry their own message; everything else is reported with
/// the fixed per-kind message and the details stay in the logs.
struct RenderFailure {
    kind: ArtifactKind,
    error: RenderError,
}

impl IntoResponse for RenderFailure {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match self.error.severity() {
            ErrorSeverity::Low => debug!("Rejected {} request: {}", self.kind.label(), self.error),
            ErrorSeverity::Medium => warn!("{} render failed: {}", self.kind.label(), self.error),
            ErrorSeverity::High | ErrorSeverity::Critical => {
                error!("{} render failed: {}", self.kind.label(), self.error)
            }
        }

        let message = match self.error {
            RenderError::InvalidRequest(message) => message,
            _ => self.kind.failure_message().to_string(),
        };
        (status, message).into_response()
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics_text(State(state): State<AppState>) -> Response {
    match &state.prometheus {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics are disabled").into_response(),
    }
}
