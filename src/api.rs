//! HTTP surface for pdf2speech.
//!
//! This module exposes a compact Axum router:
//!
//! - `POST /rewrite` – Chunk already-extracted text, rewrite every chunk for speech, and return
//!   the reassembled text with counters (`chunk_count`, `rewritten`, `fallbacks`).
//! - `POST /analyze` – Return content statistics and the chunk plan without calling the model.
//! - `GET /metrics` – Observe rewrite counters and the last chunk budget used.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.
//!
//! The HTTP surface shares the same document service as the CLI, so behavior is identical across
//! interfaces.

use crate::document::Document;
use crate::processing::{ChunkPlan, PipelineError, ProcessingApi, RewriteOutcome, ServiceError};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

const DEFAULT_SOURCE_NAME: &str = "upload.txt";

/// Build the HTTP router exposing the rewrite API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: ProcessingApi + 'static,
{
    Router::new()
        .route("/rewrite", post(rewrite_document::<S>))
        .route("/analyze", post(analyze_document::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .with_state(service)
}

/// Request body for the `POST /rewrite` endpoint.
#[derive(Deserialize)]
struct RewriteRequest {
    /// Extracted document text.
    text: String,
    /// Optional name reported back in the response and logs.
    #[serde(default)]
    source_name: Option<String>,
    /// Optional page count of the source document.
    #[serde(default)]
    page_count: Option<usize>,
}

/// Rewrite a document for speech.
async fn rewrite_document<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<RewriteRequest>,
) -> Result<Json<RewriteOutcome>, AppError>
where
    S: ProcessingApi,
{
    let RewriteRequest {
        text,
        source_name,
        page_count,
    } = request;
    if text.trim().is_empty() {
        return Err(AppError::BadRequest("text must not be empty".into()));
    }

    let source_name = source_name.unwrap_or_else(|| DEFAULT_SOURCE_NAME.to_string());
    let document = Document::new(text, page_count.unwrap_or(1), source_name);
    let outcome = service.rewrite_document(document).await?;
    tracing::info!(
        source = %outcome.source_name,
        chunks = outcome.chunk_count,
        rewritten = outcome.rewritten,
        fallbacks = outcome.fallbacks,
        "Rewrite request completed"
    );
    Ok(Json(outcome))
}

/// Request body for `POST /analyze`.
#[derive(Deserialize)]
struct AnalyzeRequest {
    text: String,
}

/// Return statistics and the chunk plan for a document.
async fn analyze_document<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<AnalyzeRequest>,
) -> Json<ChunkPlan>
where
    S: ProcessingApi,
{
    Json(service.plan(&request.text))
}

/// Return rewrite counters and the last chunk budget.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsResponse>
where
    S: ProcessingApi,
{
    let snapshot = service.metrics_snapshot();
    Json(MetricsResponse {
        documents_processed: snapshot.documents_processed,
        chunks_rewritten: snapshot.chunks_rewritten,
        chunks_fallback: snapshot.chunks_fallback,
        last_chunk_budget: snapshot.last_chunk_budget,
    })
}

/// Response body for `GET /metrics`.
#[derive(Serialize)]
struct MetricsResponse {
    documents_processed: u64,
    chunks_rewritten: u64,
    chunks_fallback: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_chunk_budget: Option<u64>,
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "rewrite",
                method: "POST",
                path: "/rewrite",
                description: "Chunk extracted text, rewrite each chunk for text-to-speech, and return the reassembled text with chunk counters.",
                request_example: Some(json!({
                    "text": "Extracted document text",
                    "source_name": "paper.pdf",
                    "page_count": 12
                })),
            },
            CommandDescriptor {
                name: "analyze",
                method: "POST",
                path: "/analyze",
                description: "Return word, paragraph, and token counts plus the per-chunk token estimates without calling the model.",
                request_example: Some(json!({ "text": "Extracted document text" })),
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return rewrite counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

enum AppError {
    BadRequest(String),
    Service(ServiceError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Service(error @ ServiceError::Pipeline(PipelineError::NoProgress { .. })) => {
                (StatusCode::BAD_GATEWAY, error.to_string())
            }
            Self::Service(error @ ServiceError::Extraction(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, error.to_string())
            }
            Self::Service(error) => (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<ServiceError> for AppError {
    fn from(inner: ServiceError) -> Self {
        Self::Service(inner)
    }
}
