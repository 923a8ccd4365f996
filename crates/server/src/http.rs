//! HTTP Endpoints
//!
//! REST API for quote retrieval: one search endpoint and a health probe.

use axum::{
    extract::{Json, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Deserializer, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use quote_rag_retrieval::{RagError, ScoredResult, SearchQuery};

use crate::state::AppState;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let cors_layer = build_cors_layer(
        &state.settings.server.cors_origins,
        state.settings.server.cors_enabled,
    );

    Router::new()
        .route("/search", post(search))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// Build CORS layer from configured origins
///
/// - If cors_enabled is false, returns a permissive layer (for dev)
/// - Invalid or missing origins fall back to localhost:3000
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins (NOT FOR PRODUCTION)");
        return CorsLayer::permissive();
    }

    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    if parsed_origins.is_empty() {
        tracing::info!("No valid CORS origins configured, defaulting to localhost:3000");
        let localhost = HeaderValue::from_static("http://localhost:3000");
        return CorsLayer::new()
            .allow_origin(localhost)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any);
    }

    tracing::info!("CORS configured with {} origins", parsed_origins.len());
    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Search request
#[derive(Debug, Deserialize)]
struct SearchRequest {
    #[serde(default)]
    query: String,
    top_k: Option<usize>,
    #[serde(default, deserialize_with = "lenient_string_list")]
    exclude_ids: Vec<String>,
}

/// Accept a list of ids, tolerating sloppy clients: a non-array value
/// becomes the empty list, numeric entries are stringified, anything else
/// is dropped.
fn lenient_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let serde_json::Value::Array(items) = value else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect())
}

/// Search response
#[derive(Debug, Serialize)]
struct SearchResponse {
    results: Vec<ScoredResult>,
}

/// Error body returned for every failed request
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Boundary mapping from pipeline errors to HTTP responses
struct ApiError(RagError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            RagError::EmptyQuery => StatusCode::BAD_REQUEST,
            _ => {
                tracing::error!(error = %self.0, "Search failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = Json(ErrorBody {
            error: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

/// Search endpoint
async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = SearchQuery {
        text: request.query,
        top_k: request.top_k,
        exclude_ids: request.exclude_ids,
    };

    // Embedding and reranking are CPU-bound; keep them off the async workers
    let retriever = state.retriever.clone();
    let results = tokio::task::spawn_blocking(move || retriever.search(&query))
        .await
        .map_err(|e| ApiError(RagError::Model(format!("Search task failed: {}", e))))?
        .map_err(ApiError)?;

    Ok(Json(SearchResponse { results }))
}

/// Health check
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "citations_count": state.corpus.len(),
    }))
}
