//! HTTP service layer.
//!
//! Thin request/response boundary over the orchestrator: a retrieve
//! endpoint and a raw embedding endpoint. Validation failures map to 400
//! with a specific message; everything else maps to 500 with a diagnostic
//! embedding the failure's kind and text.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::error::RetrievalError;
use crate::retriever::RetrieverContext;

#[derive(Debug, Deserialize)]
pub struct RagQuery {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct RetrieveParams {
    pub k: Option<usize>,
}

#[derive(Debug, Serialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct RetrieveResponse {
    results: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

/// Build the router over the shared read-only context.
pub fn router(ctx: Arc<RetrieverContext>) -> Router {
    Router::new()
        .route("/embed", post(embed))
        .route("/retrieve", post(retrieve))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

async fn embed(
    State(ctx): State<Arc<RetrieverContext>>,
    Json(body): Json<RagQuery>,
) -> Result<Json<EmbedResponse>, ApiError> {
    let embedding = ctx.embed(&body.query).await?;
    Ok(Json(EmbedResponse { embedding }))
}

async fn retrieve(
    State(ctx): State<Arc<RetrieverContext>>,
    Query(params): Query<RetrieveParams>,
    Json(body): Json<RagQuery>,
) -> Result<Json<RetrieveResponse>, ApiError> {
    let k = params.k.unwrap_or(ctx.config().default_k);
    let results = ctx.retrieve(&body.query, k).await?;
    Ok(Json(RetrieveResponse { results }))
}

/// Response-side wrapper for pipeline errors.
struct ApiError(RetrievalError);

impl From<RetrievalError> for ApiError {
    fn from(e: RetrievalError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        if err.is_client_error() {
            let body = ErrorBody { detail: err.to_string() };
            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }
        error!(kind = err.kind(), %err, "request failed");
        let body = ErrorBody {
            detail: format!("Internal Server Error: {}: {}", err.kind(), err),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}
