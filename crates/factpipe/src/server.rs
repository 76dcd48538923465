//! HTTP surface: `POST /fact-check-article` (and `/api/fact-check`), plus `GET /healthz`.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use factpipe_core::{Claim, Error};
use factpipe_local::Pipeline;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/fact-check-article", post(fact_check))
        .route("/api/fact-check", post(fact_check))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Either field is accepted; `article` wins when both are present.
#[derive(Debug, Deserialize)]
pub struct FactCheckRequest {
    #[serde(default)]
    pub article: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FactCheckResponse {
    pub claims: Vec<Claim>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid request body: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Pipeline(#[from] Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(Error::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "fact check failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "fact check rejected");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

async fn healthz(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "evaluator": state.pipeline.evaluator_name(),
        "search": state.pipeline.search_name(),
    }))
}

async fn fact_check(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<FactCheckResponse>, ApiError> {
    let req: FactCheckRequest =
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    // `article` wins when both are present; a blank one falls through to `content`.
    let article = [req.article, req.content]
        .into_iter()
        .flatten()
        .find(|text| !text.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing `article` (or `content`) field".into()))?;
    let claims = state.pipeline.run(&article).await?;
    Ok(Json(FactCheckResponse { claims }))
}
