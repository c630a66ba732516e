use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use super::response::{ApiError, Envelope};
use super::AppState;
use crate::constants::SERVICE_NAME;
use crate::extractor::{parse_post_url, BatchResult, Note};

/// Create the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/post", post(extract_post).get(extract_post_query))
        .route("/api/batch", post(extract_batch))
}

async fn index() -> Response {
    Json(json!({
        "message": "Xiaohongshu post extraction API",
        "health": "/health",
    }))
    .into_response()
}

async fn health() -> Response {
    Json(json!({ "status": "healthy", "service": SERVICE_NAME })).into_response()
}

#[derive(Debug, Deserialize)]
pub struct PostRequest {
    url: String,
    #[serde(default)]
    cookies: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    urls: Vec<String>,
    #[serde(default)]
    cookies: Option<String>,
}

#[derive(Debug, Serialize)]
struct BatchResponse {
    message: String,
    results: BatchResult,
}

async fn extract_post(
    State(state): State<AppState>,
    payload: Result<Json<PostRequest>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(request)) => extract_one(&state, request).await,
        Err(rejection) => ApiError::bad_request(rejection.body_text()).into_response(),
    }
}

async fn extract_post_query(
    State(state): State<AppState>,
    params: Result<Query<PostRequest>, QueryRejection>,
) -> Response {
    match params {
        Ok(Query(request)) => extract_one(&state, request).await,
        Err(rejection) => ApiError::bad_request(rejection.body_text()).into_response(),
    }
}

async fn extract_one(state: &AppState, request: PostRequest) -> Response {
    let creds = match state.credentials(request.cookies.as_deref()) {
        Ok(c) => c,
        Err(e) => return ApiError::from(e).into_response(),
    };
    debug!(
        cookie_override = request.cookies.is_some(),
        "Single extraction requested"
    );

    match state.extractor.extract(&request.url, &creds).await {
        Ok(note) => Json(Envelope::ok("Post extracted", note)).into_response(),
        Err(e) => {
            warn!(url = %request.url, kind = ?e.kind(), "Extraction failed: {e}");
            ApiError::from(e).into_response()
        }
    }
}

async fn extract_batch(
    State(state): State<AppState>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return ApiError::bad_request(rejection.body_text()).into_response(),
    };

    let max = state.config.max_batch_size;
    if request.urls.len() > max {
        return ApiError::bad_request(format!(
            "too many URLs: {} submitted, at most {max} allowed",
            request.urls.len()
        ))
        .into_response();
    }

    let results = match state.credentials(request.cookies.as_deref()) {
        Ok(creds) => state.extractor.run_batch(&request.urls, &creds).await,
        // Every item fails on its own, URL problems first.
        Err(e) => BatchResult::from_outcomes(request.urls.iter().map(|url| {
            let outcome = parse_post_url(url).and(Err::<Note, _>(e.clone()));
            (url.clone(), outcome)
        })),
    };

    let message = format!(
        "Processed {} URLs: {} succeeded, {} failed",
        results.total,
        results.successes.len(),
        results.failures.len()
    );
    Json(BatchResponse { message, results }).into_response()
}
