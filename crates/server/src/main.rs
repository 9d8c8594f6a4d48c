use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use server_api::{submit_preferences, ApiContext};
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{DispatchResponse, LayoutAction, LayoutSnapshot, PreferenceSubmission, SubmissionReceipt},
};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;

use app_state::AppState;
use config::{build_object_store, load_settings};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings();
    let store = build_object_store(&settings).map_err(|error| {
        error!(
            backend = %settings.storage_backend,
            bucket = %settings.bucket,
            error = %format!("{error:#}"),
            "failed to initialize object store; check storage settings"
        );
        error
    })?;
    let state = AppState {
        api: ApiContext::new(store),
    };
    let app = build_router(Arc::new(state), settings.max_body_bytes);

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, backend = %settings.storage_backend, bucket = %settings.bucket, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/preferences", post(http_submit_preferences))
        .route("/layout", get(http_layout_snapshot))
        .route("/layout/actions", post(http_dispatch_layout_action))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Storage | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject_body(rejection: JsonRejection) -> (StatusCode, Json<ApiError>) {
    warn!(error = %rejection.body_text(), "rejected request body");
    (
        rejection.status(),
        Json(ApiError::validation(rejection.body_text())),
    )
}

async fn healthz() -> &'static str {
    "ok"
}

async fn http_submit_preferences(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PreferenceSubmission>, JsonRejection>,
) -> ApiResult<SubmissionReceipt> {
    let Json(submission) = payload.map_err(reject_body)?;
    submit_preferences(&state.api, submission, Utc::now())
        .await
        .map(Json)
        .map_err(|e| (status_for(e.code), Json(e)))
}

async fn http_layout_snapshot(State(state): State<Arc<AppState>>) -> Json<LayoutSnapshot> {
    Json(state.api.layout.snapshot())
}

async fn http_dispatch_layout_action(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LayoutAction>, JsonRejection>,
) -> ApiResult<DispatchResponse> {
    let Json(action) = payload.map_err(reject_body)?;
    Ok(Json(state.api.layout.dispatch(&action)))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
