use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::warn;

use grelay_core::{AuthProvider, GenerateError, GenerateService, Principal};
use grelay_protocol::chat::generate::response::ErrorBody;
use grelay_storage::UsageStorage;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) service: Arc<GenerateService>,
    pub(crate) auth: Arc<dyn AuthProvider>,
    pub(crate) storage: UsageStorage,
}

pub(crate) fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/generate", post(generate))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_principal,
        ))
        // Unauthenticated liveness probe.
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn require_principal(
    State(state): State<AppState>,
    mut req: axum::http::Request<Body>,
    next: Next,
) -> Response {
    match state.auth.authenticate(req.headers()) {
        Ok(principal) => {
            req.extensions_mut().insert(principal);
            next.run(req).await
        }
        Err(rejection) => {
            warn!(reason = rejection.as_str(), "request rejected");
            error_response(&GenerateError::Unauthenticated)
        }
    }
}

async fn generate(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    body: Bytes,
) -> Response {
    match state.service.generate(Some(&principal), &body).await {
        Ok(out) => (StatusCode::OK, Json(out)).into_response(),
        Err(err) => error_response(&err),
    }
}

async fn healthz(State(state): State<AppState>) -> Response {
    match state.storage.health().await {
        Ok(()) => (StatusCode::OK, "ok").into_response(),
        Err(err) => {
            warn!(error = %err, "health check failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "storage unavailable").into_response()
        }
    }
}

fn error_response(err: &GenerateError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = ErrorBody {
        error: err.kind().to_string(),
        message: err.to_string(),
    };
    (status, Json(body)).into_response()
}
