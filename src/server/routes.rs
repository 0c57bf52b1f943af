//! HTTP surface of the translation service.
//!
//! ## Endpoints
//! - POST /translate - Translate a batch of texts
//! - GET  /locales   - Supported locales
//! - GET  /health    - Liveness probe
//! - GET  /metrics   - Cache and provider counters (API key protected when configured)

use super::service::TranslationService;
use super::validation::{validate, ValidationError};
use crate::i18n::LanguageRegistry;
use crate::security::is_authorized;
use crate::wire::{TranslateRequest, TranslateResponse};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// App state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TranslationService>,
    pub api_key: Option<String>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/translate", post(translate))
        .route("/locales", get(list_locales))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// POST /translate
///
/// 200 with every text translated, 500 with the same body when some texts
/// fell back to themselves, 422 when the request is invalid.
async fn translate(
    State(state): State<AppState>,
    payload: Result<Json<TranslateRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return validation_failed(ValidationError::MalformedBody(rejection.body_text()))
        }
    };

    let validated = match validate(request) {
        Ok(validated) => validated,
        Err(e) => return validation_failed(e),
    };

    debug!(
        "POST /translate ({} texts, target={:?})",
        validated.texts.len(),
        validated.target.map(|l| l.code())
    );

    let outcome = state
        .service
        .translate_batch(validated.texts, validated.target)
        .await;

    let status = if outcome.degraded {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };

    (
        status,
        Json(TranslateResponse {
            translations: outcome.translations,
        }),
    )
        .into_response()
}

fn validation_failed(error: ValidationError) -> Response {
    info!("Rejected translation request: {}", error);
    (StatusCode::UNPROCESSABLE_ENTITY, Json(error.to_response())).into_response()
}

/// GET /locales
async fn list_locales() -> Response {
    Json(LanguageRegistry::get().list_enabled()).into_response()
}

/// GET /health
async fn health() -> Response {
    Json(json!({ "status": "ok" })).into_response()
}

/// GET /metrics
async fn metrics(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !is_authorized(&headers, state.api_key.as_deref()) {
        warn!("Unauthorized /metrics request");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid or missing API key" })),
        )
            .into_response();
    }

    Json(state.service.metrics().report()).into_response()
}
