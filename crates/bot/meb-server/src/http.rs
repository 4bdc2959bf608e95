//! HTTP endpoint receiving the provider's authorization redirect.

use crate::service::MaskedEmailService;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use meb_core::Error;
use meb_identity_oauth2::AuthorizationResponse;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::warn;

const CONFIRMATION_PAGE: &str = "<!DOCTYPE html>\
<html><head><meta charset=\"utf-8\"><title>Masked Email Bot</title></head>\
<body><p>Authorization complete. You can close this page and return to Telegram.</p></body></html>";

/// Error body `{"error": "..."}` with its status code.
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match err {
            Error::NoState => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub fn router(service: MaskedEmailService) -> Router {
    Router::new()
        .route("/redirect", get(redirect_handler))
        .route("/health", get(|| async { "OK" }))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

async fn redirect_handler(
    State(service): State<MaskedEmailService>,
    Query(params): Query<AuthorizationResponse>,
) -> Result<Html<&'static str>, ApiError> {
    if let Some(error) = params.error.filter(|e| !e.is_empty()) {
        warn!(
            description = params.error_description.as_deref().unwrap_or_default(),
            "Provider redirected with an error: {}", error
        );
        return Err(ApiError::bad_request(error));
    }

    let code = params.code.filter(|c| !c.is_empty());
    let state = params.state.filter(|s| !s.is_empty());
    let (Some(code), Some(state)) = (code, state) else {
        return Err(ApiError::bad_request("code or/and state are empty"));
    };

    service.complete_flow(&code, &state).await?;

    Ok(Html(CONFIRMATION_PAGE))
}
