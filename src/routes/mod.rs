//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the editor JSON API under a single Axum router. Every
//! `/api` route identifies the caller through `auth::AuthUser` and renders
//! service errors as `{ code, message, retryable }` bodies via `ApiError`.

pub mod auth;
pub mod editor;
pub mod usage;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post, put};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::{ErrorBody, ErrorCode};
use crate::image::MAX_IMAGE_BYTES;
use crate::state::AppState;

/// Largest accepted request body: a maximum-size image as base64 plus JSON framing.
pub const MAX_REQUEST_BYTES: usize = MAX_IMAGE_BYTES / 3 * 4 + 1024 * 1024;

// =============================================================================
// API ERROR
// =============================================================================

/// JSON error response with an HTTP status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, err: &(impl ErrorCode + ?Sized)) -> Self {
        Self { status, body: ErrorBody::from_error(err) }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn body(&self) -> &ErrorBody {
        &self.body
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

// =============================================================================
// ROUTER
// =============================================================================

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/editor", get(editor::get_editor))
        .route("/api/editor/image", post(editor::upload_image))
        .route("/api/editor/edit", post(editor::edit))
        .route("/api/editor/undo", post(editor::undo))
        .route("/api/editor/redo", post(editor::redo))
        .route(
            "/api/editor/reference",
            put(editor::put_reference).delete(editor::delete_reference),
        )
        .route("/api/editor/api-key", put(editor::put_api_key))
        .route("/api/editor/chat", get(editor::chat))
        .route("/api/editor/download", get(editor::download))
        .route("/api/usage", get(usage::usage))
        .route("/api/tools", get(editor::tools))
        .route("/healthz", get(healthz))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
