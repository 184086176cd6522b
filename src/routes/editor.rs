//! Editor routes: canvas state, edits, history, reference image, API key.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ApiError;
use crate::routes::auth::AuthUser;
use crate::services::chat::ChatMessage;
use crate::services::dispatch::{DispatchError, STYLE_OPTIONS, Tool};
use crate::services::editor::{self, Direction, EditOutcome, EditRequest, EditorError, EditorSnapshot, HistoryMove};
use crate::services::store::StoreError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ImageBody {
    pub image: String,
}

#[derive(Deserialize)]
pub struct ApiKeyBody {
    #[serde(default)]
    pub key: String,
}

#[derive(Deserialize)]
pub struct ChatQuery {
    pub after: Option<Uuid>,
}

#[derive(Serialize)]
pub struct ToolInfo {
    pub id: Tool,
    pub name: &'static str,
}

#[derive(Serialize)]
pub struct ToolsResponse {
    pub tools: Vec<ToolInfo>,
    pub styles: &'static [&'static str],
}

pub(crate) fn editor_error_to_status(err: &EditorError) -> StatusCode {
    match err {
        EditorError::Busy => StatusCode::CONFLICT,
        EditorError::LimitReached(_) => StatusCode::TOO_MANY_REQUESTS,
        EditorError::MissingImage | EditorError::NotDownloadable => StatusCode::UNPROCESSABLE_ENTITY,
        EditorError::ModelNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
        EditorError::Image(_) => StatusCode::BAD_REQUEST,
        EditorError::Dispatch(DispatchError::Model(_) | DispatchError::NoImage(_)) => StatusCode::BAD_GATEWAY,
        EditorError::Dispatch(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EditorError::Store(StoreError::QuotaExceeded { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
        EditorError::Store(_) | EditorError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<EditorError> for ApiError {
    fn from(err: EditorError) -> Self {
        Self::new(editor_error_to_status(&err), &err)
    }
}

/// `GET /api/editor`: current session snapshot.
pub async fn get_editor(State(state): State<AppState>, auth: AuthUser) -> Json<EditorSnapshot> {
    Json(editor::snapshot(&state, auth.uid()).await)
}

/// `POST /api/editor/image`: replace the canvas with an uploaded image.
pub async fn upload_image(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<ImageBody>,
) -> Result<Json<EditorSnapshot>, ApiError> {
    Ok(Json(editor::upload(&state, auth.uid(), &body.image).await?))
}

/// `POST /api/editor/edit`: run one AI edit.
pub async fn edit(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<EditRequest>,
) -> Result<Json<EditOutcome>, ApiError> {
    Ok(Json(editor::submit(&state, &auth.profile, body).await?))
}

/// `POST /api/editor/undo`
pub async fn undo(State(state): State<AppState>, auth: AuthUser) -> Result<Json<HistoryMove>, ApiError> {
    Ok(Json(editor::step_history(&state, auth.uid(), Direction::Undo).await?))
}

/// `POST /api/editor/redo`
pub async fn redo(State(state): State<AppState>, auth: AuthUser) -> Result<Json<HistoryMove>, ApiError> {
    Ok(Json(editor::step_history(&state, auth.uid(), Direction::Redo).await?))
}

/// `PUT /api/editor/reference`: attach a reference image for the object tool.
pub async fn put_reference(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<ImageBody>,
) -> Result<Json<EditorSnapshot>, ApiError> {
    Ok(Json(editor::set_reference(&state, auth.uid(), &body.image).await?))
}

/// `DELETE /api/editor/reference`
pub async fn delete_reference(State(state): State<AppState>, auth: AuthUser) -> Json<EditorSnapshot> {
    Json(editor::clear_reference(&state, auth.uid()).await)
}

/// `PUT /api/editor/api-key`: save or (when blank) clear the caller's own key.
pub async fn put_api_key(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<ApiKeyBody>,
) -> Result<Json<EditorSnapshot>, ApiError> {
    Ok(Json(editor::set_api_key(&state, auth.uid(), &body.key).await?))
}

/// `GET /api/editor/chat?after=<id>`: transcript, optionally only newer messages.
pub async fn chat(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ChatQuery>,
) -> Json<Vec<ChatMessage>> {
    Json(editor::chat_messages(&state, auth.uid(), query.after).await)
}

/// `GET /api/editor/download`: current image as an attachment.
pub async fn download(State(state): State<AppState>, auth: AuthUser) -> Result<Response, ApiError> {
    let file = editor::download(&state, auth.uid()).await?;
    let disposition = format!("attachment; filename=\"{}\"", file.file_name);
    Ok(([(CONTENT_TYPE, file.mime), (CONTENT_DISPOSITION, disposition)], file.bytes).into_response())
}

/// `GET /api/tools`: edit tools and artistic style presets.
pub async fn tools() -> Json<ToolsResponse> {
    let tools = Tool::ALL
        .iter()
        .map(|&tool| ToolInfo { id: tool, name: tool.display_name() })
        .collect();
    Json(ToolsResponse { tools, styles: &STYLE_OPTIONS })
}

#[cfg(test)]
#[path = "editor_test.rs"]
mod tests;
