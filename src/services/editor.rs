//! Editor service: per-user edit sessions.
//!
//! ARCHITECTURE
//! ============
//! Each signed-in user owns one `EditorSession`: the history stack, the chat
//! transcript, the optional reference image and custom API key, and an
//! in-flight flag. Sessions live in `AppState::sessions` behind a Tokio mutex
//! and are opened lazily from the local store on first access.
//!
//! An edit runs in two locked phases around one unlocked model call:
//! validate + gate + mark in flight, then dispatch, then commit + record
//! usage + narrate. While the flag is set, edits, undo, redo and uploads are
//! refused with `Busy`, so history only ever changes from one place at a
//! time.
//!
//! Idle sessions are evicted by `spawn_session_sweeper`; everything the next
//! visit needs (current image, custom key) is already in the local store.
//!
//! ERROR HANDLING
//! ==============
//! Persistence failures after a history move are reported as a warning next
//! to the new state; they never roll history back. Quota recording failures
//! after a successful edit are logged and only drop the remaining-count hint.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use super::chat::{ChatLog, ChatMessage};
use super::dispatch::{self, DispatchError, EditCommand, Tool};
use super::history::HistoryStack;
use super::quota::{self, UserProfile};
use super::store::{CURRENT_IMAGE_KEY, CUSTOM_API_KEY_KEY, StoreError};
use crate::image::{DataUri, ImageError, ImageSource};
use crate::state::AppState;

const NO_STORED_IMAGE_MESSAGE: &str = "No uploaded image found. Starting with a placeholder. \
     You can upload a new image to start editing.";
const STORAGE_ACCESS_MESSAGE: &str = "Could not access local image storage. Using a placeholder.";

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("An edit is already in progress.")]
    Busy,
    #[error("{0}")]
    LimitReached(String),
    #[error("Please ensure an image is loaded in the canvas.")]
    MissingImage,
    #[error("Cannot download this image type.")]
    NotDownloadable,
    #[error("AI editing is not configured on this server.")]
    ModelNotConfigured,
    #[error("{0}")]
    Image(#[from] ImageError),
    #[error("{0}")]
    Dispatch(#[from] DispatchError),
    #[error("{0}")]
    Store(#[from] StoreError),
    #[error("edit task failed: {0}")]
    Task(String),
}

impl crate::error::ErrorCode for EditorError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Busy => "E_BUSY",
            Self::LimitReached(_) => "E_DAILY_LIMIT",
            Self::MissingImage => "E_MISSING_IMAGE",
            Self::NotDownloadable => "E_NOT_DOWNLOADABLE",
            Self::ModelNotConfigured => "E_MODEL_NOT_CONFIGURED",
            Self::Image(e) => e.error_code(),
            Self::Dispatch(e) => e.error_code(),
            Self::Store(e) => e.error_code(),
            Self::Task(_) => "E_INTERNAL",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Busy => true,
            Self::Dispatch(e) => e.retryable(),
            Self::Store(e) => e.retryable(),
            _ => false,
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

pub struct EditorSession {
    history: HistoryStack<ImageSource>,
    chat: ChatLog,
    reference: Option<DataUri>,
    custom_api_key: Option<String>,
    in_flight: bool,
    last_access: Instant,
}

pub type SharedSession = Arc<Mutex<EditorSession>>;
pub type SessionMap = HashMap<String, SharedSession>;

/// What the editor page needs to render the canvas and toolbar.
#[derive(Debug, Clone, Serialize)]
pub struct EditorSnapshot {
    pub image: ImageSource,
    pub history_index: usize,
    pub history_len: usize,
    pub can_undo: bool,
    pub can_redo: bool,
    pub busy: bool,
    pub has_reference: bool,
    pub has_custom_key: bool,
}

impl EditorSession {
    fn new(initial: ImageSource, custom_api_key: Option<String>) -> Self {
        Self {
            history: HistoryStack::new(initial),
            chat: ChatLog::new(),
            reference: None,
            custom_api_key,
            in_flight: false,
            last_access: Instant::now(),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> EditorSnapshot {
        EditorSnapshot {
            image: self.history.current().clone(),
            history_index: self.history.index(),
            history_len: self.history.len(),
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
            busy: self.in_flight,
            has_reference: self.reference.is_some(),
            has_custom_key: self.custom_api_key.is_some(),
        }
    }

    #[must_use]
    pub fn chat(&self) -> &ChatLog {
        &self.chat
    }

    fn touch(&mut self) {
        self.last_access = Instant::now();
    }

    fn ensure_idle(&self) -> Result<(), EditorError> {
        if self.in_flight {
            return Err(EditorError::Busy);
        }
        Ok(())
    }
}

/// Get the session for `user_id`, opening it from the local store if needed.
/// Storage problems fall back to the placeholder image.
pub async fn session_for(state: &AppState, user_id: &str) -> SharedSession {
    if let Some(session) = state.sessions.read().await.get(user_id) {
        return Arc::clone(session);
    }

    let opened = Arc::new(Mutex::new(open_session(state, user_id).await));
    let mut sessions = state.sessions.write().await;
    Arc::clone(sessions.entry(user_id.to_owned()).or_insert(opened))
}

/// Lock the session for `user_id` and mark it as recently used.
async fn lock_session(state: &AppState, user_id: &str) -> OwnedMutexGuard<EditorSession> {
    let mut guard = session_for(state, user_id).await.lock_owned().await;
    guard.touch();
    guard
}

/// Drop sessions idle for at least `max_idle`. Sessions that are locked, in
/// flight, or held by a running request are kept. Returns the number evicted.
pub async fn evict_idle_sessions(state: &AppState, max_idle: Duration) -> usize {
    let mut sessions = state.sessions.write().await;
    let before = sessions.len();
    sessions.retain(|user_id, session| {
        if Arc::strong_count(session) > 1 {
            return true;
        }
        let Ok(s) = session.try_lock() else {
            return true;
        };
        let keep = s.in_flight || s.last_access.elapsed() < max_idle;
        if !keep {
            info!(user = %user_id, "editor: evicted idle session");
        }
        keep
    });
    before - sessions.len()
}

/// Periodically evict idle sessions.
#[must_use]
pub fn spawn_session_sweeper(state: AppState, max_idle: Duration) -> JoinHandle<()> {
    let period = (max_idle / 4).max(Duration::from_secs(1));
    info!(idle_secs = max_idle.as_secs(), sweep_secs = period.as_secs(), "editor session sweeper configured");
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(period).await;
            let evicted = evict_idle_sessions(&state, max_idle).await;
            if evicted > 0 {
                let remaining = state.sessions.read().await.len();
                info!(evicted, remaining, "editor: idle sessions swept");
            }
        }
    })
}

async fn open_session(state: &AppState, user_id: &str) -> EditorSession {
    let (initial, notice) = match state.store.get(user_id, CURRENT_IMAGE_KEY).await {
        Ok(Some(raw)) => match ImageSource::parse(&raw) {
            Ok(image) => (image, None),
            Err(e) => {
                warn!(user = %user_id, error = %e, "editor: stored image unreadable");
                (ImageSource::placeholder(), Some(STORAGE_ACCESS_MESSAGE))
            }
        },
        Ok(None) => (ImageSource::placeholder(), Some(NO_STORED_IMAGE_MESSAGE)),
        Err(e) => {
            warn!(user = %user_id, error = %e, "editor: local store unavailable");
            (ImageSource::placeholder(), Some(STORAGE_ACCESS_MESSAGE))
        }
    };

    let custom_api_key = match state.store.get(user_id, CUSTOM_API_KEY_KEY).await {
        Ok(key) => key.filter(|k| !k.trim().is_empty()),
        Err(e) => {
            warn!(user = %user_id, error = %e, "editor: could not read custom API key");
            None
        }
    };

    info!(user = %user_id, placeholder = initial.is_placeholder(), custom_key = custom_api_key.is_some(), "editor: session opened");
    let mut session = EditorSession::new(initial, custom_api_key);
    if let Some(notice) = notice {
        session.chat.push_system(notice);
    }
    session
}

/// Republish `image` as the stored current image.
async fn persist_current(state: &AppState, user_id: &str, image: &ImageSource) -> Option<String> {
    match state
        .store
        .set(user_id, CURRENT_IMAGE_KEY, &image.to_string())
        .await
    {
        Ok(()) => None,
        Err(e) => {
            warn!(user = %user_id, error = %e, "editor: could not persist current image");
            Some(e.to_string())
        }
    }
}

// =============================================================================
// EDIT
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct EditRequest {
    pub tool: Tool,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub style: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EditOutcome {
    pub snapshot: EditorSnapshot,
    pub message: ChatMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_warning: Option<String>,
}

/// Run one edit for `profile`: gate, dispatch, commit, narrate.
///
/// # Errors
///
/// Returns [`EditorError::Busy`] while another edit is running,
/// [`EditorError::LimitReached`] when the daily quota is used up,
/// [`EditorError::MissingImage`] when the canvas holds no data image,
/// [`EditorError::Dispatch`] for validation or model failures, and
/// [`EditorError::Task`] when the edit task dies.
pub async fn submit(state: &AppState, profile: &UserProfile, request: EditRequest) -> Result<EditOutcome, EditorError> {
    let model = state.model.clone().ok_or(EditorError::ModelNotConfigured)?;
    let session = session_for(state, &profile.uid).await;

    let (command, image, api_key) = {
        let mut s = session.lock().await;
        s.touch();
        s.ensure_idle()?;

        let api_key = s.custom_api_key.clone();
        if api_key.is_none() && !model.has_service_key() {
            return Err(EditorError::ModelNotConfigured);
        }
        if api_key.is_none() {
            let today = quota::today_utc();
            if let Err(e) = state.quota.ensure_user(profile, &today).await {
                warn!(user = %profile.uid, error = %e, "quota: could not ensure user record");
            }
            let check = quota::check_usage(state.quota.as_ref(), &profile.uid, &today).await;
            if !check.can_generate {
                info!(user = %profile.uid, "editor: daily limit reached");
                let message = check
                    .message
                    .unwrap_or_else(|| "You've reached your daily limit. Come back tomorrow!".to_owned());
                return Err(EditorError::LimitReached(message));
            }
        }

        let image = s
            .history
            .current()
            .as_data()
            .cloned()
            .ok_or(EditorError::MissingImage)?;
        let command = EditCommand::prepare(request.tool, &request.prompt, request.style.as_deref(), s.reference.as_ref())?;

        s.chat.push_user(command.chat_line.clone(), command.tool);
        s.in_flight = true;
        (command, image, api_key)
    };

    let key_label = api_key
        .as_deref()
        .map_or_else(|| "service".to_owned(), super::key_fingerprint);
    info!(user = %profile.uid, tool = %command.tool, key = %key_label, "editor: edit started");

    // The call and the second phase run detached so a dropped request cannot
    // leave the session stuck in flight.
    let task_state = state.clone();
    let task_session = Arc::clone(&session);
    let uid = profile.uid.clone();
    let task = tokio::spawn(async move {
        let result = dispatch::dispatch(model.as_ref(), &command, &image, api_key.as_deref()).await;
        finish_edit(&task_state, &uid, &task_session, command.tool, api_key.is_some(), result).await
    });

    match task.await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(user = %profile.uid, error = %e, "editor: edit task aborted");
            let mut s = session.lock().await;
            s.in_flight = false;
            s.chat.push_system("Error: The edit could not be completed.");
            Err(EditorError::Task(e.to_string()))
        }
    }
}

async fn finish_edit(
    state: &AppState,
    user_id: &str,
    session: &SharedSession,
    tool: Tool,
    custom_key: bool,
    result: Result<DataUri, DispatchError>,
) -> Result<EditOutcome, EditorError> {
    let mut s = session.lock().await;
    s.in_flight = false;
    s.touch();

    let new_image = match result {
        Ok(image) => ImageSource::from(image),
        Err(e) => {
            warn!(user = %user_id, %tool, error = %e, "editor: edit failed");
            s.chat.push_system(format!("Error: {e}"));
            return Err(e.into());
        }
    };

    s.history.commit(new_image.clone());
    let storage_warning = persist_current(state, user_id, &new_image).await;

    let remaining_hint = if custom_key { String::new() } else { record_and_describe_usage(state, user_id).await };
    let text = format!("{} applied successfully!{remaining_hint}", tool.display_name());
    let message = s.chat.push_ai(text, Some(new_image)).clone();

    info!(user = %user_id, %tool, history_len = s.history.len(), "editor: edit applied");
    Ok(EditOutcome { snapshot: s.snapshot(), message, storage_warning })
}

async fn record_and_describe_usage(state: &AppState, user_id: &str) -> String {
    let today = quota::today_utc();
    if let Err(e) = state.quota.record_usage(user_id, &today).await {
        warn!(user = %user_id, error = %e, "quota: could not record usage");
        return String::new();
    }
    let check = quota::check_usage(state.quota.as_ref(), user_id, &today).await;
    if check.remaining > 0 {
        format!(" {} generations remaining today.", check.remaining)
    } else {
        " No more generations today.".to_owned()
    }
}

// =============================================================================
// HISTORY
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct HistoryMove {
    pub snapshot: EditorSnapshot,
    /// `false` when the move was a no-op at either end of the history.
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_warning: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Undo,
    Redo,
}

/// Step the history one state back or forward and republish it.
///
/// # Errors
///
/// Returns [`EditorError::Busy`] while an edit is running.
pub async fn step_history(state: &AppState, user_id: &str, direction: Direction) -> Result<HistoryMove, EditorError> {
    let mut s = lock_session(state, user_id).await;
    s.ensure_idle()?;

    let moved = match direction {
        Direction::Undo => s.history.undo().cloned(),
        Direction::Redo => s.history.redo().cloned(),
    };
    let Some(image) = moved else {
        return Ok(HistoryMove { snapshot: s.snapshot(), changed: false, storage_warning: None });
    };

    let storage_warning = persist_current(state, user_id, &image).await;
    info!(user = %user_id, ?direction, index = s.history.index(), "editor: history moved");
    Ok(HistoryMove { snapshot: s.snapshot(), changed: true, storage_warning })
}

// =============================================================================
// IMAGES + SETTINGS
// =============================================================================

/// Replace the canvas with a freshly uploaded image and restart history.
///
/// # Errors
///
/// Returns [`EditorError::Image`] for malformed or unsupported uploads and
/// [`EditorError::Store`] when the image cannot be saved.
pub async fn upload(state: &AppState, user_id: &str, raw: &str) -> Result<EditorSnapshot, EditorError> {
    let image = DataUri::parse(raw)?;
    image.validate_upload()?;

    let mut s = lock_session(state, user_id).await;
    s.ensure_idle()?;

    let source = ImageSource::from(image);
    state
        .store
        .set(user_id, CURRENT_IMAGE_KEY, &source.to_string())
        .await?;
    s.history.reset(source);
    info!(user = %user_id, "editor: image uploaded");
    Ok(s.snapshot())
}

/// Attach a reference image for the object tool.
///
/// # Errors
///
/// Returns [`EditorError::Image`] when the reference is not a usable image.
pub async fn set_reference(state: &AppState, user_id: &str, raw: &str) -> Result<EditorSnapshot, EditorError> {
    let image = DataUri::parse(raw)?;
    image.validate_reference()?;

    let mut s = lock_session(state, user_id).await;
    s.reference = Some(image);
    Ok(s.snapshot())
}

pub async fn clear_reference(state: &AppState, user_id: &str) -> EditorSnapshot {
    let mut s = lock_session(state, user_id).await;
    s.reference = None;
    s.snapshot()
}

/// Store (or, when blank, clear) the user's own model API key.
///
/// # Errors
///
/// Returns [`EditorError::Store`] when the key cannot be saved.
pub async fn set_api_key(state: &AppState, user_id: &str, key: &str) -> Result<EditorSnapshot, EditorError> {
    let key = key.trim();
    let mut s = lock_session(state, user_id).await;

    if key.is_empty() {
        state.store.remove(user_id, CUSTOM_API_KEY_KEY).await?;
        s.custom_api_key = None;
        info!(user = %user_id, "editor: custom API key cleared");
    } else {
        state.store.set(user_id, CUSTOM_API_KEY_KEY, key).await?;
        s.custom_api_key = Some(key.to_owned());
        info!(user = %user_id, key = %super::key_fingerprint(key), "editor: custom API key saved");
    }
    Ok(s.snapshot())
}

pub async fn snapshot(state: &AppState, user_id: &str) -> EditorSnapshot {
    let s = lock_session(state, user_id).await;
    s.snapshot()
}

pub async fn chat_messages(state: &AppState, user_id: &str, after: Option<Uuid>) -> Vec<ChatMessage> {
    let s = lock_session(state, user_id).await;
    match after {
        Some(id) => s.chat().since(id).to_vec(),
        None => s.chat().messages().to_vec(),
    }
}

/// Decoded bytes of the current image, ready to download.
#[derive(Debug, Clone)]
pub struct Download {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub file_name: String,
}

/// Decode the current image for download.
///
/// # Errors
///
/// Returns [`EditorError::NotDownloadable`] when the canvas shows a URL image.
pub async fn download(state: &AppState, user_id: &str) -> Result<Download, EditorError> {
    let s = lock_session(state, user_id).await;
    let image = s
        .history
        .current()
        .as_data()
        .ok_or(EditorError::NotDownloadable)?;
    Ok(Download { bytes: image.bytes()?, mime: image.mime().to_owned(), file_name: image.download_name() })
}

#[cfg(test)]
#[path = "editor_test.rs"]
mod tests;
