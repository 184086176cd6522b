//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the quota store, the per-user local store, the optional image
//! model, and the map of live editor sessions. Stores and the model sit
//! behind trait objects so tests swap in in-memory versions.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::model::ImageModel;
use crate::services::editor::SessionMap;
use crate::services::quota::QuotaStore;
use crate::services::store::LocalStore;

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state. Clone is cheap (all fields are Arc-wrapped).
#[derive(Clone)]
pub struct AppState {
    pub quota: Arc<dyn QuotaStore>,
    pub store: Arc<dyn LocalStore>,
    /// Image model. `None` when model configuration failed at startup.
    pub model: Option<Arc<dyn ImageModel>>,
    pub sessions: Arc<RwLock<SessionMap>>,
}

impl AppState {
    #[must_use]
    pub fn new(quota: Arc<dyn QuotaStore>, store: Arc<dyn LocalStore>, model: Option<Arc<dyn ImageModel>>) -> Self {
        Self { quota, store, model, sessions: Arc::new(RwLock::new(HashMap::new())) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use tokio::sync::Notify;

    use super::*;
    use crate::image::DataUri;
    use crate::model::types::{GenerateRequest, GenerateResponse, ModelError};
    use crate::services::quota::{MemoryQuotaStore, UserProfile};
    use crate::services::store::MemoryStore;

    pub const PNG_DATA_URI: &str = "data:image/png;base64,iVBORw0KGgo=";
    pub const EDITED_DATA_URI: &str = "data:image/png;base64,AAECAwQF";

    #[must_use]
    pub fn png() -> DataUri {
        DataUri::parse(PNG_DATA_URI).expect("valid png data uri")
    }

    #[must_use]
    pub fn edited_png() -> DataUri {
        DataUri::parse(EDITED_DATA_URI).expect("valid edited data uri")
    }

    #[must_use]
    pub fn reference_jpeg() -> DataUri {
        DataUri::parse("data:image/jpeg;base64,/9j/4AAQ").expect("valid jpeg data uri")
    }

    #[must_use]
    pub fn profile(uid: &str) -> UserProfile {
        UserProfile {
            uid: uid.to_owned(),
            email: format!("{uid}@example.test"),
            display_name: uid.to_owned(),
            photo_url: None,
        }
    }

    /// Hand-written `ImageModel` that replays queued responses (or returns
    /// `edited_png()` once the queue is empty) and records every request.
    pub struct MockModel {
        responses: Mutex<VecDeque<Result<GenerateResponse, ModelError>>>,
        requests: Mutex<Vec<GenerateRequest>>,
        service_key: bool,
        gate: Option<Arc<Notify>>,
        started: Arc<Notify>,
        panics: bool,
    }

    impl MockModel {
        #[must_use]
        pub fn new() -> Self {
            Self::with_responses(Vec::new())
        }

        #[must_use]
        pub fn with_responses(responses: Vec<Result<GenerateResponse, ModelError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
                service_key: true,
                gate: None,
                started: Arc::new(Notify::new()),
                panics: false,
            }
        }

        /// A model with no service key: only callers with their own key can edit.
        #[must_use]
        pub fn without_service_key() -> Self {
            Self { service_key: false, ..Self::new() }
        }

        /// A model that blocks every call until the returned gate is notified.
        #[must_use]
        pub fn gated() -> (Self, Arc<Notify>) {
            let gate = Arc::new(Notify::new());
            (Self { gate: Some(Arc::clone(&gate)), ..Self::new() }, gate)
        }

        /// A model whose calls panic after recording the request.
        #[must_use]
        pub fn panicking() -> Self {
            Self { panics: true, ..Self::new() }
        }

        /// Notified when a call reaches the model.
        #[must_use]
        pub fn started(&self) -> Arc<Notify> {
            Arc::clone(&self.started)
        }

        #[must_use]
        pub fn calls(&self) -> usize {
            self.requests.lock().expect("requests lock").len()
        }

        #[must_use]
        pub fn last_request(&self) -> Option<GenerateRequest> {
            self.requests.lock().expect("requests lock").last().cloned()
        }
    }

    impl Default for MockModel {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait::async_trait]
    impl ImageModel for MockModel {
        async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, ModelError> {
            self.requests
                .lock()
                .expect("requests lock")
                .push(request.clone());
            self.started.notify_one();
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            assert!(!self.panics, "mock model panicked");
            let next = self.responses.lock().expect("responses lock").pop_front();
            next.unwrap_or_else(|| {
                Ok(GenerateResponse { image: Some(edited_png()), text: None, model: "mock-model".into() })
            })
        }

        fn has_service_key(&self) -> bool {
            self.service_key
        }
    }

    /// `AppState` with in-memory stores and a default `MockModel`.
    #[must_use]
    pub fn test_app_state() -> AppState {
        test_app_state_with_model(Arc::new(MockModel::new()))
    }

    #[must_use]
    pub fn test_app_state_with_model(model: Arc<dyn ImageModel>) -> AppState {
        AppState::new(Arc::new(MemoryQuotaStore::new()), Arc::new(MemoryStore::default()), Some(model))
    }

    /// `AppState` without any image model configured.
    #[must_use]
    pub fn test_app_state_without_model() -> AppState {
        AppState::new(Arc::new(MemoryQuotaStore::new()), Arc::new(MemoryStore::default()), None)
    }
}
