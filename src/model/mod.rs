//! Model: hosted multimodal image-generation adapter.
//!
//! DESIGN
//! ======
//! Uses environment variables instead of config files. `ModelClient` owns the
//! Gemini HTTP client plus the service-wide key, and resolves which key each
//! call uses: a caller-supplied key always wins over the configured one.

pub mod config;
pub mod gemini;
pub mod types;

use config::ModelConfig;
pub use types::ImageModel;
use types::{GenerateRequest, GenerateResponse, ModelError};

// =============================================================================
// CLIENT
// =============================================================================

/// Concrete image-model client backed by the Gemini API.
///
/// Configured from environment variables by [`ModelClient::from_env`].
pub struct ModelClient {
    inner: gemini::GeminiClient,
    model: String,
    api_key: Option<String>,
}

impl ModelClient {
    /// Build a model client from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the named API key is missing or the HTTP client fails.
    pub fn from_env() -> Result<Self, ModelError> {
        let config = ModelConfig::from_env()?;
        Self::from_config(config)
    }

    /// Build a model client from a parsed typed config.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn from_config(config: ModelConfig) -> Result<Self, ModelError> {
        let inner = gemini::GeminiClient::new(config.base_url, config.timeouts)?;
        Ok(Self { inner, model: config.model, api_key: config.api_key })
    }

    /// Return the configured model name (e.g. `"gemini-2.0-flash-exp"`).
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn resolve_key<'a>(&'a self, request: &'a GenerateRequest) -> Result<&'a str, ModelError> {
        request
            .api_key
            .as_deref()
            .or(self.api_key.as_deref())
            .ok_or_else(|| ModelError::MissingApiKey { var: "MODEL_API_KEY_ENV".into() })
    }
}

#[async_trait::async_trait]
impl ImageModel for ModelClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, ModelError> {
        let key = self.resolve_key(request)?;
        self.inner
            .generate(&self.model, key, &request.parts, &request.safety)
            .await
    }

    fn has_service_key(&self) -> bool {
        self.api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::ModelTimeouts;

    fn client(api_key: Option<&str>) -> ModelClient {
        ModelClient::from_config(ModelConfig {
            api_key: api_key.map(str::to_owned),
            model: "gemini-test".into(),
            base_url: "http://127.0.0.1:9".into(),
            timeouts: ModelTimeouts::default(),
        })
        .unwrap()
    }

    #[test]
    fn caller_key_overrides_service_key() {
        let client = client(Some("service"));
        let request = GenerateRequest { api_key: Some("mine".into()), ..GenerateRequest::default() };
        assert_eq!(client.resolve_key(&request).unwrap(), "mine");
    }

    #[test]
    fn service_key_used_when_caller_has_none() {
        let client = client(Some("service"));
        assert!(client.has_service_key());
        assert_eq!(client.resolve_key(&GenerateRequest::default()).unwrap(), "service");
    }

    #[tokio::test]
    async fn generate_without_any_key_fails_before_network() {
        let client = client(None);
        assert_eq!(client.model(), "gemini-test");
        let err = client
            .generate(&GenerateRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::MissingApiKey { .. }));
    }
}
