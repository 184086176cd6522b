//! Model types: provider-neutral request parts, responses, and errors.

use crate::image::DataUri;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by image-model client operations.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    ConfigParse(String),

    /// The required API key environment variable is not set.
    #[error("missing API key: env var {var} not set")]
    MissingApiKey { var: String },

    /// The HTTP request to the model provider failed.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// The model provider returned a non-success HTTP status.
    #[error("API response error: status {status}")]
    ApiResponse { status: u16, body: String },

    /// The model provider response body could not be deserialized.
    #[error("API response parse failed: {0}")]
    ApiParse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl crate::error::ErrorCode for ModelError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigParse(_) => "E_CONFIG_PARSE",
            Self::MissingApiKey { .. } => "E_MISSING_API_KEY",
            Self::ApiRequest(_) => "E_API_REQUEST",
            Self::ApiResponse { .. } => "E_API_RESPONSE",
            Self::ApiParse(_) => "E_API_PARSE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::ApiRequest(_) | Self::ApiResponse { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// REQUEST PARTS
// =============================================================================

/// One ordered piece of a generation prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    /// An instruction segment.
    Text { text: String },
    /// An inline image, sent as mime + base64 payload.
    Media { mime: String, data: String },
}

impl Part {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    #[must_use]
    pub fn media(uri: &DataUri) -> Self {
        Self::Media { mime: uri.mime().to_owned(), data: uri.base64().to_owned() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarmCategory {
    HateSpeech,
    DangerousContent,
    Harassment,
    SexuallyExplicit,
}

impl HarmCategory {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HateSpeech => "HARM_CATEGORY_HATE_SPEECH",
            Self::DangerousContent => "HARM_CATEGORY_DANGEROUS_CONTENT",
            Self::Harassment => "HARM_CATEGORY_HARASSMENT",
            Self::SexuallyExplicit => "HARM_CATEGORY_SEXUALLY_EXPLICIT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockThreshold {
    None,
    OnlyHigh,
    MediumAndAbove,
    LowAndAbove,
}

impl BlockThreshold {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "BLOCK_NONE",
            Self::OnlyHigh => "BLOCK_ONLY_HIGH",
            Self::MediumAndAbove => "BLOCK_MEDIUM_AND_ABOVE",
            Self::LowAndAbove => "BLOCK_LOW_AND_ABOVE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafetySetting {
    pub category: HarmCategory,
    pub threshold: BlockThreshold,
}

/// A single image-generation call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GenerateRequest {
    /// Prompt parts, in the order the model should see them.
    pub parts: Vec<Part>,
    /// Optional safety overrides; empty means provider defaults.
    pub safety: Vec<SafetySetting>,
    /// Caller-supplied key that overrides the configured one for this call.
    pub api_key: Option<String>,
}

impl GenerateRequest {
    /// Number of inline images in the prompt.
    #[must_use]
    pub fn media_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|p| matches!(p, Part::Media { .. }))
            .count()
    }
}

/// Result of a generation call. `image` is `None` when the model answered
/// with text only.
#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub image: Option<DataUri>,
    pub text: Option<String>,
    pub model: String,
}

// =============================================================================
// IMAGE MODEL TRAIT
// =============================================================================

/// Provider-neutral async trait for image generation. Enables mocking in tests.
#[async_trait::async_trait]
pub trait ImageModel: Send + Sync {
    /// Send one generation request to the provider.
    ///
    /// # Errors
    ///
    /// Returns a [`ModelError`] if the request fails, the response is
    /// malformed, or no API key is available.
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, ModelError>;

    /// Whether requests without a caller key can be served.
    fn has_service_key(&self) -> bool {
        true
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
