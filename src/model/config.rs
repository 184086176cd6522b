//! Image-model configuration parsed from environment variables.

use super::types::ModelError;

pub const DEFAULT_MODEL_NAME: &str = "gemini-2.0-flash-exp";
pub const DEFAULT_MODEL_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MODEL_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for ModelTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_MODEL_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_MODEL_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    /// Service-wide key. `None` means only callers with their own key can edit.
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeouts: ModelTimeouts,
}

impl ModelConfig {
    /// Build typed model config from environment variables.
    ///
    /// Optional:
    /// - `MODEL_API_KEY_ENV`: names the env var containing the key (e.g. `GEMINI_API_KEY`)
    /// - `MODEL_NAME`: default `gemini-2.0-flash-exp`
    /// - `MODEL_BASE_URL`: default Generative Language API base URL
    /// - `MODEL_REQUEST_TIMEOUT_SECS`: default 120
    /// - `MODEL_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// When `MODEL_API_KEY_ENV` names a variable that is not set, the config
    /// is still built without a service key so users with their own key can
    /// edit.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ConfigParse`] for a malformed base URL.
    pub fn from_env() -> Result<Self, ModelError> {
        let api_key = std::env::var("MODEL_API_KEY_ENV")
            .ok()
            .and_then(|key_var| service_key(&key_var));

        let model = std::env::var("MODEL_NAME").unwrap_or_else(|_| DEFAULT_MODEL_NAME.to_string());
        let base_url = parse_base_url(std::env::var("MODEL_BASE_URL").ok().as_deref())?;
        let timeouts = ModelTimeouts {
            request_secs: env_parse_u64("MODEL_REQUEST_TIMEOUT_SECS", DEFAULT_MODEL_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse_u64("MODEL_CONNECT_TIMEOUT_SECS", DEFAULT_MODEL_CONNECT_TIMEOUT_SECS),
        };

        Ok(Self { api_key, model, base_url, timeouts })
    }
}

fn service_key(key_var: &str) -> Option<String> {
    match std::env::var(key_var) {
        Ok(key) if !key.trim().is_empty() => Some(key.trim().to_owned()),
        _ => {
            tracing::warn!(var = %key_var, "model API key env var not set; only user-supplied keys will work");
            None
        }
    }
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_base_url(raw: Option<&str>) -> Result<String, ModelError> {
    let url = raw.unwrap_or(DEFAULT_MODEL_BASE_URL).trim().trim_end_matches('/');
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(ModelError::ConfigParse(format!("MODEL_BASE_URL must be an http(s) URL, got '{url}'")));
    }
    Ok(url.to_string())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
