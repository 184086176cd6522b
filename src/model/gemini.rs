//! Gemini `generateContent` client.
//!
//! Thin HTTP wrapper for `/models/{model}:generateContent` with both text and
//! image response modalities. Pure request building in `build_body` and pure
//! parsing in `parse_response` for testability.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::config::ModelTimeouts;
use super::types::{GenerateResponse, ModelError, Part, SafetySetting};
use crate::image::DataUri;

const API_KEY_HEADER: &str = "x-goog-api-key";
const RESPONSE_MODALITIES: [&str; 2] = ["TEXT", "IMAGE"];

// =============================================================================
// CLIENT
// =============================================================================

pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
}

impl GeminiClient {
    pub fn new(base_url: String, timeouts: ModelTimeouts) -> Result<Self, ModelError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| ModelError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url })
    }

    pub async fn generate(
        &self,
        model: &str,
        api_key: &str,
        parts: &[Part],
        safety: &[SafetySetting],
    ) -> Result<GenerateResponse, ModelError> {
        let body = build_body(parts, safety);
        let url = format!("{}/models/{model}:generateContent", self.base_url);

        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::ApiRequest(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ModelError::ApiRequest(e.to_string()))?;

        if status != 200 {
            return Err(ModelError::ApiResponse { status, body: text });
        }

        parse_response(&text, model)
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest<'a> {
    contents: [ApiContent<'a>; 1],
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    safety_settings: Vec<ApiSafetySetting>,
}

#[derive(Serialize)]
struct ApiContent<'a> {
    role: &'static str,
    parts: Vec<ApiPart<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum ApiPart<'a> {
    Text { text: &'a str },
    Inline { inline_data: ApiInlineData<'a> },
}

#[derive(Serialize)]
struct ApiInlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: [&'static str; 2],
}

#[derive(Serialize)]
struct ApiSafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default, alias = "inline_data")]
    inline_data: Option<ResponseInlineData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseInlineData {
    #[serde(alias = "mime_type")]
    mime_type: String,
    data: String,
}

// =============================================================================
// BUILDING + PARSING
// =============================================================================

fn build_body<'a>(parts: &'a [Part], safety: &[SafetySetting]) -> ApiRequest<'a> {
    let parts = parts
        .iter()
        .map(|part| match part {
            Part::Text { text } => ApiPart::Text { text },
            Part::Media { mime, data } => ApiPart::Inline { inline_data: ApiInlineData { mime_type: mime, data } },
        })
        .collect();
    let safety_settings = safety
        .iter()
        .map(|s| ApiSafetySetting { category: s.category.as_str(), threshold: s.threshold.as_str() })
        .collect();

    ApiRequest {
        contents: [ApiContent { role: "user", parts }],
        generation_config: GenerationConfig { response_modalities: RESPONSE_MODALITIES },
        safety_settings,
    }
}

fn parse_response(json: &str, requested_model: &str) -> Result<GenerateResponse, ModelError> {
    let api: ApiResponse = serde_json::from_str(json).map_err(|e| ModelError::ApiParse(e.to_string()))?;

    let parts = api
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts)
        .unwrap_or_default();

    let mut image = None;
    let mut texts = Vec::new();
    for part in parts {
        if let Some(text) = part.text.filter(|t| !t.trim().is_empty()) {
            texts.push(text);
        }
        if image.is_none() {
            if let Some(inline) = part.inline_data {
                let uri = DataUri::from_base64(&inline.mime_type, &inline.data)
                    .map_err(|e| ModelError::ApiParse(format!("inline image: {e}")))?;
                image = Some(uri);
            }
        }
    }

    Ok(GenerateResponse {
        image,
        text: if texts.is_empty() { None } else { Some(texts.join("\n")) },
        model: api
            .model_version
            .unwrap_or_else(|| requested_model.to_owned()),
    })
}

#[cfg(test)]
#[path = "gemini_test.rs"]
mod tests;
