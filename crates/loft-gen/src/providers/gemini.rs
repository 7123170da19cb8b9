//! Gemini vision-language analysis provider
//!
//! Drives `generateContent` with a text part plus an optional image part,
//! either inline base64 or a file URI the model can read directly.

use crate::config::LoftConfig;
use crate::provider::{AnalyzeImage, AnalyzeRequest, VisionAnalyzer};
use loft_core::{LoftError, Result};
use serde_json::Value;
use std::time::Duration;

const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_MIME_TYPE: &str = "image/jpeg";
const MAX_OUTPUT_TOKENS: u32 = 8192;
const MAX_OUTPUT_TOKENS_THINKING: u32 = 32768;

/// Gemini provider for vision-language analysis
pub struct GeminiProvider {
    api_key: String,
    api_url: String,
}

impl GeminiProvider {
    /// Create a new GeminiProvider from config
    pub fn from_config(config: &LoftConfig) -> Result<Self> {
        let api_key = config
            .api_key("gemini")
            .ok_or_else(|| {
                LoftError::Config(
                    "Gemini API key not configured. Set LOFT_GEMINI_API_KEY or add to .loft/config.toml"
                        .to_string(),
                )
            })?
            .to_string();

        let api_url = config
            .api_url("gemini")
            .unwrap_or(DEFAULT_GEMINI_URL)
            .to_string();

        Ok(Self { api_key, api_url })
    }

    fn post_json(&self, model: &str, payload: &Value) -> Result<Value> {
        let url = format!("{}/{}:generateContent?key={}", self.api_url, model, self.api_key);

        let agent = build_agent();
        let response = agent
            .post(&url)
            .header("Content-Type", "application/json")
            .send_json(payload)
            .map_err(|e| LoftError::Upstream {
                status: 0,
                body: format!("Gemini API request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let mut reader = response.into_body().into_reader();
            let mut body = String::new();
            std::io::Read::read_to_string(&mut reader, &mut body).ok();
            return Err(LoftError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let mut response = response;
        response
            .body_mut()
            .read_json()
            .map_err(|e| LoftError::Generation(format!("Failed to parse Gemini response: {}", e)))
    }
}

impl VisionAnalyzer for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn analyze(&self, request: &AnalyzeRequest) -> Result<String> {
        let model = request.model.as_deref().unwrap_or(DEFAULT_MODEL);
        let payload = build_payload(request);
        let response = self.post_json(model, &payload)?;

        extract_text(&response)
            .ok_or_else(|| LoftError::Generation("Gemini returned no response text".to_string()))
    }
}

fn build_payload(request: &AnalyzeRequest) -> Value {
    let mut parts = vec![serde_json::json!({ "text": request.text })];

    match &request.image {
        Some(AnalyzeImage::Inline { data, mime_type }) => {
            let mime = if mime_type.is_empty() {
                DEFAULT_MIME_TYPE
            } else {
                mime_type.as_str()
            };
            parts.push(serde_json::json!({
                "inline_data": { "mime_type": mime, "data": data }
            }));
        }
        Some(AnalyzeImage::FileUri { uri }) => {
            parts.push(serde_json::json!({
                "file_data": { "mime_type": DEFAULT_MIME_TYPE, "file_uri": uri }
            }));
        }
        None => {}
    }

    let mut generation_config = match request.thinking {
        Some(level) => serde_json::json!({
            "temperature": 0.1,
            "maxOutputTokens": MAX_OUTPUT_TOKENS_THINKING,
            "thinkingConfig": { "thinkingLevel": level.as_str() }
        }),
        None => serde_json::json!({
            "temperature": 0,
            "maxOutputTokens": MAX_OUTPUT_TOKENS
        }),
    };
    if request.json {
        generation_config["responseMimeType"] = serde_json::json!("application/json");
    }

    serde_json::json!({
        "contents": [{ "parts": parts }],
        "generationConfig": generation_config
    })
}

/// First candidate's first text part; empty text counts as no response.
fn extract_text(response: &Value) -> Option<String> {
    response
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn build_agent() -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(120)))
        .http_status_as_error(false)
        .build();
    config.into()
}
