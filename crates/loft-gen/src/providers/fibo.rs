//! FIBO image synthesis provider (Bria)
//!
//! Calls the synchronous v2 generate endpoint. Generation POSTs are not
//! idempotent and are never retried.

use crate::config::LoftConfig;
use crate::provider::{ImageGenRequest, ImageGenResponse, ImageGenerator};
use loft_core::{LoftError, Result};
use serde_json::Value;
use std::time::Duration;

const DEFAULT_FIBO_URL: &str = "https://engine.prod.bria-api.com/v2/image/generate";
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// FIBO provider for image generation
pub struct FiboProvider {
    api_key: String,
    api_url: String,
}

impl FiboProvider {
    /// Create a new FiboProvider from config
    pub fn from_config(config: &LoftConfig) -> Result<Self> {
        let api_key = config
            .api_key("fibo")
            .ok_or_else(|| {
                LoftError::Config(
                    "FIBO API key not configured. Set LOFT_FIBO_API_KEY or add to .loft/config.toml"
                        .to_string(),
                )
            })?
            .to_string();

        let api_url = config.api_url("fibo").unwrap_or(DEFAULT_FIBO_URL).to_string();

        Ok(Self { api_key, api_url })
    }

    fn post_json(&self, payload: &Value) -> Result<Value> {
        let agent = build_agent();
        let response = agent
            .post(&self.api_url)
            .header("api_token", &self.api_key)
            .header("Content-Type", "application/json")
            .send_json(payload)
            .map_err(|e| LoftError::Upstream {
                status: 0,
                body: format!("FIBO API request failed: {}", e),
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
            .map_err(|e| LoftError::Generation(format!("Failed to parse FIBO response: {}", e)))
    }
}

impl ImageGenerator for FiboProvider {
    fn name(&self) -> &str {
        "fibo"
    }

    fn generate(&self, request: &ImageGenRequest) -> Result<ImageGenResponse> {
        let payload = build_payload(request)?;
        let response = self.post_json(&payload)?;
        parse_generate_response(&response)
    }
}

/// Build the FIBO request payload. A structured prompt is passed through
/// as a string if it already is one, otherwise serialized.
fn build_payload(request: &ImageGenRequest) -> Result<Value> {
    let mut payload = serde_json::json!({ "sync": true });

    if let Some(sp) = &request.structured_prompt {
        let as_string = match sp {
            Value::String(s) => s.clone(),
            other => serde_json::to_string(other)?,
        };
        payload["structured_prompt"] = Value::String(as_string);
    }
    if let Some(prompt) = &request.prompt {
        payload["prompt"] = serde_json::json!(prompt);
    }
    if let Some(seed) = request.seed {
        payload["seed"] = serde_json::json!(seed);
    }
    if !request.reference_images.is_empty() {
        payload["images"] = serde_json::json!(request.reference_images);
    }
    if let Some(aspect) = &request.aspect_ratio {
        payload["aspect_ratio"] = serde_json::json!(aspect);
    }

    Ok(payload)
}

/// Pull the generated image URL, echoed structured prompt, and seed out
/// of a FIBO response.
fn parse_generate_response(response: &Value) -> Result<ImageGenResponse> {
    let result = response.get("result").ok_or_else(|| {
        LoftError::Generation(format!(
            "Unexpected FIBO response: {}",
            serde_json::to_string_pretty(response).unwrap_or_default()
        ))
    })?;

    let image_url = result
        .get("image_url")
        .and_then(|u| u.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| LoftError::Generation("No image URL in FIBO response".to_string()))?;

    Ok(ImageGenResponse {
        image_url,
        structured_prompt: result.get("structured_prompt").cloned(),
        seed: result.get("seed").and_then(|s| s.as_u64()),
    })
}

fn build_agent() -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
        .http_status_as_error(false)
        .build();
    config.into()
}
