//! Trellis 3D reconstruction provider (fal.ai)
//!
//! One synchronous call: image URL in, arbitrarily nested payload out.
//! The mesh URL is located by the caller (well-known field, then search).

use crate::config::LoftConfig;
use crate::provider::MeshReconstructor;
use loft_core::{LoftError, Result};
use serde_json::Value;
use std::time::Duration;

const DEFAULT_TRELLIS_URL: &str = "https://fal.run/fal-ai/trellis";
const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Trellis provider for image-to-3D reconstruction
pub struct TrellisProvider {
    api_key: String,
    api_url: String,
}

impl TrellisProvider {
    /// Create a new TrellisProvider from config
    pub fn from_config(config: &LoftConfig) -> Result<Self> {
        let api_key = config
            .api_key("trellis")
            .ok_or_else(|| {
                LoftError::Config(
                    "Trellis API key not configured. Set LOFT_TRELLIS_API_KEY or add to .loft/config.toml"
                        .to_string(),
                )
            })?
            .to_string();

        let api_url = config
            .api_url("trellis")
            .unwrap_or(DEFAULT_TRELLIS_URL)
            .to_string();

        Ok(Self { api_key, api_url })
    }
}

impl MeshReconstructor for TrellisProvider {
    fn name(&self) -> &str {
        "trellis"
    }

    fn reconstruct(&self, image_url: &str) -> Result<Value> {
        let payload = serde_json::json!({ "image_url": image_url });

        let agent = build_agent();
        let response = agent
            .post(&self.api_url)
            .header("Authorization", &format!("Key {}", self.api_key))
            .header("Content-Type", "application/json")
            .send_json(&payload)
            .map_err(|e| LoftError::Upstream {
                status: 0,
                body: format!("Trellis API request failed: {}", e),
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
            .map_err(|e| LoftError::Generation(format!("Failed to parse Trellis response: {}", e)))
    }
}

fn build_agent() -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
        .http_status_as_error(false)
        .build();
    config.into()
}
