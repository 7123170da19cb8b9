//! Provider adapter traits and call contracts
//!
//! One narrow capability per external generator kind, each behind a trait
//! so pipelines can run against fakes.

use loft_core::Result;
use serde_json::Value;

/// A request to the image synthesis provider
#[derive(Debug, Clone, Default)]
pub struct ImageGenRequest {
    /// Structured prompt, either a JSON value or a pre-serialized string
    pub structured_prompt: Option<Value>,
    /// Free-text prompt
    pub prompt: Option<String>,
    pub seed: Option<u64>,
    /// Reference images: inline base64 payloads or public URLs, passed
    /// through to the provider as-is
    pub reference_images: Vec<String>,
    pub aspect_ratio: Option<String>,
}

/// A successful image synthesis result
#[derive(Debug, Clone)]
pub struct ImageGenResponse {
    /// Provider-hosted URL of the generated image; not assumed durable
    pub image_url: String,
    /// Echoed structured prompt; may arrive as a JSON string or a
    /// structured value depending on the provider
    pub structured_prompt: Option<Value>,
    pub seed: Option<u64>,
}

/// Synchronous image synthesis
pub trait ImageGenerator: Send + Sync {
    fn name(&self) -> &str;
    fn generate(&self, request: &ImageGenRequest) -> Result<ImageGenResponse>;
}

/// Image payload attached to an analysis request
#[derive(Debug, Clone)]
pub enum AnalyzeImage {
    /// Inline base64 bytes with their mime type
    Inline { data: String, mime_type: String },
    /// An already-stored object the provider can read directly by URI
    FileUri { uri: String },
}

/// Reasoning depth hint for detection workloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThinkingLevel {
    Low,
    High,
}

impl ThinkingLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThinkingLevel::Low => "low",
            ThinkingLevel::High => "high",
        }
    }
}

/// A request to the vision-language analysis provider
#[derive(Debug, Clone)]
pub struct AnalyzeRequest {
    pub text: String,
    pub image: Option<AnalyzeImage>,
    /// Model override; the adapter's default applies when absent
    pub model: Option<String>,
    /// Ask the provider for a JSON-typed reply
    pub json: bool,
    pub thinking: Option<ThinkingLevel>,
}

impl AnalyzeRequest {
    pub fn text_only(text: &str) -> Self {
        Self {
            text: text.to_string(),
            image: None,
            model: None,
            json: false,
            thinking: None,
        }
    }
}

/// Synchronous vision-language analysis returning free text
pub trait VisionAnalyzer: Send + Sync {
    fn name(&self) -> &str;
    fn analyze(&self, request: &AnalyzeRequest) -> Result<String>;
}

/// Synchronous image-to-3D reconstruction.
///
/// The response is the provider's raw payload; the mesh URL is located
/// somewhere within it (see the mesh-URL search).
pub trait MeshReconstructor: Send + Sync {
    fn name(&self) -> &str;
    fn reconstruct(&self, image_url: &str) -> Result<Value>;
}
