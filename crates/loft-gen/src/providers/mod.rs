//! Provider registry
//!
//! Maps configuration to concrete adapter implementations, one per
//! provider kind.

pub mod fibo;
pub mod gemini;
pub mod mock;
pub mod trellis;

use crate::config::LoftConfig;
use crate::provider::{ImageGenerator, MeshReconstructor, VisionAnalyzer};
use loft_core::Result;
use std::sync::Arc;

/// Create the image synthesis adapter from configuration
pub fn create_image_generator(config: &LoftConfig) -> Result<Arc<dyn ImageGenerator>> {
    Ok(Arc::new(fibo::FiboProvider::from_config(config)?))
}

/// Create the vision-language analysis adapter from configuration
pub fn create_vision_analyzer(config: &LoftConfig) -> Result<Arc<dyn VisionAnalyzer>> {
    Ok(Arc::new(gemini::GeminiProvider::from_config(config)?))
}

/// Create the 3D reconstruction adapter from configuration
pub fn create_mesh_reconstructor(config: &LoftConfig) -> Result<Arc<dyn MeshReconstructor>> {
    Ok(Arc::new(trellis::TrellisProvider::from_config(config)?))
}
