//! Loft Gen - quota-gated generation pipelines
//!
//! Provides a pluggable adapter framework over the three external
//! generative services (image synthesis, vision-language analysis, 3D
//! reconstruction) and the orchestrator that sequences them: quota check
//! first, provider stages next, re-upload into owned storage, usage
//! committed only after the final stage succeeds.

pub mod config;
pub mod mesh;
pub mod pipeline;
pub mod provider;
pub mod providers;

pub use config::{GenerationSettings, HealthReport, LoftConfig, ProviderConfig};
pub use mesh::find_url_with_extensions;
pub use pipeline::{
    AnalysisOutcome, AnalyzeJob, DetectJob, ImageJob, ModelOutcome, RenderOutcome, SceneJob,
    SceneOutcome, Studio, VariantOutcome, VariantRender,
};
pub use provider::{
    AnalyzeImage, AnalyzeRequest, ImageGenRequest, ImageGenResponse, ImageGenerator,
    MeshReconstructor, ThinkingLevel, VisionAnalyzer,
};
