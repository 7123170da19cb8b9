//! The generation orchestrator
//!
//! Every pipeline follows the same shape: validate inputs, check quota,
//! run the provider stages, persist results into owned storage, and only
//! then commit usage. A failure at any stage leaves usage untouched; a
//! failed quota check means zero provider calls.

use crate::config::{GenerationSettings, LoftConfig};
use crate::mesh::find_url_with_extensions;
use crate::provider::{
    AnalyzeImage, AnalyzeRequest, ImageGenRequest, ImageGenerator, MeshReconstructor,
    ThinkingLevel, VisionAnalyzer,
};
use crate::providers;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use loft_core::{short_id, LoftError, Result};
use loft_store::{fetch_to_storage, store_base64_image, strip_data_uri, Platform, QuotaInfo, ResourceKind};
use serde_json::Value;
use std::sync::Arc;

/// Prompt used for every render in the fan-out pipeline
const VARIANT_PROMPT: &str = "You must maintain and accurately describe all objects in the scene \
without changing any of their aspects, and accurately describe their spatial relations to each \
other. Then, create the photorealistic 3D render of the room for interior design. Add HDR \
lighting effect.";

/// Inputs for the single-stage image pipeline
#[derive(Debug, Clone, Default)]
pub struct ImageJob {
    pub structured_prompt: Option<Value>,
    pub prompt: Option<String>,
    pub seed: Option<u64>,
    /// Optional inline reference image (base64)
    pub image_base64: Option<String>,
}

/// Result of the single-stage image pipeline
#[derive(Debug, Clone)]
pub struct RenderOutcome {
    /// Canonical URL of the re-uploaded image in owned storage
    pub image_url: String,
    /// Echoed structured prompt, parsed when possible
    pub structured_prompt: Option<Value>,
    pub seed: Option<u64>,
    /// The provider-hosted URL the image was downloaded from
    pub original_url: String,
}

/// Inputs for the two-stage scene pipeline
#[derive(Debug, Clone)]
pub struct SceneJob {
    pub image_base64: String,
    pub mime_type: Option<String>,
    pub analysis_prompt: String,
}

/// Result of the two-stage scene pipeline
#[derive(Debug, Clone)]
pub struct SceneOutcome {
    /// Stage 1's itemized description
    pub furniture_list: String,
    pub structured_prompt: Option<Value>,
    pub seed: Option<u64>,
    pub image_url: String,
}

/// Inputs for a vision analysis call
#[derive(Debug, Clone, Default)]
pub struct AnalyzeJob {
    pub prompt: String,
    pub model: Option<String>,
    pub json: bool,
    pub image_base64: Option<String>,
    pub mime_type: Option<String>,
    pub image_url: Option<String>,
}

/// A vision analysis reply, JSON-typed when requested
#[derive(Debug, Clone)]
pub enum AnalysisOutcome {
    Text(String),
    Json(Value),
}

/// Inputs for bounding-box detection
#[derive(Debug, Clone, Default)]
pub struct DetectJob {
    pub prompt: String,
    pub image_base64: Option<String>,
    pub image_url: Option<String>,
}

/// One stored render from the fan-out pipeline
#[derive(Debug, Clone)]
pub struct VariantRender {
    pub id: usize,
    pub image_url: String,
    pub original_provider_url: String,
}

/// Result of the fan-out pipeline
#[derive(Debug, Clone)]
pub struct VariantOutcome {
    pub session_id: String,
    pub original_url: String,
    pub results: Vec<VariantRender>,
}

/// Result of the 3D reconstruction pipeline
#[derive(Debug, Clone)]
pub struct ModelOutcome {
    pub model_url: String,
    /// Image URL echoed by the provider, when present
    pub image_url: Option<String>,
    pub raw_response: Value,
}

/// Sequences and parallelizes provider calls, gated by the quota ledger,
/// persisting results through the platform's blob store.
pub struct Studio {
    image_gen: Arc<dyn ImageGenerator>,
    vision: Arc<dyn VisionAnalyzer>,
    reconstruct: Arc<dyn MeshReconstructor>,
    platform: Arc<Platform>,
    settings: GenerationSettings,
}

impl Studio {
    pub fn new(
        image_gen: Arc<dyn ImageGenerator>,
        vision: Arc<dyn VisionAnalyzer>,
        reconstruct: Arc<dyn MeshReconstructor>,
        platform: Arc<Platform>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            image_gen,
            vision,
            reconstruct,
            platform,
            settings,
        }
    }

    /// Wire up the real provider adapters from configuration
    pub fn from_config(config: &LoftConfig, platform: Arc<Platform>) -> Result<Self> {
        Ok(Self::new(
            providers::create_image_generator(config)?,
            providers::create_vision_analyzer(config)?,
            providers::create_mesh_reconstructor(config)?,
            platform,
            config.generation.clone(),
        ))
    }

    /// Quota summary for the authenticated user
    pub fn quota(&self, user_id: &str) -> Result<QuotaInfo> {
        self.platform.ledger.quota_info(user_id)
    }

    /// Single-stage image pipeline: generate, re-upload, commit one image.
    pub fn generate_image(&self, user_id: &str, job: ImageJob) -> Result<RenderOutcome> {
        if job.structured_prompt.is_none() && job.prompt.is_none() {
            return Err(LoftError::Validation(
                "structured_prompt or prompt is required".to_string(),
            ));
        }
        self.platform.ledger.check_quota(user_id, ResourceKind::Image)?;

        let mut request = ImageGenRequest {
            structured_prompt: job.structured_prompt,
            prompt: job.prompt,
            seed: job.seed,
            reference_images: Vec::new(),
            aspect_ratio: None,
        };
        if let Some(image) = job.image_base64 {
            request.reference_images.push(image);
        }

        let response = self.image_gen.generate(&request)?;
        let stored = self.store_render(user_id, &format!("{}.png", short_id()), &response.image_url)?;

        self.platform
            .ledger
            .commit_usage(user_id, ResourceKind::Image, 1)?;

        Ok(RenderOutcome {
            image_url: stored,
            structured_prompt: parse_structured_prompt(response.structured_prompt),
            seed: response.seed,
            original_url: response.image_url,
        })
    }

    /// Two-stage scene pipeline: analyze the reference image, then
    /// generate from the derived prompt. Stage 2 never runs and nothing
    /// is committed when stage 1 fails.
    pub fn generate_scene(&self, user_id: &str, job: SceneJob) -> Result<SceneOutcome> {
        if job.image_base64.trim().is_empty() || job.analysis_prompt.trim().is_empty() {
            return Err(LoftError::Validation(
                "image_base64 and analysis_prompt are required".to_string(),
            ));
        }
        self.platform.ledger.check_quota(user_id, ResourceKind::Image)?;

        // Stage 1: itemize the scene contents
        let furniture_list = self.vision.analyze(&AnalyzeRequest {
            text: job.analysis_prompt.clone(),
            image: Some(AnalyzeImage::Inline {
                data: job.image_base64.clone(),
                mime_type: job.mime_type.clone().unwrap_or_else(|| "image/jpeg".to_string()),
            }),
            model: Some(self.settings.analysis_model.clone()),
            json: false,
            thinking: None,
        })?;
        if furniture_list.trim().is_empty() {
            return Err(LoftError::Generation(
                "Scene analysis returned no usable text".to_string(),
            ));
        }

        // Stage 2: recreate the scene, constrained to the itemized list
        let response = self.image_gen.generate(&ImageGenRequest {
            structured_prompt: None,
            prompt: Some(build_scene_prompt(&furniture_list)),
            seed: None,
            reference_images: vec![job.image_base64],
            aspect_ratio: None,
        })?;

        let stored = self.store_render(user_id, &format!("{}.png", short_id()), &response.image_url)?;

        self.platform
            .ledger
            .commit_usage(user_id, ResourceKind::Image, 1)?;

        Ok(SceneOutcome {
            furniture_list,
            structured_prompt: parse_structured_prompt(response.structured_prompt),
            seed: response.seed,
            image_url: stored,
        })
    }

    /// Fan-out pipeline: N structurally identical renders of one stored
    /// screenshot, all-or-nothing. Siblings already in flight when one
    /// fails are not cancelled; their stored assets remain. Usage is
    /// committed by exactly N on full success and 0 otherwise.
    pub fn render_variants(&self, user_id: &str, screenshot_base64: &str) -> Result<VariantOutcome> {
        if screenshot_base64.trim().is_empty() {
            return Err(LoftError::Validation("screenshot is required".to_string()));
        }
        self.platform.ledger.check_quota(user_id, ResourceKind::Image)?;

        let session_id = short_id();
        let original = store_base64_image(
            self.platform.blob.as_ref(),
            &render_path(user_id, &format!("{}-original.png", session_id)),
            screenshot_base64,
        )?;
        let original_url = original.url;

        let count = self.settings.variant_count.max(1);
        let joined: Vec<Result<VariantRender>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (1..=count)
                .map(|variant| {
                    let original_url = original_url.as_str();
                    let session_id = session_id.as_str();
                    scope.spawn(move || {
                        self.render_one_variant(user_id, session_id, original_url, variant)
                    })
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        Err(LoftError::Generation("Variant worker panicked".to_string()))
                    })
                })
                .collect()
        });

        let mut results = Vec::with_capacity(count);
        for rendered in joined {
            results.push(rendered?);
        }

        self.platform
            .ledger
            .commit_usage(user_id, ResourceKind::Image, count as u32)?;

        Ok(VariantOutcome {
            session_id,
            original_url,
            results,
        })
    }

    fn render_one_variant(
        &self,
        user_id: &str,
        session_id: &str,
        original_url: &str,
        variant: usize,
    ) -> Result<VariantRender> {
        let response = self.image_gen.generate(&ImageGenRequest {
            structured_prompt: None,
            prompt: Some(VARIANT_PROMPT.to_string()),
            seed: None,
            reference_images: vec![original_url.to_string()],
            aspect_ratio: Some(self.settings.variant_aspect_ratio.clone()),
        })?;

        let stored = self.store_render(
            user_id,
            &format!("{}-variant{}.png", session_id, variant),
            &response.image_url,
        )?;

        Ok(VariantRender {
            id: variant,
            image_url: stored,
            original_provider_url: response.image_url,
        })
    }

    /// 3D reconstruction pipeline: reconstruct, locate the mesh URL,
    /// commit one model.
    pub fn generate_model(&self, user_id: &str, image_url: &str) -> Result<ModelOutcome> {
        if image_url.trim().is_empty() {
            return Err(LoftError::Validation("image_url is required".to_string()));
        }
        self.platform.ledger.check_quota(user_id, ResourceKind::Model)?;

        let raw = self.reconstruct.reconstruct(image_url)?;

        // Well-known field first, full search second
        let model_url = raw
            .get("model_mesh")
            .and_then(|m| m.get("url"))
            .and_then(|u| u.as_str())
            .map(|s| s.to_string())
            .or_else(|| {
                find_url_with_extensions(&raw, &self.settings.model_extensions)
                    .map(|s| s.to_string())
            })
            .ok_or_else(|| LoftError::NotFound("No model URL found in response".to_string()))?;

        self.platform
            .ledger
            .commit_usage(user_id, ResourceKind::Model, 1)?;

        let echoed_image_url = raw
            .get("image_url")
            .and_then(|u| u.as_str())
            .map(|s| s.to_string());

        Ok(ModelOutcome {
            model_url,
            image_url: echoed_image_url,
            raw_response: raw,
        })
    }

    /// Free-form vision analysis. Not quota-gated.
    pub fn analyze_image(&self, _user_id: &str, job: AnalyzeJob) -> Result<AnalysisOutcome> {
        if job.prompt.trim().is_empty() {
            return Err(LoftError::Validation("prompt is required".to_string()));
        }

        // Inline base64 takes precedence over a URL
        let image = if let Some(data) = job.image_base64 {
            Some(AnalyzeImage::Inline {
                data,
                mime_type: job.mime_type.unwrap_or_else(|| "image/jpeg".to_string()),
            })
        } else if let Some(url) = &job.image_url {
            let bytes = self.platform.fetcher.fetch(url)?;
            Some(AnalyzeImage::Inline {
                data: STANDARD.encode(bytes),
                mime_type: "image/jpeg".to_string(),
            })
        } else {
            None
        };

        let text = self.vision.analyze(&AnalyzeRequest {
            text: job.prompt,
            image,
            model: job.model,
            json: job.json,
            thinking: None,
        })?;

        if job.json {
            return Ok(AnalysisOutcome::Json(serde_json::from_str(&text)?));
        }
        Ok(AnalysisOutcome::Text(text))
    }

    /// Bounding-box detection over an image. Not quota-gated.
    ///
    /// Images already in owned storage are handed to the provider by URI
    /// instead of being re-encoded.
    pub fn detect_boxes(&self, _user_id: &str, job: DetectJob) -> Result<Value> {
        if job.prompt.trim().is_empty() {
            return Err(LoftError::Validation("prompt is required".to_string()));
        }
        if job.image_base64.is_none() && job.image_url.is_none() {
            return Err(LoftError::Validation(
                "image_base64 or image_url is required".to_string(),
            ));
        }

        let image = if let Some(url) = job.image_url.as_deref().filter(|u| self.is_owned_url(u)) {
            AnalyzeImage::FileUri {
                uri: url.to_string(),
            }
        } else if let Some(data) = &job.image_base64 {
            AnalyzeImage::Inline {
                data: strip_data_uri(data).to_string(),
                mime_type: "image/jpeg".to_string(),
            }
        } else {
            // Remote URL outside owned storage: fetch and inline it
            let url = job.image_url.as_deref().unwrap_or_default();
            let bytes = self.platform.fetcher.fetch(url)?;
            AnalyzeImage::Inline {
                data: STANDARD.encode(bytes),
                mime_type: "image/jpeg".to_string(),
            }
        };

        let thinking = if job.prompt.contains("spatial") {
            ThinkingLevel::High
        } else {
            ThinkingLevel::Low
        };

        let text = self.vision.analyze(&AnalyzeRequest {
            text: job.prompt,
            image: Some(image),
            model: Some(self.settings.detection_model.clone()),
            json: true,
            thinking: Some(thinking),
        })?;

        Ok(serde_json::from_str(&text)?)
    }

    fn store_render(&self, user_id: &str, filename: &str, provider_url: &str) -> Result<String> {
        let stored = fetch_to_storage(
            self.platform.blob.as_ref(),
            self.platform.fetcher.as_ref(),
            provider_url,
            &render_path(user_id, filename),
        )?;
        Ok(stored.url)
    }

    fn is_owned_url(&self, url: &str) -> bool {
        url.starts_with(&self.platform.blob.public_url(""))
    }
}

fn render_path(user_id: &str, filename: &str) -> String {
    format!("users/{}/renders/{}", user_id, filename)
}

/// Tolerant parse of an echoed structured prompt: a JSON string becomes a
/// structured value when it parses, and stays raw otherwise.
fn parse_structured_prompt(raw: Option<Value>) -> Option<Value> {
    match raw {
        Some(Value::String(s)) => match serde_json::from_str(&s) {
            Ok(parsed) => Some(parsed),
            Err(_) => Some(Value::String(s)),
        },
        other => other,
    }
}

fn build_scene_prompt(furniture_list: &str) -> String {
    format!(
        "You are a professional interior designer converting real photos of interiors into \
pixel-perfect lifelike recreations. Given a reference image and a detailed description below, \
recreate the scene as accurately as possible. Preserve perspectives, colors, and objects as-is. \
Generate a structured prompt from the description.\n\n\
Your task is to create a structured prompt that encapsulates the essence of the items below. \
Do NOT include any items that are not mentioned in this itemized list.\n\n{}",
        furniture_list
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ImageGenResponse;
    use crate::providers::mock::{MockImageGenerator, MockMeshReconstructor, MockVisionAnalyzer};
    use loft_store::{BlobStore, FsBlobStore, QuotaLedger, RemoteFetcher};
    use serde_json::json;
    use std::path::PathBuf;

    const USER: &str = "u1";

    struct StubFetcher;

    impl RemoteFetcher for StubFetcher {
        fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
            Ok(b"fetched image bytes".to_vec())
        }
    }

    struct Harness {
        studio: Studio,
        image_gen: Arc<MockImageGenerator>,
        vision: Arc<MockVisionAnalyzer>,
        reconstruct: Arc<MockMeshReconstructor>,
        blob: Arc<FsBlobStore>,
        dir: PathBuf,
    }

    impl Drop for Harness {
        fn drop(&mut self) {
            std::fs::remove_dir_all(&self.dir).ok();
        }
    }

    fn harness() -> Harness {
        let dir = std::env::temp_dir().join(format!("loft_studio_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();

        let blob = Arc::new(FsBlobStore::new(
            dir.join("blobs"),
            "loft-assets",
            "https://storage.example.com",
        ));
        let ledger = QuotaLedger::new(dir.join("accounts"));
        ledger.ensure_account(USER, None, false).unwrap();

        let platform = Arc::new(Platform::new(
            blob.clone(),
            Arc::new(StubFetcher),
            ledger,
        ));

        let image_gen = Arc::new(MockImageGenerator::new());
        let vision = Arc::new(MockVisionAnalyzer::new());
        let reconstruct = Arc::new(MockMeshReconstructor::new());

        let studio = Studio::new(
            image_gen.clone(),
            vision.clone(),
            reconstruct.clone(),
            platform,
            GenerationSettings::default(),
        );

        Harness {
            studio,
            image_gen,
            vision,
            reconstruct,
            blob,
            dir,
        }
    }

    fn drain_images(h: &Harness, count: u32) {
        h.studio
            .platform
            .ledger
            .commit_usage(USER, ResourceKind::Image, count)
            .unwrap();
    }

    #[test]
    fn test_generate_image_happy_path() {
        let h = harness();

        let outcome = h
            .studio
            .generate_image(
                USER,
                ImageJob {
                    prompt: Some("a sunlit loft".to_string()),
                    seed: Some(7),
                    ..Default::default()
                },
            )
            .unwrap();

        assert!(outcome
            .image_url
            .starts_with("https://storage.example.com/loft-assets/users/u1/renders/"));
        assert!(outcome.original_url.starts_with("https://cdn.provider.example/"));
        // The mock echoes a JSON string; the pipeline parses it
        assert_eq!(outcome.structured_prompt, Some(json!({"scene": "mock"})));
        assert_eq!(outcome.seed, Some(1234));

        let info = h.studio.quota(USER).unwrap();
        assert_eq!(info.images_used, 1);
        assert_eq!(info.images_remaining, 199);
    }

    #[test]
    fn test_generate_image_persists_downloaded_bytes() {
        let h = harness();

        let outcome = h
            .studio
            .generate_image(
                USER,
                ImageJob {
                    prompt: Some("p".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let prefix = "https://storage.example.com/loft-assets/";
        let path = outcome.image_url.strip_prefix(prefix).unwrap();
        assert_eq!(h.blob.get(path).unwrap().unwrap(), b"fetched image bytes");
    }

    #[test]
    fn test_generate_image_requires_prompt() {
        let h = harness();

        let err = h.studio.generate_image(USER, ImageJob::default()).unwrap_err();
        assert!(matches!(err, LoftError::Validation(_)));
        assert_eq!(h.image_gen.calls(), 0);
        assert_eq!(h.studio.quota(USER).unwrap().images_used, 0);
    }

    #[test]
    fn test_generate_image_quota_exceeded_makes_no_provider_calls() {
        let h = harness();
        drain_images(&h, 200);

        let err = h
            .studio
            .generate_image(
                USER,
                ImageJob {
                    prompt: Some("p".to_string()),
                    ..Default::default()
                },
            )
            .unwrap_err();

        assert!(err.is_quota_exceeded());
        assert_eq!(h.image_gen.calls(), 0);
        assert_eq!(h.studio.quota(USER).unwrap().images_used, 200);
    }

    #[test]
    fn test_generate_image_unknown_account() {
        let h = harness();

        let err = h
            .studio
            .generate_image(
                "ghost",
                ImageJob {
                    prompt: Some("p".to_string()),
                    ..Default::default()
                },
            )
            .unwrap_err();

        assert!(matches!(err, LoftError::NotFound(_)));
        assert_eq!(h.image_gen.calls(), 0);
    }

    #[test]
    fn test_generate_image_provider_failure_commits_nothing() {
        let h = harness();
        h.image_gen.push_err(LoftError::Upstream {
            status: 500,
            body: "provider exploded".to_string(),
        });

        let err = h
            .studio
            .generate_image(
                USER,
                ImageJob {
                    prompt: Some("p".to_string()),
                    ..Default::default()
                },
            )
            .unwrap_err();

        assert!(matches!(err, LoftError::Upstream { status: 500, .. }));
        assert_eq!(h.studio.quota(USER).unwrap().images_used, 0);
    }

    #[test]
    fn test_structured_prompt_falls_back_to_raw_string() {
        let h = harness();
        h.image_gen.push_ok(ImageGenResponse {
            image_url: "https://cdn.provider.example/x.png".to_string(),
            structured_prompt: Some(json!("not valid json {")),
            seed: None,
        });

        let outcome = h
            .studio
            .generate_image(
                USER,
                ImageJob {
                    prompt: Some("p".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(outcome.structured_prompt, Some(json!("not valid json {")));
    }

    #[test]
    fn test_generate_scene_happy_path() {
        let h = harness();
        h.vision.push_ok("1. green velvet sofa\n2. brass floor lamp");

        let outcome = h
            .studio
            .generate_scene(
                USER,
                SceneJob {
                    image_base64: "QUJD".to_string(),
                    mime_type: Some("image/png".to_string()),
                    analysis_prompt: "itemize the furniture".to_string(),
                },
            )
            .unwrap();

        assert_eq!(outcome.furniture_list, "1. green velvet sofa\n2. brass floor lamp");
        assert!(outcome
            .image_url
            .starts_with("https://storage.example.com/loft-assets/users/u1/renders/"));

        // Stage 2 embeds the itemized list under the constraint text and
        // carries the original reference image
        let request = h.image_gen.last_request().unwrap();
        let prompt = request.prompt.unwrap();
        assert!(prompt.contains("green velvet sofa"));
        assert!(prompt.contains("Do NOT include any items"));
        assert_eq!(request.reference_images, vec!["QUJD".to_string()]);

        assert_eq!(h.studio.quota(USER).unwrap().images_used, 1);
    }

    #[test]
    fn test_generate_scene_empty_analysis_stops_before_stage2() {
        let h = harness();
        h.vision.push_ok("   ");

        let err = h
            .studio
            .generate_scene(
                USER,
                SceneJob {
                    image_base64: "QUJD".to_string(),
                    mime_type: None,
                    analysis_prompt: "itemize".to_string(),
                },
            )
            .unwrap_err();

        assert!(matches!(err, LoftError::Generation(_)));
        assert_eq!(h.image_gen.calls(), 0);
        assert_eq!(h.studio.quota(USER).unwrap().images_used, 0);
    }

    #[test]
    fn test_generate_scene_stage1_error_propagates() {
        let h = harness();
        h.vision.push_err(LoftError::Upstream {
            status: 429,
            body: "rate limited".to_string(),
        });

        let err = h
            .studio
            .generate_scene(
                USER,
                SceneJob {
                    image_base64: "QUJD".to_string(),
                    mime_type: None,
                    analysis_prompt: "itemize".to_string(),
                },
            )
            .unwrap_err();

        assert!(matches!(err, LoftError::Upstream { status: 429, .. }));
        assert_eq!(h.image_gen.calls(), 0);
        assert_eq!(h.studio.quota(USER).unwrap().images_used, 0);
    }

    #[test]
    fn test_generate_scene_validation() {
        let h = harness();

        let err = h
            .studio
            .generate_scene(
                USER,
                SceneJob {
                    image_base64: "".to_string(),
                    mime_type: None,
                    analysis_prompt: "itemize".to_string(),
                },
            )
            .unwrap_err();

        assert!(matches!(err, LoftError::Validation(_)));
        assert_eq!(h.vision.calls(), 0);
    }

    #[test]
    fn test_render_variants_commits_exactly_n() {
        let h = harness();
        let screenshot = STANDARD.encode(b"screenshot bytes");

        let outcome = h.studio.render_variants(USER, &screenshot).unwrap();

        assert!(!outcome.session_id.is_empty());
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(h.image_gen.calls(), 2);
        assert_eq!(h.studio.quota(USER).unwrap().images_used, 2);

        // Each variant stored under the session-scoped name
        for (i, render) in outcome.results.iter().enumerate() {
            assert_eq!(render.id, i + 1);
            let expected = format!(
                "users/u1/renders/{}-variant{}.png",
                outcome.session_id,
                i + 1
            );
            assert!(h.blob.get(&expected).unwrap().is_some());
            assert!(render.image_url.ends_with(&format!(
                "{}-variant{}.png",
                outcome.session_id,
                i + 1
            )));
        }

        // The original screenshot was stored too
        let original_path = format!("users/u1/renders/{}-original.png", outcome.session_id);
        assert_eq!(
            h.blob.get(&original_path).unwrap().unwrap(),
            b"screenshot bytes"
        );
    }

    #[test]
    fn test_render_variants_partial_failure_commits_nothing() {
        let h = harness();
        h.image_gen.push_err(LoftError::Upstream {
            status: 503,
            body: "unavailable".to_string(),
        });

        let screenshot = STANDARD.encode(b"screenshot bytes");
        let err = h.studio.render_variants(USER, &screenshot).unwrap_err();

        assert!(matches!(
            err,
            LoftError::Upstream { .. } | LoftError::Generation(_)
        ));
        // Both branches ran; neither was committed
        assert_eq!(h.image_gen.calls(), 2);
        assert_eq!(h.studio.quota(USER).unwrap().images_used, 0);
    }

    #[test]
    fn test_render_variants_quota_exceeded() {
        let h = harness();
        drain_images(&h, 200);

        let screenshot = STANDARD.encode(b"screenshot bytes");
        let err = h.studio.render_variants(USER, &screenshot).unwrap_err();

        assert!(err.is_quota_exceeded());
        assert_eq!(h.image_gen.calls(), 0);
    }

    #[test]
    fn test_generate_model_well_known_field() {
        let h = harness();

        let outcome = h
            .studio
            .generate_model(USER, "https://storage.example.com/loft-assets/users/u1/renders/a.png")
            .unwrap();

        assert_eq!(outcome.model_url, "https://cdn.provider.example/mock.glb");
        assert!(outcome.image_url.is_some());

        let info = h.studio.quota(USER).unwrap();
        assert_eq!(info.models_used, 1);
        assert_eq!(info.models_remaining, 99);
        assert_eq!(info.images_used, 0);
    }

    #[test]
    fn test_generate_model_search_fallback() {
        let h = harness();
        h.reconstruct.push_ok(json!({
            "outputs": { "files": ["preview.png", "https://cdn.example.com/scene.glb"] }
        }));

        let outcome = h.studio.generate_model(USER, "https://x/img.png").unwrap();
        assert_eq!(outcome.model_url, "https://cdn.example.com/scene.glb");
    }

    #[test]
    fn test_generate_model_no_mesh_url_commits_nothing() {
        let h = harness();
        h.reconstruct.push_ok(json!({ "outputs": ["preview.png"] }));

        let err = h.studio.generate_model(USER, "https://x/img.png").unwrap_err();
        assert!(matches!(err, LoftError::NotFound(_)));
        assert_eq!(h.studio.quota(USER).unwrap().models_used, 0);
    }

    #[test]
    fn test_generate_model_quota_exceeded_makes_no_provider_calls() {
        let h = harness();
        h.studio
            .platform
            .ledger
            .commit_usage(USER, ResourceKind::Model, 100)
            .unwrap();

        let err = h.studio.generate_model(USER, "https://x/img.png").unwrap_err();
        assert!(err.is_quota_exceeded());
        assert_eq!(h.reconstruct.calls(), 0);
    }

    #[test]
    fn test_analyze_image_json_reply() {
        let h = harness();
        h.vision.push_ok(r#"{"items": ["sofa", "lamp"]}"#);

        let outcome = h
            .studio
            .analyze_image(
                USER,
                AnalyzeJob {
                    prompt: "list the items".to_string(),
                    json: true,
                    ..Default::default()
                },
            )
            .unwrap();

        match outcome {
            AnalysisOutcome::Json(value) => {
                assert_eq!(value["items"][0], json!("sofa"));
            }
            AnalysisOutcome::Text(_) => panic!("expected JSON outcome"),
        }
        assert!(h.vision.last_request().unwrap().json);
    }

    #[test]
    fn test_analyze_image_fetches_url_to_inline() {
        let h = harness();

        h.studio
            .analyze_image(
                USER,
                AnalyzeJob {
                    prompt: "describe".to_string(),
                    image_url: Some("https://elsewhere.example.com/room.jpg".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let request = h.vision.last_request().unwrap();
        match request.image.unwrap() {
            AnalyzeImage::Inline { data, mime_type } => {
                assert_eq!(data, STANDARD.encode(b"fetched image bytes"));
                assert_eq!(mime_type, "image/jpeg");
            }
            AnalyzeImage::FileUri { .. } => panic!("expected inline image"),
        }
    }

    #[test]
    fn test_analyze_image_requires_prompt() {
        let h = harness();
        let err = h.studio.analyze_image(USER, AnalyzeJob::default()).unwrap_err();
        assert!(matches!(err, LoftError::Validation(_)));
    }

    #[test]
    fn test_detect_boxes_spatial_prompt_raises_thinking() {
        let h = harness();
        h.vision.push_ok("[]");

        h.studio
            .detect_boxes(
                USER,
                DetectJob {
                    prompt: "find all spatial relations".to_string(),
                    image_base64: Some("QUJD".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let request = h.vision.last_request().unwrap();
        assert_eq!(request.thinking, Some(ThinkingLevel::High));
        assert!(request.json);
        assert_eq!(request.model.as_deref(), Some("gemini-3-pro-preview"));
    }

    #[test]
    fn test_detect_boxes_owned_url_passes_file_uri() {
        let h = harness();
        h.vision.push_ok(r#"{"boxes": []}"#);

        let owned = "https://storage.example.com/loft-assets/users/u1/renders/a.png";
        let value = h
            .studio
            .detect_boxes(
                USER,
                DetectJob {
                    prompt: "find boxes".to_string(),
                    image_url: Some(owned.to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(value, json!({"boxes": []}));
        let request = h.vision.last_request().unwrap();
        assert_eq!(request.thinking, Some(ThinkingLevel::Low));
        match request.image.unwrap() {
            AnalyzeImage::FileUri { uri } => assert_eq!(uri, owned),
            AnalyzeImage::Inline { .. } => panic!("expected file URI for owned storage"),
        }
    }

    #[test]
    fn test_detect_boxes_strips_data_uri() {
        let h = harness();
        h.vision.push_ok("[]");

        h.studio
            .detect_boxes(
                USER,
                DetectJob {
                    prompt: "find boxes".to_string(),
                    image_base64: Some("data:image/png;base64,QUJD".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let request = h.vision.last_request().unwrap();
        match request.image.unwrap() {
            AnalyzeImage::Inline { data, .. } => assert_eq!(data, "QUJD"),
            AnalyzeImage::FileUri { .. } => panic!("expected inline image"),
        }
    }

    #[test]
    fn test_detect_boxes_requires_an_image() {
        let h = harness();
        let err = h
            .studio
            .detect_boxes(
                USER,
                DetectJob {
                    prompt: "find boxes".to_string(),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, LoftError::Validation(_)));
        assert_eq!(h.vision.calls(), 0);
    }

    #[test]
    fn test_end_to_end_quota_flow() {
        let h = harness();

        // Fresh account: full quota
        let info = h.studio.quota(USER).unwrap();
        assert_eq!(info.images_quota, 200);
        assert_eq!(info.images_used, 0);

        // One generation, one commit
        h.studio
            .generate_image(
                USER,
                ImageJob {
                    prompt: Some("p".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let info = h.studio.quota(USER).unwrap();
        assert_eq!(info.images_used, 1);
        assert_eq!(info.images_remaining, 199);
    }
}
