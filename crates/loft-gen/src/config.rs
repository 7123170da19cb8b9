//! Layered configuration system
//!
//! Config is loaded with three layers of precedence (highest wins):
//! 1. Environment variables: `LOFT_{PROVIDER}_API_KEY`
//! 2. Project-local: `.loft/config.toml`
//! 3. Global: `~/.loft/config.toml`

use loft_core::{LoftError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Provider-specific configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Pipeline defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Number of concurrent renders in the fan-out pipeline
    #[serde(default = "default_variant_count")]
    pub variant_count: usize,
    #[serde(default = "default_variant_aspect_ratio")]
    pub variant_aspect_ratio: String,
    /// File extensions that identify a mesh URL in a reconstruction payload
    #[serde(default = "default_model_extensions")]
    pub model_extensions: Vec<String>,
    #[serde(default = "default_analysis_model")]
    pub analysis_model: String,
    #[serde(default = "default_detection_model")]
    pub detection_model: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            variant_count: default_variant_count(),
            variant_aspect_ratio: default_variant_aspect_ratio(),
            model_extensions: default_model_extensions(),
            analysis_model: default_analysis_model(),
            detection_model: default_detection_model(),
        }
    }
}

fn default_variant_count() -> usize {
    2
}
fn default_variant_aspect_ratio() -> String {
    "4:3".to_string()
}
fn default_model_extensions() -> Vec<String> {
    vec![".glb".to_string(), ".gltf".to_string(), ".obj".to_string()]
}
fn default_analysis_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_detection_model() -> String {
    "gemini-3-pro-preview".to_string()
}

/// Top-level config file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoftConfigFile {
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub generation: GenerationSettingsFile,
}

/// File-side settings where every field is optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationSettingsFile {
    #[serde(default)]
    pub variant_count: Option<usize>,
    #[serde(default)]
    pub variant_aspect_ratio: Option<String>,
    #[serde(default)]
    pub model_extensions: Option<Vec<String>>,
    #[serde(default)]
    pub analysis_model: Option<String>,
    #[serde(default)]
    pub detection_model: Option<String>,
}

/// Resolved configuration with environment variable overrides applied
#[derive(Debug, Clone, Default)]
pub struct LoftConfig {
    pub providers: HashMap<String, ProviderConfig>,
    pub generation: GenerationSettings,
}

/// Component-configured flags for the unauthenticated health probe
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub image_gen: bool,
    pub vision: bool,
    pub reconstruct: bool,
}

impl LoftConfig {
    /// Load config with layered precedence: global < project < env vars
    pub fn load() -> Result<Self> {
        let mut config = LoftConfigFile::default();

        // Layer 1: Global config (~/.loft/config.toml)
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                let global = Self::load_file(&global_path)?;
                Self::merge_into(&mut config, global);
            }
        }

        // Layer 2: Project-local config (.loft/config.toml)
        let local_path = PathBuf::from(".loft/config.toml");
        if local_path.exists() {
            let local = Self::load_file(&local_path)?;
            Self::merge_into(&mut config, local);
        }

        // Layer 3: Environment variable overrides
        Self::apply_env_overrides(&mut config);

        Ok(Self::resolve(config))
    }

    /// Load config from a specific file path only (for testing)
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let mut config = Self::load_file(path)?;
        Self::apply_env_overrides(&mut config);
        Ok(Self::resolve(config))
    }

    /// Get API key for a provider
    pub fn api_key(&self, provider_name: &str) -> Option<&str> {
        self.providers
            .get(provider_name)
            .and_then(|p| p.api_key.as_deref())
    }

    /// Get API URL for a provider (or its default)
    pub fn api_url(&self, provider_name: &str) -> Option<&str> {
        self.providers
            .get(provider_name)
            .and_then(|p| p.api_url.as_deref())
    }

    /// Check if a provider is enabled
    pub fn is_enabled(&self, provider_name: &str) -> bool {
        self.providers
            .get(provider_name)
            .map(|p| p.enabled)
            .unwrap_or(true)
    }

    /// Configured-key flags per provider kind
    pub fn health_report(&self) -> HealthReport {
        HealthReport {
            status: "ok",
            image_gen: self.api_key("fibo").map(|k| !k.is_empty()).unwrap_or(false),
            vision: self
                .api_key("gemini")
                .map(|k| !k.is_empty())
                .unwrap_or(false),
            reconstruct: self
                .api_key("trellis")
                .map(|k| !k.is_empty())
                .unwrap_or(false),
        }
    }

    fn resolve(file: LoftConfigFile) -> Self {
        let defaults = GenerationSettings::default();
        let g = file.generation;
        LoftConfig {
            providers: file.providers,
            generation: GenerationSettings {
                variant_count: g.variant_count.unwrap_or(defaults.variant_count),
                variant_aspect_ratio: g
                    .variant_aspect_ratio
                    .unwrap_or(defaults.variant_aspect_ratio),
                model_extensions: g.model_extensions.unwrap_or(defaults.model_extensions),
                analysis_model: g.analysis_model.unwrap_or(defaults.analysis_model),
                detection_model: g.detection_model.unwrap_or(defaults.detection_model),
            },
        }
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".loft").join("config.toml"))
    }

    fn load_file(path: &Path) -> Result<LoftConfigFile> {
        let content = std::fs::read_to_string(path)?;
        let config: LoftConfigFile = toml::from_str(&content).map_err(|e| {
            LoftError::Config(format!("Failed to parse config {}: {}", path.display(), e))
        })?;
        Ok(config)
    }

    fn merge_into(base: &mut LoftConfigFile, overlay: LoftConfigFile) {
        for (name, provider) in overlay.providers {
            let entry = base.providers.entry(name).or_default();
            if provider.api_key.is_some() {
                entry.api_key = provider.api_key;
            }
            if provider.api_url.is_some() {
                entry.api_url = provider.api_url;
            }
            entry.enabled = provider.enabled;
        }

        let g = overlay.generation;
        if g.variant_count.is_some() {
            base.generation.variant_count = g.variant_count;
        }
        if g.variant_aspect_ratio.is_some() {
            base.generation.variant_aspect_ratio = g.variant_aspect_ratio;
        }
        if g.model_extensions.is_some() {
            base.generation.model_extensions = g.model_extensions;
        }
        if g.analysis_model.is_some() {
            base.generation.analysis_model = g.analysis_model;
        }
        if g.detection_model.is_some() {
            base.generation.detection_model = g.detection_model;
        }
    }

    fn apply_env_overrides(config: &mut LoftConfigFile) {
        let provider_names = ["fibo", "gemini", "trellis"];
        for name in &provider_names {
            let env_key = format!("LOFT_{}_API_KEY", name.to_uppercase());
            if let Ok(key) = std::env::var(&env_key) {
                let entry = config.providers.entry(name.to_string()).or_default();
                entry.api_key = Some(key);
            }
        }
    }
}
