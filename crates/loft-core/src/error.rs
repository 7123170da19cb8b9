//! Error types for Loft

use thiserror::Error;

/// The main error type for Loft operations
#[derive(Debug, Error)]
pub enum LoftError {
    #[error("Unauthorized: {0}")]
    Auth(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0} quota exceeded")]
    QuotaExceeded(String),

    #[error("Upstream error: {status} - {body}")]
    Upstream { status: u16, body: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("TOML serialization error: {0}")]
    TomlSer(String),
}

/// Result type alias for Loft operations
pub type Result<T> = std::result::Result<T, LoftError>;

impl LoftError {
    /// True for errors a caller can show as "upgrade your plan" messaging
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, LoftError::QuotaExceeded(_))
    }
}

impl From<serde_json::Error> for LoftError {
    fn from(err: serde_json::Error) -> Self {
        LoftError::Json(err.to_string())
    }
}

impl From<toml::de::Error> for LoftError {
    fn from(err: toml::de::Error) -> Self {
        LoftError::TomlParse(err.to_string())
    }
}

impl From<toml::ser::Error> for LoftError {
    fn from(err: toml::ser::Error) -> Self {
        LoftError::TomlSer(err.to_string())
    }
}
