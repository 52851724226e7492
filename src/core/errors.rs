// Custom error types for better error handling and debugging
//
// Using thiserror for ergonomic error definitions with:
// - Context preservation
// - Type-safe error matching
// - Automatic Display/Error trait implementations
// - Source error chaining

use thiserror::Error;

/// Font acquisition errors
#[derive(Debug, Error)]
#[allow(dead_code)]
pub enum FontError {
    #[error("Font download failed for key '{key}': {source}")]
    DownloadFailed {
        key: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Font server returned status {status} for key '{key}'")]
    BadStatus { key: String, status: u16 },

    #[error("Font cache I/O failed at {path}: {source}")]
    CacheIo {
        path: String,
        source: std::io::Error,
    },

    #[error("Font data for key '{key}' contains no usable faces")]
    UnusableFont { key: String },

    #[error("Invalid font key: '{0}'")]
    InvalidKey(String),
}

/// Glyph rendering errors
#[derive(Debug, Error)]
#[allow(dead_code)]
pub enum RenderError {
    #[error("Cannot render an empty group")]
    EmptyGroup,

    #[error("Canvas encoding failed: {0}")]
    EncodeFailed(#[from] image::ImageError),
}

/// Recognition engine errors
#[derive(Debug, Error)]
#[allow(dead_code)]
pub enum EngineError {
    #[error("Engine request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Engine returned status {0}")]
    BadStatus(u16),

    #[error("Invalid engine response: {0}")]
    InvalidResponse(String),

    #[error("Engine '{0}' is not available")]
    Unavailable(String),
}

/// Run orchestration errors
#[derive(Debug, Error)]
#[allow(dead_code)]
pub enum RunError {
    #[error("Rendering failed for group {group_index}: {source}")]
    RenderFailed {
        group_index: usize,
        #[source]
        source: RenderError,
    },

    #[error("Session was disposed while a run was in flight")]
    SessionDisposed,

    #[error("Task join failed: {0}")]
    TaskJoinFailed(String),
}

/// Configuration errors
#[derive(Debug, Error)]
#[allow(dead_code)]
pub enum ConfigError {
    #[error("Invalid placeholder range: U+{start:04X}..=U+{end:04X}")]
    InvalidPlaceholderRange { start: u32, end: u32 },

    #[error("Render font size must be in [8, 512], got {0}")]
    InvalidFontSize(u32),

    #[error("Invalid rendering config: {0}")]
    InvalidRenderingConfig(String),

    #[error("Recognition language hint must not be blank, got '{0}'")]
    InvalidLanguage(String),

    #[error("Engine request timeout must be > 0 seconds, got {0}")]
    InvalidTimeout(u64),

    #[error("Font URL template must contain a '{{key}}' marker, got '{0}'")]
    InvalidFontUrlTemplate(String),

    #[error("Font memory cache capacity must be > 0, got {0}")]
    InvalidCacheCapacity(usize),

    #[error("Environment variable parsing failed: {0}")]
    EnvVarError(String),
}

// Convenience type aliases for Results
pub type FontResult<T> = Result<T, FontError>;
pub type RenderResult<T> = Result<T, RenderError>;
pub type EngineResult<T> = Result<T, EngineError>;
pub type RunResult<T> = Result<T, RunError>;
#[allow(dead_code)]
pub type ConfigResult<T> = Result<T, ConfigError>;

// Helper trait for tagging per-group failures with their group index
pub trait GroupContext<T> {
    fn with_group_context(self, group_index: usize) -> Result<T, RunError>;
}

impl<T> GroupContext<T> for RenderResult<T> {
    fn with_group_context(self, group_index: usize) -> Result<T, RunError> {
        self.map_err(|e| RunError::RenderFailed {
            group_index,
            source: e,
        })
    }
}
