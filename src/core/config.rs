use crate::core::errors::ConfigError;
use crate::core::types::PlaceholderRange;
use std::env;
use tracing::Level;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub log_level: Level,
}

/// Placeholder detection configuration
#[derive(Debug, Clone)]
pub struct PlaceholderConfig {
    /// First code point treated as a placeholder (inclusive)
    pub range_start: u32,
    /// Last code point treated as a placeholder (inclusive)
    pub range_end: u32,
}

/// Glyph canvas configuration
#[derive(Debug, Clone)]
pub struct RenderingConfig {
    /// Glyph cell size in pixels (canvas height is ceil(font_size * 1.5))
    pub font_size: u32,
    /// Horizontal gap between glyph cells in pixels
    pub char_margin: u32,
    /// Padding at the left and right canvas edges in pixels
    pub side_padding: u32,
    /// Family name requested for shaping (the site font registers under this)
    pub font_family: String,
}

/// Recognition engine configuration
#[derive(Debug, Clone)]
pub struct RecognitionConfig {
    /// Language hint passed to the engine on every call
    pub language: String,
    /// Endpoint of the remote recognition service
    pub engine_endpoint: String,
    /// Per-request timeout for the remote engine client
    pub request_timeout_secs: u64,
}

/// Site font acquisition configuration
#[derive(Debug, Clone)]
pub struct FontConfig {
    /// Download URL template; '{key}' is replaced with the font key
    pub url_template: String,
    /// Directory for the on-disk font byte cache
    pub cache_dir: String,
    /// Number of fonts kept in the in-memory cache
    pub memory_cache_size: usize,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub placeholder: PlaceholderConfig,
    pub rendering: RenderingConfig,
    pub recognition: RecognitionConfig,
    pub font: FontConfig,
}

const DEFAULT_FONT_URL_TEMPLATE: &str =
    "https://static.jjwxc.net/tmp/fonts/jjwxcfont_{key}.woff2?h=my.jjwxc.net";

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Self::load_from_env()?;
        config.validate()?;
        Ok(config)
    }

    fn load_from_env() -> Result<Self, ConfigError> {
        // Parse log level
        let log_level = env::var("LOG_LEVEL")
            .ok()
            .and_then(|s| match s.to_lowercase().as_str() {
                "trace" => Some(Level::TRACE),
                "debug" => Some(Level::DEBUG),
                "info" => Some(Level::INFO),
                "warn" | "warning" => Some(Level::WARN),
                "error" => Some(Level::ERROR),
                _ => None,
            })
            .unwrap_or(Level::INFO);

        Ok(Self {
            server: ServerConfig {
                port: env::var("SERVER_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1421),
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                log_level,
            },
            placeholder: PlaceholderConfig {
                range_start: env::var("PLACEHOLDER_RANGE_START")
                    .ok()
                    .and_then(|s| parse_code_point(&s))
                    .unwrap_or(0xE000),
                range_end: env::var("PLACEHOLDER_RANGE_END")
                    .ok()
                    .and_then(|s| parse_code_point(&s))
                    .unwrap_or(0xF8FF),
            },
            rendering: RenderingConfig {
                font_size: env::var("RENDER_FONT_SIZE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(40),
                char_margin: env::var("RENDER_CHAR_MARGIN")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
                side_padding: env::var("RENDER_SIDE_PADDING")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
                font_family: env::var("RENDER_FONT_FAMILY")
                    .unwrap_or_else(|_| "jjwxcfont".to_string()),
            },
            recognition: RecognitionConfig {
                language: env::var("OCR_LANGUAGE").unwrap_or_else(|_| "chi_sim".to_string()),
                engine_endpoint: env::var("OCR_ENGINE_ENDPOINT")
                    .unwrap_or_else(|_| "http://127.0.0.1:8884/recognize".to_string()),
                request_timeout_secs: env::var("OCR_REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            },
            font: FontConfig {
                url_template: env::var("FONT_URL_TEMPLATE")
                    .unwrap_or_else(|_| DEFAULT_FONT_URL_TEMPLATE.to_string()),
                cache_dir: env::var("FONT_CACHE_DIR")
                    .unwrap_or_else(|_| ".cache/fonts".to_string()),
                memory_cache_size: env::var("FONT_MEMORY_CACHE_SIZE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(8),
            },
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        // Validate placeholder range
        if self.placeholder.range_start > self.placeholder.range_end {
            return Err(ConfigError::InvalidPlaceholderRange {
                start: self.placeholder.range_start,
                end: self.placeholder.range_end,
            });
        }
        if self.placeholder.range_end > 0x10FFFF {
            return Err(ConfigError::InvalidPlaceholderRange {
                start: self.placeholder.range_start,
                end: self.placeholder.range_end,
            });
        }

        // Validate canvas geometry
        if !(8..=512).contains(&self.rendering.font_size) {
            return Err(ConfigError::InvalidFontSize(self.rendering.font_size));
        }
        if self.rendering.char_margin > 256 {
            return Err(ConfigError::InvalidRenderingConfig(format!(
                "char_margin must be between 0 and 256, got {}",
                self.rendering.char_margin
            )));
        }
        if self.rendering.side_padding > 256 {
            return Err(ConfigError::InvalidRenderingConfig(format!(
                "side_padding must be between 0 and 256, got {}",
                self.rendering.side_padding
            )));
        }

        // Validate recognition settings
        if self.recognition.language.trim().is_empty() {
            return Err(ConfigError::InvalidLanguage(
                self.recognition.language.clone(),
            ));
        }
        if self.recognition.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout(
                self.recognition.request_timeout_secs,
            ));
        }

        // Validate font settings
        if !self.font.url_template.contains("{key}") {
            return Err(ConfigError::InvalidFontUrlTemplate(
                self.font.url_template.clone(),
            ));
        }
        if self.font.memory_cache_size == 0 {
            return Err(ConfigError::InvalidCacheCapacity(
                self.font.memory_cache_size,
            ));
        }

        Ok(())
    }

    // Legacy accessors for backward compatibility during migration
    pub fn server_port(&self) -> u16 {
        self.server.port
    }

    pub fn server_host(&self) -> &str {
        &self.server.host
    }

    pub fn log_level(&self) -> Level {
        self.server.log_level
    }

    pub fn placeholder_range(&self) -> PlaceholderRange {
        PlaceholderRange::new(self.placeholder.range_start, self.placeholder.range_end)
    }

    pub fn font_size(&self) -> u32 {
        self.rendering.font_size
    }

    pub fn char_margin(&self) -> u32 {
        self.rendering.char_margin
    }

    pub fn side_padding(&self) -> u32 {
        self.rendering.side_padding
    }

    pub fn font_family(&self) -> &str {
        &self.rendering.font_family
    }

    pub fn language(&self) -> &str {
        &self.recognition.language
    }

    pub fn engine_endpoint(&self) -> &str {
        &self.recognition.engine_endpoint
    }

    pub fn request_timeout_secs(&self) -> u64 {
        self.recognition.request_timeout_secs
    }

    pub fn font_url_template(&self) -> &str {
        &self.font.url_template
    }

    pub fn font_cache_dir(&self) -> &str {
        &self.font.cache_dir
    }

    pub fn font_memory_cache_size(&self) -> usize {
        self.font.memory_cache_size
    }
}

// Note: No Default implementation because Config::new() can fail
// Users should explicitly call Config::new()? and handle errors

/// Accepts "E000", "0xE000", or "U+E000"
fn parse_code_point(s: &str) -> Option<u32> {
    let trimmed = s.trim();
    let hex = trimmed
        .strip_prefix("U+")
        .or_else(|| trimmed.strip_prefix("u+"))
        .or_else(|| trimmed.strip_prefix("0x"))
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u32::from_str_radix(hex, 16).ok()
}
