// Font Manager - Downloads and caches site obfuscation fonts
//
// Sites serve a per-document custom font whose glyph shapes carry the real
// characters; recognition is only as good as rendering with that exact font.
// Fetch order: in-memory LRU, then disk cache, then download from the
// configured URL template.

use crate::core::config::FontConfig;
use crate::core::errors::{FontError, FontResult};
use crate::utils::metrics::Metrics;
use anyhow::{Context, Result};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use tracing::{debug, info};

pub struct FontManager {
    cache_dir: PathBuf,
    url_template: String,
    font_cache: Mutex<LruCache<String, Vec<u8>>>,
    client: reqwest::Client,
    metrics: Option<Metrics>,
}

impl FontManager {
    pub fn new(config: &FontConfig, metrics: Option<Metrics>) -> Result<Self> {
        let cache_dir = PathBuf::from(&config.cache_dir);
        std::fs::create_dir_all(&cache_dir).context("Failed to create font cache directory")?;

        let capacity = NonZeroUsize::new(config.memory_cache_size)
            .context("Font memory cache capacity must be non-zero")?;
        let font_cache = Mutex::new(LruCache::new(capacity));

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        info!("Font Manager initialized (cache: {})", cache_dir.display());

        Ok(Self {
            cache_dir,
            url_template: config.url_template.clone(),
            font_cache,
            client,
            metrics,
        })
    }

    /// Get the raw bytes of the site font for `key`, from cache or download.
    /// Whether the bytes parse as a usable font is the renderer's verdict,
    /// not this layer's.
    pub async fn ensure_font(&self, key: &str) -> FontResult<Vec<u8>> {
        let key = key.trim();
        if key.is_empty() {
            return Err(FontError::InvalidKey(key.to_string()));
        }

        // Check in-memory cache first
        {
            let mut cache = self.font_cache.lock();
            if let Some(font_data) = cache.get(key) {
                debug!("site font '{}' found in memory cache", key);
                if let Some(ref m) = self.metrics {
                    m.record_font_cache_hit();
                }
                return Ok(font_data.clone());
            }
        }

        // Check disk cache
        let font_path = self.font_path(key);
        if font_path.exists() {
            debug!("site font '{}' found in disk cache", key);
            if let Some(ref m) = self.metrics {
                m.record_font_cache_hit();
            }
            let font_data =
                tokio::fs::read(&font_path)
                    .await
                    .map_err(|source| FontError::CacheIo {
                        path: font_path.display().to_string(),
                        source,
                    })?;

            self.font_cache.lock().put(key.to_string(), font_data.clone());
            return Ok(font_data);
        }

        // Download from the site
        info!("Downloading site font '{}'...", key);
        if let Some(ref m) = self.metrics {
            m.record_font_cache_miss();
        }
        let font_data = self.download_font(key).await?;

        // Save to disk cache
        tokio::fs::write(&font_path, &font_data)
            .await
            .map_err(|source| FontError::CacheIo {
                path: font_path.display().to_string(),
                source,
            })?;

        self.font_cache.lock().put(key.to_string(), font_data.clone());

        info!("site font '{}' downloaded and cached", key);
        Ok(font_data)
    }

    async fn download_font(&self, key: &str) -> FontResult<Vec<u8>> {
        let url = self.build_font_url(key);
        debug!("font URL: {}", url);

        let response =
            self.client
                .get(&url)
                .send()
                .await
                .map_err(|source| FontError::DownloadFailed {
                    key: key.to_string(),
                    source,
                })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FontError::BadStatus {
                key: key.to_string(),
                status: status.as_u16(),
            });
        }

        let font_data = response
            .bytes()
            .await
            .map_err(|source| FontError::DownloadFailed {
                key: key.to_string(),
                source,
            })?
            .to_vec();

        Ok(font_data)
    }

    /// Resolve the download URL by substituting the key into the template
    fn build_font_url(&self, key: &str) -> String {
        self.url_template
            .replace("{key}", urlencoding::encode(key).as_ref())
    }

    fn font_path(&self, key: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}.woff2", sanitize_filename(key)))
    }

    /// Clear the in-memory font cache
    pub fn clear_cache(&self) {
        self.font_cache.lock().clear();
        info!("Font memory cache cleared");
    }

    /// Get cache statistics
    pub fn cache_stats(&self) -> (usize, usize) {
        let cache = self.font_cache.lock();
        (cache.len(), cache.cap().get())
    }
}

/// Sanitize filename to prevent path traversal
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            ' ' => '_',
            _ => '-',
        })
        .collect()
}
