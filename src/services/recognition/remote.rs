use super::{OcrEngine, RecognizedText};
use crate::core::config::Config;
use crate::core::errors::{EngineError, EngineResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Client for a remote recognition service.
/// Posts the glyph canvas as base64 PNG with the language hint and expects
/// `{ "text": ... }` back. The per-request timeout is this client's own
/// concern - the dispatcher imposes none of its own.
pub struct RemoteOcrEngine {
    endpoint: String,
    http_client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct RecognizeRequest<'a> {
    /// Base64-encoded PNG of the rendered glyph canvas
    image: String,
    language: &'a str,
}

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    text: String,
}

impl RemoteOcrEngine {
    pub fn new(config: &Config) -> Result<Self> {
        // HTTP client with timeout and connection pooling
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs()))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            endpoint: config.engine_endpoint().to_string(),
            http_client,
        })
    }
}

#[async_trait]
impl OcrEngine for RemoteOcrEngine {
    #[instrument(skip(self, image_png), fields(bytes = image_png.len()))]
    async fn recognize(&self, image_png: &[u8], language: &str) -> EngineResult<RecognizedText> {
        let payload = RecognizeRequest {
            image: general_purpose::STANDARD.encode(image_png),
            language,
        };

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::BadStatus(status.as_u16()));
        }

        let body: RecognizeResponse = response
            .json()
            .await
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))?;

        debug!(chars = body.text.chars().count(), "engine response received");
        Ok(RecognizedText { text: body.text })
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_payload_shape() {
        let payload = RecognizeRequest {
            image: general_purpose::STANDARD.encode(b"png-bytes"),
            language: "chi_sim",
        };
        let json = serde_json::to_value(&payload).unwrap();

        assert!(json["image"].is_string());
        assert_eq!(json["language"], "chi_sim");
    }

    #[test]
    fn test_response_parsing() {
        let body: RecognizeResponse = serde_json::from_str(r#"{"text":"好你"}"#).unwrap();
        assert_eq!(body.text, "好你");
    }
}
