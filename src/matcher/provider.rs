//! Question ranking providers
//!
//! The external text-understanding service is consumed through the narrow
//! [`QuestionRanker`] interface: prompt text plus optional page images in,
//! an ordered list of ranked pages out. Swapping vendors never touches the
//! rest of the pipeline.

use async_trait::async_trait;
use base64::Engine;

use crate::config::MatcherConfig;

use super::types::{MatchError, RankedPage};

/// Narrow interface over the external ranking service
#[async_trait]
pub trait QuestionRanker: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &'static str;

    /// Rank candidate pages for the prompt. `images` are PNG-encoded page
    /// rasters in corpus order; providers may ignore them.
    async fn rank(&self, prompt: &str, images: &[Vec<u8>]) -> Result<Vec<RankedPage>, MatchError>;
}

/// Gemini `generateContent` implementation
pub struct GeminiRanker {
    client: reqwest::Client,
    config: MatcherConfig,
}

impl GeminiRanker {
    pub fn new(config: MatcherConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait]
impl QuestionRanker for GeminiRanker {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn rank(&self, prompt: &str, images: &[Vec<u8>]) -> Result<Vec<RankedPage>, MatchError> {
        if self.config.api_key.is_empty() {
            return Err(MatchError::Provider(
                "No API key configured for the ranking provider".to_string(),
            ));
        }

        let mut parts = vec![serde_json::json!({ "text": prompt })];
        for image in images {
            let encoded = base64::engine::general_purpose::STANDARD.encode(image);
            parts.push(serde_json::json!({
                "inline_data": { "mime_type": "image/png", "data": encoded }
            }));
        }

        let body = serde_json::json!({
            "contents": [{ "parts": parts }]
        });

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MatchError::Timeout(self.config.timeout_secs)
                } else {
                    MatchError::Provider(format!("Request failed: {e}"))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MatchError::Provider(format!(
                "Provider returned {status}: {body}"
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| MatchError::MalformedResponse(format!("Invalid JSON body: {e}")))?;

        let text = payload["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| {
                MatchError::MalformedResponse("Response carries no candidate text".to_string())
            })?;

        tracing::debug!(chars = text.len(), "Ranking provider responded");
        parse_ranked_response(text)
    }
}

/// Fixed-response ranker for tests and offline development
pub struct StaticRanker {
    pub pages: Vec<RankedPage>,
}

#[async_trait]
impl QuestionRanker for StaticRanker {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn rank(&self, _prompt: &str, _images: &[Vec<u8>]) -> Result<Vec<RankedPage>, MatchError> {
        Ok(self.pages.clone())
    }
}

/// Parse the provider's answer text into ranked pages.
///
/// Models routinely wrap JSON in markdown fences despite instructions, so
/// fences are stripped first. The top level must be a JSON array; entries
/// that do not match the expected shape are dropped with a warning rather
/// than trusted.
pub fn parse_ranked_response(text: &str) -> Result<Vec<RankedPage>, MatchError> {
    let cleaned = strip_code_fences(text);

    let values: Vec<serde_json::Value> = serde_json::from_str(cleaned.trim())
        .map_err(|e| MatchError::MalformedResponse(format!("Expected a JSON array: {e}")))?;

    let mut pages = Vec::with_capacity(values.len());
    for value in values {
        match serde_json::from_value::<RankedPage>(value.clone()) {
            Ok(page) => pages.push(page),
            Err(e) => {
                tracing::warn!(error = %e, entry = %value, "Dropping malformed ranking entry");
            }
        }
    }
    Ok(pages)
}

fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "")
}
