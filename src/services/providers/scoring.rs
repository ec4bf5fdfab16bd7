use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::services::providers::retry::RetryPolicy;
use crate::services::providers::{ProviderError, PronunciationScorer, ScoringResponse};

const DEFAULT_API_URL: &str = "https://api.speechace.co/api/scoring/text/v9/json";
const DEFAULT_DIALECT: &str = "en-us";
const DEFAULT_TIMEOUT_MS: u64 = 120_000;

#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub dialect: String,
    pub timeout: Duration,
}

/// Outer envelope of the scoring provider response; the interesting part is
/// `text_score`.
#[derive(Debug, Deserialize)]
struct ScoringEnvelope {
    status: String,
    text_score: Option<ScoringResponse>,
    detail_message: Option<String>,
}

/// Pronunciation scoring over a Speechace-style endpoint. The provider
/// authenticates with the API key as a URL query parameter.
#[derive(Clone)]
pub struct ScoringProvider {
    config: ScoringConfig,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl ScoringProvider {
    pub fn from_env() -> Self {
        let api_url =
            env_string("SCORING_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_key = env_string("SCORING_API_KEY");
        let dialect = env_string("SCORING_DIALECT").unwrap_or_else(|| DEFAULT_DIALECT.to_string());
        let timeout =
            Duration::from_millis(env_u64("SCORING_TIMEOUT").unwrap_or(DEFAULT_TIMEOUT_MS));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            config: ScoringConfig {
                api_url,
                api_key,
                dialect,
                timeout,
            },
            client,
            retry: RetryPolicy::default(),
        }
    }
}

#[async_trait]
impl PronunciationScorer for ScoringProvider {
    async fn score(
        &self,
        audio_path: &Path,
        reference_text: &str,
        user_id: &str,
    ) -> Result<ScoringResponse, ProviderError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or(ProviderError::NotConfigured("SCORING_API_KEY"))?;

        let file_name = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "recording.mp3".to_string());
        let bytes = tokio::fs::read(audio_path).await?;

        let resp = self
            .retry
            .send("scoring.score", || {
                let part =
                    reqwest::multipart::Part::bytes(bytes.clone()).file_name(file_name.clone());
                let form = reqwest::multipart::Form::new()
                    .text("text", reference_text.to_string())
                    .part("user_audio_file", part);
                self.client
                    .post(&self.config.api_url)
                    .query(&[
                        ("key", api_key),
                        ("dialect", self.config.dialect.as_str()),
                        ("user_id", user_id),
                    ])
                    .multipart(form)
                    .send()
            })
            .await?;

        let envelope: ScoringEnvelope = resp.json().await.map_err(ProviderError::Request)?;
        if envelope.status != "success" {
            return Err(ProviderError::Rejected(
                envelope
                    .detail_message
                    .unwrap_or_else(|| format!("scoring status {}", envelope.status)),
            ));
        }
        envelope
            .text_score
            .ok_or_else(|| ProviderError::Rejected("scoring response missing text_score".into()))
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_u64(key: &str) -> Option<u64> {
    env_string(key)?.parse().ok()
}
