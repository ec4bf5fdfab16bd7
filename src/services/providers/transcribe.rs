use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::services::providers::retry::RetryPolicy;
use crate::services::providers::{ProviderError, Transcriber};

const DEFAULT_API_ENDPOINT: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "whisper-1";
const DEFAULT_TIMEOUT_MS: u64 = 120_000;

#[derive(Debug, Clone)]
pub struct TranscribeConfig {
    pub api_key: Option<String>,
    pub api_endpoint: String,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct TranscriptionBody {
    text: String,
}

/// Speech-to-text over a Whisper-style `/audio/transcriptions` endpoint.
#[derive(Clone)]
pub struct TranscriptionProvider {
    config: TranscribeConfig,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl TranscriptionProvider {
    pub fn from_env() -> Self {
        let api_key = env_string("TRANSCRIBE_API_KEY");
        let api_endpoint = env_string("TRANSCRIBE_API_ENDPOINT")
            .unwrap_or_else(|| DEFAULT_API_ENDPOINT.to_string());
        let model = env_string("TRANSCRIBE_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let timeout =
            Duration::from_millis(env_u64("TRANSCRIBE_TIMEOUT").unwrap_or(DEFAULT_TIMEOUT_MS));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            config: TranscribeConfig {
                api_key,
                api_endpoint,
                model,
                timeout,
            },
            client,
            retry: RetryPolicy::default(),
        }
    }
}

#[async_trait]
impl Transcriber for TranscriptionProvider {
    async fn transcribe(
        &self,
        audio_path: &Path,
        language_hint: &str,
    ) -> Result<String, ProviderError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or(ProviderError::NotConfigured("TRANSCRIBE_API_KEY"))?;

        let url = format!(
            "{}/audio/transcriptions",
            self.config.api_endpoint.trim_end_matches('/')
        );
        let file_name = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "recording.webm".to_string());
        let bytes = tokio::fs::read(audio_path).await?;

        let resp = self
            .retry
            .send("transcribe.transcribe", || {
                let part =
                    reqwest::multipart::Part::bytes(bytes.clone()).file_name(file_name.clone());
                let form = reqwest::multipart::Form::new()
                    .part("file", part)
                    .text("model", self.config.model.clone())
                    .text("language", language_hint.to_string())
                    .text("response_format", "json");
                self.client.post(&url).bearer_auth(api_key).multipart(form).send()
            })
            .await?;

        let body: TranscriptionBody = resp.json().await.map_err(ProviderError::Request)?;
        Ok(body.text)
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_u64(key: &str) -> Option<u64> {
    env_string(key)?.parse().ok()
}
