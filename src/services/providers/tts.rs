use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::services::providers::retry::RetryPolicy;
use crate::services::providers::{ProviderError, SpeechSynthesizer};

const DEFAULT_API_ENDPOINT: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "tts-1";
const DEFAULT_TIMEOUT_MS: u64 = 60_000;

#[derive(Debug, Clone)]
pub struct TtsConfig {
    pub api_key: Option<String>,
    pub api_endpoint: String,
    pub model: String,
    pub timeout: Duration,
}

/// Text-to-speech over an OpenAI-style `/audio/speech` endpoint. Synthesized
/// mp3 bytes land in a uuid-named file under `temp_dir`.
#[derive(Clone)]
pub struct TtsProvider {
    config: TtsConfig,
    client: reqwest::Client,
    retry: RetryPolicy,
    temp_dir: PathBuf,
}

impl TtsProvider {
    pub fn from_env(temp_dir: &Path) -> Self {
        let api_key = env_string("TTS_API_KEY");
        let api_endpoint = env_string("TTS_API_ENDPOINT")
            .unwrap_or_else(|| DEFAULT_API_ENDPOINT.to_string());
        let model = env_string("TTS_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let timeout = Duration::from_millis(env_u64("TTS_TIMEOUT").unwrap_or(DEFAULT_TIMEOUT_MS));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            config: TtsConfig {
                api_key,
                api_endpoint,
                model,
                timeout,
            },
            client,
            retry: RetryPolicy::default(),
            temp_dir: temp_dir.to_path_buf(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for TtsProvider {
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        speed: f64,
    ) -> Result<PathBuf, ProviderError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or(ProviderError::NotConfigured("TTS_API_KEY"))?;

        let url = format!(
            "{}/audio/speech",
            self.config.api_endpoint.trim_end_matches('/')
        );
        let payload = serde_json::json!({
            "model": self.config.model,
            "input": text,
            "voice": voice,
            "speed": speed,
            "response_format": "mp3",
        });

        let resp = self
            .retry
            .send("tts.synthesize", || {
                self.client.post(&url).bearer_auth(api_key).json(&payload).send()
            })
            .await?;

        let bytes = resp.bytes().await.map_err(ProviderError::Request)?;

        tokio::fs::create_dir_all(&self.temp_dir).await?;
        let out_path = self.temp_dir.join(format!("tts_{}.mp3", Uuid::new_v4()));
        tokio::fs::write(&out_path, &bytes).await?;
        Ok(out_path)
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_u64(key: &str) -> Option<u64> {
    env_string(key)?.parse().ok()
}
