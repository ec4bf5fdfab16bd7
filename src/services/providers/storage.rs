use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::services::providers::retry::RetryPolicy;
use crate::services::providers::{ObjectStorage, ProviderError, UploadOptions, UploadedAudio};

const DEFAULT_TIMEOUT_MS: u64 = 60_000;

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

/// Cloud blob storage over a Cloudinary-style REST surface: multipart
/// `/upload` returning URL + media metadata, `/destroy` by public id.
#[derive(Clone)]
pub struct CloudStorageProvider {
    config: StorageConfig,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl CloudStorageProvider {
    pub fn from_env() -> Self {
        let api_url = env_string("STORAGE_API_URL");
        let api_key = env_string("STORAGE_API_KEY");
        let timeout =
            Duration::from_millis(env_u64("STORAGE_TIMEOUT").unwrap_or(DEFAULT_TIMEOUT_MS));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            config: StorageConfig {
                api_url,
                api_key,
                timeout,
            },
            client,
            retry: RetryPolicy::default(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.config.api_url.is_some() && self.config.api_key.is_some()
    }

    fn credentials(&self) -> Result<(&str, &str), ProviderError> {
        let url = self
            .config
            .api_url
            .as_deref()
            .ok_or(ProviderError::NotConfigured("STORAGE_API_URL"))?;
        let key = self
            .config
            .api_key
            .as_deref()
            .ok_or(ProviderError::NotConfigured("STORAGE_API_KEY"))?;
        Ok((url.trim_end_matches('/'), key))
    }
}

#[async_trait]
impl ObjectStorage for CloudStorageProvider {
    async fn upload(
        &self,
        local_path: &Path,
        opts: &UploadOptions,
    ) -> Result<UploadedAudio, ProviderError> {
        let (base, key) = self.credentials()?;
        let url = format!("{base}/upload");

        let file_name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());
        let bytes = tokio::fs::read(local_path).await?;

        let resp = self
            .retry
            .send("storage.upload", || {
                let part = reqwest::multipart::Part::bytes(bytes.clone()).file_name(file_name.clone());
                let form = reqwest::multipart::Form::new()
                    .part("file", part)
                    .text("folder", opts.folder.clone())
                    .text("public_id", opts.public_id.clone())
                    .text("resource_type", "video");
                self.client.post(&url).bearer_auth(key).multipart(form).send()
            })
            .await?;

        let uploaded: UploadedAudio = resp.json().await.map_err(ProviderError::Request)?;
        Ok(uploaded)
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<(), ProviderError> {
        let resp = self
            .retry
            .send("storage.download", || self.client.get(url).send())
            .await?;
        let bytes = resp.bytes().await.map_err(ProviderError::Request)?;
        tokio::fs::write(dest, &bytes).await?;
        Ok(())
    }

    async fn delete(&self, public_id: &str) -> Result<(), ProviderError> {
        let (base, key) = self.credentials()?;
        let url = format!("{base}/destroy");
        let payload = serde_json::json!({ "public_id": public_id, "resource_type": "video" });

        self.retry
            .send("storage.delete", || {
                self.client.post(&url).bearer_auth(key).json(&payload).send()
            })
            .await?;
        Ok(())
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_u64(key: &str) -> Option<u64> {
    env_string(key)?.parse().ok()
}
