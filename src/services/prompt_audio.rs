use std::sync::Arc;

use tokio::time::sleep;

use crate::db::operations::prompt_audio as prompt_audio_ops;
use crate::db::Database;
use crate::services::audio_cache::{
    claim_is_stale, synthesize_and_upload, AudioCacheError, CachedAudio, AUDIO_FORMAT,
    CLAIM_POLL_ATTEMPTS, CLAIM_POLL_INTERVAL, DEFAULT_VOICE,
};
use crate::services::prompts;
use crate::services::providers::{ObjectStorage, SpeechSynthesizer};

const PROMPT_FOLDER: &str = "pronunciation/prompts";
const PROMPT_SPEED: f64 = 0.9;

/// Read-through cache for prompt reference audio: one immutable record per
/// prompt index, generated lazily on first request.
#[derive(Clone)]
pub struct PromptAudioService {
    db: Database,
    tts: Arc<dyn SpeechSynthesizer>,
    storage: Arc<dyn ObjectStorage>,
}

impl PromptAudioService {
    pub fn new(
        db: Database,
        tts: Arc<dyn SpeechSynthesizer>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        Self { db, tts, storage }
    }

    pub async fn get_or_generate(
        &self,
        prompt_index: i64,
        prompt_text: &str,
    ) -> Result<CachedAudio, AudioCacheError> {
        if !prompts::is_valid_prompt_index(prompt_index) {
            return Err(AudioCacheError::InvalidPromptIndex(prompt_index));
        }

        if let Some(record) = prompt_audio_ops::get(self.db.pool(), prompt_index).await? {
            if record.is_ready() {
                return Ok(CachedAudio {
                    audio_url: record.audio_url.unwrap_or_default(),
                    duration: record.duration,
                    cached: true,
                });
            }
        }

        let won_claim =
            prompt_audio_ops::try_claim(self.db.pool(), prompt_index, prompt_text, DEFAULT_VOICE)
                .await?;

        if won_claim {
            self.generate(prompt_index, prompt_text).await
        } else {
            self.await_winner(prompt_index).await
        }
    }

    async fn generate(
        &self,
        prompt_index: i64,
        prompt_text: &str,
    ) -> Result<CachedAudio, AudioCacheError> {
        let public_id = format!("prompt_{prompt_index}");
        let result = synthesize_and_upload(
            &self.tts,
            &self.storage,
            prompt_text,
            DEFAULT_VOICE,
            PROMPT_SPEED,
            PROMPT_FOLDER,
            &public_id,
        )
        .await;

        let uploaded = match result {
            Ok(uploaded) => uploaded,
            Err(err) => {
                // Give the key back so a later request can retry.
                if let Err(release_err) =
                    prompt_audio_ops::release_claim(self.db.pool(), prompt_index).await
                {
                    tracing::warn!(prompt_index, error = %release_err, "failed to release claim");
                }
                return Err(err);
            }
        };

        if let Err(err) = prompt_audio_ops::mark_ready(
            self.db.pool(),
            prompt_index,
            &uploaded.secure_url,
            &uploaded.public_id,
            uploaded.duration,
            AUDIO_FORMAT,
        )
        .await
        {
            if let Err(delete_err) = self.storage.delete(&uploaded.public_id).await {
                tracing::warn!(error = %delete_err, "orphaned prompt audio cleanup failed");
            }
            if let Err(release_err) =
                prompt_audio_ops::release_claim(self.db.pool(), prompt_index).await
            {
                tracing::warn!(prompt_index, error = %release_err, "failed to release claim");
            }
            return Err(err.into());
        }

        tracing::info!(prompt_index, url = %uploaded.secure_url, "prompt audio generated");
        Ok(CachedAudio {
            audio_url: uploaded.secure_url,
            duration: uploaded.duration,
            cached: false,
        })
    }

    /// Lost the claim race: wait for the winner's row, bounded.
    async fn await_winner(&self, prompt_index: i64) -> Result<CachedAudio, AudioCacheError> {
        for _ in 0..CLAIM_POLL_ATTEMPTS {
            sleep(CLAIM_POLL_INTERVAL).await;
            if let Some(record) = prompt_audio_ops::get(self.db.pool(), prompt_index).await? {
                if record.is_ready() {
                    return Ok(CachedAudio {
                        audio_url: record.audio_url.unwrap_or_default(),
                        duration: record.duration,
                        cached: true,
                    });
                }
            } else {
                // Winner failed and released; let the caller retry the flow.
                return Err(AudioCacheError::GenerationPending);
            }
        }

        if let Some(record) = prompt_audio_ops::get(self.db.pool(), prompt_index).await? {
            if !record.is_ready() && claim_is_stale(&record.claimed_at) {
                prompt_audio_ops::release_claim(self.db.pool(), prompt_index).await?;
            }
        }
        Err(AudioCacheError::GenerationPending)
    }
}
