use std::sync::Arc;

use tokio::time::sleep;

use crate::db::operations::word_audio as word_audio_ops;
use crate::db::Database;
use crate::services::audio_cache::{
    claim_is_stale, synthesize_and_upload, AudioCacheError, CachedAudio, AUDIO_FORMAT,
    CLAIM_POLL_ATTEMPTS, CLAIM_POLL_INTERVAL, DEFAULT_VOICE,
};
use crate::services::providers::{ObjectStorage, SpeechSynthesizer};

const WORD_FOLDER: &str = "pronunciation/words";
const WORD_SPEED: f64 = 0.8;
const MAX_WORD_LEN: usize = 64;

/// Normalizes a free-form word to its cache key: lowercased and trimmed.
/// Returns None for input that is empty, too long, or not word-like.
pub fn normalize_word(raw: &str) -> Option<String> {
    let word = raw.trim().to_lowercase();
    if word.is_empty() || word.len() > MAX_WORD_LEN {
        return None;
    }
    if !word.chars().all(|c| c.is_alphabetic() || c == '\'' || c == '-') {
        return None;
    }
    Some(word)
}

/// Read-through cache for single-word audio: one record per normalized word,
/// with a usage counter bumped on every cache hit.
#[derive(Clone)]
pub struct WordAudioService {
    db: Database,
    tts: Arc<dyn SpeechSynthesizer>,
    storage: Arc<dyn ObjectStorage>,
}

impl WordAudioService {
    pub fn new(
        db: Database,
        tts: Arc<dyn SpeechSynthesizer>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        Self { db, tts, storage }
    }

    pub async fn get_or_generate(&self, raw_word: &str) -> Result<CachedAudio, AudioCacheError> {
        let word = normalize_word(raw_word)
            .ok_or_else(|| AudioCacheError::InvalidWord(raw_word.to_string()))?;

        if let Some(record) = word_audio_ops::get(self.db.pool(), &word).await? {
            if record.is_ready() {
                word_audio_ops::increment_times_used(self.db.pool(), &word).await?;
                return Ok(CachedAudio {
                    audio_url: record.audio_url.unwrap_or_default(),
                    duration: record.duration,
                    cached: true,
                });
            }
        }

        let won_claim = word_audio_ops::try_claim(self.db.pool(), &word, DEFAULT_VOICE).await?;

        if won_claim {
            self.generate(&word).await
        } else {
            self.await_winner(&word).await
        }
    }

    async fn generate(&self, word: &str) -> Result<CachedAudio, AudioCacheError> {
        let public_id = format!("word_{word}");
        let result = synthesize_and_upload(
            &self.tts,
            &self.storage,
            word,
            DEFAULT_VOICE,
            WORD_SPEED,
            WORD_FOLDER,
            &public_id,
        )
        .await;

        let uploaded = match result {
            Ok(uploaded) => uploaded,
            Err(err) => {
                if let Err(release_err) =
                    word_audio_ops::release_claim(self.db.pool(), word).await
                {
                    tracing::warn!(word, error = %release_err, "failed to release claim");
                }
                return Err(err);
            }
        };

        if let Err(err) = word_audio_ops::mark_ready(
            self.db.pool(),
            word,
            &uploaded.secure_url,
            &uploaded.public_id,
            uploaded.duration,
            AUDIO_FORMAT,
        )
        .await
        {
            if let Err(delete_err) = self.storage.delete(&uploaded.public_id).await {
                tracing::warn!(error = %delete_err, "orphaned word audio cleanup failed");
            }
            if let Err(release_err) = word_audio_ops::release_claim(self.db.pool(), word).await {
                tracing::warn!(word, error = %release_err, "failed to release claim");
            }
            return Err(err.into());
        }

        tracing::info!(word, url = %uploaded.secure_url, "word audio generated");
        Ok(CachedAudio {
            audio_url: uploaded.secure_url,
            duration: uploaded.duration,
            cached: false,
        })
    }

    async fn await_winner(&self, word: &str) -> Result<CachedAudio, AudioCacheError> {
        for _ in 0..CLAIM_POLL_ATTEMPTS {
            sleep(CLAIM_POLL_INTERVAL).await;
            if let Some(record) = word_audio_ops::get(self.db.pool(), word).await? {
                if record.is_ready() {
                    word_audio_ops::increment_times_used(self.db.pool(), word).await?;
                    return Ok(CachedAudio {
                        audio_url: record.audio_url.unwrap_or_default(),
                        duration: record.duration,
                        cached: true,
                    });
                }
            } else {
                return Err(AudioCacheError::GenerationPending);
            }
        }

        if let Some(record) = word_audio_ops::get(self.db.pool(), word).await? {
            if !record.is_ready() && claim_is_stale(&record.claimed_at) {
                word_audio_ops::release_claim(self.db.pool(), word).await?;
            }
        }
        Err(AudioCacheError::GenerationPending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lowercases_and_trims() {
        assert_eq!(normalize_word("  Hello "), Some("hello".to_string()));
        assert_eq!(normalize_word("WORLD"), Some("world".to_string()));
    }

    #[test]
    fn test_normalize_keeps_apostrophes_and_hyphens() {
        assert_eq!(normalize_word("don't"), Some("don't".to_string()));
        assert_eq!(normalize_word("well-known"), Some("well-known".to_string()));
    }

    #[test]
    fn test_normalize_rejects_bad_input() {
        assert_eq!(normalize_word(""), None);
        assert_eq!(normalize_word("   "), None);
        assert_eq!(normalize_word("two words"), None);
        assert_eq!(normalize_word("abc123"), None);
        assert_eq!(normalize_word(&"x".repeat(65)), None);
    }
}
