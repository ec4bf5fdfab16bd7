use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::services::providers::{
    ObjectStorage, ProviderError, SpeechSynthesizer, UploadOptions, UploadedAudio,
};

pub const DEFAULT_VOICE: &str = "alloy";
pub const AUDIO_FORMAT: &str = "mp3";

/// How long a loser of the claim race waits for the winner's row to turn
/// ready, and when an abandoned claim is considered stale.
pub const CLAIM_POLL_ATTEMPTS: usize = 8;
pub const CLAIM_POLL_INTERVAL: Duration = Duration::from_millis(250);
pub const STALE_CLAIM_SECS: i64 = 30;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedAudio {
    pub audio_url: String,
    pub duration: f64,
    pub cached: bool,
}

#[derive(Debug, Error)]
pub enum AudioCacheError {
    #[error("invalid prompt index: {0}")]
    InvalidPromptIndex(i64),
    #[error("invalid word: {0}")]
    InvalidWord(String),
    #[error("audio generation already in progress, retry shortly")]
    GenerationPending,
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// Synthesize `text` and push the result to durable storage. The local TTS
/// output file is removed on every path.
pub async fn synthesize_and_upload(
    tts: &Arc<dyn SpeechSynthesizer>,
    storage: &Arc<dyn ObjectStorage>,
    text: &str,
    voice: &str,
    speed: f64,
    folder: &str,
    public_id: &str,
) -> Result<UploadedAudio, AudioCacheError> {
    let local_path = tts.synthesize(text, voice, speed).await?;

    let opts = UploadOptions {
        folder: folder.to_string(),
        public_id: public_id.to_string(),
    };
    let uploaded = storage.upload(&local_path, &opts).await;

    remove_temp_file(&local_path).await;
    Ok(uploaded?)
}

pub async fn remove_temp_file(path: &Path) {
    if let Err(err) = tokio::fs::remove_file(path).await {
        tracing::debug!(path = %path.display(), error = %err, "temp file cleanup failed");
    }
}

/// True when a pending claim row is old enough to be treated as abandoned
/// (its owner died between claim and mark-ready).
pub fn claim_is_stale(claimed_at: &str) -> bool {
    match DateTime::parse_from_rfc3339(claimed_at) {
        Ok(ts) => (Utc::now() - ts.with_timezone(&Utc)).num_seconds() > STALE_CLAIM_SECS,
        // Unparseable claim timestamps are treated as stale rather than
        // wedging the key forever.
        Err(_) => true,
    }
}
