pub mod retry;
pub mod scoring;
pub mod storage;
pub mod transcribe;
pub mod tts;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider not configured: {0}")]
    NotConfigured(&'static str),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("JSON decode failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("provider rejected request: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub folder: String,
    pub public_id: String,
}

/// Durable blob metadata as reported by the storage provider.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadedAudio {
    pub url: String,
    pub secure_url: String,
    pub public_id: String,
    pub format: String,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub bytes: u64,
}

/// Blob storage boundary: durable upload/download/delete of audio files.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(
        &self,
        local_path: &Path,
        opts: &UploadOptions,
    ) -> Result<UploadedAudio, ProviderError>;

    async fn download(&self, url: &str, dest: &Path) -> Result<(), ProviderError>;

    async fn delete(&self, public_id: &str) -> Result<(), ProviderError>;
}

/// Text-to-speech boundary: synthesizes `text` into a local audio file.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        speed: f64,
    ) -> Result<PathBuf, ProviderError>;
}

/// Pronunciation scoring boundary. Scores are 0-100 as the provider reports
/// them; timing extents are in milliseconds.
#[async_trait]
pub trait PronunciationScorer: Send + Sync {
    async fn score(
        &self,
        audio_path: &Path,
        reference_text: &str,
        user_id: &str,
    ) -> Result<ScoringResponse, ProviderError>;
}

/// Speech-to-text boundary, used as the transcript source for a session.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        audio_path: &Path,
        language_hint: &str,
    ) -> Result<String, ProviderError>;
}

/// Wire shape of one scoring result, kept close to the provider response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoringResponse {
    pub quality_score: f64,
    pub fluency_score: Option<f64>,
    pub pronunciation_score: Option<f64>,
    #[serde(default)]
    pub word_score_list: Vec<WordScoreEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WordScoreEntry {
    pub word: String,
    pub quality_score: f64,
    #[serde(default)]
    pub syllable_score_list: Vec<SyllableScoreEntry>,
    #[serde(default)]
    pub phone_score_list: Vec<PhoneScoreEntry>,
}

/// One syllable timing entry; `extent` is [start_ms, end_ms].
#[derive(Debug, Clone, Deserialize)]
pub struct SyllableScoreEntry {
    pub extent: Option<[f64; 2]>,
    #[serde(default)]
    pub quality_score: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhoneScoreEntry {
    pub phone: String,
    pub sound_most_like: Option<String>,
    pub quality_score: f64,
    pub stress_level: Option<i64>,
}
