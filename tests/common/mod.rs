#![allow(dead_code)]

use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;

use talklab_backend_rust::db::Database;
use talklab_backend_rust::services::providers::{
    ObjectStorage, PhoneScoreEntry, PronunciationScorer, ProviderError, ScoringResponse,
    SpeechSynthesizer, SyllableScoreEntry, Transcriber, UploadOptions, UploadedAudio,
    WordScoreEntry,
};
use talklab_backend_rust::state::{AppState, ProviderSet};

#[derive(Default)]
pub struct FakeStorage {
    pub uploads: Mutex<Vec<String>>,
    pub deletes: Mutex<Vec<String>>,
    pub fail_upload: AtomicBool,
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn upload(
        &self,
        local_path: &Path,
        opts: &UploadOptions,
    ) -> Result<UploadedAudio, ProviderError> {
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(ProviderError::Rejected("storage down".into()));
        }
        let bytes = tokio::fs::read(local_path).await?;
        let public_id = format!("{}/{}", opts.folder, opts.public_id);
        self.uploads.lock().unwrap().push(public_id.clone());
        Ok(UploadedAudio {
            url: format!("http://cdn.test/{public_id}.webm"),
            secure_url: format!("https://cdn.test/{public_id}.webm"),
            public_id,
            format: "webm".to_string(),
            duration: 3.2,
            bytes: bytes.len() as u64,
        })
    }

    async fn download(&self, _url: &str, dest: &Path) -> Result<(), ProviderError> {
        tokio::fs::write(dest, b"transcoded-mp3").await?;
        Ok(())
    }

    async fn delete(&self, public_id: &str) -> Result<(), ProviderError> {
        self.deletes.lock().unwrap().push(public_id.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeTts {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
    pub delay_ms: AtomicUsize,
}

#[async_trait]
impl SpeechSynthesizer for FakeTts {
    async fn synthesize(
        &self,
        _text: &str,
        _voice: &str,
        _speed: f64,
    ) -> Result<PathBuf, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay as u64)).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProviderError::Rejected("tts down".into()));
        }
        let file = tempfile::NamedTempFile::new()?;
        let path = file
            .into_temp_path()
            .keep()
            .map_err(|e| ProviderError::Io(e.error))?;
        tokio::fs::write(&path, b"fake-mp3").await?;
        Ok(path)
    }
}

#[derive(Default)]
pub struct FakeScorer {
    pub fail: AtomicBool,
}

#[async_trait]
impl PronunciationScorer for FakeScorer {
    async fn score(
        &self,
        _audio_path: &Path,
        reference_text: &str,
        _user_id: &str,
    ) -> Result<ScoringResponse, ProviderError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProviderError::Rejected("scoring down".into()));
        }
        let word_score_list = reference_text
            .split_whitespace()
            .enumerate()
            .map(|(i, word)| WordScoreEntry {
                word: word.to_string(),
                quality_score: 85.0,
                syllable_score_list: vec![SyllableScoreEntry {
                    extent: Some([i as f64 * 600.0, i as f64 * 600.0 + 500.0]),
                    quality_score: 85.0,
                }],
                phone_score_list: vec![PhoneScoreEntry {
                    phone: "ah".to_string(),
                    sound_most_like: None,
                    quality_score: 82.0,
                    stress_level: None,
                }],
            })
            .collect();
        Ok(ScoringResponse {
            quality_score: 86.5,
            fluency_score: Some(90.0),
            pronunciation_score: Some(84.0),
            word_score_list,
        })
    }
}

#[derive(Default)]
pub struct FakeTranscriber {
    pub fail: AtomicBool,
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(
        &self,
        _audio_path: &Path,
        _language_hint: &str,
    ) -> Result<String, ProviderError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProviderError::Rejected("transcription down".into()));
        }
        Ok("i like to travel around the world".to_string())
    }
}

pub struct TestContext {
    pub app: Router,
    pub storage: Arc<FakeStorage>,
    pub tts: Arc<FakeTts>,
    pub scorer: Arc<FakeScorer>,
    pub transcriber: Arc<FakeTranscriber>,
}

pub async fn create_test_app() -> TestContext {
    let db = Database::open_in_memory()
        .await
        .expect("in-memory db init failed");

    let storage = Arc::new(FakeStorage::default());
    let tts = Arc::new(FakeTts::default());
    let scorer = Arc::new(FakeScorer::default());
    let transcriber = Arc::new(FakeTranscriber::default());

    let providers = ProviderSet {
        storage: storage.clone(),
        tts: tts.clone(),
        scorer: scorer.clone(),
        transcriber: transcriber.clone(),
    };

    let state = AppState::new(db, providers, std::env::temp_dir());
    TestContext {
        app: talklab_backend_rust::build_app(state),
        storage,
        tts,
        scorer,
        transcriber,
    }
}

pub const MULTIPART_BOUNDARY: &str = "talklab-test-boundary";

/// Builds a multipart/form-data body with the given text fields and one
/// audio file part.
pub fn multipart_body(fields: &[(&str, &str)], audio: Option<&[u8]>) -> Vec<u8> {
    let b = MULTIPART_BOUNDARY;
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{b}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                .as_bytes(),
        );
    }
    if let Some(bytes) = audio {
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"audio\"; filename=\"rec.webm\"\r\nContent-Type: audio/webm\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{b}--\r\n").as_bytes());
    body
}
