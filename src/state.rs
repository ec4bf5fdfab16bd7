use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::db::Database;
use crate::services::history::HistoryService;
use crate::services::prompt_audio::PromptAudioService;
use crate::services::pronunciation::PronunciationService;
use crate::services::providers::scoring::ScoringProvider;
use crate::services::providers::storage::CloudStorageProvider;
use crate::services::providers::transcribe::TranscriptionProvider;
use crate::services::providers::tts::TtsProvider;
use crate::services::providers::{
    ObjectStorage, PronunciationScorer, SpeechSynthesizer, Transcriber,
};
use crate::services::word_audio::WordAudioService;

/// The four external boundaries, injected so tests can substitute fakes.
#[derive(Clone)]
pub struct ProviderSet {
    pub storage: Arc<dyn ObjectStorage>,
    pub tts: Arc<dyn SpeechSynthesizer>,
    pub scorer: Arc<dyn PronunciationScorer>,
    pub transcriber: Arc<dyn Transcriber>,
}

impl ProviderSet {
    pub fn from_env(temp_dir: &Path) -> Self {
        Self {
            storage: Arc::new(CloudStorageProvider::from_env()),
            tts: Arc::new(TtsProvider::from_env(temp_dir)),
            scorer: Arc::new(ScoringProvider::from_env()),
            transcriber: Arc::new(TranscriptionProvider::from_env()),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    db: Database,
    prompt_audio: PromptAudioService,
    word_audio: WordAudioService,
    pronunciation: PronunciationService,
    history: HistoryService,
    temp_dir: PathBuf,
}

impl AppState {
    pub fn new(db: Database, providers: ProviderSet, temp_dir: PathBuf) -> Self {
        let prompt_audio = PromptAudioService::new(
            db.clone(),
            Arc::clone(&providers.tts),
            Arc::clone(&providers.storage),
        );
        let word_audio = WordAudioService::new(
            db.clone(),
            Arc::clone(&providers.tts),
            Arc::clone(&providers.storage),
        );
        let pronunciation = PronunciationService::new(
            db.clone(),
            Arc::clone(&providers.storage),
            Arc::clone(&providers.scorer),
            Arc::clone(&providers.transcriber),
            temp_dir.clone(),
        );
        let history = HistoryService::new(db.clone());

        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            db,
            prompt_audio,
            word_audio,
            pronunciation,
            history,
            temp_dir,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn prompt_audio(&self) -> &PromptAudioService {
        &self.prompt_audio
    }

    pub fn word_audio(&self) -> &WordAudioService {
        &self.word_audio
    }

    pub fn pronunciation(&self) -> &PronunciationService {
        &self.pronunciation
    }

    pub fn history(&self) -> &HistoryService {
        &self.history
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }
}
