use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::db::operations::sessions::{self, NewPracticeSession, PhoneScore, WordScore};
use crate::db::Database;
use crate::services::audio_cache::remove_temp_file;
use crate::services::prompts;
use crate::services::providers::{
    ObjectStorage, PronunciationScorer, ProviderError, Transcriber, UploadOptions, WordScoreEntry,
};

const MS_PER_SEC: f64 = 1000.0;

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("invalid prompt index: {0}")]
    InvalidPromptIndex(i64),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringOutcome {
    pub session_id: String,
    pub transcript: String,
    pub overall_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fluency_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pronunciation_score: Option<f64>,
    pub word_scores: Vec<WordScore>,
    pub user_audio_url: String,
    pub recording_duration: f64,
}

/// Sequences one scoring attempt: durable upload, transcoded download,
/// external scoring, transcription (with reference-text fallback), normalize,
/// persist. Any failure after the upload deletes the uploaded blob before the
/// error propagates, so no orphans are left behind.
#[derive(Clone)]
pub struct PronunciationService {
    db: Database,
    storage: Arc<dyn ObjectStorage>,
    scorer: Arc<dyn PronunciationScorer>,
    transcriber: Arc<dyn Transcriber>,
    temp_dir: std::path::PathBuf,
}

impl PronunciationService {
    pub fn new(
        db: Database,
        storage: Arc<dyn ObjectStorage>,
        scorer: Arc<dyn PronunciationScorer>,
        transcriber: Arc<dyn Transcriber>,
        temp_dir: std::path::PathBuf,
    ) -> Self {
        Self {
            db,
            storage,
            scorer,
            transcriber,
            temp_dir,
        }
    }

    pub async fn score_recording(
        &self,
        user_id: &str,
        prompt_index: i64,
        prompt_text: &str,
        audio_path: &Path,
        recording_duration: f64,
    ) -> Result<ScoringOutcome, ScoringError> {
        if !prompts::is_valid_prompt_index(prompt_index) {
            return Err(ScoringError::InvalidPromptIndex(prompt_index));
        }

        let opts = UploadOptions {
            folder: format!("pronunciation/users/{user_id}/prompt_{prompt_index}"),
            // Timestamp alone can collide within one millisecond; the uuid
            // suffix keeps rapid retries from overwriting each other.
            public_id: format!(
                "rec_{}_{}",
                Utc::now().timestamp_millis(),
                Uuid::new_v4().simple()
            ),
        };
        let uploaded = self.storage.upload(audio_path, &opts).await?;

        let result = self
            .finish_attempt(
                user_id,
                prompt_index,
                prompt_text,
                audio_path,
                &uploaded,
                recording_duration,
            )
            .await;

        if result.is_err() {
            // Everything past the durable upload is compensated by deleting
            // the blob, so a retried attempt does not stack duplicate copies.
            if let Err(delete_err) = self.storage.delete(&uploaded.public_id).await {
                tracing::warn!(
                    public_id = %uploaded.public_id,
                    error = %delete_err,
                    "failed to delete uploaded audio after scoring failure"
                );
            }
        }

        result
    }

    async fn finish_attempt(
        &self,
        user_id: &str,
        prompt_index: i64,
        prompt_text: &str,
        audio_path: &Path,
        uploaded: &crate::services::providers::UploadedAudio,
        recording_duration: f64,
    ) -> Result<ScoringOutcome, ScoringError> {
        let (response, transcript) = self
            .score_uploaded(user_id, prompt_index, prompt_text, audio_path, &uploaded.secure_url)
            .await?;

        let word_scores = normalize_word_scores(&response.word_score_list);
        let duration = if recording_duration > 0.0 {
            recording_duration
        } else {
            uploaded.duration
        };

        let record = sessions::insert(
            self.db.pool(),
            NewPracticeSession {
                user_id: user_id.to_string(),
                prompt_index,
                user_audio_url: uploaded.secure_url.clone(),
                user_audio_public_id: uploaded.public_id.clone(),
                transcript: transcript.clone(),
                overall_score: clamp_score(response.quality_score),
                fluency_score: response.fluency_score.map(clamp_score),
                pronunciation_score: response.pronunciation_score.map(clamp_score),
                word_scores: word_scores.clone(),
                recording_duration: duration,
            },
        )
        .await?;

        Ok(ScoringOutcome {
            session_id: record.id,
            transcript,
            overall_score: record.overall_score,
            fluency_score: record.fluency_score,
            pronunciation_score: record.pronunciation_score,
            word_scores,
            user_audio_url: record.user_audio_url,
            recording_duration: record.recording_duration,
        })
    }

    /// Steps 2-4: fetch the scoring-compatible copy, score it, transcribe the
    /// original. Returns the raw scoring response plus the transcript.
    async fn score_uploaded(
        &self,
        user_id: &str,
        prompt_index: i64,
        prompt_text: &str,
        original_path: &Path,
        secure_url: &str,
    ) -> Result<(crate::services::providers::ScoringResponse, String), ScoringError> {
        tokio::fs::create_dir_all(&self.temp_dir)
            .await
            .map_err(ProviderError::Io)?;
        let download_path = self.temp_dir.join(format!("score_{}.mp3", Uuid::new_v4()));

        // The scorer needs mp3/wav; fetch the storage-side transcoded copy.
        let result = async {
            self.storage
                .download(&transcoded_url(secure_url), &download_path)
                .await?;

            let response = self
                .scorer
                .score(&download_path, prompt_text, user_id)
                .await?;

            // Transcription failure degrades to the reference text rather
            // than failing the attempt.
            let transcript = match self.transcriber.transcribe(original_path, "en").await {
                Ok(text) => text,
                Err(err) => {
                    tracing::warn!(
                        prompt_index,
                        error = %err,
                        "transcription failed, falling back to prompt text"
                    );
                    prompt_text.to_string()
                }
            };

            Ok::<_, ScoringError>((response, transcript))
        }
        .await;

        remove_temp_file(&download_path).await;
        result
    }
}

pub fn clamp_score(score: f64) -> f64 {
    score.clamp(0.0, 100.0)
}

/// Maps the provider's per-word breakdown into the stored shape. Word timing
/// comes from the first and last syllable extents (ms converted to seconds);
/// words with no syllable timing get 0.0-0.0.
pub fn normalize_word_scores(entries: &[WordScoreEntry]) -> Vec<WordScore> {
    entries
        .iter()
        .map(|entry| {
            let extents: Vec<[f64; 2]> = entry
                .syllable_score_list
                .iter()
                .filter_map(|s| s.extent)
                .collect();

            let (start_time, end_time) = match (extents.first(), extents.last()) {
                (Some(first), Some(last)) => {
                    let start = (first[0] / MS_PER_SEC).max(0.0);
                    let end = (last[1] / MS_PER_SEC).max(start);
                    (start, end)
                }
                _ => {
                    tracing::warn!(word = %entry.word, "word has no syllable timing");
                    (0.0, 0.0)
                }
            };

            let phone_scores = entry
                .phone_score_list
                .iter()
                .map(|phone| PhoneScore {
                    phone: phone.phone.clone(),
                    sound_most_like: phone
                        .sound_most_like
                        .clone()
                        .unwrap_or_else(|| phone.phone.clone()),
                    score: clamp_score(phone.quality_score),
                    stress_level: phone.stress_level,
                })
                .collect();

            WordScore {
                word: entry.word.clone(),
                score: clamp_score(entry.quality_score),
                start_time,
                end_time,
                phone_scores,
            }
        })
        .collect()
}

/// Rewrites a storage URL so it points at the mp3 rendition of the blob.
pub fn transcoded_url(secure_url: &str) -> String {
    match secure_url.rsplit_once('/') {
        Some((base, last)) if last.contains('.') => {
            let stem = last.rsplit_once('.').map(|(s, _)| s).unwrap_or(last);
            format!("{base}/{stem}.mp3")
        }
        _ => format!("{secure_url}.mp3"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::{PhoneScoreEntry, SyllableScoreEntry};
    use proptest::prelude::*;

    fn entry(word: &str, score: f64, extents: &[[f64; 2]]) -> WordScoreEntry {
        WordScoreEntry {
            word: word.to_string(),
            quality_score: score,
            syllable_score_list: extents
                .iter()
                .map(|e| SyllableScoreEntry {
                    extent: Some(*e),
                    quality_score: score,
                })
                .collect(),
            phone_score_list: Vec::new(),
        }
    }

    #[test]
    fn test_word_timing_from_first_and_last_syllable() {
        let scores = normalize_word_scores(&[entry(
            "travel",
            88.0,
            &[[500.0, 900.0], [900.0, 1400.0]],
        )]);
        assert_eq!(scores.len(), 1);
        assert!((scores[0].start_time - 0.5).abs() < 1e-9);
        assert!((scores[0].end_time - 1.4).abs() < 1e-9);
    }

    #[test]
    fn test_word_without_syllables_gets_zero_timing() {
        let scores = normalize_word_scores(&[entry("uh", 40.0, &[])]);
        assert_eq!(scores[0].start_time, 0.0);
        assert_eq!(scores[0].end_time, 0.0);
    }

    #[test]
    fn test_phone_sound_most_like_falls_back_to_phone() {
        let mut e = entry("so", 70.0, &[[0.0, 300.0]]);
        e.phone_score_list = vec![
            PhoneScoreEntry {
                phone: "s".to_string(),
                sound_most_like: None,
                quality_score: 65.0,
                stress_level: None,
            },
            PhoneScoreEntry {
                phone: "ow".to_string(),
                sound_most_like: Some("oh".to_string()),
                quality_score: 120.0,
                stress_level: Some(1),
            },
        ];
        let scores = normalize_word_scores(&[e]);
        assert_eq!(scores[0].phone_scores[0].sound_most_like, "s");
        assert_eq!(scores[0].phone_scores[1].sound_most_like, "oh");
        // Out-of-range provider scores are clamped.
        assert_eq!(scores[0].phone_scores[1].score, 100.0);
    }

    #[test]
    fn test_transcoded_url_replaces_extension() {
        assert_eq!(
            transcoded_url("https://cdn.example.com/a/b/rec_1.webm"),
            "https://cdn.example.com/a/b/rec_1.mp3"
        );
        assert_eq!(
            transcoded_url("https://cdn.example.com/a/b/rec_1"),
            "https://cdn.example.com/a/b/rec_1.mp3"
        );
    }

    proptest! {
        #[test]
        fn prop_scores_clamped_and_timing_ordered(
            score in -50.0f64..150.0,
            start in 0.0f64..10_000.0,
            len in 0.0f64..5_000.0,
        ) {
            let scores = normalize_word_scores(&[entry(
                "w",
                score,
                &[[start, start + len]],
            )]);
            let ws = &scores[0];
            prop_assert!(ws.score >= 0.0 && ws.score <= 100.0);
            prop_assert!(ws.start_time >= 0.0);
            prop_assert!(ws.start_time <= ws.end_time);
        }
    }
}
