use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Per-phone quality breakdown, embedded verbatim inside a word score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneScore {
    pub phone: String,
    pub sound_most_like: String,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stress_level: Option<i64>,
}

/// Per-word quality breakdown with timing derived from syllable extents.
/// Times are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordScore {
    pub word: String,
    pub score: f64,
    pub start_time: f64,
    pub end_time: f64,
    pub phone_scores: Vec<PhoneScore>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeSessionRecord {
    pub id: String,
    pub user_id: String,
    pub prompt_index: i64,
    pub user_audio_url: String,
    pub user_audio_public_id: String,
    pub transcript: String,
    pub overall_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fluency_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pronunciation_score: Option<f64>,
    pub word_scores: Vec<WordScore>,
    pub recording_duration: f64,
    pub completed_at: String,
}

pub struct NewPracticeSession {
    pub user_id: String,
    pub prompt_index: i64,
    pub user_audio_url: String,
    pub user_audio_public_id: String,
    pub transcript: String,
    pub overall_score: f64,
    pub fluency_score: Option<f64>,
    pub pronunciation_score: Option<f64>,
    pub word_scores: Vec<WordScore>,
    pub recording_duration: f64,
}

/// Inserts one append-only session row and returns the stored record.
pub async fn insert(
    pool: &SqlitePool,
    session: NewPracticeSession,
) -> Result<PracticeSessionRecord, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let completed_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let word_scores_json =
        serde_json::to_string(&session.word_scores).unwrap_or_else(|_| "[]".to_string());

    sqlx::query(
        r#"
        INSERT INTO "practice_sessions"
            ("id", "userId", "promptIndex", "userAudioUrl", "userAudioPublicId",
             "transcript", "overallScore", "fluencyScore", "pronunciationScore",
             "wordScores", "recordingDuration", "completedAt")
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&session.user_id)
    .bind(session.prompt_index)
    .bind(&session.user_audio_url)
    .bind(&session.user_audio_public_id)
    .bind(&session.transcript)
    .bind(session.overall_score)
    .bind(session.fluency_score)
    .bind(session.pronunciation_score)
    .bind(&word_scores_json)
    .bind(session.recording_duration)
    .bind(&completed_at)
    .execute(pool)
    .await?;

    Ok(PracticeSessionRecord {
        id,
        user_id: session.user_id,
        prompt_index: session.prompt_index,
        user_audio_url: session.user_audio_url,
        user_audio_public_id: session.user_audio_public_id,
        transcript: session.transcript,
        overall_score: session.overall_score,
        fluency_score: session.fluency_score,
        pronunciation_score: session.pronunciation_score,
        word_scores: session.word_scores,
        recording_duration: session.recording_duration,
        completed_at,
    })
}

pub async fn list_recent(
    pool: &SqlitePool,
    user_id: &str,
    limit: i64,
) -> Result<Vec<PracticeSessionRecord>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT * FROM "practice_sessions"
        WHERE "userId" = ?
        ORDER BY "completedAt" DESC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(map_record).collect())
}

pub async fn latest_for_prompt(
    pool: &SqlitePool,
    user_id: &str,
    prompt_index: i64,
) -> Result<Option<PracticeSessionRecord>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT * FROM "practice_sessions"
        WHERE "userId" = ? AND "promptIndex" = ?
        ORDER BY "completedAt" DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(prompt_index)
    .fetch_optional(pool)
    .await?;
    Ok(row.as_ref().map(map_record))
}

pub async fn get_by_id(
    pool: &SqlitePool,
    user_id: &str,
    session_id: &str,
) -> Result<Option<PracticeSessionRecord>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT * FROM "practice_sessions" WHERE "id" = ? AND "userId" = ? LIMIT 1"#,
    )
    .bind(session_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.as_ref().map(map_record))
}

pub async fn list_all_for_user(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Vec<PracticeSessionRecord>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT * FROM "practice_sessions" WHERE "userId" = ? ORDER BY "completedAt" DESC"#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(map_record).collect())
}

fn map_record(row: &sqlx::sqlite::SqliteRow) -> PracticeSessionRecord {
    let word_scores_raw: String = row.try_get("wordScores").unwrap_or_default();
    let word_scores: Vec<WordScore> = serde_json::from_str(&word_scores_raw).unwrap_or_default();

    PracticeSessionRecord {
        id: row.try_get("id").unwrap_or_default(),
        user_id: row.try_get("userId").unwrap_or_default(),
        prompt_index: row.try_get("promptIndex").unwrap_or(0),
        user_audio_url: row.try_get("userAudioUrl").unwrap_or_default(),
        user_audio_public_id: row.try_get("userAudioPublicId").unwrap_or_default(),
        transcript: row.try_get("transcript").unwrap_or_default(),
        overall_score: row.try_get("overallScore").unwrap_or(0.0),
        fluency_score: row.try_get("fluencyScore").ok(),
        pronunciation_score: row.try_get("pronunciationScore").ok(),
        word_scores,
        recording_duration: row.try_get("recordingDuration").unwrap_or(0.0),
        completed_at: row.try_get("completedAt").unwrap_or_default(),
    }
}
