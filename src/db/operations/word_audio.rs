use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

use crate::db::operations::STATUS_READY;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordAudioRecord {
    pub word: String,
    pub audio_url: Option<String>,
    pub audio_public_id: Option<String>,
    pub duration: f64,
    pub voice: String,
    pub format: String,
    pub times_used: i64,
    pub status: String,
    pub generated_at: Option<String>,
    pub claimed_at: String,
}

impl WordAudioRecord {
    pub fn is_ready(&self) -> bool {
        self.status == STATUS_READY && self.audio_url.is_some()
    }
}

pub async fn get(pool: &SqlitePool, word: &str) -> Result<Option<WordAudioRecord>, sqlx::Error> {
    let row = sqlx::query(r#"SELECT * FROM "word_audio" WHERE "word" = ? LIMIT 1"#)
        .bind(word)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| map_record(&r)))
}

/// Atomic insert-if-absent of a pending claim row for `word` (already
/// normalized by the caller). Returns true when this caller won the claim.
pub async fn try_claim(pool: &SqlitePool, word: &str, voice: &str) -> Result<bool, sqlx::Error> {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO "word_audio" ("word", "voice", "status", "claimedAt")
        VALUES (?, ?, 'pending', ?)
        "#,
    )
    .bind(word)
    .bind(voice)
    .bind(&now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn mark_ready(
    pool: &SqlitePool,
    word: &str,
    audio_url: &str,
    audio_public_id: &str,
    duration: f64,
    format: &str,
) -> Result<(), sqlx::Error> {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    sqlx::query(
        r#"
        UPDATE "word_audio"
        SET "audioUrl" = ?, "audioPublicId" = ?, "duration" = ?, "format" = ?,
            "status" = 'ready', "generatedAt" = ?
        WHERE "word" = ?
        "#,
    )
    .bind(audio_url)
    .bind(audio_public_id)
    .bind(duration)
    .bind(format)
    .bind(&now)
    .bind(word)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn release_claim(pool: &SqlitePool, word: &str) -> Result<(), sqlx::Error> {
    sqlx::query(r#"DELETE FROM "word_audio" WHERE "word" = ? AND "status" = 'pending'"#)
        .bind(word)
        .execute(pool)
        .await?;
    Ok(())
}

/// Cache-hit bookkeeping. Monotonic, atomic in SQLite.
pub async fn increment_times_used(pool: &SqlitePool, word: &str) -> Result<(), sqlx::Error> {
    sqlx::query(r#"UPDATE "word_audio" SET "timesUsed" = "timesUsed" + 1 WHERE "word" = ?"#)
        .bind(word)
        .execute(pool)
        .await?;
    Ok(())
}

fn map_record(row: &sqlx::sqlite::SqliteRow) -> WordAudioRecord {
    WordAudioRecord {
        word: row.try_get("word").unwrap_or_default(),
        audio_url: row.try_get("audioUrl").ok(),
        audio_public_id: row.try_get("audioPublicId").ok(),
        duration: row.try_get("duration").unwrap_or(0.0),
        voice: row.try_get("voice").unwrap_or_default(),
        format: row.try_get("format").unwrap_or_default(),
        times_used: row.try_get("timesUsed").unwrap_or(0),
        status: row.try_get("status").unwrap_or_default(),
        generated_at: row.try_get("generatedAt").ok(),
        claimed_at: row.try_get("claimedAt").unwrap_or_default(),
    }
}
