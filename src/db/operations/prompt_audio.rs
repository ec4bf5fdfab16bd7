use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

use crate::db::operations::STATUS_READY;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptAudioRecord {
    pub prompt_index: i64,
    pub prompt_text: String,
    pub audio_url: Option<String>,
    pub audio_public_id: Option<String>,
    pub duration: f64,
    pub voice: String,
    pub format: String,
    pub status: String,
    pub generated_at: Option<String>,
    pub claimed_at: String,
}

impl PromptAudioRecord {
    pub fn is_ready(&self) -> bool {
        self.status == STATUS_READY && self.audio_url.is_some()
    }
}

pub async fn get(
    pool: &SqlitePool,
    prompt_index: i64,
) -> Result<Option<PromptAudioRecord>, sqlx::Error> {
    let row = sqlx::query(r#"SELECT * FROM "prompt_audio" WHERE "promptIndex" = ? LIMIT 1"#)
        .bind(prompt_index)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| map_record(&r)))
}

/// Atomic insert-if-absent of a pending claim row. Returns true when this
/// caller won the claim, false when a row (pending or ready) already exists.
pub async fn try_claim(
    pool: &SqlitePool,
    prompt_index: i64,
    prompt_text: &str,
    voice: &str,
) -> Result<bool, sqlx::Error> {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO "prompt_audio"
            ("promptIndex", "promptText", "voice", "status", "claimedAt")
        VALUES (?, ?, ?, 'pending', ?)
        "#,
    )
    .bind(prompt_index)
    .bind(prompt_text)
    .bind(voice)
    .bind(&now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn mark_ready(
    pool: &SqlitePool,
    prompt_index: i64,
    audio_url: &str,
    audio_public_id: &str,
    duration: f64,
    format: &str,
) -> Result<(), sqlx::Error> {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    sqlx::query(
        r#"
        UPDATE "prompt_audio"
        SET "audioUrl" = ?, "audioPublicId" = ?, "duration" = ?, "format" = ?,
            "status" = 'ready', "generatedAt" = ?
        WHERE "promptIndex" = ?
        "#,
    )
    .bind(audio_url)
    .bind(audio_public_id)
    .bind(duration)
    .bind(format)
    .bind(&now)
    .bind(prompt_index)
    .execute(pool)
    .await?;
    Ok(())
}

/// Removes a claim that never completed so a later request can retry.
pub async fn release_claim(pool: &SqlitePool, prompt_index: i64) -> Result<(), sqlx::Error> {
    sqlx::query(r#"DELETE FROM "prompt_audio" WHERE "promptIndex" = ? AND "status" = 'pending'"#)
        .bind(prompt_index)
        .execute(pool)
        .await?;
    Ok(())
}

fn map_record(row: &sqlx::sqlite::SqliteRow) -> PromptAudioRecord {
    PromptAudioRecord {
        prompt_index: row.try_get("promptIndex").unwrap_or(0),
        prompt_text: row.try_get("promptText").unwrap_or_default(),
        audio_url: row.try_get("audioUrl").ok(),
        audio_public_id: row.try_get("audioPublicId").ok(),
        duration: row.try_get("duration").unwrap_or(0.0),
        voice: row.try_get("voice").unwrap_or_default(),
        format: row.try_get("format").unwrap_or_default(),
        status: row.try_get("status").unwrap_or_default(),
        generated_at: row.try_get("generatedAt").ok(),
        claimed_at: row.try_get("claimedAt").unwrap_or_default(),
    }
}
