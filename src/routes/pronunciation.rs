use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::response::{ApiResponse, AppError};
use crate::services::audio_cache::{remove_temp_file, AudioCacheError};
use crate::services::prompts;
use crate::services::pronunciation::ScoringError;
use crate::services::providers::ProviderError;
use crate::state::AppState;

const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/score", post(score))
        .route("/prompt-audio/:prompt_index", get(prompt_audio))
        .route("/word-audio/:word", get(word_audio))
        .route("/history", get(history))
        .route("/latest-session/:prompt_index", get(latest_session))
        .route("/session/:session_id", get(session_detail))
        .route("/stats", get(stats))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

fn require_user_id(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::unauthorized("missing x-user-id header"))
}

async fn score(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let user_id = match require_user_id(&headers) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };

    let mut audio: Option<(String, Vec<u8>)> = None;
    let mut prompt_index_raw: Option<String> = None;
    let mut prompt_text: Option<String> = None;
    let mut duration: f64 = 0.0;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                return AppError::bad_request(format!("invalid multipart body: {err}"))
                    .into_response()
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "audio" => {
                let file_name = field.file_name().unwrap_or("recording.webm").to_string();
                match field.bytes().await {
                    Ok(bytes) => audio = Some((file_name, bytes.to_vec())),
                    Err(err) => {
                        return AppError::bad_request(format!("failed to read audio: {err}"))
                            .into_response()
                    }
                }
            }
            "promptIndex" => {
                prompt_index_raw = field.text().await.ok().map(|v| v.trim().to_string());
            }
            "promptText" => {
                prompt_text = field.text().await.ok().filter(|v| !v.trim().is_empty());
            }
            "duration" => {
                duration = field
                    .text()
                    .await
                    .ok()
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(0.0);
            }
            _ => {}
        }
    }

    let Some((file_name, bytes)) = audio else {
        return AppError::validation("audio file is required").into_response();
    };
    if bytes.is_empty() {
        return AppError::validation("audio file is empty").into_response();
    }
    let Some(prompt_index_raw) = prompt_index_raw else {
        return AppError::validation("promptIndex is required").into_response();
    };
    let Ok(prompt_index) = prompt_index_raw.parse::<i64>() else {
        return AppError::validation(format!(
            "promptIndex must be an integer, got {prompt_index_raw:?}"
        ))
        .into_response();
    };
    let Some(prompt_text) = prompt_text.or_else(|| prompts::prompt_text(prompt_index).map(String::from))
    else {
        return AppError::validation(format!(
            "promptIndex must be between 0 and {}, got {prompt_index}",
            prompts::PROMPT_COUNT - 1
        ))
        .into_response();
    };

    // Spool the upload to a local file; the scoring flow works on paths.
    let ext = std::path::Path::new(&file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("webm");
    let local_path = state
        .temp_dir()
        .join(format!("upload_{}.{ext}", Uuid::new_v4()));
    if let Err(err) = tokio::fs::create_dir_all(state.temp_dir()).await {
        tracing::error!(error = %err, "failed to create temp dir");
        return AppError::internal("failed to store upload").into_response();
    }
    if let Err(err) = tokio::fs::write(&local_path, &bytes).await {
        tracing::error!(error = %err, "failed to spool upload");
        return AppError::internal("failed to store upload").into_response();
    }

    let result = state
        .pronunciation()
        .score_recording(&user_id, prompt_index, &prompt_text, &local_path, duration)
        .await;

    remove_temp_file(&local_path).await;

    match result {
        Ok(outcome) => ApiResponse::ok(outcome).into_response(),
        Err(err) => scoring_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptAudioQuery {
    prompt_text: Option<String>,
}

async fn prompt_audio(
    State(state): State<AppState>,
    Path(prompt_index): Path<i64>,
    Query(query): Query<PromptAudioQuery>,
) -> Response {
    let Some(prompt_text) = query
        .prompt_text
        .filter(|v| !v.trim().is_empty())
        .or_else(|| prompts::prompt_text(prompt_index).map(String::from))
    else {
        return AppError::validation(format!(
            "promptIndex must be between 0 and {}, got {prompt_index}",
            prompts::PROMPT_COUNT - 1
        ))
        .into_response();
    };

    match state
        .prompt_audio()
        .get_or_generate(prompt_index, &prompt_text)
        .await
    {
        Ok(cached) => ApiResponse::ok(cached).into_response(),
        Err(err) => cache_error_response(err),
    }
}

async fn word_audio(State(state): State<AppState>, Path(word): Path<String>) -> Response {
    match state.word_audio().get_or_generate(&word).await {
        Ok(cached) => ApiResponse::ok(cached).into_response(),
        Err(err) => cache_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<i64>,
}

async fn history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let user_id = match require_user_id(&headers) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };

    match state.history().history(&user_id, query.limit).await {
        Ok(records) => ApiResponse::ok(records).into_response(),
        Err(err) => db_error_response(err, "history query failed"),
    }
}

async fn latest_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(prompt_index): Path<i64>,
) -> Response {
    let user_id = match require_user_id(&headers) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };
    if !prompts::is_valid_prompt_index(prompt_index) {
        return AppError::validation(format!(
            "promptIndex must be between 0 and {}, got {prompt_index}",
            prompts::PROMPT_COUNT - 1
        ))
        .into_response();
    }

    match state.history().latest_session(&user_id, prompt_index).await {
        Ok(Some(record)) => ApiResponse::ok(record).into_response(),
        Ok(None) => AppError::not_found("no session for this prompt").into_response(),
        Err(err) => db_error_response(err, "latest session query failed"),
    }
}

async fn session_detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Response {
    let user_id = match require_user_id(&headers) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };

    match state.history().session_detail(&user_id, &session_id).await {
        Ok(Some(record)) => ApiResponse::ok(record).into_response(),
        Ok(None) => AppError::not_found("session not found").into_response(),
        Err(err) => db_error_response(err, "session detail query failed"),
    }
}

async fn stats(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user_id = match require_user_id(&headers) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };

    match state.history().stats(&user_id).await {
        Ok(stats) => ApiResponse::ok(stats).into_response(),
        Err(err) => db_error_response(err, "stats query failed"),
    }
}

fn provider_app_error(err: ProviderError) -> AppError {
    match err {
        ProviderError::NotConfigured(key) => {
            AppError::unavailable(format!("provider not configured: {key}"))
        }
        other => AppError::upstream(other.to_string()),
    }
}

fn cache_error_response(err: AudioCacheError) -> Response {
    match err {
        AudioCacheError::InvalidPromptIndex(index) => AppError::validation(format!(
            "promptIndex must be between 0 and {}, got {index}",
            prompts::PROMPT_COUNT - 1
        )),
        AudioCacheError::InvalidWord(word) => {
            AppError::validation(format!("invalid word: {word:?}"))
        }
        AudioCacheError::GenerationPending => {
            AppError::unavailable("audio generation in progress, retry shortly")
        }
        AudioCacheError::Provider(err) => provider_app_error(err),
        AudioCacheError::Db(err) => {
            tracing::error!(error = %err, "audio cache query failed");
            AppError::internal("audio cache query failed")
        }
    }
    .into_response()
}

fn scoring_error_response(err: ScoringError) -> Response {
    match err {
        ScoringError::InvalidPromptIndex(index) => AppError::validation(format!(
            "promptIndex must be between 0 and {}, got {index}",
            prompts::PROMPT_COUNT - 1
        )),
        ScoringError::Provider(err) => provider_app_error(err),
        ScoringError::Db(err) => {
            tracing::error!(error = %err, "session persistence failed");
            AppError::internal("failed to persist session")
        }
    }
    .into_response()
}

fn db_error_response(err: sqlx::Error, context: &'static str) -> Response {
    tracing::error!(error = %err, context);
    AppError::internal(context).into_response()
}
