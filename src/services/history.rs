use serde::Serialize;

use crate::db::operations::sessions::{self, PracticeSessionRecord};
use crate::db::Database;

const DEFAULT_HISTORY_LIMIT: i64 = 10;
const MAX_HISTORY_LIMIT: i64 = 50;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_sessions: i64,
    pub average_score: f64,
    pub best_score: f64,
    pub worst_score: f64,
    pub prompts_attempted: Vec<i64>,
}

/// Read-only queries over the practice session history.
#[derive(Clone)]
pub struct HistoryService {
    db: Database,
}

impl HistoryService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn history(
        &self,
        user_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<PracticeSessionRecord>, sqlx::Error> {
        let limit = limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT);
        sessions::list_recent(self.db.pool(), user_id, limit).await
    }

    pub async fn latest_session(
        &self,
        user_id: &str,
        prompt_index: i64,
    ) -> Result<Option<PracticeSessionRecord>, sqlx::Error> {
        sessions::latest_for_prompt(self.db.pool(), user_id, prompt_index).await
    }

    pub async fn session_detail(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<Option<PracticeSessionRecord>, sqlx::Error> {
        sessions::get_by_id(self.db.pool(), user_id, session_id).await
    }

    /// Loads all of the user's sessions and reduces in memory. Fine at this
    /// data scale (tens of sessions per user).
    pub async fn stats(&self, user_id: &str) -> Result<UserStats, sqlx::Error> {
        let all = sessions::list_all_for_user(self.db.pool(), user_id).await?;
        Ok(reduce_stats(&all))
    }
}

fn reduce_stats(records: &[PracticeSessionRecord]) -> UserStats {
    if records.is_empty() {
        return UserStats {
            total_sessions: 0,
            average_score: 0.0,
            best_score: 0.0,
            worst_score: 0.0,
            prompts_attempted: Vec::new(),
        };
    }

    let total = records.len() as i64;
    let sum: f64 = records.iter().map(|r| r.overall_score).sum();
    let best = records
        .iter()
        .map(|r| r.overall_score)
        .fold(f64::MIN, f64::max);
    let worst = records
        .iter()
        .map(|r| r.overall_score)
        .fold(f64::MAX, f64::min);

    let mut prompts: Vec<i64> = records.iter().map(|r| r.prompt_index).collect();
    prompts.sort_unstable();
    prompts.dedup();

    UserStats {
        total_sessions: total,
        average_score: sum / total as f64,
        best_score: best,
        worst_score: worst,
        prompts_attempted: prompts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(prompt_index: i64, score: f64) -> PracticeSessionRecord {
        PracticeSessionRecord {
            id: format!("s{prompt_index}"),
            user_id: "u1".to_string(),
            prompt_index,
            user_audio_url: String::new(),
            user_audio_public_id: String::new(),
            transcript: String::new(),
            overall_score: score,
            fluency_score: None,
            pronunciation_score: None,
            word_scores: Vec::new(),
            recording_duration: 3.0,
            completed_at: String::new(),
        }
    }

    #[test]
    fn test_stats_empty() {
        let stats = reduce_stats(&[]);
        assert_eq!(stats.total_sessions, 0);
        assert_eq!(stats.average_score, 0.0);
        assert!(stats.prompts_attempted.is_empty());
    }

    #[test]
    fn test_stats_reduction() {
        let stats = reduce_stats(&[record(0, 80.0), record(0, 60.0), record(3, 70.0)]);
        assert_eq!(stats.total_sessions, 3);
        assert!((stats.average_score - 70.0).abs() < 1e-9);
        assert_eq!(stats.best_score, 80.0);
        assert_eq!(stats.worst_score, 60.0);
        assert_eq!(stats.prompts_attempted, vec![0, 3]);
    }
}
