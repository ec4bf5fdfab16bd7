pub const SCHEMA_VERSION: &str = "1.0.0";

pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS "_db_metadata" (
    "key" TEXT PRIMARY KEY,
    "value" TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS "prompt_audio" (
    "promptIndex" INTEGER PRIMARY KEY,
    "promptText" TEXT NOT NULL,
    "audioUrl" TEXT,
    "audioPublicId" TEXT,
    "duration" REAL NOT NULL DEFAULT 0,
    "voice" TEXT NOT NULL DEFAULT 'alloy',
    "format" TEXT NOT NULL DEFAULT 'mp3',
    "status" TEXT NOT NULL DEFAULT 'pending',
    "generatedAt" TEXT,
    "claimedAt" TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS "word_audio" (
    "word" TEXT PRIMARY KEY,
    "audioUrl" TEXT,
    "audioPublicId" TEXT,
    "duration" REAL NOT NULL DEFAULT 0,
    "voice" TEXT NOT NULL DEFAULT 'alloy',
    "format" TEXT NOT NULL DEFAULT 'mp3',
    "timesUsed" INTEGER NOT NULL DEFAULT 0,
    "status" TEXT NOT NULL DEFAULT 'pending',
    "generatedAt" TEXT,
    "claimedAt" TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS "practice_sessions" (
    "id" TEXT PRIMARY KEY,
    "userId" TEXT NOT NULL,
    "promptIndex" INTEGER NOT NULL,
    "userAudioUrl" TEXT NOT NULL,
    "userAudioPublicId" TEXT NOT NULL,
    "transcript" TEXT NOT NULL,
    "overallScore" REAL NOT NULL,
    "fluencyScore" REAL,
    "pronunciationScore" REAL,
    "wordScores" TEXT NOT NULL DEFAULT '[]',
    "recordingDuration" REAL NOT NULL DEFAULT 0,
    "completedAt" TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS "idx_practice_sessions_user_completed"
    ON "practice_sessions" ("userId", "completedAt" DESC);

CREATE INDEX IF NOT EXISTS "idx_practice_sessions_user_prompt"
    ON "practice_sessions" ("userId", "promptIndex", "completedAt" DESC);
"#;

/// Splits the schema into individual statements, dropping comment lines.
/// Statement literals contain no semicolons, so a plain split is enough.
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    sql.split(';')
        .map(|stmt| {
            stmt.lines()
                .filter(|line| !line.trim().starts_with("--"))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .map(|stmt| stmt.trim().to_string())
        .filter(|stmt| !stmt.is_empty())
        .collect()
}
