use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Connect and migrate, then close the pool (`recall init`).
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the schema if missing. Safe to run repeatedly.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    // Relational surface
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            project_path TEXT NOT NULL,
            source_path TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            role TEXT NOT NULL,
            text TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Vector surface
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS message_vectors (
            message_id TEXT PRIMARY KEY,
            embedding BLOB NOT NULL,
            FOREIGN KEY (message_id) REFERENCES messages(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Per-file ingestion cursors
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cursors (
            source_path TEXT PRIMARY KEY,
            last_modified REAL NOT NULL,
            last_count INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Lexical surface. FTS5 CREATE is not idempotent natively, so we check first
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='messages_fts'",
    )
    .fetch_one(pool)
    .await?;

    if !fts_exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE messages_fts USING fts5(
                message_id UNINDEXED,
                text,
                tokenize = 'porter unicode61'
            )
            "#,
        )
        .execute(pool)
        .await?;
    }

    for stmt in [
        "CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id)",
        "CREATE INDEX IF NOT EXISTS idx_messages_timestamp ON messages(timestamp)",
        "CREATE INDEX IF NOT EXISTS idx_messages_project ON messages(project_path)",
        "CREATE INDEX IF NOT EXISTS idx_messages_source ON messages(source_path)",
    ] {
        sqlx::query(stmt).execute(pool).await?;
    }

    Ok(())
}
