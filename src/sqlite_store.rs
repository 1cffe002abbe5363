//! SQLite-backed [`MessageStore`] and [`CursorStore`].
//!
//! One database holds all three storage surfaces of a message:
//!
//! - `messages`: the relational record (source of truth).
//! - `messages_fts`: FTS5 lexical entry, ranked with `bm25()` (lower is better).
//! - `message_vectors`: embedding BLOB, searched by brute-force cosine distance.
//!
//! plus the `cursors` table used by ingestion.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use transcript_recall_core::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use transcript_recall_core::models::{
    CorpusStats, Cursor, IndexedMessage, Message, RankedHit, Role, SurfaceCounts,
};
use transcript_recall_core::store::{CursorStore, MessageStore};

/// SQLite implementation of the core store traits.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

const MESSAGE_COLUMNS: &str =
    "m.id, m.session_id, m.project_path, m.source_path, m.timestamp, m.role, m.text";

fn row_to_message(row: &SqliteRow) -> Result<Message> {
    let role: String = row.get("role");
    Ok(Message {
        id: row.get("id"),
        session_id: row.get("session_id"),
        project_path: row.get("project_path"),
        source_path: row.get("source_path"),
        timestamp: row.get("timestamp"),
        role: Role::parse(&role).ok_or_else(|| anyhow!("unknown role in database: {}", role))?,
        text: row.get("text"),
    })
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn upsert_messages(&self, batch: &[IndexedMessage]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for item in batch {
            let m = &item.message;
            sqlx::query(
                r#"
                INSERT INTO messages (id, session_id, project_path, source_path, timestamp, role, text)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    session_id = excluded.session_id,
                    project_path = excluded.project_path,
                    source_path = excluded.source_path,
                    timestamp = excluded.timestamp,
                    role = excluded.role,
                    text = excluded.text
                "#,
            )
            .bind(&m.id)
            .bind(&m.session_id)
            .bind(&m.project_path)
            .bind(&m.source_path)
            .bind(&m.timestamp)
            .bind(m.role.as_str())
            .bind(&m.text)
            .execute(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM messages_fts WHERE message_id = ?")
                .bind(&m.id)
                .execute(&mut *tx)
                .await?;

            sqlx::query("INSERT INTO messages_fts (message_id, text) VALUES (?, ?)")
                .bind(&m.id)
                .bind(&m.text)
                .execute(&mut *tx)
                .await?;

            sqlx::query(
                r#"
                INSERT INTO message_vectors (message_id, embedding)
                VALUES (?, ?)
                ON CONFLICT(message_id) DO UPDATE SET embedding = excluded.embedding
                "#,
            )
            .bind(&m.id)
            .bind(vec_to_blob(&item.vector))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn lexical_search(&self, query: &str, limit: i64) -> Result<Vec<RankedHit>> {
        let sql = format!(
            r#"
            SELECT {}, bm25(messages_fts) AS score
            FROM messages_fts
            JOIN messages m ON m.id = messages_fts.message_id
            WHERE messages_fts MATCH ?
            ORDER BY score ASC, m.id ASC
            LIMIT ?
            "#,
            MESSAGE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(RankedHit {
                    message: row_to_message(row)?,
                    score: row.get("score"),
                })
            })
            .collect()
    }

    async fn vector_search(&self, query_vec: &[f32], limit: i64) -> Result<Vec<RankedHit>> {
        let sql = format!(
            r#"
            SELECT {}, v.embedding
            FROM message_vectors v
            JOIN messages m ON m.id = v.message_id
            "#,
            MESSAGE_COLUMNS
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.get("embedding");
            let stored = blob_to_vec(&blob);
            if stored.len() != query_vec.len() {
                let id: String = row.get("id");
                bail!(
                    "stored vector for {} has {} dimensions, query has {}",
                    id,
                    stored.len(),
                    query_vec.len()
                );
            }
            hits.push(RankedHit {
                message: row_to_message(row)?,
                score: cosine_distance(query_vec, &stored),
            });
        }

        hits.sort_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.message.id.cmp(&b.message.id))
        });
        hits.truncate(limit.max(0) as usize);

        Ok(hits)
    }

    async fn stats(&self) -> Result<CorpusStats> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(DISTINCT session_id) AS sessions,
                   COUNT(DISTINCT project_path) AS projects
            FROM messages
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(CorpusStats {
            total_messages: row.get("total"),
            sessions: row.get("sessions"),
            projects: row.get("projects"),
        })
    }

    async fn surface_counts(&self) -> Result<SurfaceCounts> {
        let messages: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await?;
        let lexical: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages_fts")
            .fetch_one(&self.pool)
            .await?;
        let vectors: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM message_vectors")
            .fetch_one(&self.pool)
            .await?;

        Ok(SurfaceCounts {
            messages,
            lexical,
            vectors,
        })
    }

    async fn session_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        let sql = format!(
            "SELECT {} FROM messages m WHERE m.session_id = ? ORDER BY m.timestamp ASC, m.id ASC",
            MESSAGE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_message).collect()
    }
}

#[async_trait]
impl CursorStore for SqliteStore {
    async fn get_cursor(&self, source_path: &str) -> Result<Option<Cursor>> {
        let row = sqlx::query(
            "SELECT source_path, last_modified, last_count FROM cursors WHERE source_path = ?",
        )
        .bind(source_path)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Cursor {
            source_path: r.get("source_path"),
            last_modified: r.get("last_modified"),
            last_count: r.get("last_count"),
        }))
    }

    async fn set_cursor(&self, source_path: &str, last_modified: f64, count: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cursors (source_path, last_modified, last_count)
            VALUES (?, ?, ?)
            ON CONFLICT(source_path) DO UPDATE SET
                last_modified = excluded.last_modified,
                last_count = excluded.last_count
            "#,
        )
        .bind(source_path)
        .bind(last_modified)
        .bind(count)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
