//! Corpus statistics and index health.
//!
//! `recall stats` prints message / session / project counts, the row count
//! of each storage surface (equal counts mean every message is searchable
//! both lexically and semantically) and a per-project breakdown.

use anyhow::Result;
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use transcript_recall_core::store::MessageStore;

use crate::services::Services;

/// Per-project message and session counts.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProjectStats {
    pub project_path: String,
    pub messages: i64,
    pub sessions: i64,
    /// Latest message timestamp in the project.
    pub last_activity: String,
}

pub async fn project_breakdown(pool: &SqlitePool) -> Result<Vec<ProjectStats>> {
    let rows = sqlx::query(
        r#"
        SELECT project_path,
               COUNT(*) AS messages,
               COUNT(DISTINCT session_id) AS sessions,
               COALESCE(MAX(timestamp), '') AS last_activity
        FROM messages
        GROUP BY project_path
        ORDER BY messages DESC, project_path ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| ProjectStats {
            project_path: row.get("project_path"),
            messages: row.get("messages"),
            sessions: row.get("sessions"),
            last_activity: row.get("last_activity"),
        })
        .collect())
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(services: &Services) -> Result<()> {
    let store = &services.store;
    let stats = store.stats().await?;
    let counts = store.surface_counts().await?;

    let tracked_files: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cursors")
        .fetch_one(store.pool())
        .await?;

    let db_path = &services.config.db.path;
    let db_size = std::fs::metadata(db_path).map(|m| m.len()).unwrap_or(0);

    println!("Transcript Recall — Database Stats");
    println!("==================================");
    println!();
    println!("  Database:    {}", db_path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Archive:     {}", services.config.archive.root.display());
    println!("  Files:       {}", tracked_files);
    println!();
    println!("  Messages:    {}", stats.total_messages);
    println!("  Sessions:    {}", stats.sessions);
    println!("  Projects:    {}", stats.projects);
    println!(
        "  Surfaces:    lexical {} / vectors {} / records {}",
        counts.lexical, counts.vectors, counts.messages
    );

    let projects = project_breakdown(store.pool()).await?;
    if !projects.is_empty() {
        println!();
        println!("  By project:");
        println!(
            "  {:<40} {:>8} {:>8}   {}",
            "PROJECT", "MESSAGES", "SESSIONS", "LAST ACTIVITY"
        );
        println!("  {}", "-".repeat(76));

        for p in &projects {
            let last = format_activity(&p.last_activity);
            println!(
                "  {:<40} {:>8} {:>8}   {}",
                p.project_path, p.messages, p.sessions, last
            );
        }
    }

    println!();
    Ok(())
}

/// Render an ISO-8601 timestamp as `YYYY-MM-DD HH:MM` UTC; unparseable
/// values are shown as their date prefix.
fn format_activity(ts: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(ts)
        .map(|dt| {
            dt.with_timezone(&chrono::Utc)
                .format("%Y-%m-%d %H:%M")
                .to_string()
        })
        .unwrap_or_else(|_| ts.chars().take(10).collect())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
