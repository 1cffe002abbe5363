//! Cursor-aware ingestion of the transcript archive.
//!
//! The archive root holds one directory per project, named with the
//! encoded project path; each directory holds one JSONL transcript per
//! session:
//!
//! ```text
//! <root>/-Users-alice-work-api/3f2c…e1.jsonl
//! <root>/-Users-alice-work-api/9ab0…77.jsonl
//! <root>/-Users-alice-notes/…
//! ```
//!
//! Every file carries a cursor (`last_modified`, `last_count`). A file whose
//! modification time is not newer than its cursor is skipped without being
//! read. Otherwise it is re-extracted in full and indexed; upserts make
//! re-processing idempotent. The cursor is written only after the file's
//! messages are committed, so a crash mid-file means the file is redone on
//! the next pass.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobMatcher};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

use transcript_recall_core::embedding::EmbeddingProvider;
use transcript_recall_core::extract::{decode_project_path, extract_messages, TranscriptSource};
use transcript_recall_core::indexer::Indexer;
use transcript_recall_core::models::IngestTotals;
use transcript_recall_core::store::{CursorStore, MessageStore};

use crate::config::ArchiveConfig;
use crate::services::Services;

/// Modification time in fractional seconds since the Unix epoch.
fn modified_secs(path: &Path) -> Result<f64> {
    let modified = std::fs::metadata(path)
        .with_context(|| format!("Failed to stat {}", path.display()))?
        .modified()?;
    Ok(modified.duration_since(UNIX_EPOCH)?.as_secs_f64())
}

/// Ingest one transcript file, returning the number of messages indexed.
///
/// Returns 0 both for unchanged files (skipped) and for files with no
/// indexable messages; the latter still get a cursor so they are not
/// re-read until modified. The cursor is keyed by the canonical path, so
/// relative and absolute spellings of one file share a cursor.
pub async fn ingest_one<S, E>(
    store: &S,
    embedder: &E,
    path: &Path,
    project_path: &str,
    batch_size: usize,
) -> Result<usize>
where
    S: MessageStore + CursorStore + ?Sized,
    E: EmbeddingProvider + ?Sized,
{
    let path = &std::fs::canonicalize(path)
        .with_context(|| format!("Failed to resolve {}", path.display()))?;
    let source_path = path.to_string_lossy().to_string();
    let mtime = modified_secs(path)?;

    if let Some(cursor) = store.get_cursor(&source_path).await? {
        if cursor.last_modified >= mtime {
            tracing::debug!(path = %source_path, "unchanged, skipping");
            return Ok(0);
        }
    }

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let content = String::from_utf8_lossy(&bytes);

    let session_id = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let source = TranscriptSource {
        source_path: source_path.clone(),
        session_id,
        project_path: project_path.to_string(),
    };

    let messages = extract_messages(&content, &source);
    if messages.is_empty() {
        store.set_cursor(&source_path, mtime, 0).await?;
        tracing::debug!(path = %source_path, "no indexable messages");
        return Ok(0);
    }

    let count = Indexer::new(store, embedder)
        .with_batch_size(batch_size)
        .index(messages)
        .await?;

    store.set_cursor(&source_path, mtime, count as i64).await?;
    tracing::info!(path = %source_path, messages = count, "ingested file");
    Ok(count)
}

/// Project path for a transcript, decoded from its parent directory name.
pub fn project_path_for(file: &Path) -> String {
    file.parent()
        .and_then(|p| p.file_name())
        .map(|name| decode_project_path(&name.to_string_lossy()))
        .unwrap_or_default()
}

/// Transcript files under `root`, grouped by project directory, in a stable order.
pub fn discover(root: &Path, matcher: &GlobMatcher) -> Result<Vec<(String, PathBuf)>> {
    if !root.is_dir() {
        bail!("Archive root does not exist: {}", root.display());
    }

    let mut files = Vec::new();
    let projects = WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir());

    for project_dir in projects {
        let project_path = decode_project_path(&project_dir.file_name().to_string_lossy());

        let transcripts = WalkDir::new(project_dir.path())
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && matcher.is_match(e.file_name()));

        for entry in transcripts {
            files.push((project_path.clone(), entry.into_path()));
        }
    }

    Ok(files)
}

/// Ingest every transcript in the archive.
///
/// Files are processed one at a time; a failing file is logged, counted in
/// `failed`, and does not stop the pass.
pub async fn ingest_all<S, E>(
    store: &S,
    embedder: &E,
    archive: &ArchiveConfig,
    batch_size: usize,
) -> Result<IngestTotals>
where
    S: MessageStore + CursorStore + ?Sized,
    E: EmbeddingProvider + ?Sized,
{
    let matcher = Glob::new(&archive.pattern)
        .with_context(|| format!("Invalid archive pattern: {}", archive.pattern))?
        .compile_matcher();
    let files = discover(&archive.root, &matcher)?;

    let mut totals = IngestTotals::default();
    for (project_path, path) in files {
        match ingest_one(store, embedder, &path, &project_path, batch_size).await {
            Ok(count) => {
                totals.files += 1;
                totals.messages += count;
            }
            Err(e) => {
                totals.failed += 1;
                tracing::warn!(path = %path.display(), error = %e, "failed to ingest file");
            }
        }
    }

    tracing::info!(
        files = totals.files,
        messages = totals.messages,
        failed = totals.failed,
        "ingest complete"
    );
    Ok(totals)
}

/// Ingest the whole archive with the process-wide services.
pub async fn ingest_archive(services: &Services) -> Result<IngestTotals> {
    ingest_all(
        &services.store,
        services.embedder.as_ref(),
        &services.config.archive,
        services.config.ingest.batch_size,
    )
    .await
}

/// `recall ingest [--file PATH]`.
pub async fn run_ingest(services: &Services, file: Option<PathBuf>) -> Result<()> {
    match file {
        Some(path) => {
            let path = std::fs::canonicalize(&path)
                .with_context(|| format!("Failed to resolve {}", path.display()))?;
            let project_path = project_path_for(&path);
            let count = ingest_one(
                &services.store,
                services.embedder.as_ref(),
                &path,
                &project_path,
                services.config.ingest.batch_size,
            )
            .await?;
            println!("Ingested {} messages from {}", count, path.display());
        }
        None => {
            let totals = ingest_archive(services).await?;
            println!("Ingest complete");
            println!("  files:    {}", totals.files);
            println!("  messages: {}", totals.messages);
            if totals.failed > 0 {
                println!("  failed:   {}", totals.failed);
            }
        }
    }
    Ok(())
}
