#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

use transcript_recall::config::Config;
use transcript_recall::oracle::DisabledOracle;
use transcript_recall::services::Services;
use transcript_recall_core::embedding::{normalize, EmbeddingProvider};

pub const DIMS: usize = 32;

/// Deterministic bag-of-words embedder. Fails any batch containing `poison`.
pub struct HashEmbedder {
    pub poison: Option<String>,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self { poison: None }
    }

    pub fn poisoned(marker: &str) -> Self {
        Self {
            poison: Some(marker.to_string()),
        }
    }
}

pub fn hash_embed(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    for term in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let h = term
            .to_lowercase()
            .bytes()
            .fold(7usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
        v[h % DIMS] += 1.0;
    }
    normalize(&mut v);
    v
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if let Some(marker) = &self.poison {
            if texts.iter().any(|t| t.contains(marker.as_str())) {
                anyhow::bail!("embedding backend rejected input");
            }
        }
        Ok(texts.iter().map(|t| hash_embed(t)).collect())
    }
}

/// One transcript line.
pub fn line(uuid: &str, role: &str, text: &str) -> String {
    serde_json::json!({
        "uuid": uuid,
        "timestamp": format!("2025-03-0{}T10:00:00Z", uuid.len() % 9 + 1),
        "message": {"role": role, "content": text},
    })
    .to_string()
}

/// Write `<archive>/<project_dir>/<session>.jsonl` and pin its mtime.
pub fn write_transcript(
    archive: &Path,
    project_dir: &str,
    session: &str,
    lines: &[String],
    mtime_secs: u64,
) -> PathBuf {
    let dir = archive.join(project_dir);
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(format!("{}.jsonl", session));
    fs::write(&path, lines.join("\n")).unwrap();
    set_mtime(&path, mtime_secs);
    path
}

pub fn set_mtime(path: &Path, secs: u64) {
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}

/// Cursor key ingestion uses for `path`.
pub fn cursor_key(path: &Path) -> String {
    fs::canonicalize(path).unwrap().to_string_lossy().to_string()
}

/// Services over a scratch database with the given embedder and no oracle.
pub async fn services(
    root: &Path,
    embedder: HashEmbedder,
) -> (Config, Services) {
    let config = Config::minimal(root.join("data/recall.sqlite"), root.join("archive"));
    fs::create_dir_all(&config.archive.root).unwrap();
    let services = Services::with_providers(&config, Box::new(embedder), Box::new(DisabledOracle))
        .await
        .unwrap();
    (config, services)
}
