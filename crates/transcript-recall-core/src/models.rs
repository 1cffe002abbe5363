//! Core data models used throughout Transcript Recall.
//!
//! These types represent the messages, cursors, plans and ranked results
//! that flow through the ingestion and retrieval pipeline.

use serde::{Deserialize, Serialize};

/// Speaker of an indexed message. Only conversational turns are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Parse a transcript role string, rejecting anything that is not a
    /// conversational speaker (`system`, tool roles, summaries, ...).
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single conversational utterance extracted from a transcript.
///
/// `id` comes from the transcript itself and is unique across the corpus;
/// writing a message whose `id` already exists replaces the old record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    /// Stem of the transcript file the message came from.
    pub session_id: String,
    /// Decoded project directory the transcript lives under.
    pub project_path: String,
    /// Originating transcript file; also the cursor key.
    pub source_path: String,
    /// ISO-8601 timestamp as written by the source.
    pub timestamp: String,
    pub role: Role,
    pub text: String,
}

/// A message paired with its embedding, ready for the three-way upsert.
#[derive(Debug, Clone)]
pub struct IndexedMessage {
    pub message: Message,
    pub vector: Vec<f32>,
}

/// Resumption watermark for one transcript file.
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    pub source_path: String,
    /// Modification time (seconds since the Unix epoch) at the last ingest.
    pub last_modified: f64,
    /// Messages indexed by that ingest. Diagnostic only.
    pub last_count: i64,
}

/// One entry of a ranked list returned by a lexical or vector query.
///
/// `score` is the raw backend value: BM25 for the lexical surface and
/// distance for the vector surface. Both are lower-is-better and lists are
/// returned already sorted ascending.
#[derive(Debug, Clone, Serialize)]
pub struct RankedHit {
    pub message: Message,
    pub score: f64,
}

/// A message after Reciprocal Rank Fusion.
#[derive(Debug, Clone, Serialize)]
pub struct FusedHit {
    pub message: Message,
    /// Accumulated `Σ 1 / (k + rank)` over every list the message appeared in.
    pub rrf_score: f64,
}

/// Multi-query search plan: several lexical queries, one semantic query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPlan {
    pub lexical_queries: Vec<String>,
    pub semantic_query: String,
}

impl SearchPlan {
    /// The plan used whenever the oracle cannot produce one.
    pub fn fallback(query: &str) -> Self {
        Self {
            lexical_queries: vec![query.to_string()],
            semantic_query: query.to_string(),
        }
    }
}

/// Corpus-wide counts handed to the formatter and served by `/stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusStats {
    pub total_messages: i64,
    pub sessions: i64,
    pub projects: i64,
}

/// Row counts of the three storage surfaces. Equal counts mean no orphans.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SurfaceCounts {
    pub messages: i64,
    pub lexical: i64,
    pub vectors: i64,
}

/// Totals of one corpus-wide ingestion pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestTotals {
    /// Files processed without error, including unchanged files that were skipped.
    pub files: usize,
    /// Messages indexed across all files.
    pub messages: usize,
    /// Files whose ingestion failed and was isolated.
    pub failed: usize,
}
