//! Storage abstraction for Transcript Recall.
//!
//! Two traits describe everything the core needs from persistence:
//!
//! - [`CursorStore`]: per-file ingestion watermarks.
//! - [`MessageStore`]: the three storage surfaces of an indexed message
//!   (relational record, lexical entry, vector entry) plus read-side queries.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//! The SQLite implementation lives in the app crate; [`memory::InMemoryStore`]
//! backs tests.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{CorpusStats, Cursor, IndexedMessage, Message, RankedHit, SurfaceCounts};

/// Per-source-file resumption state.
///
/// Single-writer: callers must not write the same cursor concurrently.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Fetch the cursor for a transcript file, if it was ever ingested.
    async fn get_cursor(&self, source_path: &str) -> Result<Option<Cursor>>;

    /// Insert or replace the cursor for a transcript file.
    async fn set_cursor(&self, source_path: &str, last_modified: f64, count: i64) -> Result<()>;
}

/// Abstract message storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert_messages`](MessageStore::upsert_messages) | Three-way upsert keyed by message id |
/// | [`lexical_search`](MessageStore::lexical_search) | Full-text query, best (lowest) score first |
/// | [`vector_search`](MessageStore::vector_search) | Nearest neighbours, closest (lowest distance) first |
/// | [`stats`](MessageStore::stats) | Message / session / project counts |
/// | [`surface_counts`](MessageStore::surface_counts) | Row counts per storage surface |
/// | [`session_messages`](MessageStore::session_messages) | All messages of a session by timestamp |
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Write each message to the relational, lexical and vector surfaces.
    ///
    /// A message must end up in all three surfaces or in none of them; an
    /// existing message with the same id is replaced everywhere. Backends
    /// may commit the whole slice as one unit.
    async fn upsert_messages(&self, batch: &[IndexedMessage]) -> Result<()>;

    /// Run a lexical query. Errors on query syntax the backend rejects.
    async fn lexical_search(&self, query: &str, limit: i64) -> Result<Vec<RankedHit>>;

    /// Find the messages whose vectors are closest to `query_vec`.
    async fn vector_search(&self, query_vec: &[f32], limit: i64) -> Result<Vec<RankedHit>>;

    /// Corpus-wide statistics.
    async fn stats(&self) -> Result<CorpusStats>;

    /// Number of entries in each storage surface.
    async fn surface_counts(&self) -> Result<SurfaceCounts>;

    /// All messages of one session ordered by timestamp ascending.
    async fn session_messages(&self, session_id: &str) -> Result<Vec<Message>>;
}
