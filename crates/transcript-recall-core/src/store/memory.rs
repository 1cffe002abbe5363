//! In-memory [`MessageStore`] and [`CursorStore`] for tests and WASM targets.
//!
//! All three surfaces live behind one `RwLock`, so an upsert is atomic with
//! respect to readers. Lexical search is a plain term match: every query
//! term must occur in the message, and more occurrences rank higher.
//! Vector search is brute-force cosine distance.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::embedding::cosine_distance;
use crate::models::{CorpusStats, Cursor, IndexedMessage, Message, RankedHit, SurfaceCounts};

use super::{CursorStore, MessageStore};

/// Lexical query operators that are not search terms.
const OPERATORS: [&str; 4] = ["and", "or", "not", "near"];

#[derive(Default)]
struct Surfaces {
    messages: BTreeMap<String, Message>,
    lexical: BTreeMap<String, String>,
    vectors: BTreeMap<String, Vec<f32>>,
}

/// In-memory store for testing and WASM environments.
#[derive(Default)]
pub struct InMemoryStore {
    surfaces: RwLock<Surfaces>,
    cursors: RwLock<HashMap<String, Cursor>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn hits_sorted(mut hits: Vec<RankedHit>, limit: i64) -> Vec<RankedHit> {
    hits.sort_by(|a, b| {
        a.score
            .partial_cmp(&b.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.message.id.cmp(&b.message.id))
    });
    hits.truncate(limit.max(0) as usize);
    hits
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn upsert_messages(&self, batch: &[IndexedMessage]) -> Result<()> {
        let mut s = self.surfaces.write().map_err(poisoned)?;
        for item in batch {
            let id = item.message.id.clone();
            s.lexical
                .insert(id.clone(), item.message.text.to_lowercase());
            s.vectors.insert(id.clone(), item.vector.clone());
            s.messages.insert(id, item.message.clone());
        }
        Ok(())
    }

    async fn lexical_search(&self, query: &str, limit: i64) -> Result<Vec<RankedHit>> {
        let wanted: Vec<String> = terms(query)
            .into_iter()
            .filter(|t| !OPERATORS.contains(&t.as_str()))
            .collect();
        if wanted.is_empty() {
            bail!("lexical query has no search terms: {:?}", query);
        }

        let s = self.surfaces.read().map_err(poisoned)?;
        let mut hits = Vec::new();
        for (id, text) in &s.lexical {
            let tokens = terms(text);
            if !wanted.iter().all(|w| tokens.contains(w)) {
                continue;
            }
            let occurrences = tokens.iter().filter(|t| wanted.contains(t)).count();
            if let Some(message) = s.messages.get(id) {
                hits.push(RankedHit {
                    message: message.clone(),
                    score: -(occurrences as f64),
                });
            }
        }
        Ok(hits_sorted(hits, limit))
    }

    async fn vector_search(&self, query_vec: &[f32], limit: i64) -> Result<Vec<RankedHit>> {
        let s = self.surfaces.read().map_err(poisoned)?;
        let mut hits = Vec::with_capacity(s.vectors.len());
        for (id, v) in &s.vectors {
            if v.len() != query_vec.len() {
                bail!(
                    "stored vector for {} has {} dimensions, query has {}",
                    id,
                    v.len(),
                    query_vec.len()
                );
            }
            if let Some(message) = s.messages.get(id) {
                hits.push(RankedHit {
                    message: message.clone(),
                    score: cosine_distance(query_vec, v),
                });
            }
        }
        Ok(hits_sorted(hits, limit))
    }

    async fn stats(&self) -> Result<CorpusStats> {
        let s = self.surfaces.read().map_err(poisoned)?;
        let sessions: HashSet<&str> = s.messages.values().map(|m| m.session_id.as_str()).collect();
        let projects: HashSet<&str> = s
            .messages
            .values()
            .map(|m| m.project_path.as_str())
            .collect();
        Ok(CorpusStats {
            total_messages: s.messages.len() as i64,
            sessions: sessions.len() as i64,
            projects: projects.len() as i64,
        })
    }

    async fn surface_counts(&self) -> Result<SurfaceCounts> {
        let s = self.surfaces.read().map_err(poisoned)?;
        Ok(SurfaceCounts {
            messages: s.messages.len() as i64,
            lexical: s.lexical.len() as i64,
            vectors: s.vectors.len() as i64,
        })
    }

    async fn session_messages(&self, session_id: &str) -> Result<Vec<Message>> {
        let s = self.surfaces.read().map_err(poisoned)?;
        let mut out: Vec<Message> = s
            .messages
            .values()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(out)
    }
}

#[async_trait]
impl CursorStore for InMemoryStore {
    async fn get_cursor(&self, source_path: &str) -> Result<Option<Cursor>> {
        let cursors = self.cursors.read().map_err(poisoned)?;
        Ok(cursors.get(source_path).cloned())
    }

    async fn set_cursor(&self, source_path: &str, last_modified: f64, count: i64) -> Result<()> {
        let mut cursors = self.cursors.write().map_err(poisoned)?;
        cursors.insert(
            source_path.to_string(),
            Cursor {
                source_path: source_path.to_string(),
                last_modified,
                last_count: count,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn indexed(id: &str, session: &str, ts: &str, text: &str, vector: Vec<f32>) -> IndexedMessage {
        IndexedMessage {
            message: Message {
                id: id.to_string(),
                session_id: session.to_string(),
                project_path: "/p".to_string(),
                source_path: format!("/archive/{}.jsonl", session),
                timestamp: ts.to_string(),
                role: Role::User,
                text: text.to_string(),
            },
            vector,
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_in_every_surface() {
        let store = InMemoryStore::new();
        store
            .upsert_messages(&[indexed("m1", "s", "1", "old cache text", vec![1.0, 0.0])])
            .await
            .unwrap();
        store
            .upsert_messages(&[indexed("m1", "s", "1", "new routing text", vec![0.0, 1.0])])
            .await
            .unwrap();

        let counts = store.surface_counts().await.unwrap();
        assert_eq!(
            counts,
            SurfaceCounts {
                messages: 1,
                lexical: 1,
                vectors: 1,
            }
        );
        assert!(store.lexical_search("cache", 10).await.unwrap().is_empty());
        assert_eq!(store.lexical_search("routing", 10).await.unwrap().len(), 1);

        let nearest = store.vector_search(&[0.0, 1.0], 1).await.unwrap();
        assert!(nearest[0].score.abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_vector_width_mismatch_is_an_error() {
        let store = InMemoryStore::new();
        store
            .upsert_messages(&[indexed("m1", "s", "1", "two dims", vec![1.0, 0.0])])
            .await
            .unwrap();
        let err = store.vector_search(&[1.0, 0.0, 0.0], 5).await.unwrap_err();
        assert!(err.to_string().contains("2 dimensions, query has 3"));
    }

    #[tokio::test]
    async fn test_lexical_requires_all_terms_and_ignores_operators() {
        let store = InMemoryStore::new();
        store
            .upsert_messages(&[
                indexed("a", "s", "1", "cosmos auth token refresh", vec![1.0]),
                indexed("b", "s", "2", "cosmos partition keys", vec![1.0]),
            ])
            .await
            .unwrap();

        let hits = store.lexical_search("cosmos AND auth", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].message.id, "a");
        assert!(store.lexical_search("\"\" AND", 10).await.is_err());
    }

    #[tokio::test]
    async fn test_session_messages_ordered_by_timestamp() {
        let store = InMemoryStore::new();
        store
            .upsert_messages(&[
                indexed("late", "s1", "2025-01-02T00:00:00Z", "second message", vec![1.0]),
                indexed("early", "s1", "2025-01-01T00:00:00Z", "first message", vec![1.0]),
                indexed("other", "s2", "2025-01-01T00:00:00Z", "elsewhere", vec![1.0]),
            ])
            .await
            .unwrap();
        let ids: Vec<String> = store
            .session_messages("s1")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["early", "late"]);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_messages, 3);
        assert_eq!(stats.sessions, 2);
        assert_eq!(stats.projects, 1);
    }

    #[tokio::test]
    async fn test_cursor_upsert() {
        let store = InMemoryStore::new();
        assert!(store.get_cursor("/a.jsonl").await.unwrap().is_none());
        store.set_cursor("/a.jsonl", 10.5, 3).await.unwrap();
        store.set_cursor("/a.jsonl", 12.0, 0).await.unwrap();
        let cursor = store.get_cursor("/a.jsonl").await.unwrap().unwrap();
        assert_eq!(cursor.last_modified, 12.0);
        assert_eq!(cursor.last_count, 0);
    }
}
