//! Batching indexer: embed messages and dual-write them to the store.
//!
//! Messages are processed in fixed-size batches. Each batch costs exactly
//! one [`EmbeddingProvider::embed_batch`] call; the returned vectors are
//! checked for count and dimensionality before anything is written, so a
//! misbehaving provider can never leave a message half-indexed.

use anyhow::{bail, Result};

use crate::embedding::EmbeddingProvider;
use crate::models::{IndexedMessage, Message};
use crate::store::MessageStore;

/// Default number of messages per embedding round trip.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Embeds and stores messages in batches.
pub struct Indexer<'a, S: ?Sized, E: ?Sized> {
    store: &'a S,
    embedder: &'a E,
    batch_size: usize,
}

impl<'a, S, E> Indexer<'a, S, E>
where
    S: MessageStore + ?Sized,
    E: EmbeddingProvider + ?Sized,
{
    pub fn new(store: &'a S, embedder: &'a E) -> Self {
        Self {
            store,
            embedder,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Index `messages`, returning how many were written.
    ///
    /// An empty input writes nothing and returns 0. Embedding failures and
    /// vector shape mismatches abort the call with an error; batches that
    /// were already committed stay committed.
    pub async fn index(&self, messages: Vec<Message>) -> Result<usize> {
        let dims = self.embedder.dims();
        let mut indexed = 0usize;

        let mut pending = messages.into_iter().peekable();
        while pending.peek().is_some() {
            let batch: Vec<Message> = pending.by_ref().take(self.batch_size).collect();
            let texts: Vec<String> = batch.iter().map(|m| m.text.clone()).collect();

            let vectors = self.embedder.embed_batch(&texts).await?;
            if vectors.len() != batch.len() {
                bail!(
                    "embedding provider returned {} vectors for {} texts",
                    vectors.len(),
                    batch.len()
                );
            }
            if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
                bail!(
                    "embedding dimensionality mismatch: expected {}, got {}",
                    dims,
                    bad.len()
                );
            }

            let rows: Vec<IndexedMessage> = batch
                .into_iter()
                .zip(vectors)
                .map(|(message, vector)| IndexedMessage { message, vector })
                .collect();

            self.store.upsert_messages(&rows).await?;
            indexed += rows.len();
            tracing::debug!(batch = rows.len(), total = indexed, "batch indexed");
        }

        Ok(indexed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, SurfaceCounts};
    use crate::store::memory::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records the size of every batch it is asked to embed.
    struct CountingEmbedder {
        dims: usize,
        emit_dims: usize,
        calls: Mutex<Vec<usize>>,
    }

    impl CountingEmbedder {
        fn new(dims: usize) -> Self {
            Self {
                dims,
                emit_dims: dims,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for CountingEmbedder {
        fn model_name(&self) -> &str {
            "counting"
        }
        fn dims(&self) -> usize {
            self.dims
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.lock().unwrap().push(texts.len());
            Ok(texts.iter().map(|_| vec![1.0; self.emit_dims]).collect())
        }
    }

    fn messages(n: usize) -> Vec<Message> {
        (0..n)
            .map(|i| Message {
                id: format!("m{}", i),
                session_id: "s".to_string(),
                project_path: "/p".to_string(),
                source_path: "/p/s.jsonl".to_string(),
                timestamp: format!("{:04}", i),
                role: Role::Assistant,
                text: format!("message body number {}", i),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_batches_are_bounded() {
        let store = InMemoryStore::new();
        let embedder = CountingEmbedder::new(4);
        let n = Indexer::new(&store, &embedder)
            .with_batch_size(50)
            .index(messages(120))
            .await
            .unwrap();

        assert_eq!(n, 120);
        assert_eq!(*embedder.calls.lock().unwrap(), vec![50, 50, 20]);
        assert_eq!(
            store.surface_counts().await.unwrap(),
            SurfaceCounts {
                messages: 120,
                lexical: 120,
                vectors: 120,
            }
        );
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_calls() {
        let store = InMemoryStore::new();
        let embedder = CountingEmbedder::new(4);
        let n = Indexer::new(&store, &embedder).index(Vec::new()).await.unwrap();
        assert_eq!(n, 0);
        assert!(embedder.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_fatal_and_writes_nothing() {
        let store = InMemoryStore::new();
        let embedder = CountingEmbedder {
            emit_dims: 3,
            ..CountingEmbedder::new(4)
        };
        let err = Indexer::new(&store, &embedder)
            .index(messages(5))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("dimensionality mismatch"));
        assert_eq!(store.surface_counts().await.unwrap(), SurfaceCounts::default());
    }

    #[tokio::test]
    async fn test_reindexing_same_ids_upserts() {
        let store = InMemoryStore::new();
        let embedder = CountingEmbedder::new(2);
        let indexer = Indexer::new(&store, &embedder).with_batch_size(3);
        indexer.index(messages(7)).await.unwrap();
        indexer.index(messages(7)).await.unwrap();
        assert_eq!(store.stats().await.unwrap().total_messages, 7);
    }
}
