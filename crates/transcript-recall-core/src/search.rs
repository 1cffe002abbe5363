//! Hybrid search orchestrator: plan → lexical + vector queries → RRF → answer.
//!
//! Stateless: every call is an independent one-shot pipeline. The store,
//! embedding provider and oracle are borrowed for the duration of a call,
//! so one orchestrator can serve any number of concurrent searches.
//!
//! # Pipeline
//!
//! 1. Read corpus statistics; an empty corpus short-circuits to the
//!    "no results" answer without calling the oracle or any index.
//! 2. Obtain a [`SearchPlan`] (oracle, or the fallback plan).
//! 3. Run every lexical sub-query (`lexical_limit` results each). A failing
//!    sub-query is logged and skipped.
//! 4. Embed the semantic query and run it against the vector surface
//!    (`vector_limit` results). Failure is logged and skipped.
//! 5. No list produced anything → "no results" answer.
//! 6. Fuse all non-empty lists with Reciprocal Rank Fusion.
//! 7. Hand query, fused list and statistics to the oracle and return its
//!    text verbatim; if formatting fails, return a plain-text rendering.

use anyhow::{bail, Result};

use crate::embedding::EmbeddingProvider;
use crate::fusion::{fuse, DEFAULT_RRF_K};
use crate::models::{CorpusStats, FusedHit, RankedHit, SearchPlan};
use crate::oracle::{no_results_answer, plain_answer, plan_search, Oracle};
use crate::store::MessageStore;

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// Results fetched per lexical sub-query.
    pub lexical_limit: i64,
    /// Results fetched from the vector surface.
    pub vector_limit: i64,
    /// RRF smoothing constant.
    pub rrf_k: u32,
    /// Results included in a plain-text fallback answer.
    pub format_limit: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            lexical_limit: 20,
            vector_limit: 20,
            rrf_k: DEFAULT_RRF_K,
            format_limit: 10,
        }
    }
}

/// Everything retrieval produced for one query, before formatting.
#[derive(Debug, Clone)]
pub struct Retrieval {
    pub stats: CorpusStats,
    /// `None` when the corpus was empty and no plan was requested.
    pub plan: Option<SearchPlan>,
    /// Number of non-empty ranked lists that went into fusion.
    pub lists_fused: usize,
    pub results: Vec<FusedHit>,
}

/// Runs hybrid searches against borrowed collaborators.
pub struct HybridSearch<'a, S: ?Sized, E: ?Sized, O: ?Sized> {
    store: &'a S,
    embedder: &'a E,
    oracle: &'a O,
    params: SearchParams,
}

impl<'a, S, E, O> HybridSearch<'a, S, E, O>
where
    S: MessageStore + ?Sized,
    E: EmbeddingProvider + ?Sized,
    O: Oracle + ?Sized,
{
    pub fn new(store: &'a S, embedder: &'a E, oracle: &'a O, params: SearchParams) -> Self {
        Self {
            store,
            embedder,
            oracle,
            params,
        }
    }

    /// Plan, query and fuse, without formatting.
    ///
    /// Only storage failures while reading statistics are returned as
    /// errors; planning, sub-query and embedding failures degrade.
    pub async fn retrieve(&self, query: &str) -> Result<Retrieval> {
        let stats = self.store.stats().await?;
        if stats.total_messages == 0 {
            tracing::info!("corpus is empty, skipping search");
            return Ok(Retrieval {
                stats,
                plan: None,
                lists_fused: 0,
                results: Vec::new(),
            });
        }

        let plan = plan_search(self.oracle, query).await;
        tracing::info!(
            lexical = plan.lexical_queries.len(),
            semantic = %plan.semantic_query,
            "search plan ready"
        );

        let mut lists: Vec<Vec<RankedHit>> = Vec::new();

        for lexical in &plan.lexical_queries {
            match self
                .store
                .lexical_search(lexical, self.params.lexical_limit)
                .await
            {
                Ok(hits) if !hits.is_empty() => {
                    tracing::debug!(query = %lexical, results = hits.len(), "lexical query done");
                    lists.push(hits);
                }
                Ok(_) => tracing::debug!(query = %lexical, "lexical query matched nothing"),
                Err(e) => tracing::warn!(query = %lexical, error = %e, "lexical query failed"),
            }
        }

        match self.vector_hits(&plan.semantic_query).await {
            Ok(hits) if !hits.is_empty() => {
                tracing::debug!(results = hits.len(), "vector query done");
                lists.push(hits);
            }
            Ok(_) => tracing::debug!("vector query matched nothing"),
            Err(e) => tracing::warn!(error = %e, "vector query failed"),
        }

        let results = if lists.is_empty() {
            Vec::new()
        } else {
            fuse(&lists, self.params.rrf_k)
        };
        tracing::info!(lists = lists.len(), results = results.len(), "hybrid search complete");

        Ok(Retrieval {
            stats,
            plan: Some(plan),
            lists_fused: lists.len(),
            results,
        })
    }

    async fn vector_hits(&self, semantic_query: &str) -> Result<Vec<RankedHit>> {
        let query_vec = self.embedder.embed(semantic_query).await?;
        if query_vec.len() != self.embedder.dims() {
            bail!(
                "query embedding has {} dimensions, expected {}",
                query_vec.len(),
                self.embedder.dims()
            );
        }
        self.store
            .vector_search(&query_vec, self.params.vector_limit)
            .await
    }

    /// Run the full pipeline and return the answer text.
    pub async fn search(&self, query: &str) -> Result<String> {
        let retrieval = self.retrieve(query).await?;
        if retrieval.results.is_empty() {
            return Ok(no_results_answer(query));
        }

        match self
            .oracle
            .format(query, &retrieval.results, &retrieval.stats)
            .await
        {
            Ok(text) => Ok(text),
            Err(e) => {
                tracing::warn!(error = %e, "response formatting failed, returning plain results");
                Ok(plain_answer(
                    query,
                    &retrieval.results,
                    &retrieval.stats,
                    self.params.format_limit,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::normalize;
    use crate::models::{IndexedMessage, Message, Role, SurfaceCounts};
    use crate::store::memory::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DIMS: usize = 16;

    /// Bag-of-words feature hashing; deterministic and offline.
    struct HashEmbedder {
        fail: bool,
    }

    fn hash_embed(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; DIMS];
        for term in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let h = term
                .to_lowercase()
                .bytes()
                .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
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
            if self.fail {
                anyhow::bail!("embedding backend unavailable");
            }
            Ok(texts.iter().map(|t| hash_embed(t)).collect())
        }
    }

    /// Scripted oracle that counts calls.
    struct ScriptedOracle {
        plan: Option<String>,
        answer: Option<String>,
        plan_calls: AtomicUsize,
        format_calls: AtomicUsize,
    }

    impl ScriptedOracle {
        fn new(plan: Option<&str>, answer: Option<&str>) -> Self {
            Self {
                plan: plan.map(str::to_string),
                answer: answer.map(str::to_string),
                plan_calls: AtomicUsize::new(0),
                format_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Oracle for ScriptedOracle {
        async fn plan(&self, _query: &str) -> Result<String> {
            self.plan_calls.fetch_add(1, Ordering::SeqCst);
            self.plan
                .clone()
                .ok_or_else(|| anyhow::anyhow!("oracle offline"))
        }
        async fn format(
            &self,
            _query: &str,
            results: &[FusedHit],
            _stats: &CorpusStats,
        ) -> Result<String> {
            self.format_calls.fetch_add(1, Ordering::SeqCst);
            match &self.answer {
                Some(a) => Ok(format!("{} ({} results)", a, results.len())),
                None => anyhow::bail!("oracle offline"),
            }
        }
    }

    /// Store wrapper counting index queries.
    struct CountingStore {
        inner: InMemoryStore,
        queries: AtomicUsize,
    }

    #[async_trait]
    impl MessageStore for CountingStore {
        async fn upsert_messages(&self, batch: &[IndexedMessage]) -> Result<()> {
            self.inner.upsert_messages(batch).await
        }
        async fn lexical_search(&self, query: &str, limit: i64) -> Result<Vec<RankedHit>> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.inner.lexical_search(query, limit).await
        }
        async fn vector_search(&self, v: &[f32], limit: i64) -> Result<Vec<RankedHit>> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.inner.vector_search(v, limit).await
        }
        async fn stats(&self) -> Result<CorpusStats> {
            self.inner.stats().await
        }
        async fn surface_counts(&self) -> Result<SurfaceCounts> {
            self.inner.surface_counts().await
        }
        async fn session_messages(&self, session_id: &str) -> Result<Vec<Message>> {
            self.inner.session_messages(session_id).await
        }
    }

    async fn seeded_store() -> CountingStore {
        let store = CountingStore {
            inner: InMemoryStore::new(),
            queries: AtomicUsize::new(0),
        };
        let texts = [
            ("m1", "the redis cache eviction policy was switched to lru"),
            ("m2", "we configured the kubernetes deployment rollout"),
            ("m3", "cache warming runs after each deployment"),
        ];
        let rows: Vec<IndexedMessage> = texts
            .iter()
            .map(|(id, text)| IndexedMessage {
                message: Message {
                    id: id.to_string(),
                    session_id: "s1".to_string(),
                    project_path: "/work/app".to_string(),
                    source_path: "/archive/-work-app/s1.jsonl".to_string(),
                    timestamp: "2025-02-01T00:00:00Z".to_string(),
                    role: Role::User,
                    text: text.to_string(),
                },
                vector: hash_embed(text),
            })
            .collect();
        store.upsert_messages(&rows).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_empty_corpus_short_circuits() {
        let store = CountingStore {
            inner: InMemoryStore::new(),
            queries: AtomicUsize::new(0),
        };
        let embedder = HashEmbedder { fail: false };
        let oracle = ScriptedOracle::new(Some("{}"), Some("answer"));
        let engine = HybridSearch::new(&store, &embedder, &oracle, SearchParams::default());

        let answer = engine.search("anything").await.unwrap();
        assert_eq!(answer, "No relevant conversations found for: anything");
        assert_eq!(oracle.plan_calls.load(Ordering::SeqCst), 0);
        assert_eq!(oracle.format_calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.queries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failing_subquery_is_skipped() {
        let store = seeded_store().await;
        let embedder = HashEmbedder { fail: false };
        let oracle = ScriptedOracle::new(
            Some(r#"{"lexical_queries": ["\"\" AND", "cache"], "semantic_query": "cache"}"#),
            Some("formatted"),
        );
        let engine = HybridSearch::new(&store, &embedder, &oracle, SearchParams::default());

        let retrieval = engine.retrieve("cache").await.unwrap();
        // Broken lexical query skipped; "cache" lexical + vector remain.
        assert_eq!(retrieval.lists_fused, 2);
        let ids: Vec<&str> = retrieval
            .results
            .iter()
            .map(|h| h.message.id.as_str())
            .collect();
        assert!(ids.contains(&"m1"));
        assert!(ids.contains(&"m3"));
        assert_eq!(store.queries.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_formatter_output_returned_verbatim() {
        let store = seeded_store().await;
        let embedder = HashEmbedder { fail: false };
        let oracle = ScriptedOracle::new(
            Some(r#"{"lexical_queries": ["deployment"], "semantic_query": "deployment"}"#),
            Some("formatted"),
        );
        let engine = HybridSearch::new(&store, &embedder, &oracle, SearchParams::default());
        let answer = engine.search("deployment").await.unwrap();
        assert_eq!(answer, "formatted (3 results)");
    }

    #[tokio::test]
    async fn test_oracle_offline_uses_fallback_plan_and_plain_answer() {
        let store = seeded_store().await;
        let embedder = HashEmbedder { fail: false };
        let oracle = ScriptedOracle::new(None, None);
        let engine = HybridSearch::new(&store, &embedder, &oracle, SearchParams::default());

        let retrieval = engine.retrieve("kubernetes").await.unwrap();
        assert_eq!(retrieval.plan, Some(SearchPlan::fallback("kubernetes")));
        assert_eq!(retrieval.results[0].message.id, "m2");

        let answer = engine.search("kubernetes").await.unwrap();
        assert!(answer.starts_with("Top matches for: kubernetes"));
        assert!(answer.contains("kubernetes deployment rollout"));
        assert!(answer.contains("3 messages across 1 sessions in 1 projects."));
    }

    #[tokio::test]
    async fn test_no_lists_yield_no_results() {
        let store = seeded_store().await;
        let embedder = HashEmbedder { fail: true };
        let oracle = ScriptedOracle::new(
            Some(r#"{"lexical_queries": ["nonexistentterm"], "semantic_query": "x"}"#),
            Some("formatted"),
        );
        let engine = HybridSearch::new(&store, &embedder, &oracle, SearchParams::default());

        let answer = engine.search("x").await.unwrap();
        assert_eq!(answer, "No relevant conversations found for: x");
        assert_eq!(oracle.format_calls.load(Ordering::SeqCst), 0);
    }

    /// Returns the same vector for every text.
    struct FixedEmbedder {
        vector: Vec<f32>,
        dims: usize,
    }

    #[async_trait]
    impl EmbeddingProvider for FixedEmbedder {
        fn model_name(&self) -> &str {
            "fixed"
        }
        fn dims(&self) -> usize {
            self.dims
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| self.vector.clone()).collect())
        }
    }

    async fn two_dim_store() -> CountingStore {
        let store = CountingStore {
            inner: InMemoryStore::new(),
            queries: AtomicUsize::new(0),
        };
        let rows: Vec<IndexedMessage> = ["m0", "m1"]
            .iter()
            .map(|id| IndexedMessage {
                message: Message {
                    id: id.to_string(),
                    session_id: "s1".to_string(),
                    project_path: "/work/app".to_string(),
                    source_path: "/archive/-work-app/s1.jsonl".to_string(),
                    timestamp: "2025-02-01T00:00:00Z".to_string(),
                    role: Role::User,
                    text: "postgres connection pooling".to_string(),
                },
                vector: vec![1.0, 0.0],
            })
            .collect();
        store.upsert_messages(&rows).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_stored_width_mismatch_skips_vector_list() {
        let store = two_dim_store().await;
        let embedder = FixedEmbedder {
            vector: vec![0.0, 0.0, 1.0],
            dims: 3,
        };
        let oracle = ScriptedOracle::new(None, None);
        let engine = HybridSearch::new(&store, &embedder, &oracle, SearchParams::default());

        let retrieval = engine.retrieve("kubernetes").await.unwrap();
        assert_eq!(retrieval.lists_fused, 0);
        assert!(retrieval.results.is_empty());
        assert_eq!(
            engine.search("kubernetes").await.unwrap(),
            "No relevant conversations found for: kubernetes"
        );
    }

    #[tokio::test]
    async fn test_query_vector_of_wrong_width_never_reaches_store() {
        let store = two_dim_store().await;
        let embedder = FixedEmbedder {
            vector: vec![1.0, 0.0],
            dims: 3,
        };
        let oracle = ScriptedOracle::new(None, None);
        let engine = HybridSearch::new(&store, &embedder, &oracle, SearchParams::default());

        let retrieval = engine.retrieve("kubernetes").await.unwrap();
        assert_eq!(retrieval.lists_fused, 0);
        // Only the lexical sub-query hit the store.
        assert_eq!(store.queries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_message_in_both_surfaces_ranks_first() {
        let store = seeded_store().await;
        let embedder = HashEmbedder { fail: false };
        let oracle = ScriptedOracle::new(
            Some(r#"{"lexical_queries": ["redis"], "semantic_query": "redis cache eviction policy"}"#),
            Some("formatted"),
        );
        let engine = HybridSearch::new(&store, &embedder, &oracle, SearchParams::default());
        let retrieval = engine.retrieve("redis").await.unwrap();
        assert_eq!(retrieval.results[0].message.id, "m1");
        assert!(retrieval.results[0].rrf_score > 1.0 / 61.0);
        assert!(retrieval.results[1..].iter().all(|h| h.rrf_score <= 1.0 / 61.0));
    }
}
