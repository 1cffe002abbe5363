//! Process-lifetime collaborators.
//!
//! [`Services`] is built once at startup from [`Config`] and passed by
//! reference (or `Arc`) to every command and to the HTTP server. It owns the
//! SQLite pool, the embedding provider and the oracle; nothing else in the
//! crate constructs them.

use anyhow::Result;

use transcript_recall_core::embedding::EmbeddingProvider;
use transcript_recall_core::oracle::Oracle;
use transcript_recall_core::search::SearchParams;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;
use crate::{db, embedding, migrate, oracle};

pub struct Services {
    pub config: Config,
    pub store: SqliteStore,
    pub embedder: Box<dyn EmbeddingProvider>,
    pub oracle: Box<dyn Oracle>,
}

impl Services {
    /// Connect, migrate, and construct the configured providers.
    pub async fn open(config: &Config) -> Result<Self> {
        let embedder = embedding::create_provider(&config.embedding)?;
        let oracle = oracle::create_oracle(&config.oracle, config.retrieval.format_limit)?;
        Self::with_providers(config, embedder, oracle).await
    }

    /// Like [`open`](Self::open) but with caller-supplied providers.
    pub async fn with_providers(
        config: &Config,
        embedder: Box<dyn EmbeddingProvider>,
        oracle: Box<dyn Oracle>,
    ) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::migrate(&pool).await?;

        tracing::debug!(
            db = %config.db.path.display(),
            embedding = embedder.model_name(),
            dims = embedder.dims(),
            "services ready"
        );

        Ok(Self {
            config: config.clone(),
            store: SqliteStore::new(pool),
            embedder,
            oracle,
        })
    }

    pub fn search_params(&self) -> SearchParams {
        self.config.retrieval.search_params()
    }

    /// Release the connection pool.
    pub async fn close(&self) {
        self.store.pool().close().await;
    }
}
