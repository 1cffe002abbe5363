use anyhow::{bail, Result};

use transcript_recall_core::embedding::EmbeddingProvider;
use transcript_recall_core::oracle::Oracle;
use transcript_recall_core::search::{HybridSearch, Retrieval};

use crate::services::Services;
use crate::sqlite_store::SqliteStore;

type Engine<'a> = HybridSearch<'a, SqliteStore, dyn EmbeddingProvider, dyn Oracle>;

fn engine(services: &Services) -> Engine<'_> {
    HybridSearch::new(
        &services.store,
        services.embedder.as_ref(),
        services.oracle.as_ref(),
        services.search_params(),
    )
}

/// Run a hybrid search and return the formatted answer.
pub async fn answer(services: &Services, query: &str) -> Result<String> {
    let query = query.trim();
    if query.is_empty() {
        bail!("query must not be empty");
    }
    engine(services).search(query).await
}

/// Run retrieval only: plan, per-surface queries and fusion.
pub async fn retrieve(services: &Services, query: &str) -> Result<Retrieval> {
    let query = query.trim();
    if query.is_empty() {
        bail!("query must not be empty");
    }
    engine(services).retrieve(query).await
}

/// `recall search "<query>" [--raw]`.
pub async fn run_search(services: &Services, query: &str, raw: bool) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    if !raw {
        println!("{}", answer(services, query).await?);
        return Ok(());
    }

    let retrieval = retrieve(services, query).await?;
    if let Some(plan) = &retrieval.plan {
        println!("plan:");
        for q in &plan.lexical_queries {
            println!("  lexical:  {}", q);
        }
        println!("  semantic: {}", plan.semantic_query);
        println!();
    }

    if retrieval.results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    let limit = services.config.retrieval.format_limit;
    for (i, hit) in retrieval.results.iter().take(limit).enumerate() {
        let m = &hit.message;
        let date: String = m.timestamp.chars().take(10).collect();
        println!("{}. [{:.4}] {} / {}", i + 1, hit.rrf_score, m.project_path, m.role);
        println!("    date: {}", date);
        println!("    session: {}", m.session_id);
        let excerpt: String = m.text.chars().take(200).collect();
        println!("    excerpt: \"{}\"", excerpt.replace('\n', " ").trim());
        println!("    id: {}", m.id);
        println!();
    }

    Ok(())
}
