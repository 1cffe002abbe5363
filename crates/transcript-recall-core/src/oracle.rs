//! Query planning and answer formatting through an LLM oracle.
//!
//! The oracle is non-deterministic and network-bound, so the core only
//! sees it through the two calls of the [`Oracle`] trait. Everything that
//! interprets its output lives here and is deterministic:
//!
//! - [`parse_plan`] turns the oracle's plan document into a [`SearchPlan`].
//! - [`plan_search`] wraps the call and falls back to
//!   [`SearchPlan::fallback`] on any error or unparseable response.
//! - [`render_results`] produces the result digest both the formatting
//!   prompt and the plain-text fallback answer are built from.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crate::models::{CorpusStats, FusedHit, SearchPlan};

/// Maximum characters of message text included per result in a digest.
pub const EXCERPT_CHARS: usize = 500;

/// The query-planning and response-formatting collaborator.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Propose a search plan for `query`. Returns the raw plan document.
    async fn plan(&self, query: &str) -> Result<String>;

    /// Turn fused results into prose for the user.
    async fn format(&self, query: &str, results: &[FusedHit], stats: &CorpusStats)
        -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct PlanDocument {
    #[serde(default, alias = "fts_queries")]
    lexical_queries: Vec<String>,
    #[serde(default, alias = "vec_query")]
    semantic_query: Option<String>,
}

/// Strip a surrounding Markdown code fence (```` ```json ```` or ```` ``` ````).
fn strip_code_fence(raw: &str) -> &str {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("```json") {
        s = rest;
    } else if let Some(rest) = s.strip_prefix("```") {
        s = rest;
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

/// Parse an oracle plan document.
///
/// Accepts `lexical_queries`/`semantic_query` or the `fts_queries`/`vec_query`
/// aliases. A missing semantic query defaults to `query`; blank lexical
/// queries are dropped. Returns `None` when the document is not a JSON
/// object of that shape.
pub fn parse_plan(raw: &str, query: &str) -> Option<SearchPlan> {
    let doc: PlanDocument = serde_json::from_str(strip_code_fence(raw)).ok()?;

    let lexical_queries = doc
        .lexical_queries
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect();

    let semantic_query = doc
        .semantic_query
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .unwrap_or_else(|| query.to_string());

    Some(SearchPlan {
        lexical_queries,
        semantic_query,
    })
}

/// Ask the oracle for a plan, never failing.
pub async fn plan_search<O: Oracle + ?Sized>(oracle: &O, query: &str) -> SearchPlan {
    match oracle.plan(query).await {
        Ok(raw) => match parse_plan(&raw, query) {
            Some(plan) => plan,
            None => {
                tracing::warn!(
                    response_len = raw.len(),
                    "unparseable search plan, using fallback"
                );
                SearchPlan::fallback(query)
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "search planning failed, using fallback");
            SearchPlan::fallback(query)
        }
    }
}

/// Answer returned when nothing matched (or the corpus is empty).
pub fn no_results_answer(query: &str) -> String {
    format!("No relevant conversations found for: {}", query)
}

/// Render the top `limit` results as a Markdown digest.
///
/// Each entry shows the date part of the timestamp, the last component of
/// the project path, the role and at most [`EXCERPT_CHARS`] characters.
pub fn render_results(results: &[FusedHit], limit: usize) -> String {
    let mut out = String::new();
    for (i, hit) in results.iter().take(limit).enumerate() {
        let m = &hit.message;
        let date: String = if m.timestamp.is_empty() {
            "unknown".to_string()
        } else {
            m.timestamp.chars().take(10).collect()
        };
        let project = m
            .project_path
            .rsplit('/')
            .next()
            .filter(|p| !p.is_empty())
            .unwrap_or("unknown");
        let excerpt: String = m.text.chars().take(EXCERPT_CHARS).collect();
        out.push_str(&format!(
            "\n---\n**Result {}** ({}, {}, {}):\n{}\n",
            i + 1,
            date,
            project,
            m.role,
            excerpt
        ));
    }
    out
}

/// One-line corpus summary used in prompts and fallback answers.
pub fn describe_stats(stats: &CorpusStats) -> String {
    format!(
        "{} messages across {} sessions in {} projects.",
        stats.total_messages, stats.sessions, stats.projects
    )
}

/// Answer used when the formatting oracle is unavailable.
pub fn plain_answer(
    query: &str,
    results: &[FusedHit],
    stats: &CorpusStats,
    limit: usize,
) -> String {
    format!(
        "Top matches for: {}\n{}\nDatabase stats: {}",
        query,
        render_results(results, limit),
        describe_stats(stats)
    )
}
