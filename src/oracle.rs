//! LLM oracle backed by an OpenAI-compatible chat-completions API.
//!
//! OpenRouter is the default endpoint; any service speaking the same
//! `POST {base_url}/chat/completions` protocol works. One system prompt per
//! call: the planning prompt asks for a JSON plan document, the formatting
//! prompt asks for a Markdown answer built from the result digest.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use transcript_recall_core::models::{CorpusStats, FusedHit};
use transcript_recall_core::oracle::{describe_stats, render_results};

pub use transcript_recall_core::oracle::Oracle;

use crate::config::OracleConfig;
use crate::retry;

const PLAN_SYSTEM_PROMPT: &str = r#"You plan searches over an archive of past conversations between a user and an AI coding assistant.

Two indexes are available:
- a full-text index (SQLite FTS5, BM25 ranking, porter stemming)
- a vector index over sentence embeddings

Read the user's request and reply with a single JSON object and nothing else:
{
  "lexical_queries": ["...", "..."],
  "semantic_query": "..."
}

lexical_queries: one to four FTS5 queries. Supported syntax: AND, OR, NOT,
"quoted phrases", prefix* and NEAR(a b, 5). Prefer several narrow queries over one broad one.
semantic_query: a natural-language sentence describing what the user wants to find."#;

const FORMAT_SYSTEM_PROMPT: &str = r#"You answer questions about an archive of past conversations between a user and an AI coding assistant.

You receive the user's question and excerpts retrieved from the archive. Write a concise Markdown answer that:
- addresses the question directly
- quotes the relevant excerpts
- says when and in which project each conversation happened
- states plainly if the excerpts do not answer the question"#;

/// Chat-completions oracle.
pub struct ChatOracle {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
    format_limit: usize,
}

impl ChatOracle {
    /// `format_limit` bounds how many fused results go into the formatting prompt.
    pub fn new(config: &OracleConfig, format_limit: usize) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow!("{} environment variable not set", config.api_key_env))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            format_limit,
        })
    }

    async fn chat(&self, system: &str, user: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        tracing::debug!(model = %self.model, "oracle request");
        let json = retry::post_json(
            &self.client,
            &self.endpoint,
            Some(&self.api_key),
            &body,
            self.max_retries,
            "Oracle",
        )
        .await?;

        let content = parse_chat_response(&json)?;
        tracing::debug!(length = content.len(), "oracle response received");
        Ok(content)
    }
}

/// Extract `choices[0].message.content`.
fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Invalid chat response: missing choices[0].message.content"))
}

/// User message for the formatting call.
pub fn format_prompt(
    query: &str,
    results: &[FusedHit],
    stats: &CorpusStats,
    limit: usize,
) -> String {
    format!(
        "User query: {}\n\nSearch results:\n{}\n\nDatabase stats: {}\n\nWrite the answer for the user.",
        query,
        render_results(results, limit),
        describe_stats(stats)
    )
}

#[async_trait]
impl Oracle for ChatOracle {
    async fn plan(&self, query: &str) -> Result<String> {
        self.chat(PLAN_SYSTEM_PROMPT, query).await
    }

    async fn format(
        &self,
        query: &str,
        results: &[FusedHit],
        stats: &CorpusStats,
    ) -> Result<String> {
        let prompt = format_prompt(query, results, stats, self.format_limit);
        self.chat(FORMAT_SYSTEM_PROMPT, &prompt).await
    }
}

/// Oracle used when no LLM is configured. Every call fails, so planning
/// falls back to the raw query and answers are rendered as plain text.
pub struct DisabledOracle;

#[async_trait]
impl Oracle for DisabledOracle {
    async fn plan(&self, _query: &str) -> Result<String> {
        bail!("Oracle is disabled")
    }

    async fn format(&self, _q: &str, _r: &[FusedHit], _s: &CorpusStats) -> Result<String> {
        bail!("Oracle is disabled")
    }
}

/// Create the [`Oracle`] named by `config.provider`.
pub fn create_oracle(config: &OracleConfig, format_limit: usize) -> Result<Box<dyn Oracle>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledOracle)),
        "openai" => Ok(Box::new(ChatOracle::new(config, format_limit)?)),
        other => bail!("Unknown oracle provider: {}", other),
    }
}
