//! # Transcript Recall
//!
//! Local hybrid search over archived AI-assistant conversation transcripts.
//!
//! Transcripts (one JSONL file per session, one directory per project) are
//! parsed into user/assistant messages, embedded, and written to three
//! storage surfaces in one SQLite database: a relational table, an FTS5
//! index and a vector table. Queries are planned by an LLM oracle into
//! several lexical queries plus one semantic query, run against both
//! indexes, merged with Reciprocal Rank Fusion, and formatted back into an
//! answer.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐   ┌───────────────┐   ┌─────────────┐
//! │    Archive     │──▶│    Ingest     │──▶│   SQLite    │
//! │ <proj>/*.jsonl │   │ extract+embed │   │ rows + FTS5 │
//! └────────────────┘   └───────────────┘   │  + vectors  │
//!                                          └──────┬──────┘
//!                      ┌──────────────┐           │
//!                      │ Oracle (LLM) │◀──▶ hybrid search + RRF
//!                      └──────────────┘           │
//!                                       ┌─────────┴────────┐
//!                                       ▼                  ▼
//!                                  ┌──────────┐       ┌──────────┐
//!                                  │   CLI    │       │   HTTP   │
//!                                  │ (recall) │       │  (axum)  │
//!                                  └──────────┘       └──────────┘
//! ```
//!
//! The algorithms (extraction, indexing, fusion, planning, orchestration)
//! live in the `transcript-recall-core` crate; this crate supplies SQLite,
//! the concrete embedding providers, the chat oracle, and the CLI and HTTP
//! surfaces.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite implementation of the store traits |
//! | [`embedding`] | Embedding providers |
//! | [`oracle`] | Chat-completions oracle |
//! | [`ingest`] | Cursor-aware archive ingestion |
//! | [`search`] | Hybrid search entry points |
//! | [`session`] | Session context |
//! | [`stats`] | Corpus statistics |
//! | [`services`] | Process-lifetime collaborators |
//! | [`server`] | HTTP server |

pub mod config;
pub mod db;
pub mod embedding;
pub mod ingest;
pub mod migrate;
pub mod oracle;
pub mod retry;
pub mod search;
pub mod server;
pub mod services;
pub mod session;
pub mod sqlite_store;
pub mod stats;
