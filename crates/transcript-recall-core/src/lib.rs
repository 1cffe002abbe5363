//! # Transcript Recall Core
//!
//! Shared, WASM-safe logic for Transcript Recall: message models, transcript
//! extraction, store abstraction, batching indexer, rank fusion, query
//! planning and the hybrid search orchestrator.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! native-only dependencies. Storage, embedding and the LLM oracle are
//! reached only through the traits in [`store`], [`embedding`] and
//! [`oracle`], so every algorithm here can be tested with in-memory
//! stand-ins.

pub mod embedding;
pub mod extract;
pub mod fusion;
pub mod indexer;
pub mod models;
pub mod oracle;
pub mod search;
pub mod store;
