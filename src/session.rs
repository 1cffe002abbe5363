//! Session context: the full conversation a search hit came from.
//!
//! Used by `recall session <id>` and `GET /sessions/{id}`.

use anyhow::{bail, Result};
use serde::Serialize;

use transcript_recall_core::models::Message;
use transcript_recall_core::store::MessageStore;

use crate::services::Services;

#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub messages: Vec<Message>,
}

/// All indexed messages of a session, oldest first. Errors if none exist.
pub async fn get_session(services: &Services, session_id: &str) -> Result<SessionResponse> {
    let messages = services.store.session_messages(session_id).await?;
    if messages.is_empty() {
        bail!("session not found: {}", session_id);
    }
    Ok(SessionResponse {
        session_id: session_id.to_string(),
        messages,
    })
}

/// `recall session <id>`.
pub async fn run_session(services: &Services, session_id: &str) -> Result<()> {
    let session = get_session(services, session_id).await?;

    if let Some(first) = session.messages.first() {
        println!("Session: {}", session.session_id);
        println!("Project: {}", first.project_path);
        println!("Source:  {}", first.source_path);
        println!("{}", "-".repeat(60));
    }

    for m in &session.messages {
        println!();
        println!("[{}] {}:", m.timestamp, m.role);
        println!("{}", m.text);
    }

    Ok(())
}
