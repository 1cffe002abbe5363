//! Transcript parsing and message filtering.
//!
//! A transcript is a JSONL file: one JSON object per line, each describing a
//! single conversation turn:
//!
//! ```json
//! {"uuid": "…", "timestamp": "2025-01-02T03:04:05Z",
//!  "message": {"role": "user", "content": "…"}}
//! ```
//!
//! `content` is either a plain string or a list of typed parts
//! (`{"type": "text", "text": "…"}`, `{"type": "tool_use", …}`, …).
//!
//! # Filtering
//!
//! A record is rejected when, in order:
//!
//! 1. its role is neither `user` nor `assistant`;
//! 2. any content part is a `tool_use` or `tool_result`;
//! 3. its extracted text, trimmed, is shorter than [`MIN_TEXT_CHARS`];
//! 4. its id or extracted text is empty.
//!
//! Lines that are not valid JSON are skipped with a debug note; a bad line
//! never aborts the file.

use serde::Deserialize;

use crate::models::{Message, Role};

/// Minimum trimmed length (in characters) of an indexable message.
pub const MIN_TEXT_CHARS: usize = 10;

/// Part types that mark a turn as tool traffic rather than conversation.
const TOOL_PART_TYPES: [&str; 2] = ["tool_use", "tool_result"];

/// Provenance shared by every message of one transcript file.
#[derive(Debug, Clone)]
pub struct TranscriptSource {
    pub source_path: String,
    pub session_id: String,
    pub project_path: String,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    message: Option<RawMessage>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<RawContent>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawContent {
    Text(String),
    Parts(Vec<RawPart>),
    Other(serde::de::IgnoredAny),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPart {
    Text(String),
    Typed {
        #[serde(rename = "type", default)]
        kind: Option<String>,
        #[serde(default)]
        text: Option<String>,
    },
    Other(serde::de::IgnoredAny),
}

impl RawContent {
    fn has_tool_part(&self) -> bool {
        match self {
            RawContent::Parts(parts) => parts.iter().any(|p| match p {
                RawPart::Typed { kind: Some(k), .. } => TOOL_PART_TYPES.contains(&k.as_str()),
                _ => false,
            }),
            _ => false,
        }
    }

    fn plain_text(&self) -> String {
        match self {
            RawContent::Text(s) => s.clone(),
            RawContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    RawPart::Text(s) => Some(s.as_str()),
                    RawPart::Typed {
                        kind: Some(k),
                        text,
                    } if k == "text" => Some(text.as_deref().unwrap_or("")),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
            RawContent::Other(_) => String::new(),
        }
    }
}

/// Parse a whole transcript and return the accepted messages in file order.
pub fn extract_messages(content: &str, source: &TranscriptSource) -> Vec<Message> {
    let mut messages = Vec::new();
    let mut malformed = 0usize;
    let mut rejected = 0usize;

    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let entry: RawEntry = match serde_json::from_str(line) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(
                    path = %source.source_path,
                    line = idx + 1,
                    error = %e,
                    "skipping malformed line"
                );
                malformed += 1;
                continue;
            }
        };

        match accept_entry(entry, source) {
            Some(message) => messages.push(message),
            None => rejected += 1,
        }
    }

    tracing::debug!(
        path = %source.source_path,
        accepted = messages.len(),
        rejected,
        malformed,
        "transcript extracted"
    );

    messages
}

/// Apply the filtering policy to one parsed record.
fn accept_entry(entry: RawEntry, source: &TranscriptSource) -> Option<Message> {
    let raw = entry.message?;
    let role = Role::parse(raw.role.as_deref().unwrap_or(""))?;

    let content = raw.content?;
    if content.has_tool_part() {
        return None;
    }

    let text = content.plain_text();
    if text.trim().chars().count() < MIN_TEXT_CHARS {
        return None;
    }

    let id = entry.uuid.unwrap_or_default();
    if id.is_empty() || text.is_empty() {
        return None;
    }

    Some(Message {
        id,
        session_id: source.session_id.clone(),
        project_path: source.project_path.clone(),
        source_path: source.source_path.clone(),
        timestamp: entry.timestamp.unwrap_or_default(),
        role,
        text,
    })
}

/// Decode an archive directory name into the project path it stands for.
///
/// Archive directories encode absolute paths by replacing `/` with `-`, so a
/// leading `-` marks an encoded path and every `-` becomes `/`. Names without
/// a leading `-` are returned unchanged. Project names that themselves
/// contain `-` cannot be told apart and decode with extra separators.
pub fn decode_project_path(encoded: &str) -> String {
    match encoded.strip_prefix('-') {
        Some(rest) => format!("/{}", rest.replace('-', "/")),
        None => encoded.to_string(),
    }
}
