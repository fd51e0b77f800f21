//! Final reflection and structured extraction.
//!
//! After termination, one additional model request — a business analyst
//! persona reading the full transcript — produces the customer-facing
//! answer in a fixed two-section format: `SQL query:` followed by a
//! `sql`-tagged fenced code block, then `Usage notes:` followed by
//! bullet text.
//!
//! The extractor parses exactly that shape. Any deviation is a
//! [`MalformedSummary`](crate::error::AgentError::MalformedSummary), a
//! parse failure surfaced to the caller, not a tolerated variant.

use crate::error::AgentError;

use super::config::AgentConfig;
use super::conversation::Message;
use super::message::{ChatRequest, system_message, user_message};
use super::prompt::{build_summary_system, render_transcript};

/// Pseudo-agent id used to key cached summary calls.
pub const SUMMARIZER_ID: &str = "business_analyst";

/// Opening fence of the query block.
const SQL_FENCE_OPEN: &str = "```sql\n";
/// Closing fence of the query block.
const SQL_FENCE_CLOSE: &str = "\n```";
/// Marker preceding the usage notes.
const USAGE_NOTES_MARKER: &str = "Usage notes:";

/// The parsed two-section answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    /// The extracted SQL query.
    pub query: String,
    /// Everything following the usage-notes marker.
    pub notes: String,
}

/// Builds the reflection request carrying the original customer request
/// and the full transcript.
#[must_use]
pub fn build_summary_request(
    config: &AgentConfig,
    template: &str,
    request: &str,
    transcript: &[Message],
) -> ChatRequest {
    ChatRequest {
        model: config.model.clone(),
        messages: vec![
            system_message(&build_summary_system(template, request)),
            user_message(&render_transcript(transcript)),
        ],
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        tools: Vec::new(),
    }
}

/// Extracts the query and usage notes from a reflection reply.
///
/// The query is the content of the first fenced block opened immediately
/// after a `sql` language tag; the notes are everything after the literal
/// `Usage notes:` marker (minus one leading newline).
///
/// # Errors
///
/// Returns [`AgentError::MalformedSummary`] when either marker is absent.
pub fn extract(content: &str) -> Result<Summary, AgentError> {
    let fence_start =
        content
            .find(SQL_FENCE_OPEN)
            .ok_or_else(|| AgentError::MalformedSummary {
                reason: "no ```sql fenced block found".to_string(),
            })?;
    let body = &content[fence_start + SQL_FENCE_OPEN.len()..];
    let fence_end = body
        .find(SQL_FENCE_CLOSE)
        .ok_or_else(|| AgentError::MalformedSummary {
            reason: "sql fenced block is not closed".to_string(),
        })?;
    let query = body[..fence_end].to_string();

    let notes_start =
        content
            .find(USAGE_NOTES_MARKER)
            .ok_or_else(|| AgentError::MalformedSummary {
                reason: "no 'Usage notes:' marker found".to_string(),
            })?;
    let notes_raw = &content[notes_start + USAGE_NOTES_MARKER.len()..];
    let notes = notes_raw.strip_prefix('\n').unwrap_or(notes_raw).to_string();

    Ok(Summary { query, notes })
}
