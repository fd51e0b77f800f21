//! Tool executor that dispatches tool calls to the store and doc index.
//!
//! Maps tool names to direct Rust function calls. This is the safety
//! boundary for generated SQL: mutating statements are screened out before
//! anything reaches the store, and engine failures come back as structured
//! payloads the agents can read, never as raised errors.

use serde::Deserialize;
use serde_json::json;

use crate::docs::{DocIndex, search_batch};
use crate::error::AgentError;
use crate::store::BusinessStore;

use super::tool::{ENGINE_INFO, EXECUTE, SCHEMA, SEARCH_DOCS, ToolCall, ToolResult};

/// Maximum raw byte length of tool argument JSON from the LLM.
const MAX_TOOL_ARGS_LEN: usize = 100_000;
/// Number of result rows returned to the transcript.
const PREVIEW_ROWS: usize = 5;
/// Tokens that mark a statement as mutating.
const MUTATING_KEYWORDS: [&str; 3] = ["insert", "update", "delete"];

/// Returns `true` if the query contains a standalone mutating keyword.
///
/// The screen splits on whitespace and compares each token
/// case-insensitively against `insert`, `update`, and `delete`. It is
/// deliberately coarse: punctuation-attached keywords (`"INSERT;"`),
/// `REPLACE INTO`, and comment-obfuscated keywords all pass. The store's
/// read-only posture is the second line of defense.
#[must_use]
pub fn is_mutating_query(query: &str) -> bool {
    query
        .split_whitespace()
        .any(|token| MUTATING_KEYWORDS.iter().any(|kw| token.eq_ignore_ascii_case(kw)))
}

/// Executes tool calls against the shared store and document index.
///
/// Holds references only; the long-lived resources are owned by the
/// caller and shared across conversations.
pub struct ToolExecutor<'a> {
    store: &'a BusinessStore,
    docs: &'a dyn DocIndex,
}

impl<'a> ToolExecutor<'a> {
    /// Creates a new executor over the given resources.
    #[must_use]
    pub fn new(store: &'a BusinessStore, docs: &'a dyn DocIndex) -> Self {
        Self { store, docs }
    }

    /// Dispatches a tool call to the appropriate function.
    ///
    /// Recoverable failures (screened queries, engine errors, bad
    /// arguments, unknown tools) come back as error-flagged
    /// [`ToolResult`]s destined for the transcript. Only resource-level
    /// failures — an unreachable store or index — are returned as `Err`
    /// and end the conversation.
    pub fn execute(&self, call: &ToolCall) -> Result<ToolResult, AgentError> {
        if call.arguments.len() > MAX_TOOL_ARGS_LEN {
            return Ok(error_result(
                call,
                format!(
                    "tool arguments too large ({} bytes, max {MAX_TOOL_ARGS_LEN})",
                    call.arguments.len()
                ),
            ));
        }

        match call.name.as_str() {
            ENGINE_INFO => Ok(ok_result(call, BusinessStore::engine_info())),
            SCHEMA => {
                let schema = self.store.schema()?;
                Ok(ok_result(call, schema))
            }
            EXECUTE => Ok(self.tool_execute(call)),
            SEARCH_DOCS => self.tool_search_docs(call),
            other => Ok(error_result(call, format!("unknown tool: {other}"))),
        }
    }

    /// Runs a guarded query and formats the preview payload.
    fn tool_execute(&self, call: &ToolCall) -> ToolResult {
        #[derive(Deserialize)]
        struct Args {
            query: String,
            purpose: String,
            next_step: String,
        }
        let args: Args = match serde_json::from_str(&call.arguments) {
            Ok(args) => args,
            Err(e) => return error_result(call, format!("invalid arguments: {e}")),
        };

        if is_mutating_query(&args.query) {
            let payload = json!({
                "error": "Only SELECT queries are allowed",
                "purpose": args.purpose,
                "next_step": args.next_step,
            });
            return ToolResult {
                tool_call_id: call.id.clone(),
                content: payload.to_string(),
                is_error: true,
            };
        }

        match self.store.select(&args.query) {
            Ok(result) => {
                let total = result.rows.len();
                let preview: Vec<_> = result.rows.into_iter().take(PREVIEW_ROWS).collect();
                let payload = json!({
                    "purpose": args.purpose,
                    "next_step": args.next_step,
                    "columns": result.columns,
                    "rows": preview,
                    "total": total,
                });
                ok_result(call, payload.to_string())
            }
            Err(e) => {
                let payload = json!({
                    "error": format!("Failed to execute query: {e}"),
                    "purpose": args.purpose,
                    "next_step": args.next_step,
                });
                ToolResult {
                    tool_call_id: call.id.clone(),
                    content: payload.to_string(),
                    is_error: true,
                }
            }
        }
    }

    /// Runs a batch documentation search.
    fn tool_search_docs(&self, call: &ToolCall) -> Result<ToolResult, AgentError> {
        #[derive(Deserialize)]
        struct Args {
            queries: Vec<String>,
        }
        let args: Args = match serde_json::from_str(&call.arguments) {
            Ok(args) => args,
            Err(e) => return Ok(error_result(call, format!("invalid arguments: {e}"))),
        };

        let passages = search_batch(self.docs, &args.queries)?;
        let content = serde_json::to_string_pretty(&passages).map_err(|e| {
            AgentError::ToolExecution {
                name: SEARCH_DOCS.to_string(),
                message: format!("serialization error: {e}"),
            }
        })?;
        Ok(ok_result(call, content))
    }
}

impl std::fmt::Debug for ToolExecutor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutor").finish_non_exhaustive()
    }
}

fn ok_result(call: &ToolCall, content: String) -> ToolResult {
    ToolResult {
        tool_call_id: call.id.clone(),
        content,
        is_error: false,
    }
}

fn error_result(call: &ToolCall, message: String) -> ToolResult {
    ToolResult {
        tool_call_id: call.id.clone(),
        content: message,
        is_error: true,
    }
}
