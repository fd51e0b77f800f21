//! Tool definitions and the capability registry.
//!
//! Each capability is declared once with a typed JSON Schema contract and a
//! single designated executor role. Agents reference capabilities by name:
//! an agent may *expose* a tool (describe it to the model) without being
//! its executor, and the registry is the only place where the two are tied
//! together.

use serde::{Deserialize, Serialize};
use serde_json::json;

/// Name of the engine-information tool.
pub const ENGINE_INFO: &str = "engine_info";
/// Name of the schema-introspection tool.
pub const SCHEMA: &str = "schema";
/// Name of the guarded query-execution tool.
pub const EXECUTE: &str = "execute";
/// Name of the documentation-search tool.
pub const SEARCH_DOCS: &str = "search_docs";

/// A tool definition that can be sent to an LLM for function-calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (must match the dispatch table in the executor).
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema object describing the tool's parameters.
    pub parameters: serde_json::Value,
}

/// A tool call requested by the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this call (assigned by the provider).
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON-encoded arguments for the tool.
    pub arguments: String,
}

/// The result of executing a tool call.
///
/// Error results are structured payloads fed back into the transcript so
/// the agents can see and react to them; they are never raised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID of the tool call this result corresponds to.
    pub tool_call_id: String,
    /// Result content (JSON string on success, error payload on failure).
    pub content: String,
    /// Whether this result represents an error.
    pub is_error: bool,
}

/// A capability registered with its designated executor role.
#[derive(Debug, Clone)]
pub struct RegisteredTool {
    /// The callable contract.
    pub definition: ToolDefinition,
    /// ID of the one agent permitted to perform the side effect.
    pub executor: String,
}

/// Registry of all callable capabilities.
///
/// Constructed once at startup and passed by reference to the orchestrator
/// and agents. Even when several agents can request a tool, exactly one
/// designated executor per tool performs the call.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistry {
    /// Registry with no tools.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The standard crew registry.
    ///
    /// Mirrors the role assignment of the reference crew: the developer
    /// executes introspection and documentation search, the quality
    /// analyst executes queries.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            tools: vec![
                RegisteredTool {
                    definition: def_engine_info(),
                    executor: "developer".to_string(),
                },
                RegisteredTool {
                    definition: def_schema(),
                    executor: "developer".to_string(),
                },
                RegisteredTool {
                    definition: def_execute(),
                    executor: "quality_analyst".to_string(),
                },
                RegisteredTool {
                    definition: def_search_docs(),
                    executor: "developer".to_string(),
                },
            ],
        }
    }

    /// Registers a tool, replacing any existing registration of the same
    /// name so a tool never ends up with two executors.
    pub fn register(&mut self, definition: ToolDefinition, executor: impl Into<String>) {
        let executor = executor.into();
        self.tools.retain(|t| t.definition.name != definition.name);
        self.tools.push(RegisteredTool {
            definition,
            executor,
        });
    }

    /// Returns the registered tools in registration order.
    #[must_use]
    pub fn tools(&self) -> &[RegisteredTool] {
        &self.tools
    }

    /// Returns the designated executor for a tool, if registered.
    #[must_use]
    pub fn executor_of(&self, name: &str) -> Option<&str> {
        self.tools
            .iter()
            .find(|t| t.definition.name == name)
            .map(|t| t.executor.as_str())
    }

    /// Returns the definitions for the subset of tools an agent exposes.
    ///
    /// Order follows the registry, not the exposure list, so identical
    /// exposure sets always produce identical definitions.
    #[must_use]
    pub fn definitions_for(&self, exposed: &[String]) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .filter(|t| exposed.iter().any(|name| name == &t.definition.name))
            .map(|t| t.definition.clone())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tool schema definitions
// ---------------------------------------------------------------------------

/// Defines the `engine_info` tool.
fn def_engine_info() -> ToolDefinition {
    ToolDefinition {
        name: ENGINE_INFO.to_string(),
        description: "Get the SQL engine information, such as the version and the software used."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        }),
    }
}

/// Defines the `schema` tool.
fn def_schema() -> ToolDefinition {
    ToolDefinition {
        name: SCHEMA.to_string(),
        description: "Get the SQL schema of the database. Use it to understand the structure \
                       of the database."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        }),
    }
}

/// Defines the `execute` tool.
fn def_execute() -> ToolDefinition {
    ToolDefinition {
        name: EXECUTE.to_string(),
        description: "Run a SQL query on the database, only SELECT actions are allowed. \
                       Returns the first 5 rows plus the total row count."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "SQL query."
                },
                "purpose": {
                    "type": "string",
                    "description": "Purpose of executing this query, must include the reason \
                                    and the expected result."
                },
                "next_step": {
                    "type": "string",
                    "description": "What to do after executing the query, must include action \
                                    and who should do it."
                }
            },
            "required": ["query", "purpose", "next_step"],
            "additionalProperties": false
        }),
    }
}

/// Defines the `search_docs` tool.
fn def_search_docs() -> ToolDefinition {
    ToolDefinition {
        name: SEARCH_DOCS.to_string(),
        description: "Search in the SQL documentation. Use it to understand how functions and \
                       syntax work."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "queries": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Multiple sentences to search into the documentation \
                                    database, each one should be few words, use them to \
                                    expand the field of view."
                }
            },
            "required": ["queries"],
            "additionalProperties": false
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_contents() {
        let registry = ToolRegistry::standard();
        assert_eq!(registry.tools().len(), 4);
        assert_eq!(registry.executor_of(ENGINE_INFO), Some("developer"));
        assert_eq!(registry.executor_of(SCHEMA), Some("developer"));
        assert_eq!(registry.executor_of(EXECUTE), Some("quality_analyst"));
        assert_eq!(registry.executor_of(SEARCH_DOCS), Some("developer"));
        assert_eq!(registry.executor_of("drop_tables"), None);
    }

    #[test]
    fn test_register_replaces_executor() {
        let mut registry = ToolRegistry::standard();
        registry.register(def_execute(), "developer");
        assert_eq!(registry.executor_of(EXECUTE), Some("developer"));
        // Still exactly one registration for the tool.
        let count = registry
            .tools()
            .iter()
            .filter(|t| t.definition.name == EXECUTE)
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_definitions_for_filters_by_exposure() {
        let registry = ToolRegistry::standard();
        let exposed = vec![SCHEMA.to_string(), SEARCH_DOCS.to_string()];
        let defs = registry.definitions_for(&exposed);
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec![SCHEMA, SEARCH_DOCS]);
    }

    #[test]
    fn test_all_definitions_have_valid_schemas() {
        let registry = ToolRegistry::standard();
        for tool in registry.tools() {
            let def = &tool.definition;
            assert!(!def.name.is_empty());
            assert!(!def.description.is_empty());
            assert!(def.parameters.is_object());
            assert_eq!(def.parameters["type"], "object");
        }
    }

    #[test]
    fn test_tool_result_serialization() {
        let result = ToolResult {
            tool_call_id: "call_123".to_string(),
            content: r#"{"rows":[],"total":0}"#.to_string(),
            is_error: false,
        };
        let json = serde_json::to_string(&result).unwrap_or_default();
        assert!(json.contains("call_123"));
        assert!(!result.is_error);
    }
}
