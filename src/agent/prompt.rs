//! System prompts and template builders for the crew.
//!
//! Prompts are the core instructions that define each role's behavior.
//! Template builders format the roster introduction, the rendered
//! transcript, and the speaker-selection and summary requests.

use std::fmt::Write;
use std::path::Path;

use super::conversation::Message;
use super::role::RoleAgent;

/// System prompt for the product manager role.
pub const PRODUCT_MANAGER_SYSTEM_PROMPT: &str = r#"Assistant is a product manager with 20 years' experience in the software industry.

# Objective
Define project requirements and update tasks backlog.

# Rules
- Do not add any introductory phrases
- For complex tasks, cut them into smaller pieces
- For each task, provide a status, clear description, expected result, acceptance criteria, and owner
- If team started to work without scoping, scope the project first
- Only use functional terms
- Preserve the data privacy at maximum
- Project is restricted to creating a SQL query to solve a problem
- The project is completed when all tasks are in status "done"
- Use simple and clear language
- Use the feedbacks from the team members to update the tasks

# Response format if the project is in progress
Task 1
Acceptance criteria: xxx
Description: xxx
Expected result: xxx
Name: xxx
Owner: xxx
Status: todo / in progress / done

Task 2
xxx

# Response format if the project is completed
project is completed"#;

/// System prompt for the SQL developer role.
pub const DEVELOPER_SYSTEM_PROMPT: &str = r#"Assistant is a SQL developer, with 20 years' experience in SQL.

# Objective
Write and debug SQL to solve a problem.

# Rules
- Always answer with a SQL query
- Be concise and clear
- Do not add any introductory phrases
- Follow the business requirements as closely as possible
- If a task is not feasible, answer "task xxx is not feasible" and explain why
- If a task should be updated, argue why
- Make sure all the fixes are implemented before finishing
- Propose a mitigation if a requirement is not feasible
- Query must be executed as often as possible, to test it
- Use security best practices
- Use the feedbacks and fixes from the team members to improve the code
- Write a clean and efficient code

# Response format if the code is in progress
```sql
xxx
```
What changed:
- xxx

# Response format if a task is not feasible
task xxx is not feasible
Reasons:
- xxx"#;

/// System prompt for the quality analyst role.
pub const QUALITY_ANALYST_SYSTEM_PROMPT: &str = r#"Assistant is a quality analyst with 20 years' experience in quality assurance. Assistant is a perfectionist with an eye for detail.

# Objective
Examine SQL code written by the developer, confirm that it works as expected and provide feedback.

# Rules
- Always use deterministic queries, never use random functions or static values
- Be tricky, quality is the highest priority
- Database structure cannot be changed, do your best with the current structure
- Do not add any introductory phrases
- If a change requires a specific skill, explain it
- If a task should be updated, argue why
- If the test query result is empty, make sure to double check the query
- If there are no fixes to implement to the latest code solving a task, answer "task xxx is validated"
- Query must be tested and reviewed before validating
- Use specific and detailed language

# Metrics to check
- Bugs
- Maintainability
- Performance
- Security

# Response format if the task is in progress
Fixes to implement to task xxx:
- xxx

# Response format if a task is validated
task xxx is validated"#;

/// System prompt template for the speaker-selection call.
///
/// `{roles}` expands to one `name: description` line per participant and
/// `{names}` to the bracketed list of participant names.
pub const SELECTOR_SYSTEM_PROMPT: &str = r"You are in a role play game. The following roles are available:
{roles}

Read the following conversation. Then select the next role from {names} to play. Only return the role.";

/// System prompt template for the final reflection request.
///
/// `{request}` expands to the original customer request.
pub const SUMMARY_SYSTEM_PROMPT: &str = r#"Assistant is a business analyst, with 20 years of experience in the technology field.

# Objective
Answer to a customer's request, asking for a SQL query. Use the conversation with the engineering team as your source of information.

# Rules
- Do not add any introductory phrases
- Usage notes are made to help the customer use the query and understand the result
- Use Markdown to format the response (e.g. bullet points, code blocks, etc.)
- Use simple language, understandable by any non-technical person

# Customer request
{request}

# Response format
SQL query:
```sql
xxx
```
Usage notes:
- xxx"#;

/// Default prompt directory under user config.
const DEFAULT_PROMPT_DIR: &str = ".config/sql-crew/prompts";

/// Filename for the product manager prompt template.
const PRODUCT_MANAGER_FILENAME: &str = "product_manager.md";
/// Filename for the developer prompt template.
const DEVELOPER_FILENAME: &str = "developer.md";
/// Filename for the quality analyst prompt template.
const QUALITY_ANALYST_FILENAME: &str = "quality_analyst.md";
/// Filename for the selector prompt template.
const SELECTOR_FILENAME: &str = "selector.md";
/// Filename for the summary prompt template.
const SUMMARY_FILENAME: &str = "summary.md";

/// A set of system prompts for all roles.
///
/// Loaded from external template files when available, falling back to
/// compiled-in defaults. Use [`PromptSet::load`] to resolve the prompt
/// directory from CLI flags, environment variables, or the default path.
#[derive(Debug, Clone)]
pub struct PromptSet {
    /// System prompt for the product manager.
    pub product_manager: String,
    /// System prompt for the SQL developer.
    pub developer: String,
    /// System prompt for the quality analyst.
    pub quality_analyst: String,
    /// Template for the speaker-selection call.
    pub selector: String,
    /// Template for the final reflection request.
    pub summary: String,
}

impl PromptSet {
    /// Loads prompts from the given directory, falling back to compiled-in defaults.
    ///
    /// Resolution order for the directory:
    /// 1. Explicit `prompt_dir` argument (from the `--prompt-dir` CLI flag)
    /// 2. `SQL_CREW_PROMPT_DIR` environment variable
    /// 3. `~/.config/sql-crew/prompts/`
    ///
    /// Each file is loaded independently — a missing file uses its default.
    #[must_use]
    pub fn load(prompt_dir: Option<&Path>) -> Self {
        let resolved_dir = prompt_dir
            .map(std::path::PathBuf::from)
            .or_else(|| {
                std::env::var("SQL_CREW_PROMPT_DIR")
                    .ok()
                    .map(std::path::PathBuf::from)
            })
            .or_else(|| dirs::home_dir().map(|h| h.join(DEFAULT_PROMPT_DIR)));

        let load_file = |filename: &str, default: &str| -> String {
            resolved_dir
                .as_ref()
                .map(|dir| dir.join(filename))
                .and_then(|path| std::fs::read_to_string(&path).ok())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            product_manager: load_file(PRODUCT_MANAGER_FILENAME, PRODUCT_MANAGER_SYSTEM_PROMPT),
            developer: load_file(DEVELOPER_FILENAME, DEVELOPER_SYSTEM_PROMPT),
            quality_analyst: load_file(QUALITY_ANALYST_FILENAME, QUALITY_ANALYST_SYSTEM_PROMPT),
            selector: load_file(SELECTOR_FILENAME, SELECTOR_SYSTEM_PROMPT),
            summary: load_file(SUMMARY_FILENAME, SUMMARY_SYSTEM_PROMPT),
        }
    }

    /// Returns compiled-in defaults without checking the filesystem.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            product_manager: PRODUCT_MANAGER_SYSTEM_PROMPT.to_string(),
            developer: DEVELOPER_SYSTEM_PROMPT.to_string(),
            quality_analyst: QUALITY_ANALYST_SYSTEM_PROMPT.to_string(),
            selector: SELECTOR_SYSTEM_PROMPT.to_string(),
            summary: SUMMARY_SYSTEM_PROMPT.to_string(),
        }
    }

    /// Writes the compiled-in default prompts to the given directory.
    ///
    /// Creates the directory if it does not exist. Existing files are
    /// **not** overwritten — use this for initial scaffolding only.
    pub fn write_defaults(dir: &Path) -> std::io::Result<Vec<std::path::PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let templates = [
            (PRODUCT_MANAGER_FILENAME, PRODUCT_MANAGER_SYSTEM_PROMPT),
            (DEVELOPER_FILENAME, DEVELOPER_SYSTEM_PROMPT),
            (QUALITY_ANALYST_FILENAME, QUALITY_ANALYST_SYSTEM_PROMPT),
            (SELECTOR_FILENAME, SELECTOR_SYSTEM_PROMPT),
            (SUMMARY_FILENAME, SUMMARY_SYSTEM_PROMPT),
        ];

        let mut written = Vec::new();
        for (filename, content) in &templates {
            let path = dir.join(filename);
            if !path.exists() {
                std::fs::write(&path, content)?;
                written.push(path);
            }
        }

        Ok(written)
    }

    /// Returns the default prompt directory under the user's home.
    #[must_use]
    pub fn default_dir() -> Option<std::path::PathBuf> {
        dirs::home_dir().map(|h| h.join(DEFAULT_PROMPT_DIR))
    }
}

/// Formats the roster as `name: description` lines.
#[must_use]
pub fn format_roster(agents: &[RoleAgent]) -> String {
    let mut out = String::new();
    for agent in agents {
        let _ = writeln!(out, "{}: {}", agent.id, agent.description);
    }
    out.trim_end().to_string()
}

/// Builds the roster introduction shown to every participant at start.
#[must_use]
pub fn build_intro_message(agents: &[RoleAgent]) -> String {
    format!(
        "Hello everyone. We have assembled a great team today to answer questions and solve \
         tasks. In attendance are:\n\n{}",
        format_roster(agents)
    )
}

/// Renders one transcript message as plain text.
///
/// Tool exchanges are annotated inline so roles without native tool
/// support still see what was called.
#[must_use]
pub fn render_message(message: &Message) -> String {
    let mut out = format!("{}: {}", message.speaker, message.content);
    for exchange in &message.tool_calls {
        let _ = write!(
            out,
            "\n[called {}({})]",
            exchange.call.name, exchange.call.arguments
        );
    }
    out
}

/// Renders the full transcript as plain text, one message per block.
#[must_use]
pub fn render_transcript(messages: &[Message]) -> String {
    let rendered: Vec<String> = messages.iter().map(render_message).collect();
    rendered.join("\n\n")
}

/// Expands the selector template for the given roster.
#[must_use]
pub fn build_selector_system(template: &str, agents: &[RoleAgent]) -> String {
    let names: Vec<&str> = agents.iter().map(|a| a.id.as_str()).collect();
    template
        .replace("{roles}", &format_roster(agents))
        .replace("{names}", &format!("[{}]", names.join(", ")))
}

/// Builds the user message for the speaker-selection call.
#[must_use]
pub fn build_selector_prompt(messages: &[Message]) -> String {
    format!(
        "{}\n\nRead the above conversation. Then select the next role to play. \
         Only return the role.",
        render_transcript(messages)
    )
}

/// Expands the summary template for the given customer request.
#[must_use]
pub fn build_summary_system(template: &str, request: &str) -> String {
    template.replace("{request}", request)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::agent::role::crew;

    #[test]
    fn test_prompts_not_empty() {
        assert!(!PRODUCT_MANAGER_SYSTEM_PROMPT.is_empty());
        assert!(!DEVELOPER_SYSTEM_PROMPT.is_empty());
        assert!(!QUALITY_ANALYST_SYSTEM_PROMPT.is_empty());
        assert!(!SELECTOR_SYSTEM_PROMPT.is_empty());
        assert!(!SUMMARY_SYSTEM_PROMPT.is_empty());
    }

    #[test]
    fn test_intro_lists_all_roles() {
        let agents = crew(&PromptSet::defaults());
        let intro = build_intro_message(&agents);
        assert!(intro.contains("developer:"));
        assert!(intro.contains("quality_analyst:"));
        assert!(intro.contains("product_manager:"));
    }

    #[test]
    fn test_selector_system_expands_placeholders() {
        let agents = crew(&PromptSet::defaults());
        let system = build_selector_system(SELECTOR_SYSTEM_PROMPT, &agents);
        assert!(!system.contains("{roles}"));
        assert!(!system.contains("{names}"));
        assert!(system.contains("[developer, quality_analyst, product_manager]"));
    }

    #[test]
    fn test_summary_system_embeds_request() {
        let system = build_summary_system(SUMMARY_SYSTEM_PROMPT, "list overdue invoices");
        assert!(system.contains("list overdue invoices"));
        assert!(system.contains("SQL query:"));
        assert!(system.contains("Usage notes:"));
    }

    #[test]
    fn test_render_message_annotates_tool_calls() {
        use crate::agent::conversation::ToolExchange;
        use crate::agent::tool::{ToolCall, ToolResult};

        let message = Message::with_tool_calls(
            "quality_analyst",
            "Running the query.",
            vec![ToolExchange {
                call: ToolCall {
                    id: "call_1".to_string(),
                    name: "execute".to_string(),
                    arguments: r#"{"query":"SELECT 1"}"#.to_string(),
                },
                result: ToolResult {
                    tool_call_id: "call_1".to_string(),
                    content: r#"{"total":1}"#.to_string(),
                    is_error: false,
                },
            }],
        );
        let rendered = render_message(&message);
        assert!(rendered.starts_with("quality_analyst: Running the query."));
        assert!(rendered.contains("[called execute("));
    }

    #[test]
    fn test_write_defaults_skips_existing() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
        let first = PromptSet::write_defaults(dir.path())
            .unwrap_or_else(|e| panic!("write failed: {e}"));
        assert_eq!(first.len(), 5);
        let second = PromptSet::write_defaults(dir.path())
            .unwrap_or_else(|e| panic!("write failed: {e}"));
        assert!(second.is_empty());
    }
}
