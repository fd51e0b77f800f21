//! Conversational roles.
//!
//! A [`RoleAgent`] is a pure configuration object: a name, a one-line
//! description used for speaker selection, a system prompt, and two tool
//! permission sets. Agents hold no state between turns; every turn is
//! derived solely from the transcript passed in.

use super::prompt::PromptSet;
use super::tool::{ENGINE_INFO, EXECUTE, SCHEMA, SEARCH_DOCS};

/// A named role bound to a system prompt and tool permissions.
///
/// `exposed_tools` are the capabilities the model is told about when this
/// role speaks; `executable_tools` are the ones the orchestration layer
/// may run on this role's behalf. The two sets are independent: a role
/// can request a tool whose execution is delegated to a peer.
#[derive(Debug, Clone)]
pub struct RoleAgent {
    /// Stable identifier, used as the transcript speaker name.
    pub id: String,
    /// One-line role description shown to the speaker-selection model.
    pub description: String,
    /// System prompt that defines the role's behavior.
    pub system_prompt: String,
    /// Tools this role may reference in its responses.
    pub exposed_tools: Vec<String>,
    /// Tools the orchestrator may execute when this role is designated.
    pub executable_tools: Vec<String>,
}

impl RoleAgent {
    /// Creates a role with no tool permissions.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            system_prompt: system_prompt.into(),
            exposed_tools: Vec::new(),
            executable_tools: Vec::new(),
        }
    }

    /// Adds tools the role may reference in its responses.
    #[must_use]
    pub fn exposing(mut self, tools: &[&str]) -> Self {
        self.exposed_tools
            .extend(tools.iter().map(ToString::to_string));
        self
    }

    /// Adds tools the role is permitted to execute.
    #[must_use]
    pub fn executing(mut self, tools: &[&str]) -> Self {
        self.executable_tools
            .extend(tools.iter().map(ToString::to_string));
        self
    }

    /// Returns `true` if the role exposes the named tool.
    #[must_use]
    pub fn exposes(&self, name: &str) -> bool {
        self.exposed_tools.iter().any(|t| t == name)
    }

    /// Returns `true` if the role may execute the named tool.
    #[must_use]
    pub fn can_execute(&self, name: &str) -> bool {
        self.executable_tools.iter().any(|t| t == name)
    }
}

/// Builds the standard three-role crew.
///
/// Order matters: the first participant is the deterministic fallback
/// when speaker selection fails, and the developer leads by convention.
#[must_use]
pub fn crew(prompts: &PromptSet) -> Vec<RoleAgent> {
    let developer = RoleAgent::new(
        "developer",
        "SQL Developer, write code. Use team members' comments and corrections to improve \
         code. Must be consulted when writing code.",
        prompts.developer.clone(),
    )
    .exposing(&[ENGINE_INFO, SCHEMA, SEARCH_DOCS])
    .executing(&[ENGINE_INFO, SCHEMA, SEARCH_DOCS]);

    let quality_analyst = RoleAgent::new(
        "quality_analyst",
        "Quality Analyst, provide feedbacks on the code. After writing code, review it. \
         Must be consulted to review code after developer.",
        prompts.quality_analyst.clone(),
    )
    .exposing(&[EXECUTE])
    .executing(&[EXECUTE]);

    let product_manager = RoleAgent::new(
        "product_manager",
        "Product Manager, scope the project. Must be consulted to start the conversation, \
         plus if a team member requests a change.",
        prompts.product_manager.clone(),
    );

    vec![developer, quality_analyst, product_manager]
}
