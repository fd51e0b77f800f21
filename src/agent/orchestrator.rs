//! Conversation driver for the crew group chat.
//!
//! Coordinates the full pipeline: seed the transcript with the roster
//! introduction and the customer request, then loop — select the next
//! speaker, run its turn, dispatch any tool calls it emitted, check for
//! termination — until the review flow signals approval or the round
//! budget runs out. On approval, one final reflection request produces
//! the structured answer.
//!
//! Every model call and tool dispatch goes through the disk cache first,
//! so replaying an identical conversation prefix is deterministic and
//! free of redundant external calls.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::cache::{CacheKey, DiskCache};
use crate::docs::DocIndex;
use crate::error::AgentError;
use crate::store::BusinessStore;

use super::config::AgentConfig;
use super::conversation::{Conversation, ConversationState, Message, ToolExchange};
use super::executor::ToolExecutor;
use super::message::{
    ChatRequest, ChatResponse, assistant_message, system_message, user_message,
};
use super::prompt::{
    PromptSet, build_intro_message, build_selector_prompt, build_selector_system, render_message,
};
use super::provider::LlmProvider;
use super::role::{RoleAgent, crew};
use super::summary::{SUMMARIZER_ID, build_summary_request, extract};
use super::termination::TerminationRule;
use super::tool::{ToolCall, ToolRegistry, ToolResult};

/// Pseudo-speaker for the roster introduction.
pub const INTRO_SPEAKER: &str = "chat_manager";
/// Pseudo-speaker for the customer request.
pub const REQUEST_SPEAKER: &str = "customer";
/// Pseudo-agent id used to key cached speaker-selection calls.
const SELECTOR_ID: &str = "speaker_selector";

/// Long-lived resources shared by every conversation.
///
/// Constructed once per process and passed by reference into the
/// orchestrator; read-only resources need no teardown.
pub struct CrewContext {
    /// The target data store for generated queries.
    pub store: BusinessStore,
    /// The reference-documentation index.
    pub docs: Box<dyn DocIndex>,
}

impl CrewContext {
    /// Bundles the shared resources.
    #[must_use]
    pub fn new(store: BusinessStore, docs: Box<dyn DocIndex>) -> Self {
        Self { store, docs }
    }
}

impl std::fmt::Debug for CrewContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrewContext").finish_non_exhaustive()
    }
}

/// How the next speaker is chosen each round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionPolicy {
    /// A control prompt picks the next speaker from the roster by name;
    /// invalid selections fall back to the first participant.
    #[default]
    ModelAssisted,
    /// Participants speak in roster order. Deterministic; no extra
    /// model calls.
    RoundRobin,
}

/// Final validated answer from a completed conversation.
#[derive(Debug, Clone)]
pub struct ValidatedQuery {
    /// The extracted read-only SQL query.
    pub sql: String,
    /// Human-readable usage notes for the customer.
    pub usage_notes: String,
    /// Completed speaker turns.
    pub rounds: usize,
    /// Total tokens consumed, including selection and summary calls.
    pub total_tokens: u32,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

/// Orchestrates one group-chat conversation per user request.
pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    config: AgentConfig,
    prompts: PromptSet,
    registry: ToolRegistry,
    agents: Vec<RoleAgent>,
    termination: TerminationRule,
    selection: SelectionPolicy,
    cache: DiskCache,
}

impl Orchestrator {
    /// Creates an orchestrator with the standard crew, registry, and
    /// termination rule.
    ///
    /// Loads prompt templates from [`AgentConfig::prompt_dir`], falling
    /// back to compiled-in defaults, and opens the disk cache under
    /// [`AgentConfig::cache_dir`].
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        config: AgentConfig,
    ) -> Result<Self, AgentError> {
        let prompts = PromptSet::load(config.prompt_dir.as_deref());
        let agents = crew(&prompts);
        let cache = DiskCache::open(&config.cache_dir).map_err(|e| AgentError::Cache {
            message: format!("failed to open cache at {}: {e}", config.cache_dir.display()),
        })?;
        Ok(Self {
            provider,
            config,
            prompts,
            registry: ToolRegistry::standard(),
            agents,
            termination: TerminationRule::project_completed(),
            selection: SelectionPolicy::default(),
            cache,
        })
    }

    /// Overrides the speaker-selection policy.
    #[must_use]
    pub const fn with_selection(mut self, selection: SelectionPolicy) -> Self {
        self.selection = selection;
        self
    }

    /// Overrides the termination rule.
    #[must_use]
    pub fn with_termination(mut self, termination: TerminationRule) -> Self {
        self.termination = termination;
        self
    }

    /// Runs one conversation for a customer request.
    ///
    /// The round budget is the only internal cancellation mechanism.
    /// Dropping the returned future between suspension points simply
    /// abandons the conversation; it is never silently marked terminated.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::RoundBudgetExhausted`] when no termination
    /// is reached, [`AgentError::MalformedSummary`] when the final answer
    /// cannot be parsed, and [`AgentError::StoreUnavailable`] or API
    /// errors on resource failures. Recoverable tool failures never
    /// surface here; they are fed back into the transcript.
    pub async fn run(
        &self,
        ctx: &CrewContext,
        request: &str,
    ) -> Result<ValidatedQuery, AgentError> {
        if request.trim().is_empty() {
            return Err(AgentError::Orchestration {
                message: "request cannot be empty".to_string(),
            });
        }

        let start = Instant::now();
        let executor = ToolExecutor::new(&ctx.store, ctx.docs.as_ref());
        let mut conversation = Conversation::new(self.agents.clone(), self.config.max_rounds);
        let mut total_tokens: u32 = 0;

        // Every participant sees the full roster before the loop begins.
        conversation.append(Message::text(
            INTRO_SPEAKER,
            build_intro_message(&self.agents),
        ));
        self.check_termination(&mut conversation);
        conversation.append(Message::text(REQUEST_SPEAKER, request));
        self.check_termination(&mut conversation);

        while conversation.state() == ConversationState::Running {
            let speaker = self
                .select_speaker(&conversation, &mut total_tokens)
                .await?;
            debug!(
                speaker = %speaker.id,
                round = conversation.round_count(),
                "executing turn"
            );
            self.execute_turn(&speaker, &mut conversation, &executor, &mut total_tokens)
                .await?;
            conversation.finish_round();
        }

        match conversation.state() {
            ConversationState::Terminated => {
                debug!(rounds = conversation.round_count(), "conversation terminated");
                let summary = self
                    .summarize(request, conversation.transcript(), &mut total_tokens)
                    .await?;
                let parsed = extract(&summary)?;
                Ok(ValidatedQuery {
                    sql: parsed.query,
                    usage_notes: parsed.notes,
                    rounds: conversation.round_count(),
                    total_tokens,
                    elapsed: start.elapsed(),
                })
            }
            ConversationState::Exhausted => Err(AgentError::RoundBudgetExhausted {
                rounds: conversation.round_count(),
            }),
            ConversationState::Running => Err(AgentError::Orchestration {
                message: "conversation loop exited while still running".to_string(),
            }),
        }
    }

    /// Picks the next speaker according to the selection policy.
    async fn select_speaker(
        &self,
        conversation: &Conversation,
        total_tokens: &mut u32,
    ) -> Result<RoleAgent, AgentError> {
        match self.selection {
            SelectionPolicy::RoundRobin => {
                let idx = conversation.round_count() % self.agents.len();
                Ok(self.agents[idx].clone())
            }
            SelectionPolicy::ModelAssisted => {
                let request = ChatRequest {
                    model: self.config.model.clone(),
                    messages: vec![
                        system_message(&build_selector_system(
                            &self.prompts.selector,
                            &self.agents,
                        )),
                        user_message(&build_selector_prompt(conversation.transcript())),
                    ],
                    temperature: Some(self.config.temperature),
                    max_tokens: Some(self.config.max_tokens),
                    tools: Vec::new(),
                };
                let key =
                    CacheKey::compute("select", &(SELECTOR_ID, conversation.transcript()));
                let response = self.cached_chat(&key, &request).await?;
                *total_tokens = total_tokens.saturating_add(response.usage.total_tokens);
                Ok(self.resolve_speaker(&response.content))
            }
        }
    }

    /// Resolves a raw selection reply to a participant.
    ///
    /// Tries an exact (case-insensitive) id match, then a mention scan in
    /// roster order. An unknown name falls back deterministically to the
    /// first participant so the conversation always makes progress.
    fn resolve_speaker(&self, raw: &str) -> RoleAgent {
        let wanted = raw
            .trim()
            .trim_matches(|c: char| !c.is_alphanumeric() && c != '_')
            .to_lowercase();
        if let Some(agent) = self
            .agents
            .iter()
            .find(|a| a.id.to_lowercase() == wanted)
        {
            return agent.clone();
        }

        let lowered = raw.to_lowercase();
        if let Some(agent) = self
            .agents
            .iter()
            .find(|a| lowered.contains(&a.id.to_lowercase()))
        {
            return agent.clone();
        }

        warn!(selection = raw, "invalid speaker selection, falling back to first participant");
        self.agents[0].clone()
    }

    /// Runs one speaker turn: model call, tool dispatch, transcript
    /// appends, termination checks.
    async fn execute_turn(
        &self,
        speaker: &RoleAgent,
        conversation: &mut Conversation,
        executor: &ToolExecutor<'_>,
        total_tokens: &mut u32,
    ) -> Result<(), AgentError> {
        let request = self.build_turn_request(speaker, conversation.transcript());
        let key = CacheKey::compute(
            "turn",
            &(speaker.id.as_str(), conversation.transcript()),
        );
        let response = self.cached_chat(&key, &request).await?;
        *total_tokens = total_tokens.saturating_add(response.usage.total_tokens);

        // Results are filled synchronously, before the next speaker is
        // selected.
        let mut exchanges = Vec::with_capacity(response.tool_calls.len());
        for call in &response.tool_calls {
            let (executor_id, result) = self.dispatch_tool(call, conversation, executor)?;
            exchanges.push((executor_id, ToolExchange {
                call: call.clone(),
                result,
            }));
        }

        conversation.append(Message::with_tool_calls(
            &speaker.id,
            response.content,
            exchanges.iter().map(|(_, ex)| ex.clone()).collect(),
        ));
        if self.check_termination(conversation) {
            return Ok(());
        }

        // Each result lands as a follow-up message from its executor, so
        // every role sees it on later turns.
        for (executor_id, exchange) in exchanges {
            conversation.append(Message::text(
                executor_id,
                format!(
                    "[{} result] {}",
                    exchange.call.name, exchange.result.content
                ),
            ));
            if self.check_termination(conversation) {
                return Ok(());
            }
        }

        Ok(())
    }

    /// Dispatches one tool call through the registry.
    ///
    /// The call runs only if the registry designates an executor and that
    /// executor is a participant holding the matching executable
    /// permission — even when several roles may request the tool, exactly
    /// one performs the side effect. Anything else becomes a recoverable
    /// error payload.
    fn dispatch_tool(
        &self,
        call: &ToolCall,
        conversation: &Conversation,
        executor: &ToolExecutor<'_>,
    ) -> Result<(String, ToolResult), AgentError> {
        let designated = self.registry.executor_of(&call.name).and_then(|id| {
            conversation
                .participant(id)
                .filter(|agent| agent.can_execute(&call.name))
        });

        let Some(agent) = designated else {
            debug!(tool = call.name, "no designated executor for tool call");
            return Ok((
                INTRO_SPEAKER.to_string(),
                ToolResult {
                    tool_call_id: call.id.clone(),
                    content: format!("no executor available for tool: {}", call.name),
                    is_error: true,
                },
            ));
        };

        let key = CacheKey::compute(
            "tool",
            &(agent.id.as_str(), call.name.as_str(), call.arguments.as_str()),
        );
        if let Some(value) = self.cache.get(&key)
            && let Ok(result) = serde_json::from_value::<ToolResult>(value)
        {
            debug!(tool = call.name, "tool cache hit");
            return Ok((agent.id.clone(), result));
        }

        let result = executor.execute(call)?;
        debug!(
            tool = call.name,
            is_error = result.is_error,
            "tool execution complete"
        );
        self.persist(&key, serde_json::to_value(&result).ok());
        Ok((agent.id.clone(), result))
    }

    /// Builds the chat request for a speaker's turn.
    ///
    /// The speaker's own past messages replay as assistant turns; every
    /// other transcript entry is rendered as attributed user text. Only
    /// the tools the speaker exposes are offered to the model.
    fn build_turn_request(&self, speaker: &RoleAgent, transcript: &[Message]) -> ChatRequest {
        let mut messages = Vec::with_capacity(transcript.len() + 1);
        messages.push(system_message(&speaker.system_prompt));
        for msg in transcript {
            if msg.speaker == speaker.id {
                messages.push(assistant_message(&msg.content));
            } else {
                messages.push(user_message(&render_message(msg)));
            }
        }
        ChatRequest {
            model: self.config.model.clone(),
            messages,
            temperature: Some(self.config.temperature),
            max_tokens: Some(self.config.max_tokens),
            tools: self.registry.definitions_for(&speaker.exposed_tools),
        }
    }

    /// Issues the final reflection request over the full transcript.
    async fn summarize(
        &self,
        request: &str,
        transcript: &[Message],
        total_tokens: &mut u32,
    ) -> Result<String, AgentError> {
        let chat_request =
            build_summary_request(&self.config, &self.prompts.summary, request, transcript);
        let key = CacheKey::compute("summary", &(SUMMARIZER_ID, request, transcript));
        let response = self.cached_chat(&key, &chat_request).await?;
        *total_tokens = total_tokens.saturating_add(response.usage.total_tokens);
        Ok(response.content)
    }

    /// Applies the termination rule to the latest message.
    fn check_termination(&self, conversation: &mut Conversation) -> bool {
        let fired = conversation
            .latest()
            .is_some_and(|msg| self.termination.matches(msg));
        if fired {
            conversation.mark_terminated();
        }
        fired
    }

    /// Performs a model call through the cache.
    async fn cached_chat(
        &self,
        key: &CacheKey,
        request: &ChatRequest,
    ) -> Result<ChatResponse, AgentError> {
        if let Some(value) = self.cache.get(key)
            && let Ok(response) = serde_json::from_value::<ChatResponse>(value)
        {
            debug!(key = key.as_hex(), "model cache hit");
            return Ok(response);
        }
        let response = self.provider.chat(request).await?;
        self.persist(key, serde_json::to_value(&response).ok());
        Ok(response)
    }

    /// Best-effort cache write; a failed write costs a recomputation
    /// later, never the conversation.
    fn persist(&self, key: &CacheKey, value: Option<serde_json::Value>) {
        if let Some(value) = value
            && let Err(e) = self.cache.put(key, &value)
        {
            warn!(error = %e, "failed to persist cache entry");
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .field("selection", &self.selection)
            .field("agents", &self.agents.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::agent::message::TokenUsage;
    use crate::docs::FtsDocIndex;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    /// Provider that replays a fixed script of responses and counts
    /// external invocations.
    struct ScriptedProvider {
        responses: Mutex<VecDeque<ChatResponse>>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<ChatResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse, AgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .pop_front()
                .ok_or_else(|| AgentError::ApiRequest {
                    message: "script exhausted".to_string(),
                    status: None,
                })
        }
    }

    fn text_response(content: &str) -> ChatResponse {
        ChatResponse {
            content: content.to_string(),
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 10,
                total_tokens: 20,
            },
            tool_calls: Vec::new(),
            finish_reason: Some("stop".to_string()),
        }
    }

    fn tool_response(name: &str, arguments: serde_json::Value) -> ChatResponse {
        ChatResponse {
            content: String::new(),
            usage: TokenUsage::default(),
            tool_calls: vec![ToolCall {
                id: "call_1".to_string(),
                name: name.to_string(),
                arguments: arguments.to_string(),
            }],
            finish_reason: Some("tool_calls".to_string()),
        }
    }

    const SUMMARY_REPLY: &str =
        "SQL query:\n```sql\nSELECT name FROM customers\n```\nUsage notes:\n- run it as is";

    fn context() -> CrewContext {
        let store =
            BusinessStore::in_memory().unwrap_or_else(|e| panic!("store failed: {e}"));
        store
            .run_script(
                "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT);
                 INSERT INTO customers (name) VALUES ('Ada'), ('Grace');",
            )
            .unwrap_or_else(|e| panic!("script failed: {e}"));
        let docs = FtsDocIndex::in_memory().unwrap_or_else(|e| panic!("docs failed: {e}"));
        CrewContext::new(store, Box::new(docs))
    }

    fn config(cache_dir: &std::path::Path, max_rounds: usize) -> AgentConfig {
        AgentConfig::builder()
            .api_key("test")
            .max_rounds(max_rounds)
            .cache_dir(cache_dir)
            .build()
            .unwrap_or_else(|_| unreachable!())
    }

    fn orchestrator(
        provider: Arc<ScriptedProvider>,
        cache_dir: &std::path::Path,
        max_rounds: usize,
    ) -> Orchestrator {
        Orchestrator::new(provider, config(cache_dir, max_rounds))
            .unwrap_or_else(|e| panic!("orchestrator failed: {e}"))
            .with_selection(SelectionPolicy::RoundRobin)
    }

    #[tokio::test]
    async fn test_run_happy_path_round_robin() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
        let provider = Arc::new(ScriptedProvider::new(vec![
            text_response("```sql\nSELECT name FROM customers\n```\nWhat changed:\n- initial"),
            text_response("task 1 is validated"),
            text_response("project is completed"),
            text_response(SUMMARY_REPLY),
        ]));
        let orchestrator = orchestrator(Arc::clone(&provider), dir.path(), 10);

        let ctx = context();
        let result = orchestrator
            .run(&ctx, "List the customer names")
            .await
            .unwrap_or_else(|e| panic!("run failed: {e}"));

        assert_eq!(result.sql, "SELECT name FROM customers");
        assert_eq!(result.usage_notes, "- run it as is");
        // developer, quality_analyst, product_manager: three turns.
        assert_eq!(result.rounds, 3);
        assert!(result.total_tokens > 0);
        assert_eq!(provider.call_count(), 4);
    }

    #[tokio::test]
    async fn test_replay_hits_cache_without_external_calls() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
        let script = vec![
            text_response("draft query"),
            text_response("task 1 is validated"),
            text_response("project is completed"),
            text_response(SUMMARY_REPLY),
        ];
        let ctx = context();

        let first = Arc::new(ScriptedProvider::new(script));
        let result = orchestrator(Arc::clone(&first), dir.path(), 10)
            .run(&ctx, "List the customer names")
            .await
            .unwrap_or_else(|e| panic!("first run failed: {e}"));
        assert_eq!(first.call_count(), 4);

        // Same request, same cache root, empty script: everything replays.
        let second = Arc::new(ScriptedProvider::new(Vec::new()));
        let replay = orchestrator(Arc::clone(&second), dir.path(), 10)
            .run(&ctx, "List the customer names")
            .await
            .unwrap_or_else(|e| panic!("replay failed: {e}"));
        assert_eq!(second.call_count(), 0);
        assert_eq!(replay.sql, result.sql);
        assert_eq!(replay.usage_notes, result.usage_notes);
    }

    #[tokio::test]
    async fn test_round_budget_exhaustion_after_exactly_n_turns() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
        let provider = Arc::new(ScriptedProvider::new(vec![
            text_response("still drafting"),
            text_response("still reviewing"),
        ]));
        let orchestrator = orchestrator(Arc::clone(&provider), dir.path(), 2);

        let ctx = context();
        let result = orchestrator.run(&ctx, "anything").await;
        match result {
            Err(AgentError::RoundBudgetExhausted { rounds }) => assert_eq!(rounds, 2),
            other => panic!("expected RoundBudgetExhausted, got {other:?}"),
        }
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_tool_call_dispatches_to_designated_executor() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
        let provider = Arc::new(ScriptedProvider::new(vec![tool_response(
            "schema",
            serde_json::json!({}),
        )]));
        let orchestrator = orchestrator(Arc::clone(&provider), dir.path(), 10);
        let ctx = context();
        let executor = ToolExecutor::new(&ctx.store, ctx.docs.as_ref());

        let mut conversation = Conversation::new(orchestrator.agents.clone(), 10);
        conversation.append(Message::text(REQUEST_SPEAKER, "show me the schema"));

        let developer = orchestrator.agents[0].clone();
        let mut tokens = 0;
        orchestrator
            .execute_turn(&developer, &mut conversation, &executor, &mut tokens)
            .await
            .unwrap_or_else(|e| panic!("turn failed: {e}"));

        // Speaker message with the completed exchange, then the executor's
        // follow-up carrying the schema dump.
        let transcript = conversation.transcript();
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript[1].speaker, "developer");
        assert_eq!(transcript[1].tool_calls.len(), 1);
        assert!(!transcript[1].tool_calls[0].result.is_error);
        assert_eq!(transcript[2].speaker, "developer");
        assert!(transcript[2].content.contains("CREATE TABLE customers"));
    }

    #[tokio::test]
    async fn test_unregistered_tool_yields_recoverable_payload() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
        let provider = Arc::new(ScriptedProvider::new(vec![tool_response(
            "drop_tables",
            serde_json::json!({}),
        )]));
        let orchestrator = orchestrator(Arc::clone(&provider), dir.path(), 10);
        let ctx = context();
        let executor = ToolExecutor::new(&ctx.store, ctx.docs.as_ref());

        let mut conversation = Conversation::new(orchestrator.agents.clone(), 10);
        let developer = orchestrator.agents[0].clone();
        let mut tokens = 0;
        orchestrator
            .execute_turn(&developer, &mut conversation, &executor, &mut tokens)
            .await
            .unwrap_or_else(|e| panic!("turn failed: {e}"));

        let exchange = &conversation.transcript()[0].tool_calls[0];
        assert!(exchange.result.is_error);
        assert!(exchange.result.content.contains("no executor available"));
    }

    #[tokio::test]
    async fn test_model_assisted_selection_and_fallback() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
        let provider = Arc::new(ScriptedProvider::new(vec![
            text_response("product_manager"),
            text_response("The next role is quality_analyst."),
            text_response("intern"),
        ]));
        let orchestrator = Orchestrator::new(provider.clone(), config(dir.path(), 10))
            .unwrap_or_else(|e| panic!("orchestrator failed: {e}"));

        let mut conversation = Conversation::new(orchestrator.agents.clone(), 10);
        let mut tokens = 0;

        let exact = orchestrator
            .select_speaker(&conversation, &mut tokens)
            .await
            .unwrap_or_else(|e| panic!("select failed: {e}"));
        assert_eq!(exact.id, "product_manager");

        // An identical transcript would replay the cached selection, so
        // grow it between calls to vary the key.
        conversation.append(Message::text(REQUEST_SPEAKER, "first"));
        let mentioned = orchestrator
            .select_speaker(&conversation, &mut tokens)
            .await
            .unwrap_or_else(|e| panic!("select failed: {e}"));
        assert_eq!(mentioned.id, "quality_analyst");

        conversation.append(Message::text(REQUEST_SPEAKER, "second"));
        let fallback = orchestrator
            .select_speaker(&conversation, &mut tokens)
            .await
            .unwrap_or_else(|e| panic!("select failed: {e}"));
        assert_eq!(fallback.id, "developer");
    }

    #[tokio::test]
    async fn test_fallback_is_deterministic_for_same_configuration() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
        let provider = Arc::new(ScriptedProvider::new(Vec::new()));
        let orchestrator = Orchestrator::new(provider, config(dir.path(), 10))
            .unwrap_or_else(|e| panic!("orchestrator failed: {e}"));
        for _ in 0..3 {
            assert_eq!(orchestrator.resolve_speaker("nobody I know").id, "developer");
        }
    }

    #[tokio::test]
    async fn test_empty_request_is_rejected() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
        let provider = Arc::new(ScriptedProvider::new(Vec::new()));
        let orchestrator = orchestrator(provider, dir.path(), 10);
        let ctx = context();
        let result = orchestrator.run(&ctx, "   ").await;
        assert!(matches!(result, Err(AgentError::Orchestration { .. })));
    }

    #[tokio::test]
    async fn test_turn_request_exposes_only_speaker_tools() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
        let provider = Arc::new(ScriptedProvider::new(Vec::new()));
        let orchestrator = orchestrator(provider, dir.path(), 10);

        let developer = &orchestrator.agents[0];
        let request = orchestrator.build_turn_request(developer, &[]);
        let names: Vec<&str> = request.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["engine_info", "schema", "search_docs"]);

        let pm = &orchestrator.agents[2];
        let request = orchestrator.build_turn_request(pm, &[]);
        assert!(request.tools.is_empty());
    }
}
