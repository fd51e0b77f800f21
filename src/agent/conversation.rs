//! Conversation transcript and state machine.
//!
//! A conversation is an append-only log of speaker-attributed messages
//! plus round accounting. It is owned exclusively by the orchestrator for
//! the lifetime of one user request and discarded afterwards.

use serde::{Deserialize, Serialize};

use super::role::RoleAgent;
use super::tool::{ToolCall, ToolResult};

/// Lifecycle state of a conversation.
///
/// `Running` is the initial state; the two terminal states are reached at
/// most once and are irreversible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversationState {
    /// Turns are still being taken.
    Running,
    /// The termination detector fired.
    Terminated,
    /// The round budget ran out without termination.
    Exhausted,
}

/// A completed tool exchange inside a message.
///
/// The result is filled synchronously during the turn, before the next
/// speaker is selected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExchange {
    /// The call as requested by the speaker.
    pub call: ToolCall,
    /// The dispatched result.
    pub result: ToolResult,
}

/// A single transcript entry. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Speaker name (an agent id or an orchestration pseudo-speaker).
    pub speaker: String,
    /// Free-text content.
    pub content: String,
    /// Tool exchanges performed during this turn, in call order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolExchange>,
}

impl Message {
    /// Creates a plain text message.
    #[must_use]
    pub fn text(speaker: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    /// Creates a message carrying completed tool exchanges.
    #[must_use]
    pub fn with_tool_calls(
        speaker: impl Into<String>,
        content: impl Into<String>,
        tool_calls: Vec<ToolExchange>,
    ) -> Self {
        Self {
            speaker: speaker.into(),
            content: content.into(),
            tool_calls,
        }
    }
}

/// One end-to-end orchestration run.
#[derive(Debug)]
pub struct Conversation {
    participants: Vec<RoleAgent>,
    transcript: Vec<Message>,
    round_count: usize,
    max_rounds: usize,
    state: ConversationState,
}

impl Conversation {
    /// Creates a running conversation with an empty transcript.
    ///
    /// A zero round budget starts already exhausted.
    #[must_use]
    pub fn new(participants: Vec<RoleAgent>, max_rounds: usize) -> Self {
        let state = if max_rounds == 0 {
            ConversationState::Exhausted
        } else {
            ConversationState::Running
        };
        Self {
            participants,
            transcript: Vec::new(),
            round_count: 0,
            max_rounds,
            state,
        }
    }

    /// The ordered participant roster.
    #[must_use]
    pub fn participants(&self) -> &[RoleAgent] {
        &self.participants
    }

    /// Looks up a participant by id.
    #[must_use]
    pub fn participant(&self, id: &str) -> Option<&RoleAgent> {
        self.participants.iter().find(|a| a.id == id)
    }

    /// The transcript so far.
    #[must_use]
    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    /// The latest appended message, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&Message> {
        self.transcript.last()
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ConversationState {
        self.state
    }

    /// Completed speaker turns so far.
    #[must_use]
    pub const fn round_count(&self) -> usize {
        self.round_count
    }

    /// Round budget.
    #[must_use]
    pub const fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    /// Appends a message. The transcript only ever grows.
    pub fn append(&mut self, message: Message) {
        self.transcript.push(message);
    }

    /// Marks the conversation terminated.
    ///
    /// Only a running conversation can terminate; terminal states are
    /// irreversible.
    pub fn mark_terminated(&mut self) {
        if self.state == ConversationState::Running {
            self.state = ConversationState::Terminated;
        }
    }

    /// Records a completed speaker turn.
    ///
    /// Flips the conversation to `Exhausted` once the budget is spent
    /// and no termination was reached.
    pub fn finish_round(&mut self) {
        self.round_count += 1;
        if self.state == ConversationState::Running && self.round_count >= self.max_rounds {
            self.state = ConversationState::Exhausted;
        }
    }
}
