//! Error types for sql-crew.
//!
//! Each subsystem has its own error enum; only the failures named here as
//! fatal ever cross the orchestration boundary. Recoverable tool failures
//! (rejected queries, engine errors) are structured payloads appended to the
//! conversation transcript instead, so the agents can see and correct them.

use thiserror::Error;

/// Errors from the agent orchestration layer.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No API key was provided via configuration or environment.
    #[error("API key missing: set OPENAI_API_KEY or SQL_CREW_API_KEY")]
    ApiKeyMissing,

    /// The configured provider name is not supported.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// The unrecognized provider name.
        name: String,
    },

    /// A chat completion request failed at the transport or API layer.
    #[error("API request failed: {message}")]
    ApiRequest {
        /// Underlying error message.
        message: String,
        /// HTTP status code, when one was received.
        status: Option<u16>,
    },

    /// A tool call failed in a way that cannot be fed back to the agents.
    #[error("tool '{name}' failed: {message}")]
    ToolExecution {
        /// Name of the tool that failed.
        name: String,
        /// Underlying error message.
        message: String,
    },

    /// The conversation hit its round budget without reaching termination.
    #[error("round budget exhausted after {rounds} rounds without validation")]
    RoundBudgetExhausted {
        /// Number of completed speaker turns.
        rounds: usize,
    },

    /// The final summary did not contain the expected markers.
    #[error("malformed summary: {reason}")]
    MalformedSummary {
        /// Which marker was missing or malformed.
        reason: String,
    },

    /// The business store could not be reached or initialized.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// The document index failed outright (not a miss).
    #[error("document index unavailable: {0}")]
    DocIndexUnavailable(#[from] DocError),

    /// The cache store failed to read or persist an entry.
    #[error("cache error: {message}")]
    Cache {
        /// Underlying error message.
        message: String,
    },

    /// An internal orchestration invariant was violated.
    #[error("orchestration error: {message}")]
    Orchestration {
        /// What went wrong.
        message: String,
    },
}

/// Errors from the business data store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying SQLite connection failed.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A bootstrap script could not be read.
    #[error("failed to read script {path}: {source}")]
    Script {
        /// Path of the script file.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Errors from the document index.
#[derive(Debug, Error)]
pub enum DocError {
    /// The index storage failed.
    #[error("index error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A source document could not be read during ingestion.
    #[error("failed to read document {path}: {source}")]
    Ingest {
        /// Path of the document file.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Orchestration failed.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// The business store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The document index failed.
    #[error(transparent)]
    Docs(#[from] DocError),

    /// Invalid command-line usage.
    #[error("{0}")]
    Usage(String),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for CLI results.
pub type Result<T, E = CommandError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_error_display() {
        let err = AgentError::RoundBudgetExhausted { rounds: 50 };
        assert!(err.to_string().contains("50 rounds"));

        let err = AgentError::MalformedSummary {
            reason: "no sql fence".to_string(),
        };
        assert!(err.to_string().contains("no sql fence"));
    }

    #[test]
    fn test_store_error_converts_to_agent_error() {
        let store = StoreError::Sqlite(rusqlite::Error::InvalidQuery);
        let agent: AgentError = store.into();
        assert!(matches!(agent, AgentError::StoreUnavailable(_)));
    }

    #[test]
    fn test_command_error_from_agent() {
        let err: CommandError = AgentError::ApiKeyMissing.into();
        assert!(err.to_string().contains("API key missing"));
    }
}
