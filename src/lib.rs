//! sql-crew: a multi-agent group chat that turns natural-language
//! requests into validated, read-only SQL.
//!
//! A product manager scopes the request, a SQL developer writes the
//! query, and a quality analyst executes and reviews it — all language
//! model roles driven by a deterministic orchestrator. Tool calls are
//! screened so only read-only statements ever reach the store, and every
//! external call is cached on disk for reproducible replays.
//!
//! # Example
//!
//! ```no_run
//! use sql_crew::agent::{AgentConfig, CrewContext, Orchestrator, create_provider};
//! use sql_crew::docs::FtsDocIndex;
//! use sql_crew::store::BusinessStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AgentConfig::from_env()?;
//! let provider = create_provider(&config)?;
//! let orchestrator = Orchestrator::new(provider, config)?;
//!
//! let ctx = CrewContext::new(
//!     BusinessStore::open(std::path::Path::new("business.db"))?,
//!     Box::new(FtsDocIndex::open(std::path::Path::new("docs.db"))?),
//! );
//! let answer = orchestrator.run(&ctx, "Which customers spent the most?").await?;
//! println!("{}", answer.sql);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod cache;
pub mod cli;
pub mod docs;
pub mod error;
pub mod store;

pub use error::{AgentError, CommandError, DocError, StoreError};
