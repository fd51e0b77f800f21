//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// sql-crew: ask a question, get a validated read-only SQL query.
///
/// Runs a group chat of LLM roles (product manager, SQL developer,
/// quality analyst) against your database until the query is approved.
#[derive(Parser, Debug)]
#[command(name = "sql-crew")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the business database file.
    ///
    /// Defaults to an empty in-memory database (combine with `--seed`).
    #[arg(short, long, env = "SQL_CREW_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// SQL script(s) executed against the database before the command runs.
    #[arg(long, value_name = "FILE")]
    pub seed: Vec<PathBuf>,

    /// Path to the documentation index database.
    ///
    /// Defaults to an empty in-memory index.
    #[arg(long, env = "SQL_CREW_DOCS_PATH")]
    pub docs_path: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full crew conversation for a request.
    ///
    /// Prints the usage notes, the validated query, and a data preview.
    #[command(after_help = r#"Examples:
  sql-crew --db-path shop.db ask "Which customers spent the most?"
  sql-crew --seed schema.sql --seed data.sql ask "How many orders per month?"
  sql-crew ask --max-rounds 20 --no-preview "List inactive accounts"
"#)]
    Ask {
        /// The request, in plain language.
        request: String,

        /// Round budget override (default 50).
        #[arg(long)]
        max_rounds: Option<usize>,

        /// Model override for every role.
        #[arg(long)]
        model: Option<String>,

        /// Cache root override.
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Directory containing prompt template files.
        #[arg(long)]
        prompt_dir: Option<PathBuf>,

        /// Skip executing the validated query for the data preview.
        #[arg(long)]
        no_preview: bool,
    },

    /// Print the database schema as seen by the crew.
    Schema,

    /// Run a single read-only query through the same safety screen the
    /// crew uses.
    #[command(after_help = r#"Examples:
  sql-crew --db-path shop.db exec "SELECT count(*) FROM orders"
"#)]
    Exec {
        /// SQL query to run.
        query: String,
    },

    /// Search the documentation index.
    Docs {
        /// One or more short search phrases.
        #[arg(required = true)]
        queries: Vec<String>,
    },

    /// Write the default prompt templates to a directory for editing.
    InitPrompts {
        /// Target directory (defaults to `~/.config/sql-crew/prompts`).
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}
