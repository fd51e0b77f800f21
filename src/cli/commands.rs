//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

// Allow certain patterns that improve readability in CLI output formatting
#![allow(clippy::format_push_string)]

use std::fmt::Write as FmtWrite;
use std::path::PathBuf;

use crate::agent::{
    AgentConfig, CrewContext, Orchestrator, ValidatedQuery, create_provider, is_mutating_query,
};
use crate::cli::parser::{Cli, Commands};
use crate::docs::{DocIndex, FtsDocIndex, search_batch};
use crate::error::{CommandError, Result};
use crate::store::{BusinessStore, QueryRows};

/// Rows shown in data previews.
const PREVIEW_ROWS: usize = 5;

/// Executes the CLI command.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<String> {
    match &cli.command {
        Commands::Ask {
            request,
            max_rounds,
            model,
            cache_dir,
            prompt_dir,
            no_preview,
        } => {
            let params = AskParams {
                request: request.as_str(),
                max_rounds: *max_rounds,
                model: model.as_deref(),
                cache_dir: cache_dir.clone(),
                prompt_dir: prompt_dir.clone(),
                no_preview: *no_preview,
            };
            cmd_ask(cli, &params)
        }
        Commands::Schema => {
            let store = open_store(cli)?;
            Ok(store.schema()?)
        }
        Commands::Exec { query } => {
            let store = open_store(cli)?;
            cmd_exec(&store, query)
        }
        Commands::Docs { queries } => {
            let docs = open_docs(cli)?;
            cmd_docs(&docs, queries)
        }
        Commands::InitPrompts { dir } => cmd_init_prompts(dir.as_ref()),
    }
}

/// Parameters for the ask command.
#[derive(Debug)]
struct AskParams<'a> {
    /// The request, in plain language.
    request: &'a str,
    /// Round budget override.
    max_rounds: Option<usize>,
    /// Model override.
    model: Option<&'a str>,
    /// Cache root override.
    cache_dir: Option<PathBuf>,
    /// Prompt template directory override.
    prompt_dir: Option<PathBuf>,
    /// Skip the data preview.
    no_preview: bool,
}

/// Opens the business store and applies seed scripts.
fn open_store(cli: &Cli) -> Result<BusinessStore> {
    let store = match &cli.db_path {
        Some(path) => BusinessStore::open(path)?,
        None => BusinessStore::in_memory()?,
    };
    for script in &cli.seed {
        store.run_script_file(script)?;
    }
    Ok(store)
}

/// Opens the documentation index.
fn open_docs(cli: &Cli) -> Result<FtsDocIndex> {
    Ok(match &cli.docs_path {
        Some(path) => FtsDocIndex::open(path)?,
        None => FtsDocIndex::in_memory()?,
    })
}

/// Runs the full crew conversation and formats the answer.
fn cmd_ask(cli: &Cli, params: &AskParams<'_>) -> Result<String> {
    let mut builder = AgentConfig::builder();
    if let Some(model) = params.model {
        builder = builder.model(model);
    }
    if let Some(max_rounds) = params.max_rounds {
        builder = builder.max_rounds(max_rounds);
    }
    if let Some(ref cache_dir) = params.cache_dir {
        builder = builder.cache_dir(cache_dir);
    }
    if let Some(ref prompt_dir) = params.prompt_dir {
        builder = builder.prompt_dir(prompt_dir);
    }
    let config = builder.from_env().build()?;

    let provider = create_provider(&config)?;
    let orchestrator = Orchestrator::new(provider, config).map_err(CommandError::Agent)?;
    let ctx = CrewContext::new(open_store(cli)?, Box::new(open_docs(cli)?));

    let runtime = tokio::runtime::Runtime::new()?;
    let answer = runtime
        .block_on(orchestrator.run(&ctx, params.request))
        .map_err(CommandError::Agent)?;

    Ok(format_answer(&ctx, &answer, params.no_preview))
}

/// Formats the validated answer the way the crew presents it: notes
/// first, then the query, then a preview of the data it returns.
fn format_answer(ctx: &CrewContext, answer: &ValidatedQuery, no_preview: bool) -> String {
    let mut out = String::new();
    out.push_str("Notes\n-----\n");
    out.push_str(&answer.usage_notes);
    out.push_str("\n\nSQL query\n---------\n");
    out.push_str(&answer.sql);
    out.push('\n');

    if !no_preview {
        out.push_str("\nData\n----\n");
        match run_screened(&ctx.store, &answer.sql) {
            Ok(rows) => out.push_str(&format_rows(&rows, PREVIEW_ROWS)),
            Err(e) => {
                let _ = writeln!(out, "preview failed: {e}");
            }
        }
    }

    let _ = write!(
        out,
        "\n({} rounds, {} tokens, {:.1}s)",
        answer.rounds,
        answer.total_tokens,
        answer.elapsed.as_secs_f64()
    );
    out
}

/// Runs one screened query and formats a preview.
fn cmd_exec(store: &BusinessStore, query: &str) -> Result<String> {
    let rows = run_screened(store, query)?;
    Ok(format_rows(&rows, PREVIEW_ROWS))
}

/// Applies the same mutating-keyword screen the crew uses, then runs
/// the query.
fn run_screened(store: &BusinessStore, query: &str) -> Result<QueryRows> {
    if is_mutating_query(query) {
        return Err(CommandError::Usage(
            "Only SELECT queries are allowed".to_string(),
        ));
    }
    Ok(store.select(query)?)
}

/// Searches the documentation index.
fn cmd_docs(docs: &dyn DocIndex, queries: &[String]) -> Result<String> {
    let passages = search_batch(docs, queries)?;
    if passages.is_empty() {
        return Ok("no matching passages".to_string());
    }
    let mut out = String::new();
    for passage in &passages {
        let _ = writeln!(out, "[{}]\n{}\n", passage.source, passage.content);
    }
    Ok(out.trim_end().to_string())
}

/// Writes the default prompt templates for editing.
fn cmd_init_prompts(dir: Option<&PathBuf>) -> Result<String> {
    let target = match dir {
        Some(dir) => dir.clone(),
        None => crate::agent::PromptSet::default_dir().ok_or_else(|| {
            CommandError::Usage("cannot resolve home directory; pass --dir".to_string())
        })?,
    };
    let written = crate::agent::PromptSet::write_defaults(&target)?;
    if written.is_empty() {
        return Ok(format!("all templates already exist in {}", target.display()));
    }
    let mut out = String::new();
    for path in &written {
        let _ = writeln!(out, "wrote {}", path.display());
    }
    Ok(out.trim_end().to_string())
}

/// Formats a result set as aligned text with a total row count.
fn format_rows(rows: &QueryRows, limit: usize) -> String {
    let mut out = String::new();
    out.push_str(&rows.columns.join(" | "));
    out.push('\n');
    for row in rows.rows.iter().take(limit) {
        let cells: Vec<String> = row.iter().map(value_cell).collect();
        out.push_str(&cells.join(" | "));
        out.push('\n');
    }
    let _ = write!(out, "({} rows total)", rows.rows.len());
    out
}

/// Renders one JSON cell without quoting strings.
fn value_cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn seeded_store() -> BusinessStore {
        let store =
            BusinessStore::in_memory().unwrap_or_else(|e| panic!("store failed: {e}"));
        store
            .run_script(
                "CREATE TABLE orders (id INTEGER PRIMARY KEY, amount REAL);
                 INSERT INTO orders (amount) VALUES (10.0), (20.0), (30.0);",
            )
            .unwrap_or_else(|e| panic!("script failed: {e}"));
        store
    }

    #[test]
    fn test_exec_formats_preview_with_total() {
        let store = seeded_store();
        let out = cmd_exec(&store, "SELECT id, amount FROM orders ORDER BY id")
            .unwrap_or_else(|e| panic!("exec failed: {e}"));
        assert!(out.starts_with("id | amount"));
        assert!(out.contains("1 | 10.0"));
        assert!(out.ends_with("(3 rows total)"));
    }

    #[test]
    fn test_exec_screens_mutating_query() {
        let store = seeded_store();
        let result = cmd_exec(&store, "DELETE FROM orders");
        match result {
            Err(CommandError::Usage(msg)) => {
                assert!(msg.contains("Only SELECT queries are allowed"));
            }
            other => panic!("expected usage error, got {other:?}"),
        }
    }

    #[test]
    fn test_docs_formats_sources() {
        let docs = FtsDocIndex::in_memory().unwrap_or_else(|e| panic!("docs failed: {e}"));
        docs.insert("The sum() function returns the sum of values.", "lang_aggfunc.html")
            .unwrap_or_else(|e| panic!("insert failed: {e}"));
        let out = cmd_docs(&docs, &["sum of values".to_string()])
            .unwrap_or_else(|e| panic!("docs failed: {e}"));
        assert!(out.contains("[lang_aggfunc.html]"));
        assert!(out.contains("sum()"));
    }

    #[test]
    fn test_docs_no_matches() {
        let docs = FtsDocIndex::in_memory().unwrap_or_else(|e| panic!("docs failed: {e}"));
        let out = cmd_docs(&docs, &["anything".to_string()])
            .unwrap_or_else(|e| panic!("docs failed: {e}"));
        assert_eq!(out, "no matching passages");
    }

    #[test]
    fn test_value_cell_rendering() {
        assert_eq!(value_cell(&serde_json::Value::Null), "NULL");
        assert_eq!(value_cell(&serde_json::json!("text")), "text");
        assert_eq!(value_cell(&serde_json::json!(42)), "42");
    }

    #[test]
    fn test_init_prompts_writes_templates() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
        let target = dir.path().join("prompts");
        let out = cmd_init_prompts(Some(&target)).unwrap_or_else(|e| panic!("init failed: {e}"));
        assert!(out.contains("developer.md"));
        assert!(target.join("summary.md").exists());
    }
}
