//! Reference-documentation index backing the `search_docs` tool.
//!
//! The orchestration core treats retrieval as a black box: anything that
//! can rank passages for a short query satisfies [`DocIndex`]. The
//! shipped implementation keeps passages in a SQLite FTS5 table; building
//! the corpus itself (crawling, splitting, embedding) is out of scope.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::error::DocError;

/// Number of passages returned per query string.
pub const TOP_K: usize = 3;

/// A ranked passage with its source metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    /// Passage text.
    pub content: String,
    /// Where the passage came from (file path, page, section).
    pub source: String,
}

/// Retrieval oracle over indexed reference documentation.
pub trait DocIndex: Send + Sync {
    /// Returns the `top_k` most relevant passages for one query string,
    /// best match first.
    fn search(&self, query: &str, top_k: usize) -> Result<Vec<Passage>, DocError>;
}

/// Runs a batch of query strings against an index.
///
/// Results are concatenated across queries, preserving per-query ranked
/// order; duplicates are allowed. An empty batch yields an empty result.
pub fn search_batch(
    index: &dyn DocIndex,
    queries: &[String],
) -> Result<Vec<Passage>, DocError> {
    let mut passages = Vec::new();
    for query in queries {
        passages.extend(index.search(query, TOP_K)?);
    }
    Ok(passages)
}

/// FTS5-backed document index.
pub struct FtsDocIndex {
    conn: Mutex<Connection>,
}

impl FtsDocIndex {
    /// Opens an index backed by a database file.
    pub fn open(path: &Path) -> Result<Self, DocError> {
        Self::init(Connection::open(path)?)
    }

    /// Opens an in-memory index.
    pub fn in_memory() -> Result<Self, DocError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, DocError> {
        conn.execute_batch(
            "CREATE VIRTUAL TABLE IF NOT EXISTS passages
             USING fts5(content, source UNINDEXED)",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Adds a passage to the index.
    pub fn insert(&self, content: &str, source: &str) -> Result<(), DocError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO passages (content, source) VALUES (?1, ?2)",
            (content, source),
        )?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl DocIndex for FtsDocIndex {
    fn search(&self, query: &str, top_k: usize) -> Result<Vec<Passage>, DocError> {
        // Quote each term so raw user text never hits the FTS5 query parser.
        let match_expr: Vec<String> = query
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| format!("\"{t}\""))
            .collect();
        if match_expr.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT content, source FROM passages
             WHERE passages MATCH ?1 ORDER BY rank LIMIT ?2",
        )?;
        let passages = stmt
            .query_map(
                rusqlite::params![match_expr.join(" OR "), top_k as i64],
                |row| {
                    Ok(Passage {
                        content: row.get(0)?,
                        source: row.get(1)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(passages)
    }
}

impl std::fmt::Debug for FtsDocIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FtsDocIndex").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn seeded_index() -> FtsDocIndex {
        let index = FtsDocIndex::in_memory().unwrap_or_else(|e| panic!("in_memory failed: {e}"));
        let docs = [
            ("The strftime() function converts dates to text.", "lang_datefunc.html"),
            ("GROUP BY groups rows sharing a value.", "lang_select.html"),
            ("The julianday() function returns the Julian day.", "lang_datefunc.html"),
        ];
        for (content, source) in docs {
            index
                .insert(content, source)
                .unwrap_or_else(|e| panic!("insert failed: {e}"));
        }
        index
    }

    #[test]
    fn test_search_ranks_matches() {
        let index = seeded_index();
        let results = index
            .search("strftime dates", TOP_K)
            .unwrap_or_else(|e| panic!("search failed: {e}"));
        assert!(!results.is_empty());
        assert!(results[0].content.contains("strftime"));
        assert_eq!(results[0].source, "lang_datefunc.html");
    }

    #[test]
    fn test_search_tolerates_punctuation() {
        let index = seeded_index();
        // Raw FTS5 syntax characters must not reach the query parser.
        let results = index.search("strftime(\"%Y\") - dates?", TOP_K);
        assert!(results.is_ok());
    }

    #[test]
    fn test_search_batch_concatenates_per_query() {
        let index = seeded_index();
        let queries = vec!["strftime".to_string(), "group by".to_string()];
        let results =
            search_batch(&index, &queries).unwrap_or_else(|e| panic!("batch failed: {e}"));
        assert!(results.len() >= 2);
        assert!(results[0].content.contains("strftime"));
    }

    #[test]
    fn test_search_batch_empty_input() {
        let index = seeded_index();
        let results =
            search_batch(&index, &[]).unwrap_or_else(|e| panic!("batch failed: {e}"));
        assert!(results.is_empty());
    }

    #[test]
    fn test_search_blank_query_returns_empty() {
        let index = seeded_index();
        let results = index
            .search("  --  ", TOP_K)
            .unwrap_or_else(|e| panic!("search failed: {e}"));
        assert!(results.is_empty());
    }
}
