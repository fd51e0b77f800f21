//! Content-addressed response cache for deterministic replay.
//!
//! Model turns and tool dispatches are memoized under a fingerprint of
//! everything that determines their outcome (agent identity plus the
//! preceding transcript, or executor plus tool arguments). Entries live as
//! JSON files under one fixed root so they survive process restarts, and
//! lookup is exact-match only. Entries are never invalidated; delete the
//! root to reset.
//!
//! Concurrent conversations may race on a write, which is benign: both
//! writers derived the same value from the same key. Writes go through a
//! temp file and an atomic rename so readers never observe a torn entry.

use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Deterministic fingerprint of a cacheable call.
///
/// Stable across runs and platforms for identical inputs: the key is the
/// SHA-256 of the kind tag and the canonical JSON of the payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Computes a key from a kind tag and a serializable payload.
    ///
    /// Serialization failures fold into the digest input rather than
    /// erroring; a payload that cannot serialize simply never hits.
    #[must_use]
    pub fn compute<T: Serialize>(kind: &str, payload: &T) -> Self {
        let body = serde_json::to_string(payload)
            .unwrap_or_else(|e| format!("<unserializable:{e}>"));
        let mut hasher = Sha256::new();
        hasher.update(kind.as_bytes());
        hasher.update([0u8]);
        hasher.update(body.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Hex digest backing this key.
    #[must_use]
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

/// Disk-backed cache mapping [`CacheKey`] to a stored JSON value.
#[derive(Debug, Clone)]
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    /// Opens (creating if needed) a cache rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Root directory of this cache.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Looks up a stored value by exact key match.
    ///
    /// Any read or parse failure counts as a miss: a corrupt entry is
    /// recomputed and overwritten on the next [`DiskCache::put`].
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<serde_json::Value> {
        let bytes = std::fs::read(self.entry_path(key)).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Persists a value under the given key.
    pub fn put(&self, key: &CacheKey, value: &serde_json::Value) -> std::io::Result<()> {
        let body = serde_json::to_vec(value)?;
        let tmp = self
            .root
            .join(format!(".tmp-{}-{}", key.as_hex(), std::process::id()));
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, self.entry_path(key))?;
        Ok(())
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(format!("{}.json", key.as_hex()))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    fn open_cache(dir: &tempfile::TempDir) -> DiskCache {
        DiskCache::open(dir.path().join("cache"))
            .unwrap_or_else(|e| panic!("open failed: {e}"))
    }

    #[test]
    fn test_key_is_stable_for_identical_input() {
        let a = CacheKey::compute("turn", &("developer", vec!["msg one", "msg two"]));
        let b = CacheKey::compute("turn", &("developer", vec!["msg one", "msg two"]));
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_differs_by_agent_and_transcript() {
        let base = CacheKey::compute("turn", &("developer", vec!["msg"]));
        assert_ne!(base, CacheKey::compute("turn", &("quality_analyst", vec!["msg"])));
        assert_ne!(base, CacheKey::compute("turn", &("developer", vec!["other"])));
        assert_ne!(base, CacheKey::compute("tool", &("developer", vec!["msg"])));
    }

    #[test]
    fn test_put_then_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
        let cache = open_cache(&dir);
        let key = CacheKey::compute("tool", &("execute", json!({"query": "SELECT 1"})));
        let value = json!({"rows": [[1]], "total": 1});

        assert!(cache.get(&key).is_none());
        cache
            .put(&key, &value)
            .unwrap_or_else(|e| panic!("put failed: {e}"));
        assert_eq!(cache.get(&key), Some(value));
    }

    #[test]
    fn test_entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
        let key = CacheKey::compute("turn", &"payload");
        let value = json!("cached response");
        {
            let cache = open_cache(&dir);
            cache
                .put(&key, &value)
                .unwrap_or_else(|e| panic!("put failed: {e}"));
        }
        let reopened = open_cache(&dir);
        assert_eq!(reopened.get(&key), Some(value));
    }

    #[test]
    fn test_corrupt_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir failed: {e}"));
        let cache = open_cache(&dir);
        let key = CacheKey::compute("turn", &"payload");
        std::fs::write(cache.root().join(format!("{}.json", key.as_hex())), b"{not json")
            .unwrap_or_else(|e| panic!("write failed: {e}"));
        assert!(cache.get(&key).is_none());
    }
}
