//! Per-target baseline fingerprints.
//!
//! For every artifact the tool has written to a target, the store keeps the
//! fingerprint of the canonical content as it was at that write. The diff
//! engine reads it to tell "canonical moved on" apart from "someone edited
//! the installed copy"; the executor is the only writer. Each target keeps
//! its own store file inside its config directory, so stores for different
//! targets never share a resource.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const FILE_NAME: &str = ".concord-baselines.json";

/// SHA-256 of the given content as a lowercase hex string.
pub fn fingerprint(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Baseline fingerprints for one target, keyed by `category/name`.
#[derive(Debug, Clone)]
pub struct BaselineStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

fn key(category: &str, name: &str) -> String {
    format!("{category}/{name}")
}

impl BaselineStore {
    /// Loads the store for a target base directory. A missing file is an
    /// empty store (the target has never been synced).
    pub fn load(target_base: &Path) -> Result<Self> {
        let path = target_base.join(FILE_NAME);
        let entries = if path.exists() {
            let data = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&data)
                .with_context(|| format!("parsing {}", path.display()))?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, entries })
    }

    /// The fingerprint recorded at the last successful managed write, if
    /// any.
    pub fn get(&self, category: &str, name: &str) -> Option<&str> {
        self.entries.get(&key(category, name)).map(String::as_str)
    }

    /// Records a fingerprint. Call only after the corresponding file write
    /// has succeeded.
    pub fn record(&mut self, category: &str, name: &str, fingerprint: impl Into<String>) {
        self.entries.insert(key(category, name), fingerprint.into());
    }

    /// Drops the record for a pruned artifact. Returns whether one existed.
    pub fn remove(&mut self, category: &str, name: &str) -> bool {
        self.entries.remove(&key(category, name)).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Persists the store, via a temporary file in the same directory so a
    /// torn write can never corrupt the previous state.
    pub fn save(&self) -> Result<()> {
        let parent = self
            .path
            .parent()
            .context("baseline store path has no parent")?;
        std::fs::create_dir_all(parent)?;
        let tmp = tempfile::NamedTempFile::new_in(parent)?;
        serde_json::to_writer_pretty(tmp.as_file(), &self.entries)?;
        tmp.persist(&self.path)
            .with_context(|| format!("persisting {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn fingerprint_is_hex_sha256() {
        let fp = fingerprint(b"hello");
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(fp, fingerprint(b"hello "));
    }

    #[test]
    fn missing_store_is_empty() {
        let tmp = tempdir().unwrap();
        let store = BaselineStore::load(tmp.path()).unwrap();
        assert!(store.is_empty());
        assert_eq!(store.get("hook", "drift"), None);
    }

    #[test]
    fn record_save_reload() {
        let tmp = tempdir().unwrap();
        let mut store = BaselineStore::load(tmp.path()).unwrap();
        store.record("hook", "drift", "abc123");
        store.record("command", "review", "def456");
        store.save().unwrap();

        let reloaded = BaselineStore::load(tmp.path()).unwrap();
        assert_eq!(reloaded.get("hook", "drift"), Some("abc123"));
        assert_eq!(reloaded.get("command", "review"), Some("def456"));
    }

    #[test]
    fn remove_drops_record() {
        let tmp = tempdir().unwrap();
        let mut store = BaselineStore::load(tmp.path()).unwrap();
        store.record("skill", "docs", "aaa");
        assert!(store.remove("skill", "docs"));
        assert!(!store.remove("skill", "docs"));
        assert_eq!(store.get("skill", "docs"), None);
    }

    #[test]
    fn categories_do_not_collide() {
        let tmp = tempdir().unwrap();
        let mut store = BaselineStore::load(tmp.path()).unwrap();
        store.record("hook", "same-name", "a");
        store.record("command", "same-name", "b");
        assert_eq!(store.get("hook", "same-name"), Some("a"));
        assert_eq!(store.get("command", "same-name"), Some("b"));
    }
}
