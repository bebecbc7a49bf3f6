//! The three-state change classifier.
//!
//! For every canonical artifact a target supports, the diff engine decides
//! whether the installed copy is missing, outdated (unchanged since the
//! last managed write while canonical moved on), or drifted (edited
//! outside this tool). Drift always wins over staleness: overwriting a
//! human edit is strictly worse than leaving a stale file. The pass is
//! read-only and may run concurrently across targets.

use crate::context::SyncContext;
use crate::error::{Result, SyncError};
use crate::expect::{expected_files, mcp_server_bytes};
use crate::store::CanonicalStore;
use crate::Category;
use concord_adapters::{Adapter, Capabilities};
use concord_state::{fingerprint, BaselineStore};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Per-category name buckets. `total` is always derived.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Exists canonically, absent at the target.
    pub missing: Vec<String>,
    /// Installed and unchanged since the last managed write, but canonical
    /// has moved on.
    pub outdated: Vec<String>,
    /// Installed content no longer matches what this tool last wrote.
    pub drifted: Vec<String>,
}

impl ChangeSet {
    pub fn total(&self) -> usize {
        self.missing.len() + self.outdated.len() + self.drifted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Installed-vs-expected content pair for one drifted artifact, kept for
/// the read-only status report.
#[derive(Debug, Clone)]
pub struct DriftDetail {
    pub category: Category,
    pub name: String,
    pub installed: String,
    pub expected: String,
}

/// The diff result for one target.
#[derive(Debug, Clone, Default)]
pub struct TargetDiff {
    /// One entry per category the target supports; unsupported categories
    /// never appear.
    pub changes: BTreeMap<Category, ChangeSet>,
    /// Installed under this tool's directories but absent canonically.
    /// Acted on only when pruning is explicitly requested.
    pub prune: Vec<(Category, String)>,
    pub warnings: Vec<String>,
    pub drift_details: Vec<DriftDetail>,
}

impl TargetDiff {
    pub fn total(&self) -> usize {
        self.changes.values().map(ChangeSet::total).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }

    pub fn changes_for(&self, category: Category) -> Option<&ChangeSet> {
        self.changes.get(&category)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Status {
    Missing,
    Outdated,
    Drifted,
}

/// The classifier. `installed`/`baseline`/`expected` are content
/// fingerprints; `None` installed means no artifact on disk, `None`
/// baseline means this tool has never written the artifact there.
pub(crate) fn classify(
    installed: Option<&str>,
    expected: &str,
    baseline: Option<&str>,
) -> Option<Status> {
    match installed {
        None => Some(Status::Missing),
        Some(inst) if inst == expected => None,
        Some(inst) => match baseline {
            // First encounter with unknown content: protect it.
            None => Some(Status::Drifted),
            Some(base) if inst == base => Some(Status::Outdated),
            Some(_) => Some(Status::Drifted),
        },
    }
}

fn supports(caps: &Capabilities, category: Category) -> bool {
    match category {
        Category::Skill => caps.skills,
        Category::Hook => caps.hooks,
        Category::Command => caps.commands,
        Category::McpServer => caps.mcp_servers,
        Category::Config => caps.context,
    }
}

/// `Ok(None)` means no artifact on disk; a read failure is per-artifact
/// recoverable and must skip the artifact rather than classify it.
fn read_installed(path: &Path) -> std::result::Result<Option<Vec<u8>>, std::io::Error> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Names of artifacts currently installed for one file-backed category.
fn installed_names(category: Category, adapter: &Adapter) -> Vec<String> {
    let mut names = BTreeSet::new();
    match category {
        Category::Skill => {
            let dir = adapter.skills_dir();
            if let Ok(entries) = std::fs::read_dir(&dir) {
                for entry in entries.flatten() {
                    let path = entry.path();
                    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                        continue;
                    };
                    if stem.starts_with('.') {
                        continue;
                    }
                    if path.is_dir() && path.join("SKILL.md").is_file() {
                        names.insert(stem.to_string());
                    } else if path.extension().is_some_and(|e| e == "md") {
                        names.insert(stem.to_string());
                    }
                }
            }
        }
        Category::Hook | Category::Command => {
            let (dir, ext) = match category {
                Category::Hook => (adapter.hooks_dir(), "json".to_string()),
                _ => (
                    adapter.commands_dir(),
                    adapter.capabilities.command_format.extension().to_string(),
                ),
            };
            if let Ok(entries) = std::fs::read_dir(&dir) {
                for entry in entries.flatten() {
                    let path = entry.path();
                    if !path.is_file() || path.extension().is_none_or(|e| e != ext.as_str()) {
                        continue;
                    }
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        if !stem.starts_with('.') {
                            names.insert(stem.to_string());
                        }
                    }
                }
            }
        }
        Category::Config => {
            if adapter.context_path().is_file() {
                names.insert("CONTEXT".to_string());
            }
        }
        Category::McpServer => {}
    }
    names.into_iter().collect()
}

/// Reads the target settings document's `mcpServers` map. `None` means
/// the document exists but cannot be used (read or parse failure); the MCP
/// category is then reported and left unreconciled rather than treated as
/// uninstalled.
fn installed_mcp_servers(
    adapter: &Adapter,
    warnings: &mut Vec<String>,
) -> Option<BTreeMap<String, serde_json::Value>> {
    let path = adapter.settings_path();
    let bytes = match read_installed(&path) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return Some(BTreeMap::new()),
        Err(e) => {
            warnings.push(format!("{}: {e}, MCP servers not reconciled", path.display()));
            return None;
        }
    };
    match serde_json::from_slice::<serde_json::Value>(&bytes) {
        Ok(doc) => Some(
            doc.get("mcpServers")
                .and_then(|v| v.as_object())
                .map(|obj| {
                    obj.iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect()
                })
                .unwrap_or_default(),
        ),
        Err(e) => {
            warnings.push(format!(
                "{}: {e}, MCP servers not reconciled",
                path.display()
            ));
            None
        }
    }
}

/// Produces the change sets for one target. Read-only and side-effect
/// free; per-target scans touch disjoint trees and baseline stores, so
/// callers may run them concurrently.
pub fn diff_target(
    ctx: &SyncContext,
    store: &CanonicalStore,
    adapter: &Adapter,
    baselines: &BaselineStore,
) -> Result<TargetDiff> {
    let base = adapter.base();
    if base.exists() {
        // A base path we cannot scan at all is fatal for this target.
        std::fs::read_dir(base).map_err(|e| SyncError::preflight(base, e.to_string()))?;
    }

    let mut diff = TargetDiff::default();

    for category in Category::FILES {
        if !supports(&adapter.capabilities, category) {
            continue;
        }
        if ctx.is_cancelled() {
            diff.warnings.push("diff interrupted".to_string());
            return Ok(diff);
        }

        let expected = expected_files(category, store, adapter)?;
        diff.warnings.extend(expected.warnings);

        let mut set = ChangeSet::default();
        let mut canonical_names = BTreeSet::new();
        for item in &expected.items {
            canonical_names.insert(installed_key(category, &item.name));
            let installed = match read_installed(&item.path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    diff.warnings
                        .push(format!("{}: {e}, artifact skipped", item.path.display()));
                    continue;
                }
            };
            let installed_fp = installed.as_deref().map(fingerprint);
            let baseline = baselines.get(category.as_str(), &item.name);
            match classify(installed_fp.as_deref(), &item.fingerprint, baseline) {
                Some(Status::Missing) => set.missing.push(item.name.clone()),
                Some(Status::Outdated) => set.outdated.push(item.name.clone()),
                Some(Status::Drifted) => {
                    set.drifted.push(item.name.clone());
                    diff.drift_details.push(DriftDetail {
                        category,
                        name: item.name.clone(),
                        installed: String::from_utf8_lossy(installed.as_deref().unwrap_or_default())
                            .into_owned(),
                        expected: String::from_utf8_lossy(&item.content).into_owned(),
                    });
                }
                None => {}
            }
        }

        for name in installed_names(category, adapter) {
            if !canonical_names.contains(&name) {
                diff.prune.push((category, name));
            }
        }
        diff.changes.insert(category, set);
    }

    if supports(&adapter.capabilities, Category::McpServer) {
        diff_mcp(store, adapter, baselines, &mut diff)?;
    }

    Ok(diff)
}

/// Skills written as `<name>/SKILL.md` are listed by directory name; the
/// prune scan sees only the top-level directory for nested names.
fn installed_key(category: Category, name: &str) -> String {
    if category == Category::Skill {
        name.split('/').next().unwrap_or(name).to_string()
    } else {
        name.to_string()
    }
}

fn diff_mcp(
    store: &CanonicalStore,
    adapter: &Adapter,
    baselines: &BaselineStore,
    diff: &mut TargetDiff,
) -> Result<()> {
    let (manifest, warnings) = store.mcp_manifest()?;
    diff.warnings.extend(warnings);

    let mut set = ChangeSet::default();
    let Some(installed) = installed_mcp_servers(adapter, &mut diff.warnings) else {
        // Unusable settings document: reported above, nothing classified.
        diff.changes.insert(Category::McpServer, set);
        return Ok(());
    };

    let mut classify_server = |name: &str, server: &serde_json::Value| {
        let expected_bytes = mcp_server_bytes(server);
        let expected_fp = fingerprint(&expected_bytes);
        let installed_bytes = installed.get(name).map(mcp_server_bytes);
        let installed_fp = installed_bytes.as_deref().map(fingerprint);
        let baseline = baselines.get(Category::McpServer.as_str(), name);
        match classify(installed_fp.as_deref(), &expected_fp, baseline) {
            Some(Status::Missing) => set.missing.push(name.to_string()),
            Some(Status::Outdated) => set.outdated.push(name.to_string()),
            Some(Status::Drifted) => {
                set.drifted.push(name.to_string());
                diff.drift_details.push(DriftDetail {
                    category: Category::McpServer,
                    name: name.to_string(),
                    installed: String::from_utf8_lossy(installed_bytes.as_deref().unwrap_or_default())
                        .into_owned(),
                    expected: String::from_utf8_lossy(&expected_bytes).into_owned(),
                });
            }
            None => {}
        }
    };

    for (name, server) in &manifest.core {
        classify_server(name, server);
    }
    // Optional servers join the diff only once installed (or previously
    // managed); until then they are offers, not change candidates.
    for (name, optional) in &manifest.optional {
        if installed.contains_key(name)
            || baselines.get(Category::McpServer.as_str(), name).is_some()
        {
            classify_server(name, &optional.server);
        }
    }
    drop(classify_server);

    for name in installed.keys() {
        if !manifest.core.contains_key(name) && !manifest.optional.contains_key(name) {
            diff.prune.push((Category::McpServer, name.clone()));
        }
    }

    diff.changes.insert(Category::McpServer, set);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifier_missing() {
        assert_eq!(classify(None, "e", None), Some(Status::Missing));
        assert_eq!(classify(None, "e", Some("b")), Some(Status::Missing));
    }

    #[test]
    fn classifier_current_when_installed_matches_expected() {
        assert_eq!(classify(Some("e"), "e", None), None);
        assert_eq!(classify(Some("e"), "e", Some("b")), None);
    }

    #[test]
    fn classifier_first_encounter_is_conservative() {
        // No baseline plus unexpected content: never overwrite silently.
        assert_eq!(classify(Some("x"), "e", None), Some(Status::Drifted));
    }

    #[test]
    fn classifier_outdated_when_canonical_moved_on() {
        assert_eq!(classify(Some("b"), "e", Some("b")), Some(Status::Outdated));
    }

    #[test]
    fn classifier_drift_beats_staleness() {
        // Edited installed copy, canonical also changed: drift wins.
        assert_eq!(classify(Some("x"), "e", Some("b")), Some(Status::Drifted));
    }
}
