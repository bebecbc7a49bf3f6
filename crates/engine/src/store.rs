//! The canonical artifact store: one source-of-truth directory tree.
//!
//! Layout: `skills/<name>/SKILL.md` (or flat `skills/<name>.md`),
//! `commands/<name>.md`, `hooks/<name>.json`, `mcp-servers.json`, and an
//! optional `CONTEXT.md` document at the root. Malformed canonical content
//! is skipped with a named warning, never silently.

use crate::error::{Result, SyncError};
use concord_state::fingerprint;
use concord_transform::{skill_meta, HookDoc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const MCP_MANIFEST: &str = "mcp-servers.json";
const CONTEXT_DOC: &str = "CONTEXT.md";

/// One canonical artifact: name, payload, content fingerprint.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub name: String,
    pub content: Vec<u8>,
    pub fingerprint: String,
}

impl Artifact {
    fn new(name: String, content: Vec<u8>) -> Self {
        let fingerprint = fingerprint(&content);
        Self {
            name,
            content,
            fingerprint,
        }
    }
}

/// A canonical hook artifact: parsed event document keyed by name.
#[derive(Debug, Clone)]
pub struct HookArtifact {
    pub name: String,
    pub doc: HookDoc,
}

/// An optional MCP server: config plus install gating metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct OptionalServer {
    pub server: serde_json::Value,
    /// Secret names that must be present in the env file before install.
    #[serde(default)]
    pub requires: Vec<String>,
    /// Prerequisite install command, surfaced to the operator (never run).
    #[serde(default)]
    pub install: Option<String>,
    /// Post-install message, surfaced after a successful write.
    #[serde(default)]
    pub note: Option<String>,
}

/// The MCP server manifest: core servers are always offered, optional ones
/// require explicit opt-in.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct McpManifest {
    #[serde(default)]
    pub core: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub optional: BTreeMap<String, OptionalServer>,
}

/// Artifacts loaded from one category, plus warnings for anything skipped.
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub items: Vec<T>,
    pub warnings: Vec<String>,
}

impl<T> Default for Loaded<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// Handle on the canonical store directory.
#[derive(Debug, Clone)]
pub struct CanonicalStore {
    root: PathBuf,
}

fn is_hidden_path(path: &Path) -> bool {
    path.components().any(|c| match c {
        std::path::Component::Normal(s) => s.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| SyncError::fs(path, e))
}

impl CanonicalStore {
    /// Opens the store. An unreadable root is globally fatal: no plan can
    /// be built without the canonical artifact set.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(SyncError::preflight(&root, "canonical store is not a directory"));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Skills: `skills/<name>/SKILL.md` directories or flat
    /// `skills/<name>.md` files. A skill without a `name`/`description`
    /// header is malformed and skipped with a warning.
    pub fn skills(&self) -> Result<Loaded<Artifact>> {
        let mut loaded = Loaded::default();
        let dir = self.dir("skills");
        if !dir.exists() {
            return Ok(loaded);
        }
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(6).follow_links(false) {
            let entry = entry.map_err(|e| {
                SyncError::preflight(&dir, e.to_string())
            })?;
            let path = entry.path();
            if entry.file_type().is_symlink() || !path.is_file() {
                continue;
            }
            if is_hidden_path(path.strip_prefix(&dir).unwrap_or(path)) {
                continue;
            }
            if path.extension().is_none_or(|ext| ext != "md") {
                continue;
            }

            let name = if path.file_name().is_some_and(|n| n == "SKILL.md") {
                path.parent()
                    .and_then(|p| p.strip_prefix(&dir).ok())
                    .and_then(|p| p.to_str())
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            } else {
                path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
            };
            let Some(name) = name else { continue };

            let content = read(path)?;
            match std::str::from_utf8(&content).ok().and_then(skill_meta) {
                Some(_) => loaded.items.push(Artifact::new(name, content)),
                None => loaded.warnings.push(format!(
                    "skill '{name}': missing name/description header, skipped"
                )),
            }
        }
        loaded.items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(loaded)
    }

    /// Commands: `commands/<name>.md` documents with a metadata header.
    pub fn commands(&self) -> Result<Loaded<Artifact>> {
        let mut loaded = Loaded::default();
        let dir = self.dir("commands");
        if !dir.exists() {
            return Ok(loaded);
        }
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(2).follow_links(false) {
            let entry = entry.map_err(|e| SyncError::preflight(&dir, e.to_string()))?;
            let path = entry.path();
            if !path.is_file() || path.extension().is_none_or(|ext| ext != "md") {
                continue;
            }
            if is_hidden_path(path.strip_prefix(&dir).unwrap_or(path)) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
            else {
                continue;
            };
            let content = read(path)?;
            match std::str::from_utf8(&content).ok().and_then(skill_meta) {
                Some(_) => loaded.items.push(Artifact::new(name, content)),
                None => loaded.warnings.push(format!(
                    "command '{name}': missing name/description header, skipped"
                )),
            }
        }
        loaded.items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(loaded)
    }

    /// Hooks: `hooks/<name>.json` event documents.
    pub fn hooks(&self) -> Result<Loaded<HookArtifact>> {
        let mut loaded = Loaded::default();
        let dir = self.dir("hooks");
        if !dir.exists() {
            return Ok(loaded);
        }
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(2).follow_links(false) {
            let entry = entry.map_err(|e| SyncError::preflight(&dir, e.to_string()))?;
            let path = entry.path();
            if !path.is_file() || path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            if is_hidden_path(path.strip_prefix(&dir).unwrap_or(path)) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
            else {
                continue;
            };
            let content = read(path)?;
            match serde_json::from_slice::<HookDoc>(&content) {
                Ok(doc) => loaded.items.push(HookArtifact { name, doc }),
                Err(e) => loaded
                    .warnings
                    .push(format!("hook '{name}': {e}, skipped")),
            }
        }
        loaded.items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(loaded)
    }

    /// The MCP server manifest; a missing file is an empty manifest. A
    /// manifest that fails to parse yields an empty one plus a warning.
    pub fn mcp_manifest(&self) -> Result<(McpManifest, Vec<String>)> {
        let path = self.root.join(MCP_MANIFEST);
        if !path.exists() {
            return Ok((McpManifest::default(), Vec::new()));
        }
        let content = read(&path)?;
        match serde_json::from_slice::<McpManifest>(&content) {
            Ok(manifest) => Ok((manifest, Vec::new())),
            Err(e) => Ok((
                McpManifest::default(),
                vec![format!("{MCP_MANIFEST}: {e}, no MCP servers offered")],
            )),
        }
    }

    /// The context document, if the store carries one.
    pub fn context_doc(&self) -> Result<Option<Artifact>> {
        let path = self.root.join(CONTEXT_DOC);
        if !path.exists() {
            return Ok(None);
        }
        let content = read(&path)?;
        Ok(Some(Artifact::new("CONTEXT".to_string(), content)))
    }

    // --- Backport writers ---

    pub fn skill_path(&self, name: &str) -> PathBuf {
        self.dir("skills").join(name).join("SKILL.md")
    }

    pub fn command_path(&self, name: &str) -> PathBuf {
        self.dir("commands").join(format!("{name}.md"))
    }

    pub fn hook_path(&self, name: &str) -> PathBuf {
        self.dir("hooks").join(format!("{name}.json"))
    }

    pub fn context_path(&self) -> PathBuf {
        self.root.join(CONTEXT_DOC)
    }

    pub fn mcp_manifest_path(&self) -> PathBuf {
        self.root.join(MCP_MANIFEST)
    }

    /// Replaces one core server entry in the manifest, leaving everything
    /// else untouched.
    pub fn update_mcp_core(&self, name: &str, server: &serde_json::Value) -> Result<()> {
        let path = self.mcp_manifest_path();
        let mut doc: serde_json::Value = if path.exists() {
            serde_json::from_slice(&read(&path)?).map_err(|e| SyncError::MalformedArtifact {
                name: MCP_MANIFEST.to_string(),
                reason: e.to_string(),
            })?
        } else {
            serde_json::json!({})
        };
        doc["core"][name] = server.clone();
        let bytes = serde_json::to_vec_pretty(&doc).expect("manifest serializes");
        crate::executor::write_atomic(&path, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn open_rejects_missing_root() {
        let tmp = tempdir().unwrap();
        let err = CanonicalStore::open(tmp.path().join("nope")).unwrap_err();
        assert!(matches!(err, SyncError::Preflight { .. }));
    }

    #[test]
    fn skills_load_from_dirs_and_flat_files() {
        let tmp = tempdir().unwrap();
        let skills = tmp.path().join("skills");
        fs::create_dir_all(skills.join("docs")).unwrap();
        fs::write(
            skills.join("docs/SKILL.md"),
            "---\nname: docs\ndescription: Write docs\n---\nbody\n",
        )
        .unwrap();
        fs::write(
            skills.join("flat.md"),
            "---\nname: flat\ndescription: Flat skill\n---\nbody\n",
        )
        .unwrap();

        let store = CanonicalStore::open(tmp.path()).unwrap();
        let loaded = store.skills().unwrap();
        let names: Vec<_> = loaded.items.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["docs", "flat"]);
        assert!(loaded.warnings.is_empty());
    }

    #[test]
    fn malformed_skill_is_warned_not_silent() {
        let tmp = tempdir().unwrap();
        let skills = tmp.path().join("skills");
        fs::create_dir_all(&skills).unwrap();
        fs::write(skills.join("broken.md"), "no header here\n").unwrap();

        let store = CanonicalStore::open(tmp.path()).unwrap();
        let loaded = store.skills().unwrap();
        assert!(loaded.items.is_empty());
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].contains("broken"));
    }

    #[test]
    fn hidden_paths_are_ignored() {
        let tmp = tempdir().unwrap();
        let skills = tmp.path().join("skills/.git");
        fs::create_dir_all(&skills).unwrap();
        fs::write(skills.join("x.md"), "---\nname: x\ndescription: d\n---\n").unwrap();

        let store = CanonicalStore::open(tmp.path()).unwrap();
        assert!(store.skills().unwrap().items.is_empty());
    }

    #[test]
    fn hooks_parse_event_docs() {
        let tmp = tempdir().unwrap();
        let hooks = tmp.path().join("hooks");
        fs::create_dir_all(&hooks).unwrap();
        fs::write(
            hooks.join("drift.json"),
            r#"{"PostToolUse":[{"matcher":"Write|Edit","hooks":[{"name":"drift","command":"echo hi"}]}]}"#,
        )
        .unwrap();
        fs::write(hooks.join("bad.json"), "{not json").unwrap();

        let store = CanonicalStore::open(tmp.path()).unwrap();
        let loaded = store.hooks().unwrap();
        assert_eq!(loaded.items.len(), 1);
        assert_eq!(loaded.items[0].name, "drift");
        assert!(loaded.items[0].doc.contains_key("PostToolUse"));
        assert_eq!(loaded.warnings.len(), 1);
    }

    #[test]
    fn mcp_manifest_splits_core_and_optional() {
        let tmp = tempdir().unwrap();
        fs::write(
            tmp.path().join("mcp-servers.json"),
            r#"{
                "core": {"files": {"command": "mcp-files"}},
                "optional": {
                    "search": {
                        "server": {"command": "mcp-search"},
                        "requires": ["SEARCH_API_KEY"],
                        "install": "cargo install mcp-search",
                        "note": "restart the agent afterwards"
                    }
                }
            }"#,
        )
        .unwrap();

        let store = CanonicalStore::open(tmp.path()).unwrap();
        let (manifest, warnings) = store.mcp_manifest().unwrap();
        assert!(warnings.is_empty());
        assert!(manifest.core.contains_key("files"));
        let optional = &manifest.optional["search"];
        assert_eq!(optional.requires, vec!["SEARCH_API_KEY"]);
        assert!(optional.install.as_deref().unwrap().contains("cargo"));
    }
}
