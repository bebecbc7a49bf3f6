//! Expected target content, shared by the diff engine and the executor.
//!
//! For every canonical artifact and target, the expected content is what a
//! managed write would put on disk: the schema transformer applied to the
//! canonical payload. Both classification and execution derive from the
//! same computation so they can never disagree.

use crate::error::Result;
use crate::store::CanonicalStore;
use crate::Category;
use concord_adapters::Adapter;
use concord_state::fingerprint;
use concord_transform::{command_from_skill, hook_to_native, HookDoc, HookTransform};
use std::path::PathBuf;

/// The canonical schema uses the Claude-shaped project-dir variable.
pub(crate) const CANONICAL_DIR_VAR: &str = "CLAUDE_PROJECT_DIR";

/// One artifact as it should exist at the target.
#[derive(Debug, Clone)]
pub(crate) struct Expected {
    pub name: String,
    pub path: PathBuf,
    pub content: Vec<u8>,
    pub fingerprint: String,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ExpectedSet {
    pub items: Vec<Expected>,
    pub warnings: Vec<String>,
}

impl ExpectedSet {
    fn push(&mut self, name: String, path: PathBuf, content: Vec<u8>) {
        let fingerprint = fingerprint(&content);
        self.items.push(Expected {
            name,
            path,
            content,
            fingerprint,
        });
    }
}

/// Flat artifact file name with a native extension. `with_extension` would
/// truncate names containing dots, so the extension is appended instead.
pub(crate) fn artifact_file_name(name: &str, ext: &str) -> String {
    let safe: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();
    format!("{safe}.{ext}")
}

/// Keeps artifact names safe to join onto target paths. Nested skill names
/// keep their separators; every segment is stripped to filename-safe
/// characters.
pub(crate) fn sanitize_rel(name: &str) -> PathBuf {
    name.split('/')
        .map(|segment| {
            segment
                .chars()
                .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_' || *c == '.')
                .collect::<String>()
        })
        .filter(|s| !s.is_empty() && s != "." && s != "..")
        .collect()
}

pub(crate) fn hook_transform<'a>(store: &'a CanonicalStore, adapter: &'a Adapter) -> HookTransform<'a> {
    HookTransform {
        tool: adapter.tool,
        canonical_root: store.root(),
        target_base: adapter.base(),
        canonical_dir_var: CANONICAL_DIR_VAR,
        target_dir_var: adapter.capabilities.project_dir_var,
    }
}

/// Deterministic byte form of a native hook document.
pub(crate) fn hook_doc_bytes(doc: &HookDoc) -> Vec<u8> {
    let mut bytes = serde_json::to_vec_pretty(doc).expect("hook doc serializes");
    bytes.push(b'\n');
    bytes
}

/// Deterministic byte form of one MCP server config entry.
pub(crate) fn mcp_server_bytes(server: &serde_json::Value) -> Vec<u8> {
    let mut bytes = serde_json::to_vec_pretty(server).expect("server config serializes");
    bytes.push(b'\n');
    bytes
}

/// Expected artifacts for one file-backed category at one target.
pub(crate) fn expected_files(
    category: Category,
    store: &CanonicalStore,
    adapter: &Adapter,
) -> Result<ExpectedSet> {
    let mut set = ExpectedSet::default();
    match category {
        Category::Skill => {
            let loaded = store.skills()?;
            set.warnings = loaded.warnings;
            for artifact in loaded.items {
                let path = adapter
                    .skills_dir()
                    .join(sanitize_rel(&artifact.name))
                    .join("SKILL.md");
                set.push(artifact.name, path, artifact.content);
            }
        }
        Category::Hook => {
            let loaded = store.hooks()?;
            set.warnings = loaded.warnings;
            let transform = hook_transform(store, adapter);
            for hook in loaded.items {
                match hook_to_native(&hook.doc, &transform) {
                    Some(native) => {
                        let path = adapter.hooks_dir().join(artifact_file_name(&hook.name, "json"));
                        set.push(hook.name, path, hook_doc_bytes(&native));
                    }
                    None => set.warnings.push(format!(
                        "hook '{}': no events applicable to {}, skipped",
                        hook.name, adapter.tool
                    )),
                }
            }
        }
        Category::Command => {
            let loaded = store.commands()?;
            set.warnings = loaded.warnings;
            let format = adapter.capabilities.command_format;
            for artifact in loaded.items {
                // Command docs are validated as UTF-8 with a metadata
                // header at load time.
                let doc = String::from_utf8_lossy(&artifact.content);
                match command_from_skill(&doc, format) {
                    Ok(native) => {
                        let path = adapter
                            .commands_dir()
                            .join(artifact_file_name(&artifact.name, format.extension()));
                        set.push(artifact.name, path, native.content.into_bytes());
                    }
                    Err(unrep) => set.warnings.push(format!(
                        "command '{}': {} for {}, skipped",
                        artifact.name, unrep.reason, adapter.tool
                    )),
                }
            }
        }
        Category::Config => {
            if let Some(artifact) = store.context_doc()? {
                set.push(artifact.name, adapter.context_path(), artifact.content);
            }
        }
        Category::McpServer => {
            // MCP servers live in the merged settings document; the diff
            // engine and executor handle them off the manifest directly.
        }
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_rel_strips_traversal() {
        assert_eq!(sanitize_rel("../../etc/passwd"), PathBuf::from("etc/passwd"));
        assert_eq!(sanitize_rel("nested/skill-name"), PathBuf::from("nested/skill-name"));
        assert_eq!(sanitize_rel("with spaces"), PathBuf::from("withspaces"));
    }

    #[test]
    fn artifact_file_name_keeps_dotted_names() {
        assert_eq!(artifact_file_name("drift-check", "json"), "drift-check.json");
        assert_eq!(artifact_file_name("v1.2-check", "toml"), "v1.2-check.toml");
        assert_eq!(artifact_file_name("../evil", "md"), "..evil.md");
    }
}
