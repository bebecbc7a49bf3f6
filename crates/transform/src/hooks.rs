//! Canonical hook documents and their projection into target-native form.
//!
//! A canonical hook artifact is a small JSON document: event name → ordered
//! hook definitions, each with an optional tool matcher and an ordered list
//! of commands. The native form remaps event names, substitutes native tool
//! names in matchers, and rewrites canonical-tree paths and the project-dir
//! variable inside commands.

use crate::events::{to_canonical_event, to_canonical_tool, to_native_event, to_native_tool};
use crate::paths::rewrite_paths;
use crate::rename::rename_words;
use concord_adapters::Tool;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One runnable command inside a hook definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookCommand {
    pub name: String,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// One hook definition: an optional tool matcher plus ordered commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matcher: Option<String>,
    pub hooks: Vec<HookCommand>,
}

/// Event name → ordered hook definitions. `BTreeMap` keeps serialization
/// deterministic, which fingerprinting relies on.
pub type HookDoc = BTreeMap<String, Vec<HookEntry>>;

/// Everything the hook transform needs to know about one target.
#[derive(Debug, Clone, Copy)]
pub struct HookTransform<'a> {
    pub tool: Tool,
    pub canonical_root: &'a Path,
    pub target_base: &'a Path,
    /// Canonical project-dir variable, rewritten to the target's.
    pub canonical_dir_var: &'a str,
    pub target_dir_var: &'a str,
}

impl HookTransform<'_> {
    fn rewrite_command(&self, command: &str) -> String {
        let rewritten = rewrite_paths(command, self.canonical_root, self.target_base);
        rename_words(&rewritten, |word| {
            (word == self.canonical_dir_var).then_some(self.target_dir_var)
        })
    }

    fn unrewrite_command(&self, command: &str) -> String {
        let rewritten = rewrite_paths(command, self.target_base, self.canonical_root);
        rename_words(&rewritten, |word| {
            (word == self.target_dir_var).then_some(self.canonical_dir_var)
        })
    }
}

/// Projects a canonical hook document into the target-native document.
///
/// Events with no native mapping are dropped. Returns `None` when every
/// event was dropped, so the caller can treat the artifact as not
/// applicable to this target.
pub fn hook_to_native(doc: &HookDoc, t: &HookTransform) -> Option<HookDoc> {
    let mut native = HookDoc::new();
    for (event, entries) in doc {
        let Some(native_event) = to_native_event(t.tool, event) else {
            continue;
        };
        let mapped = entries
            .iter()
            .map(|entry| HookEntry {
                matcher: entry.matcher.as_deref().map(|m| {
                    rename_words(m, |word| to_native_tool(t.tool, word))
                }),
                hooks: entry
                    .hooks
                    .iter()
                    .map(|cmd| HookCommand {
                        name: cmd.name.clone(),
                        command: t.rewrite_command(&cmd.command),
                        timeout_ms: cmd.timeout_ms,
                    })
                    .collect(),
            })
            .collect();
        native.insert(native_event.to_string(), mapped);
    }
    (!native.is_empty()).then_some(native)
}

/// Inverse of [`hook_to_native`], for backport. Native events with no
/// canonical counterpart are dropped; `None` when nothing survives.
pub fn hook_to_canonical(native: &HookDoc, t: &HookTransform) -> Option<HookDoc> {
    let mut canonical = HookDoc::new();
    for (event, entries) in native {
        let Some(canonical_event) = to_canonical_event(t.tool, event) else {
            continue;
        };
        let mapped = entries
            .iter()
            .map(|entry| HookEntry {
                matcher: entry.matcher.as_deref().map(|m| {
                    rename_words(m, |word| to_canonical_tool(t.tool, word))
                }),
                hooks: entry
                    .hooks
                    .iter()
                    .map(|cmd| HookCommand {
                        name: cmd.name.clone(),
                        command: t.unrewrite_command(&cmd.command),
                        timeout_ms: cmd.timeout_ms,
                    })
                    .collect(),
            })
            .collect();
        canonical.insert(canonical_event.to_string(), mapped);
    }
    (!canonical.is_empty()).then_some(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sample_doc() -> HookDoc {
        let mut doc = HookDoc::new();
        doc.insert(
            "PostToolUse".to_string(),
            vec![HookEntry {
                matcher: Some("Write|Edit".to_string()),
                hooks: vec![HookCommand {
                    name: "drift-check".to_string(),
                    command: "python3 \"$CLAUDE_PROJECT_DIR/agent-canon/hooks/drift.py\""
                        .to_string(),
                    timeout_ms: Some(10_000),
                }],
            }],
        );
        doc.insert(
            "UserPromptSubmit".to_string(),
            vec![HookEntry {
                matcher: None,
                hooks: vec![HookCommand {
                    name: "catalog".to_string(),
                    command: "echo catalog".to_string(),
                    timeout_ms: None,
                }],
            }],
        );
        doc
    }

    fn gemini_transform<'a>(canon: &'a PathBuf, base: &'a PathBuf) -> HookTransform<'a> {
        HookTransform {
            tool: Tool::Gemini,
            canonical_root: canon,
            target_base: base,
            canonical_dir_var: "CLAUDE_PROJECT_DIR",
            target_dir_var: "GEMINI_PROJECT_DIR",
        }
    }

    #[test]
    fn gemini_projection_remaps_and_drops() {
        let canon = PathBuf::from("/home/u/agent-canon");
        let base = PathBuf::from("/home/u/.gemini");
        let native = hook_to_native(&sample_doc(), &gemini_transform(&canon, &base)).unwrap();

        // Remapped event present, unmappable event dropped.
        assert!(native.contains_key("onAfterTool"));
        assert!(!native.contains_key("UserPromptSubmit"));
        assert_eq!(native.len(), 1);

        let entry = &native["onAfterTool"][0];
        assert_eq!(entry.matcher.as_deref(), Some("write_file|replace"));
        // The whole canonical prefix (variable included) collapses to the
        // target base directory.
        assert_eq!(
            entry.hooks[0].command,
            "python3 \"/home/u/.gemini/hooks/drift.py\""
        );
        assert_eq!(entry.hooks[0].timeout_ms, Some(10_000));
    }

    #[test]
    fn claude_projection_keeps_vocabulary() {
        let canon = PathBuf::from("/home/u/agent-canon");
        let base = PathBuf::from("/home/u/.claude");
        let t = HookTransform {
            tool: Tool::Claude,
            canonical_root: &canon,
            target_base: &base,
            canonical_dir_var: "CLAUDE_PROJECT_DIR",
            target_dir_var: "CLAUDE_PROJECT_DIR",
        };
        let native = hook_to_native(&sample_doc(), &t).unwrap();
        assert!(native.contains_key("PostToolUse"));
        assert!(native.contains_key("UserPromptSubmit"));
        assert_eq!(
            native["PostToolUse"][0].matcher.as_deref(),
            Some("Write|Edit")
        );
    }

    #[test]
    fn projection_round_trips_through_backport() {
        let canon = PathBuf::from("/home/u/agent-canon");
        let base = PathBuf::from("/home/u/.gemini");
        let t = gemini_transform(&canon, &base);

        let mut doc = HookDoc::new();
        doc.insert(
            "PreToolUse".to_string(),
            vec![HookEntry {
                matcher: Some("Bash|Grep".to_string()),
                hooks: vec![HookCommand {
                    name: "guard".to_string(),
                    command: "python3 /home/u/agent-canon/hooks/guard.py".to_string(),
                    timeout_ms: None,
                }],
            }],
        );

        let native = hook_to_native(&doc, &t).unwrap();
        let back = hook_to_canonical(&native, &t).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn all_events_dropped_yields_none() {
        let mut doc = HookDoc::new();
        doc.insert(
            "UserPromptSubmit".to_string(),
            vec![HookEntry {
                matcher: None,
                hooks: vec![],
            }],
        );
        let canon = PathBuf::from("/c");
        let base = PathBuf::from("/g");
        assert!(hook_to_native(&doc, &gemini_transform(&canon, &base)).is_none());
    }
}
