//! Fixed lookup tables between canonical and target-native hook vocabulary.
//!
//! The canonical schema uses the Claude-shaped names for both hook events
//! and tool matchers. Targets with their own vocabulary map through the
//! tables below; events with no entry are simply not delivered to that
//! target.

use concord_adapters::Tool;

/// Canonical event name → Gemini-flavor native event name.
///
/// `UserPromptSubmit` has no entry: the Gemini-flavor runtime has no prompt
/// submission hook, so those bindings are dropped.
const GEMINI_EVENTS: &[(&str, &str)] = &[
    ("SessionStart", "onSessionStart"),
    ("PreToolUse", "onBeforeTool"),
    ("PostToolUse", "onAfterTool"),
    ("Stop", "onSessionEnd"),
];

/// Canonical tool name → Gemini-flavor native tool name.
const GEMINI_TOOLS: &[(&str, &str)] = &[
    ("Bash", "run_shell_command"),
    ("Read", "read_file"),
    ("Write", "write_file"),
    ("Edit", "replace"),
    ("Glob", "glob"),
    ("Grep", "search_file_content"),
];

fn forward(table: &'static [(&'static str, &'static str)], key: &str) -> Option<&'static str> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

fn backward(table: &'static [(&'static str, &'static str)], value: &str) -> Option<&'static str> {
    table.iter().find(|(_, v)| *v == value).map(|(k, _)| *k)
}

/// Maps a canonical event name to the target-native one. `None` means the
/// target does not receive hooks for this event.
pub fn to_native_event(tool: Tool, event: &str) -> Option<&str> {
    match tool {
        // The canonical schema is Claude-shaped; no remapping.
        Tool::Claude => Some(event),
        Tool::Gemini | Tool::Qwen => forward(GEMINI_EVENTS, event),
    }
}

/// Inverse of [`to_native_event`], used on backport.
pub fn to_canonical_event(tool: Tool, native: &str) -> Option<&str> {
    match tool {
        Tool::Claude => Some(native),
        Tool::Gemini | Tool::Qwen => backward(GEMINI_EVENTS, native),
    }
}

/// Maps a canonical tool name (as used in matcher expressions) to the
/// target-native one. Unknown names pass through unchanged.
pub fn to_native_tool(tool: Tool, name: &str) -> Option<&'static str> {
    match tool {
        Tool::Claude => None,
        Tool::Gemini | Tool::Qwen => forward(GEMINI_TOOLS, name),
    }
}

/// Inverse of [`to_native_tool`].
pub fn to_canonical_tool(tool: Tool, name: &str) -> Option<&'static str> {
    match tool {
        Tool::Claude => None,
        Tool::Gemini | Tool::Qwen => backward(GEMINI_TOOLS, name),
    }
}
