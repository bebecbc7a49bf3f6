//! Rewriting of canonical-tree paths embedded in hook commands.
//!
//! A hook command often references scripts that live inside the canonical
//! store (`python3 "$CLAUDE_PROJECT_DIR/agent-canon/hooks/run.py"`). Once
//! installed at a target, those references must point inside the target's
//! own tree. The rewrite keys on the canonical root's last path segment and
//! substitutes the target base directory; rewriting an already-rewritten
//! command is a no-op.

use std::path::Path;

/// Characters that can appear inside a path token in a shell command.
fn is_path_char(ch: char) -> bool {
    !ch.is_whitespace() && !matches!(ch, '"' | '\'' | '=' | '(' | ')' | '<' | '>' | ';' | '|' | '&')
}

/// Rewrites every path in `command` that runs through the canonical root's
/// last segment so that it points under `target_base` instead.
///
/// Idempotent: a path already under `target_base` is left untouched, and a
/// second pass over rewritten output yields the identical string.
pub fn rewrite_paths(command: &str, canonical_root: &Path, target_base: &Path) -> String {
    let Some(segment) = canonical_root.file_name().and_then(|s| s.to_str()) else {
        return command.to_string();
    };
    let target = target_base.to_string_lossy();
    let needle = format!("/{segment}");

    let mut out = String::with_capacity(command.len());
    let mut rest = command;
    while let Some(pos) = rest.find(&needle) {
        let after = pos + needle.len();
        // Only a whole path segment counts: the match must end at a
        // separator, a non-path character, or the end of the token.
        let ends_segment = match rest[after..].chars().next() {
            None => true,
            Some('/') => true,
            Some(ch) => !is_path_char(ch),
        };
        if !ends_segment {
            out.push_str(&rest[..after]);
            rest = &rest[after..];
            continue;
        }

        // Walk left to the start of the path token.
        let prefix_start = rest[..pos]
            .char_indices()
            .rev()
            .take_while(|(_, ch)| is_path_char(*ch))
            .last()
            .map(|(i, _)| i)
            .unwrap_or(pos);
        let matched = &rest[prefix_start..after];

        if matched == target {
            // Already pointing at the target tree.
            out.push_str(&rest[..after]);
        } else {
            out.push_str(&rest[..prefix_start]);
            out.push_str(&target);
        }
        rest = &rest[after..];
    }
    out.push_str(rest);
    out
}
