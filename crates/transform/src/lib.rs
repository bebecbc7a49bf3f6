//! Schema transforms between the canonical artifact representations and
//! each target tool's native format.
//!
//! Every function here is pure: no filesystem access, no global state.
//! Malformed metadata is the only input class that yields the
//! "unrepresentable" result; everything else is total.

pub mod events;
pub mod hooks;
pub mod paths;
pub mod project;
pub mod rename;

pub use events::{to_canonical_event, to_canonical_tool, to_native_event, to_native_tool};
pub use hooks::{hook_to_canonical, hook_to_native, HookCommand, HookDoc, HookEntry, HookTransform};
pub use paths::rewrite_paths;
pub use project::{
    command_from_skill, command_to_skill, skill_meta, NativeCommand, SkillMeta, Unrepresentable,
};
pub use rename::rename_words;
