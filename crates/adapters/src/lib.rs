//! Target tool descriptors for concord.
//!
//! Every supported assistant runtime is described by a closed [`Tool`]
//! variant plus a value-level capability table. Resolving a tool identity
//! and a base path yields an [`Adapter`]: the capability set and the
//! category directories for that installation. Resolution is deterministic
//! and free of side effects; nothing here touches the filesystem.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Error returned when a tool identity string is not a registered variant.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown tool '{identity}' (expected one of: claude, gemini, qwen)")]
pub struct UnknownToolError {
    pub identity: String,
}

/// A supported assistant runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    /// Claude Code style installation (`~/.claude`).
    Claude,
    /// Gemini CLI style installation (`~/.gemini`).
    Gemini,
    /// Qwen Code style installation (`~/.qwen`), a Gemini flavor with its
    /// own command directory and no hook support.
    Qwen,
}

impl Tool {
    /// Parses a tool identity as written in a target manifest.
    pub fn parse(identity: &str) -> Result<Self, UnknownToolError> {
        match identity.trim().to_ascii_lowercase().as_str() {
            "claude" => Ok(Self::Claude),
            "gemini" => Ok(Self::Gemini),
            "qwen" => Ok(Self::Qwen),
            _ => Err(UnknownToolError {
                identity: identity.to_string(),
            }),
        }
    }

    /// Canonical lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Gemini => "gemini",
            Self::Qwen => "qwen",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a target represents slash commands on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandFormat {
    /// Runnable markdown prompt documents (`<name>.md`).
    Markdown,
    /// Structured TOML descriptors with `description` and `prompt` fields
    /// (`<name>.toml`).
    Toml,
}

impl CommandFormat {
    /// File extension used for command artifacts in this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Toml => "toml",
        }
    }
}

/// Directory layout flavor, resolved once at adapter construction.
///
/// Replaces ad hoc path sniffing: a sub-flavor that stores commands
/// somewhere else carries that fact here, not in string checks at call
/// sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutVariant {
    /// Commands under `<base>/commands`.
    Standard,
    /// Commands under `<base>/prompts`.
    AltCommands,
}

/// Which artifact categories a target supports, plus the target-native
/// vocabulary needed by the schema transformer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub skills: bool,
    pub hooks: bool,
    pub commands: bool,
    pub mcp_servers: bool,
    pub context: bool,
    /// Native command representation.
    pub command_format: CommandFormat,
    /// Name of the per-tool context document at the base directory root.
    pub context_file: &'static str,
    /// Environment variable the runtime exports for its project directory.
    pub project_dir_var: &'static str,
}

/// A resolved target: tool identity, layout, base path, capabilities.
#[derive(Debug, Clone)]
pub struct Adapter {
    pub tool: Tool,
    pub variant: LayoutVariant,
    base: PathBuf,
    pub capabilities: Capabilities,
}

impl Adapter {
    /// Resolves a tool identity and base path into capability set and
    /// directory layout. Total over the closed [`Tool`] enum.
    pub fn resolve(tool: Tool, base: impl Into<PathBuf>) -> Self {
        let (variant, capabilities) = match tool {
            Tool::Claude => (
                LayoutVariant::Standard,
                Capabilities {
                    skills: true,
                    hooks: true,
                    commands: true,
                    mcp_servers: true,
                    context: true,
                    command_format: CommandFormat::Markdown,
                    context_file: "CLAUDE.md",
                    project_dir_var: "CLAUDE_PROJECT_DIR",
                },
            ),
            Tool::Gemini => (
                LayoutVariant::Standard,
                Capabilities {
                    skills: true,
                    hooks: true,
                    commands: true,
                    mcp_servers: true,
                    context: true,
                    command_format: CommandFormat::Toml,
                    context_file: "GEMINI.md",
                    project_dir_var: "GEMINI_PROJECT_DIR",
                },
            ),
            Tool::Qwen => (
                LayoutVariant::AltCommands,
                Capabilities {
                    skills: true,
                    hooks: false,
                    commands: true,
                    mcp_servers: true,
                    context: true,
                    command_format: CommandFormat::Toml,
                    context_file: "QWEN.md",
                    project_dir_var: "QWEN_PROJECT_DIR",
                },
            ),
        };
        Self {
            tool,
            variant,
            base: base.into(),
            capabilities,
        }
    }

    /// Base configuration directory for this target.
    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn skills_dir(&self) -> PathBuf {
        self.base.join("skills")
    }

    pub fn hooks_dir(&self) -> PathBuf {
        self.base.join("hooks")
    }

    pub fn commands_dir(&self) -> PathBuf {
        match self.variant {
            LayoutVariant::Standard => self.base.join("commands"),
            LayoutVariant::AltCommands => self.base.join("prompts"),
        }
    }

    /// Merged settings document holding MCP server entries.
    pub fn settings_path(&self) -> PathBuf {
        self.base.join("settings.json")
    }

    /// Per-tool context document (`CLAUDE.md`, `GEMINI.md`, ...).
    pub fn context_path(&self) -> PathBuf {
        self.base.join(self.capabilities.context_file)
    }
}

/// Infers a tool identity from a path's naming conventions.
///
/// Matching is case-insensitive and separator-normalized; a leading dot on
/// a directory name is ignored (`.claude` and `Claude` both match). Returns
/// `None` when no convention matches, so the caller can prompt or skip.
pub fn detect(path: &Path) -> Option<Tool> {
    let normalized = path.to_string_lossy().replace('\\', "/");
    for segment in normalized.split('/').rev() {
        let name = segment.trim_start_matches('.').to_ascii_lowercase();
        match name.as_str() {
            "claude" => return Some(Tool::Claude),
            "gemini" => return Some(Tool::Gemini),
            "qwen" => return Some(Tool::Qwen),
            _ => {}
        }
    }
    None
}
