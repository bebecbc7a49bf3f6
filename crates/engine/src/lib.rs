//! Reconciliation engine for concord.
//!
//! Walks the canonical artifact store and each target's installed
//! artifacts, classifies every artifact as missing, outdated, or drifted,
//! aggregates the result into per-target plans, and applies a selection of
//! those plans in either direction (sync or backport) while preserving
//! local edits.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
mod expect;
pub mod plan;
pub mod report;
pub mod store;

pub use context::SyncContext;
pub use diff::{diff_target, ChangeSet, DriftDetail, TargetDiff};
pub use error::{Result, SyncError};
pub use executor::{execute, Direction, ExecOptions, Selection};
pub use plan::{build_plans, OptionalOffer, PlanSet, TargetFailure, TargetPlan, TargetSpec};
pub use report::{FailedItem, SkipReason, TargetOutcome};
pub use store::{Artifact, CanonicalStore, HookArtifact, McpManifest, OptionalServer};

/// Artifact category. Identity within the canonical store is
/// `(category, name)`; within a target it is `(category, name, target)`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Skill,
    Hook,
    Command,
    McpServer,
    Config,
}

impl Category {
    /// Categories materialized as one file per artifact. MCP servers live
    /// as keys of the merged settings document instead.
    pub const FILES: [Category; 4] = [
        Category::Skill,
        Category::Hook,
        Category::Command,
        Category::Config,
    ];

    /// Every category, in reporting order.
    pub const ALL: [Category; 5] = [
        Category::Skill,
        Category::Hook,
        Category::Command,
        Category::McpServer,
        Category::Config,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skill => "skill",
            Self::Hook => "hook",
            Self::Command => "command",
            Self::McpServer => "mcp-server",
            Self::Config => "config",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
