//! Error taxonomy for the reconciliation engine.
//!
//! Errors local to one artifact or one target never abort the whole run:
//! per-artifact filesystem failures are recorded in the target's outcome,
//! and per-target failures (unknown tool, unscannable base path) are
//! collected next to the plans that did succeed. Only a failure that
//! prevents building any plan at all (canonical store unreadable) is
//! surfaced as a plain error to the caller.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The target's declared tool identity is not a registered variant.
    /// Fatal for that target only.
    #[error(transparent)]
    UnknownTool(#[from] concord_adapters::UnknownToolError),

    /// The target's base path (or the canonical store) cannot be scanned
    /// at all. Fatal for that target; other targets proceed.
    #[error("cannot scan {path}: {reason}")]
    Preflight { path: PathBuf, reason: String },

    /// Permission or I/O failure on one artifact. Aborts only that
    /// artifact.
    #[error("{path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Canonical content that fails to parse. Skipped with a warning,
    /// never silently.
    #[error("malformed artifact '{name}': {reason}")]
    MalformedArtifact { name: String, reason: String },
}

impl SyncError {
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub fn preflight(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Preflight {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True when the error is fatal for a whole target rather than a
    /// single artifact.
    pub fn is_target_fatal(&self) -> bool {
        matches!(self, Self::UnknownTool(_) | Self::Preflight { .. })
    }
}
