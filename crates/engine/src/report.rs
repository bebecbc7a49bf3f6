//! Per-target execution outcomes.
//!
//! Every candidate for change that was not applied shows up here by name:
//! preserved drift, skips with reasons, per-artifact failures. Silent
//! no-ops are not permitted.

use serde::Serialize;

/// Why an artifact that was a candidate for change was not written.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum SkipReason {
    /// The transform cannot project this artifact onto the target.
    Unrepresentable { item: String, reason: String },
    /// An optional MCP server whose required secrets are absent.
    MissingSecrets { item: String, keys: Vec<String> },
    /// Backport found no inverse transform for the installed form.
    NoInverse { item: String, reason: String },
}

impl SkipReason {
    pub fn description(&self) -> String {
        match self {
            Self::Unrepresentable { item, reason } => {
                format!("{item}: not representable on this target ({reason})")
            }
            Self::MissingSecrets { item, keys } => {
                format!("{item}: missing secrets {}", keys.join(", "))
            }
            Self::NoInverse { item, reason } => {
                format!("{item}: cannot backport ({reason})")
            }
        }
    }
}

/// A single artifact whose write failed. The rest of the target proceeds.
#[derive(Debug, Clone, Serialize)]
pub struct FailedItem {
    pub item: String,
    pub reason: String,
}

/// What happened to one target during execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TargetOutcome {
    pub label: String,
    pub dry_run: bool,
    /// Artifacts written (or, in a dry run, that would be written).
    pub applied: usize,
    pub pruned: usize,
    /// Drifted artifacts left untouched, as `category/name`.
    pub preserved: Vec<String>,
    pub skipped: Vec<SkipReason>,
    pub failed: Vec<FailedItem>,
    /// Post-install messages, prerequisite commands, interrupt notices.
    pub notes: Vec<String>,
}

impl TargetOutcome {
    pub fn new(label: String, dry_run: bool) -> Self {
        Self {
            label,
            dry_run,
            ..Default::default()
        }
    }

    pub fn format_summary(&self) -> String {
        let mut out = format!(
            "{}: {} applied{}, {} preserved, {} skipped, {} failed",
            self.label,
            self.applied,
            if self.dry_run { " (dry run)" } else { "" },
            self.preserved.len(),
            self.skipped.len(),
            self.failed.len(),
        );
        if self.pruned > 0 {
            out.push_str(&format!(", {} pruned", self.pruned));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptions_name_the_item() {
        let skip = SkipReason::MissingSecrets {
            item: "mcp-server/search".to_string(),
            keys: vec!["SEARCH_API_KEY".to_string()],
        };
        assert!(skip.description().contains("mcp-server/search"));
        assert!(skip.description().contains("SEARCH_API_KEY"));
    }

    #[test]
    fn summary_marks_dry_runs() {
        let outcome = TargetOutcome::new("~/.gemini".to_string(), true);
        assert!(outcome.format_summary().contains("(dry run)"));
    }
}
