//! Plain-text rendering of plans and outcomes.

use concord_engine::{TargetOutcome, TargetPlan};
use similar::TextDiff;

/// Prints one target's change report.
pub fn print_plan(plan: &TargetPlan) {
    println!("{} ({})", plan.label, plan.adapter.tool);
    if plan.diff.is_clean() && plan.diff.prune.is_empty() {
        println!("  up to date");
    }
    for (category, set) in &plan.diff.changes {
        for name in &set.missing {
            println!("  missing   {category}/{name}");
        }
        for name in &set.outdated {
            println!("  outdated  {category}/{name}");
        }
        for name in &set.drifted {
            println!("  drifted   {category}/{name}");
        }
    }
    for (category, name) in &plan.diff.prune {
        println!("  prunable  {category}/{name}");
    }
    for offer in &plan.optional_mcp {
        let state = if offer.installed {
            "installed".to_string()
        } else if offer.missing_secrets.is_empty() {
            "available with --optional".to_string()
        } else {
            format!("needs secrets: {}", offer.missing_secrets.join(", "))
        };
        println!("  optional  mcp-server/{} ({state})", offer.name);
    }
    for warning in &plan.diff.warnings {
        println!("  warning   {warning}");
    }
}

/// Prints unified diffs (expected vs installed) for drifted artifacts.
pub fn print_drift_diffs(plan: &TargetPlan) {
    for detail in &plan.diff.drift_details {
        println!("--- {}/{} ---", detail.category, detail.name);
        let diff = TextDiff::from_lines(detail.expected.as_str(), detail.installed.as_str());
        print!(
            "{}",
            diff.unified_diff()
                .context_radius(2)
                .header("expected", "installed")
        );
    }
}

/// Prints one target's execution outcome.
pub fn print_outcome(outcome: &TargetOutcome) {
    println!("{}", outcome.format_summary());
    for item in &outcome.preserved {
        println!("  preserved {item} (local edits kept; use --backport to accept them)");
    }
    for skip in &outcome.skipped {
        println!("  skipped   {}", skip.description());
    }
    for failed in &outcome.failed {
        println!("  failed    {}: {}", failed.item, failed.reason);
    }
    for note in &outcome.notes {
        println!("  note      {note}");
    }
}
