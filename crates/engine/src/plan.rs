//! Sync plans: one diff per configured target, built concurrently.
//!
//! Each target's scan touches its own filesystem subtree and its own
//! baseline store, so the scans are independent and issued as parallel
//! blocking tasks. A plan is a pure computation result; selection happens
//! before execution.

use crate::context::SyncContext;
use crate::diff::{diff_target, TargetDiff};
use crate::error::{Result, SyncError};
use crate::store::CanonicalStore;
use concord_adapters::{detect, Adapter, Tool, UnknownToolError};
use concord_state::BaselineStore;
use std::path::PathBuf;
use tokio::task::JoinSet;

/// One configured target as declared in the manifest: a base path and an
/// optional explicit tool identity (detected from the path otherwise).
#[derive(Debug, Clone)]
pub struct TargetSpec {
    pub tool: Option<Tool>,
    pub path: PathBuf,
}

/// An optional MCP server surfaced for explicit opt-in.
#[derive(Debug, Clone)]
pub struct OptionalOffer {
    pub name: String,
    pub installed: bool,
    /// Secret names absent from the env file; non-empty blocks install.
    pub missing_secrets: Vec<String>,
    pub install: Option<String>,
    pub note: Option<String>,
}

/// The reconciliation result for one target.
#[derive(Debug, Clone)]
pub struct TargetPlan {
    /// Display label, the target base path as configured.
    pub label: String,
    pub adapter: Adapter,
    pub diff: TargetDiff,
    pub optional_mcp: Vec<OptionalOffer>,
}

/// A target that could not be planned at all. Other targets proceed.
#[derive(Debug)]
pub struct TargetFailure {
    pub label: String,
    pub error: SyncError,
}

/// Plans for every target that resolved, plus per-target fatal failures.
#[derive(Debug, Default)]
pub struct PlanSet {
    pub plans: Vec<TargetPlan>,
    pub failures: Vec<TargetFailure>,
}

impl PlanSet {
    /// Total change candidates across all planned targets.
    pub fn total(&self) -> usize {
        self.plans.iter().map(|p| p.diff.total()).sum()
    }
}

fn plan_one(
    ctx: &SyncContext,
    store: &CanonicalStore,
    spec: &TargetSpec,
) -> Result<TargetPlan> {
    let tool = match spec.tool.or_else(|| detect(&spec.path)) {
        Some(tool) => tool,
        None => {
            return Err(SyncError::UnknownTool(UnknownToolError {
                identity: spec.path.display().to_string(),
            }))
        }
    };
    let adapter = Adapter::resolve(tool, &spec.path);
    let baselines = BaselineStore::load(adapter.base())
        .map_err(|e| SyncError::preflight(adapter.base(), e.to_string()))?;

    let diff = diff_target(ctx, store, &adapter, &baselines)?;

    let (manifest, _) = store.mcp_manifest()?;
    let installed: std::collections::BTreeSet<String> = diff
        .changes_for(crate::Category::McpServer)
        .map(|_| installed_server_names(&adapter))
        .unwrap_or_default();
    let optional_mcp = manifest
        .optional
        .iter()
        .map(|(name, optional)| OptionalOffer {
            name: name.clone(),
            installed: installed.contains(name),
            missing_secrets: ctx
                .env
                .missing(&optional.requires)
                .into_iter()
                .map(str::to_string)
                .collect(),
            install: optional.install.clone(),
            note: optional.note.clone(),
        })
        .collect();

    Ok(TargetPlan {
        label: spec.path.display().to_string(),
        adapter,
        diff,
        optional_mcp,
    })
}

fn installed_server_names(adapter: &Adapter) -> std::collections::BTreeSet<String> {
    std::fs::read(adapter.settings_path())
        .ok()
        .and_then(|bytes| serde_json::from_slice::<serde_json::Value>(&bytes).ok())
        .and_then(|doc| {
            doc.get("mcpServers")
                .and_then(|v| v.as_object())
                .map(|obj| obj.keys().cloned().collect())
        })
        .unwrap_or_default()
}

/// Diffs every configured target concurrently. Per-target failures land in
/// `failures`; only a canonical-store failure aborts the whole call.
pub async fn build_plans(
    ctx: &SyncContext,
    store: &CanonicalStore,
    targets: Vec<TargetSpec>,
) -> Result<PlanSet> {
    let mut tasks = JoinSet::new();
    for spec in targets {
        let ctx = ctx.clone();
        let store = store.clone();
        tasks.spawn_blocking(move || {
            let label = spec.path.display().to_string();
            (label, plan_one(&ctx, &store, &spec))
        });
    }

    let mut set = PlanSet::default();
    while let Some(joined) = tasks.join_next().await {
        let (label, outcome) = joined.expect("plan task panicked");
        match outcome {
            Ok(plan) => set.plans.push(plan),
            Err(error) => {
                tracing::warn!(target = %label, error = %error, "target could not be planned");
                set.failures.push(TargetFailure { label, error });
            }
        }
    }
    // Join order is completion order; keep output deterministic.
    set.plans.sort_by(|a, b| a.label.cmp(&b.label));
    set.failures.sort_by(|a, b| a.label.cmp(&b.label));
    Ok(set)
}
