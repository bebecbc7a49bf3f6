//! The directional executor.
//!
//! Applies a selection of a target's plan either canonical→target (`sync`)
//! or target→canonical (`backport`). A file write plus its baseline update
//! is the minimal atomic unit: writes go to a temporary file first and are
//! renamed into place, the baseline is recorded only after the rename
//! succeeds, and cancellation is honored between artifacts, never
//! mid-pair. One artifact's failure never aborts the rest of the target.

use crate::context::SyncContext;
use crate::error::{Result, SyncError};
use crate::expect::{
    artifact_file_name, expected_files, hook_doc_bytes, hook_transform, mcp_server_bytes,
    sanitize_rel, Expected,
};
use crate::plan::TargetPlan;
use crate::report::{FailedItem, SkipReason, TargetOutcome};
use crate::store::CanonicalStore;
use crate::Category;
use concord_state::{fingerprint, BaselineStore};
use concord_transform::{command_to_skill, hook_to_canonical, hook_to_native, HookDoc};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Which way content flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Canonical → target. Drifted entries are preserved, never written.
    Sync,
    /// Target → canonical. Drifted entries become the new baseline.
    Backport,
}

#[derive(Debug, Clone, Copy)]
pub struct ExecOptions {
    pub direction: Direction,
    /// Perform every step except the final write and baseline update.
    pub dry_run: bool,
    /// Also delete selected prune candidates.
    pub prune: bool,
}

/// User filtering applied to a plan before execution.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Restrict to these categories; `None` selects all.
    pub categories: Option<BTreeSet<Category>>,
    /// Optional MCP servers explicitly opted into.
    pub optional_servers: BTreeSet<String>,
}

impl Selection {
    fn selects(&self, category: Category) -> bool {
        self.categories
            .as_ref()
            .map_or(true, |set| set.contains(&category))
    }
}

/// Writes via a temporary file in the destination directory, then renames
/// into place, so an interrupted write can never leave a half-written
/// artifact that would later read as drifted.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        SyncError::fs(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no parent"),
        )
    })?;
    std::fs::create_dir_all(parent).map_err(|e| SyncError::fs(parent, e))?;
    let tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| SyncError::fs(parent, e))?;
    std::fs::write(tmp.path(), bytes).map_err(|e| SyncError::fs(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| SyncError::fs(path, e.error))?;
    Ok(())
}

fn item_label(category: Category, name: &str) -> String {
    format!("{category}/{name}")
}

/// Applies the selected portion of one target's plan. Mutations for one
/// target are serialized here; callers must not run two executors against
/// the same target concurrently.
pub fn execute(
    ctx: &SyncContext,
    store: &CanonicalStore,
    plan: &TargetPlan,
    selection: &Selection,
    opts: ExecOptions,
) -> Result<TargetOutcome> {
    let mut outcome = TargetOutcome::new(plan.label.clone(), opts.dry_run);
    let mut baselines = BaselineStore::load(plan.adapter.base())
        .map_err(|e| SyncError::preflight(plan.adapter.base(), e.to_string()))?;

    match opts.direction {
        Direction::Sync => {
            sync_files(ctx, store, plan, selection, opts, &mut baselines, &mut outcome)?;
            sync_mcp(ctx, store, plan, selection, opts, &mut baselines, &mut outcome)?;
            if opts.prune {
                prune(ctx, plan, selection, opts, &mut baselines, &mut outcome);
            }
        }
        Direction::Backport => {
            backport(ctx, store, plan, selection, opts, &mut baselines, &mut outcome)?;
        }
    }

    Ok(outcome)
}

fn record_baseline(
    baselines: &mut BaselineStore,
    category: Category,
    name: &str,
    fingerprint: &str,
    outcome: &mut TargetOutcome,
) {
    baselines.record(category.as_str(), name, fingerprint);
    if let Err(e) = baselines.save() {
        // The write itself succeeded; a failed baseline save means the
        // artifact reads as current-but-unbaselined next run, which the
        // classifier already treats correctly.
        outcome.notes.push(format!(
            "baseline for {} not recorded: {e}",
            item_label(category, name)
        ));
    }
}

#[allow(clippy::too_many_arguments)]
fn sync_files(
    ctx: &SyncContext,
    store: &CanonicalStore,
    plan: &TargetPlan,
    selection: &Selection,
    opts: ExecOptions,
    baselines: &mut BaselineStore,
    outcome: &mut TargetOutcome,
) -> Result<()> {
    for category in Category::FILES {
        if !selection.selects(category) {
            continue;
        }
        let Some(set) = plan.diff.changes_for(category) else {
            continue;
        };

        // Drifted entries are reported, never overwritten in this
        // direction.
        for name in &set.drifted {
            tracing::info!(artifact = %item_label(category, name), "local edits preserved");
            outcome.preserved.push(item_label(category, name));
        }

        if set.missing.is_empty() && set.outdated.is_empty() {
            continue;
        }
        let expected = expected_files(category, store, &plan.adapter)?;
        let by_name: BTreeMap<&str, &Expected> =
            expected.items.iter().map(|e| (e.name.as_str(), e)).collect();

        for name in set.missing.iter().chain(&set.outdated) {
            if ctx.is_cancelled() {
                outcome.notes.push("interrupted; remaining artifacts untouched".to_string());
                return Ok(());
            }
            let Some(item) = by_name.get(name.as_str()) else {
                // The canonical artifact vanished between diff and apply.
                outcome.failed.push(FailedItem {
                    item: item_label(category, name),
                    reason: "canonical artifact no longer present".to_string(),
                });
                continue;
            };
            if opts.dry_run {
                outcome.applied += 1;
                continue;
            }
            match write_atomic(&item.path, &item.content) {
                Ok(()) => {
                    record_baseline(baselines, category, name, &item.fingerprint, outcome);
                    outcome.applied += 1;
                }
                Err(e) => {
                    tracing::warn!(artifact = %item_label(category, name), error = %e, "write failed");
                    outcome.failed.push(FailedItem {
                        item: item_label(category, name),
                        reason: e.to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn sync_mcp(
    ctx: &SyncContext,
    store: &CanonicalStore,
    plan: &TargetPlan,
    selection: &Selection,
    opts: ExecOptions,
    baselines: &mut BaselineStore,
    outcome: &mut TargetOutcome,
) -> Result<()> {
    if !selection.selects(Category::McpServer) {
        return Ok(());
    }
    let Some(set) = plan.diff.changes_for(Category::McpServer) else {
        return Ok(());
    };
    let (manifest, _) = store.mcp_manifest()?;

    for name in &set.drifted {
        tracing::info!(artifact = %item_label(Category::McpServer, name), "local edits preserved");
        outcome.preserved.push(item_label(Category::McpServer, name));
    }

    // Servers to insert or replace: every missing/outdated entry from the
    // diff, plus optional servers explicitly opted into now.
    let mut to_write: BTreeMap<String, serde_json::Value> = BTreeMap::new();
    for name in set.missing.iter().chain(&set.outdated) {
        if let Some(server) = manifest.core.get(name) {
            to_write.insert(name.clone(), server.clone());
        } else if let Some(optional) = manifest.optional.get(name) {
            to_write.insert(name.clone(), optional.server.clone());
        }
    }
    for name in &selection.optional_servers {
        if to_write.contains_key(name) {
            continue;
        }
        let Some(optional) = manifest.optional.get(name) else {
            outcome.failed.push(FailedItem {
                item: item_label(Category::McpServer, name),
                reason: "no such optional server in the manifest".to_string(),
            });
            continue;
        };
        if set.drifted.contains(name) {
            continue; // already reported as preserved
        }
        let missing = ctx.env.missing(&optional.requires);
        if !missing.is_empty() {
            outcome.skipped.push(SkipReason::MissingSecrets {
                item: item_label(Category::McpServer, name),
                keys: missing.into_iter().map(str::to_string).collect(),
            });
            continue;
        }
        let expected_fp = fingerprint(&mcp_server_bytes(&optional.server));
        if baselines.get(Category::McpServer.as_str(), name) == Some(expected_fp.as_str())
            && plan.optional_mcp.iter().any(|o| o.name == *name && o.installed)
        {
            continue; // already installed and current
        }
        if let Some(install) = &optional.install {
            outcome
                .notes
                .push(format!("{name}: requires prerequisite: {install}"));
        }
        if let Some(note) = &optional.note {
            outcome.notes.push(format!("{name}: {note}"));
        }
        to_write.insert(name.clone(), optional.server.clone());
    }

    if to_write.is_empty() {
        return Ok(());
    }
    if ctx.is_cancelled() {
        outcome.notes.push("interrupted; MCP servers untouched".to_string());
        return Ok(());
    }
    if opts.dry_run {
        outcome.applied += to_write.len();
        return Ok(());
    }

    // Read-modify-write of the shared settings document: only the selected
    // server keys change, unrelated keys stay byte-for-byte.
    let settings_path = plan.adapter.settings_path();
    let mut settings: serde_json::Value = match std::fs::read(&settings_path) {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| SyncError::MalformedArtifact {
            name: settings_path.display().to_string(),
            reason: e.to_string(),
        })?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => serde_json::json!({}),
        Err(e) => return Err(SyncError::fs(&settings_path, e)),
    };
    if !settings.is_object() {
        return Err(SyncError::MalformedArtifact {
            name: settings_path.display().to_string(),
            reason: "settings document is not an object".to_string(),
        });
    }
    let servers = settings
        .as_object_mut()
        .expect("checked object above")
        .entry("mcpServers")
        .or_insert_with(|| serde_json::json!({}));
    for (name, value) in &to_write {
        servers[name] = value.clone();
    }

    let bytes = serde_json::to_vec_pretty(&settings).expect("settings serialize");
    match write_atomic(&settings_path, &bytes) {
        Ok(()) => {
            for (name, value) in &to_write {
                let fp = fingerprint(&mcp_server_bytes(value));
                record_baseline(baselines, Category::McpServer, name, &fp, outcome);
                outcome.applied += 1;
            }
        }
        Err(e) => {
            for name in to_write.keys() {
                outcome.failed.push(FailedItem {
                    item: item_label(Category::McpServer, name),
                    reason: e.to_string(),
                });
            }
        }
    }
    Ok(())
}

fn prune(
    ctx: &SyncContext,
    plan: &TargetPlan,
    selection: &Selection,
    opts: ExecOptions,
    baselines: &mut BaselineStore,
    outcome: &mut TargetOutcome,
) {
    for (category, name) in &plan.diff.prune {
        if !selection.selects(*category) {
            continue;
        }
        if ctx.is_cancelled() {
            outcome.notes.push("interrupted; remaining prune candidates untouched".to_string());
            return;
        }
        if opts.dry_run {
            outcome.pruned += 1;
            continue;
        }
        let removed = match category {
            Category::Skill => {
                let dir = plan.adapter.skills_dir().join(sanitize_rel(name));
                std::fs::remove_dir_all(&dir)
                    .or_else(|_| {
                        // Flat skill file rather than a directory.
                        std::fs::remove_file(
                            plan.adapter
                                .skills_dir()
                                .join(sanitize_rel(name))
                                .with_extension("md"),
                        )
                    })
                    .map_err(|e| SyncError::fs(&dir, e))
            }
            Category::Hook => {
                let path = plan.adapter.hooks_dir().join(artifact_file_name(name, "json"));
                std::fs::remove_file(&path).map_err(|e| SyncError::fs(&path, e))
            }
            Category::Command => {
                let path = plan.adapter.commands_dir().join(artifact_file_name(
                    name,
                    plan.adapter.capabilities.command_format.extension(),
                ));
                std::fs::remove_file(&path).map_err(|e| SyncError::fs(&path, e))
            }
            Category::Config => {
                let path = plan.adapter.context_path();
                std::fs::remove_file(&path).map_err(|e| SyncError::fs(&path, e))
            }
            Category::McpServer => remove_mcp_entry(&plan.adapter.settings_path(), name),
        };
        match removed {
            Ok(()) => {
                baselines.remove(category.as_str(), name);
                if let Err(e) = baselines.save() {
                    outcome
                        .notes
                        .push(format!("baseline cleanup failed for {name}: {e}"));
                }
                outcome.pruned += 1;
            }
            Err(e) => outcome.failed.push(FailedItem {
                item: item_label(*category, name),
                reason: e.to_string(),
            }),
        }
    }
}

fn remove_mcp_entry(settings_path: &Path, name: &str) -> Result<()> {
    let bytes = std::fs::read(settings_path).map_err(|e| SyncError::fs(settings_path, e))?;
    let mut settings: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|e| SyncError::MalformedArtifact {
            name: settings_path.display().to_string(),
            reason: e.to_string(),
        })?;
    if let Some(servers) = settings.get_mut("mcpServers").and_then(|v| v.as_object_mut()) {
        servers.remove(name);
    }
    let bytes = serde_json::to_vec_pretty(&settings).expect("settings serialize");
    write_atomic(settings_path, &bytes)
}

#[allow(clippy::too_many_arguments)]
fn backport(
    ctx: &SyncContext,
    store: &CanonicalStore,
    plan: &TargetPlan,
    selection: &Selection,
    opts: ExecOptions,
    baselines: &mut BaselineStore,
    outcome: &mut TargetOutcome,
) -> Result<()> {
    for (&category, set) in &plan.diff.changes {
        if !selection.selects(category) {
            continue;
        }
        for name in &set.drifted {
            if ctx.is_cancelled() {
                outcome.notes.push("interrupted; remaining artifacts untouched".to_string());
                return Ok(());
            }
            match backport_one(store, plan, category, name, opts, baselines, outcome) {
                Ok(true) => outcome.applied += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(artifact = %item_label(category, name), error = %e, "backport failed");
                    outcome.failed.push(FailedItem {
                        item: item_label(category, name),
                        reason: e.to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

/// Accepts one drifted artifact's installed content as the new canonical
/// truth. Returns `Ok(false)` when the artifact was skipped (recorded in
/// the outcome).
fn backport_one(
    store: &CanonicalStore,
    plan: &TargetPlan,
    category: Category,
    name: &str,
    opts: ExecOptions,
    baselines: &mut BaselineStore,
    outcome: &mut TargetOutcome,
) -> Result<bool> {
    let adapter = &plan.adapter;
    let transform = hook_transform(store, adapter);

    // (canonical path, canonical bytes, normalized target bytes + path)
    let (canonical_path, canonical_bytes, normalized): (
        std::path::PathBuf,
        Vec<u8>,
        Option<(std::path::PathBuf, Vec<u8>)>,
    ) = match category {
        Category::Skill => {
            let path = adapter.skills_dir().join(sanitize_rel(name)).join("SKILL.md");
            let bytes = std::fs::read(&path).map_err(|e| SyncError::fs(&path, e))?;
            (store.skill_path(name), bytes, None)
        }
        Category::Config => {
            let path = adapter.context_path();
            let bytes = std::fs::read(&path).map_err(|e| SyncError::fs(&path, e))?;
            (store.context_path(), bytes, None)
        }
        Category::Hook => {
            let path = adapter.hooks_dir().join(artifact_file_name(name, "json"));
            let bytes = std::fs::read(&path).map_err(|e| SyncError::fs(&path, e))?;
            let native: HookDoc =
                serde_json::from_slice(&bytes).map_err(|e| SyncError::MalformedArtifact {
                    name: item_label(category, name),
                    reason: e.to_string(),
                })?;
            let Some(canonical) = hook_to_canonical(&native, &transform) else {
                outcome.skipped.push(SkipReason::NoInverse {
                    item: item_label(category, name),
                    reason: "no events map back to the canonical schema".to_string(),
                });
                return Ok(false);
            };
            // Re-deriving the native form normalizes the hand-edited copy
            // so the new baseline matches what is on disk.
            let renative = hook_to_native(&canonical, &transform)
                .expect("canonical events always map forward again");
            (
                store.hook_path(name),
                hook_doc_bytes(&canonical),
                Some((path, hook_doc_bytes(&renative))),
            )
        }
        Category::Command => {
            let format = adapter.capabilities.command_format;
            let path = adapter
                .commands_dir()
                .join(artifact_file_name(name, format.extension()));
            let bytes = std::fs::read(&path).map_err(|e| SyncError::fs(&path, e))?;
            let content = String::from_utf8_lossy(&bytes);
            let doc = match command_to_skill(name, &content, format) {
                Ok(doc) => doc,
                Err(unrep) => {
                    outcome.skipped.push(SkipReason::NoInverse {
                        item: item_label(category, name),
                        reason: unrep.reason,
                    });
                    return Ok(false);
                }
            };
            let renative = match concord_transform::command_from_skill(&doc, format) {
                Ok(native) => native,
                Err(unrep) => {
                    outcome.skipped.push(SkipReason::NoInverse {
                        item: item_label(category, name),
                        reason: unrep.reason,
                    });
                    return Ok(false);
                }
            };
            (
                store.command_path(name),
                doc.into_bytes(),
                Some((path, renative.content.into_bytes())),
            )
        }
        Category::McpServer => {
            return backport_mcp(store, plan, name, opts, baselines, outcome);
        }
    };

    if opts.dry_run {
        return Ok(true);
    }

    write_atomic(&canonical_path, &canonical_bytes)?;
    let baseline_fp = match &normalized {
        Some((target_path, bytes)) => {
            write_atomic(target_path, bytes)?;
            fingerprint(bytes)
        }
        None => fingerprint(&canonical_bytes),
    };
    record_baseline(baselines, category, name, &baseline_fp, outcome);
    Ok(true)
}

fn backport_mcp(
    store: &CanonicalStore,
    plan: &TargetPlan,
    name: &str,
    opts: ExecOptions,
    baselines: &mut BaselineStore,
    outcome: &mut TargetOutcome,
) -> Result<bool> {
    let settings_path = plan.adapter.settings_path();
    let bytes = std::fs::read(&settings_path).map_err(|e| SyncError::fs(&settings_path, e))?;
    let settings: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|e| SyncError::MalformedArtifact {
            name: settings_path.display().to_string(),
            reason: e.to_string(),
        })?;
    let Some(server) = settings
        .get("mcpServers")
        .and_then(|v| v.get(name))
        .cloned()
    else {
        outcome.failed.push(FailedItem {
            item: item_label(Category::McpServer, name),
            reason: "installed server entry disappeared".to_string(),
        });
        return Ok(false);
    };

    if opts.dry_run {
        return Ok(true);
    }
    store.update_mcp_core(name, &server)?;
    let fp = fingerprint(&mcp_server_bytes(&server));
    record_baseline(baselines, Category::McpServer, name, &fp, outcome);
    Ok(true)
}
