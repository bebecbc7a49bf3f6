//! Wiring: manifest loading, runtime setup, dispatch, exit status.

use crate::cli::{Cli, Commands};
use crate::manifest::{expand, Manifest};
use crate::render;
use anyhow::{anyhow, bail, Result};
use clap::Parser;
use concord_adapters::Tool;
use concord_engine::{
    build_plans, execute, CanonicalStore, Category, Direction, ExecOptions, PlanSet, Selection,
    SyncContext, SyncError, TargetFailure, TargetOutcome, TargetSpec,
};
use concord_state::EnvFile;
use std::collections::BTreeSet;
use tokio::runtime::Runtime;
use tokio::task::JoinSet;

pub fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let (manifest, manifest_path) = Manifest::load(cli.manifest.as_deref())?;
    tracing::debug!(manifest = %manifest_path.display(), "loaded target manifest");

    let env = match &manifest.env_file {
        Some(path) => EnvFile::load(&expand(path))?,
        None => EnvFile::default(),
    };
    let ctx = SyncContext::new(env);

    // A canonical store that cannot be opened means no plan can be built
    // at all; this is the one globally fatal case.
    let store = CanonicalStore::open(expand(&manifest.canonical))
        .map_err(|e| anyhow!("canonical store: {e}"))?;

    // A target with an unregistered tool identity fails alone; the rest
    // proceed.
    let mut specs = Vec::new();
    let mut early_failures = Vec::new();
    for entry in &manifest.targets {
        let path = expand(&entry.path);
        match entry.tool.as_deref().map(Tool::parse).transpose() {
            Ok(tool) => specs.push(TargetSpec { tool, path }),
            Err(e) => early_failures.push(TargetFailure {
                label: path.display().to_string(),
                error: SyncError::UnknownTool(e),
            }),
        }
    }
    if specs.is_empty() && early_failures.is_empty() {
        bail!("manifest {} declares no targets", manifest_path.display());
    }

    let rt = Runtime::new()?;
    {
        // Interrupts stop work between artifacts, never mid-write.
        let ctx = ctx.clone();
        rt.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received; stopping after the current artifact");
                ctx.cancel();
            }
        });
    }

    let mut plans = rt.block_on(build_plans(&ctx, &store, specs))?;
    plans.failures.extend(early_failures);
    plans.failures.sort_by(|a, b| a.label.cmp(&b.label));

    let exec_failed = match cli.command {
        Commands::Status { diff } => {
            status(&plans, diff);
            false
        }
        Commands::Sync {
            dry_run,
            yes,
            prune,
            backport,
            optional,
            category,
        } => {
            let selection = Selection {
                categories: if category.is_empty() {
                    None
                } else {
                    Some(category.into_iter().map(Category::from).collect())
                },
                optional_servers: optional.into_iter().collect::<BTreeSet<_>>(),
            };
            let opts = ExecOptions {
                direction: if backport {
                    Direction::Backport
                } else {
                    Direction::Sync
                },
                dry_run,
                prune,
            };
            sync(&rt, &ctx, &store, &plans, &selection, opts, yes)?
        }
    };

    for failure in &plans.failures {
        eprintln!("{}: {}", failure.label, failure.error);
    }
    if !plans.failures.is_empty() || exec_failed {
        bail!("one or more targets failed; see report above");
    }
    Ok(())
}

fn status(plans: &PlanSet, show_diff: bool) {
    for plan in &plans.plans {
        render::print_plan(plan);
        if show_diff {
            render::print_drift_diffs(plan);
        }
    }
}

/// How much work the selection would actually touch, for the confirmation
/// prompt and the nothing-to-do short-circuit.
fn selected_work(plans: &PlanSet, selection: &Selection, opts: ExecOptions) -> usize {
    plans
        .plans
        .iter()
        .map(|plan| {
            let changes: usize = plan
                .diff
                .changes
                .iter()
                .filter(|(category, _)| {
                    selection
                        .categories
                        .as_ref()
                        .map_or(true, |set| set.contains(*category))
                })
                .map(|(_, set)| match opts.direction {
                    Direction::Sync => set.missing.len() + set.outdated.len(),
                    Direction::Backport => set.drifted.len(),
                })
                .sum();
            let prunes = if opts.prune { plan.diff.prune.len() } else { 0 };
            changes + prunes + selection.optional_servers.len()
        })
        .sum()
}

#[allow(clippy::too_many_arguments)]
fn sync(
    rt: &Runtime,
    ctx: &SyncContext,
    store: &CanonicalStore,
    plans: &PlanSet,
    selection: &Selection,
    opts: ExecOptions,
    yes: bool,
) -> Result<bool> {
    for plan in &plans.plans {
        render::print_plan(plan);
    }

    let work = selected_work(plans, selection, opts);
    if work == 0 {
        println!("Nothing to do.");
        return Ok(false);
    }
    if !yes && !opts.dry_run {
        let verb = match opts.direction {
            Direction::Sync => "Apply",
            Direction::Backport => "Backport",
        };
        let confirmed = inquire::Confirm::new(&format!(
            "{verb} {work} change(s) across {} target(s)?",
            plans.plans.len()
        ))
        .with_default(false)
        .prompt()?;
        if !confirmed {
            println!("Aborted.");
            return Ok(false);
        }
    }

    // Targets are independent; run them concurrently. All mutation for one
    // target stays on its own task.
    let outcomes: Vec<std::result::Result<TargetOutcome, (String, SyncError)>> =
        rt.block_on(async {
            let mut tasks = JoinSet::new();
            for plan in plans.plans.clone() {
                let ctx = ctx.clone();
                let store = store.clone();
                let selection = selection.clone();
                tasks.spawn_blocking(move || {
                    execute(&ctx, &store, &plan, &selection, opts)
                        .map_err(|e| (plan.label.clone(), e))
                });
            }
            let mut outcomes = Vec::new();
            while let Some(joined) = tasks.join_next().await {
                outcomes.push(joined.expect("executor task panicked"));
            }
            outcomes
        });

    let mut failed = false;
    let mut done: Vec<TargetOutcome> = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(outcome) => done.push(outcome),
            Err((label, error)) => {
                eprintln!("{label}: {error}");
                failed = true;
            }
        }
    }
    // Per-artifact failures are reported above but are not fatal; only a
    // target that could not be executed at all fails the run.
    done.sort_by(|a, b| a.label.cmp(&b.label));
    for outcome in &done {
        render::print_outcome(outcome);
    }
    Ok(failed)
}
