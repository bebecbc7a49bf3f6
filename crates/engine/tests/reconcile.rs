//! End-to-end reconciliation tests: classify, apply, re-classify.

use concord_adapters::{Adapter, Tool};
use concord_engine::{
    build_plans, diff_target, execute, CanonicalStore, Category, Direction, ExecOptions,
    Selection, SyncContext, TargetPlan, TargetSpec,
};
use concord_state::{BaselineStore, EnvFile};
use concord_test_utils::{CanonicalFixture, TargetFixture};
use std::collections::BTreeSet;

const HOOK_DOC: &str = r#"{
    "PostToolUse": [
        {
            "matcher": "Write|Edit",
            "hooks": [
                {"name": "drift-check", "command": "python3 /tmp/canon/hooks/drift.py", "timeoutMs": 10000}
            ]
        }
    ]
}"#;

fn ctx() -> SyncContext {
    SyncContext::new(EnvFile::default())
}

fn plan_for(store: &CanonicalStore, adapter: &Adapter, ctx: &SyncContext) -> TargetPlan {
    let baselines = BaselineStore::load(adapter.base()).unwrap();
    let diff = diff_target(ctx, store, adapter, &baselines).unwrap();
    TargetPlan {
        label: adapter.base().display().to_string(),
        adapter: adapter.clone(),
        diff,
        optional_mcp: Vec::new(),
    }
}

fn sync_opts() -> ExecOptions {
    ExecOptions {
        direction: Direction::Sync,
        dry_run: false,
        prune: false,
    }
}

fn full_canonical() -> CanonicalFixture {
    let fix = CanonicalFixture::new();
    fix.add_skill("documenting", "Keep docs in sync", "Write the docs.");
    fix.add_command("review", "Review staged changes", "Look at the diff.");
    fix.add_hook("drift-check", HOOK_DOC);
    fix.set_context("# Shared context\n");
    fix.set_mcp_manifest(r#"{"core": {"files": {"command": "mcp-files", "args": ["--root", "."]}}}"#);
    fix
}

#[test]
fn sync_then_rediff_is_idempotent() {
    let fix = full_canonical();
    let target = TargetFixture::new();
    let store = CanonicalStore::open(fix.root()).unwrap();
    let adapter = Adapter::resolve(Tool::Claude, target.base());
    let ctx = ctx();

    let plan = plan_for(&store, &adapter, &ctx);
    assert!(plan.diff.total() > 0);
    let outcome = execute(&ctx, &store, &plan, &Selection::default(), sync_opts()).unwrap();
    assert!(outcome.failed.is_empty());
    assert_eq!(outcome.applied, plan.diff.total());

    // Every supported category must come back clean.
    let rediff = plan_for(&store, &adapter, &ctx).diff;
    for (category, set) in &rediff.changes {
        assert!(
            set.is_empty(),
            "{category} not clean after sync: {set:?}"
        );
    }
}

#[test]
fn end_to_end_hook_lands_under_remapped_event() {
    let fix = CanonicalFixture::new();
    fix.add_hook("drift-check", HOOK_DOC);
    let target = TargetFixture::new();
    let store = CanonicalStore::open(fix.root()).unwrap();
    let adapter = Adapter::resolve(Tool::Gemini, target.base());
    let ctx = ctx();

    let plan = plan_for(&store, &adapter, &ctx);
    let hooks = plan.diff.changes_for(Category::Hook).unwrap();
    assert_eq!(hooks.missing, vec!["drift-check".to_string()]);

    execute(&ctx, &store, &plan, &Selection::default(), sync_opts()).unwrap();

    let installed = target.read("hooks/drift-check.json");
    assert!(installed.contains("onAfterTool"), "event not remapped: {installed}");
    assert!(installed.contains("write_file|replace"), "matcher not rewritten: {installed}");
    assert!(!installed.contains("PostToolUse"));

    let rediff = plan_for(&store, &adapter, &ctx).diff;
    assert!(rediff.changes_for(Category::Hook).unwrap().is_empty());
}

#[test]
fn drifted_artifacts_survive_sync_byte_identical() {
    let fix = full_canonical();
    let target = TargetFixture::new();
    let store = CanonicalStore::open(fix.root()).unwrap();
    let adapter = Adapter::resolve(Tool::Claude, target.base());
    let ctx = ctx();

    execute(&ctx, &store, &plan_for(&store, &adapter, &ctx), &Selection::default(), sync_opts())
        .unwrap();

    // Hand-edit the installed copy.
    let edited = "---\nname: documenting\ndescription: Keep docs in sync\n---\n\nMy local notes.\n";
    target.write("skills/documenting/SKILL.md", edited);

    let plan = plan_for(&store, &adapter, &ctx);
    let skills = plan.diff.changes_for(Category::Skill).unwrap();
    assert_eq!(skills.drifted, vec!["documenting".to_string()]);

    let outcome = execute(&ctx, &store, &plan, &Selection::default(), sync_opts()).unwrap();
    assert_eq!(
        outcome.preserved,
        vec!["skill/documenting".to_string()],
        "preserved drift must be reported by name"
    );
    assert_eq!(target.read("skills/documenting/SKILL.md"), edited);

    // Still drifted afterwards; never silently resolved.
    let rediff = plan_for(&store, &adapter, &ctx).diff;
    assert_eq!(
        rediff.changes_for(Category::Skill).unwrap().drifted,
        vec!["documenting".to_string()]
    );
}

#[test]
fn backport_accepts_drift_as_new_baseline() {
    let fix = full_canonical();
    let target = TargetFixture::new();
    let store = CanonicalStore::open(fix.root()).unwrap();
    let adapter = Adapter::resolve(Tool::Claude, target.base());
    let ctx = ctx();

    execute(&ctx, &store, &plan_for(&store, &adapter, &ctx), &Selection::default(), sync_opts())
        .unwrap();

    let edited = "---\nname: documenting\ndescription: Keep docs in sync\n---\n\nImproved by hand.\n";
    target.write("skills/documenting/SKILL.md", edited);

    let plan = plan_for(&store, &adapter, &ctx);
    let outcome = execute(
        &ctx,
        &store,
        &plan,
        &Selection::default(),
        ExecOptions {
            direction: Direction::Backport,
            dry_run: false,
            prune: false,
        },
    )
    .unwrap();
    assert_eq!(outcome.applied, 1);

    // The edit is now canonical truth...
    let canonical = std::fs::read_to_string(fix.root().join("skills/documenting/SKILL.md")).unwrap();
    assert_eq!(canonical, edited);

    // ...and the artifact is neither drifted nor outdated on the next run.
    let rediff = plan_for(&store, &adapter, &ctx).diff;
    let skills = rediff.changes_for(Category::Skill).unwrap();
    assert!(skills.drifted.is_empty());
    assert!(skills.outdated.is_empty());
}

#[test]
fn backport_normalizes_edited_toml_command() {
    let fix = CanonicalFixture::new();
    fix.add_command("review", "Review staged changes", "Look at the diff.");
    let target = TargetFixture::new();
    let store = CanonicalStore::open(fix.root()).unwrap();
    let adapter = Adapter::resolve(Tool::Gemini, target.base());
    let ctx = ctx();

    execute(&ctx, &store, &plan_for(&store, &adapter, &ctx), &Selection::default(), sync_opts())
        .unwrap();

    target.write(
        "commands/review.toml",
        "description = \"Review staged changes\"\nprompt = \"Look at the diff twice.\"\n",
    );

    let plan = plan_for(&store, &adapter, &ctx);
    assert_eq!(
        plan.diff.changes_for(Category::Command).unwrap().drifted,
        vec!["review".to_string()]
    );
    execute(
        &ctx,
        &store,
        &plan,
        &Selection::default(),
        ExecOptions {
            direction: Direction::Backport,
            dry_run: false,
            prune: false,
        },
    )
    .unwrap();

    let canonical = std::fs::read_to_string(fix.root().join("commands/review.md")).unwrap();
    assert!(canonical.contains("Look at the diff twice."));

    let rediff = plan_for(&store, &adapter, &ctx).diff;
    let commands = rediff.changes_for(Category::Command).unwrap();
    assert!(commands.drifted.is_empty() && commands.outdated.is_empty());
}

#[test]
fn unsupported_category_never_appears_in_any_bucket() {
    let fix = full_canonical();
    let target = TargetFixture::new();
    let store = CanonicalStore::open(fix.root()).unwrap();
    let mut adapter = Adapter::resolve(Tool::Claude, target.base());
    adapter.capabilities.commands = false;
    let ctx = ctx();

    let plan = plan_for(&store, &adapter, &ctx);
    assert!(plan.diff.changes_for(Category::Command).is_none());
    assert!(plan.diff.changes_for(Category::Skill).is_some());
}

#[test]
fn qwen_gets_no_hooks_and_alt_command_dir() {
    let fix = full_canonical();
    let target = TargetFixture::new();
    let store = CanonicalStore::open(fix.root()).unwrap();
    let adapter = Adapter::resolve(Tool::Qwen, target.base());
    let ctx = ctx();

    let plan = plan_for(&store, &adapter, &ctx);
    assert!(plan.diff.changes_for(Category::Hook).is_none());

    execute(&ctx, &store, &plan, &Selection::default(), sync_opts()).unwrap();
    assert!(target.exists("prompts/review.toml"));
    assert!(!target.exists("commands/review.toml"));
    assert!(!target.exists("hooks"));
}

#[test]
fn first_encounter_with_unknown_content_is_drift() {
    let fix = full_canonical();
    let target = TargetFixture::new();
    // Pre-existing local skill, never managed by this tool.
    target.write(
        "skills/documenting/SKILL.md",
        "---\nname: documenting\ndescription: Mine\n---\n\nHands off.\n",
    );
    let store = CanonicalStore::open(fix.root()).unwrap();
    let adapter = Adapter::resolve(Tool::Claude, target.base());
    let ctx = ctx();

    let plan = plan_for(&store, &adapter, &ctx);
    let skills = plan.diff.changes_for(Category::Skill).unwrap();
    assert_eq!(skills.drifted, vec!["documenting".to_string()]);
    assert!(skills.missing.is_empty() && skills.outdated.is_empty());
}

#[test]
fn canonical_change_after_sync_reads_as_outdated() {
    let fix = full_canonical();
    let target = TargetFixture::new();
    let store = CanonicalStore::open(fix.root()).unwrap();
    let adapter = Adapter::resolve(Tool::Claude, target.base());
    let ctx = ctx();

    execute(&ctx, &store, &plan_for(&store, &adapter, &ctx), &Selection::default(), sync_opts())
        .unwrap();

    // Canonical moves on; the target copy is untouched since our write.
    fix.add_skill("documenting", "Keep docs in sync", "Write the docs, v2.");

    let plan = plan_for(&store, &adapter, &ctx);
    let skills = plan.diff.changes_for(Category::Skill).unwrap();
    assert_eq!(skills.outdated, vec!["documenting".to_string()]);
    assert!(skills.drifted.is_empty());

    execute(&ctx, &store, &plan, &Selection::default(), sync_opts()).unwrap();
    assert!(target.read("skills/documenting/SKILL.md").contains("v2"));
    let rediff = plan_for(&store, &adapter, &ctx).diff;
    assert!(rediff.changes_for(Category::Skill).unwrap().is_empty());
}

#[test]
fn prune_removes_only_on_explicit_request() {
    let fix = full_canonical();
    let target = TargetFixture::new();
    let store = CanonicalStore::open(fix.root()).unwrap();
    let adapter = Adapter::resolve(Tool::Claude, target.base());
    let ctx = ctx();

    execute(&ctx, &store, &plan_for(&store, &adapter, &ctx), &Selection::default(), sync_opts())
        .unwrap();

    // Artifact leaves the canonical set.
    std::fs::remove_dir_all(fix.root().join("skills/documenting")).unwrap();

    let plan = plan_for(&store, &adapter, &ctx);
    assert!(plan
        .diff
        .prune
        .contains(&(Category::Skill, "documenting".to_string())));

    // Without --prune the installed copy stays.
    execute(&ctx, &store, &plan, &Selection::default(), sync_opts()).unwrap();
    assert!(target.exists("skills/documenting/SKILL.md"));

    // With prune requested it goes, baseline record included.
    let outcome = execute(
        &ctx,
        &store,
        &plan,
        &Selection::default(),
        ExecOptions {
            direction: Direction::Sync,
            dry_run: false,
            prune: true,
        },
    )
    .unwrap();
    assert_eq!(outcome.pruned, 1);
    assert!(!target.exists("skills/documenting"));
    let baselines = BaselineStore::load(target.base()).unwrap();
    assert_eq!(baselines.get("skill", "documenting"), None);
}

#[test]
fn mcp_merge_leaves_unrelated_keys_untouched() {
    let fix = full_canonical();
    let target = TargetFixture::new();
    target.write(
        "settings.json",
        r#"{"model": "opus", "mcpServers": {"local": {"command": "my-local"}}}"#,
    );
    let store = CanonicalStore::open(fix.root()).unwrap();
    let adapter = Adapter::resolve(Tool::Claude, target.base());
    let ctx = ctx();

    let plan = plan_for(&store, &adapter, &ctx);
    // "local" is installed but not canonical: a prune candidate, not a
    // change.
    assert!(plan
        .diff
        .prune
        .contains(&(Category::McpServer, "local".to_string())));

    execute(&ctx, &store, &plan, &Selection::default(), sync_opts()).unwrap();

    let settings = target.settings();
    assert_eq!(settings["model"], "opus");
    assert_eq!(settings["mcpServers"]["local"]["command"], "my-local");
    assert_eq!(settings["mcpServers"]["files"]["command"], "mcp-files");
}

#[test]
fn dry_run_counts_without_writing() {
    let fix = full_canonical();
    let target = TargetFixture::new();
    let store = CanonicalStore::open(fix.root()).unwrap();
    let adapter = Adapter::resolve(Tool::Claude, target.base());
    let ctx = ctx();

    let plan = plan_for(&store, &adapter, &ctx);
    let total = plan.diff.total();
    let outcome = execute(
        &ctx,
        &store,
        &plan,
        &Selection::default(),
        ExecOptions {
            direction: Direction::Sync,
            dry_run: true,
            prune: false,
        },
    )
    .unwrap();
    assert_eq!(outcome.applied, total);
    assert!(!target.exists("skills/documenting/SKILL.md"));
    assert!(!target.exists("settings.json"));

    // Nothing changed, so the next diff sees the same work.
    let rediff = plan_for(&store, &adapter, &ctx).diff;
    assert_eq!(rediff.total(), total);
}

#[test]
fn category_selection_limits_execution() {
    let fix = full_canonical();
    let target = TargetFixture::new();
    let store = CanonicalStore::open(fix.root()).unwrap();
    let adapter = Adapter::resolve(Tool::Claude, target.base());
    let ctx = ctx();

    let plan = plan_for(&store, &adapter, &ctx);
    let selection = Selection {
        categories: Some(BTreeSet::from([Category::Skill])),
        optional_servers: BTreeSet::new(),
    };
    execute(&ctx, &store, &plan, &selection, sync_opts()).unwrap();
    assert!(target.exists("skills/documenting/SKILL.md"));
    assert!(!target.exists("commands/review.md"));
    assert!(!target.exists("settings.json"));
}

#[tokio::test]
async fn optional_servers_are_offers_gated_on_secrets() {
    let fix = CanonicalFixture::new();
    fix.set_mcp_manifest(
        r#"{
            "core": {},
            "optional": {
                "search": {
                    "server": {"command": "mcp-search", "env": {"SEARCH_API_KEY": "${SEARCH_API_KEY}"}},
                    "requires": ["SEARCH_API_KEY"],
                    "install": "cargo install mcp-search",
                    "note": "restart the agent afterwards"
                }
            }
        }"#,
    );
    let target = TargetFixture::new();
    let store = CanonicalStore::open(fix.root()).unwrap();
    let ctx = ctx();

    let plans = build_plans(
        &ctx,
        &store,
        vec![TargetSpec {
            tool: Some(Tool::Claude),
            path: target.base().to_path_buf(),
        }],
    )
    .await
    .unwrap();
    assert!(plans.failures.is_empty());
    let plan = &plans.plans[0];

    // Not opted in: no change candidates at all.
    assert_eq!(plan.diff.total(), 0);
    let offer = &plan.optional_mcp[0];
    assert_eq!(offer.name, "search");
    assert_eq!(offer.missing_secrets, vec!["SEARCH_API_KEY".to_string()]);

    // Opting in without the secret is a named skip.
    let selection = Selection {
        categories: None,
        optional_servers: BTreeSet::from(["search".to_string()]),
    };
    let outcome = execute(&ctx, &store, plan, &selection, sync_opts()).unwrap();
    assert_eq!(outcome.applied, 0);
    assert_eq!(outcome.skipped.len(), 1);
    assert!(!target.exists("settings.json"));

    // With the secret present the server installs and the note surfaces.
    let env_path = fix.root().join("secrets.env");
    std::fs::write(&env_path, "SEARCH_API_KEY=abc\n").unwrap();
    let ctx = SyncContext::new(EnvFile::load(&env_path).unwrap());
    let outcome = execute(&ctx, &store, plan, &selection, sync_opts()).unwrap();
    assert_eq!(outcome.applied, 1);
    assert!(outcome.notes.iter().any(|n| n.contains("restart the agent")));
    assert_eq!(
        target.settings()["mcpServers"]["search"]["command"],
        "mcp-search"
    );
}

#[tokio::test]
async fn unknown_target_fails_alone() {
    let fix = full_canonical();
    let known = TargetFixture::new();
    let store = CanonicalStore::open(fix.root()).unwrap();
    let ctx = ctx();

    let plans = build_plans(
        &ctx,
        &store,
        vec![
            TargetSpec {
                tool: Some(Tool::Claude),
                path: known.base().to_path_buf(),
            },
            TargetSpec {
                // No explicit tool and nothing to detect from the path.
                tool: None,
                path: std::path::PathBuf::from("/nonexistent/mystery-agent"),
            },
        ],
    )
    .await
    .unwrap();

    assert_eq!(plans.plans.len(), 1);
    assert_eq!(plans.failures.len(), 1);
    assert!(plans.failures[0].error.is_target_fatal());
}

#[test]
fn cancellation_stops_between_artifacts() {
    let fix = full_canonical();
    let target = TargetFixture::new();
    let store = CanonicalStore::open(fix.root()).unwrap();
    let adapter = Adapter::resolve(Tool::Claude, target.base());
    let ctx = ctx();

    let plan = plan_for(&store, &adapter, &ctx);
    ctx.cancel();
    let outcome = execute(&ctx, &store, &plan, &Selection::default(), sync_opts()).unwrap();
    assert_eq!(outcome.applied, 0);
    assert!(outcome.notes.iter().any(|n| n.contains("interrupted")));

    // reset() re-arms the same context for a full run.
    ctx.reset();
    let outcome = execute(&ctx, &store, &plan, &Selection::default(), sync_opts()).unwrap();
    assert!(outcome.applied > 0);
}
