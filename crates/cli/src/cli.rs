//! Command-line surface for `concord`.

use clap::{Parser, Subcommand, ValueEnum};
use concord_engine::Category;
use std::path::PathBuf;

/// Reconciles skills, hooks, slash-commands, and MCP servers between one
/// canonical repository and every installed assistant tool.
#[derive(Debug, Parser)]
#[command(
    name = "concord",
    about = "Keeps installed agent tools in step with a canonical config repo"
)]
pub struct Cli {
    /// Path to the target manifest (default: ./concord.toml, then
    /// ~/.config/concord/concord.toml).
    #[arg(long, global = true, value_name = "PATH")]
    pub manifest: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Read-only report of what differs at every target.
    Status {
        /// Show unified diffs for drifted artifacts.
        #[arg(long)]
        diff: bool,
    },
    /// Apply canonical changes to the targets (or back, with --backport).
    Sync {
        /// Perform every step except the final writes.
        #[arg(long)]
        dry_run: bool,
        /// Skip the confirmation prompt.
        #[arg(long, short = 'y')]
        yes: bool,
        /// Also delete installed artifacts that left the canonical set.
        #[arg(long)]
        prune: bool,
        /// Reverse direction: accept drifted target edits into the
        /// canonical store.
        #[arg(long)]
        backport: bool,
        /// Opt into an optional MCP server by name (repeatable).
        #[arg(long = "optional", value_name = "NAME")]
        optional: Vec<String>,
        /// Restrict to one or more categories (repeatable).
        #[arg(long = "category", value_enum, value_name = "CATEGORY")]
        category: Vec<CategoryArg>,
    },
}

/// Category names as spelled on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CategoryArg {
    Skills,
    Hooks,
    Commands,
    Mcp,
    Config,
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Skills => Category::Skill,
            CategoryArg::Hooks => Category::Hook,
            CategoryArg::Commands => Category::Command,
            CategoryArg::Mcp => Category::McpServer,
            CategoryArg::Config => Category::Config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sync_flags() {
        let cli = Cli::try_parse_from([
            "concord", "sync", "--dry-run", "--prune", "--optional", "search", "--category",
            "hooks",
        ])
        .unwrap();
        let Commands::Sync {
            dry_run,
            prune,
            backport,
            optional,
            category,
            ..
        } = cli.command
        else {
            panic!("expected sync");
        };
        assert!(dry_run && prune && !backport);
        assert_eq!(optional, vec!["search".to_string()]);
        assert_eq!(Category::from(category[0]), Category::Hook);
    }

    #[test]
    fn parses_status_with_diff() {
        let cli = Cli::try_parse_from(["concord", "status", "--diff"]).unwrap();
        assert!(matches!(cli.command, Commands::Status { diff: true }));
    }

    #[test]
    fn manifest_flag_is_global() {
        let cli =
            Cli::try_parse_from(["concord", "status", "--manifest", "/tmp/concord.toml"]).unwrap();
        assert_eq!(cli.manifest.as_deref(), Some(std::path::Path::new("/tmp/concord.toml")));
    }
}
