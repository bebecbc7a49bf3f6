//! The target manifest: which canonical store to reconcile against which
//! installed tools.

use anyhow::{Context, Result};
use concord_state::home_dir;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const MANIFEST_NAME: &str = "concord.toml";

/// One configured target. `tool` may be omitted when the path follows a
/// recognizable naming convention.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetEntry {
    pub path: PathBuf,
    #[serde(default)]
    pub tool: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Manifest {
    /// Canonical store root.
    pub canonical: PathBuf,
    /// Optional KEY=VALUE secrets file gating optional MCP servers.
    #[serde(default)]
    pub env_file: Option<PathBuf>,
    #[serde(default)]
    pub targets: Vec<TargetEntry>,
}

impl Manifest {
    /// Loads the manifest from `explicit`, falling back to `./concord.toml`
    /// and then `~/.config/concord/concord.toml`.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, PathBuf)> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let local = PathBuf::from(MANIFEST_NAME);
                if local.exists() {
                    local
                } else {
                    home_dir()?.join(".config/concord").join(MANIFEST_NAME)
                }
            }
        };
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading manifest {}", path.display()))?;
        let manifest: Manifest = toml::from_str(&text)
            .with_context(|| format!("parsing manifest {}", path.display()))?;
        Ok((manifest, path))
    }
}

/// Expands a leading `~/` against the home directory.
pub fn expand(path: &Path) -> PathBuf {
    let Ok(text) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match home_dir() {
        Ok(home) => home.join(text),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parses_manifest_with_targets() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("concord.toml");
        std::fs::write(
            &path,
            r#"
canonical = "~/agent-canon"
env-file = "~/.agent-canon.env"

[[targets]]
path = "~/.claude"

[[targets]]
path = "~/.qwen"
tool = "qwen"
"#,
        )
        .unwrap();

        let (manifest, _) = Manifest::load(Some(&path)).unwrap();
        assert_eq!(manifest.canonical, PathBuf::from("~/agent-canon"));
        assert!(manifest.env_file.is_some());
        assert_eq!(manifest.targets.len(), 2);
        assert_eq!(manifest.targets[1].tool.as_deref(), Some("qwen"));
    }

    #[test]
    fn missing_manifest_is_an_error() {
        let tmp = tempdir().unwrap();
        assert!(Manifest::load(Some(&tmp.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn expand_home_prefix() {
        std::env::set_var("HOME", "/home/test");
        assert_eq!(
            expand(Path::new("~/agent-canon")),
            PathBuf::from("/home/test/agent-canon")
        );
        assert_eq!(expand(Path::new("/abs/path")), PathBuf::from("/abs/path"));
    }
}
