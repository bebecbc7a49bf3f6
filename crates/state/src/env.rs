//! Environment helpers: home directory resolution and the optional
//! secrets file.

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Returns the user's home directory, preferring `$HOME` so tests and
/// sandboxes can redirect it.
pub fn home_dir() -> Result<PathBuf> {
    #[cfg(unix)]
    if let Ok(home) = std::env::var("HOME") {
        return Ok(PathBuf::from(home));
    }
    dirs::home_dir().ok_or_else(|| anyhow::anyhow!("home directory not found"))
}

/// `KEY=VALUE` variables from an optional secrets file.
///
/// Some optional MCP servers need API keys; whether those keys are present
/// here decides only whether such a server can be installed. An absent
/// file is an empty set, not an error.
#[derive(Debug, Clone, Default)]
pub struct EnvFile {
    vars: BTreeMap<String, String>,
}

impl EnvFile {
    /// Loads variables from `path`. Blank lines and `#` comments are
    /// ignored; lines without `=` are skipped.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let mut vars = BTreeMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((k, v)) = line.split_once('=') {
                vars.insert(k.trim().to_string(), v.trim().trim_matches('"').to_string());
            }
        }
        Ok(Self { vars })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Names from `keys` that are not defined (or defined empty).
    pub fn missing<'a>(&self, keys: &'a [String]) -> Vec<&'a str> {
        keys.iter()
            .filter(|k| self.get(k).map_or(true, str::is_empty))
            .map(String::as_str)
            .collect()
    }
}
