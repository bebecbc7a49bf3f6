//! Shared test fixtures for concord crates.
//!
//! Builders for a canonical store directory and target installation trees,
//! backed by tempdirs that clean themselves up on drop.

use std::fs;
use std::path::{Path, PathBuf};

/// A canonical store rooted in a tempdir.
pub struct CanonicalFixture {
    pub tempdir: tempfile::TempDir,
}

impl CanonicalFixture {
    pub fn new() -> Self {
        Self {
            tempdir: tempfile::TempDir::new().expect("tempdir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.tempdir.path()
    }

    fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.root().join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, content).expect("write fixture file");
        path
    }

    /// Adds `skills/<name>/SKILL.md` with a well-formed metadata header.
    pub fn add_skill(&self, name: &str, description: &str, body: &str) -> PathBuf {
        self.write(
            &format!("skills/{name}/SKILL.md"),
            &format!("---\nname: {name}\ndescription: {description}\n---\n\n{body}\n"),
        )
    }

    /// Adds `commands/<name>.md` with a well-formed metadata header.
    pub fn add_command(&self, name: &str, description: &str, body: &str) -> PathBuf {
        self.write(
            &format!("commands/{name}.md"),
            &format!("---\nname: {name}\ndescription: {description}\n---\n\n{body}\n"),
        )
    }

    /// Adds `hooks/<name>.json` from raw JSON.
    pub fn add_hook(&self, name: &str, json: &str) -> PathBuf {
        self.write(&format!("hooks/{name}.json"), json)
    }

    pub fn set_mcp_manifest(&self, json: &str) -> PathBuf {
        self.write("mcp-servers.json", json)
    }

    pub fn set_context(&self, content: &str) -> PathBuf {
        self.write("CONTEXT.md", content)
    }
}

impl Default for CanonicalFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A target installation base directory rooted in a tempdir.
pub struct TargetFixture {
    pub tempdir: tempfile::TempDir,
}

impl TargetFixture {
    pub fn new() -> Self {
        Self {
            tempdir: tempfile::TempDir::new().expect("tempdir"),
        }
    }

    pub fn base(&self) -> &Path {
        self.tempdir.path()
    }

    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.base().join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, content).expect("write fixture file");
        path
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.base().join(rel)).expect("read fixture file")
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.base().join(rel).exists()
    }

    /// Parses `settings.json` at the target base.
    pub fn settings(&self) -> serde_json::Value {
        serde_json::from_str(&self.read("settings.json")).expect("parse settings")
    }
}

impl Default for TargetFixture {
    fn default() -> Self {
        Self::new()
    }
}
