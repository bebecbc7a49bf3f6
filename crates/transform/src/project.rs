//! Projection of skill documents into target-native command descriptors.
//!
//! A canonical command artifact is a markdown document with a YAML
//! frontmatter header carrying `name` and `description`. Targets that run
//! commands as markdown prompts get a narrative document; targets with
//! structured command config get a TOML descriptor with `description` and
//! `prompt` fields. Missing required metadata makes the artifact
//! unrepresentable for the target, which is a skip, not a fault.

use concord_adapters::CommandFormat;
use serde::{Deserialize, Serialize};

/// Required metadata from a skill document's frontmatter header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillMeta {
    pub name: String,
    pub description: String,
}

/// The artifact cannot be projected onto this target. Callers treat this
/// as "does not apply here", never as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unrepresentable {
    pub reason: String,
}

impl Unrepresentable {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A projected command: file name (with native extension) plus content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeCommand {
    pub file_name: String,
    pub content: String,
}

#[derive(Serialize, Deserialize)]
struct TomlCommand {
    description: String,
    prompt: String,
}

/// Splits a document into its frontmatter block and body. Returns `None`
/// when there is no frontmatter fence.
fn split_frontmatter(doc: &str) -> Option<(&str, &str)> {
    let rest = doc.strip_prefix("---\n")?;
    let end = rest.find("\n---")?;
    let header = &rest[..end];
    let body = rest[end + 4..].trim_start_matches('\n');
    Some((header, body))
}

/// Parses the `name` + `description` header of a skill document. `None`
/// when the fence or either required field is missing or malformed.
pub fn skill_meta(doc: &str) -> Option<SkillMeta> {
    let (header, _) = split_frontmatter(doc)?;
    let meta: SkillMeta = serde_yaml::from_str(header).ok()?;
    if meta.name.trim().is_empty() || meta.description.trim().is_empty() {
        return None;
    }
    Some(meta)
}

/// Projects a canonical command document into the target's native command
/// descriptor.
pub fn command_from_skill(
    doc: &str,
    format: CommandFormat,
) -> Result<NativeCommand, Unrepresentable> {
    let Some(meta) = skill_meta(doc) else {
        return Err(Unrepresentable::new(
            "missing name/description metadata header",
        ));
    };
    let body = split_frontmatter(doc).map(|(_, b)| b).unwrap_or(doc);

    match format {
        CommandFormat::Markdown => {
            let mut content = String::new();
            content.push_str(&format!("# {}\n\n{}\n\n## Usage\n\n", meta.name, meta.description));
            content.push_str(body.trim_end());
            content.push('\n');
            Ok(NativeCommand {
                file_name: format!("{}.md", meta.name),
                content,
            })
        }
        CommandFormat::Toml => {
            let descriptor = TomlCommand {
                description: meta.description.clone(),
                prompt: body.trim_end().to_string(),
            };
            let content = toml::to_string(&descriptor)
                .map_err(|e| Unrepresentable::new(format!("descriptor serialization: {e}")))?;
            Ok(NativeCommand {
                file_name: format!("{}.toml", meta.name),
                content,
            })
        }
    }
}

/// Inverse projection for backport: reconstructs a canonical skill document
/// from a native command descriptor.
pub fn command_to_skill(
    name: &str,
    content: &str,
    format: CommandFormat,
) -> Result<String, Unrepresentable> {
    let (description, body) = match format {
        CommandFormat::Toml => {
            let descriptor: TomlCommand = toml::from_str(content)
                .map_err(|e| Unrepresentable::new(format!("descriptor parse: {e}")))?;
            (descriptor.description, descriptor.prompt)
        }
        CommandFormat::Markdown => parse_narrative(content)
            .ok_or_else(|| Unrepresentable::new("unrecognized narrative command layout"))?,
    };

    // Serialize the header so descriptions with YAML-significant
    // characters stay parseable.
    let header = serde_yaml::to_string(&SkillMeta {
        name: name.to_string(),
        description,
    })
    .map_err(|e| Unrepresentable::new(format!("header serialization: {e}")))?;
    Ok(format!("---\n{header}---\n\n{}\n", body.trim_end()))
}

/// Pulls `(description, body)` out of a narrative command document of the
/// shape produced by [`command_from_skill`].
fn parse_narrative(content: &str) -> Option<(String, String)> {
    let after_title = content.strip_prefix("# ")?;
    let (_, rest) = after_title.split_once('\n')?;
    let (description, usage) = rest.split_once("## Usage")?;
    Some((
        description.trim().to_string(),
        usage.trim_start_matches('\n').trim_end().to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "---\nname: review\ndescription: Review staged changes\n---\n\nLook at the diff and comment.\n";

    #[test]
    fn meta_parses_from_frontmatter() {
        let meta = skill_meta(DOC).unwrap();
        assert_eq!(meta.name, "review");
        assert_eq!(meta.description, "Review staged changes");
    }

    #[test]
    fn meta_missing_fence_is_none() {
        assert!(skill_meta("# just a doc\n").is_none());
    }

    #[test]
    fn meta_missing_description_is_none() {
        assert!(skill_meta("---\nname: review\n---\nbody\n").is_none());
    }

    #[test]
    fn markdown_projection_builds_narrative_doc() {
        let cmd = command_from_skill(DOC, CommandFormat::Markdown).unwrap();
        assert_eq!(cmd.file_name, "review.md");
        assert!(cmd.content.starts_with("# review\n\nReview staged changes\n\n## Usage\n"));
        assert!(cmd.content.contains("Look at the diff and comment."));
    }

    #[test]
    fn toml_projection_builds_descriptor() {
        let cmd = command_from_skill(DOC, CommandFormat::Toml).unwrap();
        assert_eq!(cmd.file_name, "review.toml");
        let parsed: toml::Value = toml::from_str(&cmd.content).unwrap();
        assert_eq!(
            parsed["description"].as_str(),
            Some("Review staged changes")
        );
        assert_eq!(
            parsed["prompt"].as_str(),
            Some("Look at the diff and comment.")
        );
    }

    #[test]
    fn missing_metadata_is_unrepresentable_not_panic() {
        let err = command_from_skill("no header at all", CommandFormat::Toml).unwrap_err();
        assert!(err.reason.contains("metadata"));
    }

    #[test]
    fn toml_round_trips_to_skill_doc() {
        let cmd = command_from_skill(DOC, CommandFormat::Toml).unwrap();
        let doc = command_to_skill("review", &cmd.content, CommandFormat::Toml).unwrap();
        assert_eq!(doc, DOC);
    }

    #[test]
    fn narrative_round_trips_to_skill_doc() {
        let cmd = command_from_skill(DOC, CommandFormat::Markdown).unwrap();
        let doc = command_to_skill("review", &cmd.content, CommandFormat::Markdown).unwrap();
        assert_eq!(doc, DOC);
    }
}
