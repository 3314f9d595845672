//! Prompt loader.
//!
//! The chat prompts ship compiled into the binary. A prompts directory may
//! override any of them with a `<id>.yaml` (or `.yml`) file.

use crate::types::{PromptDefinition, PromptSource};
use std::path::{Path, PathBuf};
use unilink_core::{AppError, AppResult};

pub const CLASSIFY_PROMPT_ID: &str = "chat.classify";
pub const ANSWER_PROMPT_ID: &str = "chat.answer";

const BUILT_IN: [(&str, &str); 2] = [
    (
        CLASSIFY_PROMPT_ID,
        include_str!("../prompts/chat.classify.yaml"),
    ),
    (ANSWER_PROMPT_ID, include_str!("../prompts/chat.answer.yaml")),
];

/// Template variables each chat prompt must reference.
fn required_variables(prompt_id: &str) -> &'static [&'static str] {
    match prompt_id {
        CLASSIFY_PROMPT_ID => &["question"],
        ANSWER_PROMPT_ID => &["knowledge", "evidence", "question"],
        _ => &[],
    }
}

/// The two prompts the chat pipeline needs.
#[derive(Debug, Clone)]
pub struct PromptSet {
    pub classify: PromptDefinition,
    pub answer: PromptDefinition,
}

impl PromptSet {
    /// Load both chat prompts, honoring overrides in `overrides_dir`.
    pub fn load(overrides_dir: Option<&Path>) -> AppResult<Self> {
        Ok(Self {
            classify: load_prompt(overrides_dir, CLASSIFY_PROMPT_ID)?,
            answer: load_prompt(overrides_dir, ANSWER_PROMPT_ID)?,
        })
    }

    /// The compiled-in prompts.
    pub fn built_in() -> AppResult<Self> {
        Self::load(None)
    }
}

/// Load a prompt definition by ID.
///
/// An override file in `overrides_dir` wins over the built-in definition.
///
/// # Example
/// ```no_run
/// use unilink_prompt::load_prompt;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(None, "chat.answer")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(overrides_dir: Option<&Path>, prompt_id: &str) -> AppResult<PromptDefinition> {
    let (contents, source) = match overrides_dir.and_then(|dir| find_override(dir, prompt_id)) {
        Some(path) => {
            let contents = std::fs::read_to_string(&path).map_err(|e| {
                AppError::Prompt(format!("Failed to read prompt file {:?}: {}", path, e))
            })?;
            (contents, PromptSource::File(path))
        }
        None => {
            let contents = built_in(prompt_id)
                .ok_or_else(|| AppError::Prompt(format!("Unknown prompt: {}", prompt_id)))?;
            (contents.to_string(), PromptSource::BuiltIn)
        }
    };

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!("Failed to parse prompt {} ({}): {}", prompt_id, source, e))
    })?;

    if definition.id != prompt_id {
        return Err(AppError::Prompt(format!(
            "Prompt file for {} declares id {}",
            prompt_id, definition.id
        )));
    }

    validate_prompt(&definition)?;

    tracing::debug!("Loaded prompt: {} ({}) from {}", definition.id, definition.title, source);

    Ok(definition)
}

/// List every effective prompt ID with its source.
pub fn list_prompts(overrides_dir: Option<&Path>) -> AppResult<Vec<(String, PromptSource)>> {
    let mut prompts: Vec<(String, PromptSource)> = BUILT_IN
        .iter()
        .map(|(id, _)| (id.to_string(), PromptSource::BuiltIn))
        .collect();

    let Some(dir) = overrides_dir.filter(|d| d.exists()) else {
        return Ok(prompts);
    };

    for entry in walkdir::WalkDir::new(dir)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        let is_yaml = matches!(
            path.extension().and_then(|s| s.to_str()),
            Some("yaml") | Some("yml")
        );
        if !path.is_file() || !is_yaml {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        let source = PromptSource::File(path.to_path_buf());
        match prompts.iter_mut().find(|(id, _)| id == stem) {
            Some(existing) => existing.1 = source,
            None => prompts.push((stem.to_string(), source)),
        }
    }

    Ok(prompts)
}

fn built_in(prompt_id: &str) -> Option<&'static str> {
    BUILT_IN
        .iter()
        .find(|(id, _)| *id == prompt_id)
        .map(|(_, contents)| *contents)
}

fn find_override(dir: &Path, prompt_id: &str) -> Option<PathBuf> {
    ["yaml", "yml"]
        .iter()
        .map(|ext| dir.join(format!("{}.{}", prompt_id, ext)))
        .find(|path| path.is_file())
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    for variable in required_variables(&def.id) {
        if !def.template.contains(&format!("{{{{{}}}}}", variable)) {
            return Err(AppError::Prompt(format!(
                "Prompt {} must reference {{{{{}}}}}",
                def.id, variable
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_prompt(dir: &Path, file: &str, id: &str, template: &str) {
        let content = format!(
            "id: {}\ntitle: \"Override\"\napiVersion: \"1.1\"\noutput:\n  format: text\ntemplate: \"{}\"\n",
            id, template
        );
        fs::write(dir.join(file), content).unwrap();
    }

    #[test]
    fn test_built_ins_are_valid() {
        let set = PromptSet::built_in().unwrap();
        assert_eq!(set.classify.id, CLASSIFY_PROMPT_ID);
        assert_eq!(set.answer.id, ANSWER_PROMPT_ID);
        assert!(set.classify.template.contains("\"General\""));
    }

    #[test]
    fn test_override_wins() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(
            temp_dir.path(),
            "chat.classify.yml",
            "chat.classify",
            "Classify: {{question}}",
        );

        let def = load_prompt(Some(temp_dir.path()), CLASSIFY_PROMPT_ID).unwrap();
        assert_eq!(def.title, "Override");
        assert_eq!(def.template, "Classify: {{question}}");

        // The other prompt still comes from the binary
        let answer = load_prompt(Some(temp_dir.path()), ANSWER_PROMPT_ID).unwrap();
        assert_eq!(answer.title, "Grounded chat answer");
    }

    #[test]
    fn test_override_must_keep_evidence_section() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(
            temp_dir.path(),
            "chat.answer.yaml",
            "chat.answer",
            "{{knowledge}} {{question}}",
        );

        let result = load_prompt(Some(temp_dir.path()), ANSWER_PROMPT_ID);
        assert!(matches!(result, Err(AppError::Prompt(msg)) if msg.contains("evidence")));
    }

    #[test]
    fn test_override_id_mismatch() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(
            temp_dir.path(),
            "chat.classify.yaml",
            "something.else",
            "{{question}}",
        );

        assert!(load_prompt(Some(temp_dir.path()), CLASSIFY_PROMPT_ID).is_err());
    }

    #[test]
    fn test_invalid_yaml_override() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("chat.answer.yaml"), "invalid: yaml: content:").unwrap();
        assert!(load_prompt(Some(temp_dir.path()), ANSWER_PROMPT_ID).is_err());
    }

    #[test]
    fn test_unknown_prompt() {
        assert!(load_prompt(None, "nonexistent").is_err());
    }

    #[test]
    fn test_list_prompts() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(temp_dir.path(), "chat.answer.yaml", "chat.answer", "x");
        write_prompt(temp_dir.path(), "extra.yml", "extra", "y");
        fs::write(temp_dir.path().join("notes.txt"), "ignored").unwrap();

        let prompts = list_prompts(Some(temp_dir.path())).unwrap();
        assert_eq!(prompts.len(), 3);
        assert_eq!(prompts[0], (CLASSIFY_PROMPT_ID.to_string(), PromptSource::BuiltIn));
        assert!(matches!(&prompts[1].1, PromptSource::File(p) if p.ends_with("chat.answer.yaml")));
        assert_eq!(prompts[2].0, "extra");
    }
}
