//! Prompt types for UniLink.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use unilink_core::Domain;

/// A prompt definition loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Creator identifier
    #[serde(rename = "createdBy", default)]
    pub created_by: String,

    /// Template string with Handlebars syntax
    pub template: String,

    /// Output specification
    pub output: PromptOutputSpec,
}

/// Output specification for the prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptOutputSpec {
    /// Expected model output format (e.g., "json", "text")
    pub format: String,
}

/// Where an effective prompt definition came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptSource {
    BuiltIn,
    File(PathBuf),
}

impl fmt::Display for PromptSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BuiltIn => f.write_str("built-in"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// The full text handed to the answer model for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundingPrompt {
    text: String,
    domain: Domain,
    evidence_count: usize,
}

impl GroundingPrompt {
    pub(crate) fn new(text: String, domain: Domain, evidence_count: usize) -> Self {
        Self {
            text,
            domain,
            evidence_count,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn evidence_count(&self) -> usize {
        self.evidence_count
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_definition_deserialization() {
        let yaml = r#"
id: chat.answer
title: Test Prompt
apiVersion: "1.0"
output:
  format: text
template: "{{question}}"
"#;

        let def: PromptDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(def.id, "chat.answer");
        assert_eq!(def.created_by, "");
        assert_eq!(def.output.format, "text");
    }

    #[test]
    fn test_prompt_source_display() {
        assert_eq!(PromptSource::BuiltIn.to_string(), "built-in");
        assert_eq!(
            PromptSource::File(PathBuf::from("prompts/chat.answer.yaml")).to_string(),
            "prompts/chat.answer.yaml"
        );
    }
}
