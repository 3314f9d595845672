//! Prompt rendering and grounding prompt assembly.

use crate::loader::PromptSet;
use crate::types::GroundingPrompt;
use handlebars::Handlebars;
use serde::Serialize;
use unilink_core::{AppError, AppResult, EvidenceSet, Question};

/// Rendered in place of the evidence list when the search found nothing.
pub const NO_EVIDENCE_MARKER: &str = "[] (NO MATCHING RECORDS FOUND)";

const CLASSIFY_TEMPLATE: &str = "classify";
const ANSWER_TEMPLATE: &str = "answer";

#[derive(Serialize)]
struct ClassifyVars<'a> {
    question: &'a str,
}

#[derive(Serialize)]
struct AnswerVars<'a> {
    knowledge: &'a str,
    domain: &'a str,
    evidence: &'a str,
    evidence_found: bool,
    question: &'a str,
}

/// Renders the chat prompts.
///
/// Templates are compiled once; the renderer is immutable afterwards and
/// safe to share across concurrent requests.
pub struct PromptRenderer {
    registry: Handlebars<'static>,
}

impl PromptRenderer {
    /// Compile both chat templates.
    pub fn new(prompts: &PromptSet) -> AppResult<Self> {
        let mut registry = Handlebars::new();

        // Prompts are plain text, not HTML
        registry.register_escape_fn(handlebars::no_escape);

        registry
            .register_template_string(CLASSIFY_TEMPLATE, &prompts.classify.template)
            .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;
        registry
            .register_template_string(ANSWER_TEMPLATE, &prompts.answer.template)
            .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

        Ok(Self { registry })
    }

    /// Renderer over the compiled-in prompts.
    pub fn built_in() -> AppResult<Self> {
        Self::new(&PromptSet::built_in()?)
    }

    /// Render the classifier instruction for one question.
    pub fn classification_prompt(&self, question: &Question) -> AppResult<String> {
        self.render(
            CLASSIFY_TEMPLATE,
            &ClassifyVars {
                question: question.as_str(),
            },
        )
    }

    /// Assemble the grounding prompt: knowledge, evidence, then the question.
    ///
    /// Output depends only on the inputs, so equal inputs give byte-identical
    /// prompts.
    pub fn assemble(
        &self,
        question: &Question,
        knowledge: &str,
        evidence: &EvidenceSet,
    ) -> AppResult<GroundingPrompt> {
        let evidence_text = render_evidence(evidence)?;

        let text = self.render(
            ANSWER_TEMPLATE,
            &AnswerVars {
                knowledge: knowledge.trim_end(),
                domain: evidence.domain().collection(),
                evidence: &evidence_text,
                evidence_found: !evidence.is_empty(),
                question: question.as_str(),
            },
        )?;

        tracing::debug!(
            domain = %evidence.domain(),
            evidence = evidence.len(),
            bytes = text.len(),
            "Assembled grounding prompt"
        );

        Ok(GroundingPrompt::new(text, evidence.domain(), evidence.len()))
    }

    fn render<T: Serialize>(&self, name: &str, vars: &T) -> AppResult<String> {
        self.registry
            .render(name, vars)
            .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
    }
}

/// Serialize the evidence section.
///
/// An empty set renders as [`NO_EVIDENCE_MARKER`], never as nothing.
pub fn render_evidence(evidence: &EvidenceSet) -> AppResult<String> {
    if evidence.is_empty() {
        return Ok(NO_EVIDENCE_MARKER.to_string());
    }
    Ok(serde_json::to_string_pretty(evidence.items())?)
}
