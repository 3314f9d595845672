//! Prompt system for UniLink.
//!
//! This crate provides:
//! - YAML prompt definitions (built-in, overridable from a directory)
//! - Handlebars template rendering
//! - The classification prompt and the grounding prompt assembler

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::{render_evidence, PromptRenderer, NO_EVIDENCE_MARKER};
pub use loader::{list_prompts, load_prompt, PromptSet, ANSWER_PROMPT_ID, CLASSIFY_PROMPT_ID};
pub use types::{GroundingPrompt, PromptDefinition, PromptOutputSpec, PromptSource};
