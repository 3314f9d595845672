//! Generation capability for UniLink.
//!
//! This crate hides the text-generation provider behind the [`LlmClient`]
//! trait. The chat pipeline uses two operation shapes only: a single-shot
//! completion (for classification) and a chunked stream (for the answer).
//!
//! # Providers
//! - **Ollama**: Local LLM runtime (default)
//! - **Gemini**: Google Generative Language API
//! - **Scripted**: In-process replay of canned output, for tests and embedding
//!
//! # Example
//! ```no_run
//! use unilink_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("Hello, world!", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
pub use factory::create_client;
pub use providers::{GeminiClient, OllamaClient, ScriptedClient, ScriptedStep};
pub use types::ProviderType;
