//! Question classification.
//!
//! The classifier asks the model for a single JSON object naming a
//! collection and keywords. Model output is free-form text, so the reply is
//! scanned for the first well-formed object and anything else collapses to
//! the General fallback. Errors never leave this module.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use unilink_core::{AppError, AppResult, ClassificationResult, Domain, Question};
use unilink_llm::{LlmClient, LlmRequest};
use unilink_prompt::PromptRenderer;

/// Default bound on the classification call.
pub const DEFAULT_CLASSIFIER_TIMEOUT: Duration = Duration::from_secs(5);

/// The reply is one small JSON object.
const CLASSIFIER_MAX_TOKENS: u32 = 128;

/// Routes questions to a data domain.
#[derive(Clone)]
pub struct QueryClassifier {
    client: Arc<dyn LlmClient>,
    renderer: Arc<PromptRenderer>,
    model: String,
    timeout: Duration,
}

impl QueryClassifier {
    pub fn new(
        client: Arc<dyn LlmClient>,
        renderer: Arc<PromptRenderer>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            renderer,
            model: model.into(),
            timeout: DEFAULT_CLASSIFIER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Classify a question. Always returns a result.
    pub async fn classify(&self, question: &Question) -> ClassificationResult {
        match self.try_classify(question).await {
            Ok(result) => {
                tracing::info!(
                    domain = %result.domain,
                    keywords = ?result.keywords,
                    "Classified question"
                );
                result
            }
            Err(e) => {
                tracing::warn!("Classification failed, falling back to General: {}", e);
                ClassificationResult::general()
            }
        }
    }

    async fn try_classify(&self, question: &Question) -> AppResult<ClassificationResult> {
        let prompt = self.renderer.classification_prompt(question)?;
        let request = LlmRequest::new(prompt, &self.model)
            .with_temperature(0.0)
            .with_max_tokens(CLASSIFIER_MAX_TOKENS);

        let response = tokio::time::timeout(self.timeout, self.client.complete(&request))
            .await
            .map_err(|_| {
                AppError::Llm(format!(
                    "Classifier timed out after {}ms",
                    self.timeout.as_millis()
                ))
            })??;

        tracing::debug!("Classifier raw output: {}", response.content);
        parse_classification(&response.content)
    }
}

/// Extract a classification from raw model output.
pub fn parse_classification(raw: &str) -> AppResult<ClassificationResult> {
    let payload = first_json_object(raw).ok_or_else(|| {
        AppError::Serialization("No JSON object in classifier output".to_string())
    })?;

    let domain_name = payload
        .get("collection")
        .or_else(|| payload.get("domain"))
        .and_then(Value::as_str)
        .ok_or_else(|| {
            AppError::Serialization("Classifier output names no collection".to_string())
        })?;

    let domain = Domain::parse(domain_name).unwrap_or_else(|| {
        tracing::debug!("Unknown collection {:?}, using General", domain_name);
        Domain::General
    });

    let keywords = match payload.get("keywords") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(s)) => split_terms(s),
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(Value::as_str)
            .flat_map(split_terms)
            .collect(),
        Some(other) => {
            return Err(AppError::Serialization(format!(
                "Unexpected keywords value: {}",
                other
            )))
        }
    };

    Ok(ClassificationResult::new(domain, keywords))
}

fn split_terms(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_string).collect()
}

/// The first `{...}` in `raw` that parses as a JSON object.
fn first_json_object(raw: &str) -> Option<serde_json::Map<String, Value>> {
    raw.match_indices('{').find_map(|(start, _)| {
        let mut values = serde_json::Deserializer::from_str(&raw[start..]).into_iter::<Value>();
        match values.next() {
            Some(Ok(Value::Object(map))) => Some(map),
            _ => None,
        }
    })
}
