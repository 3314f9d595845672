//! Chat pipeline: classify, retrieve, assemble, stream.
//!
//! Stages run strictly in sequence for one request. Everything shared
//! between requests is immutable.

use crate::responder::{open_answer, AnswerStream};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use unilink_core::{AppConfig, AppError, AppResult, Question};
use unilink_llm::{create_client, LlmClient, LlmRequest};
use unilink_prompt::{GroundingPrompt, PromptRenderer, PromptSet};
use unilink_retrieval::{DocumentStore, QueryClassifier, Retriever, SqliteStore};

/// Per-deployment pipeline settings.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub model: String,
    pub classifier_model: String,
    pub evidence_limit: usize,
    pub classifier_timeout: Duration,
    pub stream_idle_timeout: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            classifier_model: config.classifier_model().to_string(),
            evidence_limit: config.evidence_limit,
            classifier_timeout: Duration::from_secs(config.classifier_timeout_secs),
            stream_idle_timeout: Duration::from_secs(config.stream_idle_timeout_secs),
        }
    }
}

/// Coordinates one chat request end to end.
pub struct ChatPipeline {
    client: Arc<dyn LlmClient>,
    classifier: QueryClassifier,
    retriever: Retriever,
    renderer: Arc<PromptRenderer>,
    knowledge: Arc<str>,
    model: String,
    stream_idle_timeout: Duration,
}

impl ChatPipeline {
    pub fn new(
        client: Arc<dyn LlmClient>,
        store: Arc<dyn DocumentStore>,
        renderer: Arc<PromptRenderer>,
        knowledge: impl Into<Arc<str>>,
        settings: PipelineSettings,
    ) -> Self {
        let classifier = QueryClassifier::new(
            Arc::clone(&client),
            Arc::clone(&renderer),
            settings.classifier_model,
        )
        .with_timeout(settings.classifier_timeout);

        Self {
            client,
            classifier,
            retriever: Retriever::new(store).with_limit(settings.evidence_limit),
            renderer,
            knowledge: knowledge.into(),
            model: settings.model,
            stream_idle_timeout: settings.stream_idle_timeout,
        }
    }

    /// Build the pipeline described by `config`.
    ///
    /// Loads the knowledge text, opens the store and compiles the prompts
    /// once; the result is shared by every request.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let knowledge = load_knowledge(&config.knowledge_path)?;

        let store = SqliteStore::open(&config.store_path)?;

        let prompts = PromptSet::load(config.prompts_dir.as_deref())?;
        let renderer = PromptRenderer::new(&prompts)?;

        let api_key = config.resolve_api_key(&config.provider);
        let timeout = config
            .get_provider_config(&config.provider)
            .and_then(|p| p.timeout_secs())
            .map(Duration::from_secs);
        let client = create_client(
            &config.provider,
            config.provider_endpoint(&config.provider),
            api_key.as_deref(),
            timeout,
        )
        .map_err(AppError::Config)?;

        tracing::info!(
            provider = client.provider_name(),
            model = %config.model,
            store = ?config.store_path,
            knowledge_bytes = knowledge.len(),
            "Chat pipeline ready"
        );

        Ok(Self::new(
            client,
            Arc::new(store),
            Arc::new(renderer),
            knowledge,
            PipelineSettings::from_config(config),
        ))
    }

    /// Run classification, retrieval and assembly for a question.
    pub async fn prepare(&self, question: &Question) -> AppResult<GroundingPrompt> {
        let classification = self.classifier.classify(question).await;
        let evidence = self.retriever.retrieve(&classification).await;
        self.renderer.assemble(question, &self.knowledge, &evidence)
    }

    /// Answer a raw question.
    ///
    /// Every error returned here happens before the answer stream is
    /// committed. Mid-stream failures surface from the returned stream.
    pub async fn answer(&self, raw_question: &str) -> AppResult<AnswerStream> {
        let question = Question::parse(raw_question)?;

        let request_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("chat", %request_id);

        async {
            tracing::info!("Chat request received");
            tracing::debug!("Question: {}", question);

            let prompt = self.prepare(&question).await?;
            let request = LlmRequest::new(prompt.into_text(), &self.model).with_streaming();

            open_answer(
                self.client.as_ref(),
                &request,
                self.stream_idle_timeout,
                tracing::Span::current(),
            )
            .await
        }
        .instrument(span)
        .await
    }
}

/// Read the static knowledge text.
pub fn load_knowledge(path: &Path) -> AppResult<String> {
    std::fs::read_to_string(path).map_err(|e| {
        AppError::Config(format!(
            "Failed to read knowledge file {}: {}",
            path.display(),
            e
        ))
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;
    use unilink_llm::ScriptedClient;
    use unilink_prompt::NO_EVIDENCE_MARKER;

    pub(crate) const KNOWLEDGE: &str = "UniLink is the campus platform for rides, lost items, blood requests and vehicle rentals.";

    pub(crate) async fn seeded_store() -> Arc<SqliteStore> {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        store
            .insert(
                "LostFound",
                &json!({
                    "itemType": "found",
                    "itemName": "Blue water bottle",
                    "description": "Steel bottle with stickers",
                    "location": "Library 2nd floor",
                    "storageLocation": "Library front desk"
                }),
            )
            .await
            .unwrap();
        store
    }

    pub(crate) fn pipeline(client: Arc<ScriptedClient>, store: Arc<SqliteStore>) -> ChatPipeline {
        ChatPipeline::new(
            client,
            store,
            Arc::new(PromptRenderer::built_in().unwrap()),
            KNOWLEDGE,
            PipelineSettings {
                model: "answer-model".to_string(),
                classifier_model: "classifier-model".to_string(),
                evidence_limit: 5,
                classifier_timeout: Duration::from_millis(100),
                stream_idle_timeout: Duration::from_secs(1),
            },
        )
    }

    async fn drain(mut answer: AnswerStream) -> String {
        let mut text = String::new();
        while let Some(chunk) = answer.next().await {
            text.push_str(&chunk.unwrap());
        }
        text
    }

    #[tokio::test]
    async fn test_blank_question_runs_no_stage() {
        let client = Arc::new(ScriptedClient::new());
        let pipeline = pipeline(client.clone(), seeded_store().await);

        let err = pipeline.answer("   ").await.err().unwrap();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_found_item_reaches_prompt() {
        let client = Arc::new(
            ScriptedClient::new()
                .with_completion(r#"{"collection":"LostFound","keywords":"blue bottle"}"#)
                .with_stream(&["It is at the ", "library front desk."]),
        );
        let pipeline = pipeline(client.clone(), seeded_store().await);

        let answer = pipeline
            .answer("Has anyone found a blue water bottle?")
            .await
            .unwrap();
        assert_eq!(drain(answer).await, "It is at the library front desk.");

        let requests = client.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].model, "answer-model");
        assert!(requests[1].stream);

        let prompt = &requests[1].prompt;
        assert!(prompt.contains(KNOWLEDGE));
        assert!(prompt.contains("Blue water bottle"));
        assert!(prompt.contains("Has anyone found a blue water bottle?"));
        assert!(!prompt.contains(NO_EVIDENCE_MARKER));
    }

    #[tokio::test]
    async fn test_classifier_timeout_still_answers() {
        let client = Arc::new(
            ScriptedClient::new()
                .with_hanging_completion()
                .with_stream(&["Sorry, I could not find that."]),
        );
        let pipeline = pipeline(client.clone(), seeded_store().await);

        let answer = pipeline.answer("Has anyone found a blue water bottle?").await.unwrap();
        assert_eq!(drain(answer).await, "Sorry, I could not find that.");

        let prompt = &client.requests()[1].prompt;
        assert!(prompt.contains(NO_EVIDENCE_MARKER));
        assert!(!prompt.contains("Library front desk"));
    }

    #[tokio::test]
    async fn test_no_match_renders_empty_marker() {
        let client = Arc::new(
            ScriptedClient::new()
                .with_completion(r#"{"collection":"VehicleRental","keywords":"tesla"}"#)
                .with_stream(&["None listed."]),
        );
        let pipeline = pipeline(client.clone(), seeded_store().await);

        let prompt = pipeline
            .prepare(&Question::parse("Can I rent a Tesla?").unwrap())
            .await
            .unwrap();
        assert_eq!(prompt.evidence_count(), 0);
        assert!(prompt.text().contains(NO_EVIDENCE_MARKER));
    }

    #[tokio::test]
    async fn test_stream_open_failure_is_error() {
        let client = Arc::new(
            ScriptedClient::new()
                .with_completion(r#"{"collection":"General","keywords":""}"#)
                .with_stream_open_error("model unavailable"),
        );
        let pipeline = pipeline(client, seeded_store().await);

        let err = pipeline.answer("What is UniLink?").await.err().unwrap();
        assert!(matches!(err, AppError::Llm(_)));
    }

    #[test]
    fn test_load_knowledge() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("knowledge.md");
        std::fs::write(&path, "# Campus\n").unwrap();

        assert_eq!(load_knowledge(&path).unwrap(), "# Campus\n");
        assert!(matches!(
            load_knowledge(&dir.path().join("missing.md")),
            Err(AppError::Config(_))
        ));
    }
}
