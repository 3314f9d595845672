//! Configuration management for UniLink.
//!
//! Configuration is layered, later sources winning:
//! - Built-in defaults
//! - A YAML config file (`unilink.yaml` or `UNILINK_CONFIG`)
//! - Environment variables
//! - Command-line flags

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::domain::{DEFAULT_EVIDENCE_LIMIT, MAX_EVIDENCE_LIMIT};
use crate::error::{AppError, AppResult};
use crate::logging::LogFormat;

/// Providers the factory knows how to build.
pub const KNOWN_PROVIDERS: [&str; 2] = ["ollama", "gemini"];

/// Model used for a provider with no `model` entry in the config file.
pub fn default_model_for(provider: &str) -> Option<&'static str> {
    match provider {
        "ollama" => Some("llama3.2"),
        "gemini" => Some("gemini-2.5-flash"),
        _ => None,
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Config file that was merged, if any
    pub config_file: Option<PathBuf>,

    /// Generation provider (e.g., "ollama", "gemini")
    pub provider: String,

    /// Model used for the streamed answer
    pub model: String,

    /// Model used for classification (defaults to `model`)
    pub classifier_model: Option<String>,

    /// API key for the provider
    pub api_key: Option<String>,

    /// HTTP bind host
    pub host: String,

    /// HTTP bind port
    pub port: u16,

    /// Allowed CORS origins; empty means any
    pub cors_origins: Vec<String>,

    /// Static knowledge base text file
    pub knowledge_path: PathBuf,

    /// SQLite document store file
    pub store_path: PathBuf,

    /// Directory with prompt overrides
    pub prompts_dir: Option<PathBuf>,

    /// Maximum evidence items per request
    pub evidence_limit: usize,

    /// Classification call timeout in seconds
    pub classifier_timeout_secs: u64,

    /// Longest silence tolerated from a streaming answer, in seconds
    pub stream_idle_timeout_secs: u64,

    /// Log level override
    pub log_level: Option<String>,

    /// Log line format
    pub log_format: LogFormat,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Provider configurations from the config file
    pub llm: Option<LlmConfig>,
}

/// LLM section of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    Gemini {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        endpoint: Option<String>,
    },
    Ollama {
        endpoint: String,
        model: String,
        timeout: Option<u64>,
    },
}

impl ProviderConfig {
    pub fn model(&self) -> &str {
        match self {
            Self::Gemini { model, .. } | Self::Ollama { model, .. } => model,
        }
    }

    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::Gemini { endpoint, .. } => endpoint.as_deref(),
            Self::Ollama { endpoint, .. } => Some(endpoint),
        }
    }

    pub fn timeout_secs(&self) -> Option<u64> {
        match self {
            Self::Ollama { timeout, .. } => *timeout,
            Self::Gemini { .. } => None,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    server: Option<ServerSection>,
    chat: Option<ChatSection>,
    logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ServerSection {
    host: Option<String>,
    port: Option<u16>,
    #[serde(rename = "corsOrigins")]
    cors_origins: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatSection {
    #[serde(rename = "knowledgePath")]
    knowledge_path: Option<PathBuf>,
    #[serde(rename = "storePath")]
    store_path: Option<PathBuf>,
    #[serde(rename = "promptsDir")]
    prompts_dir: Option<PathBuf>,
    #[serde(rename = "evidenceLimit")]
    evidence_limit: Option<usize>,
    #[serde(rename = "classifierTimeoutSecs")]
    classifier_timeout_secs: Option<u64>,
    #[serde(rename = "streamIdleTimeoutSecs")]
    stream_idle_timeout_secs: Option<u64>,
    #[serde(rename = "classifierModel")]
    classifier_model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    format: Option<LogFormat>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_file: None,
            provider: "ollama".to_string(),
            model: "llama3.2".to_string(),
            classifier_model: None,
            api_key: None,
            host: "127.0.0.1".to_string(),
            port: 5000,
            cors_origins: Vec::new(),
            knowledge_path: PathBuf::from("knowledge.md"),
            store_path: PathBuf::from("unilink.db"),
            prompts_dir: None,
            evidence_limit: DEFAULT_EVIDENCE_LIMIT,
            classifier_timeout_secs: 5,
            stream_idle_timeout_secs: 60,
            log_level: None,
            log_format: LogFormat::Text,
            verbose: false,
            no_color: false,
            llm: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the config file and the environment.
    ///
    /// Environment variables:
    /// - `UNILINK_CONFIG`: Path to config file (default `./unilink.yaml`)
    /// - `UNILINK_PROVIDER`: Generation provider
    /// - `UNILINK_MODEL`: Answer model
    /// - `UNILINK_API_KEY`: API key
    /// - `UNILINK_HOST` / `UNILINK_PORT`: Bind address
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load(config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        let explicit = config_file.or_else(|| std::env::var("UNILINK_CONFIG").ok().map(PathBuf::from));

        let config_path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(AppError::Config(format!(
                        "Config file does not exist: {:?}",
                        path
                    )));
                }
                Some(path)
            }
            None => Some(PathBuf::from("unilink.yaml")).filter(|p| p.exists()),
        };

        if let Some(path) = config_path {
            config = config.merge_yaml(&path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("UNILINK_PROVIDER") {
            config.switch_provider(provider);
        }

        if let Ok(model) = std::env::var("UNILINK_MODEL") {
            config.model = model;
        }

        if let Ok(host) = std::env::var("UNILINK_HOST") {
            config.host = host;
        }

        if let Ok(port) = std::env::var("UNILINK_PORT") {
            config.port = port
                .parse()
                .map_err(|_| AppError::Config(format!("Invalid UNILINK_PORT: {}", port)))?;
        }

        config.api_key = std::env::var("UNILINK_API_KEY").ok();

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let mut result = self.merge_yaml_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;
        result.config_file = Some(path.to_path_buf());

        tracing::debug!("Merged config file {:?}", path);
        Ok(result)
    }

    fn merge_yaml_str(&self, contents: &str) -> AppResult<Self> {
        let file: ConfigFile = serde_yaml::from_str(contents)?;
        let mut result = self.clone();

        if let Some(server) = file.server {
            if let Some(host) = server.host {
                result.host = host;
            }
            if let Some(port) = server.port {
                result.port = port;
            }
            if let Some(origins) = server.cors_origins {
                result.cors_origins = origins;
            }
        }

        if let Some(chat) = file.chat {
            if let Some(path) = chat.knowledge_path {
                result.knowledge_path = path;
            }
            if let Some(path) = chat.store_path {
                result.store_path = path;
            }
            if chat.prompts_dir.is_some() {
                result.prompts_dir = chat.prompts_dir;
            }
            if let Some(limit) = chat.evidence_limit {
                result.evidence_limit = limit;
            }
            if let Some(secs) = chat.classifier_timeout_secs {
                result.classifier_timeout_secs = secs;
            }
            if let Some(secs) = chat.stream_idle_timeout_secs {
                result.stream_idle_timeout_secs = secs;
            }
            if chat.classifier_model.is_some() {
                result.classifier_model = chat.classifier_model;
            }
        }

        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(format) = logging.format {
                result.log_format = format;
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(llm) = file.llm {
            result.provider = llm.active_provider.clone();
            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model().to_string();
            }
            result.llm = Some(llm);
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Flags take precedence over the environment and the config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        provider: Option<String>,
        model: Option<String>,
        host: Option<String>,
        port: Option<u16>,
        log_level: Option<String>,
        log_format: Option<LogFormat>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(provider) = provider {
            self.switch_provider(provider);
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(host) = host {
            self.host = host;
        }

        if let Some(port) = port {
            self.port = port;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if let Some(log_format) = log_format {
            self.log_format = log_format;
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Make `provider` active.
    ///
    /// The model follows the provider: its config file entry, or the
    /// provider's default. An unknown provider keeps the current model and
    /// is rejected later by `validate`.
    pub fn switch_provider(&mut self, provider: String) {
        if provider == self.provider {
            return;
        }

        let model = self
            .get_provider_config(&provider)
            .map(ProviderConfig::model)
            .or_else(|| default_model_for(&provider))
            .map(str::to_string);
        if let Some(model) = model {
            tracing::debug!(%provider, %model, "Provider switched");
            self.model = model;
        }
        self.provider = provider;
    }

    /// Model used for classification calls.
    pub fn classifier_model(&self) -> &str {
        self.classifier_model.as_deref().unwrap_or(&self.model)
    }

    /// Socket address string for the HTTP listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get a provider configuration from the config file.
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.llm.as_ref().and_then(|llm| llm.providers.get(provider))
    }

    /// Resolve the endpoint configured for a provider.
    pub fn provider_endpoint(&self, provider: &str) -> Option<&str> {
        self.get_provider_config(provider)
            .and_then(ProviderConfig::endpoint)
    }

    /// Resolve the API key for a provider.
    ///
    /// `UNILINK_API_KEY` wins, then the provider's `apiKeyEnv`, then
    /// `GEMINI_API_KEY` for the Gemini provider.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        if let Some(ProviderConfig::Gemini { api_key_env, .. }) = self.get_provider_config(provider) {
            if let Ok(key) = std::env::var(api_key_env) {
                return Some(key.trim().to_string());
            }
        }

        if provider == "gemini" {
            return std::env::var("GEMINI_API_KEY")
                .ok()
                .map(|k| k.trim().to_string());
        }

        None
    }

    /// Validate configuration for the active provider and chat limits.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.provider.as_str();

        if !KNOWN_PROVIDERS.contains(&provider) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if provider == "gemini" && self.resolve_api_key(provider).is_none() {
            return Err(AppError::Config(
                "Gemini provider requires an API key (UNILINK_API_KEY or GEMINI_API_KEY)"
                    .to_string(),
            ));
        }

        if self.evidence_limit == 0 || self.evidence_limit > MAX_EVIDENCE_LIMIT {
            return Err(AppError::Config(format!(
                "evidenceLimit must be between 1 and {}, got {}",
                MAX_EVIDENCE_LIMIT, self.evidence_limit
            )));
        }

        if self.classifier_timeout_secs == 0 {
            return Err(AppError::Config(
                "classifierTimeoutSecs must be greater than zero".to_string(),
            ));
        }

        if self.stream_idle_timeout_secs == 0 {
            return Err(AppError::Config(
                "streamIdleTimeoutSecs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
