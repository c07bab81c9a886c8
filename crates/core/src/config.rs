//! Configuration management for Juris.
//!
//! Configuration is merged from, in increasing precedence:
//! - Built-in defaults
//! - Config file (`.juris/config.yaml`, or `--config` / `JURIS_CONFIG`)
//! - Environment variables
//! - Command-line flags
//!
//! The resulting [`AppConfig`] is passed explicitly into every component;
//! nothing downstream reads process environment on its own.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Providers the factory knows how to build.
pub const KNOWN_PROVIDERS: [&str; 3] = ["ollama", "openai", "groq"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .juris/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Active LLM provider ("ollama", "openai", "groq")
    pub provider: String,

    /// Model identifier for the active provider
    pub model: String,

    /// Explicit API key (takes precedence over provider `apiKeyEnv`)
    pub api_key: Option<String>,

    /// Ollama endpoint from `OLLAMA_URL`; wins over config.yaml
    pub ollama_url: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Emit logs as JSON lines
    pub log_json: bool,

    /// LLM provider configurations
    pub llm: Option<LlmConfig>,

    /// Orchestration pipeline settings
    pub pipeline: PipelineConfig,

    /// Knowledge store and ingestion settings
    pub knowledge: KnowledgeSettings,
}

/// LLM configuration from config.yaml.
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
    /// Any OpenAI-compatible chat completions API (OpenAI, Groq)
    OpenAI {
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
            Self::OpenAI { model, .. } | Self::Ollama { model, .. } => model,
        }
    }

    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::OpenAI { endpoint, .. } => endpoint.as_deref(),
            Self::Ollama { endpoint, .. } => Some(endpoint.as_str()),
        }
    }
}

/// Settings consumed by the orchestration pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    /// Result bound for each knowledge-source invocation
    pub top_k: usize,

    /// Characters of chunk text shown to the citation model
    pub preview_chars: usize,

    /// Sampling temperature for all pipeline model calls
    pub temperature: f32,

    /// Overall per-question budget enforced by the caller
    pub question_timeout_secs: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            preview_chars: 500,
            temperature: 0.0,
            question_timeout_secs: None,
        }
    }
}

/// Chunk window for one knowledge category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl ChunkingConfig {
    pub const fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }
}

/// Knowledge store and ingestion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KnowledgeSettings {
    /// Override for the SQLite store location
    pub store_path: Option<PathBuf>,

    /// Embedding provider ("trigram" or "ollama")
    pub embedding_provider: String,

    /// Embedding model (ignored by "trigram")
    pub embedding_model: String,

    /// Embedding vector dimension
    pub embedding_dims: usize,

    pub statutes: ChunkingConfig,
    pub cases: ChunkingConfig,
    pub regulations: ChunkingConfig,
}

impl Default for KnowledgeSettings {
    fn default() -> Self {
        Self {
            store_path: None,
            embedding_provider: "trigram".to_string(),
            embedding_model: "trigram-v1".to_string(),
            embedding_dims: 384,
            statutes: ChunkingConfig::new(1000, 200),
            cases: ChunkingConfig::new(800, 150),
            regulations: ChunkingConfig::new(1000, 200),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    pipeline: Option<PipelineConfig>,
    knowledge: Option<KnowledgeSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(),
            model: "llama3.2".to_string(),
            api_key: None,
            ollama_url: None,
            log_level: None,
            verbose: false,
            no_color: false,
            log_json: false,
            llm: None,
            pipeline: PipelineConfig::default(),
            knowledge: KnowledgeSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the config file, environment variables and defaults.
    ///
    /// Environment variables:
    /// - `JURIS_WORKSPACE`: Override workspace path
    /// - `JURIS_CONFIG`: Path to config file
    /// - `JURIS_PROVIDER`: LLM provider
    /// - `JURIS_MODEL`: Model identifier
    /// - `JURIS_API_KEY`: API key
    /// - `OLLAMA_URL`: Ollama endpoint for chat and embeddings
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("JURIS_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("JURIS_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.workspace.join(".juris/config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("JURIS_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("JURIS_MODEL") {
            config.model = model;
        }

        config.api_key = std::env::var("JURIS_API_KEY").ok();
        config.ollama_url = std::env::var("OLLAMA_URL").ok();
        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into a copy of this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        self.merge_yaml_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config file {:?}: {}", path, e)))
    }

    fn merge_yaml_str(&self, contents: &str) -> AppResult<Self> {
        let config_file: ConfigFile = serde_yaml::from_str(contents)?;
        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(json) = logging.json {
                result.log_json = json;
            }
        }

        if let Some(pipeline) = config_file.pipeline {
            result.pipeline = pipeline;
        }

        if let Some(knowledge) = config_file.knowledge {
            result.knowledge = knowledge;
        }

        if let Some(llm) = config_file.llm {
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
    /// Command-line flags take precedence over environment variables and files.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
        log_json: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
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

        if log_json {
            self.log_json = true;
        }

        self
    }

    /// Get the path to the .juris directory.
    pub fn juris_dir(&self) -> PathBuf {
        self.workspace.join(".juris")
    }

    /// Ensure the .juris directory exists.
    pub fn ensure_juris_dir(&self) -> AppResult<()> {
        let juris_dir = self.juris_dir();
        if !juris_dir.exists() {
            std::fs::create_dir_all(&juris_dir).map_err(|e| {
                AppError::Config(format!("Failed to create .juris directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Location of the SQLite knowledge store.
    pub fn store_path(&self) -> PathBuf {
        self.knowledge
            .store_path
            .clone()
            .unwrap_or_else(|| self.juris_dir().join("knowledge").join("index.sqlite"))
    }

    /// Get a provider configuration from config.yaml, if present.
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.llm.as_ref().and_then(|llm| llm.providers.get(provider))
    }

    /// Resolve the endpoint for a provider, if one is configured.
    pub fn resolve_endpoint(&self, provider: &str) -> Option<String> {
        if provider == "ollama" {
            if let Some(ref url) = self.ollama_url {
                return Some(url.clone());
            }
        }

        self.get_provider_config(provider)
            .and_then(|pc| pc.endpoint())
            .map(str::to_string)
    }

    /// Resolve the API key for a provider.
    ///
    /// Order: `JURIS_API_KEY`, the provider's `apiKeyEnv`, then the
    /// conventional variable for the provider (`GROQ_API_KEY`, `OPENAI_API_KEY`).
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        if let Some(ProviderConfig::OpenAI { api_key_env, .. }) = self.get_provider_config(provider)
        {
            if let Ok(key) = std::env::var(api_key_env) {
                return Some(key);
            }
        }

        let conventional = match provider {
            "groq" => "GROQ_API_KEY",
            "openai" => "OPENAI_API_KEY",
            _ => return None,
        };
        std::env::var(conventional).ok()
    }

    /// Validate configuration for the active provider.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.provider.as_str();

        if !KNOWN_PROVIDERS.contains(&provider) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if matches!(provider, "openai" | "groq") && self.resolve_api_key(provider).is_none() {
            return Err(AppError::Config(format!(
                "Provider '{}' requires an API key (set JURIS_API_KEY or apiKeyEnv)",
                provider
            )));
        }

        if self.pipeline.top_k == 0 {
            return Err(AppError::Config("pipeline.topK must be at least 1".to_string()));
        }

        if self.pipeline.preview_chars == 0 {
            return Err(AppError::Config(
                "pipeline.previewChars must be at least 1".to_string(),
            ));
        }

        for (name, chunking) in [
            ("statutes", self.knowledge.statutes),
            ("cases", self.knowledge.cases),
            ("regulations", self.knowledge.regulations),
        ] {
            if chunking.chunk_overlap >= chunking.chunk_size {
                return Err(AppError::Config(format!(
                    "knowledge.{}: chunkOverlap ({}) must be smaller than chunkSize ({})",
                    name, chunking.chunk_overlap, chunking.chunk_size
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.model, "llama3.2");
        assert_eq!(config.pipeline.top_k, 5);
        assert_eq!(config.pipeline.preview_chars, 500);
        assert_eq!(config.knowledge.cases, ChunkingConfig::new(800, 150));
        assert!(!config.verbose);
    }

    #[test]
    fn test_store_path_defaults_under_juris_dir() {
        let config = AppConfig::default();
        let path = config.store_path();
        assert!(path.ends_with(".juris/knowledge/index.sqlite"));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden = config.with_overrides(
            None,
            None,
            Some("groq".to_string()),
            Some("llama-3.1-70b-versatile".to_string()),
            None,
            true,
            false,
            true,
        );

        assert_eq!(overridden.provider, "groq");
        assert_eq!(overridden.model, "llama-3.1-70b-versatile");
        assert!(overridden.verbose);
        assert!(overridden.log_json);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_merge_yaml_sections() {
        let yaml = r#"
llm:
  activeProvider: groq
  providers:
    groq:
      apiKeyEnv: JURIS_TEST_UNSET_KEY
      model: llama-3.1-70b-versatile
      endpoint: https://api.groq.com/openai/v1
    ollama:
      endpoint: http://localhost:11434
      model: llama3.2
pipeline:
  topK: 3
  questionTimeoutSecs: 60
logging:
  json: true
"#;

        let merged = AppConfig::default().merge_yaml_str(yaml).unwrap();
        assert_eq!(merged.provider, "groq");
        assert_eq!(merged.model, "llama-3.1-70b-versatile");
        assert_eq!(merged.pipeline.top_k, 3);
        assert_eq!(merged.pipeline.preview_chars, 500);
        assert_eq!(merged.pipeline.question_timeout_secs, Some(60));
        assert!(merged.log_json);
        assert_eq!(
            merged.resolve_endpoint("groq").as_deref(),
            Some("https://api.groq.com/openai/v1")
        );
        assert!(matches!(
            merged.get_provider_config("ollama"),
            Some(ProviderConfig::Ollama { .. })
        ));
    }

    #[test]
    fn test_ollama_url_overrides_configured_endpoint() {
        let yaml = r#"
llm:
  providers:
    ollama:
      endpoint: http://localhost:11434
      model: llama3.2
"#;
        let mut config = AppConfig::default().merge_yaml_str(yaml).unwrap();
        assert_eq!(
            config.resolve_endpoint("ollama").as_deref(),
            Some("http://localhost:11434")
        );

        config.ollama_url = Some("http://gpu-box:11434".to_string());
        assert_eq!(
            config.resolve_endpoint("ollama").as_deref(),
            Some("http://gpu-box:11434")
        );
        assert_eq!(config.resolve_endpoint("groq"), None);
    }

    #[test]
    fn test_explicit_api_key_wins() {
        let mut config = AppConfig::default();
        config.api_key = Some("secret".to_string());
        assert_eq!(config.resolve_api_key("groq").as_deref(), Some("secret"));
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = AppConfig::default();
        config.provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_ollama() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_top_k() {
        let mut config = AppConfig::default();
        config.pipeline.top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_overlap_larger_than_chunk() {
        let mut config = AppConfig::default();
        config.knowledge.cases = ChunkingConfig::new(100, 100);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("knowledge.cases"));
    }

    #[test]
    fn test_load_reads_workspace_config_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let juris_dir = temp.path().join(".juris");
        std::fs::create_dir_all(&juris_dir).unwrap();
        let config_path = juris_dir.join("config.yaml");
        std::fs::write(&config_path, "pipeline:\n  previewChars: 200\n").unwrap();

        let base = AppConfig {
            workspace: temp.path().to_path_buf(),
            ..Default::default()
        };
        let merged = base.merge_yaml(&config_path).unwrap();
        assert_eq!(merged.pipeline.preview_chars, 200);
        assert_eq!(merged.pipeline.top_k, 5);
    }
}
