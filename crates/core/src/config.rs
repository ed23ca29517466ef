//! Configuration management for the advisor assistant.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - Config file (`.advisor/config.yaml`)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric, with most state stored in `.advisor/`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Providers the LLM factory knows how to build.
pub const KNOWN_PROVIDERS: [&str; 1] = ["ollama"];

/// Reasoning engines the orchestrator can route with.
pub const KNOWN_ROUTERS: [&str; 2] = ["keyword", "llm"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .advisor/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// LLM provider used for routing and research
    pub provider: String,

    /// Default model identifier
    pub model: String,

    /// API key for the LLM provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Log output format
    pub log_format: LogFormat,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// LLM provider configurations
    pub llm: Option<LlmConfig>,

    /// Orchestration loop settings
    pub orchestrator: OrchestratorSettings,

    /// Tabular dataset settings
    pub insights: InsightsSettings,

    /// Document knowledge base settings
    pub knowledge: KnowledgeSettings,

    /// Compliance battery settings
    pub compliance: ComplianceSettings,
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Parse a format name, falling back to text for anything unknown.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
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
pub struct ProviderConfig {
    pub endpoint: Option<String>,
    pub model: String,
    #[serde(rename = "embeddingModel")]
    pub embedding_model: Option<String>,
    /// Request timeout in seconds
    pub timeout: Option<u64>,
    #[serde(rename = "apiKeyEnv")]
    pub api_key_env: Option<String>,
}

/// Settings for the route → execute → synthesize → validate loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorSettings {
    /// Revision attempts allowed after the first failed validation
    #[serde(rename = "maxRevisions", default = "default_max_revisions")]
    pub max_revisions: u32,

    /// Per-invocation time budget
    #[serde(
        rename = "capabilityTimeoutSecs",
        default = "default_capability_timeout_secs"
    )]
    pub capability_timeout_secs: u64,

    /// Extra attempts for idempotent capabilities that fail
    #[serde(rename = "capabilityRetries", default = "default_capability_retries")]
    pub capability_retries: u32,

    /// Reasoning engine: "keyword" (offline) or "llm"
    #[serde(default = "default_router")]
    pub router: String,
}

fn default_max_revisions() -> u32 {
    2
}

fn default_capability_timeout_secs() -> u64 {
    30
}

fn default_capability_retries() -> u32 {
    1
}

fn default_router() -> String {
    "keyword".to_string()
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_revisions: default_max_revisions(),
            capability_timeout_secs: default_capability_timeout_secs(),
            capability_retries: default_capability_retries(),
            router: default_router(),
        }
    }
}

/// Customer dataset location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsightsSettings {
    /// JSON dataset file; relative paths resolve against the workspace
    #[serde(rename = "datasetPath")]
    pub dataset_path: Option<PathBuf>,
}

/// Which knowledge base the assistant answers from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeSettings {
    /// Knowledge base name under `.advisor/knowledge/`
    #[serde(default = "default_base")]
    pub base: String,

    /// Folder ingested at startup when the base is empty
    #[serde(rename = "docsFolder")]
    pub docs_folder: Option<PathBuf>,
}

fn default_base() -> String {
    "enterprise-docs".to_string()
}

impl Default for KnowledgeSettings {
    fn default() -> Self {
        Self {
            base: default_base(),
            docs_folder: None,
        }
    }
}

/// Compliance battery settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplianceSettings {
    /// Replaces the built-in forbidden-phrase deny-list when set
    #[serde(rename = "forbiddenPhrases")]
    pub forbidden_phrases: Option<Vec<String>>,

    /// Require drafts to state they are AI-generated and may be wrong
    #[serde(rename = "aiDisclosure", default)]
    pub require_ai_disclosure: bool,

    /// Require a risk statement on investment content
    #[serde(rename = "riskDisclosure", default)]
    pub require_risk_disclosure: bool,
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    orchestrator: Option<OrchestratorSettings>,
    insights: Option<InsightsSettings>,
    knowledge: Option<KnowledgeSettings>,
    compliance: Option<ComplianceSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    format: Option<LogFormat>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(), // Local-first default
            model: "llama3.2".to_string(),
            api_key: None,
            log_level: None,
            log_format: LogFormat::Text,
            verbose: false,
            no_color: false,
            llm: None,
            orchestrator: OrchestratorSettings::default(),
            insights: InsightsSettings::default(),
            knowledge: KnowledgeSettings::default(),
            compliance: ComplianceSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML file and environment variables.
    ///
    /// Environment variables:
    /// - `ADVISOR_WORKSPACE`: Override workspace path
    /// - `ADVISOR_CONFIG`: Path to config file
    /// - `ADVISOR_PROVIDER`: LLM provider
    /// - `ADVISOR_MODEL`: Model identifier
    /// - `ADVISOR_API_KEY`: API key
    /// - `ADVISOR_ROUTER`: Reasoning engine ("keyword" or "llm")
    /// - `ADVISOR_DATASET`: Customer dataset path
    /// - `ADVISOR_LOG_FORMAT`: "text" or "json"
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use advisor_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_with(None, None)
    }

    /// Like [`AppConfig::load`], with an explicit workspace and config file
    /// taking precedence over `ADVISOR_WORKSPACE` and `ADVISOR_CONFIG`.
    pub fn load_with(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) =
            workspace.or_else(|| std::env::var("ADVISOR_WORKSPACE").ok().map(PathBuf::from))
        {
            config.workspace = workspace;
        }

        if let Some(config_file) =
            config_file.or_else(|| std::env::var("ADVISOR_CONFIG").ok().map(PathBuf::from))
        {
            config.config_file = Some(config_file);
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = if let Some(ref cf) = config.config_file {
            cf.clone()
        } else {
            config.advisor_dir().join("config.yaml")
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("ADVISOR_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("ADVISOR_MODEL") {
            config.model = model;
        }

        if let Ok(router) = std::env::var("ADVISOR_ROUTER") {
            config.orchestrator.router = router;
        }

        if let Ok(dataset) = std::env::var("ADVISOR_DATASET") {
            config.insights.dataset_path = Some(PathBuf::from(dataset));
        }

        if let Ok(format) = std::env::var("ADVISOR_LOG_FORMAT") {
            config.log_format = LogFormat::parse(&format);
        }

        config.api_key = std::env::var("ADVISOR_API_KEY").ok();
        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                result.workspace = PathBuf::from(path);
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(format) = logging.format {
                result.log_format = format;
            }
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model.clone();
            }

            result.llm = Some(llm);
        }

        if let Some(orchestrator) = config_file.orchestrator {
            result.orchestrator = orchestrator;
        }

        if let Some(insights) = config_file.insights {
            result.insights = insights;
        }

        if let Some(knowledge) = config_file.knowledge {
            result.knowledge = knowledge;
        }

        if let Some(compliance) = config_file.compliance {
            result.compliance = compliance;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
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
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .advisor directory.
    pub fn advisor_dir(&self) -> PathBuf {
        self.workspace.join(".advisor")
    }

    /// Ensure the .advisor directory exists.
    pub fn ensure_advisor_dir(&self) -> AppResult<()> {
        let advisor_dir = self.advisor_dir();
        if !advisor_dir.exists() {
            std::fs::create_dir_all(&advisor_dir).map_err(|e| {
                AppError::Config(format!("Failed to create .advisor directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Get the configuration of a provider, if the config file declares one.
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.llm.as_ref().and_then(|llm| llm.providers.get(provider))
    }

    /// Endpoint override for the active provider.
    pub fn provider_endpoint(&self) -> Option<&str> {
        self.get_provider_config(&self.provider)
            .and_then(|pc| pc.endpoint.as_deref())
    }

    /// Resolve API key from the explicit setting or the provider's env variable.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        self.get_provider_config(provider)
            .and_then(|pc| pc.api_key_env.as_ref())
            .and_then(|env_var| std::env::var(env_var).ok())
    }

    /// Resolve the customer dataset path against the workspace.
    pub fn dataset_path(&self) -> Option<PathBuf> {
        self.insights.dataset_path.as_ref().map(|p| {
            if p.is_absolute() {
                p.clone()
            } else {
                self.workspace.join(p)
            }
        })
    }

    /// Validate configuration before any component is built.
    pub fn validate(&self) -> AppResult<()> {
        if !KNOWN_PROVIDERS.contains(&self.provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if !KNOWN_ROUTERS.contains(&self.orchestrator.router.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown router: {}. Supported: {}",
                self.orchestrator.router,
                KNOWN_ROUTERS.join(", ")
            )));
        }

        if self.orchestrator.capability_timeout_secs == 0 {
            return Err(AppError::Config(
                "capabilityTimeoutSecs must be greater than zero".to_string(),
            ));
        }

        if let Some(pc) = self.get_provider_config(&self.provider) {
            if let Some(ref env_var) = pc.api_key_env {
                if self.api_key.is_none() && std::env::var(env_var).is_err() {
                    return Err(AppError::Config(format!(
                        "API key not found in environment variable: {}",
                        env_var
                    )));
                }
            }
        }

        Ok(())
    }
}
