use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, warn};

use crate::error::{AiriError, Result};

/// Top-level configuration for the AIRI assistant backend.
///
/// Loaded from `airi.toml` by default. Every section is optional in the file
/// and falls back to its defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiriConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub router: RouterConfig,
}

impl AiriConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AiriConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AiriError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup. Empty values and
    /// values that fail to parse are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = get("AIRI_HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("AIRI_PORT").and_then(|v| v.trim().parse::<u16>().ok()) {
            self.server.port = port;
        }
        if let Some(key) = get("AIRI_API_KEY") {
            self.server.api_key = key;
            self.server.require_api_key = true;
        }
        if let Some(provider) = get("AIRI_LLM_PROVIDER").and_then(|v| LlmProvider::parse(&v)) {
            self.llm.provider = provider;
        }
        if let Some(key) = get("OPENROUTER_API_KEY") {
            self.llm.openrouter.api_key = key;
        }
        if let Some(model) = get("OPENROUTER_MODEL") {
            self.llm.openrouter.model = model;
        }
        if let Some(url) = get("SELF_HOSTED_BASE_URL") {
            self.llm.self_hosted.base_url = url;
        }
        if let Some(model) = get("SELF_HOSTED_MODEL") {
            self.llm.self_hosted.model = model;
        }
        if let Some(flag) = get("AIRI_PERSISTENT_MEMORY") {
            match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => self.memory.persistent = true,
                "0" | "false" | "no" => self.memory.persistent = false,
                other => warn!("Ignoring AIRI_PERSISTENT_MEMORY={}", other),
            }
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Display name, also sent to OpenRouter as the `X-Title` header.
    pub app_name: String,
    /// Debug mode switches logs to the human-readable format.
    pub debug: bool,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Emit one JSON object per log line.
    pub json_logs: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            app_name: "AIRI Alex Assistant".to_string(),
            debug: false,
            log_level: "info".to_string(),
            json_logs: true,
        }
    }
}

impl GeneralConfig {
    /// JSON logs are used unless debug mode is on.
    pub fn use_json_logs(&self) -> bool {
        self.json_logs && !self.debug
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// CORS origins; `"*"` allows any origin.
    pub allowed_origins: Vec<String>,
    /// Shared secret expected in the `X-API-Key` header.
    pub api_key: String,
    pub require_api_key: bool,
    /// Requests per minute across the API routes. 0 disables limiting.
    pub rate_limit_per_minute: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            allowed_origins: vec!["*".to_string()],
            api_key: String::new(),
            require_api_key: false,
            rate_limit_per_minute: 60,
        }
    }
}

/// Which completion endpoint to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    #[default]
    Openrouter,
    SelfHosted,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::Openrouter => "openrouter",
            LlmProvider::SelfHosted => "self_hosted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "openrouter" => Some(LlmProvider::Openrouter),
            "self_hosted" | "ollama" => Some(LlmProvider::SelfHosted),
            _ => None,
        }
    }
}

/// Connection details for one OpenAI-compatible endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl EndpointConfig {
    pub fn openrouter() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            api_key: String::new(),
            model: "mistralai/mistral-7b-instruct:free".to_string(),
        }
    }

    pub fn self_hosted() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            api_key: "none".to_string(),
            model: "mistral:7b-instruct-q4_K_M".to_string(),
        }
    }
}

/// An endpoint section as written in the file; absent keys keep the
/// provider's default.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EndpointSection {
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
}

impl EndpointSection {
    fn over(self, base: EndpointConfig) -> EndpointConfig {
        EndpointConfig {
            base_url: self.base_url.unwrap_or(base.base_url),
            api_key: self.api_key.unwrap_or(base.api_key),
            model: self.model.unwrap_or(base.model),
        }
    }
}

fn openrouter_endpoint<'de, D>(deserializer: D) -> std::result::Result<EndpointConfig, D::Error>
where
    D: Deserializer<'de>,
{
    EndpointSection::deserialize(deserializer).map(|s| s.over(EndpointConfig::openrouter()))
}

fn self_hosted_endpoint<'de, D>(deserializer: D) -> std::result::Result<EndpointConfig, D::Error>
where
    D: Deserializer<'de>,
{
    EndpointSection::deserialize(deserializer).map(|s| s.over(EndpointConfig::self_hosted()))
}

/// Language model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    #[serde(deserialize_with = "openrouter_endpoint")]
    pub openrouter: EndpointConfig,
    #[serde(deserialize_with = "self_hosted_endpoint")]
    pub self_hosted: EndpointConfig,
    /// Output token budget per completion.
    pub max_tokens: u32,
    pub temperature: f64,
    /// Whole-request timeout for the completion call.
    pub timeout_secs: f64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            openrouter: EndpointConfig::openrouter(),
            self_hosted: EndpointConfig::self_hosted(),
            max_tokens: 512,
            temperature: 0.1,
            timeout_secs: 8.0,
        }
    }
}

impl LlmConfig {
    /// The endpoint selected by `provider`.
    pub fn endpoint(&self) -> &EndpointConfig {
        match self.provider {
            LlmProvider::Openrouter => &self.openrouter,
            LlmProvider::SelfHosted => &self.self_hosted,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.endpoint().base_url
    }

    pub fn api_key(&self) -> &str {
        &self.endpoint().api_key
    }

    pub fn model(&self) -> &str {
        &self.endpoint().model
    }

    /// The request timeout; zero, negative, non-finite or out-of-range
    /// values fall back to the default 8 seconds.
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_secs)
            .ok()
            .filter(|d| !d.is_zero())
            .unwrap_or(Duration::from_secs(8))
    }
}

/// Session memory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Exchanges kept per session; the stored turn count is twice this.
    pub max_turns: usize,
    /// Use the durable SQLite store instead of the in-process map.
    pub persistent: bool,
    pub sqlite_path: String,
    /// Time-to-live of a session after its last write (durable store only).
    pub ttl_secs: u64,
    /// Upper bound on any single store call.
    pub store_timeout_ms: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_turns: 10,
            persistent: false,
            sqlite_path: "airi-memory.db".to_string(),
            ttl_secs: 3600,
            store_timeout_ms: 500,
        }
    }
}

impl MemoryConfig {
    /// Maximum number of stored turns per session.
    pub fn max_stored_turns(&self) -> usize {
        self.max_turns * 2
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

/// Streamed delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Pause between token events.
    pub token_delay_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { token_delay_ms: 40 }
    }
}

impl StreamConfig {
    pub fn token_delay(&self) -> Duration {
        Duration::from_millis(self.token_delay_ms)
    }
}

/// Adjustments to the built-in rule router tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Extra or replacement app name to package mappings. Names are
    /// matched lowercased.
    pub app_packages: BTreeMap<String, String>,
    /// Extra toggle keywords, checked after the built-in ones.
    pub toggle_settings: Vec<String>,
    /// Per-rule overrides, matched by rule name.
    pub rules: Vec<RuleOverride>,
}

/// Replaces parts of a built-in rule. Unset fields keep the built-in value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleOverride {
    pub name: String,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    #[serde(default)]
    pub negative_keywords: Option<Vec<String>>,
    #[serde(default)]
    pub priority: Option<i32>,
}
