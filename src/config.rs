//! Server configuration.
//!
//! Sources, highest priority first: CLI flags (applied by the caller),
//! environment variables, a TOML file, built-in defaults.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ToolweaveError;

pub const DEFAULT_LLM_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_JOB_TIMEOUT_SECS: u64 = 1800;

/// Settings for the LLM endpoint that individual tools call.
///
/// The core never talks to the LLM itself; it only hands this to tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub default_model: String,
    /// Per-task model overrides, e.g. `"research" = "perplexity/sonar"`.
    pub models: HashMap<String, String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            api_key: None,
            default_model: DEFAULT_MODEL.to_string(),
            models: HashMap::new(),
        }
    }
}

impl LlmConfig {
    /// Model for a task, falling back to the default model.
    pub fn model_for(&self, task: &str) -> &str {
        self.models
            .get(task)
            .map(String::as_str)
            .unwrap_or(&self.default_model)
    }
}

/// Configuration handed to every tool invocation and used to build services.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub llm: LlmConfig,
    /// Deadline for a single tool invocation, in seconds. 0 disables it.
    pub tool_timeout_secs: u64,
    /// Deadline for a background job, in seconds. 0 disables it.
    pub job_timeout_secs: u64,
    pub workflows_path: Option<PathBuf>,
    /// Address for the HTTP event stream, e.g. `127.0.0.1:3911`.
    pub events_addr: Option<String>,
    /// Session id used for invocations that do not bring their own.
    pub session_id: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            tool_timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
            job_timeout_secs: DEFAULT_JOB_TIMEOUT_SECS,
            workflows_path: None,
            events_addr: None,
            session_id: "local".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn tool_timeout(&self) -> Option<Duration> {
        (self.tool_timeout_secs > 0).then(|| Duration::from_secs(self.tool_timeout_secs))
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        (self.job_timeout_secs > 0).then(|| Duration::from_secs(self.job_timeout_secs))
    }

    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ToolweaveError> {
        toml::from_str(text).map_err(|e| ToolweaveError::Config(e.to_string()))
    }

    /// Load configuration.
    ///
    /// File priority: explicit path > TOOLWEAVE_CONFIG env > ~/.config/toolweave/config.toml.
    /// An explicit path that does not exist is an error; the implicit default
    /// location is optional.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ToolweaveError> {
        let env_path = std::env::var("TOOLWEAVE_CONFIG").ok().map(PathBuf::from);
        let required = explicit_path.is_some() || env_path.is_some();
        let path = explicit_path
            .map(Path::to_path_buf)
            .or(env_path)
            .or_else(default_config_path);

        let mut config = match path {
            Some(path) if path.exists() => {
                let text = std::fs::read_to_string(&path).map_err(|source| ToolweaveError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                tracing::info!("Loaded configuration from {}", path.display());
                Self::from_toml_str(&text)?
            }
            Some(path) if required => {
                return Err(ToolweaveError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )))
            }
            _ => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply environment overrides through a lookup function.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("TOOLWEAVE_LLM_API_KEY").or_else(|| lookup("OPENROUTER_API_KEY"))
        {
            self.llm.api_key = Some(key);
        }
        if let Some(url) = lookup("TOOLWEAVE_LLM_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(model) = lookup("TOOLWEAVE_DEFAULT_MODEL") {
            self.llm.default_model = model;
        }
        if let Some(path) = lookup("TOOLWEAVE_WORKFLOWS") {
            self.workflows_path = Some(PathBuf::from(path));
        }
        if let Some(addr) = lookup("TOOLWEAVE_EVENTS_ADDR") {
            self.events_addr = Some(addr);
        }
        if let Some(secs) = lookup("TOOLWEAVE_TOOL_TIMEOUT_SECS") {
            match secs.parse() {
                Ok(v) => self.tool_timeout_secs = v,
                Err(_) => tracing::warn!("Ignoring invalid TOOLWEAVE_TOOL_TIMEOUT_SECS: {}", secs),
            }
        }
        if let Some(secs) = lookup("TOOLWEAVE_JOB_TIMEOUT_SECS") {
            match secs.parse() {
                Ok(v) => self.job_timeout_secs = v,
                Err(_) => tracing::warn!("Ignoring invalid TOOLWEAVE_JOB_TIMEOUT_SECS: {}", secs),
            }
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("toolweave").join("config.toml"))
}
