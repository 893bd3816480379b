use crate::history::HistoryFormat;
use crate::policy::{
    AllowlistPolicy, CommandPolicy, PipelinePolicy, DEFAULT_ALLOWED_COMMANDS, MAX_COMMAND_LENGTH,
};
use crate::runner::DEFAULT_SHELL;
use crate::translator::LlmSettings;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub execution: ExecutionConfig,
    pub history: HistoryConfig,
    pub llm: LlmConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    // Leading program name only
    #[default]
    Allowlist,
    // Every program in pipelines and lists
    Pipeline,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ExecutionConfig {
    pub max_command_length: usize,
    pub allowed_commands: Vec<String>,
    pub shell: String,
    pub policy: PolicyKind,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_command_length: MAX_COMMAND_LENGTH,
            allowed_commands: DEFAULT_ALLOWED_COMMANDS.iter().map(|s| s.to_string()).collect(),
            shell: DEFAULT_SHELL.to_string(),
            policy: PolicyKind::default(),
        }
    }
}

impl ExecutionConfig {
    pub fn build_policy(&self) -> Result<Box<dyn CommandPolicy>> {
        let allowlist = AllowlistPolicy::new(&self.allowed_commands, self.max_command_length);
        Ok(match self.policy {
            PolicyKind::Allowlist => Box::new(allowlist),
            PolicyKind::Pipeline => Box::new(PipelinePolicy::new(allowlist)?),
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct HistoryConfig {
    // Defaults to ~/.cmdai/command_history.json
    pub file: Option<PathBuf>,
    pub format: HistoryFormat,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub api_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    // Prefer OPENAI_API_KEY / CMDAI_API_KEY over storing a key here
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4-turbo-preview".to_string(),
            temperature: 0.7,
            timeout_secs: 60,
            api_key: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DisplayConfig {
    pub language: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            language: "auto".to_string(),
        }
    }
}

impl Config {
    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_path();

        let mut config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            let config = Config::default();
            config.save_to(&config_path)?;
            config
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(config_dir) = path.parent() {
            fs::create_dir_all(config_dir)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Environment wins over the file. `lookup` is `std::env::var` outside tests.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(file) = var("CMDAI_HISTORY_FILE") {
            self.history.file = Some(PathBuf::from(file));
        }
        if let Some(model) = var("CMDAI_MODEL") {
            self.llm.model = model;
        }
        if let Some(url) = var("CMDAI_API_URL") {
            self.llm.api_url = url;
        }
        if let Some(key) = var("CMDAI_API_KEY").or_else(|| var("OPENAI_API_KEY")) {
            self.llm.api_key = Some(key);
        }
        if let Some(lang) = var("CMDAI_LANG") {
            self.display.language = lang;
        }
    }

    pub fn base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".cmdai")
    }

    fn get_config_path() -> PathBuf {
        Self::base_dir().join("config.toml")
    }

    pub fn history_path(&self) -> PathBuf {
        self.history
            .file
            .clone()
            .unwrap_or_else(|| Self::base_dir().join("command_history.json"))
    }

    pub fn llm_settings(&self) -> LlmSettings {
        LlmSettings {
            api_key: self.llm.api_key.clone().unwrap_or_default(),
            api_url: self.llm.api_url.clone(),
            model: self.llm.model.clone(),
            temperature: self.llm.temperature,
            timeout: Duration::from_secs(self.llm.timeout_secs),
        }
    }

    pub fn get_effective_language(&self) -> String {
        if self.display.language == "auto" {
            // Try to get system language
            std::env::var("LANG")
                .unwrap_or_else(|_| "en_US".to_string())
                .split('.')
                .next()
                .unwrap_or("en")
                .to_string()
        } else {
            self.display.language.clone()
        }
    }
}
