use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::error::{Result, PotransError};

const DEFAULT_SYSTEM_PROMPT: &str = "You are a professional translator specializing in Traditional Chinese translations for website UI. Maintain accuracy and natural language flow.";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub translate: TranslateConfig,
    pub batch: BatchConfig,
    pub files: FilesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateConfig {
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`)
    pub endpoint: String,
    /// Model identifier sent with every request
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    /// Sampling temperature, kept low for stable output
    pub temperature: f32,
    /// Total attempts per batch, including the first one
    pub max_retries: u32,
    /// Delay before the second attempt; doubles on every further retry
    pub retry_base_delay_ms: u64,
    /// Per-request timeout handed to the HTTP client
    pub request_timeout_secs: u64,
    /// Human readable target language used in the prompt
    pub target_language: String,
    /// System message sent ahead of every batch prompt
    pub system_prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum number of unique strings per request
    pub batch_size: usize,
    /// Only the first `limit` entries of each catalog are considered
    pub limit: Option<usize>,
    /// Pause after each remote batch to stay under rate limits
    pub inter_batch_delay_ms: u64,
    /// What to do with strings whose translation came back empty
    pub failure_policy: FailurePolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Leave the entry untranslated so that a later run picks it up again
    Skip,
    /// Accept the empty string as the translation for this run
    WriteEmpty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Catalog extensions picked up from `source_dir` (case-insensitive)
    pub extensions: Vec<String>,
    /// Appended to the input file stem, e.g. `.zh_TW`
    pub output_suffix: String,
    pub output_extension: String,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.deepseek.com/v1".to_string(),
            model: "deepseek-chat".to_string(),
            api_key_env: "DEEPSEEK_API_KEY".to_string(),
            temperature: 0.3,
            max_retries: 3,
            retry_base_delay_ms: 1000,
            request_timeout_secs: 120,
            target_language: "Traditional Chinese".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            limit: None,
            inter_batch_delay_ms: 2000,
            failure_policy: FailurePolicy::Skip,
        }
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("source"),
            output_dir: PathBuf::from("output"),
            extensions: vec!["po".to_string(), "pot".to_string()],
            output_suffix: String::new(),
            output_extension: "po".to_string(),
        }
    }
}

impl TranslateConfig {
    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Result<String> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
            _ => Err(PotransError::MissingCredential(self.api_key_env.clone())),
        }
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Load `.env` from `dir` or the nearest parent that has one. Variables
/// already set in the process environment are left alone. Returns the file
/// that was loaded.
pub fn load_dotenv(dir: &Path) -> Option<PathBuf> {
    let path = dir.ancestors().map(|d| d.join(".env")).find(|p| p.is_file())?;
    dotenvy::from_path(&path).ok()?;
    Some(path)
}

impl BatchConfig {
    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_millis(self.inter_batch_delay_ms)
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PotransError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| PotransError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| PotransError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| PotransError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.batch.batch_size == 0 {
            return Err(PotransError::Config("batch_size must be at least 1".to_string()));
        }
        if self.translate.max_retries == 0 {
            return Err(PotransError::Config("max_retries must be at least 1".to_string()));
        }
        if self.translate.endpoint.trim().is_empty() {
            return Err(PotransError::Config("endpoint must not be empty".to_string()));
        }
        if self.translate.model.trim().is_empty() {
            return Err(PotransError::Config("model must not be empty".to_string()));
        }
        if self.files.extensions.is_empty() {
            return Err(PotransError::Config("at least one catalog extension is required".to_string()));
        }
        Ok(())
    }
}
