// Batch translation through a chat-completion service
//
// - prompt: renders a batch of source strings as a numbered list
// - client: the remote completion boundary and its HTTP implementation
// - parser: aligns the numbered reply back onto the batch

pub mod client;
pub mod parser;
pub mod prompt;

use std::time::Duration;
use tracing::{debug, error, warn};

pub use client::{CompletionClient, OpenAiCompatibleClient};
pub use parser::parse_numbered_reply;
pub use prompt::build_batch_prompt;

use crate::config::TranslateConfig;
use crate::error::{Result, PotransError};

/// Bounded attempts with exponential backoff between them.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), base_delay }
    }

    /// Delay after `failed_attempts` failures: base, 2*base, 4*base, ...
    pub fn delay_after(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

/// Result of translating one batch. A failed batch still carries one
/// (empty) translation per requested text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchTranslation {
    pub translations: Vec<String>,
    pub failed: bool,
}

impl BatchTranslation {
    fn failed(count: usize) -> Self {
        Self {
            translations: vec![String::new(); count],
            failed: true,
        }
    }
}

pub struct Translator {
    client: Box<dyn CompletionClient>,
    system_prompt: String,
    target_language: String,
    retry: RetryPolicy,
}

impl Translator {
    pub fn new(client: Box<dyn CompletionClient>, config: &TranslateConfig) -> Self {
        Self {
            client,
            system_prompt: config.system_prompt.clone(),
            target_language: config.target_language.clone(),
            retry: RetryPolicy::new(config.max_retries, config.retry_base_delay()),
        }
    }

    /// Build the production translator from configuration and the API key
    /// found in the environment.
    pub fn from_config(config: &TranslateConfig) -> Result<Self> {
        let api_key = config.api_key()?;
        let client = OpenAiCompatibleClient::new(config, api_key)?;
        Ok(Self::new(Box::new(client), config))
    }

    /// Send one prompt, retrying failures up to the policy's attempt limit.
    pub async fn complete_with_retry(&self, user_prompt: &str) -> Result<String> {
        let mut last_error = None;

        for attempt in 1..=self.retry.max_attempts {
            match self.client.complete(&self.system_prompt, user_prompt).await {
                Ok(reply) => return Ok(reply),
                Err(e) => {
                    warn!("Attempt {}/{} failed: {}", attempt, self.retry.max_attempts, e);
                    last_error = Some(e);
                }
            }

            if attempt < self.retry.max_attempts {
                let delay = self.retry.delay_after(attempt);
                debug!("Retrying in {:?}", delay);
                tokio::time::sleep(delay).await;
            }
        }

        Err(PotransError::Translation(format!(
            "Failed to translate batch after {} attempts: {}",
            self.retry.max_attempts,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    /// Translate a batch of source strings. Never fails: once retries are
    /// exhausted the batch is reported as failed with empty translations.
    pub async fn translate_batch(&self, texts: &[String]) -> BatchTranslation {
        if texts.is_empty() {
            return BatchTranslation { translations: Vec::new(), failed: false };
        }

        let prompt = build_batch_prompt(texts, &self.target_language);
        debug!("Batch prompt:\n{}", prompt);

        match self.complete_with_retry(&prompt).await {
            Ok(reply) => {
                debug!("Batch reply:\n{}", reply);
                BatchTranslation {
                    translations: parse_numbered_reply(&reply, texts.len()),
                    failed: false,
                }
            }
            Err(e) => {
                error!("{}", e);
                BatchTranslation::failed(texts.len())
            }
        }
    }
}
