use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TranslateConfig;
use crate::error::{Result, PotransError};

/// Remote chat-completion boundary: one system message plus one user
/// message in, the raw completion text out.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiCompatibleClient {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
    api_key: String,
}

impl OpenAiCompatibleClient {
    pub fn new(config: &TranslateConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            api_key,
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatibleClient {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                },
            ],
            temperature: self.temperature,
            stream: false,
        };

        let url = format!("{}/chat/completions", self.endpoint);

        debug!("Sending completion request to: {}", url);

        let response = self.client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| PotransError::Translation(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(PotransError::Translation(format!(
                "Completion API error {}: {}", status, error_text
            )));
        }

        let completion: ChatCompletionResponse = response.json().await
            .map_err(|e| PotransError::Translation(format!("Failed to parse response: {}", e)))?;

        let content = completion.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .unwrap_or_default();

        debug!("Raw completion: {}", content);

        if content.is_empty() {
            return Err(PotransError::Translation("Empty completion received".to_string()));
        }

        Ok(content)
    }
}
