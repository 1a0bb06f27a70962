pub mod claude;
pub mod openai;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Sampling parameters sent with every generation call.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct GenerationParameters {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub stop_sequences: Vec<String>,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_k: 250,
            top_p: 0.9,
            max_tokens: 512,
            stop_sequences: vec!["\n\nHuman:".to_string()],
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub model: String,
    pub parameters: GenerationParameters,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatResponse {
    pub content: String,
}

/// Text generation capability consumed by the condenser and the composer.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        messages: Vec<ChatMessage>,
        parameters: &GenerationParameters,
    ) -> Result<String, LlmError>;
}

/// Unified LLM provider enum, dispatching to OpenAI-compatible or Claude backends.
#[derive(Debug, Clone)]
pub enum Provider {
    OpenAi(openai::OpenAiConfig),
    Claude(claude::ClaudeConfig),
    Ollama(openai::OpenAiConfig),
}

impl Provider {
    pub fn openai(api_key: String, base_url: Option<String>) -> Self {
        Provider::OpenAi(openai::OpenAiConfig {
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
        })
    }

    pub fn claude(api_key: String, base_url: Option<String>) -> Self {
        Provider::Claude(claude::ClaudeConfig {
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.anthropic.com".to_string()),
        })
    }

    /// Accepts the bare host (`http://localhost:11434`) or its `/v1` form.
    pub fn ollama(host: String) -> Self {
        let host = host.trim_end_matches('/');
        let host = host.strip_suffix("/v1").unwrap_or(host);
        Provider::Ollama(openai::OpenAiConfig {
            api_key: String::new(),
            base_url: format!("{}/v1", host.trim_end_matches('/')),
        })
    }

    /// Endpoint settings when the provider speaks the OpenAI wire format.
    pub fn openai_compatible(&self) -> Option<&openai::OpenAiConfig> {
        match self {
            Provider::OpenAi(config) | Provider::Ollama(config) => Some(config),
            Provider::Claude(_) => None,
        }
    }

    pub async fn chat(&self, http: &Client, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        match self {
            Provider::OpenAi(config) | Provider::Ollama(config) => {
                openai::chat(http, config, request).await
            }
            Provider::Claude(config) => claude::chat(http, config, request).await,
        }
    }
}

/// A provider bound to one model and a shared HTTP client.
pub struct LlmClient {
    http: Client,
    provider: Provider,
    model: String,
}

impl LlmClient {
    pub fn new(http: Client, provider: Provider, model: String) -> Self {
        Self {
            http,
            provider,
            model,
        }
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(
        &self,
        messages: Vec<ChatMessage>,
        parameters: &GenerationParameters,
    ) -> Result<String, LlmError> {
        let request = ChatRequest {
            messages,
            model: self.model.clone(),
            parameters: parameters.clone(),
        };
        let response = self.provider.chat(&self.http, &request).await?;
        Ok(response.content)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_parameters_match_request_contract() {
        let params = GenerationParameters::default();
        assert_eq!(params.max_tokens, 512);
        assert_eq!(params.top_k, 250);
        assert_eq!(params.stop_sequences, vec!["\n\nHuman:".to_string()]);
    }

    #[test]
    fn test_partial_parameters_fill_defaults() {
        let params: GenerationParameters =
            serde_json::from_str(r#"{"temperature": 0.7}"#).unwrap();
        assert!((params.temperature - 0.7).abs() < 1e-6);
        assert!((params.top_p - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_ollama_base_url() {
        for host in [
            "http://localhost:11434",
            "http://localhost:11434/",
            "http://localhost:11434/v1",
            "http://localhost:11434/v1/",
        ] {
            match Provider::ollama(host.into()) {
                Provider::Ollama(config) => {
                    assert_eq!(config.base_url, "http://localhost:11434/v1", "host {}", host)
                }
                other => panic!("unexpected provider: {:?}", other),
            }
        }
    }

    #[test]
    fn test_openai_compatible_excludes_claude() {
        assert!(Provider::claude("key".into(), None).openai_compatible().is_none());
        let provider = Provider::openai("key".into(), Some("http://proxy/v1".into()));
        assert_eq!(provider.openai_compatible().unwrap().base_url, "http://proxy/v1");
    }
}
