use crate::embedding::OpenAiEmbedder;
use crate::error::{RagError, Result};
use crate::llm::openai::OpenAiConfig;
use crate::llm::{GenerationParameters, LlmClient, Provider};
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;

/// Process-wide settings, read once at startup and handed to each component.
#[derive(Debug, Clone)]
pub struct Config {
    /// Sessions and conversation history.
    pub db_path: PathBuf,
    /// Pre-built chunk/embedding index.
    pub index_path: PathBuf,
    /// `openai`, `claude` or `ollama`.
    pub llm_provider: String,
    pub llm_base_url: Option<String>,
    pub llm_api_key: String,
    pub llm_model: String,
    /// Overrides the embedding endpoint; otherwise an OpenAI-compatible chat
    /// provider's endpoint is reused.
    pub embedding_base_url: Option<String>,
    pub embedding_api_key: String,
    pub embedding_model: String,
    pub request_timeout_secs: u64,
    pub retrieval_min_score: f32,
    /// Sampling parameters for question rewriting.
    pub condense_parameters: GenerationParameters,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let _ = dotenv::dotenv();
        Self::from_lookup(|key| dotenv::var(key).ok().filter(|v| !v.is_empty()))
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let llm_provider = lookup("LLM_PROVIDER")
            .unwrap_or_else(|| "openai".to_string())
            .to_lowercase();
        let llm_api_key = lookup("LLM_API_KEY").unwrap_or_default();
        let llm_base_url = lookup("LLM_BASE_URL");

        Ok(Self {
            db_path: lookup("RAG_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/rag.db")),
            index_path: lookup("RAG_INDEX_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/index.db")),
            embedding_base_url: lookup("EMBEDDING_BASE_URL"),
            embedding_api_key: lookup("EMBEDDING_API_KEY").unwrap_or_else(|| llm_api_key.clone()),
            embedding_model: lookup("EMBEDDING_MODEL")
                .unwrap_or_else(|| "text-embedding-3-small".to_string()),
            llm_model: lookup("LLM_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            request_timeout_secs: parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 120)?,
            retrieval_min_score: parse_or(&lookup, "RETRIEVAL_MIN_SCORE", 0.0)?,
            condense_parameters: GenerationParameters::default(),
            llm_provider,
            llm_api_key,
            llm_base_url,
        })
    }

    pub fn provider(&self) -> Result<Provider> {
        match self.llm_provider.as_str() {
            "openai" => Ok(Provider::openai(
                self.llm_api_key.clone(),
                self.llm_base_url.clone(),
            )),
            "claude" => {
                if self.llm_api_key.is_empty() {
                    return Err(RagError::Config("Claude API key not configured".into()));
                }
                Ok(Provider::claude(
                    self.llm_api_key.clone(),
                    self.llm_base_url.clone(),
                ))
            }
            "ollama" => Ok(Provider::ollama(
                self.llm_base_url
                    .clone()
                    .unwrap_or_else(|| "http://localhost:11434".to_string()),
            )),
            other => Err(RagError::Config(format!("Unknown LLM provider: {}", other))),
        }
    }

    /// HTTP client shared by all outbound calls; its timeout bounds every request.
    pub fn http_client(&self) -> Result<Client> {
        Client::builder()
            .timeout(Duration::from_secs(self.request_timeout_secs))
            .build()
            .map_err(|e| RagError::Config(format!("Failed to create HTTP client: {}", e)))
    }

    pub fn generator(&self, http: Client) -> Result<LlmClient> {
        Ok(LlmClient::new(http, self.provider()?, self.llm_model.clone()))
    }

    /// Resolves the embedding endpoint from the same normalised base URL the
    /// chat provider uses, so `ollama` embeddings land on its `/v1` API.
    pub fn embedding_endpoint(&self) -> OpenAiConfig {
        let base_url = self.embedding_base_url.clone().unwrap_or_else(|| {
            self.provider()
                .ok()
                .and_then(|p| p.openai_compatible().map(|c| c.base_url.clone()))
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string())
        });
        OpenAiConfig {
            api_key: self.embedding_api_key.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn embedder(&self, http: Client) -> OpenAiEmbedder {
        OpenAiEmbedder::new(http, self.embedding_endpoint(), self.embedding_model.clone())
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| RagError::Config(format!("{} has an invalid value: {}", key, raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::embeddings_url;
    use crate::llm::openai;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.db_path, PathBuf::from("./data/rag.db"));
        assert_eq!(config.request_timeout_secs, 120);
        assert_eq!(config.embedding_model, "text-embedding-3-small");
        assert!(matches!(config.provider().unwrap(), Provider::OpenAi(_)));
    }

    fn endpoints(config: &Config) -> (String, String) {
        let chat = match config.provider().unwrap() {
            Provider::Ollama(c) | Provider::OpenAi(c) => openai::chat_url(&c),
            other => panic!("not an OpenAI-compatible provider: {:?}", other),
        };
        (chat, embeddings_url(&config.embedding_endpoint()))
    }

    #[test]
    fn test_ollama_chat_and_embeddings_share_host() {
        for (base_url, host) in [
            (None, "http://localhost:11434"),
            (Some("http://gpu-box:11434"), "http://gpu-box:11434"),
            (Some("http://gpu-box:11434/v1"), "http://gpu-box:11434"),
        ] {
            let mut pairs = vec![("LLM_PROVIDER", "ollama")];
            if let Some(url) = base_url {
                pairs.push(("LLM_BASE_URL", url));
            }
            let (chat, embeddings) = endpoints(&config(&pairs).unwrap());
            assert_eq!(chat, format!("{}/v1/chat/completions", host));
            assert_eq!(embeddings, format!("{}/v1/embeddings", host));
        }
    }

    #[test]
    fn test_openai_proxy_reused_for_embeddings() {
        let config = config(&[("LLM_BASE_URL", "http://proxy.internal/v1/")]).unwrap();
        assert_eq!(config.embedding_endpoint().base_url, "http://proxy.internal/v1");
    }

    #[test]
    fn test_explicit_embedding_url_wins() {
        let config = config(&[
            ("LLM_PROVIDER", "ollama"),
            ("EMBEDDING_BASE_URL", "https://api.openai.com/v1"),
            ("EMBEDDING_API_KEY", "sk-embed"),
        ])
        .unwrap();
        let endpoint = config.embedding_endpoint();
        assert_eq!(endpoint.base_url, "https://api.openai.com/v1");
        assert_eq!(endpoint.api_key, "sk-embed");
    }

    #[test]
    fn test_claude_requires_key() {
        let config = config(&[("LLM_PROVIDER", "Claude")]).unwrap();
        assert!(matches!(config.provider(), Err(RagError::Config(_))));
        assert_eq!(config.embedding_endpoint().base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_bad_numbers_rejected() {
        assert!(config(&[("REQUEST_TIMEOUT_SECS", "soon")]).is_err());
        let config = config(&[("RETRIEVAL_MIN_SCORE", "0.25")]).unwrap();
        assert!((config.retrieval_min_score - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_provider() {
        let config = config(&[("LLM_PROVIDER", "bedrock")]).unwrap();
        assert!(config.provider().is_err());
    }
}
