//! In-process stand-ins for the embedding and generation services.

use crate::embedding::Embedder;
use crate::llm::{ChatMessage, GenerationParameters, LlmError, TextGenerator};
use async_trait::async_trait;
use std::sync::Mutex;

const DIMENSIONS: usize = 256;

/// Bag-of-words embedder: every distinct lowercase word gets its own dimension.
#[derive(Default)]
pub struct FakeEmbedder {
    vocabulary: Mutex<Vec<String>>,
    pub calls: Mutex<Vec<String>>,
    pub fail: bool,
}

impl FakeEmbedder {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let mut vocabulary = self.vocabulary.lock().unwrap();
        let mut vector = vec![0.0; DIMENSIONS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
        {
            let index = match vocabulary.iter().position(|v| *v == word) {
                Some(index) => index,
                None => {
                    vocabulary.push(word);
                    vocabulary.len() - 1
                }
            };
            vector[index] += 1.0;
        }
        vector
    }

    pub fn queries(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if self.fail {
            return Err(LlmError::Api {
                status: 503,
                message: "embedding model unavailable".into(),
            });
        }
        self.calls.lock().unwrap().extend(texts.iter().cloned());
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

type Script = Box<dyn Fn(&str) -> Result<String, LlmError> + Send + Sync>;

/// Generator that answers from a closure over the prompt and records every call.
pub struct ScriptedGenerator {
    script: Script,
    pub calls: Mutex<Vec<(Vec<ChatMessage>, GenerationParameters)>>,
}

impl ScriptedGenerator {
    pub fn new(script: impl Fn(&str) -> Result<String, LlmError> + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(answer: &str) -> Self {
        let answer = answer.to_string();
        Self::new(move |_| Ok(answer.clone()))
    }

    pub fn prompts(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(messages, _)| messages.last().map(|m| m.content.clone()))
            .collect()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        messages: Vec<ChatMessage>,
        parameters: &GenerationParameters,
    ) -> Result<String, LlmError> {
        let prompt = messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.calls
            .lock()
            .unwrap()
            .push((messages, parameters.clone()));
        (self.script)(&prompt)
    }
}
