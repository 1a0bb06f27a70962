use crate::error::{RagError, Result};
use crate::llm::{ChatMessage, GenerationParameters, TextGenerator};
use crate::memory::ConversationTurn;
use std::sync::Arc;
use tracing::debug;

/// Rewrites follow-up questions into standalone ones using prior turns.
pub struct QuestionCondenser {
    generator: Arc<dyn TextGenerator>,
    parameters: GenerationParameters,
}

impl QuestionCondenser {
    pub fn new(generator: Arc<dyn TextGenerator>, parameters: GenerationParameters) -> Self {
        Self {
            generator,
            parameters,
        }
    }

    pub async fn condense(&self, question: &str, history: &[ConversationTurn]) -> Result<String> {
        if history.is_empty() {
            return Ok(question.to_string());
        }

        let prompt = condense_prompt(question, history);
        let raw = self
            .generator
            .generate(vec![ChatMessage::user(prompt)], &self.parameters)
            .await?;

        let rewritten = clean_rewrite(&raw);
        if rewritten.is_empty() {
            return Err(RagError::ExternalService(
                "model returned an empty rewritten question".into(),
            ));
        }
        debug!(original = question, rewritten = %rewritten, "question condensed");
        Ok(rewritten)
    }
}

fn condense_prompt(question: &str, history: &[ConversationTurn]) -> String {
    let mut transcript = String::new();
    for turn in history {
        transcript.push_str(&format!(
            "Human: {}\nAssistant: {}\n",
            turn.question, turn.answer
        ));
    }
    format!(
        "Previous conversation:\n{transcript}\n\
         Rewrite the follow-up question so it can be understood without the conversation. \
         Answer only with the new question.\n\n\
         How would you ask the question considering the previous conversation: {question}\n\n\
         Question:"
    )
}

fn clean_rewrite(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix("Question:")
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use crate::testing::ScriptedGenerator;

    fn history() -> Vec<ConversationTurn> {
        vec![ConversationTurn {
            question: "What is the capital of France?".into(),
            answer: "Paris".into(),
        }]
    }

    #[tokio::test]
    async fn test_empty_history_is_identity_without_model_call() {
        let generator = Arc::new(ScriptedGenerator::replying("unused"));
        let condenser = QuestionCondenser::new(generator.clone(), GenerationParameters::default());
        for q in ["What about Germany?", "x", "  padded  "] {
            assert_eq!(condenser.condense(q, &[]).await.unwrap(), q);
        }
        assert!(generator.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_history_is_sent_and_rewrite_cleaned() {
        let generator = Arc::new(ScriptedGenerator::replying(
            " Question: What is the capital of Germany?\n",
        ));
        let condenser = QuestionCondenser::new(generator.clone(), GenerationParameters::default());
        let rewritten = condenser
            .condense("What about Germany?", &history())
            .await
            .unwrap();
        assert_eq!(rewritten, "What is the capital of Germany?");

        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Human: What is the capital of France?"));
        assert!(prompts[0].contains("Assistant: Paris"));
        assert!(prompts[0].contains("What about Germany?"));
    }

    #[tokio::test]
    async fn test_model_failure_propagates() {
        let generator = Arc::new(ScriptedGenerator::new(|_| {
            Err(LlmError::Api {
                status: 500,
                message: "boom".into(),
            })
        }));
        let condenser = QuestionCondenser::new(generator, GenerationParameters::default());
        let err = condenser
            .condense("What about Germany?", &history())
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::ExternalService(_)));
    }

    #[tokio::test]
    async fn test_blank_rewrite_is_an_error() {
        let generator = Arc::new(ScriptedGenerator::replying("Question:   "));
        let condenser = QuestionCondenser::new(generator, GenerationParameters::default());
        assert!(condenser.condense("And?", &history()).await.is_err());
    }
}
