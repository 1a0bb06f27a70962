use crate::error::Result;
use crate::llm::{ChatMessage, GenerationParameters, TextGenerator};
use crate::retriever::ScoredChunk;
use std::sync::Arc;

/// Returned when the context does not contain the answer.
pub const REFUSAL: &str = "Sorry, I don't know.";

/// Produces answers grounded strictly in retrieved chunks.
pub struct AnswerComposer {
    generator: Arc<dyn TextGenerator>,
}

impl AnswerComposer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub async fn compose(
        &self,
        question: &str,
        chunks: &[ScoredChunk],
        parameters: &GenerationParameters,
    ) -> Result<String> {
        // Nothing to ground an answer on.
        if chunks.is_empty() {
            return Ok(REFUSAL.to_string());
        }

        let prompt = answer_prompt(question, chunks);
        let raw = self
            .generator
            .generate(vec![ChatMessage::user(prompt)], parameters)
            .await?;
        Ok(strip_question_tags(&raw))
    }
}

fn answer_prompt(question: &str, chunks: &[ScoredChunk]) -> String {
    let context = chunks
        .iter()
        .map(|c| c.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "{context}\n\n\
         Answer the question inside the <q></q> XML tags using only the context above.\n\n\
         <q>{question}</q>\n\n\
         Do not use any XML tags in the answer. \
         If you don't know the answer or if the answer is not in the context say \"{REFUSAL}\""
    )
}

fn strip_question_tags(raw: &str) -> String {
    raw.replace("<q>", "").replace("</q>", "").trim().to_string()
}
