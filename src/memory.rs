use crate::db::Database;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
}

/// Append-only question/answer log, one per conversation key.
pub struct ConversationMemory {
    db: Arc<Database>,
}

impl ConversationMemory {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn append(&self, conversation_key: &str, turn: &ConversationTurn) -> Result<()> {
        self.db
            .add_exchange(conversation_key, &turn.question, &turn.answer)?;
        Ok(())
    }

    /// Turns in insertion order, oldest first.
    pub fn history(&self, conversation_key: &str) -> Result<Vec<ConversationTurn>> {
        let messages = self.db.get_messages(conversation_key)?;
        let mut turns = Vec::with_capacity(messages.len() / 2);
        let mut pending: Option<String> = None;
        for message in messages {
            match message.role.as_str() {
                "user" => pending = Some(message.content),
                _ => {
                    if let Some(question) = pending.take() {
                        turns.push(ConversationTurn {
                            question,
                            answer: message.content,
                        });
                    }
                }
            }
        }
        Ok(turns)
    }
}

/// Plain-text transcript: question line, answer line, blank separator.
pub fn render_transcript(turns: &[ConversationTurn]) -> String {
    turns
        .iter()
        .map(|t| format!("{}\n{}\n\n", t.question, t.answer))
        .collect()
}
