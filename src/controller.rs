//! Per-request pipeline: session → history → condense → retrieve → compose → remember.

use crate::composer::AnswerComposer;
use crate::condenser::QuestionCondenser;
use crate::error::{RagError, Result};
use crate::llm::GenerationParameters;
use crate::memory::{ConversationMemory, ConversationTurn};
use crate::retriever::Retriever;
use crate::session::{conversation_key, SessionStore, TenantIdentity};
use serde::{Deserialize, Serialize};
use tracing::info;

fn default_max_matching_docs() -> i64 {
    3
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AskRequest {
    #[serde(alias = "q")]
    pub query: String,
    /// The `tenant:user` identity the session is tracked under.
    #[serde(alias = "user_session_id")]
    pub tenant_session_id: String,
    #[serde(default = "default_max_matching_docs")]
    pub max_matching_docs: i64,
    #[serde(default)]
    pub generation_parameters: GenerationParameters,
    #[serde(default)]
    pub verbose: bool,
}

impl AskRequest {
    pub fn new(query: impl Into<String>, tenant_session_id: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            tenant_session_id: tenant_session_id.into(),
            max_matching_docs: default_max_matching_docs(),
            generation_parameters: GenerationParameters::default(),
            verbose: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AskResponse {
    pub question: String,
    pub answer: String,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
}

pub struct TurnController {
    sessions: SessionStore,
    memory: ConversationMemory,
    condenser: QuestionCondenser,
    retriever: Retriever,
    composer: AnswerComposer,
}

impl TurnController {
    pub fn new(
        sessions: SessionStore,
        memory: ConversationMemory,
        condenser: QuestionCondenser,
        retriever: Retriever,
        composer: AnswerComposer,
    ) -> Self {
        Self {
            sessions,
            memory,
            condenser,
            retriever,
            composer,
        }
    }

    pub async fn handle(&self, request: &AskRequest) -> Result<AskResponse> {
        self.handle_at(request, chrono::Utc::now().timestamp()).await
    }

    /// Runs one turn as of `now` (seconds since the epoch).
    pub async fn handle_at(&self, request: &AskRequest, now: i64) -> Result<AskResponse> {
        let (identity, k) = validate(request)?;

        let (session, transition) = self.sessions.resolve(&identity, now)?;
        let key = conversation_key(&session);
        let history = self.memory.history(&key)?;

        let standalone = self.condenser.condense(&request.query, &history).await?;
        let chunks = self.retriever.search(&standalone, k).await?;
        let answer = self
            .composer
            .compose(&standalone, &chunks, &request.generation_parameters)
            .await?;

        self.memory.append(
            &key,
            &ConversationTurn {
                question: request.query.clone(),
                answer: answer.clone(),
            },
        )?;

        info!(
            identity = %identity,
            transition = ?transition,
            prior_turns = history.len(),
            chunks = chunks.len(),
            "turn complete"
        );

        let sources = request.verbose.then(|| {
            let mut sources: Vec<String> = Vec::new();
            for c in &chunks {
                if !sources.contains(&c.chunk.source) {
                    sources.push(c.chunk.source.clone());
                }
            }
            sources
        });

        Ok(AskResponse {
            question: request.query.clone(),
            answer,
            session_id: session.session_id,
            sources,
        })
    }

    /// Conversation so far in `identity`'s current session, oldest first.
    /// Read-only: an unknown identity yields an empty transcript and no session.
    pub fn transcript(&self, identity: &TenantIdentity) -> Result<Vec<ConversationTurn>> {
        match self.sessions.get(identity)? {
            Some(session) => self.memory.history(&conversation_key(&session)),
            None => Ok(Vec::new()),
        }
    }
}

fn validate(request: &AskRequest) -> Result<(TenantIdentity, usize)> {
    if request.query.trim().is_empty() {
        return Err(RagError::Validation("query is empty".into()));
    }
    if request.max_matching_docs <= 0 {
        return Err(RagError::Validation(format!(
            "max_matching_docs must be positive, got {}",
            request.max_matching_docs
        )));
    }
    let identity = TenantIdentity::from_key(&request.tenant_session_id)?;
    Ok((identity, request.max_matching_docs as usize))
}
