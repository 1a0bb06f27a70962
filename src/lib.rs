pub mod commands;
pub mod composer;
pub mod condenser;
pub mod config;
pub mod controller;
pub mod db;
pub mod doc_processor;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod memory;
pub mod retriever;
pub mod session;
#[cfg(test)]
mod testing;

use clap::Parser;
use commands::{Cli, Command};
use composer::AnswerComposer;
use condenser::QuestionCondenser;
use config::Config;
use controller::TurnController;
use db::Database;
use memory::ConversationMemory;
use retriever::{IndexProvider, Retriever};
use session::SessionStore;
use std::sync::Arc;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// Wires every component from `config`. The vector index is loaded eagerly so a
/// missing or corrupt index stops the process before the first request.
pub async fn build_controller(config: &Config) -> error::Result<TurnController> {
    let http = config.http_client()?;
    let generator = Arc::new(config.generator(http.clone())?);
    let embedder = Arc::new(config.embedder(http));

    let index = Arc::new(IndexProvider::new(config.index_path.clone()));
    index.get().await?;

    let db = Arc::new(Database::open(&config.db_path)?);
    info!(db = %config.db_path.display(), "session database ready");

    Ok(TurnController::new(
        SessionStore::new(db.clone()),
        ConversationMemory::new(db),
        QuestionCondenser::new(generator.clone(), config.condense_parameters.clone()),
        Retriever::new(index, embedder, config.retrieval_min_score),
        AnswerComposer::new(generator),
    ))
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Command::Ingest { files, source } => {
            commands::ingest::run(&config, &files, source.as_deref()).await
        }
        Command::Chat {
            tenant,
            user,
            max_matching_docs,
        } => {
            let controller = build_controller(&config).await?;
            commands::chat::run(&controller, &tenant, &user, max_matching_docs).await
        }
        Command::Ask => {
            let controller = build_controller(&config).await?;
            commands::ask::run(&controller).await
        }
    }
}
