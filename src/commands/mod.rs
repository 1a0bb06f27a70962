pub mod ask;
pub mod chat;
pub mod ingest;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "rag-chat", about = "Question answering over a tenant knowledge base")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Chunk, embed and add files (csv, txt, md, pdf) to the vector index
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Provenance label stored with every chunk (defaults to the file name)
        #[arg(long)]
        source: Option<String>,
    },
    /// Interactive conversation as one tenant user
    Chat {
        #[arg(long, env = "TENANT_ID")]
        tenant: String,
        #[arg(long, env = "USER_EMAIL")]
        user: String,
        /// Number of chunks retrieved per question
        #[arg(long, default_value_t = 3)]
        max_matching_docs: i64,
    },
    /// Answer one JSON request read from stdin
    Ask,
}
