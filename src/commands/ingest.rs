use crate::config::Config;
use crate::db::Database;
use crate::doc_processor;
use std::path::PathBuf;
use tracing::info;

pub async fn run(config: &Config, files: &[PathBuf], source: Option<&str>) -> anyhow::Result<()> {
    let db = Database::open(&config.index_path)?;
    let embedder = config.embedder(config.http_client()?);

    for path in files {
        let doc = doc_processor::ingest_file(&db, &embedder, path, source).await?;
        println!("{} -> {} ({})", path.display(), doc.id, doc.source);
    }
    info!(index = %config.index_path.display(), files = files.len(), "ingestion finished");
    Ok(())
}
