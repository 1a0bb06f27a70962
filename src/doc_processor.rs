use crate::db::models::Document;
use crate::db::Database;
use crate::embedding::{embedding_to_bytes, Embedder};
use crate::error::{RagError, Result};
use std::fs;
use std::path::Path;
use tracing::info;

pub const CHUNK_SIZE: usize = 2000;
pub const CHUNK_OVERLAP: usize = 400;
const EMBEDDING_BATCH: usize = 20;

/// Parsed document content
pub struct ParsedDocument {
    /// Independently chunked pieces: one per CSV row, or the whole text.
    pub segments: Vec<String>,
    pub file_type: String,
}

/// Parse a document file into plain text
pub fn parse_file(path: &Path) -> Result<ParsedDocument> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let read = |p: &Path| {
        fs::read_to_string(p)
            .map_err(|e| RagError::Validation(format!("cannot read {}: {}", p.display(), e)))
    };

    match ext.as_str() {
        "csv" => Ok(ParsedDocument {
            segments: csv_rows_as_text(&read(path)?)?,
            file_type: "csv".into(),
        }),
        "txt" => Ok(ParsedDocument {
            segments: vec![read(path)?],
            file_type: "txt".into(),
        }),
        "md" | "markdown" => Ok(ParsedDocument {
            segments: vec![read(path)?],
            file_type: "md".into(),
        }),
        "pdf" => {
            let bytes = fs::read(path)
                .map_err(|e| RagError::Validation(format!("cannot read {}: {}", path.display(), e)))?;
            let content = pdf_extract::extract_text_from_mem(&bytes)
                .map_err(|e| RagError::Validation(format!("PDF parse error: {}", e)))?;
            Ok(ParsedDocument {
                segments: vec![content],
                file_type: "pdf".into(),
            })
        }
        _ => Err(RagError::Validation(format!(
            "Unsupported file type: .{}",
            ext
        ))),
    }
}

/// Renders every data row as `header: value` lines.
pub fn csv_rows_as_text(content: &str) -> Result<Vec<String>> {
    let csv_error = |e: csv::Error| RagError::Validation(format!("CSV parse error: {}", e));
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());
    let headers = reader.headers().map_err(csv_error)?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        let text = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| format!("{}: {}", h, v))
            .collect::<Vec<_>>()
            .join("\n");
        rows.push(text);
    }
    Ok(rows)
}

/// Split text into overlapping chunks for embedding
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return vec![];
    }
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= chunk_size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim().to_string();
        if !chunk.is_empty() {
            chunks.push(chunk);
        }
        if end >= chars.len() {
            break;
        }
        start += step;
    }

    chunks
}

/// Parses, chunks and embeds a file, then stores it in the index database.
pub async fn ingest_file(
    db: &Database,
    embedder: &dyn Embedder,
    path: &Path,
    source: Option<&str>,
) -> Result<Document> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();
    let file_size = fs::metadata(path).map(|m| m.len() as i64).ok();

    let parsed = parse_file(path)?;
    let chunks: Vec<String> = parsed
        .segments
        .iter()
        .flat_map(|s| chunk_text(s, CHUNK_SIZE, CHUNK_OVERLAP))
        .collect();
    if chunks.is_empty() {
        return Err(RagError::Validation(format!(
            "{} is empty or could not be parsed",
            filename
        )));
    }

    let mut rows = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(EMBEDDING_BATCH) {
        let embeddings = embedder.embed(batch).await?;
        for (text, embedding) in batch.iter().zip(embeddings) {
            rows.push((text.clone(), embedding_to_bytes(&embedding)));
        }
    }

    let source = source.unwrap_or(&filename);
    let doc = db.insert_document(&filename, source, &parsed.file_type, file_size, &rows)?;
    info!(document = %doc.id, source, chunks = rows.len(), "document ingested");
    Ok(doc)
}
