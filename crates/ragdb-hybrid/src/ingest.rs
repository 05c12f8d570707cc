//! Document ingestion: extract, chunk, normalize, embed and store uploaded files.
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use ragdb_core::chunker::{ChunkSpan, Chunker};
use ragdb_core::config::RetrievalSettings;
use ragdb_core::error::{Error, Result};
use ragdb_core::traits::{Embedder, IndexStore};
use ragdb_core::types::{Chunk, DocumentInfo};
use ragdb_text::{normalize, term_frequencies};

use crate::extract::extract_text;

pub const ALLOWED_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "csv", "json", "html", "htm"];

/// One file handed to [`Ingestor::upload`].
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub filename: String,
    pub content: Vec<u8>,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self { filename: filename.into(), content: content.into() }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::InvalidRequest(format!("not a file: {}", path.display())))?;
        Ok(Self { filename, content: std::fs::read(path)? })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedFile {
    pub filename: String,
    pub document_id: String,
    pub chunks: usize,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileError {
    pub filename: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReport {
    pub success: bool,
    pub processed: Vec<ProcessedFile>,
    pub errors: Vec<FileError>,
    pub total_processed: usize,
    pub total_errors: usize,
}

pub struct Ingestor {
    store: Arc<dyn IndexStore>,
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
}

impl Ingestor {
    pub fn new(store: Arc<dyn IndexStore>, embedder: Arc<dyn Embedder>, settings: &RetrievalSettings) -> Self {
        Self { store, embedder, chunker: Chunker::new(settings.chunk_size, settings.chunk_overlap) }
    }

    pub fn upload(&self, index: &str, files: Vec<UploadFile>) -> Result<UploadReport> {
        self.upload_with(index, files, |_, _| {})
    }

    /// Like [`upload`](Self::upload), calling `on_file` after each file.
    /// A missing index fails the call; per-file failures land in the report.
    pub fn upload_with<F>(&self, index: &str, files: Vec<UploadFile>, mut on_file: F) -> Result<UploadReport>
    where
        F: FnMut(&str, std::result::Result<&ProcessedFile, &FileError>),
    {
        self.store.get_index(index)?;
        let mut report = UploadReport::default();
        for file in files {
            match self.ingest_one(index, &file) {
                Ok(done) => {
                    on_file(&file.filename, Ok(&done));
                    report.processed.push(done);
                }
                Err(e) => {
                    tracing::warn!(index, file = %file.filename, error = %e, "upload failed");
                    let failed = FileError { filename: file.filename.clone(), error: e.display_message() };
                    on_file(&file.filename, Err(&failed));
                    report.errors.push(failed);
                }
            }
        }
        report.total_processed = report.processed.len();
        report.total_errors = report.errors.len();
        report.success = report.total_processed > 0 || report.total_errors == 0;
        tracing::info!(index, processed = report.total_processed, errors = report.total_errors, "upload finished");
        Ok(report)
    }

    fn ingest_one(&self, index: &str, file: &UploadFile) -> Result<ProcessedFile> {
        let extension = Path::new(&file.filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(Error::InvalidRequest(format!(
                "unsupported file type '{}'; allowed: {}",
                file.filename,
                ALLOWED_EXTENSIONS.join(", ")
            )));
        }

        let text = extract_text(&extension, &file.content);
        let spans: Vec<ChunkSpan> = self.chunker.chunks(&text).collect();
        if spans.is_empty() {
            return Err(Error::InvalidRequest(format!("'{}' contains no text", file.filename)));
        }

        let uploaded_at = Utc::now();
        let doc_id = document_id(&file.filename, &uploaded_at.to_rfc3339(), &file.content);
        let texts: Vec<String> = spans.iter().map(|s| s.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).map_err(|e| Error::EmbeddingFailure(format!("{e:#}")))?;
        if embeddings.len() != spans.len() {
            return Err(Error::EmbeddingFailure(format!(
                "expected {} embeddings, got {}",
                spans.len(),
                embeddings.len()
            )));
        }

        let chunks: Vec<Chunk> = spans
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (span, embedding))| {
                let tokens = normalize(&span.text);
                let metadata = HashMap::from([
                    ("start_sentence".to_string(), span.start_sentence.to_string()),
                    ("end_sentence".to_string(), span.end_sentence.to_string()),
                    ("word_count".to_string(), span.word_count.to_string()),
                ]);
                Chunk {
                    id: format!("{doc_id}:{i}"),
                    doc_id: doc_id.clone(),
                    document_name: file.filename.clone(),
                    chunk_index: i,
                    term_freqs: term_frequencies(&tokens),
                    tokens,
                    text: span.text,
                    embedding,
                    metadata,
                }
            })
            .collect();

        let size = file.content.len() as u64;
        let processed = ProcessedFile {
            filename: file.filename.clone(),
            document_id: doc_id.clone(),
            chunks: chunks.len(),
            size,
        };
        let document = DocumentInfo {
            id: doc_id,
            filename: file.filename.clone(),
            size,
            chunks: chunks.len(),
            uploaded_at,
            metadata: HashMap::from([("extension".to_string(), extension)]),
        };
        self.store.add_document(index, document, chunks)?;
        Ok(processed)
    }
}

fn document_id(filename: &str, uploaded_at: &str, content: &[u8]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(filename.as_bytes());
    hasher.update(uploaded_at.as_bytes());
    hasher.update(content);
    hasher.finalize().to_hex().as_str()[..16].to_string()
}
