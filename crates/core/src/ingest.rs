use crate::chunking::{build_chunks, ChunkingConfig};
use crate::error::IngestError;
use crate::extractor::{LopdfExtractor, PdfExtractor};
use crate::models::{DocumentFingerprint, PageText, PdfChunk};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone)]
pub struct IngestedDocument {
    pub fingerprint: DocumentFingerprint,
    pub pages: Vec<PageText>,
    pub chunks: Vec<PdfChunk>,
}

impl IngestedDocument {
    /// All page texts joined by newlines, in page order.
    pub fn full_text(&self) -> String {
        self.pages
            .iter()
            .map(|page| page.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Re-splits the already extracted pages with a different configuration.
    pub fn rechunk(&self, config: ChunkingConfig) -> Vec<PdfChunk> {
        build_chunks(&self.fingerprint, &self.pages, config)
    }
}

pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Loads the PDF at `path`, registered under `document_id`, and splits it into chunks.
pub fn ingest_pdf(
    path: &Path,
    document_id: &str,
    config: ChunkingConfig,
) -> Result<IngestedDocument, IngestError> {
    ingest_pdf_with(&LopdfExtractor, path, document_id, config)
}

pub fn ingest_pdf_with<X: PdfExtractor>(
    extractor: &X,
    path: &Path,
    document_id: &str,
    config: ChunkingConfig,
) -> Result<IngestedDocument, IngestError> {
    let checksum = digest_file(path)?;
    let pages = extractor.extract_pages(path)?;

    let fingerprint = DocumentFingerprint {
        document_id: document_id.to_string(),
        source_path: path.to_string_lossy().to_string(),
        checksum,
        page_count: pages.len(),
        ingested_at: Utc::now(),
    };
    let chunks = build_chunks(&fingerprint, &pages, config);

    info!(
        document_id = %fingerprint.document_id,
        pages = pages.len(),
        chunks = chunks.len(),
        "pdf ingested"
    );

    Ok(IngestedDocument {
        fingerprint,
        pages,
        chunks,
    })
}

/// Runs [`ingest_pdf`] on the blocking pool; lopdf parsing is CPU-bound.
pub async fn ingest_pdf_blocking(
    path: PathBuf,
    document_id: String,
    config: ChunkingConfig,
) -> Result<IngestedDocument, IngestError> {
    tokio::task::spawn_blocking(move || ingest_pdf(&path, &document_id, config))
        .await
        .map_err(|error| IngestError::Task(error.to_string()))?
}
