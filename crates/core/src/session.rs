use crate::chunking::ChunkingConfig;
use crate::embeddings::Embedder;
use crate::error::{IngestError, SessionError};
use crate::history::ConversationHistory;
use crate::ingest::{ingest_pdf_blocking, IngestedDocument};
use crate::llm::LanguageModel;
use crate::models::{Answer, DocumentFingerprint, PdfChunk, Settings};
use crate::retriever::ConversationalRetriever;
use crate::store::{build_index, MemoryVectorIndex};
use crate::summarizer::Summarizer;
use crate::traits::VectorIndex;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub document: IngestedDocument,
    pub index: MemoryVectorIndex,
    pub summary: String,
}

impl LoadedDocument {
    pub fn fingerprint(&self) -> &DocumentFingerprint {
        &self.document.fingerprint
    }
}

#[derive(Debug, Clone)]
pub struct UploadReport {
    pub document_id: String,
    pub page_count: usize,
    pub chunk_count: usize,
    pub history_reset: bool,
    pub summary_error: Option<String>,
}

pub struct Session {
    id: Uuid,
    settings: Settings,
    llm: Box<dyn LanguageModel>,
    embedder: Box<dyn Embedder>,
    summarizer: Summarizer,
    staging_dir: Option<PathBuf>,
    document: Option<LoadedDocument>,
    history: ConversationHistory,
}

impl Session {
    pub fn new(
        settings: Settings,
        llm: Box<dyn LanguageModel>,
        embedder: Box<dyn Embedder>,
    ) -> Result<Self, SessionError> {
        settings.validate()?;
        let id = Uuid::new_v4();
        info!(session = %id, model = %settings.model, embedder = embedder.model(), "session started");

        Ok(Self {
            id,
            settings,
            llm,
            embedder,
            summarizer: Summarizer::default(),
            staging_dir: None,
            document: None,
            history: ConversationHistory::new(),
        })
    }

    pub fn with_summarizer(mut self, summarizer: Summarizer) -> Self {
        self.summarizer = summarizer;
        self
    }

    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn document(&self) -> Option<&LoadedDocument> {
        self.document.as_ref()
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn summary(&self) -> Option<&str> {
        self.document.as_ref().map(|loaded| loaded.summary.as_str())
    }

    pub fn update_settings(&mut self, settings: Settings) -> Result<(), SessionError> {
        settings.validate()?;
        debug!(session = %self.id, ?settings, "settings updated");
        self.settings = settings;
        Ok(())
    }

    /// The previous document stays active if ingestion or indexing fails.
    pub async fn upload(
        &mut self,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<UploadReport, SessionError> {
        let config = ChunkingConfig::try_from(&self.settings)?;
        let staged = stage_upload(self.staging_dir.as_deref(), bytes)?;
        info!(session = %self.id, file = file_name, bytes = bytes.len(), "processing upload");

        let document =
            ingest_pdf_blocking(staged.path().to_path_buf(), file_name.to_string(), config).await?;
        drop(staged);

        let index = build_index(document.chunks.clone(), self.embedder.as_ref()).await?;

        let (summary, summary_error) = match self
            .summarizer
            .summarize(self.llm.as_ref(), &self.settings, &document.full_text())
            .await
        {
            Ok(summary) => (summary, None),
            Err(error) => {
                warn!(session = %self.id, %error, "summary failed, continuing without it");
                (String::new(), Some(error.to_string()))
            }
        };

        let history_reset = self.reset(&document.fingerprint.document_id);
        let report = UploadReport {
            document_id: document.fingerprint.document_id.clone(),
            page_count: document.fingerprint.page_count,
            chunk_count: index.len(),
            history_reset,
            summary_error,
        };

        self.document = Some(LoadedDocument {
            document,
            index,
            summary,
        });

        info!(
            session = %self.id,
            document = %report.document_id,
            pages = report.page_count,
            chunks = report.chunk_count,
            "document ready"
        );
        Ok(report)
    }

    fn reset(&mut self, document_id: &str) -> bool {
        let same_document = self
            .document
            .as_ref()
            .is_some_and(|loaded| loaded.fingerprint().document_id == document_id);

        if same_document {
            return false;
        }

        self.document = None;
        self.history.clear();
        true
    }

    /// Blank questions return `Ok(None)` without contacting any model.
    pub async fn ask(&mut self, question: &str) -> Result<Option<Answer>, SessionError> {
        let question = question.trim();
        if question.is_empty() {
            debug!(session = %self.id, "ignoring blank question");
            return Ok(None);
        }

        let loaded = self.document.as_ref().ok_or(SessionError::NoDocument)?;
        let retriever = ConversationalRetriever::from_settings(&self.settings);
        let answer = retriever
            .answer(
                question,
                &self.history,
                &loaded.index,
                self.embedder.as_ref(),
                self.llm.as_ref(),
            )
            .await?;

        self.history.append(question, answer.text.clone());
        Ok(Some(answer))
    }

    pub fn clear_history(&mut self) {
        info!(session = %self.id, turns = self.history.len(), "history cleared");
        self.history.clear();
    }

    pub fn export_history(&self) -> Result<String, SessionError> {
        Ok(self.history.export_json()?)
    }

    /// Settings and index change together: when re-chunking fails nothing is
    /// replaced. Returns the new chunk count if the index was rebuilt.
    pub async fn apply_settings(
        &mut self,
        settings: Settings,
    ) -> Result<Option<usize>, SessionError> {
        settings.validate()?;
        let rechunk = settings.chunk_size != self.settings.chunk_size
            || settings.chunk_overlap != self.settings.chunk_overlap;

        let rebuilt = match (&self.document, rechunk) {
            (Some(loaded), true) => Some(self.reindex(loaded, &settings).await?),
            _ => None,
        };

        self.update_settings(settings)?;
        Ok(rebuilt.map(|(chunks, index)| self.install_index(chunks, index)))
    }

    pub async fn rebuild_index(&mut self) -> Result<usize, SessionError> {
        let loaded = self.document.as_ref().ok_or(SessionError::NoDocument)?;
        let (chunks, index) = self.reindex(loaded, &self.settings).await?;
        Ok(self.install_index(chunks, index))
    }

    async fn reindex(
        &self,
        loaded: &LoadedDocument,
        settings: &Settings,
    ) -> Result<(Vec<PdfChunk>, MemoryVectorIndex), SessionError> {
        let config = ChunkingConfig::try_from(settings)?;
        let chunks = loaded.document.rechunk(config);
        let index = build_index(chunks.clone(), self.embedder.as_ref()).await?;
        Ok((chunks, index))
    }

    fn install_index(&mut self, chunks: Vec<PdfChunk>, index: MemoryVectorIndex) -> usize {
        let chunk_count = index.len();
        if let Some(loaded) = self.document.as_mut() {
            loaded.document.chunks = chunks;
            loaded.index = index;
        }

        info!(session = %self.id, chunks = chunk_count, "index rebuilt");
        chunk_count
    }
}

fn stage_upload(dir: Option<&Path>, bytes: &[u8]) -> Result<NamedTempFile, IngestError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("pdf-qa-").suffix(".pdf");
    let mut staged = match dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };
    staged.write_all(bytes)?;
    staged.flush()?;
    Ok(staged)
}
