pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod history;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod reasoning;
pub mod retriever;
pub mod session;
pub mod store;
pub mod summarizer;
pub mod traits;

pub use chunking::{build_chunks, normalize_page_text, split_text, ChunkingConfig};
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, OllamaEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
    DEFAULT_EMBEDDING_MODEL,
};
pub use error::{CompletionError, IndexError, IngestError, SessionError};
pub use extractor::{extract_page_texts, LopdfExtractor, PdfExtractor};
pub use history::{ConversationHistory, Turn};
pub use ingest::{ingest_pdf, ingest_pdf_blocking, IngestedDocument};
pub use llm::{
    CompletionRequest, LanguageModel, LocalModel, OllamaClient, DEFAULT_OLLAMA_URL,
    DEFAULT_TIMEOUT_SECS,
};
pub use models::{
    Answer, DocumentFingerprint, ModelChoice, PageText, PdfChunk, SearchHit, Settings,
};
pub use reasoning::strip_reasoning;
pub use retriever::{ConversationalRetriever, DEFAULT_TOP_K};
pub use session::{LoadedDocument, Session, UploadReport};
pub use store::{build_index, MemoryVectorIndex};
pub use summarizer::{Summarizer, DEFAULT_SUMMARY_LANGUAGE};
pub use traits::VectorIndex;
