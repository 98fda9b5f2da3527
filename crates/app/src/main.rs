mod chat;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use pdf_qa_core::{
    ingest_pdf_blocking, Answer, CharacterNgramEmbedder, ChunkingConfig, Embedder, ModelChoice,
    OllamaClient, OllamaEmbedder, Session, Settings, Summarizer, UploadReport,
    DEFAULT_EMBEDDING_MODEL, DEFAULT_OLLAMA_URL, DEFAULT_SUMMARY_LANGUAGE, DEFAULT_TIMEOUT_SECS,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-qa", version, about = "Ask questions about a PDF with a local Ollama model")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Ollama base URL
    #[arg(long, env = "OLLAMA_HOST", default_value = DEFAULT_OLLAMA_URL, global = true)]
    ollama_url: String,

    /// Chat model (deepseek-r1:7b or deepseek-r1:1.5b)
    #[arg(long, env = "PDF_QA_MODEL", default_value_t = ModelChoice::DeepseekR1_7b, global = true)]
    model: ModelChoice,

    /// Embedding backend
    #[arg(long, value_enum, default_value_t = EmbedderKind::Ollama, global = true)]
    embedder: EmbedderKind,

    /// Ollama embedding model
    #[arg(long, env = "PDF_QA_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL, global = true)]
    embedding_model: String,

    /// Chunk size in characters (100..=2000, steps of 100)
    #[arg(long, default_value_t = 1000, global = true)]
    chunk_size: usize,

    /// Chunk overlap in characters (0..=500, steps of 50)
    #[arg(long, default_value_t = 200, global = true)]
    chunk_overlap: usize,

    /// Sampling temperature (0.0..=1.0)
    #[arg(long, default_value_t = 0.7, global = true)]
    temperature: f32,

    /// Hide the model's <think> reasoning
    #[arg(long, default_value_t = false, global = true)]
    hide_reasoning: bool,

    /// Do not print source pages under answers
    #[arg(long, default_value_t = false, global = true)]
    hide_sources: bool,

    /// Language the summary is written in
    #[arg(long, default_value = DEFAULT_SUMMARY_LANGUAGE, global = true)]
    summary_language: String,

    /// Timeout for each request to Ollama, in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, global = true)]
    timeout_secs: u64,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EmbedderKind {
    /// Sentence embeddings from the Ollama server.
    Ollama,
    /// Offline character-trigram hashing, no server needed.
    Ngram,
}

#[derive(Subcommand)]
enum Command {
    /// Load a PDF and answer a single question.
    Ask {
        /// PDF to load.
        #[arg(long)]
        pdf: PathBuf,
        /// Question about the document.
        #[arg(long)]
        question: String,
    },
    /// Load a PDF and print its summary.
    Summarize {
        #[arg(long)]
        pdf: PathBuf,
    },
    /// Show how a PDF would be chunked with the current settings.
    Chunks {
        #[arg(long)]
        pdf: PathBuf,
        /// Print the full text of each chunk.
        #[arg(long, default_value_t = false)]
        full: bool,
    },
    /// List models available on the Ollama server.
    Models,
    /// Interactive conversation about a PDF.
    Chat {
        /// PDF to load at start.
        #[arg(long)]
        pdf: Option<PathBuf>,
        /// Write the conversation as JSON here when the chat ends.
        #[arg(long)]
        export: Option<PathBuf>,
    },
}

impl Cli {
    fn settings(&self) -> Settings {
        Settings {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            temperature: self.temperature,
            model: self.model,
            hide_reasoning: self.hide_reasoning,
            hide_sources: self.hide_sources,
        }
    }

    fn client(&self) -> anyhow::Result<OllamaClient> {
        OllamaClient::new(&self.ollama_url, Duration::from_secs(self.timeout_secs))
            .with_context(|| format!("invalid ollama url {}", self.ollama_url))
    }

    fn session(&self) -> anyhow::Result<Session> {
        let client = self.client()?;
        let embedder: Box<dyn Embedder> = match self.embedder {
            EmbedderKind::Ollama => Box::new(OllamaEmbedder::new(
                client.clone(),
                self.embedding_model.clone(),
            )),
            EmbedderKind::Ngram => Box::new(CharacterNgramEmbedder::default()),
        };

        let session = Session::new(self.settings(), Box::new(client), embedder)?
            .with_summarizer(Summarizer::new(self.summary_language.clone()));
        Ok(session)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        ollama = %cli.ollama_url,
        model = %cli.model,
        started_at = %Utc::now().to_rfc3339(),
        "pdf-qa boot"
    );

    match &cli.command {
        Command::Ask { pdf, question } => {
            let mut session = cli.session()?;
            load_pdf(&mut session, pdf).await?;
            match session.ask(question).await? {
                Some(answer) => print_answer(&answer, session.settings()),
                None => println!("Nothing to ask: the question is empty."),
            }
        }
        Command::Summarize { pdf } => {
            let mut session = cli.session()?;
            load_pdf(&mut session, pdf).await?;
            println!("{}", session.summary().unwrap_or_default());
        }
        Command::Chunks { pdf, full } => {
            let settings = cli.settings();
            settings.validate()?;
            let config = ChunkingConfig::try_from(&settings)?;
            let document =
                ingest_pdf_blocking(pdf.clone(), document_name(pdf)?, config).await?;

            println!(
                "{} pages, {} chunks (size={} overlap={})",
                document.fingerprint.page_count,
                document.chunks.len(),
                config.max_chars,
                config.overlap_chars
            );
            for chunk in &document.chunks {
                let chars = chunk.text.chars().count();
                if *full {
                    println!("[#{} page {} chars={}]\n{}\n", chunk.chunk_index, chunk.page, chars, chunk.text);
                } else {
                    let preview: String = chunk.text.chars().take(72).collect();
                    println!(
                        "#{:<4} page {:<4} chars={:<5} {}",
                        chunk.chunk_index,
                        chunk.page,
                        chars,
                        preview.replace('\n', " ")
                    );
                }
            }
        }
        Command::Models => {
            let models = cli.client()?.list_models().await?;
            if models.is_empty() {
                println!("no models installed on {}", cli.ollama_url);
            }
            for model in models {
                let supported = model.name.parse::<ModelChoice>().is_ok();
                println!(
                    "{}{}",
                    model.name,
                    if supported { "  (supported chat model)" } else { "" }
                );
            }
        }
        Command::Chat { pdf, export } => {
            let mut session = cli.session()?;
            if let Some(pdf) = pdf {
                load_pdf(&mut session, pdf).await?;
            }
            chat::run(&mut session).await?;

            if let Some(path) = export {
                chat::export_to(&session, path).await?;
            }
        }
    }

    Ok(())
}

pub(crate) fn document_name(path: &Path) -> anyhow::Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .with_context(|| format!("path has no file name: {}", path.display()))
}

/// Reads `path` and uploads it into the session, printing progress.
pub(crate) async fn load_pdf(session: &mut Session, path: &Path) -> anyhow::Result<UploadReport> {
    let name = document_name(path)?;
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("unable to read {}", path.display()))?;

    println!("Processing {name}: extracting, embedding and summarizing...");
    let report = session
        .upload(&name, &bytes)
        .await
        .with_context(|| format!("error processing {name}"))?;

    println!(
        "Loaded {} ({} pages, {} chunks){}",
        report.document_id,
        report.page_count,
        report.chunk_count,
        if report.history_reset { "" } else { ", conversation kept" }
    );
    if let Some(error) = &report.summary_error {
        println!("Summary unavailable: {error}");
    }
    Ok(report)
}

pub(crate) fn print_answer(answer: &Answer, settings: &Settings) {
    println!("\n{}\n", answer.text.trim());
    if !settings.hide_sources && !answer.sources.is_empty() {
        let pages = answer
            .source_pages()
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        println!("Sources: page {pages}");
    }
}
