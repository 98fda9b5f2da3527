use crate::embeddings::Embedder;
use crate::error::SessionError;
use crate::history::ConversationHistory;
use crate::llm::{CompletionRequest, LanguageModel};
use crate::models::{Answer, ModelChoice, SearchHit, Settings};
use crate::reasoning::strip_reasoning;
use crate::traits::VectorIndex;
use tracing::{debug, info};

pub const DEFAULT_TOP_K: usize = 3;

const REASONING_PREAMBLE: &str =
    "<think>Analyzing the context and the question to give an accurate answer.</think>\n";

/// Retrieval-augmented answering over one document's index.
///
/// The search query is the raw question; earlier turns only shape the prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationalRetriever {
    pub top_k: usize,
    pub model: ModelChoice,
    pub temperature: f32,
    pub hide_reasoning: bool,
}

impl ConversationalRetriever {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            model: settings.model,
            temperature: settings.temperature,
            hide_reasoning: settings.hide_reasoning,
        }
    }

    pub fn build_prompt(
        &self,
        history: &ConversationHistory,
        sources: &[SearchHit],
        question: &str,
    ) -> String {
        let context = sources
            .iter()
            .map(|hit| hit.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let preamble = if self.hide_reasoning {
            ""
        } else {
            REASONING_PREAMBLE
        };

        format!(
            "Previous conversation context:\n{}\n{}{}\n\nQuestion: {}\n\nHelpful and concise answer:",
            history.format_for_prompt(),
            preamble,
            context,
            question
        )
    }

    pub async fn answer(
        &self,
        question: &str,
        history: &ConversationHistory,
        index: &dyn VectorIndex,
        embedder: &dyn Embedder,
        llm: &dyn LanguageModel,
    ) -> Result<Answer, SessionError> {
        let query_vector = embedder.embed(question).await?;
        let sources = index.search_vector(&query_vector, self.top_k)?;
        debug!(
            hits = sources.len(),
            pages = ?sources.iter().map(|hit| hit.chunk.page).collect::<Vec<_>>(),
            "retrieved context"
        );

        let prompt = self.build_prompt(history, &sources, question);
        let raw = llm
            .complete(CompletionRequest {
                model: self.model,
                prompt,
                temperature: self.temperature,
            })
            .await?;

        let text = if self.hide_reasoning {
            strip_reasoning(&raw)
        } else {
            raw
        };

        info!(
            model = %self.model,
            sources = sources.len(),
            answer_chars = text.chars().count(),
            "question answered"
        );
        Ok(Answer { text, sources })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::error::CompletionError;
    use crate::models::PdfChunk;
    use crate::store::build_index;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedModel {
        reply: String,
        prompts: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedModel {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
            self.prompts.lock().expect("request log").push(request);
            Ok(self.reply.clone())
        }
    }

    fn chunks() -> Vec<PdfChunk> {
        [
            (1, "Hydraulic pumps raise fluid pressure."),
            (1, "Pump maintenance happens monthly."),
            (2, "Electrical panels need grounding."),
            (3, "Safety goggles are mandatory."),
        ]
        .into_iter()
        .enumerate()
        .map(|(index, (page, text))| PdfChunk {
            chunk_id: format!("chunk-{index}"),
            document_id: "manual.pdf".to_string(),
            page,
            chunk_index: index as u64,
            text: text.to_string(),
        })
        .collect()
    }

    fn hit(text: &str) -> SearchHit {
        SearchHit {
            chunk: PdfChunk {
                chunk_id: "id".to_string(),
                document_id: "doc".to_string(),
                page: 1,
                chunk_index: 0,
                text: text.to_string(),
            },
            score: 1.0,
        }
    }

    #[test]
    fn prompt_contains_history_context_and_question() {
        let mut history = ConversationHistory::new();
        history.append("What is it?", "A manual.");
        let retriever = ConversationalRetriever::from_settings(&Settings {
            hide_reasoning: true,
            ..Settings::default()
        });

        let prompt = retriever.build_prompt(&history, &[hit("first"), hit("second")], "Why?");

        assert_eq!(
            prompt,
            "Previous conversation context:\nHuman: What is it?\nAssistant: A manual.\n\
             first\n\nsecond\n\nQuestion: Why?\n\nHelpful and concise answer:"
        );
    }

    #[test]
    fn reasoning_preamble_only_when_reasoning_is_shown() {
        let history = ConversationHistory::new();
        let shown = ConversationalRetriever::from_settings(&Settings::default());
        let hidden = ConversationalRetriever::from_settings(&Settings {
            hide_reasoning: true,
            ..Settings::default()
        });

        assert!(shown
            .build_prompt(&history, &[hit("ctx")], "q")
            .contains(REASONING_PREAMBLE));
        assert!(!hidden
            .build_prompt(&history, &[hit("ctx")], "q")
            .contains("<think>"));
    }

    #[tokio::test]
    async fn answer_uses_three_sources_and_settings() -> Result<(), SessionError> {
        let embedder = CharacterNgramEmbedder::default();
        let index = build_index(chunks(), &embedder).await?;
        let model = ScriptedModel::new("<think>pumps</think>\nPumps raise pressure.");
        let settings = Settings {
            temperature: 0.3,
            model: ModelChoice::DeepseekR1_1_5b,
            hide_reasoning: true,
            ..Settings::default()
        };

        let answer = ConversationalRetriever::from_settings(&settings)
            .answer(
                "How do hydraulic pumps work?",
                &ConversationHistory::new(),
                &index,
                &embedder,
                &model,
            )
            .await?;

        assert_eq!(answer.text, "Pumps raise pressure.");
        assert_eq!(answer.sources.len(), DEFAULT_TOP_K);
        assert_eq!(answer.sources[0].chunk.page, 1);

        let requests = model.prompts.lock().expect("request log");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, ModelChoice::DeepseekR1_1_5b);
        assert_eq!(requests[0].temperature, 0.3);
        assert!(requests[0].prompt.contains("Question: How do hydraulic pumps work?"));
        Ok(())
    }

    #[tokio::test]
    async fn raw_answer_is_kept_when_reasoning_is_shown() -> Result<(), SessionError> {
        let embedder = CharacterNgramEmbedder::default();
        let index = build_index(chunks(), &embedder).await?;
        let model = ScriptedModel::new("<think>pumps</think>\nPumps raise pressure.");

        let answer = ConversationalRetriever::from_settings(&Settings::default())
            .answer("pumps?", &ConversationHistory::new(), &index, &embedder, &model)
            .await?;

        assert!(answer.text.starts_with("<think>pumps</think>"));
        Ok(())
    }
}
