use crate::error::CompletionError;
use crate::llm::{CompletionRequest, LanguageModel};
use crate::models::Settings;
use crate::reasoning::strip_reasoning;
use tracing::info;

pub const DEFAULT_SUMMARY_LANGUAGE: &str = "English";

#[derive(Debug, Clone)]
pub struct Summarizer {
    language: String,
}

impl Default for Summarizer {
    fn default() -> Self {
        Self::new(DEFAULT_SUMMARY_LANGUAGE)
    }
}

impl Summarizer {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }

    pub fn prompt(&self, text: &str) -> String {
        format!(
            "Summarize the following text concisely in {}: {}",
            self.language, text
        )
    }

    /// One non-streaming completion; reasoning markup is always removed.
    pub async fn summarize(
        &self,
        llm: &dyn LanguageModel,
        settings: &Settings,
        text: &str,
    ) -> Result<String, CompletionError> {
        let raw = llm
            .complete(CompletionRequest {
                model: settings.model,
                prompt: self.prompt(text),
                temperature: settings.temperature,
            })
            .await?;

        let summary = strip_reasoning(&raw).trim().to_string();
        info!(
            model = %settings.model,
            input_chars = text.chars().count(),
            summary_chars = summary.chars().count(),
            "summary generated"
        );
        Ok(summary)
    }
}
