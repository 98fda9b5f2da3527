use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SessionError;

pub const CHUNK_SIZE_RANGE: (usize, usize, usize) = (100, 2_000, 100);
pub const CHUNK_OVERLAP_RANGE: (usize, usize, usize) = (0, 500, 50);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum ModelChoice {
    #[default]
    #[serde(rename = "deepseek-r1:7b")]
    DeepseekR1_7b,
    #[serde(rename = "deepseek-r1:1.5b")]
    DeepseekR1_1_5b,
}

impl ModelChoice {
    pub const ALL: [ModelChoice; 2] = [ModelChoice::DeepseekR1_7b, ModelChoice::DeepseekR1_1_5b];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelChoice::DeepseekR1_7b => "deepseek-r1:7b",
            ModelChoice::DeepseekR1_1_5b => "deepseek-r1:1.5b",
        }
    }
}

impl fmt::Display for ModelChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelChoice {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ModelChoice::ALL
            .into_iter()
            .find(|choice| choice.as_str() == value.trim())
            .ok_or_else(|| {
                format!(
                    "unsupported model {value:?}, expected one of: {}",
                    ModelChoice::ALL.map(|choice| choice.as_str()).join(", ")
                )
            })
    }
}

/// User-editable knobs for one session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub temperature: f32,
    pub model: ModelChoice,
    /// Leaves the reasoning preamble out of the prompt and strips
    /// `<think>` spans from answers.
    pub hide_reasoning: bool,
    pub hide_sources: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chunk_size: 1_000,
            chunk_overlap: 200,
            temperature: 0.7,
            model: ModelChoice::default(),
            hide_reasoning: false,
            hide_sources: false,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), SessionError> {
        check_stepped("chunk_size", self.chunk_size, CHUNK_SIZE_RANGE)?;
        check_stepped("chunk_overlap", self.chunk_overlap, CHUNK_OVERLAP_RANGE)?;

        if self.chunk_overlap >= self.chunk_size {
            return Err(SessionError::InvalidSettings(format!(
                "chunk_overlap {} must be smaller than chunk_size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }

        if !self.temperature.is_finite() || !(0.0..=1.0).contains(&self.temperature) {
            return Err(SessionError::InvalidSettings(format!(
                "temperature {} is outside 0.0..=1.0",
                self.temperature
            )));
        }

        Ok(())
    }
}

fn check_stepped(
    name: &str,
    value: usize,
    (min, max, step): (usize, usize, usize),
) -> Result<(), SessionError> {
    if value < min || value > max || (value - min) % step != 0 {
        return Err(SessionError::InvalidSettings(format!(
            "{name} {value} must be within {min}..={max} in steps of {step}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentFingerprint {
    pub document_id: String,
    pub source_path: String,
    pub checksum: String,
    pub page_count: usize,
    pub ingested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PdfChunk {
    pub chunk_id: String,
    pub document_id: String,
    pub page: u32,
    pub chunk_index: u64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk: PdfChunk,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SearchHit>,
}

impl Answer {
    /// Page numbers of the sources in retrieval order.
    pub fn source_pages(&self) -> Vec<u32> {
        self.sources.iter().map(|hit| hit.chunk.page).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        Settings::default().validate().expect("defaults should validate");
    }

    #[test]
    fn overlap_must_stay_below_chunk_size() {
        let settings = Settings {
            chunk_size: 200,
            chunk_overlap: 200,
            ..Settings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SessionError::InvalidSettings(_))
        ));
    }

    #[test]
    fn chunk_size_must_follow_the_step() {
        let settings = Settings {
            chunk_size: 1_050,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        let settings = Settings {
            chunk_overlap: 120,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn temperature_is_bounded() {
        let settings = Settings {
            temperature: 1.5,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        let settings = Settings {
            temperature: f32::NAN,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn model_choice_parses_identifiers() {
        assert_eq!(
            "deepseek-r1:1.5b".parse::<ModelChoice>(),
            Ok(ModelChoice::DeepseekR1_1_5b)
        );
        assert_eq!(ModelChoice::DeepseekR1_7b.to_string(), "deepseek-r1:7b");
        assert!("llama3".parse::<ModelChoice>().is_err());
    }

    #[test]
    fn model_choice_serializes_as_identifier() {
        let json = serde_json::to_string(&ModelChoice::DeepseekR1_1_5b).expect("serialize");
        assert_eq!(json, "\"deepseek-r1:1.5b\"");
    }

    #[test]
    fn source_pages_follow_retrieval_order() {
        let hit = |page: u32| SearchHit {
            chunk: PdfChunk {
                chunk_id: format!("c{page}"),
                document_id: "manual.pdf".to_string(),
                page,
                chunk_index: 0,
                text: String::new(),
            },
            score: 0.5,
        };
        let answer = Answer {
            text: "answer".to_string(),
            sources: vec![hit(3), hit(1), hit(3)],
        };

        assert_eq!(answer.source_pages(), vec![3, 1, 3]);
    }
}
