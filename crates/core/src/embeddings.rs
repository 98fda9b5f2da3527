use crate::error::IndexError;
use crate::llm::{EmbedRequest, EmbedResponse, OllamaClient};
use async_trait::async_trait;
use tracing::debug;

const DEFAULT: usize = 128;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";
pub const EMBED_BATCH_SIZE: usize = 32;

#[async_trait]
pub trait Embedder: Send + Sync {
    fn model(&self) -> &str;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, IndexError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| IndexError::Embedding {
            backend: self.model().to_string(),
            details: "no vector returned".to_string(),
        })
    }
}

/// Offline embedder hashing character trigrams into fixed buckets.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn model(&self) -> &str {
        "char-trigram"
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

/// Sentence embeddings served by Ollama's `/api/embed`.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: OllamaClient,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        let url = self.client.endpoint("/api/embed")?;
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            debug!(model = %self.model, batch = batch.len(), "embedding batch");

            let response = self
                .client
                .http()
                .post(url.clone())
                .json(&EmbedRequest {
                    model: &self.model,
                    input: batch,
                })
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(IndexError::Embedding {
                    backend: format!("ollama/{}", self.model),
                    details: format!("{status}: {body}"),
                });
            }

            let parsed: EmbedResponse = response.json().await?;
            if parsed.embeddings.len() != batch.len() {
                return Err(IndexError::CountMismatch {
                    chunks: batch.len(),
                    embeddings: parsed.embeddings.len(),
                });
            }
            vectors.extend(parsed.embeddings);
        }

        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn embedder_is_deterministic() {
        let embedder = CharacterNgramEmbedder::default();
        let first = embedder.embed_text("Hydraulic pressure and flow");
        let second = embedder.embed_text("Hydraulic pressure and flow");
        assert_eq!(first, second);
    }

    #[test]
    fn embedder_outputs_expected_length() {
        let embedder = CharacterNgramEmbedder { dimensions: 32 };
        let vector = embedder.embed_text("abc");
        assert_eq!(vector.len(), 32);
    }

    #[tokio::test]
    async fn default_embed_returns_single_vector() {
        let embedder = CharacterNgramEmbedder::default();
        let vector = embedder.embed("pressure").await.expect("embedding");
        assert_eq!(vector, embedder.embed_text("pressure"));
    }

    #[tokio::test]
    async fn ollama_embedder_batches_inputs() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .and(body_partial_json(json!({ "model": "all-minilm" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "embeddings": [[0.1, 0.2], [0.3, 0.4]]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OllamaClient::new(&server.uri(), Duration::from_secs(5)).expect("url");
        let embedder = OllamaEmbedder::new(client, DEFAULT_EMBEDDING_MODEL);
        let vectors = embedder
            .embed_batch(&["one".to_string(), "two".to_string()])
            .await
            .expect("embeddings");

        assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    }

    #[tokio::test]
    async fn ollama_embedder_reports_short_responses() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[0.1, 0.2]] })),
            )
            .mount(&server)
            .await;

        let client = OllamaClient::new(&server.uri(), Duration::from_secs(5)).expect("url");
        let embedder = OllamaEmbedder::new(client, DEFAULT_EMBEDDING_MODEL);
        let result = embedder
            .embed_batch(&["one".to_string(), "two".to_string()])
            .await;

        assert!(matches!(
            result,
            Err(IndexError::CountMismatch {
                chunks: 2,
                embeddings: 1
            })
        ));
    }

    #[tokio::test]
    async fn ollama_embedder_surfaces_missing_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
            .mount(&server)
            .await;

        let client = OllamaClient::new(&server.uri(), Duration::from_secs(5)).expect("url");
        let embedder = OllamaEmbedder::new(client, "missing");
        let result = embedder.embed("text").await;

        assert!(matches!(result, Err(IndexError::Embedding { .. })));
    }
}
