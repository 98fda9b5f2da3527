use crate::error::CompletionError;
use crate::models::ModelChoice;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: ModelChoice,
    pub prompt: String,
    pub temperature: f32,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalModel {
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<LocalModel>,
}

#[derive(Debug, Serialize)]
pub(crate) struct EmbedRequest<'a> {
    pub model: &'a str,
    pub input: &'a [String],
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmbedResponse {
    pub embeddings: Vec<Vec<f32>>,
}

/// Thin client for a local Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    client: Client,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CompletionError> {
        let base_url = Url::parse(base_url)?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url, client })
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(path)
    }

    pub async fn list_models(&self) -> Result<Vec<LocalModel>, CompletionError> {
        let url = self.endpoint("/api/tags")?;
        debug!(%url, "listing local models");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TagsResponse = response.json().await?;
        Ok(parsed.models)
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        let url = self.endpoint("/api/generate")?;
        let body = json!({
            "model": request.model.as_str(),
            "prompt": request.prompt,
            "stream": false,
            "options": {
                "temperature": request.temperature,
            },
        });

        debug!(
            %url,
            model = %request.model,
            prompt_chars = request.prompt.chars().count(),
            "requesting completion"
        );

        let response = self.client.post(url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|error| CompletionError::MalformedResponse(error.to_string()))?;

        parsed
            .response
            .ok_or_else(|| CompletionError::MalformedResponse("missing response field".to_string()))
    }
}
