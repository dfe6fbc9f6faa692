use crate::traits::{LlmClient, LlmError, LlmRequest, LlmResponse, LlmResult, Part};
use async_trait::async_trait;
use autofy_http::{HttpClient, RequestOpts};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};
use std::time::Duration;

const OLLAMA_CONNECTION_ERROR: &str = "No running Ollama server detected. Start it with: `ollama serve` (after installing). Install instructions: https://github.com/ollama/ollama";

/// Ollama client for local (vision-capable) models such as `llava`.
///
/// Expects a running Ollama server (see https://github.com/ollama/ollama).
pub struct OllamaClient {
    client: HttpClient,
    model: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    stream: bool,
    options: Map<String, JsonValue>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

impl OllamaClient {
    /// Create a new client and verify server/model availability.
    pub async fn new(base_url: String, model: String) -> LlmResult<Self> {
        let base = format!("{}/", base_url.trim_end_matches('/'));
        let client = HttpClient::new(&base)?
            .with_timeout(Duration::from_secs(300))
            .with_retries(0);

        let ollama_client = Self { client, model };
        let models = ollama_client.fetch_available_models().await?;
        if !models.iter().any(|m| m == &ollama_client.model) {
            tracing::info!(model = %ollama_client.model, "model not found locally, pulling");
            ollama_client.pull_model().await?;
        }

        Ok(ollama_client)
    }

    async fn fetch_available_models(&self) -> LlmResult<Vec<String>> {
        let tags: TagsResponse = self
            .client
            .get_json("api/tags", RequestOpts::default())
            .await
            .map_err(|_| LlmError::Network(OLLAMA_CONNECTION_ERROR.to_string()))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn pull_model(&self) -> LlmResult<()> {
        let _: JsonValue = self
            .client
            .post_json(
                "api/pull",
                &json!({ "model": self.model, "stream": false }),
                RequestOpts {
                    timeout: Some(Duration::from_secs(1800)),
                    ..Default::default()
                },
            )
            .await?;
        tracing::info!(model = %self.model, "pulled model");
        Ok(())
    }

    fn build_request<'a>(&'a self, request: &'a LlmRequest) -> GenerateRequest<'a> {
        let mut options = Map::new();
        if let Some(temp) = request.temperature {
            options.insert("temperature".to_string(), json!(temp));
        }
        if let Some(max_tok) = request.max_tokens {
            options.insert("num_predict".to_string(), json!(max_tok));
        }

        let images = request
            .parts
            .iter()
            .filter_map(|p| match p {
                Part::Image { data, .. } => Some(BASE64.encode(data)),
                Part::Text(_) => None,
            })
            .collect();

        GenerateRequest {
            model: &self.model,
            prompt: request.prompt_text(),
            system: request.system.as_deref(),
            images,
            format: request.json_output.then_some("json"),
            stream: false,
            options,
        }
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, request: &LlmRequest) -> LlmResult<LlmResponse> {
        let body = self.build_request(request);
        let resp: GenerateResponse = self
            .client
            .post_json("api/generate", &body, RequestOpts::default())
            .await?;

        Ok(LlmResponse {
            text: resp.response,
            model: Some(self.model.clone()),
            tokens_used: resp.eval_count,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
