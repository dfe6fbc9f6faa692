use crate::traits::{LlmClient, LlmRequest, LlmResponse, LlmResult, Part};
use async_trait::async_trait;
use autofy_http::{Auth, HttpClient, RequestOpts};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// OpenAI Responses API client.
pub struct OpenAiClient {
    client: HttpClient,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ResponsesApiRequest {
    model: String,
    input: Vec<InputMessage>,
    instructions: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct InputMessage {
    role: &'static str,
    content: Vec<InputContent>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InputContent {
    InputText { text: String },
    InputImage { image_url: String },
}

#[derive(Debug, Deserialize)]
struct ResponsesApiResponse {
    model: String,
    #[serde(default)]
    output: Vec<ResponseMessage>,
    usage: Option<ResponseUsage>,
}

/// One element in the `output` array
#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Vec<ResponseContent>,
}

/// One part of the message `content`
#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ResponseUsage {
    total_tokens: Option<u32>,
}

impl OpenAiClient {
    /// Create a new client for the given API key and model. `endpoint`
    /// overrides the API base for OpenAI-compatible gateways.
    pub fn new(api_key: String, model: String, endpoint: Option<&str>) -> LlmResult<Self> {
        let base = format!(
            "{}/",
            endpoint.unwrap_or(OPENAI_API_BASE).trim_end_matches('/')
        );
        let client = HttpClient::new(&base)?
            .with_timeout(Duration::from_secs(120))
            .with_retries(1)
            .with_rate_limit_retries(false);

        Ok(Self {
            client,
            api_key,
            model,
        })
    }

    fn build_request(&self, request: &LlmRequest) -> ResponsesApiRequest {
        let content = request
            .parts
            .iter()
            .map(|p| match p {
                Part::Text(t) => InputContent::InputText { text: t.clone() },
                Part::Image { mime_type, data } => InputContent::InputImage {
                    image_url: format!("data:{};base64,{}", mime_type, BASE64.encode(data)),
                },
            })
            .collect();

        ResponsesApiRequest {
            model: self.model.clone(),
            input: vec![InputMessage {
                role: "user",
                content,
            }],
            instructions: request
                .system
                .clone()
                .unwrap_or_else(|| "You are an objective, unbiased researcher.".to_string()),
            temperature: request.temperature,
            max_output_tokens: request.max_tokens,
            text: request
                .json_output
                .then(|| json!({ "format": { "type": "json_object" } })),
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: &LlmRequest) -> LlmResult<LlmResponse> {
        let req = self.build_request(request);
        tracing::debug!(
            model = %self.model,
            images = request.has_images(),
            json = request.json_output,
            "openai.responses"
        );

        let resp: ResponsesApiResponse = self
            .client
            .post_json(
                "responses",
                &req,
                RequestOpts {
                    auth: Some(Auth::Bearer(&self.api_key)),
                    ..Default::default()
                },
            )
            .await?;

        let text = resp
            .output
            .iter()
            .flat_map(|msg| &msg.content)
            .filter(|c| c.kind == "output_text")
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("");

        Ok(LlmResponse {
            text,
            model: Some(resp.model),
            tokens_used: resp.usage.and_then(|u| u.total_tokens),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
