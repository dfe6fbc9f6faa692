use crate::traits::{LlmClient, LlmError, LlmRequest, LlmResponse, LlmResult, Part};
use async_trait::async_trait;
use autofy_http::{Auth, HttpClient, RequestOpts};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum GeminiPart {
    Text(String),
    InlineData(GeminiBlob),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiBlob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    prompt_feedback: Option<GeminiPromptFeedback>,
    usage_metadata: Option<GeminiUsageMetadata>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    total_token_count: Option<u32>,
}

/// Google Gemini API client (`generateContent`).
///
/// Screenshots travel as `inlineData` parts next to the prompt text.
pub struct GeminiClient {
    client: HttpClient,
    api_key: String,
    model: String,
}

impl GeminiClient {
    /// Create a client for `model` against `endpoint` (defaults to the
    /// public v1beta API when `None`).
    pub fn new(api_key: String, model: String, endpoint: Option<&str>) -> LlmResult<Self> {
        let base = format!(
            "{}/",
            endpoint.unwrap_or(GEMINI_BASE_URL).trim_end_matches('/')
        );
        let client = HttpClient::new(&base)?
            .with_timeout(Duration::from_secs(120))
            .with_retries(1)
            .with_rate_limit_retries(false);
        let api_key = autofy_http::sanitize_api_key(&api_key)?;

        Ok(Self {
            client,
            api_key,
            model,
        })
    }

    fn build_request(request: &LlmRequest) -> GeminiRequest {
        let parts = request
            .parts
            .iter()
            .map(|p| match p {
                Part::Text(t) => GeminiPart::Text(t.clone()),
                Part::Image { mime_type, data } => GeminiPart::InlineData(GeminiBlob {
                    mime_type: mime_type.clone(),
                    data: BASE64.encode(data),
                }),
            })
            .collect();

        let generation_config = if request.max_tokens.is_some()
            || request.temperature.is_some()
            || request.json_output
        {
            Some(GeminiGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
                response_mime_type: request.json_output.then_some("application/json"),
            })
        } else {
            None
        };

        GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user"),
                parts,
            }],
            generation_config,
            system_instruction: request.system.as_ref().map(|s| GeminiContent {
                role: None,
                parts: vec![GeminiPart::Text(s.clone())],
            }),
        }
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, request: &LlmRequest) -> LlmResult<LlmResponse> {
        let path = format!("models/{}:generateContent", self.model);
        let body = Self::build_request(request);

        tracing::debug!(
            model = %self.model,
            images = request.has_images(),
            json = request.json_output,
            "gemini.generate"
        );

        let auth = Auth::Header {
            name: autofy_http::HeaderName::from_static("x-goog-api-key"),
            value: autofy_http::HeaderValue::from_str(&self.api_key)
                .map_err(|e| LlmError::Config(format!("invalid API key header: {e}")))?,
        };
        let resp: GeminiResponse = self
            .client
            .post_json(
                &path,
                &body,
                RequestOpts {
                    auth: Some(auth),
                    ..Default::default()
                },
            )
            .await?;

        if let Some(reason) = resp
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.clone())
        {
            return Err(LlmError::Blocked(format!("prompt blocked: {reason}")));
        }

        let candidate = resp
            .candidates
            .first()
            .ok_or_else(|| LlmError::Api {
                status: 200,
                message: "no candidates returned from Gemini".to_string(),
            })?;

        if candidate.finish_reason.as_deref() == Some("SAFETY") {
            return Err(LlmError::Blocked(
                "content blocked by Gemini safety filters".to_string(),
            ));
        }

        let text: String = candidate
            .content
            .as_ref()
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(LlmError::Api {
                status: 200,
                message: format!(
                    "empty Gemini candidate (finish_reason={})",
                    candidate.finish_reason.as_deref().unwrap_or("-")
                ),
            });
        }

        Ok(LlmResponse {
            text,
            model: resp.model_version.or_else(|| Some(self.model.clone())),
            tokens_used: resp.usage_metadata.and_then(|u| u.total_token_count),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
