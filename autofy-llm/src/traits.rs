use async_trait::async_trait;
use autofy_common::AutofyError;
use autofy_http::HttpError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub model: Option<String>,
    pub tokens_used: Option<u32>,
}

/// One piece of a multimodal prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    /// Raw image bytes; providers encode them as base64 on the wire.
    Image { mime_type: String, data: Vec<u8> },
}

impl Part {
    pub fn text(s: impl Into<String>) -> Self {
        Part::Text(s.into())
    }

    pub fn png(data: Vec<u8>) -> Self {
        Part::Image {
            mime_type: "image/png".to_string(),
            data,
        }
    }
}

/// A single model call.
///
/// ```
/// use autofy_llm::traits::{LlmRequest, Part};
///
/// let req = LlmRequest::new(vec![Part::text("Describe the page"), Part::png(vec![0x89, 0x50])])
///     .with_system("You are a thorough researcher.")
///     .with_temperature(0.0)
///     .json();
/// assert!(req.json_output);
/// assert!(req.has_images());
/// assert_eq!(req.prompt_text(), "Describe the page");
/// ```
#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub parts: Vec<Part>,
    pub system: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Ask the provider for a JSON object instead of free text.
    pub json_output: bool,
}

impl LlmRequest {
    pub fn new(parts: Vec<Part>) -> Self {
        Self {
            parts,
            ..Default::default()
        }
    }

    pub fn from_text(prompt: impl Into<String>) -> Self {
        Self::new(vec![Part::Text(prompt.into())])
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn json(mut self) -> Self {
        self.json_output = true;
        self
    }

    pub fn has_images(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, Part::Image { .. }))
    }

    /// All text parts joined with blank lines.
    pub fn prompt_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                Part::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Provider failures, classified so callers can pick a retry strategy.
#[derive(thiserror::Error, Debug)]
pub enum LlmError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Could not parse model output: {0}")]
    Parse(String),

    #[error("Response blocked: {0}")]
    Blocked(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<HttpError> for LlmError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Api {
                status, message, ..
            } => match status.as_u16() {
                429 => LlmError::RateLimited(message),
                401 | 403 => LlmError::PermissionDenied(message),
                code => LlmError::Api {
                    status: code,
                    message,
                },
            },
            HttpError::Decode(err, snippet) => {
                LlmError::Api {
                    status: 200,
                    message: format!("undecodable provider response: {err} ({snippet})"),
                }
            }
            HttpError::Network(m) => LlmError::Network(m),
            HttpError::Url(m) | HttpError::Build(m) => LlmError::Config(m),
        }
    }
}

impl From<LlmError> for AutofyError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Config(m) => AutofyError::Config(m),
            other => AutofyError::Agent(other.to_string()),
        }
    }
}

pub type LlmResult<T> = std::result::Result<T, LlmError>;

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Run one (possibly multimodal) request.
    async fn complete(&self, request: &LlmRequest) -> LlmResult<LlmResponse>;

    /// Text-only convenience over [`LlmClient::complete`].
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> LlmResult<LlmResponse> {
        let request = LlmRequest {
            parts: vec![Part::text(prompt)],
            system: system_prompt.map(str::to_string),
            max_tokens,
            temperature,
            json_output: false,
        };
        self.complete(&request).await
    }

    /// Get the model name being used
    fn model_name(&self) -> &str;
}
