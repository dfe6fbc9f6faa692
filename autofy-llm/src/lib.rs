//! Provider-agnostic multimodal model integration for Autofy.
//!
//! This crate exposes a common [`traits::LlmClient`] interface taking text and
//! image parts, concrete clients for Gemini, OpenAI, and Ollama, and
//! [`structured`] helpers for JSON replies. [`build_llm_client`] turns an
//! [`autofy_config::LlmConfig`] into a ready client.
//!
//! # Examples
//! ```no_run
//! use autofy_config::LlmConfig;
//! use autofy_llm::build_llm_client;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), autofy_llm::traits::LlmError> {
//! let client = build_llm_client(&LlmConfig::default()).await?;
//! assert_eq!(client.model_name(), "gemini-flash-latest");
//! # Ok(())
//! # }
//! ```
#[cfg(feature = "gemini")]
pub mod gemini;
#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "openai")]
pub mod openai;
pub mod structured;
pub mod traits;

use autofy_config::LlmConfig;
use std::sync::Arc;
use traits::{LlmClient, LlmError};

/// Build the configured provider client. Providers needing a key fail with
/// [`LlmError::Config`] when none can be resolved.
pub async fn build_llm_client(
    config: &LlmConfig,
) -> Result<Arc<dyn LlmClient + Send + Sync + 'static>, LlmError> {
    let missing_key = || {
        LlmError::Config(format!(
            "no API key for provider '{}': set {} or llm.api_key",
            config.provider_name(),
            config.api_key_env().unwrap_or("llm.api_key"),
        ))
    };

    match config {
        #[cfg(feature = "gemini")]
        LlmConfig::Gemini {
            model, endpoint, ..
        } => {
            let key = config.api_key().ok_or_else(missing_key)?;
            let client = gemini::GeminiClient::new(key, model.clone(), Some(endpoint))?;
            Ok(Arc::new(client))
        }
        #[cfg(feature = "openai")]
        LlmConfig::Openai {
            model, endpoint, ..
        } => {
            let key = config.api_key().ok_or_else(missing_key)?;
            let client = openai::OpenAiClient::new(key, model.clone(), Some(endpoint))?;
            Ok(Arc::new(client))
        }
        #[cfg(feature = "ollama")]
        LlmConfig::Ollama {
            model, endpoint, ..
        } => {
            let client = ollama::OllamaClient::new(endpoint.clone(), model.clone()).await?;
            Ok(Arc::new(client))
        }
        #[allow(unreachable_patterns)]
        _ => Err(LlmError::Config(format!(
            "LLM provider '{}' not enabled",
            config.provider_name()
        ))),
    }
}

/// Temperature configured for the provider.
pub fn configured_temperature(config: &LlmConfig) -> f32 {
    match config {
        LlmConfig::Gemini { temperature, .. }
        | LlmConfig::Openai { temperature, .. }
        | LlmConfig::Ollama { temperature, .. } => *temperature,
    }
}
