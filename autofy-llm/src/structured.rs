//! Structured (JSON) output from models that do not always honor JSON mode.
use crate::traits::{LlmClient, LlmError, LlmRequest, LlmResult};
use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::OnceLock;

fn fenced() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("valid regex"))
}

fn braced() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)(\{.*\})").expect("valid regex"))
}

/// Find the JSON object in a model reply: a fenced block first, then the
/// outermost `{...}` span.
///
/// ```
/// use autofy_llm::structured::extract_json_block;
///
/// let reply = "Sure!\n```json\n{\"a\": 1}\n```";
/// assert_eq!(extract_json_block(reply).as_deref(), Some("{\"a\": 1}"));
/// assert_eq!(extract_json_block("no json here"), None);
/// ```
pub fn extract_json_block(text: &str) -> Option<String> {
    if let Some(caps) = fenced().captures(text) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }
    braced()
        .captures(text)
        .and_then(|c| c.get(1).map(|m| m.as_str().to_string()))
}

/// Parse a model reply into `T`, tolerating fences and chatter around the
/// object. Failures are [`LlmError::Parse`] so callers can retry them.
pub fn parse_structured<T: DeserializeOwned>(text: &str) -> LlmResult<T> {
    let trimmed = text.trim();
    if let Ok(v) = serde_json::from_str::<T>(trimmed) {
        return Ok(v);
    }
    let block = extract_json_block(trimmed)
        .ok_or_else(|| LlmError::Parse(format!("no JSON object in reply: {}", snip(trimmed))))?;
    serde_json::from_str::<T>(&block)
        .map_err(|e| LlmError::Parse(format!("{e}; reply: {}", snip(trimmed))))
}

/// Run `request` in JSON mode and parse the reply into `T`.
pub async fn complete_structured<T: DeserializeOwned>(
    client: &dyn LlmClient,
    request: LlmRequest,
) -> LlmResult<T> {
    let request = request.json();
    let response = client.complete(&request).await?;
    tracing::debug!(
        model = client.model_name(),
        reply_len = response.text.len(),
        "structured reply received"
    );
    parse_structured(&response.text)
}

fn snip(s: &str) -> String {
    s.chars().take(200).collect()
}
