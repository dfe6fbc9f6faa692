use autofy_llm::structured::parse_structured;
use autofy_llm::traits::LlmResult;
use serde::{Deserialize, Deserializer};

/// The model's verdict on one viewport.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PageAnalysis {
    pub summary: String,
    #[serde(deserialize_with = "lenient_bool")]
    pub should_scroll: bool,
}

impl PageAnalysis {
    /// Parse a model reply, tolerating code fences and chatter around the
    /// object.
    ///
    /// ```
    /// use autofy_agent::analysis::PageAnalysis;
    ///
    /// let a = PageAnalysis::parse("```json\n{\"summary\": \"s\", \"should_scroll\": \"false\"}\n```").unwrap();
    /// assert!(!a.should_scroll);
    /// ```
    pub fn parse(reply: &str) -> LlmResult<Self> {
        parse_structured(reply)
    }
}

/// Accept `true`/`false` as JSON booleans or as strings.
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Ok(true),
            "false" | "no" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "should_scroll must be a boolean, got {other:?}"
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autofy_llm::traits::LlmError;

    #[test]
    fn parses_plain_json() {
        let a = PageAnalysis::parse(r#"{"summary": "GPT-2 shipped in 2019.", "should_scroll": true}"#)
            .unwrap();
        assert_eq!(a.summary, "GPT-2 shipped in 2019.");
        assert!(a.should_scroll);
    }

    #[test]
    fn parses_object_inside_chatter() {
        let a = PageAnalysis::parse(
            "Here is my analysis: {\"summary\": \"footer\", \"should_scroll\": \"FALSE\"} hope it helps",
        )
        .unwrap();
        assert!(!a.should_scroll);
    }

    #[test]
    fn rejects_missing_or_odd_fields() {
        assert!(matches!(
            PageAnalysis::parse(r#"{"summary": "x"}"#),
            Err(LlmError::Parse(_))
        ));
        assert!(matches!(
            PageAnalysis::parse(r#"{"summary": "x", "should_scroll": "maybe"}"#),
            Err(LlmError::Parse(_))
        ));
        assert!(matches!(PageAnalysis::parse("no idea"), Err(LlmError::Parse(_))));
    }
}
