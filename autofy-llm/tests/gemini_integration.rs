mod common;

use autofy_llm::gemini::GeminiClient;
use autofy_llm::structured::complete_structured;
use autofy_llm::traits::{LlmClient, LlmError, LlmRequest, Part};
use serde::Deserialize;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL: &str = "gemini-flash-latest";

fn candidate(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }],
        "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 5, "totalTokenCount": 15}
    })
}

async fn client_for(server: &MockServer) -> GeminiClient {
    GeminiClient::new("test-key".into(), MODEL.into(), Some(&server.uri())).unwrap()
}

#[derive(Debug, Deserialize)]
struct PageAnalysis {
    summary: String,
    should_scroll: bool,
}

#[tokio::test]
async fn sends_key_header_and_reads_text() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/models/{MODEL}:generateContent")))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate("OK")))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let resp = client
        .generate("Respond with just 'OK'", None, Some(5), Some(0.0))
        .await
        .unwrap();

    assert_eq!(resp.text, "OK");
    assert_eq!(resp.tokens_used, Some(15));
}

#[tokio::test]
async fn structured_call_sends_image_and_parses_reply() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/models/{MODEL}:generateContent")))
        .and(body_partial_json(json!({
            "generationConfig": {"responseMimeType": "application/json"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate(
            "```json\n{\"summary\": \"GPT-3 was released in 2020.\", \"should_scroll\": true}\n```",
        )))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let request = LlmRequest::new(vec![Part::text("Task: LLM history"), Part::png(vec![0x89, 0x50, 0x4e, 0x47])]);
    let analysis: PageAnalysis = complete_structured(&client, request).await.unwrap();

    assert!(analysis.should_scroll);
    assert!(analysis.summary.contains("2020"));

    let received = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(
        body["contents"][0]["parts"][1]["inlineData"]["mimeType"],
        "image/png"
    );
}

#[tokio::test]
async fn quota_errors_are_rate_limits() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client.generate("hi", None, None, None).await.unwrap_err();
    match err {
        LlmError::RateLimited(msg) => assert!(msg.contains("RESOURCE_EXHAUSTED")),
        other => panic!("expected rate limit, got {other:?}"),
    }
}

#[tokio::test]
async fn forbidden_is_permission_denied() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"code": 403, "message": "API key was reported as leaked", "status": "PERMISSION_DENIED"}
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client.generate("hi", None, None, None).await.unwrap_err();
    assert!(matches!(err, LlmError::PermissionDenied(_)));
}

#[tokio::test]
async fn safety_block_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"finishReason": "SAFETY"}]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client.generate("hi", None, None, None).await.unwrap_err();
    assert!(matches!(err, LlmError::Blocked(_)));
}

#[tokio::test]
#[ignore]
async fn gemini_live_smoketest() {
    common::init_test_tracing();
    let Ok(key) = std::env::var("GOOGLE_API_KEY") else {
        tracing::debug!("Skipping: GOOGLE_API_KEY not set");
        return;
    };
    let client = GeminiClient::new(key, MODEL.into(), None).unwrap();
    let resp = client.generate("Say Ok", None, Some(8), Some(0.0)).await.unwrap();
    assert!(!resp.text.trim().is_empty());
}
