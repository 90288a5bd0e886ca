//! Integration tests for the Anthropic provider

use agentflow::llm::provider::{FinishReason, LlmError, ModelProvider, Prompt};
use agentflow::llm::providers::anthropic::{AnthropicConfig, AnthropicProvider};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(base_url: &str) -> AnthropicConfig {
    AnthropicConfig {
        api_key: "test-api-key".to_string(),
        base_url: base_url.to_string(),
        timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

fn message_body(text: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "msg_123",
        "type": "message",
        "role": "assistant",
        "model": "claude-3-5-haiku-20241022",
        "content": [ { "type": "text", "text": text } ],
        "stop_reason": "end_turn",
        "usage": { "input_tokens": 12, "output_tokens": 8 }
    })
}

#[tokio::test]
async fn test_anthropic_provider_sends_system_prompt_separately() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "test-api-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(serde_json::json!({
            "system": "You are a formatter agent.",
            "messages": [ { "role": "user", "content": "Format: hello" } ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(message_body("Formatted hello")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = AnthropicProvider::new(test_config(&mock_server.uri())).unwrap();
    let response = provider
        .call(Prompt::new("You are a formatter agent.", "Format: hello"))
        .await
        .unwrap();

    assert_eq!(response.content, "Formatted hello");
    assert_eq!(response.finish_reason, FinishReason::Stop);
    assert_eq!(response.usage.prompt_tokens, 12);
    assert_eq!(response.usage.total_tokens, 20);
}

#[tokio::test]
async fn test_anthropic_provider_joins_text_blocks() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "claude-3-5-haiku-20241022",
            "content": [
                { "type": "text", "text": "Hello, " },
                { "type": "tool_use", "id": "toolu_1", "name": "noop", "input": {} },
                { "type": "text", "text": "world" }
            ],
            "stop_reason": "max_tokens",
            "usage": { "input_tokens": 1, "output_tokens": 2 }
        })))
        .mount(&mock_server)
        .await;

    let provider = AnthropicProvider::new(test_config(&mock_server.uri())).unwrap();
    let response = provider.call(Prompt::new("", "Hi")).await.unwrap();

    assert_eq!(response.content, "Hello, world");
    assert_eq!(response.finish_reason, FinishReason::Length);
}

#[tokio::test]
async fn test_anthropic_provider_error_statuses() {
    let cases = [
        (401, "auth"),
        (429, "rate"),
        (529, "api"),
    ];

    for (status, expected) in cases {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(status).set_body_string("error"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = AnthropicProvider::new(test_config(&mock_server.uri())).unwrap();
        let result = provider.call(Prompt::new("", "Hi")).await;

        let matched = match (&result, expected) {
            (Err(LlmError::AuthenticationFailed(_)), "auth") => true,
            (Err(LlmError::RateLimitExceeded(_)), "rate") => true,
            (Err(LlmError::ApiError(_)), "api") => true,
            _ => false,
        };
        assert!(matched, "status {status}: unexpected result {result:?}");
    }
}

#[tokio::test]
async fn test_anthropic_provider_rejects_empty_content() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "claude-3-5-haiku-20241022",
            "content": [],
            "stop_reason": "end_turn",
            "usage": { "input_tokens": 1, "output_tokens": 0 }
        })))
        .mount(&mock_server)
        .await;

    let provider = AnthropicProvider::new(test_config(&mock_server.uri())).unwrap();
    let result = provider.call(Prompt::new("", "Hi")).await;

    assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
}

#[tokio::test]
async fn test_anthropic_health_check_sends_minimal_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(body_partial_json(serde_json::json!({ "max_tokens": 1 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(message_body("H")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = AnthropicProvider::new(test_config(&mock_server.uri())).unwrap();
    assert!(provider.health_check().await.is_ok());
}
