use chat_api::{ChatApiClient, ChatApiConfig, ChatRequest, WireMessage, DEFAULT_TEMPERATURE};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn request_serializes_model_messages_stream_and_temperature() {
    let request = ChatRequest::new(
        "qwen3-coder",
        vec![
            WireMessage::new("system", "be brief"),
            WireMessage::new("user", "fix the bug"),
        ],
    );

    let value = serde_json::to_value(&request).expect("serialize request");

    assert_eq!(
        value,
        json!({
            "model": "qwen3-coder",
            "messages": [
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "fix the bug"}
            ],
            "stream": true,
            "temperature": 0.2
        })
    );
    assert_eq!(request.temperature, DEFAULT_TEMPERATURE);
}

#[test]
fn built_http_request_targets_endpoint_with_json_body() {
    let client = ChatApiClient::new(
        ChatApiConfig::new("https://api.example.com/v1/").with_api_key("sk-test"),
    )
    .expect("client");
    let mut request = ChatRequest::new("m", vec![WireMessage::new("user", "hi")]);
    request.stream = false;

    let http_request = client
        .build_request(&request)
        .expect("build request")
        .build()
        .expect("request");

    assert_eq!(http_request.method().as_str(), "POST");
    assert_eq!(
        http_request.url().as_str(),
        "https://api.example.com/v1/chat/completions"
    );
    assert_eq!(
        http_request
            .headers()
            .get("authorization")
            .and_then(|value| value.to_str().ok()),
        Some("Bearer sk-test")
    );

    let body = http_request
        .body()
        .and_then(|body| body.as_bytes())
        .expect("buffered body");
    let body: serde_json::Value = serde_json::from_slice(body).expect("json body");
    assert_eq!(body["stream"], json!(true));
    assert_eq!(body["messages"][0]["content"], json!("hi"));
}

#[test]
fn invalid_base_url_is_rejected_at_construction() {
    let error = ChatApiClient::new(ChatApiConfig::new("not a url")).expect_err("invalid url");
    assert!(error.to_string().contains("invalid base URL"));
}
