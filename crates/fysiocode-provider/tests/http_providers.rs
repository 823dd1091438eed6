use fysiocode_provider::{
    AnthropicResolver, ChatMessage, OpenAiCompatResolver, ProviderError, RawResolution,
    ResolutionProvider, ResolutionRequest,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request(text: &str) -> ResolutionRequest {
    ResolutionRequest {
        system: "resolutie-instructie".into(),
        messages: vec![ChatMessage::user(text)],
        max_tokens: 512,
    }
}

fn anthropic_body(inner_json: &str) -> serde_json::Value {
    serde_json::json!({
        "content": [{"type": "text", "text": inner_json}],
        "stop_reason": "end_turn"
    })
}

fn openai_body(inner_json: &str) -> serde_json::Value {
    serde_json::json!({
        "choices": [{
            "message": {"content": inner_json},
            "finish_reason": "stop"
        }]
    })
}

#[tokio::test]
async fn anthropic_resolver_parses_suggestions() {
    let server = MockServer::start().await;
    let payload = r#"{"suggestions": [{"code": "7920", "name": "Knie - tendinopathie",
        "rationale": "passend bij kniepijn bij traplopen", "confidence": 0.82}],
        "needsClarification": false}"#;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(anthropic_body(payload)))
        .expect(1)
        .mount(&server)
        .await;

    let provider = AnthropicResolver::new("test-key", server.uri(), "claude-test");
    match provider.resolve(request("kniepijn bij traplopen")).await.unwrap() {
        RawResolution::Suggestions(list) => {
            assert_eq!(list.len(), 1);
            assert_eq!(list[0].code, "7920");
            assert!((list[0].confidence - 0.82).abs() < f64::EPSILON);
        }
        other => panic!("expected suggestions, got {other:?}"),
    }
}

#[tokio::test]
async fn anthropic_resolver_parses_clarification() {
    let server = MockServer::start().await;
    let payload = r#"{"suggestions": [], "needsClarification": true,
        "clarifyingQuestion": "Waar zit de pijn precies?"}"#;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(anthropic_body(payload)))
        .mount(&server)
        .await;

    let provider = AnthropicResolver::new("test-key", server.uri(), "claude-test");
    match provider.resolve(request("pijn")).await.unwrap() {
        RawResolution::Clarification { question } => {
            assert_eq!(question, "Waar zit de pijn precies?");
        }
        other => panic!("expected clarification, got {other:?}"),
    }
}

#[tokio::test]
async fn anthropic_429_maps_to_retryable_status_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
            "type": "error",
            "error": {"type": "rate_limit_error", "message": "rate limited"}
        })))
        .mount(&server)
        .await;

    let provider = AnthropicResolver::new("test-key", server.uri(), "claude-test");
    let err = provider.resolve(request("kniepijn")).await.unwrap_err();
    match &err {
        ProviderError::Status { status, message } => {
            assert_eq!(*status, 429);
            assert_eq!(message, "rate limited");
        }
        other => panic!("expected status error, got {other:?}"),
    }
    assert!(err.is_retryable());
}

#[tokio::test]
async fn anthropic_500_is_retryable_400_is_not() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let provider = AnthropicResolver::new("test-key", server.uri(), "claude-test");
    let err = provider.resolve(request("kniepijn")).await.unwrap_err();
    assert!(err.is_retryable());
    let err = provider.resolve(request("kniepijn")).await.unwrap_err();
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn anthropic_junk_text_is_payload_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(anthropic_body("ik weet het niet zeker")),
        )
        .mount(&server)
        .await;

    let provider = AnthropicResolver::new("test-key", server.uri(), "claude-test");
    let err = provider.resolve(request("kniepijn")).await.unwrap_err();
    assert!(matches!(err, ProviderError::Payload(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn openai_resolver_parses_suggestions_with_bearer_auth() {
    let server = MockServer::start().await;
    let payload = r#"{"suggestions": [{"code": "3470", "name": "Lumbale wervelkolom - radiculair syndroom",
        "rationale": "uitstralende pijn in het been, passend bij radiculaire prikkeling",
        "confidence": 0.7}]}"#;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_body(payload)))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiCompatResolver::new("test-key", server.uri(), "gpt-4o-mini");
    match provider.resolve(request("rugpijn met uitstraling")).await.unwrap() {
        RawResolution::Suggestions(list) => assert_eq!(list[0].code, "3470"),
        other => panic!("expected suggestions, got {other:?}"),
    }
}

#[tokio::test]
async fn openai_resolver_tolerates_fenced_json() {
    let server = MockServer::start().await;
    let payload = "```json\n{\"suggestions\": [{\"code\": \"2120\"}]}\n```";

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_body(payload)))
        .mount(&server)
        .await;

    let provider = OpenAiCompatResolver::new("test-key", server.uri(), "gpt-4o-mini");
    match provider.resolve(request("schouderpijn")).await.unwrap() {
        RawResolution::Suggestions(list) => assert_eq!(list[0].code, "2120"),
        other => panic!("expected suggestions, got {other:?}"),
    }
}

#[tokio::test]
async fn connect_failure_maps_to_retryable_connect_error() {
    // Port from a started-then-dropped mock server refuses connections.
    let uri = {
        let server = MockServer::start().await;
        server.uri()
    };

    let provider = AnthropicResolver::new("test-key", uri, "claude-test");
    let err = provider.resolve(request("kniepijn")).await.unwrap_err();
    assert!(matches!(err, ProviderError::Connect(_)));
    assert!(err.is_retryable());
}
