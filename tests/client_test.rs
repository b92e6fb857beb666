//! Tests HTTP client behavior using wiremock for request/response mocking.

use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use draftforge::config::{ProviderConfig, RequestConfig};
use draftforge::error::ProviderError;
use draftforge::llm::{ChatModel, HttpChatClient};
use draftforge::vector::EmbeddingModel;

fn client_for(mock_url: &str, max_retries: u32) -> HttpChatClient {
    let provider = ProviderConfig {
        api_key: "test-api-key".to_string(),
        base_url: mock_url.to_string(),
        chat_model: "gpt-4o-mini".to_string(),
        embedding_model: "text-embedding-3-small".to_string(),
    };
    let request = RequestConfig {
        timeout_ms: 5000,
        max_retries,
        retry_delay_ms: 10,
    };
    HttpChatClient::new(&provider, request).expect("client creation")
}

fn chat_response(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"message": {"role": "assistant", "content": content}}]
    }))
}

#[tokio::test]
async fn test_generate_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer test-api-key"))
        .respond_with(chat_response("generated text"))
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), 0);
    let cancel = CancellationToken::new();
    let text = client.generate("prompt", &cancel).await.unwrap();
    assert_eq!(text, "generated text");
}

#[tokio::test]
async fn test_generate_wraps_api_error_after_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), 0);
    let cancel = CancellationToken::new();
    let err = client.generate("prompt", &cancel).await.unwrap_err();

    match err {
        ProviderError::Unavailable { message, retries } => {
            assert_eq!(retries, 1);
            assert!(message.contains("500"), "got: {}", message);
        }
        other => panic!("expected Unavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_generate_retries_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(chat_response("second attempt"))
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), 2);
    let cancel = CancellationToken::new();
    let text = client.generate("prompt", &cancel).await.unwrap();
    assert_eq!(text, "second attempt");
}

#[tokio::test]
async fn test_generate_rejects_empty_choices() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), 0);
    let cancel = CancellationToken::new();
    let err = client.generate("prompt", &cancel).await.unwrap_err();
    assert!(err.to_string().contains("no choices"), "got: {}", err);
}

#[tokio::test]
async fn test_generate_cancelled_before_send() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(chat_response("should not be returned"))
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), 3);
    let cancel = CancellationToken::new();
    cancel.cancel();

    assert!(matches!(
        client.generate("prompt", &cancel).await,
        Err(ProviderError::Cancelled)
    ));
}

#[tokio::test]
async fn test_embed_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(header("Authorization", "Bearer test-api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"embedding": [0.1, 0.2, 0.3]}]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), 0);
    let cancel = CancellationToken::new();
    let embedding = client.embed("some text", &cancel).await.unwrap();
    assert_eq!(embedding, vec![0.1, 0.2, 0.3]);
}

#[tokio::test]
async fn test_embed_api_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), 3);
    let cancel = CancellationToken::new();
    let err = client.embed("text", &cancel).await.unwrap_err();

    match err {
        ProviderError::Api { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "bad key");
        }
        other => panic!("expected Api, got {:?}", other),
    }
}

#[tokio::test]
async fn test_embed_rejects_empty_data() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), 0);
    let cancel = CancellationToken::new();
    let err = client.embed("text", &cancel).await.unwrap_err();
    assert!(matches!(err, ProviderError::InvalidResponse { .. }));
}

#[tokio::test]
async fn test_embed_cancelled() {
    let server = MockServer::start().await;
    let client = client_for(&server.uri(), 0);
    let cancel = CancellationToken::new();
    cancel.cancel();

    assert!(matches!(
        client.embed("text", &cancel).await,
        Err(ProviderError::Cancelled)
    ));
}
