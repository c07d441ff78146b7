//! Suggestion client tests against a mock messages endpoint.
//!
//! The client is blocking, so every call runs on a blocking thread while the
//! mock server lives on the async runtime.

use std::fs;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use packsplit::budget::Budget;
use packsplit::config::LlmConfig;
use packsplit::packager::BuiltinPackager;
use packsplit::suggest::{parse_patterns, LlmSuggester, SuggestionBackend};
use packsplit::{PackSplitError, Planner, RunConfig, Warning};

fn messages_response(text: &str) -> serde_json::Value {
    json!({
        "id": "msg_test",
        "type": "message",
        "role": "assistant",
        "content": [{ "type": "text", "text": text }],
        "usage": { "input_tokens": 120, "output_tokens": 30 }
    })
}

async fn suggest(server: &MockServer, digest: &'static str) -> packsplit::Result<String> {
    let uri = server.uri();
    tokio::task::spawn_blocking(move || {
        let config = LlmConfig::new("test-key").with_base_url(uri);
        LlmSuggester::new(&config)?
            .with_retry_delay(Duration::from_millis(10))
            .suggest(digest)
    })
    .await
    .expect("blocking task")
}

#[tokio::test(flavor = "multi_thread")]
async fn test_suggestions_are_returned_and_parsed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({
            "messages": [{ "role": "user", "content": "# Subtree: demo" }]
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(messages_response(
                "```json\n[\"**/fixtures/**\", \"*.snap\"]\n```",
            )),
        )
        .expect(1)
        .mount(&server)
        .await;

    let raw = suggest(&server, "# Subtree: demo").await.expect("suggestion");
    assert_eq!(
        parse_patterns(&raw).unwrap(),
        vec!["**/fixtures/**".to_string(), "*.snap".to_string()]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_server_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(messages_response("[\"gen/**\"]")))
        .mount(&server)
        .await;

    let raw = suggest(&server, "digest").await.expect("suggestion after retry");
    assert_eq!(raw, "[\"gen/**\"]");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_client_error_fails_fast() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "type": "error",
            "error": { "type": "authentication_error", "message": "invalid x-api-key" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = suggest(&server, "digest").await.unwrap_err();
    assert!(matches!(err, PackSplitError::SuggestionRequest(_)));
    assert!(err.to_string().contains("invalid x-api-key"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_persistent_server_errors_give_up() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let err = suggest(&server, "digest").await.unwrap_err();
    assert!(err.to_string().contains("gave up after 3 attempts"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_empty_content_is_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [],
            "usage": { "input_tokens": 1, "output_tokens": 0 }
        })))
        .mount(&server)
        .await;

    let err = suggest(&server, "digest").await.unwrap_err();
    assert!(matches!(err, PackSplitError::SuggestionParse(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_planner_uses_suggested_patterns() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(messages_response("[\"**/*.log\"]")),
        )
        .mount(&server)
        .await;

    let uri = server.uri();

    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("main.rs"), "fn main() {}\n").unwrap();
    fs::write(tmp.path().join("debug.log"), "noise\n").unwrap();
    fs::write(tmp.path().join("logo.png"), [0u8; 16]).unwrap();
    let root = tmp.path().to_path_buf();

    let plan = tokio::task::spawn_blocking(move || {
        let config = RunConfig::new(&root)
            .with_budget(Budget::new(25_000, "o200k_base", 0.1).unwrap());
        let backend = LlmSuggester::new(&LlmConfig::new("k").with_base_url(uri))?;
        Planner::new(&config, &BuiltinPackager, Some(&backend)).plan()
    })
    .await
    .expect("blocking task")
    .expect("plan");

    let rules = &plan.root().unwrap().rules;
    assert!(rules.contains("**/*.log"));
    assert!(rules.contains("**/repomix-output*.xml"));
    // Suggestions replace the built-in list.
    assert!(!rules.contains("**/*.png"));
    assert!(plan.warnings.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_planner_falls_back_when_service_is_down() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .mount(&server)
        .await;
    let uri = server.uri();

    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("main.rs"), "fn main() {}\n").unwrap();
    let root = tmp.path().to_path_buf();

    let plan = tokio::task::spawn_blocking(move || {
        let config = RunConfig::new(&root);
        let backend = LlmSuggester::new(&LlmConfig::new("k").with_base_url(uri))?;
        Planner::new(&config, &BuiltinPackager, Some(&backend)).plan()
    })
    .await
    .expect("blocking task")
    .expect("plan");

    assert!(plan.root().unwrap().rules.contains("**/*.png"));
    assert!(matches!(
        plan.warnings[..],
        [Warning::SuggestionUnavailable { .. }]
    ));
}
