//! Chat mode driven through stdin against a mocked Gemini endpoint.

use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A successful `generateContent` response carrying one text part.
fn completion_response(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [{ "text": text }]
            },
            "finishReason": "STOP"
        }]
    }))
}

/// The credential probe: a models listing.
async fn mount_probe(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "models": [] })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_chat_answers_and_truncates_title() {
    let mock_server = MockServer::start().await;
    mount_probe(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:generateContent"))
        .respond_with(completion_response("Paris is the capital of France."))
        .mount(&mock_server)
        .await;

    let home = tempdir().unwrap();

    cargo_bin_cmd!("palaver")
        .env("PALAVER_HOME", home.path())
        .env("GEMINI_API_KEY", "test-api-key")
        .env("GEMINI_BASE_URL", mock_server.uri())
        .write_stdin("What is the capital of France?\n:topics\n:quit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Paris is the capital of France."))
        // Truncation policy: 10 display characters plus the ellipsis.
        .stdout(predicate::str::contains("topic_1  What is th..."));
}

#[tokio::test]
async fn test_chat_provider_error_is_absorbed() {
    let mock_server = MockServer::start().await;
    mount_probe(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:generateContent"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(json!({ "error": { "code": 500, "message": "backend exploded" } })),
        )
        .mount(&mock_server)
        .await;

    cargo_bin_cmd!("palaver")
        .env("PALAVER_HOME", tempdir().unwrap().path())
        .env("GEMINI_API_KEY", "test-api-key")
        .env("GEMINI_BASE_URL", mock_server.uri())
        .write_stdin("hello\n:quit\n")
        .assert()
        // The failure lands in the conversation log; the session survives.
        .success()
        .stdout(predicate::str::contains(
            "[error] HTTP 500: backend exploded",
        ));
}

#[tokio::test]
async fn test_chat_generated_title_flow() {
    let mock_server = MockServer::start().await;
    mount_probe(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:generateContent"))
        .respond_with(completion_response("Sure, here are some ideas."))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash:generateContent"))
        .respond_with(completion_response("Travel Tips"))
        .mount(&mock_server)
        .await;

    let home = tempdir().unwrap();
    fs::write(
        home.path().join("config.toml"),
        "title_policy = \"generated\"\n",
    )
    .unwrap();

    cargo_bin_cmd!("palaver")
        .env("PALAVER_HOME", home.path())
        .env("GEMINI_API_KEY", "test-api-key")
        .env("GEMINI_BASE_URL", mock_server.uri())
        .write_stdin("plan a trip to Lisbon\n:topics\n:quit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Sure, here are some ideas."))
        .stdout(predicate::str::contains("topic_1  Travel Tips"));
}

#[tokio::test]
async fn test_chat_clear_restarts_topic_ids() {
    let mock_server = MockServer::start().await;
    mount_probe(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:generateContent"))
        .respond_with(completion_response("ok"))
        .mount(&mock_server)
        .await;

    cargo_bin_cmd!("palaver")
        .env("PALAVER_HOME", tempdir().unwrap().path())
        .env("GEMINI_API_KEY", "test-api-key")
        .env("GEMINI_BASE_URL", mock_server.uri())
        .write_stdin("first question\n:clear\nsecond question\n:topics\n:quit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared all topics."))
        // After the clear the id counter restarts at topic_1.
        .stdout(predicate::str::contains("* topic_1  second que..."));
}

#[tokio::test]
async fn test_probe_failure_blocks_chat() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "error": { "code": 401, "message": "API key not valid" } })),
        )
        .mount(&mock_server)
        .await;

    cargo_bin_cmd!("palaver")
        .env("PALAVER_HOME", tempdir().unwrap().path())
        .env("GEMINI_API_KEY", "bad-key")
        .env("GEMINI_BASE_URL", mock_server.uri())
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("credential check"));
}
