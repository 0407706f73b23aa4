//! Integration tests for the instant-answer search client against a fake
//! endpoint.

use std::time::Duration;

use chartsmith_core::config::SearchConfig;
use chartsmith_core::error::SearchError;
use chartsmith_core::search::SearchClient;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, timeout_secs: u64) -> SearchClient {
    SearchClient::new(&SearchConfig {
        endpoint: format!("{}/", server.uri()),
        timeout_secs,
        ..SearchConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_search_sends_expected_query_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("q", "Top 10 most populated countries"))
        .and(query_param("format", "json"))
        .and(query_param("no_redirect", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "AbstractText": "India and China lead.",
            "RelatedTopics": [{"Text": "Population of India"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 10);
    let text = client.lookup("Top 10 most populated countries").await;
    assert_eq!(
        text,
        "Summary: India and China lead.\n\nRelated: Population of India"
    );
}

#[tokio::test]
async fn test_non_200_status_yields_fallback_text() {
    for status in [204u16, 404, 429, 500, 503] {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;

        let client = client_for(&server, 10);
        let err = client.search("UK GDP").await.unwrap_err();
        assert!(
            matches!(err, SearchError::Status { status: s } if s == status),
            "status {status} gave {err:?}"
        );

        let text = client.lookup("UK GDP").await;
        assert!(!text.is_empty());
        assert!(text.contains("UK GDP"));
    }
}

#[tokio::test]
async fn test_malformed_json_yields_fallback_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let client = client_for(&server, 10);
    assert!(matches!(
        client.search("x").await.unwrap_err(),
        SearchError::Parse { .. }
    ));
    assert_eq!(
        client.lookup("x").await,
        "Web search for 'x' completed. Manual research may be needed for specific data."
    );
}

#[tokio::test]
async fn test_json_with_javascript_content_type_is_parsed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/x-javascript")
                .set_body_string(r#"{"AbstractText": "Answer"}"#),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, 10);
    assert_eq!(client.lookup("x").await, "Summary: Answer");
}

#[tokio::test]
async fn test_empty_answer_yields_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "AbstractText": "",
            "RelatedTopics": []
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, 10);
    assert_eq!(
        client.lookup("IPL winners").await,
        "Basic search completed for: IPL winners"
    );
}

#[tokio::test]
async fn test_slow_endpoint_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"AbstractText": "late"}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, 1);
    let err = client.search("x").await.unwrap_err();
    assert!(matches!(err, SearchError::Timeout { timeout_secs: 1 }));
    assert!(client.lookup("x").await.contains("Manual research"));
}
