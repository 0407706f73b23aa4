//! End-to-end runs of the pipeline with both upstream APIs faked.

use std::sync::Arc;

use chartsmith_core::config::{AppConfig, LlmConfig, PipelineConfig, SearchConfig};
use chartsmith_core::credentials::{CredentialResolver, InMemoryCredentialStore};
use chartsmith_core::llm::OpenAiChatClient;
use chartsmith_core::pipeline::{Pipeline, SubmitOutcome};
use chartsmith_core::search::SearchClient;
use chartsmith_core::session::{ResearchSession, RunState};
use chartsmith_core::{ErrorKind, Stage};
use pretty_assertions::assert_eq;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY_VAR: &str = "CHARTSMITH_TEST_PIPELINE_KEY";
const QUERY: &str = "Bitcoin price trend last 6 months";
const RESEARCH: &str = "1. Data Summary\nBitcoin climbed.\n2. Key Numbers/Statistics\nMay: 60k\n\
                        3. Recommended Chart Type\nLine\n4. Data Structure for Visualization\nmonth,price";
const CODE: &str = "import matplotlib.pyplot as plt\nplt.plot([1, 2])\nplt.show()\n";

struct Fakes {
    search: MockServer,
    chat: MockServer,
}

async fn start_fakes() -> Fakes {
    let search = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "AbstractText": "Bitcoin is a decentralized digital currency.",
            "RelatedTopics": [{"Text": "Bitcoin price history"}]
        })))
        .mount(&search)
        .await;

    let chat = MockServer::start().await;
    // The code-generation prompt is the only one carrying "Research Data:".
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("Research Data:"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": CODE}}]
        })))
        .with_priority(1)
        .mount(&chat)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": RESEARCH}}]
        })))
        .with_priority(5)
        .mount(&chat)
        .await;

    Fakes { search, chat }
}

fn pipeline_for(fakes: &Fakes, with_key: bool) -> Pipeline {
    let config = AppConfig {
        search: SearchConfig {
            endpoint: format!("{}/", fakes.search.uri()),
            ..SearchConfig::default()
        },
        llm: LlmConfig {
            base_url: format!("{}/v1", fakes.chat.uri()),
            api_key_env: KEY_VAR.to_string(),
            secrets_file: None,
            ..LlmConfig::default()
        },
        pipeline: PipelineConfig::default(),
        ..AppConfig::default()
    };
    let mut resolver = CredentialResolver::new(KEY_VAR);
    if with_key {
        resolver = resolver.with_store(Box::new(InMemoryCredentialStore::with_key(
            KEY_VAR, "sk-test",
        )));
    }
    let provider = OpenAiChatClient::new(&config.llm, resolver).unwrap();
    Pipeline::new(
        SearchClient::new(&config.search).unwrap(),
        Arc::new(provider),
        config.pipeline.clone(),
    )
}

fn chat_bodies(requests: &[wiremock::Request]) -> Vec<serde_json::Value> {
    requests
        .iter()
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

#[tokio::test]
async fn test_full_run_threads_each_stage_into_the_next() {
    let fakes = start_fakes().await;
    let pipeline = pipeline_for(&fakes, true);
    let mut session = ResearchSession::new(Uuid::new_v4());

    let outcome = pipeline.submit(&mut session, QUERY).await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Finished(RunState::GeneratingDone));

    let search_text = session.search_text.clone().unwrap();
    assert_eq!(
        search_text,
        "Summary: Bitcoin is a decentralized digital currency.\n\nRelated: Bitcoin price history"
    );
    assert_eq!(session.research.as_deref(), Some(RESEARCH));
    assert_eq!(session.code.as_deref(), Some(CODE));

    let bodies = chat_bodies(&fakes.chat.received_requests().await.unwrap());
    assert_eq!(bodies.len(), 2);
    let research_prompt = bodies[0]["messages"][1]["content"].as_str().unwrap();
    assert!(research_prompt.contains(QUERY));
    assert!(research_prompt.contains(&search_text));
    let code_prompt = bodies[1]["messages"][1]["content"].as_str().unwrap();
    assert!(code_prompt.contains(QUERY));
    assert!(code_prompt.contains(RESEARCH));

    let download = session.download(20).unwrap();
    assert_eq!(download.file_name, "chart_Bitcoin_price_trend_.py");
    assert_eq!(download.content.as_bytes(), CODE.as_bytes());
}

#[tokio::test]
async fn test_missing_key_fails_without_chat_requests() {
    let fakes = start_fakes().await;
    let pipeline = pipeline_for(&fakes, false);
    let mut session = ResearchSession::new(Uuid::new_v4());

    pipeline.submit(&mut session, QUERY).await.unwrap();
    match &session.state {
        RunState::Failed { stage, kind, detail } => {
            assert_eq!(*stage, Stage::Research);
            assert_eq!(*kind, ErrorKind::MissingKey);
            assert!(detail.contains("key not found"));
        }
        other => panic!("Expected Failed, got {other:?}"),
    }
    assert!(fakes.chat.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_identical_resubmission_is_idempotent() {
    let fakes = start_fakes().await;
    let pipeline = pipeline_for(&fakes, true);
    let mut session = ResearchSession::new(Uuid::new_v4());

    pipeline.submit(&mut session, QUERY).await.unwrap();
    let first = (
        session.search_text.clone(),
        session.research.clone(),
        session.code.clone(),
    );

    pipeline.submit(&mut session, QUERY).await.unwrap();
    let second = (
        session.search_text.clone(),
        session.research.clone(),
        session.code.clone(),
    );
    assert_eq!(first, second);
}
