//! End-to-end wiring: configuration → aggregator → backend → orchestrator.

use std::sync::Arc;
use std::time::Duration;

use assistant_core::aggregator::{ToolProviderEntry, ToolSelector};
use assistant_core::message::ConversationMessage;
use assistant_core::tool::{JsonObject, ToolProvider};
use assistant_runtime::bootstrap::{bootstrap, initialize_aggregator};
use assistant_runtime::{AgentReplyOrchestrator, CloudBackend, CloudConfig, ScriptToolProvider, ToolsConfig};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn offline_tools(dir: &tempfile::TempDir) -> ToolsConfig {
    ToolsConfig {
        weather_script: dir.path().join("weather.py"),
        reminder_script: dir.path().join("reminder.py"),
        docs_script: dir.path().join("docs.py"),
        support_url: "http://127.0.0.1:9".into(),
        call_timeout: Duration::from_secs(1),
        ..ToolsConfig::default()
    }
}

#[tokio::test]
async fn missing_backends_degrade_to_builtin_tools() {
    let dir = tempfile::tempdir().unwrap();
    let aggregator = bootstrap(&offline_tools(&dir)).await.unwrap();

    assert!(aggregator.is_ready());
    let names: Vec<String> = aggregator
        .tool_definitions()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, vec!["current_datetime"]);

    let state = aggregator.state();
    assert_eq!(state.option("weather").unwrap().tool_count, 0);
    assert!(state.option("weather").unwrap().enabled);
    assert!(!state.option("support").unwrap().enabled);

    let result = aggregator
        .execute("weather_current", &JsonObject::new())
        .await
        .unwrap();
    assert!(result.text.contains("not installed"), "{}", result.text);
    assert!(result.text.contains("weather.py"), "{}", result.text);

    let result = aggregator
        .execute("docs_search", &JsonObject::new())
        .await
        .unwrap();
    assert!(result.text.contains("not enabled"), "{}", result.text);
    assert!(result.text.contains("Documents"), "{}", result.text);
}

#[tokio::test]
async fn missing_script_answers_through_aggregator_without_launching() {
    let dir = tempfile::tempdir().unwrap();
    let config = offline_tools(&dir);
    let weather = Arc::new(ScriptToolProvider::new(
        config
            .script_server("weather", &config.weather_script)
            .missing_message("Weather server not found."),
    ));
    let aggregator = initialize_aggregator(vec![ToolProviderEntry::new(
        "weather",
        "Weather",
        weather.clone(),
    )])
    .await
    .unwrap();

    let result = aggregator
        .execute("weather_forecast", &JsonObject::new())
        .await
        .unwrap();
    assert_eq!(result.text, "Weather server not found.");
    assert!(!weather.is_running().await);
    assert_eq!(aggregator.state().option("weather").unwrap().tool_count, 0);
}

#[tokio::test]
async fn reply_with_one_tool_round() {
    let dir = tempfile::tempdir().unwrap();
    let aggregator = bootstrap(&offline_tools(&dir)).await.unwrap();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(|req: &Request| String::from_utf8_lossy(&req.body).contains(r#""role":"tool""#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gpt-4o-mini",
            "choices": [{"message": {
                "role": "assistant",
                "content": "```json\n{\"title\":\"Today\",\"answer\":\"It is Monday.\",\"confidence\":0.95}\n```"
            }}]
        })))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gpt-4o-mini",
            "choices": [{"message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{"id": "call_1", "type": "function",
                    "function": {"name": "current_datetime", "arguments": "{\"format\":\"human\"}"}}]
            }}]
        })))
        .with_priority(2)
        .mount(&server)
        .await;

    let backend = CloudBackend::new(CloudConfig {
        api_key: Some("sk-test".into()),
        base_url: server.uri(),
        ..CloudConfig::default()
    })
    .unwrap()
    .with_tools(aggregator.clone());
    let orchestrator = AgentReplyOrchestrator::new(Arc::new(backend));

    let thread = Uuid::new_v4();
    let history = vec![ConversationMessage::user(thread, "What day is it?")];
    let reply = orchestrator
        .generate_reply(&history, "gpt-4o-mini", 0.7, "You are a helpful assistant.", None)
        .await
        .unwrap();

    assert_eq!(reply.response.title, "Today");
    assert_eq!(reply.response.summary, "It is Monday.");
    assert!((reply.response.confidence - 0.95).abs() < f64::EPSILON);

    let message = reply.into_message(thread);
    assert!(message.metrics.is_some());
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}
