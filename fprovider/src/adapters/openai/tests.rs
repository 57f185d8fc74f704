//! Focused unit tests for the OpenAI-compatible adapter internals.

#![cfg(test)]

use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::json;

use crate::adapters::testing::FakeTransport;
use crate::{
    CallRequest, CommonSettings, ContentPart, MessageContent, ProtocolAdapter, ProviderConfig,
    ProviderError, ReasoningEffort, ReasoningSettings, ToolCall, ToolCallAccumulator,
    ToolDefinition, UnifiedMessage, UnifiedStreamEvent, Usage,
};

use super::adapter::OpenAiCompatibleAdapter;
use super::serde_api::{ChatCompletionsDecoder, MessageDialect, convert_message};

fn config() -> ProviderConfig {
    ProviderConfig::new("sk-test").with_base_url("https://api.example.com/v1/")
}

async fn run(adapter: &OpenAiCompatibleAdapter, request: CallRequest) -> Vec<UnifiedStreamEvent> {
    adapter.call(request, config()).collect().await
}

#[tokio::test]
async fn call_streams_content_reasoning_and_usage() {
    let transport = Arc::new(FakeTransport::default().with_stream(&[
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\",\"reasoning_content\":\"hmm\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"lo\"},",
        "\"finish_reason\":\"stop\"}]}\n\n",
        "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":3,\"completion_tokens\":2,\"total_tokens\":5,\"completion_tokens_details\":{\"reasoning_tokens\":1}}}\n\n",
        "data: [DONE]\n\n",
    ]));
    let adapter = OpenAiCompatibleAdapter::openai(transport.clone());

    let events = run(
        &adapter,
        CallRequest::new("gpt-4o-mini", vec![UnifiedMessage::user("hi")]),
    )
    .await;

    assert_eq!(
        events,
        vec![
            UnifiedStreamEvent::thinking("hmm"),
            UnifiedStreamEvent::content("Hel"),
            UnifiedStreamEvent::content("lo"),
            UnifiedStreamEvent::finish("stop", Some(Usage::new(3, 2, 5).with_reasoning_tokens(1))),
        ]
    );

    let request = transport.last_request();
    assert_eq!(request.url, "https://api.example.com/v1/chat/completions");
    assert_eq!(request.header_value("Authorization"), Some("Bearer sk-test"));

    let body = transport.last_body();
    assert_eq!(body["stream"], true);
    assert_eq!(body["stream_options"]["include_usage"], true);
    assert!(body.get("temperature").is_none());
    assert!(body.get("tools").is_none());
}

#[tokio::test]
async fn call_reassembles_tool_call_fragments() {
    let transport = Arc::new(FakeTransport::default().with_stream(&[
        "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_a\",\"function\":{\"name\":\"web_\",\"arguments\":\"\"}}]}}]}\n",
        "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"name\":\"search\",\"arguments\":\"{\\\"q\\\":\"}}]}}]}\n",
        "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"\\\"rust\\\"}\"}}]},\"finish_reason\":\"tool_calls\"}]}\n",
        "data: [DONE]\n",
    ]));
    let adapter = OpenAiCompatibleAdapter::openai(transport);

    let events = run(
        &adapter,
        CallRequest::new("gpt-4o", vec![UnifiedMessage::user("search rust")]),
    )
    .await;

    let mut accumulator = ToolCallAccumulator::new();
    for event in &events {
        accumulator.apply(event);
    }

    assert_eq!(
        accumulator.finish(),
        vec![ToolCall::new("call_a", "web_search", "{\"q\":\"rust\"}")]
    );
    assert_eq!(events.last(), Some(&UnifiedStreamEvent::finish("tool_calls", None)));
}

#[tokio::test]
async fn transport_failure_becomes_single_terminal_error() {
    let transport = Arc::new(
        FakeTransport::default().with_stream_error(ProviderError::authentication("bad key")),
    );
    let adapter = OpenAiCompatibleAdapter::openai(transport);

    let events = run(&adapter, CallRequest::new("gpt-4o", vec![UnifiedMessage::user("hi")])).await;

    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], UnifiedStreamEvent::Error { message } if message.contains("bad key")));
}

#[tokio::test]
async fn malformed_chunk_terminates_with_error() {
    let transport = Arc::new(FakeTransport::default().with_stream(&[
        "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n",
        "data: {not json\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"lost\"}}]}\n",
    ]));
    let adapter = OpenAiCompatibleAdapter::openai(transport);

    let events = run(&adapter, CallRequest::new("gpt-4o", vec![UnifiedMessage::user("hi")])).await;

    assert_eq!(events.len(), 2);
    assert_eq!(events[0], UnifiedStreamEvent::content("ok"));
    assert!(events[1].is_terminal());
    assert!(matches!(events[1], UnifiedStreamEvent::Error { .. }));
}

#[tokio::test]
async fn stream_without_done_marker_still_finishes_once() {
    let transport = Arc::new(FakeTransport::default().with_stream(&[
        "data: {\"choices\":[{\"delta\":{\"content\":\"partial\"}}]}\n",
    ]));
    let adapter = OpenAiCompatibleAdapter::openai(transport);

    let events = run(&adapter, CallRequest::new("gpt-4o", vec![UnifiedMessage::user("hi")])).await;

    let terminals = events.iter().filter(|event| event.is_terminal()).count();
    assert_eq!(terminals, 1);
    assert_eq!(events.last(), Some(&UnifiedStreamEvent::finish("stop", None)));
}

#[test]
fn body_includes_only_present_settings_and_tools() {
    let adapter = OpenAiCompatibleAdapter::openai(Arc::new(FakeTransport::default()));
    let request = CallRequest::new("gpt-4o", vec![UnifiedMessage::user("hi")])
        .with_settings(CommonSettings::default().with_temperature(0.2).with_stop(["END"]))
        .with_reasoning(ReasoningSettings::enabled().with_effort(ReasoningEffort::High))
        .with_tools(vec![ToolDefinition {
            name: "lookup".to_string(),
            description: "Look something up".to_string(),
            parameters: json!({"type": "object", "properties": {}}),
        }]);

    let body = serde_json::to_value(adapter.build_body(&request)).expect("serialize body");

    assert_eq!(body["temperature"].as_f64().map(|value| (value * 10.0).round()), Some(2.0));
    assert_eq!(body["stop"], json!(["END"]));
    assert!(body.get("top_p").is_none());
    assert_eq!(body["tool_choice"], "auto");
    assert_eq!(body["tools"][0]["type"], "function");
    assert_eq!(body["tools"][0]["function"]["name"], "lookup");
    assert_eq!(body["reasoning_effort"], "high");
}

#[test]
fn zai_and_bailian_add_dialect_thinking_parameters() {
    let request = CallRequest::new("glm-4", vec![UnifiedMessage::user("hi")]);

    let zai = OpenAiCompatibleAdapter::zai(Arc::new(FakeTransport::default()));
    let body = serde_json::to_value(zai.build_body(&request)).expect("serialize body");
    assert_eq!(body["thinking"]["type"], "disabled");

    let bailian = OpenAiCompatibleAdapter::bailian(Arc::new(FakeTransport::default()));
    let thinking = request
        .clone()
        .with_reasoning(ReasoningSettings::enabled().with_budget_tokens(512));
    let body = serde_json::to_value(bailian.build_body(&thinking)).expect("serialize body");
    assert_eq!(body["enable_thinking"], true);
    assert_eq!(body["thinking_budget"], 512);
}

#[test]
fn top_k_is_never_sent_to_openai_shaped_vendors() {
    let request = CallRequest::new("gpt-4o", vec![UnifiedMessage::user("hi")])
        .with_settings(CommonSettings::default().with_top_k(40).with_max_tokens(256));

    for adapter in [
        OpenAiCompatibleAdapter::openai(Arc::new(FakeTransport::default())),
        OpenAiCompatibleAdapter::bailian(Arc::new(FakeTransport::default())),
        OpenAiCompatibleAdapter::zai(Arc::new(FakeTransport::default())),
    ] {
        let body = serde_json::to_value(adapter.build_body(&request)).expect("serialize body");
        assert!(body.get("top_k").is_none());
        assert_eq!(body["max_tokens"], 256);
        assert!(body.get("max_completion_tokens").is_none());
    }
}

#[test]
fn reasoning_requests_move_token_limit_to_max_completion_tokens() {
    let adapter = OpenAiCompatibleAdapter::openai(Arc::new(FakeTransport::default()));
    let request = CallRequest::new("o3-mini", vec![UnifiedMessage::user("hi")])
        .with_settings(CommonSettings::default().with_max_tokens(1024))
        .with_reasoning(ReasoningSettings::enabled().with_effort(ReasoningEffort::Low));

    let body = serde_json::to_value(adapter.build_body(&request)).expect("serialize body");

    assert_eq!(body["max_completion_tokens"], 1024);
    assert!(body.get("max_tokens").is_none());
    assert_eq!(body["reasoning_effort"], "low");

    let plain = request.with_reasoning(ReasoningSettings::default());
    let body = serde_json::to_value(adapter.build_body(&plain)).expect("serialize body");
    assert_eq!(body["max_tokens"], 1024);
    assert!(body.get("max_completion_tokens").is_none());
}

#[test]
fn bailian_rewrites_native_api_path() {
    let adapter = OpenAiCompatibleAdapter::bailian(Arc::new(FakeTransport::default()));
    let config = ProviderConfig::new("k").with_base_url("https://dashscope.aliyuncs.com/api/v1");

    assert_eq!(
        adapter.base_url(&config),
        "https://dashscope.aliyuncs.com/compatible-mode/v1"
    );
}

#[test]
fn assistant_and_tool_messages_convert_to_wire_shape() {
    let assistant = UnifiedMessage::assistant_with_tool_calls(
        "",
        "thought about it",
        vec![ToolCall::new("call_1", "lookup", "{}")],
    );
    let converted = serde_json::to_value(convert_message(&assistant, MessageDialect::WithReasoning))
        .expect("serialize assistant");
    assert_eq!(converted["role"], "assistant");
    assert_eq!(converted["tool_calls"][0]["id"], "call_1");
    assert_eq!(converted["tool_calls"][0]["function"]["arguments"], "{}");
    assert_eq!(converted["reasoning_content"], "thought about it");

    let stripped = serde_json::to_value(convert_message(&assistant, MessageDialect::WithoutReasoning))
        .expect("serialize assistant");
    assert!(stripped.get("reasoning_content").is_none());

    let tool = UnifiedMessage::tool_result("call_1", "lookup", "{\"ok\":true}");
    let converted =
        serde_json::to_value(convert_message(&tool, MessageDialect::WithReasoning)).expect("serialize tool");
    assert_eq!(converted["role"], "tool");
    assert_eq!(converted["tool_call_id"], "call_1");
    assert_eq!(converted["content"], "{\"ok\":true}");
}

#[test]
fn system_images_are_dropped_but_user_images_kept() {
    let parts = MessageContent::Parts(vec![
        ContentPart::text("see"),
        ContentPart::image_url("https://example.com/a.png"),
    ]);

    let system = serde_json::to_value(convert_message(
        &UnifiedMessage::system(parts.clone()),
        MessageDialect::WithReasoning,
    ))
    .expect("serialize system");
    assert_eq!(system["content"], json!([{"type": "text", "text": "see"}]));

    let user = serde_json::to_value(convert_message(&UnifiedMessage::user(parts), MessageDialect::WithReasoning))
        .expect("serialize user");
    assert_eq!(user["content"][1]["type"], "image_url");
    assert_eq!(user["content"][1]["image_url"]["url"], "https://example.com/a.png");
}

#[test]
fn decoder_surfaces_mid_stream_error_objects() {
    let mut decoder = ChatCompletionsDecoder::default();
    let error = decoder
        .decode(r#"{"error":{"message":"context length exceeded"}}"#)
        .expect_err("error chunk");

    assert!(error.message.contains("context length exceeded"));
}

#[tokio::test]
async fn list_models_reads_names_and_string_pricing() {
    let transport = Arc::new(FakeTransport::default().with_json(Ok(json!({
        "data": [
            {"id": "gpt-4o", "created": 1715367049},
            {"id": "anthropic/claude", "name": "Claude", "context_length": 200000,
             "pricing": {"prompt": "0.000003", "completion": "0.000015"}}
        ]
    }))));
    let adapter = OpenAiCompatibleAdapter::openai(transport.clone());

    let models = adapter.list_models(&config()).await.expect("models");

    assert_eq!(models.len(), 2);
    assert_eq!(models[0].name.as_deref(), Some("gpt-4o"));
    assert_eq!(models[1].name.as_deref(), Some("Claude"));
    assert_eq!(models[1].context_length, Some(200_000));
    assert!(models[1].pricing.is_some_and(|pricing| pricing.completion > pricing.prompt));
    assert_eq!(transport.last_request().url, "https://api.example.com/v1/models");
}

#[tokio::test]
async fn check_uses_check_model_and_reports_failures() {
    let transport = Arc::new(
        FakeTransport::default()
            .with_json(Ok(json!({"choices": []})))
            .with_json(Err(ProviderError::authentication("invalid api key"))),
    );
    let adapter = OpenAiCompatibleAdapter::openai(transport.clone());
    let config = config().with_check_model("gpt-4o-mini");

    assert!(adapter.check(&config).await.success);
    assert_eq!(transport.last_body()["model"], "gpt-4o-mini");
    assert_eq!(transport.last_body()["max_tokens"], 5);

    let failed = adapter.check(&config).await;
    assert!(!failed.success);
    assert_eq!(failed.error.as_deref(), Some("invalid api key"));
}

#[tokio::test]
async fn bailian_check_treats_bad_request_as_reachable() {
    let transport = Arc::new(
        FakeTransport::default().with_json(Err(ProviderError::invalid_request("model not supported"))),
    );
    let adapter = OpenAiCompatibleAdapter::bailian(transport.clone());

    assert!(adapter.check(&ProviderConfig::new("k")).await.success);
    assert_eq!(transport.last_body()["model"], "qwen-plus");
    assert!(
        adapter
            .list_models(&ProviderConfig::new("k"))
            .await
            .expect("models")
            .is_empty()
    );
}
