//! Anthropic Messages adapter, also serving Anthropic-compatible endpoints such as MiniMax.

use std::sync::Arc;

use async_stream::try_stream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::lines::{LineDecoder, sse_data};
use crate::transport::{HttpRequest, HttpTransport};
use crate::{
    CallRequest, CheckResult, ContentPart, EventStream, ModelInfo, ProtocolAdapter, ProtocolType,
    ProviderConfig, ProviderError, ProviderFuture, Role, UnifiedMessage, UnifiedStreamEvent,
    Usage, terminate,
};

pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const DEFAULT_THINKING_BUDGET: u32 = 1024;

#[derive(Clone)]
pub struct AnthropicAdapter {
    transport: Arc<dyn HttpTransport>,
}

impl AnthropicAdapter {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    fn request(&self, config: &ProviderConfig, body: Value) -> HttpRequest {
        HttpRequest::post(messages_url(config), body)
            .header("x-api-key", config.api_key.expose())
            .header("anthropic-version", ANTHROPIC_VERSION)
    }
}

fn is_minimax(config: &ProviderConfig) -> bool {
    config
        .base_url
        .as_deref()
        .is_some_and(|url| url.contains("minimax"))
}

pub(crate) fn messages_url(config: &ProviderConfig) -> String {
    let base = config.base_url_or(ANTHROPIC_BASE_URL);
    if base.ends_with("/v1") {
        format!("{base}/messages")
    } else {
        format!("{base}/v1/messages")
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct MessagesRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop_sequences: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking: Option<Value>,
}

#[derive(Debug, Serialize, PartialEq)]
struct ApiMessage {
    role: &'static str,
    content: Vec<ApiBlock>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiBlock {
    Text { text: String },
    Image { source: ImageSource },
    ToolUse { id: String, name: String, input: Value },
    ToolResult { tool_use_id: String, content: String },
}

#[derive(Debug, Serialize, PartialEq)]
struct ImageSource {
    r#type: &'static str,
    url: String,
}

#[derive(Debug, Serialize)]
struct ApiTool {
    name: String,
    description: String,
    input_schema: Value,
}

pub(crate) fn build_request(request: &CallRequest, minimax: bool) -> MessagesRequest {
    let settings = &request.settings;
    let (system, messages) = convert_messages(&request.messages);

    let tools = request
        .tools
        .iter()
        .map(|tool| ApiTool {
            name: tool.name.clone(),
            description: tool.description.clone(),
            input_schema: object_schema(&tool.parameters),
        })
        .collect::<Vec<_>>();
    let tool_choice = (!tools.is_empty()).then(|| json!({ "type": "auto" }));

    let max_tokens = settings.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
    let thinking = request
        .reasoning
        .filter(|reasoning| reasoning.enabled)
        .map(|reasoning| {
            let budget = reasoning
                .budget_tokens
                .unwrap_or(DEFAULT_THINKING_BUDGET)
                .min(max_tokens.saturating_sub(1));
            json!({ "type": "enabled", "budget_tokens": budget })
        });

    // MiniMax rejects top_k, stop sequences, and temperatures outside (0, 1].
    let temperature = match settings.temperature {
        Some(value) if minimax && (value <= 0.0 || value > 1.0) => Some(1.0),
        other => other,
    };

    MessagesRequest {
        model: request.model.clone(),
        max_tokens,
        system,
        messages,
        stream: true,
        temperature,
        top_p: settings.top_p,
        top_k: settings.top_k.filter(|_| !minimax),
        stop_sequences: if minimax { Vec::new() } else { settings.stop.clone() },
        tools,
        tool_choice,
        thinking,
    }
}

fn object_schema(parameters: &Value) -> Value {
    match parameters {
        Value::Object(schema) => {
            let mut schema = schema.clone();
            schema
                .entry("type")
                .or_insert_with(|| Value::String("object".to_string()));
            Value::Object(schema)
        }
        _ => json!({ "type": "object", "properties": {} }),
    }
}

/// System turns are lifted into `system`; consecutive tool results share one user turn.
fn convert_messages(messages: &[UnifiedMessage]) -> (Option<String>, Vec<ApiMessage>) {
    let mut system = Vec::new();
    let mut converted: Vec<ApiMessage> = Vec::new();

    for message in messages {
        match message.role {
            Role::System => {
                let text = message.content.text();
                if !text.is_empty() {
                    system.push(text);
                }
            }
            Role::Tool => {
                let block = ApiBlock::ToolResult {
                    tool_use_id: message.tool_call_id.clone().unwrap_or_default(),
                    content: message.content.text(),
                };

                match converted.last_mut() {
                    Some(last)
                        if last.role == "user"
                            && last
                                .content
                                .iter()
                                .all(|block| matches!(block, ApiBlock::ToolResult { .. })) =>
                    {
                        last.content.push(block);
                    }
                    _ => converted.push(ApiMessage {
                        role: "user",
                        content: vec![block],
                    }),
                }
            }
            Role::User | Role::Assistant => {
                let mut content = message
                    .sanitized_content()
                    .parts()
                    .into_iter()
                    .filter_map(|part| match part {
                        ContentPart::Text { text } if text.is_empty() => None,
                        ContentPart::Text { text } => Some(ApiBlock::Text { text }),
                        ContentPart::ImageUrl { url, .. } => Some(ApiBlock::Image {
                            source: ImageSource { r#type: "url", url },
                        }),
                    })
                    .collect::<Vec<_>>();

                content.extend(message.tool_calls.iter().map(|call| ApiBlock::ToolUse {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    input: serde_json::from_str(&call.arguments).unwrap_or_else(|_| json!({})),
                }));

                if content.is_empty() {
                    content.push(ApiBlock::Text {
                        text: " ".to_string(),
                    });
                }

                converted.push(ApiMessage {
                    role: message.role.as_str(),
                    content,
                });
            }
        }
    }

    let system = (!system.is_empty()).then(|| system.join("\n\n"));
    (system, converted)
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamPayload {
    MessageStart {
        message: MessageStartBody,
    },
    ContentBlockStart {
        #[serde(default)]
        index: u32,
        content_block: ContentBlock,
    },
    ContentBlockDelta {
        #[serde(default)]
        index: u32,
        delta: BlockDelta,
    },
    MessageDelta {
        #[serde(default)]
        delta: MessageDeltaBody,
        #[serde(default)]
        usage: Option<ApiUsage>,
    },
    Error {
        error: ApiErrorBody,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessageStartBody {
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    ToolUse {
        #[serde(default)]
        id: String,
        #[serde(default)]
        name: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockDelta {
    TextDelta { text: String },
    ThinkingDelta { thinking: String },
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct MessageDeltaBody {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    input_tokens: Option<u64>,
    #[serde(default)]
    output_tokens: Option<u64>,
    #[serde(default)]
    cache_read_input_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Debug)]
struct MessagesDecoder {
    finish_reason: String,
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
    cached_tokens: Option<u64>,
}

impl Default for MessagesDecoder {
    fn default() -> Self {
        Self {
            finish_reason: "end_turn".to_string(),
            input_tokens: None,
            output_tokens: None,
            cached_tokens: None,
        }
    }
}

impl MessagesDecoder {
    fn absorb_usage(&mut self, usage: ApiUsage) {
        self.input_tokens = usage.input_tokens.or(self.input_tokens);
        self.output_tokens = usage.output_tokens.or(self.output_tokens);
        self.cached_tokens = usage.cache_read_input_tokens.or(self.cached_tokens);
    }

    fn decode(&mut self, payload: &str) -> Result<Option<UnifiedStreamEvent>, ProviderError> {
        let event = match serde_json::from_str::<StreamPayload>(payload)? {
            StreamPayload::MessageStart { message } => {
                if let Some(usage) = message.usage {
                    self.absorb_usage(usage);
                }
                None
            }
            StreamPayload::ContentBlockStart {
                index,
                content_block: ContentBlock::ToolUse { id, name },
            } => {
                let id = if id.is_empty() { format!("call_{index}") } else { id };
                Some(UnifiedStreamEvent::tool_call(index, Some(id), Some(name), None))
            }
            StreamPayload::ContentBlockStart { .. } => None,
            StreamPayload::ContentBlockDelta { index, delta } => match delta {
                BlockDelta::TextDelta { text } if !text.is_empty() => {
                    Some(UnifiedStreamEvent::content(text))
                }
                BlockDelta::ThinkingDelta { thinking } if !thinking.is_empty() => {
                    Some(UnifiedStreamEvent::thinking(thinking))
                }
                BlockDelta::InputJsonDelta { partial_json } if !partial_json.is_empty() => {
                    Some(UnifiedStreamEvent::tool_call(index, None, None, Some(partial_json)))
                }
                _ => None,
            },
            StreamPayload::MessageDelta { delta, usage } => {
                if let Some(reason) = delta.stop_reason {
                    self.finish_reason = reason;
                }
                if let Some(usage) = usage {
                    self.absorb_usage(usage);
                }
                None
            }
            StreamPayload::Error { error } => {
                let message = if error.message.is_empty() {
                    "Anthropic API error".to_string()
                } else {
                    error.message
                };
                return Err(ProviderError::unavailable(message));
            }
            StreamPayload::Other => None,
        };

        Ok(event)
    }

    fn finish(self) -> UnifiedStreamEvent {
        let usage = (self.input_tokens.is_some() || self.output_tokens.is_some()).then(|| {
            let prompt = self.input_tokens.unwrap_or_default();
            let completion = self.output_tokens.unwrap_or_default();
            let usage = Usage::new(prompt, completion, prompt + completion);
            match self.cached_tokens {
                Some(cached) => usage.with_cached_tokens(cached),
                None => usage,
            }
        });

        UnifiedStreamEvent::finish(self.finish_reason, usage)
    }
}

impl ProtocolAdapter for AnthropicAdapter {
    fn protocol(&self) -> ProtocolType {
        ProtocolType::Anthropic
    }

    fn call<'a>(&'a self, request: CallRequest, config: ProviderConfig) -> EventStream<'a> {
        let body = build_request(&request, is_minimax(&config));

        terminate(try_stream! {
            let http_request = self.request(&config, serde_json::to_value(&body)?);
            let mut chunks = self.transport.send_stream(http_request).await?;
            let mut lines = LineDecoder::new();
            let mut decoder = MessagesDecoder::default();

            while let Some(chunk) = chunks.next().await {
                for line in lines.push(&chunk?)? {
                    let Some(payload) = sse_data(&line) else {
                        continue;
                    };
                    if let Some(event) = decoder.decode(payload)? {
                        yield event;
                    }
                }
            }

            yield decoder.finish();
        })
    }

    fn check<'a>(&'a self, config: &'a ProviderConfig) -> ProviderFuture<'a, CheckResult> {
        Box::pin(async move {
            let default_model = if is_minimax(config) {
                "MiniMax-M2.1"
            } else {
                "claude-3-5-sonnet-20241022"
            };
            let model = config.check_model.as_deref().unwrap_or(default_model);
            let body = json!({
                "model": model,
                "max_tokens": 5,
                "messages": [{ "role": "user", "content": [{ "type": "text", "text": "hi" }] }],
            });

            match self.transport.send_json(self.request(config, body)).await {
                Ok(_) => CheckResult::ok(),
                Err(error) => CheckResult::failed(error.message),
            }
        })
    }

    fn list_models<'a>(
        &'a self,
        config: &'a ProviderConfig,
    ) -> ProviderFuture<'a, Result<Vec<ModelInfo>, ProviderError>> {
        Box::pin(async move {
            let catalog: &[(&str, &str, u64)] = if is_minimax(config) {
                &[
                    ("MiniMax-M2.1", "MiniMax M2.1", 204_800),
                    ("MiniMax-M2.1-lightning", "MiniMax M2.1 Lightning", 204_800),
                    ("MiniMax-M2", "MiniMax M2", 204_800),
                ]
            } else {
                &[
                    ("claude-3-5-sonnet-20241022", "Claude 3.5 Sonnet", 200_000),
                    ("claude-3-opus-20240229", "Claude 3 Opus", 200_000),
                    ("claude-3-sonnet-20240229", "Claude 3 Sonnet", 200_000),
                    ("claude-3-haiku-20240307", "Claude 3 Haiku", 200_000),
                ]
            };

            Ok(catalog
                .iter()
                .map(|(id, name, context_length)| {
                    ModelInfo::new(*id)
                        .with_name(*name)
                        .with_context_length(*context_length)
                })
                .collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::testing::FakeTransport;
    use crate::{CommonSettings, ReasoningSettings, ToolCall, ToolCallAccumulator, ToolDefinition};

    fn sse(events: &[Value]) -> Vec<String> {
        events
            .iter()
            .map(|event| format!("event: {}\ndata: {}\n\n", event["type"].as_str().unwrap_or(""), event))
            .collect()
    }

    async fn run(transport: Arc<FakeTransport>, config: ProviderConfig) -> Vec<UnifiedStreamEvent> {
        let adapter = AnthropicAdapter::new(transport);
        adapter
            .call(CallRequest::new("claude-3-5-sonnet-20241022", vec![UnifiedMessage::user("hi")]), config)
            .collect()
            .await
    }

    #[tokio::test]
    async fn call_decodes_text_thinking_tool_use_and_usage() {
        let chunks = sse(&[
            json!({"type": "message_start", "message": {"usage": {"input_tokens": 12, "output_tokens": 1}}}),
            json!({"type": "content_block_start", "index": 0, "content_block": {"type": "thinking", "thinking": ""}}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "thinking_delta", "thinking": "plan"}}),
            json!({"type": "content_block_delta", "index": 1, "delta": {"type": "text_delta", "text": "Let me look."}}),
            json!({"type": "ping"}),
            json!({"type": "content_block_start", "index": 2, "content_block": {"type": "tool_use", "id": "toolu_1", "name": "search", "input": {}}}),
            json!({"type": "content_block_delta", "index": 2, "delta": {"type": "input_json_delta", "partial_json": "{\"q\":"}}),
            json!({"type": "content_block_delta", "index": 2, "delta": {"type": "input_json_delta", "partial_json": "\"rust\"}"}}),
            json!({"type": "message_delta", "delta": {"stop_reason": "tool_use"}, "usage": {"output_tokens": 30}}),
            json!({"type": "message_stop"}),
        ]);
        let chunk_refs = chunks.iter().map(String::as_str).collect::<Vec<_>>();
        let transport = Arc::new(FakeTransport::default().with_stream(&chunk_refs));

        let events = run(transport.clone(), ProviderConfig::new("sk-ant")).await;

        assert_eq!(events[0], UnifiedStreamEvent::thinking("plan"));
        assert_eq!(events[1], UnifiedStreamEvent::content("Let me look."));
        assert_eq!(
            events.last(),
            Some(&UnifiedStreamEvent::finish("tool_use", Some(Usage::new(12, 30, 42))))
        );

        let mut accumulator = ToolCallAccumulator::new();
        for event in &events {
            accumulator.apply(event);
        }
        assert_eq!(
            accumulator.finish(),
            vec![ToolCall::new("toolu_1", "search", "{\"q\":\"rust\"}")]
        );

        let request = transport.last_request();
        assert_eq!(request.url, "https://api.anthropic.com/v1/messages");
        assert_eq!(request.header_value("x-api-key"), Some("sk-ant"));
        assert_eq!(request.header_value("anthropic-version"), Some(ANTHROPIC_VERSION));
    }

    #[tokio::test]
    async fn error_event_terminates_stream() {
        let chunks = sse(&[
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "par"}}),
            json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}),
        ]);
        let chunk_refs = chunks.iter().map(String::as_str).collect::<Vec<_>>();
        let transport = Arc::new(FakeTransport::default().with_stream(&chunk_refs));

        let events = run(transport, ProviderConfig::new("sk-ant")).await;

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], UnifiedStreamEvent::Error { message } if message.contains("Overloaded")));
    }

    #[tokio::test]
    async fn stream_without_message_delta_finishes_with_end_turn() {
        let chunks = sse(&[json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "ok"}})]);
        let chunk_refs = chunks.iter().map(String::as_str).collect::<Vec<_>>();
        let transport = Arc::new(FakeTransport::default().with_stream(&chunk_refs));

        let events = run(transport, ProviderConfig::new("sk-ant")).await;

        assert_eq!(events.last(), Some(&UnifiedStreamEvent::finish("end_turn", None)));
    }

    #[test]
    fn messages_url_respects_versioned_base() {
        let versioned = ProviderConfig::new("k").with_base_url("https://proxy.local/v1");
        assert_eq!(messages_url(&versioned), "https://proxy.local/v1/messages");

        let minimax = ProviderConfig::new("k").with_base_url("https://api.minimaxi.com/anthropic");
        assert_eq!(messages_url(&minimax), "https://api.minimaxi.com/anthropic/v1/messages");
    }

    #[test]
    fn request_lifts_system_and_groups_tool_results() {
        let request = CallRequest::new(
            "claude",
            vec![
                UnifiedMessage::system("be brief"),
                UnifiedMessage::system("cite sources"),
                UnifiedMessage::user("weather and time?"),
                UnifiedMessage::assistant_with_tool_calls(
                    "",
                    "",
                    vec![
                        ToolCall::new("t1", "weather", "{\"city\":\"Oslo\"}"),
                        ToolCall::new("t2", "clock", "not json"),
                    ],
                ),
                UnifiedMessage::tool_result("t1", "weather", "rain"),
                UnifiedMessage::tool_result("t2", "clock", "noon"),
            ],
        )
        .with_settings(CommonSettings::default().with_stop(["###"]))
        .with_tools(vec![ToolDefinition {
            name: "weather".to_string(),
            description: "Weather lookup".to_string(),
            parameters: json!({"properties": {"city": {"type": "string"}}}),
        }]);

        let body = serde_json::to_value(build_request(&request, false)).expect("serialize body");

        assert_eq!(body["system"], "be brief\n\ncite sources");
        assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);
        assert_eq!(body["messages"].as_array().map(Vec::len), Some(3));
        assert_eq!(body["messages"][1]["content"][0]["type"], "tool_use");
        assert_eq!(body["messages"][1]["content"][0]["input"]["city"], "Oslo");
        assert_eq!(body["messages"][1]["content"][1]["input"], json!({}));
        assert_eq!(body["messages"][2]["role"], "user");
        assert_eq!(body["messages"][2]["content"][1]["tool_use_id"], "t2");
        assert_eq!(body["tools"][0]["input_schema"]["type"], "object");
        assert_eq!(body["tool_choice"]["type"], "auto");
        assert_eq!(body["stop_sequences"], json!(["###"]));
        assert!(body.get("thinking").is_none());
    }

    #[test]
    fn minimax_drops_unsupported_parameters_and_thinking_is_bounded() {
        let mut settings = CommonSettings::default().with_temperature(1.5).with_stop(["x"]);
        settings.top_k = Some(40);
        let request = CallRequest::new("MiniMax-M2.1", vec![UnifiedMessage::user("hi")])
            .with_settings(settings.with_max_tokens(512))
            .with_reasoning(ReasoningSettings::enabled().with_budget_tokens(2048));

        let body = serde_json::to_value(build_request(&request, true)).expect("serialize body");

        assert_eq!(body["temperature"], 1.0);
        assert!(body.get("top_k").is_none());
        assert!(body.get("stop_sequences").is_none());
        assert_eq!(body["thinking"]["budget_tokens"], 511);
    }

    #[tokio::test]
    async fn list_models_uses_vendor_catalog() {
        let adapter = AnthropicAdapter::new(Arc::new(FakeTransport::default()));

        let claude = adapter.list_models(&ProviderConfig::new("k")).await.expect("models");
        assert_eq!(claude.len(), 4);
        assert_eq!(claude[0].context_length, Some(200_000));

        let minimax = adapter
            .list_models(&ProviderConfig::new("k").with_base_url("https://api.minimaxi.com/anthropic"))
            .await
            .expect("models");
        assert_eq!(minimax[0].id, "MiniMax-M2.1");
    }

    #[tokio::test]
    async fn check_defaults_model_by_endpoint() {
        let transport = Arc::new(FakeTransport::default().with_json(Ok(json!({"id": "msg"}))));
        let adapter = AnthropicAdapter::new(transport.clone());

        let result = adapter
            .check(&ProviderConfig::new("k").with_base_url("https://api.minimaxi.com/anthropic"))
            .await;

        assert!(result.success);
        assert_eq!(transport.last_body()["model"], "MiniMax-M2.1");
        assert_eq!(transport.last_body()["max_tokens"], 5);
    }
}
