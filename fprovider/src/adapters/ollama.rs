//! Ollama native chat adapter (`/api/chat`, NDJSON stream).

use std::sync::Arc;

use async_stream::try_stream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::lines::LineDecoder;
use crate::transport::{HttpRequest, HttpTransport};
use crate::{
    CallRequest, CheckResult, ContentPart, EventStream, ModelInfo, ProtocolAdapter, ProtocolType,
    ProviderConfig, ProviderError, ProviderFuture, Role, UnifiedMessage, UnifiedStreamEvent,
    Usage, terminate,
};

pub const OLLAMA_HOST_URL: &str = "http://localhost:11434";

#[derive(Clone)]
pub struct OllamaAdapter {
    transport: Arc<dyn HttpTransport>,
}

impl OllamaAdapter {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    fn request(&self, request: HttpRequest, config: &ProviderConfig) -> HttpRequest {
        // Local daemons need no key; hosted gateways in front of Ollama do.
        if config.api_key.is_empty() {
            request
        } else {
            request.bearer(config.api_key.expose())
        }
    }
}

/// Native API host: the configured base URL with any OpenAI-compat `/v1` suffix removed.
pub fn host_url(config: &ProviderConfig) -> String {
    let base = config.base_url_or(OLLAMA_HOST_URL);
    base.strip_suffix("/v1")
        .map(str::to_string)
        .unwrap_or(base)
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Map::is_empty")]
    options: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    think: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<Value>,
}

pub(crate) fn build_request(request: &CallRequest) -> ChatRequest {
    let settings = &request.settings;
    let mut options = Map::new();

    let mut set = |key: &str, value: Option<Value>| {
        if let Some(value) = value {
            options.insert(key.to_string(), value);
        }
    };
    set("temperature", settings.temperature.map(|value| json!(value)));
    set("top_p", settings.top_p.map(|value| json!(value)));
    set("top_k", settings.top_k.map(|value| json!(value)));
    set("num_predict", settings.max_tokens.map(|value| json!(value)));
    set("seed", settings.seed.map(|value| json!(value)));
    set("presence_penalty", settings.presence_penalty.map(|value| json!(value)));
    set("frequency_penalty", settings.frequency_penalty.map(|value| json!(value)));
    set("stop", (!settings.stop.is_empty()).then(|| json!(settings.stop)));

    let think = request
        .reasoning
        .filter(|reasoning| reasoning.enabled)
        .map(|_| true);

    let tools = request
        .tools
        .iter()
        .map(|tool| {
            json!({
                "type": "function",
                "function": {
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.parameters,
                }
            })
        })
        .collect();

    ChatRequest {
        model: request.model.clone(),
        messages: request.messages.iter().map(convert_message).collect(),
        stream: true,
        options,
        think,
        tools,
    }
}

fn convert_message(message: &UnifiedMessage) -> ChatMessage {
    let mut text = Vec::new();
    let mut images = Vec::new();

    for part in message.sanitized_content().parts() {
        match part {
            ContentPart::Text { text: value } => text.push(value),
            ContentPart::ImageUrl { url, .. } => {
                // Only inline images can be forwarded; the daemon does not fetch URLs.
                if let Some((_, payload)) = url
                    .strip_prefix("data:")
                    .and_then(|rest| rest.split_once(";base64,"))
                {
                    images.push(payload.to_string());
                }
            }
        }
    }

    let tool_calls = message
        .tool_calls
        .iter()
        .map(|call| {
            let arguments =
                serde_json::from_str::<Value>(&call.arguments).unwrap_or_else(|_| json!({}));
            json!({ "function": { "name": call.name, "arguments": arguments } })
        })
        .collect();

    ChatMessage {
        role: message.role.as_str(),
        content: text.join(""),
        images,
        tool_calls,
    }
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    thinking: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ChunkToolCall>,
}

#[derive(Debug, Deserialize)]
struct ChunkToolCall {
    function: ChunkFunction,
}

#[derive(Debug, Deserialize)]
struct ChunkFunction {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

#[derive(Debug, Default)]
struct OllamaDecoder {
    next_call_index: u32,
}

impl OllamaDecoder {
    fn decode(&mut self, line: &str) -> Result<Vec<UnifiedStreamEvent>, ProviderError> {
        let chunk = serde_json::from_str::<ChatChunk>(line)?;

        if let Some(error) = chunk.error {
            return Err(ProviderError::unavailable(error));
        }

        let mut events = Vec::new();
        if let Some(message) = chunk.message {
            if let Some(thinking) = message.thinking.filter(|value| !value.is_empty()) {
                events.push(UnifiedStreamEvent::thinking(thinking));
            }
            if let Some(content) = message.content.filter(|value| !value.is_empty()) {
                events.push(UnifiedStreamEvent::content(content));
            }
            for call in message.tool_calls {
                let index = self.next_call_index;
                self.next_call_index += 1;
                let arguments = call.function.arguments.unwrap_or_else(|| json!({}));
                events.push(UnifiedStreamEvent::tool_call(
                    index,
                    Some(format!("call_{index}")),
                    Some(call.function.name),
                    Some(arguments.to_string()),
                ));
            }
        }

        if chunk.done {
            let prompt = chunk.prompt_eval_count.unwrap_or(0);
            let completion = chunk.eval_count.unwrap_or(0);
            let usage = (chunk.prompt_eval_count.is_some() || chunk.eval_count.is_some())
                .then(|| Usage::new(prompt, completion, prompt + completion));
            events.push(UnifiedStreamEvent::finish(
                chunk.done_reason.unwrap_or_else(|| "stop".to_string()),
                usage,
            ));
        }

        Ok(events)
    }
}

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    models: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
struct Tag {
    name: String,
}

impl ProtocolAdapter for OllamaAdapter {
    fn protocol(&self) -> ProtocolType {
        ProtocolType::Ollama
    }

    fn call<'a>(&'a self, request: CallRequest, config: ProviderConfig) -> EventStream<'a> {
        let url = format!("{}/api/chat", host_url(&config));
        let body = build_request(&request);

        terminate(try_stream! {
            let http_request = self.request(HttpRequest::post(url, serde_json::to_value(&body)?), &config);
            let mut chunks = self.transport.send_stream(http_request).await?;
            let mut lines = LineDecoder::new();
            let mut decoder = OllamaDecoder::default();

            while let Some(chunk) = chunks.next().await {
                for line in lines.push(&chunk?)? {
                    if line.trim().is_empty() {
                        continue;
                    }
                    for event in decoder.decode(&line)? {
                        yield event;
                    }
                }
            }

            if let Some(line) = lines.finish()? {
                for event in decoder.decode(&line)? {
                    yield event;
                }
            }
        })
    }

    fn check<'a>(&'a self, config: &'a ProviderConfig) -> ProviderFuture<'a, CheckResult> {
        Box::pin(async move {
            let request = self.request(HttpRequest::get(format!("{}/api/tags", host_url(config))), config);

            match self.transport.send_json(request).await {
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
            let request = self.request(HttpRequest::get(format!("{}/api/tags", host_url(config))), config);
            let tags = serde_json::from_value::<TagList>(self.transport.send_json(request).await?)?;

            let mut names = tags.models.into_iter().map(|tag| tag.name).collect::<Vec<_>>();
            names.sort();

            Ok(names.into_iter().map(ModelInfo::new).collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::testing::FakeTransport;
    use crate::{CommonSettings, MessageContent, ReasoningSettings, ToolCall};

    #[test]
    fn host_strips_openai_compat_suffix() {
        assert_eq!(host_url(&ProviderConfig::new("")), OLLAMA_HOST_URL);
        assert_eq!(
            host_url(&ProviderConfig::new("").with_base_url("http://gpu-box:11434/v1/")),
            "http://gpu-box:11434"
        );
    }

    #[test]
    fn request_carries_options_think_and_inline_images() {
        let request = CallRequest::new(
            "llava",
            vec![
                UnifiedMessage::user(MessageContent::Parts(vec![
                    ContentPart::text("what is this?"),
                    ContentPart::image_url("data:image/png;base64,iVBOR"),
                    ContentPart::image_url("https://example.com/remote.png"),
                ])),
                UnifiedMessage::assistant_with_tool_calls(
                    "",
                    "",
                    vec![ToolCall::new("call_0", "lookup", "{\"q\":\"png\"}")],
                ),
            ],
        )
        .with_settings(CommonSettings::default().with_temperature(0.5).with_max_tokens(64))
        .with_reasoning(ReasoningSettings::enabled());

        let body = serde_json::to_value(build_request(&request)).expect("serialize body");

        assert_eq!(body["stream"], true);
        assert_eq!(body["think"], true);
        assert_eq!(body["options"]["num_predict"], 64);
        assert_eq!(body["options"]["temperature"], 0.5);
        assert!(body["options"].get("seed").is_none());
        assert_eq!(body["messages"][0]["images"], json!(["iVBOR"]));
        assert_eq!(body["messages"][0]["content"], "what is this?");
        assert_eq!(body["messages"][1]["tool_calls"][0]["function"]["arguments"]["q"], "png");
    }

    #[tokio::test]
    async fn call_decodes_ndjson_stream() {
        let transport = Arc::new(FakeTransport::default().with_stream(&[
            "{\"message\":{\"role\":\"assistant\",\"content\":\"\",\"thinking\":\"mull\"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"Hi\"},\"done\":false}\n{\"message\":{\"role\":\"assistant\",\"content\":\"\",",
            "\"tool_calls\":[{\"function\":{\"name\":\"clock\",\"arguments\":{}}}]},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true,\"done_reason\":\"stop\",\"prompt_eval_count\":7,\"eval_count\":3}",
        ]));
        let adapter = OllamaAdapter::new(transport.clone());

        let events = adapter
            .call(
                CallRequest::new("llama3.2", vec![UnifiedMessage::user("hi")]),
                ProviderConfig::new(""),
            )
            .collect::<Vec<_>>()
            .await;

        assert_eq!(
            events,
            vec![
                UnifiedStreamEvent::thinking("mull"),
                UnifiedStreamEvent::content("Hi"),
                UnifiedStreamEvent::tool_call(
                    0,
                    Some("call_0".to_string()),
                    Some("clock".to_string()),
                    Some("{}".to_string()),
                ),
                UnifiedStreamEvent::finish("stop", Some(Usage::new(7, 3, 10))),
            ]
        );

        let request = transport.last_request();
        assert_eq!(request.url, "http://localhost:11434/api/chat");
        assert!(request.header_value("Authorization").is_none());
    }

    #[tokio::test]
    async fn list_models_sorts_tag_names() {
        let transport = Arc::new(FakeTransport::default().with_json(Ok(json!({
            "models": [{"name": "qwen3:8b"}, {"name": "llama3.2:latest"}]
        }))));
        let adapter = OllamaAdapter::new(transport.clone());

        let models = adapter
            .list_models(&ProviderConfig::new(""))
            .await
            .expect("models");

        assert_eq!(
            models.iter().map(|model| model.id.as_str()).collect::<Vec<_>>(),
            vec!["llama3.2:latest", "qwen3:8b"]
        );
        assert_eq!(transport.last_request().url, "http://localhost:11434/api/tags");
    }

    #[tokio::test]
    async fn check_reports_unreachable_daemon() {
        let transport = Arc::new(
            FakeTransport::default().with_json(Err(ProviderError::transport("connection refused"))),
        );
        let adapter = OllamaAdapter::new(transport);

        let result = adapter.check(&ProviderConfig::new("")).await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("connection refused"));
    }
}
