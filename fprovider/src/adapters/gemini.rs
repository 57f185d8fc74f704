//! Gemini `generateContent` adapter.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use async_stream::try_stream;
use futures_util::StreamExt;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::lines::{LineDecoder, SSE_DONE, sse_data};
use crate::transport::{HttpRequest, HttpTransport};
use crate::{
    CallRequest, CheckResult, ContentPart, EventStream, ModelInfo, ProtocolAdapter, ProtocolType,
    ProviderConfig, ProviderError, ProviderFuture, Role, UnifiedMessage, UnifiedStreamEvent,
    Usage, terminate,
};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const ALLOWED_DOMAIN: &str = "googleapis.com";
const THOUGHT_SIGNATURE_PLACEHOLDER: &str = "skip_thought_signature_validator";
const MODELS_PAGE_SIZE: u32 = 1000;

#[derive(Clone)]
pub struct GeminiAdapter {
    transport: Arc<dyn HttpTransport>,
}

impl GeminiAdapter {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }
}

/// Configured base URL when it is https on a Google API domain, otherwise the default.
///
/// The API key travels in a header, so an arbitrary host must never receive it.
pub fn safe_base_url(config: &ProviderConfig) -> String {
    let Some(candidate) = config
        .base_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
    else {
        return GEMINI_BASE_URL.to_string();
    };

    let allowed = Url::parse(candidate).ok().is_some_and(|url| {
        url.scheme() == "https"
            && url.host_str().is_some_and(|host| {
                host == ALLOWED_DOMAIN || host.ends_with(&format!(".{ALLOWED_DOMAIN}"))
            })
    });

    if allowed {
        candidate.trim_end_matches('/').to_string()
    } else {
        GEMINI_BASE_URL.to_string()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest {
    contents: Vec<ApiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ApiContent>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    generation_config: Map<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
}

#[derive(Debug, Serialize, PartialEq)]
struct ApiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Value>,
}

pub(crate) fn build_request(request: &CallRequest) -> GenerateContentRequest {
    let settings = &request.settings;
    let mut generation_config = Map::new();

    let mut set = |key: &str, value: Option<Value>| {
        if let Some(value) = value {
            generation_config.insert(key.to_string(), value);
        }
    };
    set("temperature", settings.temperature.map(|value| json!(value)));
    set("topP", settings.top_p.map(|value| json!(value)));
    set("topK", settings.top_k.map(|value| json!(value)));
    set("maxOutputTokens", settings.max_tokens.map(|value| json!(value)));
    set("presencePenalty", settings.presence_penalty.map(|value| json!(value)));
    set("frequencyPenalty", settings.frequency_penalty.map(|value| json!(value)));
    set("seed", settings.seed.map(|value| json!(value)));
    set(
        "stopSequences",
        (!settings.stop.is_empty()).then(|| json!(settings.stop)),
    );

    if let Some(reasoning) = request.reasoning.filter(|reasoning| reasoning.enabled) {
        let mut thinking = json!({ "includeThoughts": true });
        if let Some(budget) = reasoning.budget_tokens {
            thinking["thinkingBudget"] = json!(budget);
        }
        generation_config.insert("thinkingConfig".to_string(), thinking);
    }

    let mut contents = request
        .messages
        .iter()
        .filter(|message| message.role != Role::System)
        .map(convert_message)
        .collect::<Vec<_>>();
    if contents.is_empty() {
        contents.push(ApiContent {
            role: Some("user"),
            parts: vec![json!({ "text": " " })],
        });
    }

    let system = request
        .messages
        .iter()
        .filter(|message| message.role == Role::System)
        .map(|message| message.content.text())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>();
    let system_instruction = (!system.is_empty()).then(|| ApiContent {
        role: None,
        parts: vec![json!({ "text": system.join("\n\n") })],
    });

    let declarations = request
        .tools
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "parameters": sanitize_schema(&tool.parameters),
            })
        })
        .collect::<Vec<_>>();
    let tools = if declarations.is_empty() {
        Vec::new()
    } else {
        vec![json!({ "functionDeclarations": declarations })]
    };

    GenerateContentRequest {
        contents,
        system_instruction,
        generation_config,
        tools,
    }
}

fn convert_message(message: &UnifiedMessage) -> ApiContent {
    if message.role == Role::Tool {
        return ApiContent {
            role: Some("user"),
            parts: vec![json!({
                "functionResponse": {
                    "name": message.name.as_deref().unwrap_or("unknown_function"),
                    "response": { "result": message.content.text() },
                }
            })],
        };
    }

    let mut parts = message
        .sanitized_content()
        .parts()
        .into_iter()
        .filter_map(|part| match part {
            ContentPart::Text { text } if text.is_empty() => None,
            ContentPart::Text { text } => Some(json!({ "text": text })),
            ContentPart::ImageUrl { url, .. } => Some(image_part(&url)),
        })
        .collect::<Vec<_>>();

    for (position, call) in message.tool_calls.iter().enumerate() {
        let args = serde_json::from_str::<Value>(&call.arguments).unwrap_or_else(|_| json!({}));
        let mut part = json!({ "functionCall": { "name": call.name, "args": args } });
        if position == 0 {
            part["thoughtSignature"] = json!(THOUGHT_SIGNATURE_PLACEHOLDER);
        }
        parts.push(part);
    }

    if parts.is_empty() {
        parts.push(json!({ "text": " " }));
    }

    let role = if message.role == Role::Assistant { "model" } else { "user" };
    ApiContent {
        role: Some(role),
        parts,
    }
}

/// Inline data URLs; remote URLs are referenced in text since inline data must be embedded.
fn image_part(url: &str) -> Value {
    let inline = url.strip_prefix("data:").and_then(|rest| rest.split_once(";base64,"));
    match inline {
        Some((mime_type, data)) => json!({ "inlineData": { "mimeType": mime_type, "data": data } }),
        None => json!({ "text": format!("[Image: {url}]") }),
    }
}

/// Gemini rejects JSON-schema keywords outside its OpenAPI subset.
fn sanitize_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(object) => Value::Object(
            object
                .iter()
                .filter(|(key, _)| !matches!(key.as_str(), "additionalProperties" | "$schema"))
                .map(|(key, value)| {
                    let value = match key.as_str() {
                        "properties" => match value {
                            Value::Object(properties) => Value::Object(
                                properties
                                    .iter()
                                    .map(|(name, property)| (name.clone(), sanitize_schema(property)))
                                    .collect(),
                            ),
                            other => other.clone(),
                        },
                        "items" => sanitize_schema(value),
                        _ => value.clone(),
                    };
                    (key.clone(), value)
                })
                .collect(),
        ),
        _ => json!({ "type": "object", "properties": {} }),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    error: Option<ChunkError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: Option<bool>,
    #[serde(default)]
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    #[serde(default)]
    name: String,
    #[serde(default)]
    args: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
    #[serde(default)]
    total_token_count: u64,
    #[serde(default)]
    thoughts_token_count: Option<u64>,
    #[serde(default)]
    cached_content_token_count: Option<u64>,
}

impl From<UsageMetadata> for Usage {
    fn from(value: UsageMetadata) -> Self {
        Usage {
            cached_tokens: value.cached_content_token_count,
            reasoning_tokens: value.thoughts_token_count,
            ..Usage::new(
                value.prompt_token_count,
                value.candidates_token_count,
                value.total_token_count,
            )
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChunkError {
    #[serde(default)]
    message: String,
}

static CALL_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Prefix for tool-call ids synthesized during one streamed call.
///
/// Gemini sends no call ids, so ids must stay unique across the steps of a conversation.
fn call_id_prefix() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    let sequence = CALL_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("call_{millis:x}{sequence:x}")
}

#[derive(Debug)]
struct GeminiDecoder {
    finish_reason: String,
    usage: Option<Usage>,
    call_prefix: String,
    next_call_index: u32,
}

impl GeminiDecoder {
    fn new(call_prefix: String) -> Self {
        Self {
            finish_reason: "stop".to_string(),
            usage: None,
            call_prefix,
            next_call_index: 0,
        }
    }
}

impl GeminiDecoder {
    fn decode(&mut self, payload: &str) -> Result<Vec<UnifiedStreamEvent>, ProviderError> {
        let chunk = serde_json::from_str::<StreamChunk>(payload)?;

        if let Some(error) = chunk.error {
            return Err(ProviderError::protocol(error.message));
        }

        let mut events = Vec::new();
        for candidate in chunk.candidates {
            if let Some(reason) = candidate.finish_reason {
                self.finish_reason = reason.to_lowercase();
            }

            let parts = candidate.content.map(|content| content.parts).unwrap_or_default();
            for part in parts {
                if let Some(text) = part.text.filter(|text| !text.is_empty()) {
                    if part.thought == Some(true) {
                        events.push(UnifiedStreamEvent::thinking(text));
                    } else {
                        events.push(UnifiedStreamEvent::content(text));
                    }
                }

                if let Some(call) = part.function_call {
                    let index = self.next_call_index;
                    self.next_call_index += 1;
                    let args = call.args.unwrap_or_else(|| json!({}));
                    events.push(UnifiedStreamEvent::tool_call(
                        index,
                        Some(format!("{}_{index}", self.call_prefix)),
                        Some(call.name),
                        Some(args.to_string()),
                    ));
                }
            }
        }

        if let Some(usage) = chunk.usage_metadata {
            self.usage = Some(usage.into());
        }

        Ok(events)
    }

    fn finish(self) -> UnifiedStreamEvent {
        UnifiedStreamEvent::finish(self.finish_reason, self.usage)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelPage {
    #[serde(default)]
    models: Vec<ApiModel>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiModel {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    input_token_limit: Option<u64>,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

impl From<ApiModel> for ModelInfo {
    fn from(value: ApiModel) -> Self {
        let id = value
            .name
            .strip_prefix("models/")
            .unwrap_or(&value.name)
            .to_string();

        Self {
            name: Some(value.display_name.unwrap_or_else(|| id.clone())),
            description: value.description,
            context_length: value.input_token_limit,
            ..ModelInfo::new(id)
        }
    }
}

impl ProtocolAdapter for GeminiAdapter {
    fn protocol(&self) -> ProtocolType {
        ProtocolType::Gemini
    }

    fn call<'a>(&'a self, request: CallRequest, config: ProviderConfig) -> EventStream<'a> {
        let url = format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            safe_base_url(&config),
            request.model
        );
        let body = build_request(&request);

        terminate(try_stream! {
            let http_request = HttpRequest::post(url, serde_json::to_value(&body)?)
                .header("x-goog-api-key", config.api_key.expose());
            let mut chunks = self.transport.send_stream(http_request).await?;
            let mut lines = LineDecoder::new();
            let mut decoder = GeminiDecoder::new(call_id_prefix());

            while let Some(chunk) = chunks.next().await {
                for line in lines.push(&chunk?)? {
                    let Some(payload) = sse_data(&line).filter(|payload| *payload != SSE_DONE) else {
                        continue;
                    };
                    for event in decoder.decode(payload)? {
                        yield event;
                    }
                }
            }

            yield decoder.finish();
        })
    }

    fn check<'a>(&'a self, config: &'a ProviderConfig) -> ProviderFuture<'a, CheckResult> {
        Box::pin(async move {
            let model = config
                .check_model
                .as_deref()
                .unwrap_or("gemini-1.5-flash-latest");
            let request = HttpRequest::post(
                format!("{}/v1beta/models/{model}:generateContent", safe_base_url(config)),
                json!({
                    "contents": [{ "parts": [{ "text": "hi" }] }],
                    "generationConfig": { "maxOutputTokens": 5 },
                }),
            )
            .header("x-goog-api-key", config.api_key.expose());

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
            let base = safe_base_url(config);
            let mut models = Vec::new();
            let mut page_token: Option<String> = None;

            loop {
                let mut url = format!("{base}/v1beta/models?pageSize={MODELS_PAGE_SIZE}");
                if let Some(token) = &page_token {
                    url.push_str(&format!("&pageToken={token}"));
                }

                let request = HttpRequest::get(url).header("x-goog-api-key", config.api_key.expose());
                let page = serde_json::from_value::<ModelPage>(self.transport.send_json(request).await?)?;

                models.extend(
                    page.models
                        .into_iter()
                        .filter(|model| {
                            model
                                .supported_generation_methods
                                .iter()
                                .any(|method| method == "generateContent")
                        })
                        .map(ModelInfo::from),
                );

                match page.next_page_token.filter(|token| !token.is_empty()) {
                    Some(token) => page_token = Some(token),
                    None => break,
                }
            }

            Ok(models)
        })
    }
}
