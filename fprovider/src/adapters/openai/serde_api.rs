//! Chat Completions payload serde models and conversion helpers.
//!
//! Shared by every OpenAI-shaped dialect (OpenAI, Bailian, Zai, Perplexity).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::{
    CallRequest, ContentPart, MessageContent, ModelInfo, ModelPricing, ProviderError, Role,
    ToolDefinition, UnifiedMessage, UnifiedStreamEvent, Usage,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MessageDialect {
    /// Assistant turns keep `reasoning_content`.
    WithReasoning,
    /// `reasoning_content` is stripped before sending.
    WithoutReasoning,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionsRequest {
    pub model: String,
    pub messages: Vec<ApiMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ApiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<&'static str>,
    /// Dialect-specific parameters merged into the top-level body.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct StreamOptions {
    pub include_usage: bool,
}

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct ApiMessage {
    pub role: &'static str,
    pub content: ApiContent,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ApiToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub(crate) enum ApiContent {
    Text(String),
    Parts(Vec<ApiContentPart>),
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ApiContentPart {
    Text { text: String },
    ImageUrl { image_url: ApiImageUrl },
}

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct ApiImageUrl {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct ApiToolCall {
    pub id: String,
    pub r#type: &'static str,
    pub function: ApiFunctionCall,
}

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct ApiFunctionCall {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ApiTool {
    pub r#type: &'static str,
    pub function: ApiFunction,
}

#[derive(Debug, Serialize)]
pub(crate) struct ApiFunction {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl From<&ToolDefinition> for ApiTool {
    fn from(value: &ToolDefinition) -> Self {
        Self {
            r#type: "function",
            function: ApiFunction {
                name: value.name.clone(),
                description: value.description.clone(),
                parameters: value.parameters.clone(),
            },
        }
    }
}

pub(crate) fn build_api_request(request: &CallRequest, dialect: MessageDialect) -> ChatCompletionsRequest {
    let settings = &request.settings;
    let tools = request.tools.iter().map(ApiTool::from).collect::<Vec<_>>();
    let tool_choice = (!tools.is_empty()).then_some("auto");

    ChatCompletionsRequest {
        model: request.model.clone(),
        messages: request
            .messages
            .iter()
            .map(|message| convert_message(message, dialect))
            .collect(),
        stream: true,
        stream_options: Some(StreamOptions {
            include_usage: true,
        }),
        temperature: settings.temperature,
        top_p: settings.top_p,
        // Only vendors that accept `top_k` opt back in.
        top_k: None,
        max_tokens: settings.max_tokens,
        max_completion_tokens: None,
        presence_penalty: settings.presence_penalty,
        frequency_penalty: settings.frequency_penalty,
        seed: settings.seed,
        stop: settings.stop.clone(),
        tools,
        tool_choice,
        extra: Map::new(),
    }
}

/// Minimal request used by connectivity checks.
pub(crate) fn check_request_body(model: &str) -> Value {
    json!({
        "model": model,
        "messages": [{ "role": "user", "content": "hi" }],
        "max_tokens": 5,
    })
}

pub(crate) fn convert_message(message: &UnifiedMessage, dialect: MessageDialect) -> ApiMessage {
    let tool_calls = message
        .tool_calls
        .iter()
        .map(|call| ApiToolCall {
            id: call.id.clone(),
            r#type: "function",
            function: ApiFunctionCall {
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            },
        })
        .collect::<Vec<_>>();

    let flatten_to_text = message.role == Role::Tool || !tool_calls.is_empty();
    let content = match message.sanitized_content() {
        MessageContent::Text(text) => ApiContent::Text(text),
        parts if flatten_to_text => ApiContent::Text(parts.text()),
        MessageContent::Parts(parts) if parts.is_empty() => ApiContent::Text(String::new()),
        MessageContent::Parts(parts) => ApiContent::Parts(parts.into_iter().map(convert_part).collect()),
    };

    let reasoning_content = match dialect {
        MessageDialect::WithReasoning if message.role == Role::Assistant => message.reasoning.clone(),
        _ => None,
    };

    ApiMessage {
        role: message.role.as_str(),
        content,
        tool_calls,
        tool_call_id: message.tool_call_id.clone(),
        name: (message.role == Role::Tool)
            .then(|| message.name.clone())
            .flatten(),
        reasoning_content,
    }
}

fn convert_part(part: ContentPart) -> ApiContentPart {
    match part {
        ContentPart::Text { text } => ApiContentPart::Text { text },
        ContentPart::ImageUrl { url, detail } => ApiContentPart::ImageUrl {
            image_url: ApiImageUrl { url, detail },
        },
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiStreamChunk {
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub choices: Vec<ApiStreamChoice>,
    #[serde(default)]
    pub usage: Option<Usage>,
    #[serde(default)]
    pub citations: Option<Vec<String>>,
    #[serde(default)]
    pub search_results: Option<Vec<ApiSearchResult>>,
    #[serde(default)]
    pub error: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiStreamChoice {
    #[serde(default)]
    pub delta: Option<ApiStreamDelta>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiStreamDelta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub reasoning_content: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ApiDeltaToolCall>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiDeltaToolCall {
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<ApiDeltaToolFunction>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiDeltaToolFunction {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub(crate) struct ApiSearchResult {
    #[serde(default)]
    pub title: Option<String>,
    pub url: String,
}

/// Stateful translator from Chat Completions chunks to canonical events.
#[derive(Debug)]
pub(crate) struct ChatCompletionsDecoder {
    finish_reason: String,
    usage: Option<Usage>,
    citations: Vec<String>,
    search_results: Vec<ApiSearchResult>,
}

impl Default for ChatCompletionsDecoder {
    fn default() -> Self {
        Self {
            finish_reason: "stop".to_string(),
            usage: None,
            citations: Vec::new(),
            search_results: Vec::new(),
        }
    }
}

impl ChatCompletionsDecoder {
    pub(crate) fn decode(&mut self, payload: &str) -> Result<Vec<UnifiedStreamEvent>, ProviderError> {
        let chunk = serde_json::from_str::<ApiStreamChunk>(payload)?;

        if let Some(error) = chunk.error {
            return Err(ProviderError::protocol(stream_error_message(&error)));
        }

        if let Some(usage) = chunk.usage {
            self.usage = Some(usage);
        }
        if let Some(citations) = chunk.citations.filter(|items| !items.is_empty()) {
            self.citations = citations;
        }
        if let Some(results) = chunk.search_results.filter(|items| !items.is_empty()) {
            self.search_results = results;
        }

        let reasoning_chunk = chunk.object.as_deref() == Some("chat.reasoning");
        let mut events = Vec::new();

        let Some(choice) = chunk.choices.into_iter().next() else {
            return Ok(events);
        };

        if let Some(reason) = choice.finish_reason.filter(|reason| !reason.is_empty()) {
            self.finish_reason = reason;
        }

        let Some(delta) = choice.delta else {
            return Ok(events);
        };

        if let Some(content) = delta.content.filter(|content| !content.is_empty()) {
            if reasoning_chunk {
                events.push(UnifiedStreamEvent::thinking(content));
            } else {
                events.push(UnifiedStreamEvent::Content {
                    delta: content,
                    role: Some(delta_role(delta.role.as_deref())),
                });
            }
        }

        if let Some(reasoning) = delta
            .reasoning_content
            .or(delta.reasoning)
            .filter(|reasoning| !reasoning.is_empty())
        {
            events.push(UnifiedStreamEvent::thinking(reasoning));
        }

        for (position, call) in delta.tool_calls.unwrap_or_default().into_iter().enumerate() {
            let (name, arguments) = match call.function {
                Some(function) => (function.name, function.arguments),
                None if call.id.is_some() => (None, None),
                None => continue,
            };
            let index = call.index.unwrap_or(position as u32);
            events.push(UnifiedStreamEvent::tool_call(index, call.id, name, arguments));
        }

        Ok(events)
    }

    /// Trailing events: collected sources (if any), then the single `finish`.
    pub(crate) fn finish(self) -> Vec<UnifiedStreamEvent> {
        let mut events = Vec::new();

        if let Some(sources) = format_sources(&self.search_results, &self.citations) {
            events.push(UnifiedStreamEvent::system(sources));
        }

        events.push(UnifiedStreamEvent::finish(self.finish_reason, self.usage));
        events
    }
}

fn delta_role(role: Option<&str>) -> Role {
    match role {
        Some("user") => Role::User,
        Some("system") => Role::System,
        _ => Role::Assistant,
    }
}

fn stream_error_message(error: &Value) -> String {
    error
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| error.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string())
}

fn format_sources(search_results: &[ApiSearchResult], citations: &[String]) -> Option<String> {
    let lines = if search_results.is_empty() {
        citations
            .iter()
            .enumerate()
            .map(|(index, url)| format!("{}. {url}", index + 1))
            .collect::<Vec<_>>()
    } else {
        search_results
            .iter()
            .enumerate()
            .map(|(index, result)| match result.title.as_deref() {
                Some(title) if !title.is_empty() => format!("{}. [{title}]({})", index + 1, result.url),
                _ => format!("{}. {}", index + 1, result.url),
            })
            .collect::<Vec<_>>()
    };

    (!lines.is_empty()).then(|| format!("Sources:\n{}", lines.join("\n")))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiModelList {
    #[serde(default)]
    pub data: Vec<ApiModel>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiModel {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "displayName")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub context_length: Option<u64>,
    #[serde(default)]
    pub pricing: Option<ApiPricing>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiPricing {
    #[serde(default)]
    pub prompt: Option<Value>,
    #[serde(default)]
    pub completion: Option<Value>,
}

impl From<ApiModel> for ModelInfo {
    fn from(value: ApiModel) -> Self {
        let name = value
            .name
            .or(value.display_name)
            .unwrap_or_else(|| value.id.clone());

        Self {
            name: Some(name),
            description: value.description,
            created: value.created,
            context_length: value.context_length,
            pricing: value.pricing.map(|pricing| ModelPricing {
                prompt: price(pricing.prompt.as_ref()),
                completion: price(pricing.completion.as_ref()),
            }),
            ..ModelInfo::new(value.id)
        }
    }
}

/// Aggregators report prices as decimal strings; others as numbers.
fn price(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(number)) => number.as_f64().unwrap_or_default(),
        Some(Value::String(text)) => text.parse().unwrap_or_default(),
        _ => 0.0,
    }
}
