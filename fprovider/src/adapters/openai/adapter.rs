//! OpenAI-compatible adapter over the shared HTTP transport.

use std::sync::Arc;

use async_stream::try_stream;
use futures_util::StreamExt;
use serde_json::{Value, json};

use crate::lines::{LineDecoder, SSE_DONE, sse_data};
use crate::transport::{HttpRequest, HttpTransport};
use crate::{
    CallRequest, CheckResult, EventStream, ModelInfo, ProtocolAdapter, ProtocolType,
    ProviderConfig, ProviderError, ProviderErrorKind, ProviderFuture, terminate,
};

use super::serde_api::{
    ApiModelList, ChatCompletionsDecoder, ChatCompletionsRequest, MessageDialect,
    build_api_request, check_request_body,
};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const BAILIAN_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";
pub const ZAI_BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v4";

/// One adapter for every vendor speaking Chat Completions; `protocol` selects the dialect.
#[derive(Clone)]
pub struct OpenAiCompatibleAdapter {
    protocol: ProtocolType,
    transport: Arc<dyn HttpTransport>,
}

impl OpenAiCompatibleAdapter {
    pub fn openai(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            protocol: ProtocolType::OpenAi,
            transport,
        }
    }

    pub fn bailian(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            protocol: ProtocolType::Bailian,
            transport,
        }
    }

    pub fn zai(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            protocol: ProtocolType::Zai,
            transport,
        }
    }

    pub(crate) fn base_url(&self, config: &ProviderConfig) -> String {
        match self.protocol {
            ProtocolType::Bailian => config
                .base_url_or(BAILIAN_BASE_URL)
                .replace("/api/v1", "/compatible-mode/v1"),
            ProtocolType::Zai => config.base_url_or(ZAI_BASE_URL),
            _ => config.base_url_or(OPENAI_BASE_URL),
        }
    }

    fn default_check_model(&self) -> &'static str {
        match self.protocol {
            ProtocolType::Bailian => "qwen-plus",
            ProtocolType::Zai => "glm-4-flash",
            _ => "gpt-3.5-turbo",
        }
    }

    pub(crate) fn build_body(&self, request: &CallRequest) -> ChatCompletionsRequest {
        let dialect = match self.protocol {
            ProtocolType::Zai => MessageDialect::WithoutReasoning,
            _ => MessageDialect::WithReasoning,
        };
        let mut body = build_api_request(request, dialect);
        let reasoning = request.reasoning.filter(|reasoning| reasoning.enabled);

        match self.protocol {
            ProtocolType::Zai => {
                let mode = if reasoning.is_some() { "enabled" } else { "disabled" };
                body.extra.insert("thinking".to_string(), json!({ "type": mode }));
            }
            ProtocolType::Bailian => {
                if let Some(reasoning) = reasoning {
                    body.extra.insert("enable_thinking".to_string(), Value::Bool(true));
                    if let Some(budget) = reasoning.budget_tokens {
                        body.extra.insert("thinking_budget".to_string(), json!(budget));
                    }
                }
            }
            _ => {
                if let Some(reasoning) = reasoning {
                    if let Some(effort) = reasoning.effort {
                        body.extra.insert(
                            "reasoning_effort".to_string(),
                            Value::String(effort.as_str().to_string()),
                        );
                    }
                    // Reasoning models reject `max_tokens`.
                    body.max_completion_tokens = body.max_tokens.take();
                }
            }
        }

        body
    }
}

impl ProtocolAdapter for OpenAiCompatibleAdapter {
    fn protocol(&self) -> ProtocolType {
        self.protocol
    }

    fn call<'a>(&'a self, request: CallRequest, config: ProviderConfig) -> EventStream<'a> {
        let url = format!("{}/chat/completions", self.base_url(&config));
        let body = self.build_body(&request);

        terminate(try_stream! {
            let http_request = HttpRequest::post(url, serde_json::to_value(&body)?)
                .bearer(config.api_key.expose());
            let mut chunks = self.transport.send_stream(http_request).await?;
            let mut lines = LineDecoder::new();
            let mut decoder = ChatCompletionsDecoder::default();

            'read: while let Some(chunk) = chunks.next().await {
                for line in lines.push(&chunk?)? {
                    let Some(payload) = sse_data(&line) else {
                        continue;
                    };
                    if payload == SSE_DONE {
                        break 'read;
                    }
                    for event in decoder.decode(payload)? {
                        yield event;
                    }
                }
            }

            for event in decoder.finish() {
                yield event;
            }
        })
    }

    fn check<'a>(&'a self, config: &'a ProviderConfig) -> ProviderFuture<'a, CheckResult> {
        Box::pin(async move {
            let model = config
                .check_model
                .as_deref()
                .unwrap_or(self.default_check_model());
            let request = HttpRequest::post(
                format!("{}/chat/completions", self.base_url(config)),
                check_request_body(model),
            )
            .bearer(config.api_key.expose());

            match self.transport.send_json(request).await {
                Ok(_) => CheckResult::ok(),
                // A rejected check body still proves the endpoint and key are live.
                Err(error)
                    if self.protocol == ProtocolType::Bailian
                        && error.kind == ProviderErrorKind::InvalidRequest =>
                {
                    CheckResult::ok()
                }
                Err(error) => CheckResult::failed(error.message),
            }
        })
    }

    fn list_models<'a>(
        &'a self,
        config: &'a ProviderConfig,
    ) -> ProviderFuture<'a, Result<Vec<ModelInfo>, ProviderError>> {
        Box::pin(async move {
            if self.protocol == ProtocolType::Bailian {
                return Ok(Vec::new());
            }

            let request = HttpRequest::get(format!("{}/models", self.base_url(config)))
                .bearer(config.api_key.expose());
            let value = self.transport.send_json(request).await?;
            let list = serde_json::from_value::<ApiModelList>(value)?;

            Ok(list.data.into_iter().map(ModelInfo::from).collect())
        })
    }
}
