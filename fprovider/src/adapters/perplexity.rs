//! Perplexity search-grounded chat adapter.
//!
//! Speaks the Chat Completions wire format on `/v2/chat/completions`, adds search parameters,
//! and surfaces citations as a trailing `system` event.

use std::sync::Arc;

use async_stream::try_stream;
use futures_util::StreamExt;
use serde_json::{Map, Value, json};

use crate::adapters::openai::serde_api::{
    ChatCompletionsDecoder, ChatCompletionsRequest, MessageDialect, build_api_request,
    check_request_body,
};
use crate::lines::{LineDecoder, SSE_DONE, sse_data};
use crate::transport::{HttpRequest, HttpTransport};
use crate::{
    CallRequest, CheckResult, EventStream, ModelInfo, ProtocolAdapter, ProtocolType,
    ProviderConfig, ProviderError, ProviderFuture, SearchSettings, terminate,
};

pub const PERPLEXITY_BASE_URL: &str = "https://api.perplexity.ai";
const CATALOG_CREATED: i64 = 1_706_409_600;

#[derive(Clone)]
pub struct PerplexityAdapter {
    transport: Arc<dyn HttpTransport>,
}

impl PerplexityAdapter {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }
}

fn completions_url(config: &ProviderConfig) -> String {
    format!("{}/v2/chat/completions", config.base_url_or(PERPLEXITY_BASE_URL))
}

pub(crate) fn build_body(request: &CallRequest) -> ChatCompletionsRequest {
    let mut body = build_api_request(request, MessageDialect::WithoutReasoning);
    body.top_k = request.settings.top_k;
    if let Some(search) = &request.settings.search {
        body.extra.extend(search_params(search));
    }
    body
}

fn search_params(search: &SearchSettings) -> Map<String, Value> {
    let mut params = Map::new();

    let optional = [
        ("search_mode", search.mode.as_deref()),
        ("search_context_size", search.context_size.as_deref()),
        ("search_recency_filter", search.recency_filter.as_deref()),
    ];
    for (key, value) in optional {
        if let Some(value) = value.filter(|value| !value.is_empty()) {
            params.insert(key.to_string(), json!(value));
        }
    }

    if !search.domain_filter.is_empty() {
        params.insert("search_domain_filter".to_string(), json!(search.domain_filter));
    }
    if let Some(return_images) = search.return_images {
        params.insert("return_images".to_string(), json!(return_images));
    }
    if let Some(related) = search.return_related_questions {
        params.insert("return_related_questions".to_string(), json!(related));
    }

    params
}

fn catalog() -> Vec<ModelInfo> {
    [
        ("sonar", "Sonar", "Lightweight search-grounded model", 131_072),
        ("sonar-pro", "Sonar Pro", "Advanced search with deeper context", 204_800),
        (
            "sonar-reasoning-pro",
            "Sonar Reasoning Pro",
            "Multi-step reasoning with search",
            131_072,
        ),
        (
            "sonar-deep-research",
            "Sonar Deep Research",
            "Exhaustive research reports",
            131_072,
        ),
    ]
    .into_iter()
    .map(|(id, name, description, context_length)| ModelInfo {
        description: Some(description.to_string()),
        created: Some(CATALOG_CREATED),
        ..ModelInfo::new(id)
            .with_name(name)
            .with_context_length(context_length)
    })
    .collect()
}

impl ProtocolAdapter for PerplexityAdapter {
    fn protocol(&self) -> ProtocolType {
        ProtocolType::Perplexity
    }

    fn call<'a>(&'a self, request: CallRequest, config: ProviderConfig) -> EventStream<'a> {
        let url = completions_url(&config);
        let body = build_body(&request);

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
            let model = config.check_model.as_deref().unwrap_or("sonar");
            let request = HttpRequest::post(completions_url(config), check_request_body(model))
                .bearer(config.api_key.expose());

            match self.transport.send_json(request).await {
                Ok(_) => CheckResult::ok(),
                Err(error) => CheckResult::failed(error.message),
            }
        })
    }

    fn list_models<'a>(
        &'a self,
        _config: &'a ProviderConfig,
    ) -> ProviderFuture<'a, Result<Vec<ModelInfo>, ProviderError>> {
        Box::pin(async move { Ok(catalog()) })
    }
}
