//! Runtime wiring for the streaming chat pipeline.
//!
//! [`GatewayRuntime`] owns the shared HTTP client, the [`AdapterRegistry`], and the
//! [`ToolBridge`]. [`GatewayRuntime::start_chat_stream`] runs one assistant turn end to end:
//! adapter resolution, optional tool loop, and persistence-aware frame streaming.

use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use futures_util::StreamExt;
use reqwest::Client;

use fobserve::{SafeChatHooks, SafeProviderHooks, SafeToolHooks, TracingObservabilityHooks};

use crate::{
    AdapterRegistry, BridgeRuntime, CallRequest, ChatError, CheckResult, ConsumerHooks,
    ConsumerPolicy, EventStream, FinalUsage, FrameStream, MAX_TOOL_STEPS, MessagePersister,
    ModelInfo, OrchestratedStream, OrchestratorHooks, ProtocolAdapter, ProviderConfig,
    ProviderError, ReqwestTransport, SessionId, StreamingConsumer, ToolBridge,
    ToolExecutionContext, ToolLoop, ToolPluginConfig,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayConfig {
    pub request_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(90),
        }
    }
}

impl GatewayConfig {
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

/// One assistant turn to stream.
#[derive(Debug, Clone)]
pub struct ChatStreamRequest {
    pub session_id: SessionId,
    pub provider_id: String,
    pub config: ProviderConfig,
    pub call: CallRequest,
    pub plugins: Vec<ToolPluginConfig>,
    pub search_results: Option<String>,
    pub retrieval_chunks: Option<String>,
}

impl ChatStreamRequest {
    pub fn new(
        session_id: impl Into<SessionId>,
        provider_id: impl Into<String>,
        config: ProviderConfig,
        call: CallRequest,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            provider_id: provider_id.into(),
            config,
            call,
            plugins: Vec::new(),
            search_results: None,
            retrieval_chunks: None,
        }
    }

    pub fn with_plugins(mut self, plugins: Vec<ToolPluginConfig>) -> Self {
        self.plugins = plugins;
        self
    }

    pub fn with_search_results(mut self, search_results: impl Into<String>) -> Self {
        self.search_results = Some(search_results.into());
        self
    }

    pub fn with_retrieval_chunks(mut self, retrieval_chunks: impl Into<String>) -> Self {
        self.retrieval_chunks = Some(retrieval_chunks.into());
        self
    }
}

/// Frames for the client plus the usage merged across every model call of the turn.
pub struct GatewayStream {
    pub frames: FrameStream<'static>,
    pub final_usage: FinalUsage,
}

#[derive(Clone)]
pub struct GatewayRuntime {
    registry: Arc<AdapterRegistry>,
    bridge: Arc<ToolBridge>,
    orchestrator_hooks: Arc<dyn OrchestratorHooks>,
    consumer_hooks: Arc<dyn ConsumerHooks>,
    consumer_policy: ConsumerPolicy,
    max_steps: usize,
}

impl GatewayRuntime {
    /// Builds the shared client, registry, and MCP bridge with tracing hooks installed.
    pub fn new(config: GatewayConfig) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| ProviderError::transport(err.to_string()))?;

        let registry = AdapterRegistry::new(Arc::new(ReqwestTransport::new(http)))
            .with_hooks(Arc::new(SafeProviderHooks::new(TracingObservabilityHooks)));
        let bridge = ToolBridge::default()
            .with_hooks(Arc::new(SafeToolHooks::new(TracingObservabilityHooks)));

        Ok(Self::from_parts(registry, bridge))
    }

    /// Assembles a runtime from prepared parts; chat hooks default to tracing.
    pub fn from_parts(registry: AdapterRegistry, bridge: ToolBridge) -> Self {
        let chat_hooks = Arc::new(SafeChatHooks::new(TracingObservabilityHooks));
        Self {
            registry: Arc::new(registry),
            bridge: Arc::new(bridge),
            orchestrator_hooks: chat_hooks.clone(),
            consumer_hooks: chat_hooks,
            consumer_policy: ConsumerPolicy::default(),
            max_steps: MAX_TOOL_STEPS,
        }
    }

    pub fn with_orchestrator_hooks(mut self, hooks: Arc<dyn OrchestratorHooks>) -> Self {
        self.orchestrator_hooks = hooks;
        self
    }

    pub fn with_consumer_hooks(mut self, hooks: Arc<dyn ConsumerHooks>) -> Self {
        self.consumer_hooks = hooks;
        self
    }

    pub fn with_consumer_policy(mut self, policy: ConsumerPolicy) -> Self {
        self.consumer_policy = policy;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn bridge(&self) -> &ToolBridge {
        &self.bridge
    }

    /// Starts one streamed assistant turn.
    ///
    /// Fails only before streaming begins, when the request is unusable or no adapter serves
    /// the provider. Everything after that is reported in-band through the frames.
    pub async fn start_chat_stream(
        &self,
        request: ChatStreamRequest,
        persister: Arc<dyn MessagePersister>,
    ) -> Result<GatewayStream, ChatError> {
        let ChatStreamRequest {
            session_id,
            provider_id,
            config,
            mut call,
            plugins,
            search_results,
            retrieval_chunks,
        } = request;

        if call.model.trim().is_empty() {
            return Err(ChatError::invalid_request("model must not be empty"));
        }
        if call.messages.is_empty() {
            return Err(ChatError::invalid_request("messages must not be empty"));
        }

        let config = config.with_defaults_for(&provider_id);
        let adapter = self.registry.adapter_for_provider(&provider_id)?;
        if call.provider_id.is_none() {
            call.provider_id = Some(provider_id);
        }

        let events = if plugins.is_empty() {
            OrchestratedStream::passthrough(owned_call(adapter, call, config))
        } else {
            let runtime = BridgeRuntime::connect(Arc::clone(&self.bridge), &plugins).await;
            if runtime.catalog().is_empty() {
                OrchestratedStream::passthrough(owned_call(adapter, call, config))
            } else {
                ToolLoop::new(adapter, Arc::new(runtime))
                    .with_hooks(Arc::clone(&self.orchestrator_hooks))
                    .with_max_steps(self.max_steps)
                    .run(call, config, ToolExecutionContext::new(session_id.clone()))
            }
        };

        let mut consumer = StreamingConsumer::new(persister)
            .with_hooks(Arc::clone(&self.consumer_hooks))
            .with_policy(self.consumer_policy);
        if let Some(search_results) = search_results {
            consumer = consumer.with_search_results(search_results);
        }
        if let Some(retrieval_chunks) = retrieval_chunks {
            consumer = consumer.with_retrieval_chunks(retrieval_chunks);
        }

        Ok(GatewayStream {
            frames: consumer.consume(session_id, events.stream),
            final_usage: events.final_usage,
        })
    }

    /// Never fails: an unresolvable provider is reported as an unsuccessful check.
    pub async fn check_provider(&self, provider_id: &str, config: ProviderConfig) -> CheckResult {
        let config = config.with_defaults_for(provider_id);
        match self.registry.adapter_for_provider(provider_id) {
            Ok(adapter) => adapter.check(&config).await,
            Err(error) => CheckResult::failed(error.to_string()),
        }
    }

    pub async fn list_provider_models(
        &self,
        provider_id: &str,
        config: ProviderConfig,
    ) -> Result<Vec<ModelInfo>, ProviderError> {
        let config = config.with_defaults_for(provider_id);
        let adapter = self.registry.adapter_for_provider(provider_id)?;
        adapter.list_models(&config).await
    }
}

/// Adapter call whose stream owns the adapter handle.
fn owned_call(
    adapter: Arc<dyn ProtocolAdapter>,
    request: CallRequest,
    config: ProviderConfig,
) -> EventStream<'static> {
    Box::pin(stream! {
        let mut events = adapter.call(request, config);
        while let Some(event) = events.next().await {
            yield event;
        }
    })
}
