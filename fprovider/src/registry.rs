//! Adapter registry: one lazily built, shared adapter per protocol family.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use fprovider::{AdapterRegistry, ProtocolType, ReqwestTransport};
//!
//! let registry = AdapterRegistry::new(Arc::new(ReqwestTransport::default()));
//! let first = registry.adapter(ProtocolType::OpenAi).expect("openai adapter");
//! let second = registry.adapter_for_provider("deepseek").expect("openai family");
//!
//! assert!(Arc::ptr_eq(&first, &second));
//! ```

use std::sync::{Arc, Mutex};

use fcommon::Registry;

use crate::transport::HttpTransport;
use crate::{
    NoopOperationHooks, ObservedAdapter, ProtocolAdapter, ProtocolType, ProviderError,
    ProviderOperationHooks, protocol_for_provider,
};

pub struct AdapterRegistry {
    transport: Arc<dyn HttpTransport>,
    hooks: Arc<dyn ProviderOperationHooks>,
    adapters: Mutex<Registry<ProtocolType, Arc<dyn ProtocolAdapter>>>,
}

impl AdapterRegistry {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            hooks: Arc::new(NoopOperationHooks),
            adapters: Mutex::new(Registry::new()),
        }
    }

    /// Hooks apply to adapters built or registered after this call.
    pub fn with_hooks(mut self, hooks: Arc<dyn ProviderOperationHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Shared adapter for `protocol`, built on first use.
    pub fn adapter(&self, protocol: ProtocolType) -> Result<Arc<dyn ProtocolAdapter>, ProviderError> {
        let mut adapters = self
            .adapters
            .lock()
            .map_err(|_| ProviderError::other("adapter registry lock poisoned"))?;

        adapters
            .get_or_try_insert_with(protocol, || {
                create_adapter(protocol, Arc::clone(&self.transport)).map(|adapter| self.observe(adapter))
            })
            .map(Arc::clone)
    }

    pub fn adapter_for_provider(
        &self,
        provider_id: &str,
    ) -> Result<Arc<dyn ProtocolAdapter>, ProviderError> {
        self.adapter(protocol_for_provider(provider_id))
    }

    /// Replaces the cached adapter for the adapter's protocol.
    pub fn register(&self, adapter: Arc<dyn ProtocolAdapter>) -> Result<(), ProviderError> {
        let protocol = adapter.protocol();
        let observed = self.observe(adapter);

        self.adapters
            .lock()
            .map_err(|_| ProviderError::other("adapter registry lock poisoned"))?
            .insert(protocol, observed);
        Ok(())
    }

    pub fn contains(&self, protocol: ProtocolType) -> bool {
        self.adapters
            .lock()
            .map(|adapters| adapters.contains_key(&protocol))
            .unwrap_or(false)
    }

    fn observe(&self, adapter: Arc<dyn ProtocolAdapter>) -> Arc<dyn ProtocolAdapter> {
        Arc::new(ObservedAdapter::new(adapter, Arc::clone(&self.hooks)))
    }
}

/// Builds a fresh adapter for `protocol` over `transport`.
pub fn create_adapter(
    protocol: ProtocolType,
    transport: Arc<dyn HttpTransport>,
) -> Result<Arc<dyn ProtocolAdapter>, ProviderError> {
    match protocol {
        #[cfg(feature = "provider-openai")]
        ProtocolType::OpenAi => Ok(Arc::new(crate::adapters::openai::OpenAiCompatibleAdapter::openai(transport))),
        #[cfg(feature = "provider-openai")]
        ProtocolType::Bailian => Ok(Arc::new(crate::adapters::openai::OpenAiCompatibleAdapter::bailian(transport))),
        #[cfg(feature = "provider-openai")]
        ProtocolType::Zai => Ok(Arc::new(crate::adapters::openai::OpenAiCompatibleAdapter::zai(transport))),
        #[cfg(feature = "provider-anthropic")]
        ProtocolType::Anthropic => Ok(Arc::new(crate::adapters::anthropic::AnthropicAdapter::new(transport))),
        #[cfg(feature = "provider-gemini")]
        ProtocolType::Gemini => Ok(Arc::new(crate::adapters::gemini::GeminiAdapter::new(transport))),
        #[cfg(feature = "provider-perplexity")]
        ProtocolType::Perplexity => Ok(Arc::new(crate::adapters::perplexity::PerplexityAdapter::new(transport))),
        #[cfg(feature = "provider-ollama")]
        ProtocolType::Ollama => Ok(Arc::new(crate::adapters::ollama::OllamaAdapter::new(transport))),
        #[allow(unreachable_patterns)]
        other => Err(ProviderError::unavailable(format!(
            "adapter for protocol '{other}' is not compiled into this build"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        CallRequest, CheckResult, EventStream, ModelInfo, ProviderConfig, ProviderFuture,
        UnifiedStreamEvent, VecEventStream,
    };
    use crate::transport::ReqwestTransport;

    struct StubAdapter;

    impl ProtocolAdapter for StubAdapter {
        fn protocol(&self) -> ProtocolType {
            ProtocolType::Gemini
        }

        fn call<'a>(&'a self, _request: CallRequest, _config: ProviderConfig) -> EventStream<'a> {
            Box::pin(VecEventStream::new(vec![UnifiedStreamEvent::finish("stop", None)]))
        }

        fn check<'a>(&'a self, _config: &'a ProviderConfig) -> ProviderFuture<'a, CheckResult> {
            Box::pin(async { CheckResult::ok() })
        }

        fn list_models<'a>(
            &'a self,
            _config: &'a ProviderConfig,
        ) -> ProviderFuture<'a, Result<Vec<ModelInfo>, ProviderError>> {
            Box::pin(async { Ok(vec![ModelInfo::new("stub")]) })
        }
    }

    fn registry() -> AdapterRegistry {
        AdapterRegistry::new(Arc::new(ReqwestTransport::default()))
    }

    #[test]
    fn adapters_are_built_once_per_protocol() {
        let registry = registry();
        assert!(!registry.contains(ProtocolType::Anthropic));

        let first = registry.adapter(ProtocolType::Anthropic).expect("anthropic");
        let second = registry.adapter(ProtocolType::Anthropic).expect("anthropic");

        assert!(Arc::ptr_eq(&first, &second));
        assert!(registry.contains(ProtocolType::Anthropic));
        assert_eq!(first.protocol(), ProtocolType::Anthropic);
    }

    #[test]
    fn providers_resolve_through_protocol_table() {
        let registry = registry();

        assert_eq!(
            registry.adapter_for_provider("minimax").expect("minimax").protocol(),
            ProtocolType::Anthropic
        );
        assert_eq!(
            registry.adapter_for_provider("google").expect("google").protocol(),
            ProtocolType::Gemini
        );
        assert_eq!(
            registry.adapter_for_provider("brand-new").expect("fallback").protocol(),
            ProtocolType::OpenAi
        );
    }

    #[tokio::test]
    async fn register_overrides_cached_adapter() {
        let registry = registry();
        let built = registry.adapter(ProtocolType::Gemini).expect("gemini");

        registry.register(Arc::new(StubAdapter)).expect("register");
        let replaced = registry.adapter(ProtocolType::Gemini).expect("gemini");

        assert!(!Arc::ptr_eq(&built, &replaced));
        let models = replaced
            .list_models(&ProviderConfig::new("k"))
            .await
            .expect("models");
        assert_eq!(models[0].id, "stub");
    }
}
