//! Operation hooks and the observing adapter wrapper.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_stream::stream;
use futures_util::StreamExt;

use crate::{
    CallRequest, CheckResult, EventStream, ModelInfo, ProtocolAdapter, ProtocolType,
    ProviderConfig, ProviderError, ProviderFuture, UnifiedStreamEvent, Usage,
};

pub trait ProviderOperationHooks: Send + Sync {
    fn on_call_start(&self, _protocol: ProtocolType, _model: &str) {}

    fn on_call_finish(
        &self,
        _protocol: ProtocolType,
        _model: &str,
        _reason: &str,
        _usage: Option<&Usage>,
        _elapsed: Duration,
    ) {
    }

    fn on_call_error(&self, _protocol: ProtocolType, _model: &str, _message: &str, _elapsed: Duration) {}

    fn on_check(&self, _protocol: ProtocolType, _result: &CheckResult) {}

    fn on_list_models(&self, _protocol: ProtocolType, _outcome: Result<usize, &ProviderError>) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopOperationHooks;

impl ProviderOperationHooks for NoopOperationHooks {}

/// Forwards every call to `inner` and reports outcomes to hooks. Events pass through untouched.
#[derive(Clone)]
pub struct ObservedAdapter {
    inner: Arc<dyn ProtocolAdapter>,
    hooks: Arc<dyn ProviderOperationHooks>,
}

impl ObservedAdapter {
    pub fn new(inner: Arc<dyn ProtocolAdapter>, hooks: Arc<dyn ProviderOperationHooks>) -> Self {
        Self { inner, hooks }
    }
}

impl ProtocolAdapter for ObservedAdapter {
    fn protocol(&self) -> ProtocolType {
        self.inner.protocol()
    }

    fn call<'a>(&'a self, request: CallRequest, config: ProviderConfig) -> EventStream<'a> {
        let protocol = self.inner.protocol();
        let model = request.model.clone();
        let hooks = Arc::clone(&self.hooks);
        let mut events = self.inner.call(request, config);

        Box::pin(stream! {
            let started = Instant::now();
            hooks.on_call_start(protocol, &model);

            while let Some(event) = events.next().await {
                match &event {
                    UnifiedStreamEvent::Finish { reason, usage } => {
                        hooks.on_call_finish(protocol, &model, reason, usage.as_ref(), started.elapsed());
                    }
                    UnifiedStreamEvent::Error { message } => {
                        hooks.on_call_error(protocol, &model, message, started.elapsed());
                    }
                    _ => {}
                }

                yield event;
            }
        })
    }

    fn check<'a>(&'a self, config: &'a ProviderConfig) -> ProviderFuture<'a, CheckResult> {
        Box::pin(async move {
            let result = self.inner.check(config).await;
            self.hooks.on_check(self.inner.protocol(), &result);
            result
        })
    }

    fn list_models<'a>(
        &'a self,
        config: &'a ProviderConfig,
    ) -> ProviderFuture<'a, Result<Vec<ModelInfo>, ProviderError>> {
        Box::pin(async move {
            let result = self.inner.list_models(config).await;
            self.hooks
                .on_list_models(self.inner.protocol(), result.as_ref().map(Vec::len));
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::VecEventStream;

    #[derive(Default)]
    struct RecordingHooks {
        events: Mutex<Vec<String>>,
    }

    impl ProviderOperationHooks for RecordingHooks {
        fn on_call_start(&self, protocol: ProtocolType, model: &str) {
            self.events
                .lock()
                .expect("events lock")
                .push(format!("start:{protocol}:{model}"));
        }

        fn on_call_finish(
            &self,
            protocol: ProtocolType,
            _model: &str,
            reason: &str,
            usage: Option<&Usage>,
            _elapsed: Duration,
        ) {
            let total = usage.map(|usage| usage.total_tokens).unwrap_or_default();
            self.events
                .lock()
                .expect("events lock")
                .push(format!("finish:{protocol}:{reason}:{total}"));
        }

        fn on_call_error(&self, protocol: ProtocolType, _model: &str, message: &str, _elapsed: Duration) {
            self.events
                .lock()
                .expect("events lock")
                .push(format!("error:{protocol}:{message}"));
        }

        fn on_check(&self, protocol: ProtocolType, result: &CheckResult) {
            self.events
                .lock()
                .expect("events lock")
                .push(format!("check:{protocol}:{}", result.success));
        }

        fn on_list_models(&self, protocol: ProtocolType, outcome: Result<usize, &ProviderError>) {
            self.events
                .lock()
                .expect("events lock")
                .push(format!("models:{protocol}:{:?}", outcome.ok()));
        }
    }

    struct CannedAdapter {
        events: Vec<UnifiedStreamEvent>,
    }

    impl ProtocolAdapter for CannedAdapter {
        fn protocol(&self) -> ProtocolType {
            ProtocolType::Ollama
        }

        fn call<'a>(&'a self, _request: CallRequest, _config: ProviderConfig) -> EventStream<'a> {
            Box::pin(VecEventStream::new(self.events.clone()))
        }

        fn check<'a>(&'a self, _config: &'a ProviderConfig) -> ProviderFuture<'a, CheckResult> {
            Box::pin(async { CheckResult::failed("offline") })
        }

        fn list_models<'a>(
            &'a self,
            _config: &'a ProviderConfig,
        ) -> ProviderFuture<'a, Result<Vec<ModelInfo>, ProviderError>> {
            Box::pin(async { Ok(vec![ModelInfo::new("llama3")]) })
        }
    }

    #[tokio::test]
    async fn observed_adapter_forwards_events_and_reports_terminal() {
        let hooks = Arc::new(RecordingHooks::default());
        let events = vec![
            UnifiedStreamEvent::content("hi"),
            UnifiedStreamEvent::finish("stop", Some(Usage::new(1, 2, 3))),
        ];
        let adapter = ObservedAdapter::new(
            Arc::new(CannedAdapter {
                events: events.clone(),
            }),
            hooks.clone(),
        );

        let forwarded = adapter
            .call(CallRequest::new("llama3", Vec::new()), ProviderConfig::default())
            .collect::<Vec<_>>()
            .await;
        assert_eq!(forwarded, events);

        adapter.check(&ProviderConfig::default()).await;
        adapter
            .list_models(&ProviderConfig::default())
            .await
            .expect("models");

        let recorded = hooks.events.lock().expect("events lock").clone();
        assert_eq!(
            recorded,
            vec![
                "start:ollama:llama3",
                "finish:ollama:stop:3",
                "check:ollama:false",
                "models:ollama:Some(1)",
            ]
        );
    }

    #[tokio::test]
    async fn observed_adapter_reports_error_events() {
        let hooks = Arc::new(RecordingHooks::default());
        let adapter = ObservedAdapter::new(
            Arc::new(CannedAdapter {
                events: vec![UnifiedStreamEvent::error("boom")],
            }),
            hooks.clone(),
        );

        let _ = adapter
            .call(CallRequest::new("m", Vec::new()), ProviderConfig::default())
            .collect::<Vec<_>>()
            .await;

        let recorded = hooks.events.lock().expect("events lock").clone();
        assert_eq!(recorded[1], "error:ollama:boom");
    }
}
