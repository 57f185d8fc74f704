//! Bounded tool-call loop: model output, tool execution, continued model output.
//!
//! Each step forwards the adapter's events as they arrive and collects tool-call fragments
//! inline. When a step asked for tools, they run through the [`ToolRuntime`] and the adapter
//! is called again with the augmented conversation, up to a fixed number of steps. The
//! per-step `finish` events are folded into one final `finish` carrying the merged usage,
//! which is also delivered through [`OrchestratedStream::final_usage`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_stream::stream;
use futures_core::Stream;
use futures_util::StreamExt;
use fprovider::{
    CallRequest, EventStream, ProtocolAdapter, ProviderConfig, ToolCallAccumulator,
    UnifiedMessage, UnifiedStreamEvent, Usage,
};
use ftooling::{ToolCallInfo, ToolExecutionContext, ToolRuntime};
use tokio::sync::oneshot;

use crate::{NoopChatHooks, OrchestratorHooks};

pub const MAX_TOOL_STEPS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Model(UnifiedStreamEvent),
    ToolStart(ToolCallInfo),
    ToolResult(ToolCallInfo),
}

pub type ChatEventStream<'a> = Pin<Box<dyn Stream<Item = ChatEvent> + Send + 'a>>;

/// Resolves to the usage merged across every step once the loop is done.
///
/// Resolves to an empty [`Usage`] if the stream is dropped before completion.
#[derive(Debug)]
pub struct FinalUsage {
    receiver: oneshot::Receiver<Usage>,
}

impl FinalUsage {
    fn channel() -> (oneshot::Sender<Usage>, Self) {
        let (sender, receiver) = oneshot::channel();
        (sender, Self { receiver })
    }
}

impl Future for FinalUsage {
    type Output = Usage;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|usage| usage.unwrap_or_default())
    }
}

pub struct OrchestratedStream<'a> {
    pub stream: ChatEventStream<'a>,
    pub final_usage: FinalUsage,
}

impl<'a> OrchestratedStream<'a> {
    /// Wraps a bare adapter stream for requests without tools.
    pub fn passthrough(mut events: EventStream<'a>) -> Self {
        let (usage_tx, final_usage) = FinalUsage::channel();

        let stream = stream! {
            let mut total = Usage::default();
            while let Some(event) = events.next().await {
                if let UnifiedStreamEvent::Finish { usage: Some(usage), .. } = &event {
                    total += *usage;
                }
                yield ChatEvent::Model(event);
            }
            let _ = usage_tx.send(total);
        };

        Self {
            stream: Box::pin(stream),
            final_usage,
        }
    }
}

#[derive(Clone)]
pub struct ToolLoop {
    adapter: Arc<dyn ProtocolAdapter>,
    runtime: Arc<dyn ToolRuntime>,
    hooks: Arc<dyn OrchestratorHooks>,
    max_steps: usize,
}

impl ToolLoop {
    pub fn new(adapter: Arc<dyn ProtocolAdapter>, runtime: Arc<dyn ToolRuntime>) -> Self {
        Self {
            adapter,
            runtime,
            hooks: Arc::new(NoopChatHooks),
            max_steps: MAX_TOOL_STEPS,
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn OrchestratorHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Values below one are treated as one.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Runs the loop, issuing the first adapter call itself.
    pub fn run(
        &self,
        request: CallRequest,
        config: ProviderConfig,
        context: ToolExecutionContext,
    ) -> OrchestratedStream<'static> {
        self.drive(None, request, config, context)
    }

    /// Runs the loop over a first step the caller already started with `request`.
    pub fn run_with_stream<'a>(
        &self,
        first: EventStream<'a>,
        request: CallRequest,
        config: ProviderConfig,
        context: ToolExecutionContext,
    ) -> OrchestratedStream<'a> {
        self.drive(Some(first), request, config, context)
    }

    fn drive<'a>(
        &self,
        first: Option<EventStream<'a>>,
        mut request: CallRequest,
        config: ProviderConfig,
        context: ToolExecutionContext,
    ) -> OrchestratedStream<'a> {
        let adapter = Arc::clone(&self.adapter);
        let runtime = Arc::clone(&self.runtime);
        let hooks = Arc::clone(&self.hooks);
        let max_steps = self.max_steps;
        let (usage_tx, final_usage) = FinalUsage::channel();

        if request.tools.is_empty() {
            request.tools = runtime.definitions();
        }

        let stream = stream! {
            let mut pending_first = first;
            let mut total = Usage::default();
            let mut steps = 0usize;
            let mut last_reason = None::<String>;
            let mut failed = false;

            loop {
                hooks.on_step_start(steps + 1, request.messages.len());
                let mut events = match pending_first.take() {
                    Some(events) => events,
                    None => adapter.call(request.clone(), config.clone()),
                };

                let mut calls = ToolCallAccumulator::new();
                let mut text = String::new();
                let mut reasoning = String::new();

                while let Some(event) = events.next().await {
                    calls.apply(&event);
                    match event {
                        UnifiedStreamEvent::Finish { reason, usage } => {
                            if let Some(usage) = usage {
                                total += usage;
                            }
                            last_reason = Some(reason);
                        }
                        event => {
                            match &event {
                                UnifiedStreamEvent::Content { delta, .. } => text.push_str(delta),
                                UnifiedStreamEvent::Thinking { delta } => reasoning.push_str(delta),
                                UnifiedStreamEvent::Error { .. } => failed = true,
                                _ => {}
                            }
                            yield ChatEvent::Model(event);
                        }
                    }
                }
                drop(events);

                if failed || calls.is_empty() {
                    break;
                }

                steps += 1;
                if steps >= max_steps {
                    hooks.on_step_limit_reached(max_steps);
                    break;
                }

                let tool_calls = calls.finish();
                let mut results = Vec::with_capacity(tool_calls.len());
                for call in &tool_calls {
                    yield ChatEvent::ToolStart(ToolCallInfo::pending(&call.id, &call.name, &call.arguments));

                    let execution = runtime.execute(call.clone(), context.clone()).await;
                    if let Some(usage) = execution.usage {
                        total += usage;
                    }
                    results.push(execution.to_message(call));
                    yield ChatEvent::ToolResult(execution.info);
                }

                if results.is_empty() {
                    hooks.on_no_tool_results(steps);
                    break;
                }

                request
                    .messages
                    .push(UnifiedMessage::assistant_with_tool_calls(text, reasoning, tool_calls));
                request.messages.extend(results);
            }

            if !failed {
                let usage = (!total.is_empty()).then_some(total);
                yield ChatEvent::Model(UnifiedStreamEvent::finish(
                    last_reason.unwrap_or_else(|| "stop".to_string()),
                    usage,
                ));
            }

            hooks.on_loop_complete(steps, &total);
            let _ = usage_tx.send(total);
        };

        OrchestratedStream {
            stream: Box::pin(stream),
            final_usage,
        }
    }
}

#[cfg(test)]
mod tests {
    use fprovider::VecEventStream;

    use super::*;

    #[tokio::test]
    async fn passthrough_wraps_events_and_reports_usage() {
        let events: EventStream<'static> = Box::pin(VecEventStream::new(vec![
            UnifiedStreamEvent::content("hi"),
            UnifiedStreamEvent::finish("stop", Some(Usage::new(3, 1, 4))),
        ]));

        let OrchestratedStream {
            stream,
            final_usage,
        } = OrchestratedStream::passthrough(events);
        let collected = stream.collect::<Vec<_>>().await;

        assert_eq!(
            collected,
            vec![
                ChatEvent::Model(UnifiedStreamEvent::content("hi")),
                ChatEvent::Model(UnifiedStreamEvent::finish("stop", Some(Usage::new(3, 1, 4)))),
            ]
        );
        assert_eq!(final_usage.await, Usage::new(3, 1, 4));
    }

    #[tokio::test]
    async fn final_usage_is_empty_when_stream_is_dropped() {
        let events: EventStream<'static> = Box::pin(VecEventStream::new(vec![
            UnifiedStreamEvent::content("partial"),
            UnifiedStreamEvent::finish("stop", Some(Usage::new(1, 1, 2))),
        ]));

        let OrchestratedStream {
            mut stream,
            final_usage,
        } = OrchestratedStream::passthrough(events);
        let _ = stream.next().await;
        drop(stream);

        assert!(final_usage.await.is_empty());
    }
}
