use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use fchat::{ChatError, ConsumerHooks, MessageSnapshot, OrchestratorHooks};
use fcommon::MessageId;
use fprovider::{CheckResult, ProtocolType, ProviderError, ProviderOperationHooks, Usage};
use ftooling::{ToolBridgeHooks, ToolCallInfo, ToolError, ToolExecutionContext, ToolPluginConfig};

pub struct SafeProviderHooks<H> {
    inner: H,
}

impl<H> SafeProviderHooks<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

impl<H> ProviderOperationHooks for SafeProviderHooks<H>
where
    H: ProviderOperationHooks,
{
    fn on_call_start(&self, protocol: ProtocolType, model: &str) {
        let _ = catch_unwind(AssertUnwindSafe(|| self.inner.on_call_start(protocol, model)));
    }

    fn on_call_finish(
        &self,
        protocol: ProtocolType,
        model: &str,
        reason: &str,
        usage: Option<&Usage>,
        elapsed: Duration,
    ) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner
                .on_call_finish(protocol, model, reason, usage, elapsed)
        }));
    }

    fn on_call_error(&self, protocol: ProtocolType, model: &str, message: &str, elapsed: Duration) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_call_error(protocol, model, message, elapsed)
        }));
    }

    fn on_check(&self, protocol: ProtocolType, result: &CheckResult) {
        let _ = catch_unwind(AssertUnwindSafe(|| self.inner.on_check(protocol, result)));
    }

    fn on_list_models(&self, protocol: ProtocolType, outcome: Result<usize, &ProviderError>) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_list_models(protocol, outcome)
        }));
    }
}

pub struct SafeToolHooks<H> {
    inner: H,
}

impl<H> SafeToolHooks<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

impl<H> ToolBridgeHooks for SafeToolHooks<H>
where
    H: ToolBridgeHooks,
{
    fn on_insecure_tls(&self, plugin: &ToolPluginConfig) {
        let _ = catch_unwind(AssertUnwindSafe(|| self.inner.on_insecure_tls(plugin)));
    }

    fn on_listing_success(&self, plugin: &ToolPluginConfig, tool_count: usize) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_listing_success(plugin, tool_count)
        }));
    }

    fn on_listing_fallback(&self, plugin: &ToolPluginConfig, error: Option<&ToolError>) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_listing_fallback(plugin, error)
        }));
    }

    fn on_execution_start(&self, info: &ToolCallInfo, context: &ToolExecutionContext) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_execution_start(info, context)
        }));
    }

    fn on_execution_success(
        &self,
        info: &ToolCallInfo,
        context: &ToolExecutionContext,
        elapsed: Duration,
    ) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_execution_success(info, context, elapsed)
        }));
    }

    fn on_execution_failure(
        &self,
        info: &ToolCallInfo,
        context: &ToolExecutionContext,
        error: &ToolError,
        elapsed: Duration,
    ) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner
                .on_execution_failure(info, context, error, elapsed)
        }));
    }

    fn on_result_truncated(&self, info: &ToolCallInfo, original_chars: usize) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_result_truncated(info, original_chars)
        }));
    }

    fn on_close_failure(&self, plugin: &ToolPluginConfig, error: &ToolError) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_close_failure(plugin, error)
        }));
    }
}

pub struct SafeChatHooks<H> {
    inner: H,
}

impl<H> SafeChatHooks<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

impl<H> OrchestratorHooks for SafeChatHooks<H>
where
    H: OrchestratorHooks,
{
    fn on_step_start(&self, step: usize, message_count: usize) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_step_start(step, message_count)
        }));
    }

    fn on_step_limit_reached(&self, max_steps: usize) {
        let _ = catch_unwind(AssertUnwindSafe(|| self.inner.on_step_limit_reached(max_steps)));
    }

    fn on_no_tool_results(&self, step: usize) {
        let _ = catch_unwind(AssertUnwindSafe(|| self.inner.on_no_tool_results(step)));
    }

    fn on_loop_complete(&self, steps: usize, usage: &Usage) {
        let _ = catch_unwind(AssertUnwindSafe(|| self.inner.on_loop_complete(steps, usage)));
    }
}

impl<H> ConsumerHooks for SafeChatHooks<H>
where
    H: ConsumerHooks,
{
    fn on_progress_saved(&self, message_id: &MessageId, chars: usize) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_progress_saved(message_id, chars)
        }));
    }

    fn on_persistence_failure(&self, message_id: Option<&MessageId>, error: &ChatError) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_persistence_failure(message_id, error)
        }));
    }

    fn on_finalized(&self, message_id: &MessageId, snapshot: &MessageSnapshot) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_finalized(message_id, snapshot)
        }));
    }
}
