//! Tracing-based observability hooks for adapter calls, tool execution, and chat streaming.
//!
//! ```rust
//! use fobserve::TracingObservabilityHooks;
//! use ftooling::ToolBridgeHooks;
//!
//! fn accepts_tool_hooks(_hooks: &dyn ToolBridgeHooks) {}
//!
//! let hooks = TracingObservabilityHooks;
//! accepts_tool_hooks(&hooks);
//! ```

use std::time::Duration;

use fchat::{ChatError, ConsumerHooks, MessageSnapshot, OrchestratorHooks};
use fcommon::MessageId;
use fprovider::{CheckResult, ProtocolType, ProviderError, ProviderOperationHooks, Usage};
use ftooling::{ToolBridgeHooks, ToolCallInfo, ToolError, ToolExecutionContext, ToolPluginConfig};

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObservabilityHooks;

impl ProviderOperationHooks for TracingObservabilityHooks {
    fn on_call_start(&self, protocol: ProtocolType, model: &str) {
        tracing::info!(
            phase = "provider",
            event = "call_start",
            protocol = %protocol,
            model
        );
    }

    fn on_call_finish(
        &self,
        protocol: ProtocolType,
        model: &str,
        reason: &str,
        usage: Option<&Usage>,
        elapsed: Duration,
    ) {
        tracing::info!(
            phase = "provider",
            event = "call_finish",
            protocol = %protocol,
            model,
            reason,
            prompt_tokens = usage.map(|usage| usage.prompt_tokens),
            completion_tokens = usage.map(|usage| usage.completion_tokens),
            total_tokens = usage.map(|usage| usage.total_tokens),
            elapsed_ms = elapsed.as_millis() as u64
        );
    }

    fn on_call_error(&self, protocol: ProtocolType, model: &str, message: &str, elapsed: Duration) {
        tracing::error!(
            phase = "provider",
            event = "call_error",
            protocol = %protocol,
            model,
            error = message,
            elapsed_ms = elapsed.as_millis() as u64
        );
    }

    fn on_check(&self, protocol: ProtocolType, result: &CheckResult) {
        if result.success {
            tracing::info!(phase = "provider", event = "check", protocol = %protocol, success = true);
        } else {
            tracing::warn!(
                phase = "provider",
                event = "check",
                protocol = %protocol,
                success = false,
                error = result.error.as_deref()
            );
        }
    }

    fn on_list_models(&self, protocol: ProtocolType, outcome: Result<usize, &ProviderError>) {
        match outcome {
            Ok(count) => tracing::info!(
                phase = "provider",
                event = "list_models",
                protocol = %protocol,
                count
            ),
            Err(error) => tracing::error!(
                phase = "provider",
                event = "list_models_failure",
                protocol = %protocol,
                error_kind = ?error.kind,
                error = %error
            ),
        }
    }
}

impl ToolBridgeHooks for TracingObservabilityHooks {
    fn on_insecure_tls(&self, plugin: &ToolPluginConfig) {
        tracing::warn!(
            phase = "tool",
            event = "insecure_tls",
            plugin_id = %plugin.id,
            server_url = %plugin.server_url,
            "TLS certificate verification disabled for plugin; use only with trusted endpoints"
        );
    }

    fn on_listing_success(&self, plugin: &ToolPluginConfig, tool_count: usize) {
        tracing::info!(
            phase = "tool",
            event = "listing_success",
            plugin_id = %plugin.id,
            tool_count
        );
    }

    fn on_listing_fallback(&self, plugin: &ToolPluginConfig, error: Option<&ToolError>) {
        tracing::warn!(
            phase = "tool",
            event = "listing_fallback",
            plugin_id = %plugin.id,
            fallback_tool = %plugin.fallback_tool_name(),
            error = error.map(|error| error.message.as_str())
        );
    }

    fn on_execution_start(&self, info: &ToolCallInfo, context: &ToolExecutionContext) {
        tracing::info!(
            phase = "tool",
            event = "execution_start",
            tool_name = %info.tool_name,
            tool_call_id = %info.tool_call_id,
            plugin_id = %info.plugin_id,
            session_id = %context.session_id,
            trace_id = context.trace_id.as_ref().map(|id| id.as_str())
        );
    }

    fn on_execution_success(
        &self,
        info: &ToolCallInfo,
        context: &ToolExecutionContext,
        elapsed: Duration,
    ) {
        tracing::info!(
            phase = "tool",
            event = "execution_success",
            tool_name = %info.tool_name,
            tool_call_id = %info.tool_call_id,
            session_id = %context.session_id,
            trace_id = context.trace_id.as_ref().map(|id| id.as_str()),
            elapsed_ms = elapsed.as_millis() as u64
        );
    }

    fn on_execution_failure(
        &self,
        info: &ToolCallInfo,
        context: &ToolExecutionContext,
        error: &ToolError,
        elapsed: Duration,
    ) {
        tracing::error!(
            phase = "tool",
            event = "execution_failure",
            tool_name = %info.tool_name,
            tool_call_id = %info.tool_call_id,
            session_id = %context.session_id,
            trace_id = context.trace_id.as_ref().map(|id| id.as_str()),
            elapsed_ms = elapsed.as_millis() as u64,
            error_kind = ?error.kind,
            retryable = error.retryable,
            error = %error
        );
    }

    fn on_result_truncated(&self, info: &ToolCallInfo, original_chars: usize) {
        tracing::warn!(
            phase = "tool",
            event = "result_truncated",
            tool_name = %info.tool_name,
            tool_call_id = %info.tool_call_id,
            original_chars
        );
    }

    fn on_close_failure(&self, plugin: &ToolPluginConfig, error: &ToolError) {
        tracing::warn!(
            phase = "tool",
            event = "close_failure",
            plugin_id = %plugin.id,
            error = %error
        );
    }
}

impl OrchestratorHooks for TracingObservabilityHooks {
    fn on_step_start(&self, step: usize, message_count: usize) {
        tracing::debug!(phase = "chat", event = "step_start", step, message_count);
    }

    fn on_step_limit_reached(&self, max_steps: usize) {
        tracing::warn!(
            phase = "chat",
            event = "step_limit_reached",
            max_steps,
            "tool loop stopped at step bound"
        );
    }

    fn on_no_tool_results(&self, step: usize) {
        tracing::warn!(phase = "chat", event = "no_tool_results", step);
    }

    fn on_loop_complete(&self, steps: usize, usage: &Usage) {
        tracing::info!(
            phase = "chat",
            event = "loop_complete",
            steps,
            total_tokens = usage.total_tokens
        );
    }
}

impl ConsumerHooks for TracingObservabilityHooks {
    fn on_progress_saved(&self, message_id: &MessageId, chars: usize) {
        tracing::debug!(
            phase = "chat",
            event = "progress_saved",
            message_id = %message_id,
            chars
        );
    }

    fn on_persistence_failure(&self, message_id: Option<&MessageId>, error: &ChatError) {
        tracing::error!(
            phase = "chat",
            event = "persistence_failure",
            message_id = message_id.map(|id| id.as_str()),
            error_kind = ?error.kind,
            error = %error
        );
    }

    fn on_finalized(&self, message_id: &MessageId, snapshot: &MessageSnapshot) {
        tracing::info!(
            phase = "chat",
            event = "finalized",
            message_id = %message_id,
            text_chars = snapshot.text.chars().count(),
            tool_calls = snapshot.tool_calls().count(),
            errored = snapshot.error.is_some()
        );
    }
}
