//! Metrics-based observability hooks for adapter calls, tool execution, and chat streaming.
//!
//! ```rust
//! use fobserve::MetricsObservabilityHooks;
//! use fprovider::ProviderOperationHooks;
//!
//! fn accepts_provider_hooks(_hooks: &dyn ProviderOperationHooks) {}
//!
//! let hooks = MetricsObservabilityHooks;
//! accepts_provider_hooks(&hooks);
//! ```

use std::time::Duration;

use fchat::{ChatError, ConsumerHooks, MessageSnapshot, OrchestratorHooks};
use fcommon::MessageId;
use fprovider::{CheckResult, ProtocolType, ProviderError, ProviderOperationHooks, Usage};
use ftooling::{ToolBridgeHooks, ToolCallInfo, ToolError, ToolExecutionContext, ToolPluginConfig};

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsObservabilityHooks;

impl ProviderOperationHooks for MetricsObservabilityHooks {
    fn on_call_start(&self, protocol: ProtocolType, _model: &str) {
        metrics::counter!(
            "rille_provider_call_start_total",
            "protocol" => protocol.as_str()
        )
        .increment(1);
    }

    fn on_call_finish(
        &self,
        protocol: ProtocolType,
        _model: &str,
        reason: &str,
        usage: Option<&Usage>,
        elapsed: Duration,
    ) {
        metrics::counter!(
            "rille_provider_call_finish_total",
            "protocol" => protocol.as_str(),
            "reason" => reason.to_string()
        )
        .increment(1);
        metrics::histogram!(
            "rille_provider_call_duration_seconds",
            "protocol" => protocol.as_str()
        )
        .record(elapsed.as_secs_f64());

        if let Some(usage) = usage {
            metrics::counter!(
                "rille_provider_prompt_tokens_total",
                "protocol" => protocol.as_str()
            )
            .increment(usage.prompt_tokens);
            metrics::counter!(
                "rille_provider_completion_tokens_total",
                "protocol" => protocol.as_str()
            )
            .increment(usage.completion_tokens);
        }
    }

    fn on_call_error(&self, protocol: ProtocolType, _model: &str, _message: &str, elapsed: Duration) {
        metrics::counter!(
            "rille_provider_call_error_total",
            "protocol" => protocol.as_str()
        )
        .increment(1);
        metrics::histogram!(
            "rille_provider_call_duration_seconds",
            "protocol" => protocol.as_str()
        )
        .record(elapsed.as_secs_f64());
    }

    fn on_check(&self, protocol: ProtocolType, result: &CheckResult) {
        metrics::counter!(
            "rille_provider_check_total",
            "protocol" => protocol.as_str(),
            "success" => if result.success { "true" } else { "false" }
        )
        .increment(1);
    }

    fn on_list_models(&self, protocol: ProtocolType, outcome: Result<usize, &ProviderError>) {
        match outcome {
            Ok(count) => {
                metrics::counter!(
                    "rille_provider_list_models_total",
                    "protocol" => protocol.as_str()
                )
                .increment(1);
                metrics::histogram!(
                    "rille_provider_listed_models",
                    "protocol" => protocol.as_str()
                )
                .record(count as f64);
            }
            Err(error) => {
                metrics::counter!(
                    "rille_provider_list_models_failure_total",
                    "protocol" => protocol.as_str(),
                    "error_kind" => format!("{:?}", error.kind)
                )
                .increment(1);
            }
        }
    }
}

impl ToolBridgeHooks for MetricsObservabilityHooks {
    fn on_insecure_tls(&self, plugin: &ToolPluginConfig) {
        metrics::counter!(
            "rille_tool_insecure_tls_total",
            "plugin" => plugin.id.clone()
        )
        .increment(1);
    }

    fn on_listing_success(&self, plugin: &ToolPluginConfig, tool_count: usize) {
        metrics::counter!(
            "rille_tool_listing_success_total",
            "plugin" => plugin.id.clone()
        )
        .increment(1);
        metrics::histogram!(
            "rille_tool_listed_tools",
            "plugin" => plugin.id.clone()
        )
        .record(tool_count as f64);
    }

    fn on_listing_fallback(&self, plugin: &ToolPluginConfig, error: Option<&ToolError>) {
        let error_kind = error
            .map(|error| format!("{:?}", error.kind))
            .unwrap_or_else(|| "Empty".to_string());
        metrics::counter!(
            "rille_tool_listing_fallback_total",
            "plugin" => plugin.id.clone(),
            "error_kind" => error_kind
        )
        .increment(1);
    }

    fn on_execution_start(&self, info: &ToolCallInfo, _context: &ToolExecutionContext) {
        metrics::counter!(
            "rille_tool_execution_start_total",
            "tool" => info.tool_name.clone()
        )
        .increment(1);
    }

    fn on_execution_success(
        &self,
        info: &ToolCallInfo,
        _context: &ToolExecutionContext,
        elapsed: Duration,
    ) {
        metrics::counter!(
            "rille_tool_execution_success_total",
            "tool" => info.tool_name.clone()
        )
        .increment(1);
        metrics::histogram!(
            "rille_tool_execution_duration_seconds",
            "tool" => info.tool_name.clone(),
            "outcome" => "success"
        )
        .record(elapsed.as_secs_f64());
    }

    fn on_execution_failure(
        &self,
        info: &ToolCallInfo,
        _context: &ToolExecutionContext,
        error: &ToolError,
        elapsed: Duration,
    ) {
        metrics::counter!(
            "rille_tool_execution_failure_total",
            "tool" => info.tool_name.clone(),
            "error_kind" => format!("{:?}", error.kind)
        )
        .increment(1);
        metrics::histogram!(
            "rille_tool_execution_duration_seconds",
            "tool" => info.tool_name.clone(),
            "outcome" => "failure"
        )
        .record(elapsed.as_secs_f64());
    }

    fn on_result_truncated(&self, info: &ToolCallInfo, _original_chars: usize) {
        metrics::counter!(
            "rille_tool_result_truncated_total",
            "tool" => info.tool_name.clone()
        )
        .increment(1);
    }

    fn on_close_failure(&self, plugin: &ToolPluginConfig, _error: &ToolError) {
        metrics::counter!(
            "rille_tool_close_failure_total",
            "plugin" => plugin.id.clone()
        )
        .increment(1);
    }
}

impl OrchestratorHooks for MetricsObservabilityHooks {
    fn on_step_start(&self, _step: usize, _message_count: usize) {
        metrics::counter!("rille_chat_step_total").increment(1);
    }

    fn on_step_limit_reached(&self, _max_steps: usize) {
        metrics::counter!("rille_chat_step_limit_reached_total").increment(1);
    }

    fn on_no_tool_results(&self, _step: usize) {
        metrics::counter!("rille_chat_no_tool_results_total").increment(1);
    }

    fn on_loop_complete(&self, steps: usize, usage: &Usage) {
        metrics::histogram!("rille_chat_tool_steps").record(steps as f64);
        metrics::counter!("rille_chat_tokens_total").increment(usage.total_tokens);
    }
}

impl ConsumerHooks for MetricsObservabilityHooks {
    fn on_progress_saved(&self, _message_id: &MessageId, _chars: usize) {
        metrics::counter!("rille_chat_progress_saved_total").increment(1);
    }

    fn on_persistence_failure(&self, _message_id: Option<&MessageId>, error: &ChatError) {
        metrics::counter!(
            "rille_chat_persistence_failure_total",
            "error_kind" => format!("{:?}", error.kind)
        )
        .increment(1);
    }

    fn on_finalized(&self, _message_id: &MessageId, snapshot: &MessageSnapshot) {
        metrics::counter!(
            "rille_chat_finalized_total",
            "outcome" => if snapshot.error.is_some() { "error" } else { "ok" }
        )
        .increment(1);
    }
}
