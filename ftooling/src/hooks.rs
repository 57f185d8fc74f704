//! Lifecycle hooks for tool listing and execution.
//!
//! ```rust
//! use ftooling::{NoopToolBridgeHooks, ToolBridgeHooks};
//!
//! fn assert_hooks_trait(_hooks: &dyn ToolBridgeHooks) {}
//!
//! assert_hooks_trait(&NoopToolBridgeHooks);
//! ```

use std::time::Duration;

use crate::{ToolCallInfo, ToolError, ToolExecutionContext, ToolPluginConfig};

pub trait ToolBridgeHooks: Send + Sync {
    fn on_insecure_tls(&self, _plugin: &ToolPluginConfig) {}

    fn on_listing_success(&self, _plugin: &ToolPluginConfig, _tool_count: usize) {}

    fn on_listing_fallback(&self, _plugin: &ToolPluginConfig, _error: Option<&ToolError>) {}

    fn on_execution_start(&self, _info: &ToolCallInfo, _context: &ToolExecutionContext) {}

    fn on_execution_success(
        &self,
        _info: &ToolCallInfo,
        _context: &ToolExecutionContext,
        _elapsed: Duration,
    ) {
    }

    fn on_execution_failure(
        &self,
        _info: &ToolCallInfo,
        _context: &ToolExecutionContext,
        _error: &ToolError,
        _elapsed: Duration,
    ) {
    }

    fn on_result_truncated(&self, _info: &ToolCallInfo, _original_chars: usize) {}

    fn on_close_failure(&self, _plugin: &ToolPluginConfig, _error: &ToolError) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopToolBridgeHooks;

impl ToolBridgeHooks for NoopToolBridgeHooks {}
