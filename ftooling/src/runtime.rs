//! Tool runtime seam consumed by the chat orchestrator.

use std::sync::Arc;

use fprovider::{ToolCall, ToolDefinition};

use crate::{ToolBridge, ToolCatalog, ToolExecution, ToolExecutionContext, ToolFuture, ToolPluginConfig};

/// Tools offered to the model for one turn. Execution never fails: errors are folded
/// into the returned [`ToolExecution`].
pub trait ToolRuntime: Send + Sync {
    fn definitions(&self) -> Vec<ToolDefinition>;

    fn execute<'a>(
        &'a self,
        tool_call: ToolCall,
        context: ToolExecutionContext,
    ) -> ToolFuture<'a, ToolExecution>;
}

/// Runtime over a catalog listed from MCP plugins.
#[derive(Clone)]
pub struct BridgeRuntime {
    bridge: Arc<ToolBridge>,
    catalog: ToolCatalog,
}

impl BridgeRuntime {
    pub fn new(bridge: Arc<ToolBridge>, catalog: ToolCatalog) -> Self {
        Self { bridge, catalog }
    }

    /// Lists `plugins` through `bridge` and wraps the resulting catalog.
    pub async fn connect(bridge: Arc<ToolBridge>, plugins: &[ToolPluginConfig]) -> Self {
        let catalog = bridge.list_tools(plugins).await;
        Self::new(bridge, catalog)
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }
}

impl ToolRuntime for BridgeRuntime {
    fn definitions(&self) -> Vec<ToolDefinition> {
        self.catalog.definitions().to_vec()
    }

    fn execute<'a>(
        &'a self,
        tool_call: ToolCall,
        context: ToolExecutionContext,
    ) -> ToolFuture<'a, ToolExecution> {
        Box::pin(async move { self.bridge.execute(&self.catalog, &tool_call, &context).await })
    }
}
