//! Tool bridge between model tool calls and MCP servers reached over SSE.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use ftooling::{ToolBridge, ToolCatalog, ToolPluginConfig};
//!
//! let bridge = Arc::new(ToolBridge::default());
//! let plugin = ToolPluginConfig::new("p1", "Docs", "http://localhost:3000");
//!
//! assert_eq!(plugin.exposed_tool_name("search"), "docs_search");
//! assert_eq!(bridge.policy().max_result_chars, 64_000);
//! assert!(ToolCatalog::new().is_empty());
//! ```

mod args;
mod bridge;
mod catalog;
mod error;
mod hooks;
mod info;
mod plugin;
mod rmcp_client;
mod runtime;
mod session;
mod types;

pub mod prelude {
    pub use crate::{
        BridgeRuntime, ToolBridge, ToolBridgeHooks, ToolBridgePolicy, ToolCallInfo,
        ToolCallStatus, ToolCatalog, ToolError, ToolErrorKind, ToolExecution,
        ToolExecutionContext, ToolPluginConfig, ToolRuntime,
    };
}

pub use args::{parse_arguments, required_string, unwrap_fallback_arguments};
pub use bridge::{ToolBridge, ToolBridgePolicy};
pub use catalog::{CatalogEntry, ToolCatalog, ToolTarget};
pub use error::{ToolError, ToolErrorKind};
pub use hooks::{NoopToolBridgeHooks, ToolBridgeHooks};
pub use info::{ToolCallInfo, ToolCallStatus};
pub use plugin::{PluginAuth, ToolPluginConfig};
pub use rmcp_client::{RmcpSession, RmcpSseConnector};
pub use runtime::{BridgeRuntime, ToolRuntime};
pub use session::{
    McpConnector, McpSession, RemoteContent, RemoteTool, RemoteToolOutput, ToolFuture,
};
pub use types::{ToolExecution, ToolExecutionContext};
