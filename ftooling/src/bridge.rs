//! Tool bridge: lists plugin tools for the model and executes the calls it makes.
//!
//! Every listing and call opens its own MCP session and closes it afterwards. Calls are
//! bounded by [`ToolBridgePolicy::call_timeout`] and their results by
//! [`ToolBridgePolicy::max_result_chars`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use fcommon::{char_len, truncate_chars};
use fprovider::ToolCall;
use futures_util::future::join_all;

use crate::args::{parse_arguments, unwrap_fallback_arguments};
use crate::session::{McpConnector, McpSession, RemoteTool, RemoteToolOutput};
use crate::{
    CatalogEntry, NoopToolBridgeHooks, RmcpSseConnector, ToolBridgeHooks, ToolCallInfo,
    ToolCatalog, ToolError, ToolExecution, ToolExecutionContext, ToolPluginConfig, ToolTarget,
};

const SHORT_TRUNCATION_MARKER: &str = "…[truncated]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolBridgePolicy {
    pub call_timeout: Duration,
    pub max_result_chars: usize,
    pub preview_chars: usize,
}

impl Default for ToolBridgePolicy {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(25),
            max_result_chars: 64_000,
            preview_chars: 2_000,
        }
    }
}

impl ToolBridgePolicy {
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn with_max_result_chars(mut self, max_result_chars: usize) -> Self {
        self.max_result_chars = max_result_chars;
        self
    }

    pub fn with_preview_chars(mut self, preview_chars: usize) -> Self {
        self.preview_chars = preview_chars;
        self
    }

    /// Replaces oversized output with a preview and a marker naming the original size.
    /// Returns the original length in characters when truncation happened.
    pub fn cap_result(&self, text: String) -> (String, Option<usize>) {
        let original = char_len(&text);
        if original <= self.max_result_chars {
            return (text, None);
        }

        // Output stays strictly below the cap, shortening the marker when it cannot fit.
        let limit = self.max_result_chars.saturating_sub(1);
        let mut marker = format!("\n…[tool result too large: {original} chars, truncated]");
        if char_len(&marker) > limit {
            marker = truncate_chars(SHORT_TRUNCATION_MARKER, limit).to_string();
        }
        let room = limit - char_len(&marker);
        let preview = truncate_chars(&text, self.preview_chars.min(room));

        (format!("{preview}{marker}"), Some(original))
    }
}

pub struct ToolBridge {
    connector: Arc<dyn McpConnector>,
    hooks: Arc<dyn ToolBridgeHooks>,
    policy: ToolBridgePolicy,
}

impl Default for ToolBridge {
    fn default() -> Self {
        Self::new(Arc::new(RmcpSseConnector))
    }
}

impl ToolBridge {
    pub fn new(connector: Arc<dyn McpConnector>) -> Self {
        Self {
            connector,
            hooks: Arc::new(NoopToolBridgeHooks),
            policy: ToolBridgePolicy::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ToolBridgeHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_policy(mut self, policy: ToolBridgePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &ToolBridgePolicy {
        &self.policy
    }

    /// Lists every plugin concurrently. A plugin that fails or exposes nothing contributes
    /// its fallback tool instead, so listing never fails as a whole.
    pub async fn list_tools(&self, plugins: &[ToolPluginConfig]) -> ToolCatalog {
        let listings = join_all(plugins.iter().map(|plugin| self.list_plugin(plugin))).await;
        let mut catalog = ToolCatalog::new();

        for (plugin, listing) in plugins.iter().zip(listings) {
            let plugin = Arc::new(plugin.clone());
            match listing {
                Ok(tools) if !tools.is_empty() => {
                    self.hooks.on_listing_success(&plugin, tools.len());
                    for tool in tools {
                        catalog.push_remote(Arc::clone(&plugin), tool);
                    }
                }
                Ok(_) => {
                    self.hooks.on_listing_fallback(&plugin, None);
                    catalog.push_fallback(plugin);
                }
                Err(error) => {
                    self.hooks.on_listing_fallback(&plugin, Some(&error));
                    catalog.push_fallback(plugin);
                }
            }
        }

        catalog
    }

    /// Runs one model tool call. Failures come back as an errored [`ToolExecution`] whose
    /// content is `{"error": ...}`.
    pub async fn execute(
        &self,
        catalog: &ToolCatalog,
        call: &ToolCall,
        context: &ToolExecutionContext,
    ) -> ToolExecution {
        let started = Instant::now();
        let info = ToolCallInfo::pending(&call.id, &call.name, &call.arguments);

        let Some(entry) = catalog.resolve(&call.name) else {
            let error = ToolError::not_found(format!("tool '{}' is not available", call.name))
                .with_tool_name(&call.name)
                .with_tool_call_id(&call.id);
            return self.fail(info, context, error, started);
        };

        let info = info
            .with_plugin(&entry.plugin.id, &entry.plugin.name)
            .running();
        self.hooks.on_execution_start(&info, context);

        match self.invoke(entry, call).await {
            Ok(output) if output.is_error => {
                let error = ToolError::execution(output.into_text())
                    .with_tool_name(&call.name)
                    .with_tool_call_id(&call.id);
                self.fail(info, context, error, started)
            }
            Ok(output) => self.complete(info, context, output, started),
            Err(error) => {
                let error = error.with_tool_name(&call.name).with_tool_call_id(&call.id);
                self.fail(info, context, error, started)
            }
        }
    }

    async fn list_plugin(&self, plugin: &ToolPluginConfig) -> Result<Vec<RemoteTool>, ToolError> {
        let listing = async {
            let session = self.open(plugin).await?;
            let listed = session.list_tools().await;
            self.close(plugin, session).await;
            listed
        };

        tokio::time::timeout(self.policy.call_timeout, listing)
            .await
            .unwrap_or_else(|_| {
                Err(ToolError::timeout(format!(
                    "tool listing timeout: plugin '{}' did not respond within {}",
                    plugin.name,
                    seconds(self.policy.call_timeout)
                )))
            })
    }

    async fn invoke(
        &self,
        entry: &CatalogEntry,
        call: &ToolCall,
    ) -> Result<RemoteToolOutput, ToolError> {
        let arguments = parse_arguments(&call.arguments)?;
        let (tool_name, arguments) = match &entry.target {
            ToolTarget::Remote { tool_name } => (tool_name.clone(), arguments),
            ToolTarget::Fallback => unwrap_fallback_arguments(arguments)?,
        };
        let plugin = entry.plugin.as_ref();

        let invocation = async {
            let session = self.open(plugin).await?;
            let output = session.call_tool(&tool_name, arguments).await;
            self.close(plugin, session).await;
            output
        };

        tokio::time::timeout(self.policy.call_timeout, invocation)
            .await
            .unwrap_or_else(|_| {
                Err(ToolError::timeout(format!(
                    "tool call timeout: '{tool_name}' did not respond within {}",
                    seconds(self.policy.call_timeout)
                )))
            })
    }

    async fn open(&self, plugin: &ToolPluginConfig) -> Result<Box<dyn McpSession>, ToolError> {
        if plugin.skips_tls_verification() {
            self.hooks.on_insecure_tls(plugin);
        }
        self.connector.connect(plugin).await
    }

    async fn close(&self, plugin: &ToolPluginConfig, session: Box<dyn McpSession>) {
        if let Err(error) = session.close().await {
            self.hooks.on_close_failure(plugin, &error);
        }
    }

    fn complete(
        &self,
        info: ToolCallInfo,
        context: &ToolExecutionContext,
        output: RemoteToolOutput,
        started: Instant,
    ) -> ToolExecution {
        let elapsed = started.elapsed();
        let (content, truncated_from) = self.policy.cap_result(output.into_text());
        let info = info.completed(content, millis(elapsed));

        if let Some(original_chars) = truncated_from {
            self.hooks.on_result_truncated(&info, original_chars);
        }
        self.hooks.on_execution_success(&info, context, elapsed);
        ToolExecution::new(info)
    }

    fn fail(
        &self,
        info: ToolCallInfo,
        context: &ToolExecutionContext,
        error: ToolError,
        started: Instant,
    ) -> ToolExecution {
        let elapsed = started.elapsed();
        let (content, _) = self.policy.cap_result(error.to_model_content());
        let info = info.failed(content, error.message.clone(), millis(elapsed));

        self.hooks.on_execution_failure(&info, context, &error, elapsed);
        ToolExecution::new(info)
    }
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

fn seconds(duration: Duration) -> String {
    format!("{}s", duration.as_secs_f64())
}
