//! MCP over SSE, backed by `rmcp`.

use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use rmcp::{
    RoleClient, ServiceExt,
    model::{CallToolRequestParam, CallToolResult, Tool},
    service::RunningService,
    transport::{
        SseClientTransport, common::client_side_sse::FixedInterval, sse_client::SseClientConfig,
    },
};
use serde_json::{Map, Value};

use crate::session::{
    McpConnector, McpSession, RemoteContent, RemoteTool, RemoteToolOutput, ToolFuture,
};
use crate::{PluginAuth, ToolError, ToolPluginConfig};

/// Opens a fresh SSE connection for every session.
#[derive(Debug, Default, Clone, Copy)]
pub struct RmcpSseConnector;

impl RmcpSseConnector {
    fn http_client(plugin: &ToolPluginConfig) -> Result<reqwest::Client, ToolError> {
        let mut headers = HeaderMap::new();

        if let PluginAuth::ApiKey(api_key) = &plugin.auth {
            let value = HeaderValue::from_str(&format!("Bearer {}", api_key.expose()))
                .map_err(|_| ToolError::other("plugin api key is not a valid header value"))?;
            headers.insert(AUTHORIZATION, value);
        }

        for (name, value) in &plugin.custom_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ToolError::other(format!("invalid header name '{name}'")))?;
            let value = HeaderValue::from_str(value).map_err(|_| {
                ToolError::other(format!("invalid value for header '{name}'"))
            })?;
            headers.insert(name, value);
        }

        reqwest::Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(plugin.skips_tls_verification())
            .build()
            .map_err(|error| ToolError::connection(format!("failed to build http client: {error}")))
    }
}

impl McpConnector for RmcpSseConnector {
    fn connect<'a>(
        &'a self,
        plugin: &'a ToolPluginConfig,
    ) -> ToolFuture<'a, Result<Box<dyn McpSession>, ToolError>> {
        Box::pin(async move {
            let client = Self::http_client(plugin)?;
            let endpoint = plugin.sse_endpoint();
            let config = SseClientConfig {
                sse_endpoint: endpoint.clone().into(),
                retry_policy: Arc::new(FixedInterval::default()),
                use_message_endpoint: None,
            };

            let transport = SseClientTransport::start_with_client(client, config)
                .await
                .map_err(|error| {
                    ToolError::connection(format!("failed to open SSE stream at {endpoint}: {error}"))
                })?;
            let service = ().serve(transport).await.map_err(|error| {
                ToolError::connection(format!("MCP handshake with {endpoint} failed: {error}"))
            })?;

            Ok(Box::new(RmcpSession { service }) as Box<dyn McpSession>)
        })
    }
}

pub struct RmcpSession {
    service: RunningService<RoleClient, ()>,
}

impl McpSession for RmcpSession {
    fn list_tools(&self) -> ToolFuture<'_, Result<Vec<RemoteTool>, ToolError>> {
        Box::pin(async move {
            let listed = self
                .service
                .list_tools(Default::default())
                .await
                .map_err(|error| ToolError::connection(format!("tools/list failed: {error}")))?;

            Ok(listed.tools.into_iter().map(remote_tool).collect())
        })
    }

    fn call_tool<'a>(
        &'a self,
        name: &'a str,
        arguments: Map<String, Value>,
    ) -> ToolFuture<'a, Result<RemoteToolOutput, ToolError>> {
        Box::pin(async move {
            let result = self
                .service
                .call_tool(CallToolRequestParam {
                    name: name.to_string().into(),
                    arguments: Some(arguments),
                })
                .await
                .map_err(|error| ToolError::execution(format!("tools/call failed: {error}")))?;

            Ok(remote_output(result))
        })
    }

    fn close(self: Box<Self>) -> ToolFuture<'static, Result<(), ToolError>> {
        Box::pin(async move {
            self.service
                .cancel()
                .await
                .map(|_| ())
                .map_err(|error| ToolError::connection(format!("failed to close MCP session: {error}")))
        })
    }
}

fn remote_tool(tool: Tool) -> RemoteTool {
    RemoteTool {
        name: tool.name.into_owned(),
        description: tool.description.map(|description| description.into_owned()),
        input_schema: Some(Value::Object(tool.input_schema.as_ref().clone())),
    }
}

fn remote_output(result: CallToolResult) -> RemoteToolOutput {
    let content = result
        .content
        .into_iter()
        .map(|item| match item.raw.as_text() {
            Some(text) => RemoteContent::Text(text.text.clone()),
            None => RemoteContent::Other(serde_json::to_value(&item).unwrap_or(Value::Null)),
        })
        .collect();

    RemoteToolOutput {
        content,
        structured: result.structured_content,
        is_error: result.is_error.unwrap_or(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolErrorKind;

    fn plugin() -> ToolPluginConfig {
        ToolPluginConfig::new("p1", "Docs", "http://localhost:3000")
    }

    #[test]
    fn bad_plugin_headers_are_configuration_errors() {
        let errors = [
            RmcpSseConnector::http_client(&plugin().with_header("bad header", "v")),
            RmcpSseConnector::http_client(&plugin().with_header("x-trace", "line\nbreak")),
            RmcpSseConnector::http_client(&plugin().with_api_key("key\r\n")),
        ];

        for error in errors {
            let error = error.expect_err("header must be rejected");
            assert_eq!(error.kind, ToolErrorKind::Other);
            assert!(!error.is_user_error());
            assert!(!error.retryable);
        }
    }

    #[test]
    fn valid_headers_build_a_client() {
        let plugin = plugin().with_api_key("secret").with_header("x-trace", "abc");

        assert!(RmcpSseConnector::http_client(&plugin).is_ok());
    }
}
