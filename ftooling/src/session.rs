//! Seams between the bridge and an MCP client library.
//!
//! A [`McpConnector`] opens one [`McpSession`] per operation; the bridge always closes
//! it afterwards, so sessions never outlive a single listing or call.

use fcommon::BoxFuture;
use serde_json::{Map, Value};

use crate::{ToolError, ToolPluginConfig};

pub type ToolFuture<'a, T> = BoxFuture<'a, T>;

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteTool {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Option<Value>,
}

impl RemoteTool {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_input_schema(mut self, input_schema: Value) -> Self {
        self.input_schema = Some(input_schema);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemoteContent {
    Text(String),
    Other(Value),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteToolOutput {
    pub content: Vec<RemoteContent>,
    pub structured: Option<Value>,
    pub is_error: bool,
}

impl RemoteToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![RemoteContent::Text(text.into())],
            ..Self::default()
        }
    }

    pub fn with_error(mut self, is_error: bool) -> Self {
        self.is_error = is_error;
        self
    }

    /// Text items joined by newlines; otherwise the structured payload; otherwise the
    /// raw content list as JSON.
    pub fn into_text(self) -> String {
        let texts = self
            .content
            .iter()
            .filter_map(|item| match item {
                RemoteContent::Text(text) => Some(text.as_str()),
                RemoteContent::Other(_) => None,
            })
            .collect::<Vec<_>>();
        if !texts.is_empty() {
            return texts.join("\n");
        }

        if let Some(structured) = self.structured {
            return structured.to_string();
        }

        let raw = self
            .content
            .into_iter()
            .map(|item| match item {
                RemoteContent::Text(text) => Value::String(text),
                RemoteContent::Other(value) => value,
            })
            .collect::<Vec<_>>();
        Value::Array(raw).to_string()
    }
}

pub trait McpSession: Send + Sync {
    fn list_tools(&self) -> ToolFuture<'_, Result<Vec<RemoteTool>, ToolError>>;

    fn call_tool<'a>(
        &'a self,
        name: &'a str,
        arguments: Map<String, Value>,
    ) -> ToolFuture<'a, Result<RemoteToolOutput, ToolError>>;

    fn close(self: Box<Self>) -> ToolFuture<'static, Result<(), ToolError>>;
}

pub trait McpConnector: Send + Sync {
    fn connect<'a>(
        &'a self,
        plugin: &'a ToolPluginConfig,
    ) -> ToolFuture<'a, Result<Box<dyn McpSession>, ToolError>>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn text_items_win_over_structured_content() {
        let output = RemoteToolOutput {
            content: vec![
                RemoteContent::Text("line one".to_string()),
                RemoteContent::Other(json!({"type": "image", "data": "..."})),
                RemoteContent::Text("line two".to_string()),
            ],
            structured: Some(json!({"ignored": true})),
            is_error: false,
        };

        assert_eq!(output.into_text(), "line one\nline two");
    }

    #[test]
    fn structured_then_raw_content_are_fallbacks() {
        let structured = RemoteToolOutput {
            structured: Some(json!({"temp": 21})),
            ..RemoteToolOutput::default()
        };
        assert_eq!(structured.into_text(), "{\"temp\":21}");

        let raw = RemoteToolOutput {
            content: vec![RemoteContent::Other(json!({"type": "resource"}))],
            ..RemoteToolOutput::default()
        };
        assert_eq!(raw.into_text(), "[{\"type\":\"resource\"}]");
    }
}
