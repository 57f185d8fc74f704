//! Tool call records surfaced to clients and persisted with the assistant message.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallStatus {
    Pending,
    Running,
    Completed,
    Error,
}

impl ToolCallStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallInfo {
    pub tool_call_id: String,
    pub plugin_id: String,
    pub plugin_name: String,
    pub tool_name: String,
    pub arguments: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    pub status: ToolCallStatus,
}

impl ToolCallInfo {
    pub fn pending(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            plugin_id: String::new(),
            plugin_name: String::new(),
            tool_name: tool_name.into(),
            arguments: arguments.into(),
            result: None,
            error: None,
            duration_ms: None,
            status: ToolCallStatus::Pending,
        }
    }

    pub fn with_plugin(mut self, plugin_id: impl Into<String>, plugin_name: impl Into<String>) -> Self {
        self.plugin_id = plugin_id.into();
        self.plugin_name = plugin_name.into();
        self
    }

    pub fn running(mut self) -> Self {
        self.status = ToolCallStatus::Running;
        self
    }

    pub fn completed(mut self, result: impl Into<String>, duration_ms: u64) -> Self {
        self.result = Some(result.into());
        self.error = None;
        self.duration_ms = Some(duration_ms);
        self.status = ToolCallStatus::Completed;
        self
    }

    /// `content` is what the model sees; `error` is the human-readable cause.
    pub fn failed(mut self, content: impl Into<String>, error: impl Into<String>, duration_ms: u64) -> Self {
        self.result = Some(content.into());
        self.error = Some(error.into());
        self.duration_ms = Some(duration_ms);
        self.status = ToolCallStatus::Error;
        self
    }

    /// Body of the tool message fed back to the model.
    pub fn model_content(&self) -> &str {
        self.result.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_camel_case_with_lowercase_status() {
        let info = ToolCallInfo::pending("call_1", "docs_search", "{}")
            .with_plugin("p1", "Docs")
            .completed("found 3", 42);

        let value = serde_json::to_value(&info).expect("serialize info");

        assert_eq!(value["toolCallId"], "call_1");
        assert_eq!(value["pluginName"], "Docs");
        assert_eq!(value["durationMs"], 42);
        assert_eq!(value["status"], "completed");
        assert!(value.get("error").is_none());
        assert!(info.status.is_finished());
    }
}
