//! Tool bridge errors and classifications.

use std::error::Error;
use std::fmt::{Display, Formatter};

use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolErrorKind {
    NotFound,
    InvalidArguments,
    Execution,
    Timeout,
    Connection,
    Unauthorized,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub message: String,
    pub retryable: bool,
    pub tool_name: Option<String>,
    pub tool_call_id: Option<String>,
}

impl ToolError {
    pub fn new(kind: ToolErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable,
            tool_name: None,
            tool_call_id: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::NotFound, message, false)
    }

    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::InvalidArguments, message, false)
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Execution, message, false)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Timeout, message, true)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Connection, message, true)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Unauthorized, message, false)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Other, message, false)
    }

    pub fn with_tool_name(mut self, tool_name: impl Into<String>) -> Self {
        self.tool_name = Some(tool_name.into());
        self
    }

    pub fn with_tool_call_id(mut self, tool_call_id: impl Into<String>) -> Self {
        self.tool_call_id = Some(tool_call_id.into());
        self
    }

    /// Errors the model caused and can correct on its next step.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self.kind,
            ToolErrorKind::InvalidArguments | ToolErrorKind::NotFound
        )
    }

    /// `{"error": message}`, the tool-message body handed back to the model.
    pub fn to_model_content(&self) -> String {
        json!({ "error": self.message }).to_string()
    }
}

impl Display for ToolError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (&self.tool_name, &self.tool_call_id) {
            (Some(tool_name), Some(tool_call_id)) => write!(
                f,
                "{:?} [tool={}, call_id={}]: {}",
                self.kind, tool_name, tool_call_id, self.message
            ),
            (Some(tool_name), None) => {
                write!(f, "{:?} [tool={}]: {}", self.kind, tool_name, self.message)
            }
            _ => write!(f, "{:?}: {}", self.kind, self.message),
        }
    }
}

impl Error for ToolError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_and_connection_failures_are_retryable() {
        assert!(ToolError::timeout("slow").retryable);
        assert!(ToolError::connection("refused").retryable);
        assert!(!ToolError::execution("boom").retryable);
    }

    #[test]
    fn model_content_is_an_error_object() {
        let error = ToolError::not_found("tool 'nope' is not available").with_tool_name("nope");

        assert!(error.is_user_error());
        assert_eq!(
            error.to_model_content(),
            "{\"error\":\"tool 'nope' is not available\"}"
        );
        assert_eq!(error.to_string(), "NotFound [tool=nope]: tool 'nope' is not available");
    }
}
