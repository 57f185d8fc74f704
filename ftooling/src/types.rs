//! Tool execution context and outcome types.

use fcommon::{MetadataMap, SessionId, TraceId};
use fprovider::{ToolCall, UnifiedMessage, Usage};

use crate::ToolCallInfo;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolExecutionContext {
    pub session_id: SessionId,
    pub trace_id: Option<TraceId>,
    pub metadata: MetadataMap,
}

impl ToolExecutionContext {
    pub fn new(session_id: impl Into<SessionId>) -> Self {
        Self {
            session_id: session_id.into(),
            trace_id: None,
            metadata: MetadataMap::new(),
        }
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<TraceId>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Finished tool call. Failures are recorded in `info`, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolExecution {
    pub info: ToolCallInfo,
    pub usage: Option<Usage>,
}

impl ToolExecution {
    pub fn new(info: ToolCallInfo) -> Self {
        Self { info, usage: None }
    }

    pub fn is_error(&self) -> bool {
        self.info.error.is_some()
    }

    /// Tool-role message answering `call`.
    pub fn to_message(&self, call: &ToolCall) -> UnifiedMessage {
        UnifiedMessage::tool_result(call.id.clone(), call.name.clone(), self.info.model_content())
    }
}
