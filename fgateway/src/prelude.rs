//! Common imports for most rille applications.

pub use crate::{assistant_message, parse_protocol, system_message, user_message};
pub use crate::{fg_messages, fg_msg};
pub use crate::{
    CallRequest, ChatError, ChatErrorKind, ChatEvent, ChatStreamRequest, CheckResult,
    CommonSettings, FinalizeOutcome, GatewayConfig, GatewayRuntime, GatewayStream,
    InMemoryMessagePersister, MessagePersister, MessageSnapshot, ModelInfo, ProtocolType,
    ProviderConfig, ProviderError, Role, SessionId, ToolCallInfo, ToolPluginConfig,
    UnifiedMessage, UnifiedStreamEvent, Usage, WireFrame, ndjson_lines,
};
