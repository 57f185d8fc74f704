//! Unified facade over the rille workspace crates.
//!
//! This crate is designed to be the single dependency for most applications.
//! It re-exports the core crates and wires them into one streaming chat pipeline:
//! protocol adapter, optional MCP tool loop, and persistence-aware NDJSON frames.
//!
//! ```rust
//! use rille::{CallRequest, ChatStreamRequest, ProviderConfig, fg_messages};
//!
//! let call = CallRequest::new(
//!     "gpt-4o-mini",
//!     fg_messages![system => "You are concise.", user => "Hello"],
//! );
//! let request = ChatStreamRequest::new("session-1", "openai", ProviderConfig::new("sk-test"), call);
//!
//! assert!(request.plugins.is_empty());
//! assert_eq!(request.call.messages.len(), 2);
//! ```

mod macros;

pub mod prelude;
pub mod runtime;
pub mod util;

pub use fchat;
pub use fcommon;
pub use fobserve;
pub use fprovider;
pub use ftooling;

pub use fchat::{
    ChatError, ChatErrorKind, ChatEvent, ChatEventStream, ConsumerHooks, ConsumerPolicy,
    FinalUsage, FinalizeOutcome, FrameStream, InMemoryMessagePersister, MAX_TOOL_STEPS,
    MessagePart, MessagePersister, MessageSnapshot, NoopChatHooks, OrchestratedStream,
    OrchestratorHooks, StreamingConsumer, ToolLoop, WireFrame, ndjson_lines,
};
pub use fcommon::{BoxFuture, MessageId, MetadataMap, SessionId, TraceId};
pub use fobserve::{
    MetricsObservabilityHooks, SafeChatHooks, SafeProviderHooks, SafeToolHooks,
    TracingObservabilityHooks,
};
pub use fprovider::{
    AdapterRegistry, CallRequest, CheckResult, CommonSettings, EventStream, MessageContent,
    ModelInfo, ProtocolAdapter, ProtocolType, ProviderConfig, ProviderError, ProviderErrorKind,
    ProviderFuture, ReasoningSettings, ReqwestTransport, Role, SecretString, ToolCall,
    ToolDefinition, UnifiedMessage, UnifiedStreamEvent, Usage, VecEventStream,
    protocol_for_provider,
};
pub use ftooling::{
    BridgeRuntime, ToolBridge, ToolBridgePolicy, ToolCallInfo, ToolCallStatus, ToolError,
    ToolErrorKind, ToolExecutionContext, ToolPluginConfig, ToolRuntime,
};

pub use runtime::{ChatStreamRequest, GatewayConfig, GatewayRuntime, GatewayStream};
pub use util::{assistant_message, parse_protocol, system_message, user_message};
