//! Common `fprovider` imports for downstream crates.

pub use crate::{
    AdapterRegistry, CallRequest, CheckResult, CommonSettings, ContentPart, EventStream,
    MessageContent, ModelInfo, NoopOperationHooks, ProtocolAdapter, ProtocolType, ProviderConfig,
    ProviderError, ProviderErrorKind, ProviderFuture, ProviderOperationHooks, ReasoningSettings,
    Role, ToolCall, ToolCallAccumulator, ToolDefinition, UnifiedMessage, UnifiedStreamEvent, Usage,
};
pub use fcommon::{BoxFuture, MetadataMap};
