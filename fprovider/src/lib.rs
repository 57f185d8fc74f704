//! Unified streaming event model and protocol adapters for multi-vendor chat.
//!
//! Every vendor stream is translated into [`UnifiedStreamEvent`]s that end in exactly one
//! terminal event. Adapters are shared per protocol family through [`AdapterRegistry`].

mod accumulator;
mod adapter;
mod error;
mod event;
mod hooks;
mod lines;
mod message;
mod protocol;
mod secret;
mod settings;
mod transport;
mod usage;

pub mod adapters;
pub mod prelude;
pub mod registry;

pub use accumulator::ToolCallAccumulator;
pub use adapter::{ProtocolAdapter, ProviderFuture};
pub use error::{ProviderError, ProviderErrorKind};
pub use event::{EventStream, FallibleEventStream, UnifiedStreamEvent, VecEventStream, terminate};
pub use hooks::{NoopOperationHooks, ObservedAdapter, ProviderOperationHooks};
pub use lines::{LineDecoder, SSE_DONE, sse_data};
pub use message::{ContentPart, MessageContent, Role, ToolCall, ToolDefinition, UnifiedMessage};
pub use protocol::{
    ProtocolType, ProviderApiConfig, default_base_url_for_provider, protocol_for_provider,
    provider_api_config,
};
pub use registry::{AdapterRegistry, create_adapter};
pub use secret::SecretString;
pub use settings::{
    CallRequest, CheckResult, CommonSettings, ModelInfo, ModelPricing, ProviderConfig,
    ReasoningEffort, ReasoningSettings, SearchSettings,
};
pub use transport::{ByteStream, HttpMethod, HttpRequest, HttpTransport, ReqwestTransport};
pub use usage::Usage;
