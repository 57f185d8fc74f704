//! Tool-call orchestration and streaming persistence over protocol adapters.
//!
//! [`ToolLoop`] drives the bounded model/tool loop and yields [`ChatEvent`]s;
//! [`StreamingConsumer`] turns those events into NDJSON [`WireFrame`]s while persisting the
//! assistant message through a [`MessagePersister`].

mod consumer;
mod error;
mod hooks;
mod orchestrator;
mod persist;
mod wire;

pub mod prelude {
    pub use crate::{
        ChatError, ChatErrorKind, ChatEvent, ChatEventStream, ConsumerPolicy, FinalizeOutcome,
        FrameStream, InMemoryMessagePersister, MessagePersister, MessageSnapshot,
        OrchestratedStream, StreamingConsumer, ToolLoop, WireFrame, ndjson_lines,
    };
    pub use fcommon::{MessageId, MetadataMap, SessionId, TraceId};
    pub use ftooling::{ToolCallInfo, ToolCallStatus, ToolExecutionContext, ToolRuntime};
}

pub use consumer::{ConsumerPolicy, Finalizer, StreamingConsumer};
pub use error::{ChatError, ChatErrorKind};
pub use hooks::{ConsumerHooks, NoopChatHooks, OrchestratorHooks};
pub use orchestrator::{
    ChatEvent, ChatEventStream, FinalUsage, MAX_TOOL_STEPS, OrchestratedStream, ToolLoop,
};
pub use persist::{
    ChatFuture, FinalizeOutcome, InMemoryMessagePersister, MessagePart, MessagePersister,
    MessageSnapshot, StoredMessage,
};
pub use wire::{
    FrameStream, LineStream, ToolCallFragment, ToolLifecycleEvent, ToolLifecyclePhase,
    WireFrame, ndjson_lines,
};
pub use fcommon::{MessageId, MetadataMap, SessionId, TraceId};
