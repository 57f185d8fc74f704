//! Lifecycle hooks for the tool loop and the streaming consumer.
//!
//! ```rust
//! use fchat::{ConsumerHooks, NoopChatHooks, OrchestratorHooks};
//!
//! fn assert_hooks(_orchestrator: &dyn OrchestratorHooks, _consumer: &dyn ConsumerHooks) {}
//!
//! assert_hooks(&NoopChatHooks, &NoopChatHooks);
//! ```

use fcommon::MessageId;
use fprovider::Usage;

use crate::{ChatError, MessageSnapshot};

pub trait OrchestratorHooks: Send + Sync {
    fn on_step_start(&self, _step: usize, _message_count: usize) {}

    fn on_step_limit_reached(&self, _max_steps: usize) {}

    fn on_no_tool_results(&self, _step: usize) {}

    fn on_loop_complete(&self, _steps: usize, _usage: &Usage) {}
}

pub trait ConsumerHooks: Send + Sync {
    fn on_progress_saved(&self, _message_id: &MessageId, _chars: usize) {}

    /// `message_id` is `None` when the pending record could not be created.
    fn on_persistence_failure(&self, _message_id: Option<&MessageId>, _error: &ChatError) {}

    fn on_finalized(&self, _message_id: &MessageId, _snapshot: &MessageSnapshot) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopChatHooks;

impl OrchestratorHooks for NoopChatHooks {}

impl ConsumerHooks for NoopChatHooks {}
