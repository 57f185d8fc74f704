//! Streaming consumer: turns chat events into wire frames while persisting the message.
//!
//! A pending record is created before the first frame. Partial progress is saved on a
//! debounce, and the message is finalized exactly once: on normal completion by the stream
//! itself, or by a [`Finalizer`] guard when the stream is dropped part-way through.

use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use fcommon::{MessageId, SessionId, char_len};
use futures_util::StreamExt;
use fprovider::{ToolCallAccumulator, UnifiedStreamEvent};
use tokio::time::Instant;

use crate::{
    ChatError, ChatEvent, ChatEventStream, ConsumerHooks, FinalizeOutcome, FrameStream,
    MessagePersister, MessageSnapshot, NoopChatHooks, ToolCallFragment, ToolLifecycleEvent,
    ToolLifecyclePhase, WireFrame,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerPolicy {
    pub save_interval: Duration,
    pub save_length_threshold: usize,
}

impl Default for ConsumerPolicy {
    fn default() -> Self {
        Self {
            save_interval: Duration::from_secs(5),
            save_length_threshold: 100,
        }
    }
}

impl ConsumerPolicy {
    pub fn with_save_interval(mut self, save_interval: Duration) -> Self {
        self.save_interval = save_interval;
        self
    }

    pub fn with_save_length_threshold(mut self, save_length_threshold: usize) -> Self {
        self.save_length_threshold = save_length_threshold;
        self
    }
}

/// Progress-save bookkeeping: time of the last save and characters seen at that point.
#[derive(Debug)]
struct Debounce {
    policy: ConsumerPolicy,
    last_saved_at: Instant,
    saved_chars: usize,
}

impl Debounce {
    fn new(policy: ConsumerPolicy) -> Self {
        Self {
            policy,
            last_saved_at: Instant::now(),
            saved_chars: 0,
        }
    }

    fn due(&self, chars: usize) -> bool {
        self.last_saved_at.elapsed() >= self.policy.save_interval
            || chars.saturating_sub(self.saved_chars) >= self.policy.save_length_threshold
    }

    fn mark(&mut self, chars: usize) {
        self.last_saved_at = Instant::now();
        self.saved_chars = chars;
    }
}

/// Owns the accumulated message until it is finalized.
///
/// Dropping an unfinished guard spawns the finalize call on the current tokio runtime.
pub struct Finalizer {
    persister: Arc<dyn MessagePersister>,
    hooks: Arc<dyn ConsumerHooks>,
    message_id: MessageId,
    snapshot: MessageSnapshot,
    finalized: bool,
}

impl Finalizer {
    pub fn new(
        persister: Arc<dyn MessagePersister>,
        hooks: Arc<dyn ConsumerHooks>,
        message_id: MessageId,
    ) -> Self {
        Self {
            persister,
            hooks,
            message_id,
            snapshot: MessageSnapshot::default(),
            finalized: false,
        }
    }

    pub fn message_id(&self) -> &MessageId {
        &self.message_id
    }

    pub fn snapshot(&self) -> &MessageSnapshot {
        &self.snapshot
    }

    pub fn snapshot_mut(&mut self) -> &mut MessageSnapshot {
        &mut self.snapshot
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Finalizes the message. Later calls return an empty outcome without persisting.
    pub async fn finish(&mut self) -> Result<FinalizeOutcome, ChatError> {
        if self.finalized {
            return Ok(FinalizeOutcome::default());
        }
        self.finalized = true;

        finalize(
            Arc::clone(&self.persister),
            Arc::clone(&self.hooks),
            self.message_id.clone(),
            std::mem::take(&mut self.snapshot),
        )
        .await
    }
}

impl Drop for Finalizer {
    fn drop(&mut self) {
        if self.finalized {
            return;
        }
        self.finalized = true;

        let persister = Arc::clone(&self.persister);
        let hooks = Arc::clone(&self.hooks);
        let message_id = self.message_id.clone();
        let snapshot = std::mem::take(&mut self.snapshot);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let _ = finalize(persister, hooks, message_id, snapshot).await;
                });
            }
            Err(_) => hooks.on_persistence_failure(
                Some(&message_id),
                &ChatError::persistence("no tokio runtime available to finalize message"),
            ),
        }
    }
}

async fn finalize(
    persister: Arc<dyn MessagePersister>,
    hooks: Arc<dyn ConsumerHooks>,
    message_id: MessageId,
    snapshot: MessageSnapshot,
) -> Result<FinalizeOutcome, ChatError> {
    hooks.on_finalized(&message_id, &snapshot);
    let outcome = persister.finalize(&message_id, snapshot).await;
    if let Err(error) = &outcome {
        hooks.on_persistence_failure(Some(&message_id), error);
    }
    outcome
}

#[derive(Clone)]
pub struct StreamingConsumer {
    persister: Arc<dyn MessagePersister>,
    hooks: Arc<dyn ConsumerHooks>,
    policy: ConsumerPolicy,
    search_results: Option<String>,
    retrieval_chunks: Option<String>,
}

impl StreamingConsumer {
    pub fn new(persister: Arc<dyn MessagePersister>) -> Self {
        Self {
            persister,
            hooks: Arc::new(NoopChatHooks),
            policy: ConsumerPolicy::default(),
            search_results: None,
            retrieval_chunks: None,
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ConsumerHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_policy(mut self, policy: ConsumerPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Search context sent as an `s` frame after the session frame. Empty text is skipped.
    pub fn with_search_results(mut self, search_results: impl Into<String>) -> Self {
        self.search_results = Some(search_results.into()).filter(|text| !text.is_empty());
        self
    }

    /// Retrieval context sent as an `rc` frame. Empty text is skipped.
    pub fn with_retrieval_chunks(mut self, retrieval_chunks: impl Into<String>) -> Self {
        self.retrieval_chunks = Some(retrieval_chunks.into()).filter(|text| !text.is_empty());
        self
    }

    pub fn consume<'a>(
        &self,
        session_id: impl Into<SessionId>,
        mut events: ChatEventStream<'a>,
    ) -> FrameStream<'a> {
        let session_id = session_id.into();
        let persister = Arc::clone(&self.persister);
        let hooks = Arc::clone(&self.hooks);
        let policy = self.policy;
        let search_results = self.search_results.clone();
        let retrieval_chunks = self.retrieval_chunks.clone();

        Box::pin(stream! {
            let message_id = match persister.create_pending(&session_id).await {
                Ok(message_id) => message_id,
                Err(error) => {
                    hooks.on_persistence_failure(None, &error);
                    yield Err(error);
                    return;
                }
            };

            let mut finalizer = Finalizer::new(Arc::clone(&persister), Arc::clone(&hooks), message_id);
            let mut debounce = Debounce::new(policy);
            let mut calls = ToolCallAccumulator::new();
            let mut chars = 0usize;

            yield Ok(WireFrame::SessionId(session_id.to_string()));
            if let Some(text) = search_results {
                yield Ok(WireFrame::SearchResults(text));
            }
            if let Some(text) = retrieval_chunks {
                yield Ok(WireFrame::RetrievalChunks(text));
            }

            while let Some(event) = events.next().await {
                let snapshot = finalizer.snapshot_mut();
                let frame = match event {
                    ChatEvent::Model(UnifiedStreamEvent::Content { delta, .. }) => {
                        chars += char_len(&delta);
                        snapshot.push_content(&delta);
                        Some(WireFrame::Content(delta))
                    }
                    ChatEvent::Model(UnifiedStreamEvent::Thinking { delta }) => {
                        chars += char_len(&delta);
                        snapshot.push_reasoning(&delta);
                        Some(WireFrame::Reasoning(delta))
                    }
                    ChatEvent::Model(event @ UnifiedStreamEvent::ToolCall { index, .. }) => {
                        calls.apply(&event);
                        calls.snapshot(index).map(|call| {
                            WireFrame::ToolCall(ToolCallFragment {
                                id: call.id,
                                name: call.name,
                                arguments: call.arguments,
                                index,
                            })
                        })
                    }
                    ChatEvent::Model(UnifiedStreamEvent::Finish { usage, .. }) => {
                        if let Some(usage) = usage {
                            snapshot.record_usage(usage);
                        }
                        None
                    }
                    ChatEvent::Model(UnifiedStreamEvent::Error { message }) => {
                        snapshot.error = Some(message.clone());
                        Some(WireFrame::Error(message))
                    }
                    ChatEvent::Model(UnifiedStreamEvent::System { .. }) => None,
                    ChatEvent::ToolStart(info) => {
                        calls = ToolCallAccumulator::new();
                        snapshot.upsert_tool(info.clone());
                        Some(WireFrame::ToolEvent(ToolLifecycleEvent {
                            phase: ToolLifecyclePhase::Start,
                            info,
                        }))
                    }
                    ChatEvent::ToolResult(info) => {
                        snapshot.upsert_tool(info.clone());
                        Some(WireFrame::ToolEvent(ToolLifecycleEvent {
                            phase: ToolLifecyclePhase::Result,
                            info,
                        }))
                    }
                };

                let progressed = matches!(
                    frame,
                    Some(
                        WireFrame::Content(_)
                            | WireFrame::Reasoning(_)
                            | WireFrame::ToolEvent(_)
                    )
                );

                if let Some(frame) = frame {
                    yield Ok(frame);
                }

                if progressed && debounce.due(chars) {
                    debounce.mark(chars);
                    match persister.save_progress(finalizer.message_id(), finalizer.snapshot()).await {
                        Ok(()) => hooks.on_progress_saved(finalizer.message_id(), chars),
                        Err(error) => hooks.on_persistence_failure(Some(finalizer.message_id()), &error),
                    }
                }
            }

            if let Some(usage) = finalizer.snapshot().usage.filter(|usage| usage.total_tokens > 0) {
                yield Ok(WireFrame::Usage(usage));
            }

            match finalizer.finish().await {
                Ok(outcome) => {
                    if let Some(title) = outcome.title {
                        yield Ok(WireFrame::Title(title));
                    }
                    if !outcome.memories.is_empty() {
                        yield Ok(WireFrame::Memories(outcome.memories));
                    }
                }
                Err(error) => yield Err(error),
            }
        })
    }
}
