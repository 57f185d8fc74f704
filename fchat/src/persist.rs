//! Message persistence contract and a basic in-memory implementation.

use std::collections::HashMap;
use std::sync::Mutex;

use fcommon::{BoxFuture, MessageId, SessionId};
use fprovider::Usage;
use ftooling::ToolCallInfo;
use serde::{Deserialize, Serialize};

use crate::ChatError;

pub type ChatFuture<'a, T> = BoxFuture<'a, T>;

/// Ordered content of an assistant message, preserving text and tool interleaving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagePart {
    Text { text: String },
    ToolInvocation { info: ToolCallInfo },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSnapshot {
    pub text: String,
    pub reasoning: String,
    pub parts: Vec<MessagePart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MessageSnapshot {
    /// Appends to the trailing text part, opening a new one after a tool part.
    pub fn push_content(&mut self, delta: &str) {
        self.text.push_str(delta);
        match self.parts.last_mut() {
            Some(MessagePart::Text { text }) => text.push_str(delta),
            _ => self.parts.push(MessagePart::Text {
                text: delta.to_string(),
            }),
        }
    }

    pub fn push_reasoning(&mut self, delta: &str) {
        self.reasoning.push_str(delta);
    }

    /// Replaces the tool part with the same call id, or appends a new one.
    pub fn upsert_tool(&mut self, info: ToolCallInfo) {
        let existing = self.parts.iter_mut().find_map(|part| match part {
            MessagePart::ToolInvocation { info: current }
                if current.tool_call_id == info.tool_call_id =>
            {
                Some(current)
            }
            _ => None,
        });

        match existing {
            Some(current) => *current = info,
            None => self.parts.push(MessagePart::ToolInvocation { info }),
        }
    }

    /// Keeps the first non-empty usage; later reports are ignored.
    pub fn record_usage(&mut self, usage: Usage) -> bool {
        if self.usage.is_some() || usage.is_empty() {
            return false;
        }
        self.usage = Some(usage);
        true
    }

    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCallInfo> {
        self.parts.iter().filter_map(|part| match part {
            MessagePart::ToolInvocation { info } => Some(info),
            MessagePart::Text { .. } => None,
        })
    }
}

/// Side payload produced while finalizing a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalizeOutcome {
    pub title: Option<String>,
    pub memories: Vec<String>,
}

impl FinalizeOutcome {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_memory(mut self, memory: impl Into<String>) -> Self {
        self.memories.push(memory.into());
        self
    }
}

pub trait MessagePersister: Send + Sync {
    fn create_pending<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> ChatFuture<'a, Result<MessageId, ChatError>>;

    fn save_progress<'a>(
        &'a self,
        message_id: &'a MessageId,
        snapshot: &'a MessageSnapshot,
    ) -> ChatFuture<'a, Result<(), ChatError>>;

    fn finalize<'a>(
        &'a self,
        message_id: &'a MessageId,
        snapshot: MessageSnapshot,
    ) -> ChatFuture<'a, Result<FinalizeOutcome, ChatError>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub session_id: SessionId,
    pub snapshot: MessageSnapshot,
    pub progress_saves: usize,
    pub finalized: bool,
}

#[derive(Debug, Default)]
pub struct InMemoryMessagePersister {
    messages: Mutex<HashMap<MessageId, StoredMessage>>,
    outcome: FinalizeOutcome,
}

impl InMemoryMessagePersister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcome returned by every `finalize` call.
    pub fn with_outcome(mut self, outcome: FinalizeOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn message(&self, message_id: &MessageId) -> Option<StoredMessage> {
        self.messages
            .lock()
            .ok()
            .and_then(|messages| messages.get(message_id).cloned())
    }

    fn with_message<T>(
        &self,
        message_id: &MessageId,
        update: impl FnOnce(&mut StoredMessage) -> T,
    ) -> Result<T, ChatError> {
        let mut messages = self
            .messages
            .lock()
            .map_err(|_| ChatError::persistence("message store lock poisoned"))?;
        let message = messages
            .get_mut(message_id)
            .ok_or_else(|| ChatError::persistence(format!("unknown message '{message_id}'")))?;
        Ok(update(message))
    }
}

impl MessagePersister for InMemoryMessagePersister {
    fn create_pending<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> ChatFuture<'a, Result<MessageId, ChatError>> {
        Box::pin(async move {
            let mut messages = self
                .messages
                .lock()
                .map_err(|_| ChatError::persistence("message store lock poisoned"))?;

            let message_id = MessageId::new(format!("{session_id}-msg-{}", messages.len() + 1));
            messages.insert(
                message_id.clone(),
                StoredMessage {
                    session_id: session_id.clone(),
                    snapshot: MessageSnapshot::default(),
                    progress_saves: 0,
                    finalized: false,
                },
            );
            Ok(message_id)
        })
    }

    fn save_progress<'a>(
        &'a self,
        message_id: &'a MessageId,
        snapshot: &'a MessageSnapshot,
    ) -> ChatFuture<'a, Result<(), ChatError>> {
        Box::pin(async move {
            self.with_message(message_id, |message| {
                message.snapshot = snapshot.clone();
                message.progress_saves += 1;
            })
        })
    }

    fn finalize<'a>(
        &'a self,
        message_id: &'a MessageId,
        snapshot: MessageSnapshot,
    ) -> ChatFuture<'a, Result<FinalizeOutcome, ChatError>> {
        Box::pin(async move {
            self.with_message(message_id, |message| {
                message.snapshot = snapshot;
                message.finalized = true;
            })?;
            Ok(self.outcome.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_after_tool_part_opens_new_text_part() {
        let mut snapshot = MessageSnapshot::default();
        snapshot.push_content("Let me ");
        snapshot.push_content("look.");
        snapshot.upsert_tool(ToolCallInfo::pending("c1", "docs_search", "{}"));
        snapshot.push_content("Found it");

        assert_eq!(snapshot.text, "Let me look.Found it");
        assert_eq!(snapshot.parts.len(), 3);
        assert_eq!(
            snapshot.parts[0],
            MessagePart::Text {
                text: "Let me look.".to_string()
            }
        );
        assert_eq!(
            snapshot.parts[2],
            MessagePart::Text {
                text: "Found it".to_string()
            }
        );
    }

    #[test]
    fn tool_parts_are_updated_in_place() {
        let mut snapshot = MessageSnapshot::default();
        snapshot.upsert_tool(ToolCallInfo::pending("c1", "a", "{}"));
        snapshot.upsert_tool(ToolCallInfo::pending("c2", "b", "{}"));
        snapshot.upsert_tool(ToolCallInfo::pending("c1", "a", "{}").completed("ok", 5));

        let calls = snapshot.tool_calls().collect::<Vec<_>>();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].result.as_deref(), Some("ok"));
        assert_eq!(calls[1].tool_call_id, "c2");
    }

    #[test]
    fn first_non_empty_usage_wins() {
        let mut snapshot = MessageSnapshot::default();

        assert!(!snapshot.record_usage(Usage::default()));
        assert!(snapshot.record_usage(Usage::new(1, 2, 3)));
        assert!(!snapshot.record_usage(Usage::new(9, 9, 18)));
        assert_eq!(snapshot.usage, Some(Usage::new(1, 2, 3)));
    }

    #[tokio::test]
    async fn in_memory_persister_tracks_lifecycle() {
        let persister = InMemoryMessagePersister::new().with_outcome(FinalizeOutcome::default().with_title("Hi"));
        let session = SessionId::new("s1");

        let id = persister.create_pending(&session).await.expect("pending");
        let mut snapshot = MessageSnapshot::default();
        snapshot.push_content("partial");
        persister.save_progress(&id, &snapshot).await.expect("progress");
        let outcome = persister.finalize(&id, snapshot).await.expect("finalize");

        let stored = persister.message(&id).expect("stored");
        assert!(stored.finalized);
        assert_eq!(stored.progress_saves, 1);
        assert_eq!(stored.snapshot.text, "partial");
        assert_eq!(outcome.title.as_deref(), Some("Hi"));
    }
}
