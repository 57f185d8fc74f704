//! Canonical stream events and the single-terminal stream contract.
//!
//! ```rust
//! use fprovider::{EventStream, UnifiedStreamEvent, VecEventStream};
//!
//! let stream = VecEventStream::new(vec![UnifiedStreamEvent::content("hello")]);
//! let _boxed: EventStream<'static> = Box::pin(stream);
//! ```

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_stream::stream;
use futures_core::Stream;
use futures_util::StreamExt;
use serde::Serialize;

use crate::{ProviderError, Role, Usage};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UnifiedStreamEvent {
    Content {
        delta: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        role: Option<Role>,
    },
    ToolCall {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(rename = "nameDelta", skip_serializing_if = "Option::is_none")]
        name_delta: Option<String>,
        #[serde(rename = "argsDelta", skip_serializing_if = "Option::is_none")]
        args_delta: Option<String>,
        index: u32,
    },
    Thinking {
        delta: String,
    },
    System {
        delta: String,
    },
    Finish {
        reason: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
    },
    Error {
        message: String,
    },
}

impl UnifiedStreamEvent {
    pub fn content(delta: impl Into<String>) -> Self {
        Self::Content {
            delta: delta.into(),
            role: Some(Role::Assistant),
        }
    }

    pub fn thinking(delta: impl Into<String>) -> Self {
        Self::Thinking {
            delta: delta.into(),
        }
    }

    pub fn system(delta: impl Into<String>) -> Self {
        Self::System {
            delta: delta.into(),
        }
    }

    pub fn tool_call(
        index: u32,
        id: Option<String>,
        name_delta: Option<String>,
        args_delta: Option<String>,
    ) -> Self {
        Self::ToolCall {
            id,
            name_delta,
            args_delta,
            index,
        }
    }

    pub fn finish(reason: impl Into<String>, usage: Option<Usage>) -> Self {
        Self::Finish {
            reason: reason.into(),
            usage,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finish { .. } | Self::Error { .. })
    }
}

/// Adapter output contract.
///
/// Invariants for consumers:
/// - Events arrive in vendor order; `ToolCall` fragments for one index must be applied in order.
/// - Exactly one terminal event (`Finish` or `Error`) closes every adapter call.
/// - Nothing follows the terminal event.
pub type EventStream<'a> = Pin<Box<dyn Stream<Item = UnifiedStreamEvent> + Send + 'a>>;

/// Fallible vendor decoding stream, before [`terminate`] normalizes it.
pub type FallibleEventStream<'a> =
    Pin<Box<dyn Stream<Item = Result<UnifiedStreamEvent, ProviderError>> + Send + 'a>>;

/// Normalizes a fallible decoding stream into an [`EventStream`] with exactly one terminal event.
///
/// An `Err` item becomes a terminal `Error`, anything after a terminal is dropped, and a stream
/// that ends without a terminal is closed with `Finish { reason: "stop" }`.
pub fn terminate<'a, S>(inner: S) -> EventStream<'a>
where
    S: Stream<Item = Result<UnifiedStreamEvent, ProviderError>> + Send + 'a,
{
    let mut inner = Box::pin(inner);

    Box::pin(stream! {
        let mut terminated = false;

        while let Some(item) = inner.next().await {
            let event = match item {
                Ok(event) => event,
                Err(error) => UnifiedStreamEvent::error(error.to_string()),
            };

            terminated = event.is_terminal();
            yield event;

            if terminated {
                break;
            }
        }

        if !terminated {
            yield UnifiedStreamEvent::finish("stop", None);
        }
    })
}

#[derive(Debug, Default)]
pub struct VecEventStream {
    events: VecDeque<UnifiedStreamEvent>,
}

impl VecEventStream {
    pub fn new(events: Vec<UnifiedStreamEvent>) -> Self {
        Self {
            events: events.into(),
        }
    }
}

impl Stream for VecEventStream {
    type Item = UnifiedStreamEvent;

    fn poll_next(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<UnifiedStreamEvent>> {
        Poll::Ready(self.events.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{StreamExt, stream};

    use super::*;

    async fn collect(events: Vec<Result<UnifiedStreamEvent, ProviderError>>) -> Vec<UnifiedStreamEvent> {
        terminate(stream::iter(events)).collect().await
    }

    #[tokio::test]
    async fn terminate_appends_finish_when_vendor_stream_just_ends() {
        let events = collect(vec![Ok(UnifiedStreamEvent::content("hi"))]).await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[1], UnifiedStreamEvent::finish("stop", None));
    }

    #[tokio::test]
    async fn terminate_converts_errors_and_drops_trailing_items() {
        let events = collect(vec![
            Ok(UnifiedStreamEvent::content("partial")),
            Err(ProviderError::transport("connection reset")),
            Ok(UnifiedStreamEvent::content("never seen")),
        ])
        .await;

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], UnifiedStreamEvent::Error { message } if message.contains("connection reset")));
    }

    #[tokio::test]
    async fn terminate_keeps_only_first_terminal() {
        let events = collect(vec![
            Ok(UnifiedStreamEvent::finish("stop", None)),
            Ok(UnifiedStreamEvent::finish("stop", None)),
            Ok(UnifiedStreamEvent::error("late")),
        ])
        .await;

        assert_eq!(events, vec![UnifiedStreamEvent::finish("stop", None)]);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let value = serde_json::to_value(UnifiedStreamEvent::tool_call(
            0,
            Some("c1".to_string()),
            Some("search".to_string()),
            None,
        ))
        .expect("serialize");

        assert_eq!(value["type"], "tool_call");
        assert_eq!(value["nameDelta"], "search");
        assert!(value.get("argsDelta").is_none());
    }
}
