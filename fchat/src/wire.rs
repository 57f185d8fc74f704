//! Newline-delimited JSON frames sent to the caller.
//!
//! ```rust
//! use fchat::WireFrame;
//!
//! let line = WireFrame::Content("Hello".to_string()).to_ndjson().expect("frame");
//! assert_eq!(line, "{\"c\":\"Hello\"}\n");
//! ```

use std::pin::Pin;

use async_stream::stream;
use futures_core::Stream;
use futures_util::StreamExt;
use fprovider::Usage;
use ftooling::ToolCallInfo;
use serde::Serialize;

use crate::ChatError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolCallFragment {
    pub id: String,
    pub name: String,
    pub arguments: String,
    pub index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolLifecyclePhase {
    Start,
    Result,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolLifecycleEvent {
    #[serde(rename = "type")]
    pub phase: ToolLifecyclePhase,
    pub info: ToolCallInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum WireFrame {
    #[serde(rename = "sessionId")]
    SessionId(String),
    #[serde(rename = "s")]
    SearchResults(String),
    #[serde(rename = "rc")]
    RetrievalChunks(String),
    #[serde(rename = "c")]
    Content(String),
    #[serde(rename = "r")]
    Reasoning(String),
    #[serde(rename = "tc")]
    ToolCall(ToolCallFragment),
    #[serde(rename = "te")]
    ToolEvent(ToolLifecycleEvent),
    #[serde(rename = "u")]
    Usage(Usage),
    #[serde(rename = "e")]
    Error(String),
    #[serde(rename = "t")]
    Title(String),
    #[serde(rename = "m")]
    Memories(Vec<String>),
}

impl WireFrame {
    /// One JSON object followed by `\n`.
    pub fn to_ndjson(&self) -> Result<String, ChatError> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

pub type FrameStream<'a> = Pin<Box<dyn Stream<Item = Result<WireFrame, ChatError>> + Send + 'a>>;

pub type LineStream<'a> = Pin<Box<dyn Stream<Item = Result<String, ChatError>> + Send + 'a>>;

/// Encodes every frame as an NDJSON line. Errors pass through unchanged.
pub fn ndjson_lines(mut frames: FrameStream<'_>) -> LineStream<'_> {
    Box::pin(stream! {
        while let Some(frame) = frames.next().await {
            yield frame.and_then(|frame| frame.to_ndjson());
        }
    })
}
