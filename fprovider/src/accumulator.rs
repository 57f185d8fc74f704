//! Reassembles streamed tool-call fragments into complete calls.
//!
//! ```rust
//! use fprovider::{ToolCallAccumulator, UnifiedStreamEvent};
//!
//! let mut accumulator = ToolCallAccumulator::new();
//! accumulator.apply(&UnifiedStreamEvent::tool_call(0, Some("c1".into()), Some("search".into()), None));
//! accumulator.apply(&UnifiedStreamEvent::tool_call(0, None, None, Some("{\"q\":".into())));
//! accumulator.apply(&UnifiedStreamEvent::tool_call(0, None, None, Some("\"x\"}".into())));
//!
//! let calls = accumulator.finish();
//! assert_eq!(calls[0].name, "search");
//! assert_eq!(calls[0].arguments, "{\"q\":\"x\"}");
//! ```

use std::collections::BTreeMap;

use crate::{ToolCall, UnifiedStreamEvent};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Index-keyed fragment buffer. Fragments must be applied in emission order.
#[derive(Debug, Clone, Default)]
pub struct ToolCallAccumulator {
    calls: BTreeMap<u32, PartialToolCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a `ToolCall` event; other events are ignored. Returns whether it was consumed.
    pub fn apply(&mut self, event: &UnifiedStreamEvent) -> bool {
        let UnifiedStreamEvent::ToolCall {
            id,
            name_delta,
            args_delta,
            index,
        } = event
        else {
            return false;
        };

        let entry = self.calls.entry(*index).or_insert_with(|| PartialToolCall {
            id: format!("call_{index}"),
            ..PartialToolCall::default()
        });

        if let Some(id) = id.as_deref().filter(|id| !id.is_empty()) {
            entry.id = id.to_string();
        }

        if let Some(name) = name_delta {
            entry.name.push_str(name);
        }

        if let Some(arguments) = args_delta {
            entry.arguments.push_str(arguments);
        }

        true
    }

    /// Current accumulated view of the call at `index`.
    pub fn snapshot(&self, index: u32) -> Option<ToolCall> {
        self.calls
            .get(&index)
            .map(|call| ToolCall::new(call.id.clone(), call.name.clone(), call.arguments.clone()))
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Completed calls in index order. Empty names become `unknown`, empty arguments `{}`.
    pub fn finish(self) -> Vec<ToolCall> {
        self.calls
            .into_values()
            .filter(|call| !call.id.is_empty())
            .map(|call| ToolCall {
                id: call.id,
                name: if call.name.is_empty() {
                    "unknown".to_string()
                } else {
                    call.name
                },
                arguments: if call.arguments.trim().is_empty() {
                    "{}".to_string()
                } else {
                    call.arguments
                },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(index: u32, id: Option<&str>, name: Option<&str>, args: Option<&str>) -> UnifiedStreamEvent {
        UnifiedStreamEvent::tool_call(
            index,
            id.map(str::to_string),
            name.map(str::to_string),
            args.map(str::to_string),
        )
    }

    #[test]
    fn interleaved_indices_reassemble_independently() {
        let mut accumulator = ToolCallAccumulator::new();
        let events = [
            fragment(0, Some("a"), Some("sea"), None),
            fragment(1, Some("b"), Some("fetch"), Some("{\"url\"")),
            fragment(0, None, Some("rch"), Some("{\"q\":")),
            fragment(1, None, None, Some(":\"https://x\"}")),
            fragment(0, None, None, Some("\"rust\"}")),
        ];

        for event in &events {
            assert!(accumulator.apply(event));
        }

        let calls = accumulator.finish();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], ToolCall::new("a", "search", "{\"q\":\"rust\"}"));
        assert_eq!(calls[1], ToolCall::new("b", "fetch", "{\"url\":\"https://x\"}"));

        for call in calls {
            serde_json::from_str::<serde_json::Value>(&call.arguments).expect("valid json");
        }
    }

    #[test]
    fn missing_id_defaults_then_is_replaced() {
        let mut accumulator = ToolCallAccumulator::new();
        accumulator.apply(&fragment(3, None, Some("lookup"), None));
        assert_eq!(accumulator.snapshot(3).map(|call| call.id), Some("call_3".to_string()));

        accumulator.apply(&fragment(3, Some("real-id"), None, Some("{}")));
        assert_eq!(accumulator.snapshot(3).map(|call| call.id), Some("real-id".to_string()));
    }

    #[test]
    fn empty_name_and_arguments_get_defaults() {
        let mut accumulator = ToolCallAccumulator::new();
        accumulator.apply(&fragment(0, Some("c1"), None, None));

        let calls = accumulator.finish();
        assert_eq!(calls[0].name, "unknown");
        assert_eq!(calls[0].arguments, "{}");
    }

    #[test]
    fn non_tool_events_are_ignored() {
        let mut accumulator = ToolCallAccumulator::new();
        assert!(!accumulator.apply(&UnifiedStreamEvent::content("text")));
        assert!(accumulator.is_empty());
    }
}
