//! Token accounting and pointwise usage merging.
//!
//! ```rust
//! use fprovider::Usage;
//!
//! let first = Usage::new(20, 0, 20);
//! let second = Usage::new(30, 8, 38);
//!
//! assert_eq!(first.merge(&second), Usage::new(50, 8, 58));
//! ```

use std::iter::Sum;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub cached_tokens: Option<u64>,
    pub reasoning_tokens: Option<u64>,
}

impl Usage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64, total_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens,
            cached_tokens: None,
            reasoning_tokens: None,
        }
    }

    pub fn with_cached_tokens(mut self, cached_tokens: u64) -> Self {
        self.cached_tokens = Some(cached_tokens);
        self
    }

    pub fn with_reasoning_tokens(mut self, reasoning_tokens: u64) -> Self {
        self.reasoning_tokens = Some(reasoning_tokens);
        self
    }

    /// Pointwise sum. A sub-count is present when either side carries it.
    pub fn merge(&self, other: &Usage) -> Usage {
        Usage {
            prompt_tokens: self.prompt_tokens + other.prompt_tokens,
            completion_tokens: self.completion_tokens + other.completion_tokens,
            total_tokens: self.total_tokens + other.total_tokens,
            cached_tokens: merge_optional(self.cached_tokens, other.cached_tokens),
            reasoning_tokens: merge_optional(self.reasoning_tokens, other.reasoning_tokens),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_tokens == 0
    }
}

fn merge_optional(left: Option<u64>, right: Option<u64>) -> Option<u64> {
    match (left, right) {
        (None, None) => None,
        (left, right) => Some(left.unwrap_or(0) + right.unwrap_or(0)),
    }
}

impl Add for Usage {
    type Output = Usage;

    fn add(self, rhs: Usage) -> Usage {
        self.merge(&rhs)
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, rhs: Usage) {
        *self = self.merge(&rhs);
    }
}

impl Sum for Usage {
    fn sum<I: Iterator<Item = Usage>>(iter: I) -> Usage {
        iter.fold(Usage::default(), |acc, usage| acc + usage)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct UsageWire {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    prompt_tokens_details: Option<PromptTokensDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completion_tokens_details: Option<CompletionTokensDetails>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PromptTokensDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cached_tokens: Option<u64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CompletionTokensDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reasoning_tokens: Option<u64>,
}

impl Serialize for Usage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        UsageWire {
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
            total_tokens: self.total_tokens,
            prompt_tokens_details: self.cached_tokens.map(|cached_tokens| PromptTokensDetails {
                cached_tokens: Some(cached_tokens),
            }),
            completion_tokens_details: self.reasoning_tokens.map(|reasoning_tokens| {
                CompletionTokensDetails {
                    reasoning_tokens: Some(reasoning_tokens),
                }
            }),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Usage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = UsageWire::deserialize(deserializer)?;
        Ok(Usage {
            prompt_tokens: wire.prompt_tokens,
            completion_tokens: wire.completion_tokens,
            total_tokens: wire.total_tokens,
            cached_tokens: wire.prompt_tokens_details.and_then(|d| d.cached_tokens),
            reasoning_tokens: wire.completion_tokens_details.and_then(|d| d.reasoning_tokens),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Usage;

    fn samples() -> Vec<Usage> {
        vec![
            Usage::new(10, 5, 15),
            Usage::new(20, 0, 20).with_cached_tokens(4),
            Usage::new(30, 8, 38).with_reasoning_tokens(3),
            Usage::default(),
        ]
    }

    #[test]
    fn merge_is_associative_and_commutative() {
        let values = samples();
        for a in &values {
            for b in &values {
                assert_eq!(a.merge(b), b.merge(a));
                for c in &values {
                    assert_eq!(a.merge(b).merge(c), a.merge(&b.merge(c)));
                }
            }
        }
    }

    #[test]
    fn optional_sub_counts_survive_merge_with_absent_side() {
        let merged = Usage::new(1, 1, 2).merge(&Usage::new(1, 1, 2).with_cached_tokens(5));
        assert_eq!(merged.cached_tokens, Some(5));
        assert_eq!(merged.reasoning_tokens, None);
    }

    #[test]
    fn sum_folds_every_step() {
        let total: Usage = samples().into_iter().sum();
        assert_eq!(total.prompt_tokens, 60);
        assert_eq!(total.completion_tokens, 13);
        assert_eq!(total.total_tokens, 73);
        assert_eq!(total.cached_tokens, Some(4));
        assert_eq!(total.reasoning_tokens, Some(3));
    }

    #[test]
    fn serializes_in_wire_shape_with_details() {
        let usage = Usage::new(3, 2, 5).with_cached_tokens(1);
        let value = serde_json::to_value(usage).expect("serialize usage");

        assert_eq!(value["total_tokens"], 5);
        assert_eq!(value["prompt_tokens_details"]["cached_tokens"], 1);
        assert!(value.get("completion_tokens_details").is_none());

        let back: Usage = serde_json::from_value(value).expect("deserialize usage");
        assert_eq!(back, usage);
    }
}
