//! Call arguments, generation settings, provider configuration, and adapter results.

use serde::{Deserialize, Serialize};

use crate::{SecretString, ToolDefinition, UnifiedMessage};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommonSettings {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub max_tokens: Option<u32>,
    pub presence_penalty: Option<f32>,
    pub frequency_penalty: Option<f32>,
    pub seed: Option<i64>,
    pub stop: Vec<String>,
    pub search: Option<SearchSettings>,
}

impl CommonSettings {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_stop(mut self, stop: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.stop = stop.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_search(mut self, search: SearchSettings) -> Self {
        self.search = Some(search);
        self
    }
}

/// Search-grounding parameters understood by search-native vendors.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub mode: Option<String>,
    pub context_size: Option<String>,
    pub recency_filter: Option<String>,
    pub domain_filter: Vec<String>,
    pub return_images: Option<bool>,
    pub return_related_questions: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningSettings {
    pub enabled: bool,
    pub effort: Option<ReasoningEffort>,
    pub budget_tokens: Option<u32>,
}

impl ReasoningSettings {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    pub fn with_effort(mut self, effort: ReasoningEffort) -> Self {
        self.effort = Some(effort);
        self
    }

    pub fn with_budget_tokens(mut self, budget_tokens: u32) -> Self {
        self.budget_tokens = Some(budget_tokens);
        self
    }
}

/// Canonical arguments of one adapter `call`.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    pub model: String,
    pub messages: Vec<UnifiedMessage>,
    pub settings: CommonSettings,
    pub provider_id: Option<String>,
    pub reasoning: Option<ReasoningSettings>,
    pub tools: Vec<ToolDefinition>,
}

impl CallRequest {
    pub fn new(model: impl Into<String>, messages: Vec<UnifiedMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            settings: CommonSettings::default(),
            provider_id: None,
            reasoning: None,
            tools: Vec::new(),
        }
    }

    pub fn with_settings(mut self, settings: CommonSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_provider_id(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_id = Some(provider_id.into());
        self
    }

    pub fn with_reasoning(mut self, reasoning: ReasoningSettings) -> Self {
        self.reasoning = Some(reasoning);
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub(crate) fn reasoning_enabled(&self) -> bool {
        self.reasoning.is_some_and(|reasoning| reasoning.enabled)
    }
}

/// Credentials and endpoint for one vendor, passed through untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: SecretString,
    #[serde(default, rename = "baseURL", alias = "baseUrl")]
    pub base_url: Option<String>,
    #[serde(default)]
    pub check_model: Option<String>,
}

impl ProviderConfig {
    pub fn new(api_key: impl Into<SecretString>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            check_model: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_check_model(mut self, check_model: impl Into<String>) -> Self {
        self.check_model = Some(check_model.into());
        self
    }

    /// Base URL when set and non-blank, otherwise `default`, without trailing slashes.
    pub fn base_url_or(&self, default: &str) -> String {
        self.base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(default)
            .trim_end_matches('/')
            .to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub prompt: f64,
    pub completion: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pricing: Option<ModelPricing>,
}

impl ModelInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            description: None,
            created: None,
            context_length: None,
            pricing: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_context_length(mut self, context_length: u64) -> Self {
        self.context_length = Some(context_length);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_or_trims_and_falls_back() {
        let empty = ProviderConfig::new("key").with_base_url("   ");
        assert_eq!(empty.base_url_or("https://api.example.com/v1"), "https://api.example.com/v1");

        let custom = ProviderConfig::new("key").with_base_url("https://proxy.local/v1/");
        assert_eq!(custom.base_url_or("https://unused"), "https://proxy.local/v1");
    }

    #[test]
    fn provider_config_deserializes_from_record_shape() {
        let config: ProviderConfig = serde_json::from_str(
            r#"{"apiKey":"sk-1","baseURL":"https://api.deepseek.com/v1","checkModel":"deepseek-chat"}"#,
        )
        .expect("config record");

        assert_eq!(config.api_key.expose(), "sk-1");
        assert_eq!(config.base_url.as_deref(), Some("https://api.deepseek.com/v1"));
        assert_eq!(config.check_model.as_deref(), Some("deepseek-chat"));
    }

    #[test]
    fn reasoning_enabled_requires_flag() {
        let request = CallRequest::new("m", Vec::new());
        assert!(!request.reasoning_enabled());
        assert!(request.with_reasoning(ReasoningSettings::enabled()).reasoning_enabled());
    }
}
