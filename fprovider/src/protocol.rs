//! Protocol families and the provider-to-protocol table.
//!
//! ```rust
//! use fprovider::{ProtocolType, protocol_for_provider};
//!
//! assert_eq!(protocol_for_provider("deepseek"), ProtocolType::OpenAi);
//! assert_eq!(protocol_for_provider("minimax"), ProtocolType::Anthropic);
//! assert_eq!(protocol_for_provider("something-new"), ProtocolType::OpenAi);
//! ```

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ProviderConfig, ProviderError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolType {
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    Gemini,
    Perplexity,
    Ollama,
    Bailian,
    Zai,
}

impl ProtocolType {
    pub const ALL: [ProtocolType; 7] = [
        Self::OpenAi,
        Self::Anthropic,
        Self::Gemini,
        Self::Perplexity,
        Self::Ollama,
        Self::Bailian,
        Self::Zai,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::Perplexity => "perplexity",
            Self::Ollama => "ollama",
            Self::Bailian => "bailian",
            Self::Zai => "zai",
        }
    }
}

impl Display for ProtocolType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtocolType {
    type Err = ProviderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|protocol| protocol.as_str() == normalized)
            .ok_or_else(|| {
                ProviderError::invalid_request(format!("unknown protocol type '{value}'"))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderApiConfig {
    pub protocol: ProtocolType,
    pub default_base_url: &'static str,
}

const PROVIDER_API_CONFIG: &[(&str, ProviderApiConfig)] = &[
    ("openai", entry(ProtocolType::OpenAi, "https://api.openai.com/v1")),
    ("deepseek", entry(ProtocolType::OpenAi, "https://api.deepseek.com/v1")),
    ("xai", entry(ProtocolType::OpenAi, "https://api.x.ai/v1")),
    ("mistral", entry(ProtocolType::OpenAi, "https://api.mistral.ai/v1")),
    ("openrouter", entry(ProtocolType::OpenAi, "https://openrouter.ai/api/v1")),
    ("volcengine", entry(ProtocolType::OpenAi, "https://ark.cn-beijing.volces.com/api/v3")),
    ("moonshot", entry(ProtocolType::OpenAi, "https://api.moonshot.cn/v1")),
    ("siliconflow", entry(ProtocolType::OpenAi, "https://api.siliconflow.cn/v1")),
    ("zai", entry(ProtocolType::Zai, "https://open.bigmodel.cn/api/paas/v4")),
    ("google", entry(ProtocolType::Gemini, "https://generativelanguage.googleapis.com")),
    ("anthropic", entry(ProtocolType::Anthropic, "https://api.anthropic.com")),
    ("minimax", entry(ProtocolType::Anthropic, "https://api.minimaxi.com/anthropic")),
    ("perplexity", entry(ProtocolType::Perplexity, "https://api.perplexity.ai")),
    ("ollama", entry(ProtocolType::Ollama, "http://localhost:11434/v1")),
    ("bailian", entry(ProtocolType::Bailian, "https://dashscope.aliyuncs.com/api/v1")),
];

const fn entry(protocol: ProtocolType, default_base_url: &'static str) -> ProviderApiConfig {
    ProviderApiConfig {
        protocol,
        default_base_url,
    }
}

pub fn provider_api_config(provider_id: &str) -> Option<ProviderApiConfig> {
    PROVIDER_API_CONFIG
        .iter()
        .find(|(id, _)| *id == provider_id)
        .map(|(_, config)| *config)
}

/// Protocol family for a provider id. Unknown providers speak the OpenAI dialect.
pub fn protocol_for_provider(provider_id: &str) -> ProtocolType {
    provider_api_config(provider_id)
        .map(|config| config.protocol)
        .unwrap_or(ProtocolType::OpenAi)
}

pub fn default_base_url_for_provider(provider_id: &str) -> Option<&'static str> {
    provider_api_config(provider_id).map(|config| config.default_base_url)
}

impl ProviderConfig {
    /// Fills an empty base URL from the provider table.
    pub fn with_defaults_for(mut self, provider_id: &str) -> Self {
        let has_base_url = self
            .base_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty());

        if !has_base_url {
            if let Some(default_base_url) = default_base_url_for_provider(provider_id) {
                self.base_url = Some(default_base_url.to_string());
            }
        }

        self
    }
}
