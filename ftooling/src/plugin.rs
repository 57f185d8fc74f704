//! MCP plugin descriptors.
//!
//! Plugins arrive as camelCase records from the host and are normalized into
//! [`ToolPluginConfig`] on deserialization.
//!
//! ```rust
//! use ftooling::{PluginAuth, ToolPluginConfig};
//!
//! let plugin: ToolPluginConfig = serde_json::from_str(
//!     r#"{"id":"p1","name":"Web Search","serverUrl":"https://mcp.example.com/","authType":"apiKey","apiKey":"k"}"#,
//! )
//! .expect("plugin record");
//!
//! assert_eq!(plugin.sse_endpoint(), "https://mcp.example.com/sse");
//! assert_eq!(plugin.tool_prefix(), "web_sear");
//! assert!(matches!(plugin.auth, PluginAuth::ApiKey(_)));
//! ```

use std::collections::BTreeMap;

use fprovider::SecretString;
use serde::Deserialize;

const SSE_SUFFIX: &str = "/sse";
const PREFIX_CHARS: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PluginAuth {
    #[default]
    None,
    ApiKey(SecretString),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "PluginRecord")]
pub struct ToolPluginConfig {
    pub id: String,
    pub name: String,
    pub server_url: String,
    pub auth: PluginAuth,
    pub custom_headers: BTreeMap<String, String>,
    pub ignore_tls_verify: bool,
}

impl ToolPluginConfig {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        server_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            server_url: server_url.into(),
            auth: PluginAuth::None,
            custom_headers: BTreeMap::new(),
            ignore_tls_verify: false,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<SecretString>) -> Self {
        let api_key = api_key.into();
        self.auth = if api_key.is_empty() {
            PluginAuth::None
        } else {
            PluginAuth::ApiKey(api_key)
        };
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.insert(name.into(), value.into());
        self
    }

    pub fn with_ignore_tls_verify(mut self, ignore: bool) -> Self {
        self.ignore_tls_verify = ignore;
        self
    }

    /// SSE endpoint for the server: `{server_url}/sse` unless already present.
    pub fn sse_endpoint(&self) -> String {
        let url = self.server_url.trim();
        if url.ends_with(SSE_SUFFIX) {
            url.to_string()
        } else if let Some(base) = url.strip_suffix('/') {
            format!("{base}{SSE_SUFFIX}")
        } else {
            format!("{url}{SSE_SUFFIX}")
        }
    }

    pub fn is_https(&self) -> bool {
        self.server_url
            .trim()
            .get(..8)
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("https://"))
    }

    /// TLS verification is only ever relaxed for https endpoints.
    pub fn skips_tls_verification(&self) -> bool {
        self.ignore_tls_verify && self.is_https()
    }

    /// Namespace prefix for exposed tool names: whitespace runs collapse to `_`,
    /// first eight characters, lowercased.
    pub fn tool_prefix(&self) -> String {
        self.name
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
            .chars()
            .take(PREFIX_CHARS)
            .collect::<String>()
            .to_lowercase()
    }

    pub fn exposed_tool_name(&self, tool_name: &str) -> String {
        format!("{}_{tool_name}", self.tool_prefix())
    }

    pub fn fallback_tool_name(&self) -> String {
        format!("mcp_{}", self.id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
enum AuthType {
    #[default]
    None,
    ApiKey,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdvancedRecord {
    #[serde(default, alias = "keyValuePairs")]
    custom_headers: BTreeMap<String, String>,
    #[serde(default, rename = "ignoreTLSVerify", alias = "ignoreSSL")]
    ignore_tls_verify: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PluginRecord {
    id: String,
    name: String,
    server_url: String,
    #[serde(default)]
    auth_type: AuthType,
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    advanced_config: Option<AdvancedRecord>,
}

impl TryFrom<PluginRecord> for ToolPluginConfig {
    type Error = String;

    fn try_from(record: PluginRecord) -> Result<Self, Self::Error> {
        if record.server_url.trim().is_empty() {
            return Err(format!("plugin '{}' has no serverUrl", record.id));
        }

        let advanced = record.advanced_config.unwrap_or_default();
        let mut plugin = Self::new(record.id, record.name, record.server_url)
            .with_ignore_tls_verify(advanced.ignore_tls_verify);
        plugin.custom_headers = advanced.custom_headers;

        if record.auth_type == AuthType::ApiKey {
            if let Some(api_key) = record.api_key {
                plugin = plugin.with_api_key(api_key);
            }
        }

        Ok(plugin)
    }
}
