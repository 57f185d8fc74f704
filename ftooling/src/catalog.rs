//! Tools exposed to the model for one chat turn, and how each maps back to a plugin.

use std::sync::Arc;

use fcommon::Registry;
use fprovider::ToolDefinition;
use serde_json::{Value, json};

use crate::{RemoteTool, ToolPluginConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolTarget {
    Remote { tool_name: String },
    /// Generic `{tool, arguments}` entry used when a plugin's tools could not be listed.
    Fallback,
}

#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub plugin: Arc<ToolPluginConfig>,
    pub target: ToolTarget,
}

#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    entries: Registry<String, CatalogEntry>,
    definitions: Vec<ToolDefinition>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `tool` under the plugin's prefix. The first entry wins on a name collision.
    pub fn push_remote(&mut self, plugin: Arc<ToolPluginConfig>, tool: RemoteTool) -> bool {
        let exposed = plugin.exposed_tool_name(&tool.name);
        let description = format!(
            "[{}] {}",
            plugin.name,
            tool.description.as_deref().unwrap_or_default()
        );
        let parameters = tool.input_schema.unwrap_or_else(empty_schema);

        self.push(
            ToolDefinition {
                name: exposed,
                description,
                parameters,
            },
            CatalogEntry {
                plugin,
                target: ToolTarget::Remote {
                    tool_name: tool.name,
                },
            },
        )
    }

    pub fn push_fallback(&mut self, plugin: Arc<ToolPluginConfig>) -> bool {
        let definition = ToolDefinition {
            name: plugin.fallback_tool_name(),
            description: format!(
                "[{}] Call a tool on this MCP server by name with a JSON object of arguments",
                plugin.name
            ),
            parameters: json!({
                "type": "object",
                "properties": {
                    "tool": {"type": "string", "description": "Name of the tool to call"},
                    "arguments": {"type": "object", "description": "Arguments for the tool"}
                },
                "required": ["tool", "arguments"]
            }),
        };

        self.push(
            definition,
            CatalogEntry {
                plugin,
                target: ToolTarget::Fallback,
            },
        )
    }

    fn push(&mut self, definition: ToolDefinition, entry: CatalogEntry) -> bool {
        if self.entries.contains_key(definition.name.as_str()) {
            return false;
        }
        self.entries.insert(definition.name.clone(), entry);
        self.definitions.push(definition);
        true
    }

    pub fn resolve(&self, exposed_name: &str) -> Option<&CatalogEntry> {
        self.entries.get(exposed_name)
    }

    /// Definitions in plugin order, ready for a [`fprovider::CallRequest`].
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

fn empty_schema() -> Value {
    json!({"type": "object", "properties": {}, "required": []})
}
