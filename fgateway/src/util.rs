//! Small convenience constructors for common types.

use crate::{ProtocolType, UnifiedMessage};

pub fn system_message(content: impl Into<String>) -> UnifiedMessage {
    UnifiedMessage::system(content.into())
}

pub fn user_message(content: impl Into<String>) -> UnifiedMessage {
    UnifiedMessage::user(content.into())
}

pub fn assistant_message(content: impl Into<String>) -> UnifiedMessage {
    UnifiedMessage::assistant(content.into())
}

/// Parses a protocol family name, accepting a few vendor aliases.
pub fn parse_protocol(value: &str) -> Option<ProtocolType> {
    match value.trim().to_ascii_lowercase().as_str() {
        "claude" => Some(ProtocolType::Anthropic),
        "google" => Some(ProtocolType::Gemini),
        "dashscope" | "qwen" => Some(ProtocolType::Bailian),
        "zhipu" | "glm" => Some(ProtocolType::Zai),
        other => other.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use crate::{ProtocolType, Role};

    use super::{parse_protocol, system_message, user_message};

    #[test]
    fn parse_protocol_supports_names_and_aliases() {
        assert_eq!(parse_protocol("openai"), Some(ProtocolType::OpenAi));
        assert_eq!(parse_protocol(" Gemini "), Some(ProtocolType::Gemini));
        assert_eq!(parse_protocol("claude"), Some(ProtocolType::Anthropic));
        assert_eq!(parse_protocol("dashscope"), Some(ProtocolType::Bailian));
        assert_eq!(parse_protocol("unknown"), None);
    }

    #[test]
    fn message_helpers_set_roles() {
        assert_eq!(system_message("be brief").role, Role::System);

        let message = user_message("hello");
        assert_eq!(message.role, Role::User);
        assert_eq!(message.content.text(), "hello");
    }
}
