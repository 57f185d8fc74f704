//! Tool argument parsing.
//!
//! ```rust
//! use ftooling::{parse_arguments, required_string};
//!
//! let args = parse_arguments(r#"{"query":"rust"}"#).expect("object should parse");
//! assert_eq!(required_string(&args, "query").expect("query"), "rust");
//! assert!(parse_arguments("  ").expect("blank is empty").is_empty());
//! ```

use serde_json::{Map, Value};

use crate::ToolError;

/// Parses model-produced arguments into a JSON object. Blank input is an empty object.
pub fn parse_arguments(raw: &str) -> Result<Map<String, Value>, ToolError> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }

    let value: Value = serde_json::from_str(raw)
        .map_err(|err| ToolError::invalid_arguments(format!("invalid JSON arguments: {err}")))?;
    match value {
        Value::Object(object) => Ok(object),
        _ => Err(ToolError::invalid_arguments("expected JSON object arguments")),
    }
}

pub fn required_string(args: &Map<String, Value>, key: &str) -> Result<String, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| ToolError::invalid_arguments(format!("missing required string: '{key}'")))
}

/// Splits `{tool, arguments}` as accepted by a plugin's fallback tool.
pub fn unwrap_fallback_arguments(
    mut args: Map<String, Value>,
) -> Result<(String, Map<String, Value>), ToolError> {
    let tool = required_string(&args, "tool")?;
    let arguments = match args.remove("arguments") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(arguments)) => arguments,
        Some(Value::String(raw)) => parse_arguments(&raw)?,
        Some(_) => {
            return Err(ToolError::invalid_arguments(
                "'arguments' must be a JSON object",
            ));
        }
    };

    Ok((tool, arguments))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::ToolErrorKind;

    #[test]
    fn non_object_arguments_are_rejected() {
        let error = parse_arguments("[1, 2]").expect_err("array must fail");
        assert_eq!(error.kind, ToolErrorKind::InvalidArguments);

        let error = parse_arguments("{").expect_err("json must fail");
        assert!(error.message.starts_with("invalid JSON arguments"));
    }

    #[test]
    fn fallback_arguments_accept_objects_and_encoded_strings() {
        let args = parse_arguments(r#"{"tool":"search","arguments":{"q":"rust"}}"#).expect("args");
        let (tool, inner) = unwrap_fallback_arguments(args).expect("fallback");
        assert_eq!(tool, "search");
        assert_eq!(inner.get("q"), Some(&json!("rust")));

        let args = parse_arguments(r#"{"tool":"search","arguments":"{\"q\":1}"}"#).expect("args");
        let (_, inner) = unwrap_fallback_arguments(args).expect("fallback");
        assert_eq!(inner.get("q"), Some(&json!(1)));
    }

    #[test]
    fn fallback_requires_tool_name() {
        let error = unwrap_fallback_arguments(Map::new()).expect_err("missing tool");
        assert_eq!(error.message, "missing required string: 'tool'");
    }
}
