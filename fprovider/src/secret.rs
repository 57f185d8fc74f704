//! Redacting secret wrapper for API keys passed through to vendors.
//!
//! ```rust
//! use fprovider::SecretString;
//!
//! let key = SecretString::new("sk-live");
//! assert_eq!(key.expose(), "sk-live");
//! assert_eq!(format!("{key:?}"), "[REDACTED]");
//! ```

use serde::{Deserialize, Deserializer};

#[derive(PartialEq, Eq, Default)]
pub struct SecretString {
    value: String,
}

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn expose(&self) -> &str {
        self.value.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.value.trim().is_empty()
    }
}

impl Clone for SecretString {
    fn clone(&self) -> Self {
        Self::new(self.value.clone())
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::new)
    }
}

impl Drop for SecretString {
    fn drop(&mut self) {
        unsafe {
            self.value.as_mut_vec().fill(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SecretString;

    #[test]
    fn debug_output_is_redacted() {
        let secret = SecretString::new("sk-very-secret");
        let rendered = format!("{secret:?}");
        assert!(!rendered.contains("sk-very-secret"));
    }

    #[test]
    fn whitespace_only_secret_counts_as_empty() {
        assert!(SecretString::new("  ").is_empty());
        assert!(!SecretString::from("key").is_empty());
    }

    #[test]
    fn deserializes_from_plain_string() {
        let secret: SecretString = serde_json::from_str("\"abc\"").expect("string secret");
        assert_eq!(secret.expose(), "abc");
    }
}
