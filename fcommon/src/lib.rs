//! Shared utilities and strongly-typed common values for workspace crates.
//!
//! ```rust
//! use fcommon::{MetadataMap, SessionId, TraceId, truncate_chars};
//!
//! let session = SessionId::from("session-1");
//! let trace = TraceId::new("trace-1");
//! let mut metadata = MetadataMap::new();
//! metadata.insert("tenant".to_string(), "acme".to_string());
//!
//! assert_eq!(session.as_str(), "session-1");
//! assert_eq!(trace.to_string(), "trace-1");
//! assert_eq!(truncate_chars("héllo", 2), "hé");
//! ```

pub mod future {
    //! Shared async future aliases.
    //!
    //! ```rust
    //! use fcommon::BoxFuture;
    //!
    //! fn str_len<'a>(value: &'a str) -> BoxFuture<'a, usize> {
    //!     Box::pin(async move { value.len() })
    //! }
    //!
    //! let _future = str_len("hello");
    //! ```

    use std::future::Future;
    use std::pin::Pin;

    pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
}

pub mod context {
    //! Shared metadata and cross-crate identifier newtypes.
    //!
    //! ```rust
    //! use fcommon::{MetadataMap, SessionId, TraceId};
    //!
    //! let session = SessionId::new("session-42");
    //! let trace = TraceId::from("trace-42");
    //! let mut metadata = MetadataMap::new();
    //! metadata.insert("env".to_string(), "test".to_string());
    //!
    //! assert_eq!(session.to_string(), "session-42");
    //! assert_eq!(trace.as_str(), "trace-42");
    //! ```

    use std::collections::HashMap;
    use std::fmt::{Display, Formatter};

    pub type MetadataMap = HashMap<String, String>;

    macro_rules! string_id {
        ($name:ident) => {
            #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(String);

            impl $name {
                pub fn new(value: impl Into<String>) -> Self {
                    Self(value.into())
                }

                pub fn as_str(&self) -> &str {
                    self.0.as_str()
                }
            }

            impl Display for $name {
                fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                    f.write_str(&self.0)
                }
            }

            impl From<String> for $name {
                fn from(value: String) -> Self {
                    Self(value)
                }
            }

            impl From<&str> for $name {
                fn from(value: &str) -> Self {
                    Self(value.to_string())
                }
            }
        };
    }

    string_id!(SessionId);
    string_id!(TraceId);
    string_id!(MessageId);
}

pub mod text {
    //! Character-boundary-safe string helpers.

    /// Returns at most `max_chars` characters of `input`, never splitting a code point.
    pub fn truncate_chars(input: &str, max_chars: usize) -> &str {
        match input.char_indices().nth(max_chars) {
            Some((byte_index, _)) => &input[..byte_index],
            None => input,
        }
    }

    pub fn char_len(input: &str) -> usize {
        input.chars().count()
    }
}

pub mod registry {
    //! Generic registry map wrapper used by runtime registries.
    //!
    //! ```rust
    //! use fcommon::Registry;
    //!
    //! let mut registry = Registry::new();
    //! registry.insert("alpha".to_string(), 1_u32);
    //!
    //! assert_eq!(registry.get("alpha"), Some(&1));
    //! assert!(registry.contains_key("alpha"));
    //! ```

    use std::borrow::Borrow;
    use std::collections::HashMap;
    use std::hash::Hash;

    #[derive(Debug, Clone)]
    pub struct Registry<K, V> {
        items: HashMap<K, V>,
    }

    impl<K, V> Default for Registry<K, V>
    where
        K: Eq + Hash,
    {
        fn default() -> Self {
            Self {
                items: HashMap::new(),
            }
        }
    }

    impl<K, V> Registry<K, V>
    where
        K: Eq + Hash,
    {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&mut self, key: K, value: V) -> Option<V> {
            self.items.insert(key, value)
        }

        pub fn get<Q>(&self, key: &Q) -> Option<&V>
        where
            K: Borrow<Q>,
            Q: Eq + Hash + ?Sized,
        {
            self.items.get(key)
        }

        /// Returns the cached value for `key`, building and storing it first when absent.
        pub fn get_or_try_insert_with<E>(
            &mut self,
            key: K,
            build: impl FnOnce() -> Result<V, E>,
        ) -> Result<&V, E> {
            use std::collections::hash_map::Entry;

            match self.items.entry(key) {
                Entry::Occupied(entry) => Ok(entry.into_mut()),
                Entry::Vacant(entry) => Ok(entry.insert(build()?)),
            }
        }

        pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
        where
            K: Borrow<Q>,
            Q: Eq + Hash + ?Sized,
        {
            self.items.remove(key)
        }

        pub fn contains_key<Q>(&self, key: &Q) -> bool
        where
            K: Borrow<Q>,
            Q: Eq + Hash + ?Sized,
        {
            self.items.contains_key(key)
        }

        pub fn values(&self) -> impl Iterator<Item = &V> {
            self.items.values()
        }

        pub fn len(&self) -> usize {
            self.items.len()
        }

        pub fn is_empty(&self) -> bool {
            self.items.is_empty()
        }
    }
}

pub use context::{MessageId, MetadataMap, SessionId, TraceId};
pub use future::BoxFuture;
pub use registry::Registry;
pub use text::{char_len, truncate_chars};

#[cfg(test)]
mod tests {
    use super::{MessageId, Registry, SessionId, TraceId, char_len, truncate_chars};

    #[test]
    fn id_newtypes_round_trip_strings() {
        let session = SessionId::new("session-1");
        let trace = TraceId::from("trace-1");
        let message = MessageId::from("msg-1".to_string());

        assert_eq!(session.as_str(), "session-1");
        assert_eq!(trace.as_str(), "trace-1");
        assert_eq!(session.to_string(), "session-1");
        assert_eq!(trace.to_string(), "trace-1");
        assert_eq!(message.as_str(), "msg-1");
    }

    #[test]
    fn truncate_chars_respects_code_points() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("ab", 10), "ab");
        assert_eq!(truncate_chars("日本語テキスト", 3), "日本語");
        assert_eq!(char_len("日本語"), 3);
    }

    #[test]
    fn generic_registry_basic_lifecycle() {
        let mut registry = Registry::new();
        assert!(registry.is_empty());

        registry.insert("alpha".to_string(), 1_u32);
        assert_eq!(registry.get("alpha"), Some(&1));
        assert!(registry.contains_key("alpha"));
        assert_eq!(registry.len(), 1);

        let removed = registry.remove("alpha");
        assert_eq!(removed, Some(1));
        assert!(registry.is_empty());
    }

    #[test]
    fn get_or_try_insert_with_builds_once() {
        let mut registry: Registry<&str, u32> = Registry::new();
        let mut builds = 0;

        for _ in 0..3 {
            let value = registry
                .get_or_try_insert_with("beta", || {
                    builds += 1;
                    Ok::<_, ()>(7)
                })
                .expect("build should succeed");
            assert_eq!(*value, 7);
        }

        assert_eq!(builds, 1);

        let failed = registry.get_or_try_insert_with("gamma", || Err("nope"));
        assert_eq!(failed, Err("nope"));
        assert!(!registry.contains_key("gamma"));
    }
}
