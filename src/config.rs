//! Configuration for entity builders
//!
//! Provides a builder pattern for the per-entity construction options.

use std::fmt;
use std::sync::Arc;

use crate::types::SqlValue;

/// How primary-key values are produced on insert
#[derive(Clone)]
pub enum KeyGenerator {
    /// Random UUID (version 4)
    UuidV4,
    /// Time-ordered UUID (version 7)
    UuidV7,
    /// Caller-provided generator
    Custom(Arc<dyn Fn() -> SqlValue + Send + Sync>),
}

impl KeyGenerator {
    /// Wrap a closure as a key generator
    pub fn custom(f: impl Fn() -> SqlValue + Send + Sync + 'static) -> Self {
        KeyGenerator::Custom(Arc::new(f))
    }

    /// Produce the next key
    pub fn generate(&self) -> SqlValue {
        match self {
            KeyGenerator::UuidV4 => SqlValue::Uuid(uuid::Uuid::new_v4()),
            KeyGenerator::UuidV7 => SqlValue::Uuid(uuid::Uuid::now_v7()),
            KeyGenerator::Custom(f) => f(),
        }
    }
}

impl fmt::Debug for KeyGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyGenerator::UuidV4 => f.write_str("UuidV4"),
            KeyGenerator::UuidV7 => f.write_str("UuidV7"),
            KeyGenerator::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// What to do with filter keys that match neither an operator nor a relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownFilterPolicy {
    /// Drop the key silently
    #[default]
    Ignore,
    /// Fail compilation with an error naming the key
    Reject,
}

/// Construction options for a single entity builder
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Primary-key generator used on insert (default: none, the database decides)
    pub key_generator: Option<KeyGenerator>,
    /// Insert caller-supplied primary keys verbatim (default: false)
    pub trust_caller_key: bool,
    /// Handling of unrecognized filter keys (default: ignore)
    pub unknown_filters: UnknownFilterPolicy,
    /// Managed column refreshed with `NOW()` on update (default: "updated_at")
    pub touch_column: Option<String>,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        BuilderConfigBuilder::new().build()
    }
}

impl BuilderConfig {
    /// Create a new configuration builder
    pub fn builder() -> BuilderConfigBuilder {
        BuilderConfigBuilder::new()
    }
}

/// Builder for BuilderConfig
#[derive(Debug)]
pub struct BuilderConfigBuilder {
    key_generator: Option<KeyGenerator>,
    trust_caller_key: bool,
    unknown_filters: UnknownFilterPolicy,
    touch_column: Option<String>,
}

impl BuilderConfigBuilder {
    pub fn new() -> Self {
        Self {
            key_generator: None,
            trust_caller_key: false,
            unknown_filters: UnknownFilterPolicy::Ignore,
            touch_column: Some("updated_at".to_string()),
        }
    }

    /// Generate primary keys as UUIDv7
    pub fn uuid_v7_keys(mut self) -> Self {
        self.key_generator = Some(KeyGenerator::UuidV7);
        self
    }

    /// Generate primary keys as UUIDv4
    pub fn uuid_v4_keys(mut self) -> Self {
        self.key_generator = Some(KeyGenerator::UuidV4);
        self
    }

    /// Use a custom primary-key generator
    pub fn key_generator(mut self, generator: KeyGenerator) -> Self {
        self.key_generator = Some(generator);
        self
    }

    /// Insert caller-supplied primary keys verbatim
    pub fn trust_caller_key(mut self, enabled: bool) -> Self {
        self.trust_caller_key = enabled;
        self
    }

    /// Set the unknown filter key policy
    pub fn unknown_filters(mut self, policy: UnknownFilterPolicy) -> Self {
        self.unknown_filters = policy;
        self
    }

    /// Fail on unknown filter keys instead of dropping them
    pub fn reject_unknown_filters(self) -> Self {
        self.unknown_filters(UnknownFilterPolicy::Reject)
    }

    /// Set the column refreshed with `NOW()` on update
    pub fn touch_column(mut self, name: impl Into<String>) -> Self {
        self.touch_column = Some(name.into());
        self
    }

    /// Never refresh a column on update
    pub fn without_touch_column(mut self) -> Self {
        self.touch_column = None;
        self
    }

    /// Build the configuration
    pub fn build(self) -> BuilderConfig {
        BuilderConfig {
            key_generator: self.key_generator,
            trust_caller_key: self.trust_caller_key,
            unknown_filters: self.unknown_filters,
            touch_column: self.touch_column,
        }
    }
}

impl Default for BuilderConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
