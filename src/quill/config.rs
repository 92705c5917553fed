//! Configuration loading
//!
//! `defaults/quill.default.toml` is embedded into the crate so the documented defaults and the
//! runtime behaviour cannot drift apart. Applications layer their own files and overrides on
//! top with [`Loader`] before deserializing into [`QuillConfig`].

use crate::quill::view::{DelimiterKind, Delimiters};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, ValueKind};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const DEFAULT_TOML: &str = include_str!("../../defaults/quill.default.toml");

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct QuillConfig {
    pub delimiters: DelimitersConfig,
    pub inheritance: InheritanceConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DelimiterPair {
    pub open: String,
    pub close: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DelimitersConfig {
    pub sanitized_tag: DelimiterPair,
    pub unsanitized_tag: DelimiterPair,
    pub directive: DelimiterPair,
    pub comment: DelimiterPair,
}

impl DelimitersConfig {
    pub fn pair(&self, kind: DelimiterKind) -> &DelimiterPair {
        match kind {
            DelimiterKind::SanitizedTag => &self.sanitized_tag,
            DelimiterKind::UnsanitizedTag => &self.unsanitized_tag,
            DelimiterKind::Directive => &self.directive,
            DelimiterKind::Comment => &self.comment,
        }
    }

    pub fn to_delimiters(&self) -> Delimiters {
        let mut delimiters = Delimiters::new();
        for kind in DelimiterKind::ALL {
            let pair = self.pair(kind);
            delimiters.set(kind, pair.open.as_str(), pair.close.as_str());
        }
        delimiters
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InheritanceConfig {
    pub max_depth: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_seconds: u64,
}

impl CacheConfig {
    /// `None` when entries never expire.
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_seconds > 0).then(|| Duration::from_secs(self.ttl_seconds))
    }
}

/// Helper for layering user overrides over the built-in defaults.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    /// Start a loader seeded with the embedded defaults.
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Layer a configuration file. Missing files trigger an error.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer an optional configuration file (ignored if the file is absent).
    pub fn with_optional_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(false);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Apply a single key/value override, such as a CLI flag.
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    pub fn build(self) -> Result<QuillConfig, ConfigError> {
        self.builder.build()?.try_deserialize()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for callers that only need the defaults.
pub fn load_defaults() -> Result<QuillConfig, ConfigError> {
    Loader::new().build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_default_config() {
        let config = load_defaults().expect("defaults to deserialize");
        assert_eq!(config.delimiters.to_delimiters(), Delimiters::default());
        assert_eq!(config.inheritance.max_depth, 32);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl(), None);
    }

    #[test]
    fn supports_overrides() {
        let config = Loader::new()
            .set_override("delimiters.sanitized_tag.open", "[[")
            .expect("override to apply")
            .set_override("delimiters.sanitized_tag.close", "]]")
            .expect("override to apply")
            .set_override("cache.ttl_seconds", 60i64)
            .expect("override to apply")
            .build()
            .expect("config to build");
        assert_eq!(
            config.delimiters.to_delimiters().get(DelimiterKind::SanitizedTag),
            ("[[", "]]")
        );
        assert_eq!(config.cache.ttl(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn missing_required_file_fails() {
        let result = Loader::new().with_file("/nonexistent/quill.toml").build();
        assert!(result.is_err());
    }

    #[test]
    fn optional_file_may_be_absent() {
        let config = Loader::new()
            .with_optional_file("/nonexistent/quill.toml")
            .build()
            .expect("config to build");
        assert_eq!(config.inheritance.max_depth, 32);
    }
}
