//! Compiler façade
//!
//! [`Compiler::compile`] is the one entry point applications need: it answers from the cache
//! when it can and otherwise runs the view through the transpiler and stores the result.

use crate::quill::caching::{Cache, InMemoryCache, NullCache};
use crate::quill::config::QuillConfig;
use crate::quill::error::TranspileError;
use crate::quill::factory::ViewFactory;
use crate::quill::transpiling::Transpiler;
use crate::quill::view::View;
use std::sync::Arc;

/// Something that renders a view, merging inherited variables into it.
pub trait ViewTranspiler: Send + Sync {
    fn transpile(&self, view: &mut View) -> Result<String, TranspileError>;
}

impl ViewTranspiler for Transpiler {
    fn transpile(&self, view: &mut View) -> Result<String, TranspileError> {
        Transpiler::transpile(self, view)
    }
}

pub struct Compiler {
    transpiler: Arc<dyn ViewTranspiler>,
    cache: Arc<dyn Cache>,
}

impl Compiler {
    pub fn new(transpiler: Arc<dyn ViewTranspiler>, cache: Arc<dyn Cache>) -> Self {
        Compiler { transpiler, cache }
    }

    /// A compiler that transpiles on every call.
    pub fn without_cache(transpiler: Arc<dyn ViewTranspiler>) -> Self {
        Self::new(transpiler, Arc::new(NullCache))
    }

    /// A compiler with the default registries, configured by `config`.
    pub fn from_config(config: &QuillConfig, factory: Arc<dyn ViewFactory>) -> Self {
        let transpiler = Transpiler::new(factory).with_max_depth(config.inheritance.max_depth);
        let cache: Arc<dyn Cache> = if config.cache.enabled {
            let cache = InMemoryCache::new();
            Arc::new(match config.cache.ttl() {
                Some(ttl) => cache.with_default_ttl(ttl),
                None => cache,
            })
        } else {
            Arc::new(NullCache)
        };
        Self::new(Arc::new(transpiler), cache)
    }

    pub fn cache(&self) -> &dyn Cache {
        self.cache.as_ref()
    }

    /// Compile `view` to its output.
    ///
    /// The view itself is left untouched; the transpiler works on a copy, so compiling the
    /// same view again hits the cache.
    pub fn compile(&self, view: &View) -> Result<String, TranspileError> {
        if let Some(compiled) = self.cache.get(view) {
            tracing::debug!(view = view.name(), "cache hit");
            return Ok(compiled);
        }
        tracing::debug!(view = view.name(), "cache miss");

        let mut working = view.clone();
        let compiled = self.transpiler.transpile(&mut working)?;
        self.cache.set(view, compiled.clone());
        Ok(compiled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quill::config::load_defaults;
    use crate::quill::factory::MemoryViewFactory;

    fn factory() -> Arc<dyn ViewFactory> {
        Arc::new(MemoryViewFactory::new())
    }

    #[test]
    fn test_compile_renders() {
        let compiler = Compiler::without_cache(Arc::new(Transpiler::new(factory())));
        let view = View::new("hello", "Hello, {{ $name }}!").with_var("name", "Dave");
        assert_eq!(compiler.compile(&view).unwrap(), "Hello, Dave!");
    }

    #[test]
    fn test_compile_leaves_view_unchanged() {
        let factory = Arc::new(
            MemoryViewFactory::new().with_template("base", "{{ $title }}"),
        );
        factory.register_builder("base", |view: &mut View| view.set_var("title", "Base"));
        let compiler = Compiler::without_cache(Arc::new(Transpiler::new(factory)));
        let view = View::new("page", "<% extends(\"base\") %>");
        assert_eq!(compiler.compile(&view).unwrap(), "Base");
        assert!(!view.has_var("title"));
    }

    #[test]
    fn test_from_config_caches() {
        let config = load_defaults().expect("defaults to deserialize");
        let compiler = Compiler::from_config(&config, factory());
        let view = View::new("hello", "hi");
        assert_eq!(compiler.compile(&view).unwrap(), "hi");
        assert!(compiler.cache().has(&view));
    }

    #[test]
    fn test_errors_are_not_cached() {
        let config = load_defaults().expect("defaults to deserialize");
        let compiler = Compiler::from_config(&config, factory());
        let view = View::new("broken", "<% nope %>");
        assert!(compiler.compile(&view).is_err());
        assert!(!compiler.cache().has(&view));
    }
}
