//! View factories
//!
//! The transpiler loads the views named by `extends` and `include` through a [`ViewFactory`].
//! [`MemoryViewFactory`] keeps templates in memory and can run builder callbacks on every
//! created view, which is how applications seed per-view variables.

use crate::quill::error::FactoryError;
use crate::quill::view::{Delimiters, View};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Creates views by name.
pub trait ViewFactory: Send + Sync {
    fn create_view(&self, name: &str) -> Result<View, FactoryError>;

    fn has_view(&self, name: &str) -> bool;
}

/// Called on every view created under its name.
pub type ViewBuilder = Arc<dyn Fn(&mut View) + Send + Sync>;

/// Templates held in memory
#[derive(Default)]
pub struct MemoryViewFactory {
    templates: RwLock<HashMap<String, String>>,
    builders: RwLock<HashMap<String, Vec<ViewBuilder>>>,
    delimiters: Delimiters,
}

impl MemoryViewFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delimiters given to every created view.
    pub fn with_delimiters(mut self, delimiters: Delimiters) -> Self {
        self.delimiters = delimiters;
        self
    }

    /// Add or replace a template.
    pub fn add_template(&self, name: impl Into<String>, contents: impl Into<String>) {
        self.templates.write().insert(name.into(), contents.into());
    }

    pub fn with_template(self, name: impl Into<String>, contents: impl Into<String>) -> Self {
        self.add_template(name, contents);
        self
    }

    /// Load every file directly under `dir`, named by its file stem.
    pub fn load_dir(&self, dir: &Path) -> Result<usize, FactoryError> {
        let load_error = |path: &Path, error: std::io::Error| FactoryError::Load {
            name: path.display().to_string(),
            message: error.to_string(),
        };
        let entries = fs::read_dir(dir).map_err(|e| load_error(dir, e))?;
        let mut loaded = 0;
        for entry in entries {
            let path: PathBuf = entry.map_err(|e| load_error(dir, e))?.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                tracing::warn!(path = %path.display(), "skipping template without a UTF-8 name");
                continue;
            };
            let contents = fs::read_to_string(&path).map_err(|e| load_error(&path, e))?;
            self.add_template(name, contents);
            loaded += 1;
        }
        tracing::debug!(dir = %dir.display(), loaded, "loaded templates");
        Ok(loaded)
    }

    /// Run `builder` on every view created under `name`, in registration order.
    pub fn register_builder<F>(&self, name: impl Into<String>, builder: F)
    where
        F: Fn(&mut View) + Send + Sync + 'static,
    {
        self.builders
            .write()
            .entry(name.into())
            .or_default()
            .push(Arc::new(builder));
    }
}

impl ViewFactory for MemoryViewFactory {
    fn create_view(&self, name: &str) -> Result<View, FactoryError> {
        let contents = self
            .templates
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| FactoryError::NotFound(name.to_string()))?;
        let mut view = View::new(name, contents).with_delimiters(self.delimiters.clone());
        // Builders run without the lock held so they may register builders themselves.
        let builders = self.builders.read().get(name).cloned().unwrap_or_default();
        for builder in builders {
            builder(&mut view);
        }
        Ok(view)
    }

    fn has_view(&self, name: &str) -> bool {
        self.templates.read().contains_key(name)
    }
}
