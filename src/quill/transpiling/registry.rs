//! Directive and view-function registries
//!
//! Both registries map names to closures. The directive registry is built before it is handed
//! to a [`Transpiler`](super::Transpiler) and is read-only afterwards. The view-function registry
//! is shared and accepts registrations at any time, so it sits behind a lock.

use super::program::Instruction;
use crate::quill::error::{DirectiveError, FunctionError};
use crate::quill::script::ViewFunctions;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Generates instructions from a directive's raw expression text.
pub type DirectiveFn = Box<dyn Fn(&str) -> Result<Vec<Instruction>, DirectiveError> + Send + Sync>;

/// A function callable from templates.
pub type ViewFunction = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

/// Registry of directive generators
pub struct DirectiveRegistry {
    directives: HashMap<String, DirectiveFn>,
}

impl DirectiveRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        DirectiveRegistry {
            directives: HashMap::new(),
        }
    }

    /// Register a generator. An existing generator with the same name is replaced.
    pub fn register<F>(&mut self, name: impl Into<String>, generator: F)
    where
        F: Fn(&str) -> Result<Vec<Instruction>, DirectiveError> + Send + Sync + 'static,
    {
        self.directives.insert(name.into(), Box::new(generator));
    }

    pub fn get(&self, name: &str) -> Option<&DirectiveFn> {
        self.directives.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.directives.contains_key(name)
    }

    /// All registered names (sorted)
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<_> = self.directives.keys().cloned().collect();
        names.sort();
        names
    }

    /// Create a registry with the built-in directives
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        super::directives::register_defaults(&mut registry);
        registry
    }
}

impl Default for DirectiveRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Registry of view functions
pub struct ViewFunctionRegistry {
    functions: RwLock<HashMap<String, ViewFunction>>,
}

impl ViewFunctionRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        ViewFunctionRegistry {
            functions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a function. An existing function with the same name is replaced.
    pub fn register<F>(&self, name: impl Into<String>, function: F)
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.functions.write().insert(name.into(), Arc::new(function));
    }

    pub fn has(&self, name: &str) -> bool {
        self.functions.read().contains_key(name)
    }

    /// All registered names (sorted)
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<_> = self.functions.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Call a function by name.
    ///
    /// The lock is released before the function runs, so functions may use the registry.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        let function = self
            .functions
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| FunctionError::Unknown(name.to_string()))?;
        function(args).map_err(|message| FunctionError::Failed {
            name: name.to_string(),
            message,
        })
    }

    /// Create a registry with the built-in HTML helpers
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        super::functions::register_defaults(&registry);
        registry
    }
}

impl Default for ViewFunctionRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ViewFunctions for ViewFunctionRegistry {
    fn call_view_function(&self, name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        self.call(name, args)
    }
}
