//! Views
//!
//! A [`View`] is one template instance: its identity, raw contents, the variables it is rendered
//! with and the delimiters its lexer should recognise.
//!
//! Delimiters
//!
//!     Four kinds are configurable per view (see [`DelimiterKind`]). Host-code blocks use a fixed
//!     pair, [`HOST_CODE_OPEN`] and [`HOST_CODE_CLOSE`], which cannot be changed. Open markers may
//!     be prefixes of one another (`{{` and `{{!` by default); the lexer resolves that by always
//!     taking the longest marker that matches.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// Ordered variable bindings of a view.
pub type Vars = Map<String, Value>;

/// Open marker of a host-code block.
pub const HOST_CODE_OPEN: &str = "<?host";
/// Close marker of a host-code block.
pub const HOST_CODE_CLOSE: &str = "?>";

/// The configurable delimiter kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DelimiterKind {
    SanitizedTag,
    UnsanitizedTag,
    Directive,
    Comment,
}

impl DelimiterKind {
    pub const ALL: [DelimiterKind; 4] = [
        DelimiterKind::SanitizedTag,
        DelimiterKind::UnsanitizedTag,
        DelimiterKind::Directive,
        DelimiterKind::Comment,
    ];

    /// The delimiters used when a view does not configure its own.
    pub fn default_pair(self) -> (&'static str, &'static str) {
        match self {
            DelimiterKind::SanitizedTag => ("{{", "}}"),
            DelimiterKind::UnsanitizedTag => ("{{!", "!}}"),
            DelimiterKind::Directive => ("<%", "%>"),
            DelimiterKind::Comment => ("{#", "#}"),
        }
    }
}

impl fmt::Display for DelimiterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DelimiterKind::SanitizedTag => "sanitized tag",
            DelimiterKind::UnsanitizedTag => "unsanitized tag",
            DelimiterKind::Directive => "directive",
            DelimiterKind::Comment => "comment",
        };
        f.write_str(name)
    }
}

/// Open/close marker pairs for every configurable kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    pairs: HashMap<DelimiterKind, (String, String)>,
}

impl Delimiters {
    pub fn new() -> Self {
        let pairs = DelimiterKind::ALL
            .iter()
            .map(|kind| {
                let (open, close) = kind.default_pair();
                (*kind, (open.to_string(), close.to_string()))
            })
            .collect();
        Delimiters { pairs }
    }

    /// The `(open, close)` pair for `kind`.
    pub fn get(&self, kind: DelimiterKind) -> (&str, &str) {
        match self.pairs.get(&kind) {
            Some((open, close)) => (open.as_str(), close.as_str()),
            None => kind.default_pair(),
        }
    }

    pub fn set(&mut self, kind: DelimiterKind, open: impl Into<String>, close: impl Into<String>) {
        self.pairs.insert(kind, (open.into(), close.into()));
    }

    /// Iterate over all kinds in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = (DelimiterKind, &str, &str)> + '_ {
        DelimiterKind::ALL.iter().map(move |kind| {
            let (open, close) = self.get(*kind);
            (*kind, open, close)
        })
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Self::new()
    }
}

/// A template together with its variables and delimiter configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    name: String,
    contents: String,
    vars: Vars,
    delimiters: Delimiters,
}

impl View {
    pub fn new(name: impl Into<String>, contents: impl Into<String>) -> Self {
        View {
            name: name.into(),
            contents: contents.into(),
            vars: Vars::new(),
            delimiters: Delimiters::default(),
        }
    }

    /// A view with no identity, for templates that are not loaded through a factory.
    pub fn from_contents(contents: impl Into<String>) -> Self {
        Self::new("", contents)
    }

    /// The identity used for factory lookups, cycle detection and cache keys.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contents(&self) -> &str {
        &self.contents
    }

    pub fn set_contents(&mut self, contents: impl Into<String>) {
        self.contents = contents.into();
    }

    pub fn vars(&self) -> &Vars {
        &self.vars
    }

    pub fn var(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn has_var(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn set_var(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Replace all variables at once.
    pub fn set_vars(&mut self, vars: Vars) {
        self.vars = vars;
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_var(name, value);
        self
    }

    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    pub fn set_delimiters(
        &mut self,
        kind: DelimiterKind,
        open: impl Into<String>,
        close: impl Into<String>,
    ) {
        self.delimiters.set(kind, open, close);
    }

    pub fn with_delimiters(mut self, delimiters: Delimiters) -> Self {
        self.delimiters = delimiters;
        self
    }

    /// Copy every variable of `parent` that this view has not set itself.
    ///
    /// Binding to several ancestors nearest-first keeps the nearest value, since later calls
    /// never overwrite a name that is already present. Returns how many variables were copied.
    pub fn inherit_vars_from(&mut self, parent: &View) -> usize {
        let mut copied = 0;
        for (name, value) in parent.vars() {
            if !self.vars.contains_key(name) {
                self.vars.insert(name.clone(), value.clone());
                copied += 1;
            }
        }
        copied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_delimiters() {
        let delimiters = Delimiters::default();
        assert_eq!(delimiters.get(DelimiterKind::SanitizedTag), ("{{", "}}"));
        assert_eq!(delimiters.get(DelimiterKind::UnsanitizedTag), ("{{!", "!}}"));
        assert_eq!(delimiters.get(DelimiterKind::Directive), ("<%", "%>"));
        assert_eq!(delimiters.get(DelimiterKind::Comment), ("{#", "#}"));
    }

    #[test]
    fn test_custom_delimiters() {
        let mut view = View::new("page", "");
        view.set_delimiters(DelimiterKind::SanitizedTag, "^^", "$$");
        assert_eq!(view.delimiters().get(DelimiterKind::SanitizedTag), ("^^", "$$"));
        assert_eq!(view.delimiters().get(DelimiterKind::Directive), ("<%", "%>"));
    }

    #[test]
    fn test_vars_keep_insertion_order() {
        let view = View::new("page", "")
            .with_var("zeta", 1)
            .with_var("alpha", 2);
        let names: Vec<_> = view.vars().keys().cloned().collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_inherit_vars_keeps_own_values() {
        let mut child = View::new("child", "").with_var("title", "Child");
        let parent = View::new("parent", "")
            .with_var("title", "Parent")
            .with_var("footer", "(c)");

        assert_eq!(child.inherit_vars_from(&parent), 1);
        assert_eq!(child.var("title"), Some(&json!("Child")));
        assert_eq!(child.var("footer"), Some(&json!("(c)")));
    }

    #[test]
    fn test_nearest_ancestor_wins() {
        let mut child = View::new("child", "");
        let parent1 = View::new("parent1", "").with_var("foo", "bar");
        let parent2 = View::new("parent2", "").with_var("foo", "baz");

        child.inherit_vars_from(&parent1);
        child.inherit_vars_from(&parent2);

        assert_eq!(child.var("foo"), Some(&json!("bar")));
    }
}
