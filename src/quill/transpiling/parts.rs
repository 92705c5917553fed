//! Part buffers
//!
//! [`OutputStack`] holds the output of one view while it runs: a root buffer plus one frame per
//! open `part`. [`PartTable`] holds every part defined during a compile, keyed by name and by
//! the generation (distance from the compiled view) of the view that defined it.

use crate::quill::error::TranspileError;
use std::collections::HashMap;

/// Stands in for the next-outer definition inside a part body.
pub const PARENT_PLACEHOLDER: &str = "\u{1}quill:parent\u{1}";

/// Part definitions for a whole compile.
#[derive(Debug, Default)]
pub struct PartTable {
    parts: HashMap<String, Vec<(usize, String)>>,
    last_defined: Option<String>,
}

impl PartTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `text` as the definition of `name` for `generation`.
    ///
    /// Definitions are kept sorted nearest first. A second definition in the same generation
    /// replaces the first.
    pub fn define(&mut self, name: &str, generation: usize, text: String) {
        let definitions = self.parts.entry(name.to_string()).or_default();
        match definitions.binary_search_by_key(&generation, |(g, _)| *g) {
            Ok(index) => definitions[index].1 = text,
            Err(index) => definitions.insert(index, (generation, text)),
        }
        self.last_defined = Some(name.to_string());
    }

    pub fn last_defined(&self) -> Option<&str> {
        self.last_defined.as_deref()
    }

    /// Compose a part from its nearest definition outwards.
    ///
    /// Each placeholder is replaced with the next-outer definition until none are left or the
    /// definitions run out. Unknown parts resolve to the empty string.
    pub fn resolve(&self, name: &str) -> String {
        let Some(definitions) = self.parts.get(name) else {
            return String::new();
        };
        let mut generations = definitions.iter().map(|(_, text)| text.as_str());
        let mut text = generations.next().unwrap_or_default().to_string();
        for outer in generations {
            if !text.contains(PARENT_PLACEHOLDER) {
                break;
            }
            text = text.replace(PARENT_PLACEHOLDER, outer);
        }
        text.replace(PARENT_PLACEHOLDER, "")
    }
}

struct PartFrame {
    name: String,
    line: usize,
    buffer: String,
}

/// Output of one running view.
#[derive(Default)]
pub struct OutputStack {
    root: String,
    frames: Vec<PartFrame>,
}

impl OutputStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the innermost open part, or to the view output.
    pub fn push_str(&mut self, text: &str) {
        match self.frames.last_mut() {
            Some(frame) => frame.buffer.push_str(text),
            None => self.root.push_str(text),
        }
    }

    pub fn open(&mut self, name: String, line: usize) {
        self.frames.push(PartFrame {
            name,
            line,
            buffer: String::new(),
        });
    }

    /// Close the innermost part, returning its name and captured text.
    pub fn close(&mut self) -> Option<(String, String)> {
        self.frames.pop().map(|frame| (frame.name, frame.buffer))
    }

    pub fn is_capturing(&self) -> bool {
        !self.frames.is_empty()
    }

    /// The view output. Fails if a part is still open.
    pub fn finish(mut self) -> Result<String, TranspileError> {
        match self.frames.pop() {
            Some(frame) => Err(TranspileError::UnclosedPart {
                name: frame.name,
                line: frame.line,
            }),
            None => Ok(self.root),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_generations_compose_nearest_first() {
        let mut parts = PartTable::new();
        parts.define("foo", 2, "bar".into());
        parts.define("foo", 1, format!("{}baz", PARENT_PLACEHOLDER));
        parts.define("foo", 0, format!("blah{}", PARENT_PLACEHOLDER));
        assert_eq!(parts.resolve("foo"), "blahbarbaz");
    }

    #[test]
    fn test_placeholder_without_ancestor_is_removed() {
        let mut parts = PartTable::new();
        parts.define("foo", 0, format!("a{}b", PARENT_PLACEHOLDER));
        assert_eq!(parts.resolve("foo"), "ab");
    }

    #[test]
    fn test_nearest_without_placeholder_hides_ancestors() {
        let mut parts = PartTable::new();
        parts.define("foo", 1, "outer".into());
        parts.define("foo", 0, "inner".into());
        assert_eq!(parts.resolve("foo"), "inner");
    }

    #[test]
    fn test_same_generation_replaces() {
        let mut parts = PartTable::new();
        parts.define("foo", 0, "first".into());
        parts.define("bar", 0, "other".into());
        parts.define("foo", 0, "second".into());
        assert_eq!(parts.resolve("foo"), "second");
        assert_eq!(parts.last_defined(), Some("foo"));
    }

    #[test]
    fn test_unknown_part_is_empty() {
        assert_eq!(PartTable::new().resolve("missing"), "");
    }

    #[test]
    fn test_output_stack_captures_into_innermost_frame() {
        let mut output = OutputStack::new();
        output.push_str("a");
        output.open("outer".into(), 1);
        output.push_str("b");
        output.open("inner".into(), 2);
        output.push_str("c");
        assert_eq!(output.close(), Some(("inner".into(), "c".into())));
        assert_eq!(output.close(), Some(("outer".into(), "b".into())));
        assert!(!output.is_capturing());
        assert_eq!(output.finish().unwrap(), "a");
    }

    #[test]
    fn test_unclosed_part() {
        let mut output = OutputStack::new();
        output.open("foo".into(), 4);
        assert_eq!(
            output.finish(),
            Err(TranspileError::UnclosedPart {
                name: "foo".into(),
                line: 4
            })
        );
    }
}
