//! Output sanitizers
//!
//! Sanitized tags run their rendered value through a [`Sanitizer`] before it reaches the output.

/// Makes rendered text safe for the output context.
pub trait Sanitizer: Send + Sync {
    fn run(&self, input: &str) -> String;
}

/// Escapes HTML special characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlSanitizer;

impl Sanitizer for HtmlSanitizer {
    fn run(&self, input: &str) -> String {
        escape_html(input)
    }
}

/// Escape HTML special characters
///
/// `&` is replaced first so already produced entities are not escaped twice.
pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html("<script>alert('XSS')</script>"),
            "&lt;script&gt;alert(&#x27;XSS&#x27;)&lt;/script&gt;"
        );
        assert_eq!(escape_html(r#"a & "b""#), "a &amp; &quot;b&quot;");
    }

    #[test]
    fn test_html_sanitizer() {
        assert_eq!(HtmlSanitizer.run("<b>"), "&lt;b&gt;");
        assert_eq!(HtmlSanitizer.run("plain"), "plain");
    }
}
