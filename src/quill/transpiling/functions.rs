//! Built-in view functions
//!
//! HTML `<head>` helpers. All string arguments are HTML-escaped. Functions taking paths accept
//! either a single string or an array of strings.

use super::registry::ViewFunctionRegistry;
use crate::quill::sanitizer::escape_html;
use crate::quill::script::display;
use serde_json::Value;

/// Register every built-in view function.
pub fn register_defaults(registry: &ViewFunctionRegistry) {
    registry.register("charset", |args: &[Value]| {
        let charset = string_arg("charset", args, 0)?;
        Ok(Value::from(format!("<meta charset=\"{}\">", charset)))
    });
    registry.register("css", |args: &[Value]| {
        let links: Vec<String> = paths("css", args)?
            .iter()
            .map(|path| format!("<link href=\"{}\" rel=\"stylesheet\">", path))
            .collect();
        Ok(Value::from(links.join("\n")))
    });
    registry.register("favicon", |args: &[Value]| {
        let path = string_arg("favicon", args, 0)?;
        Ok(Value::from(format!(
            "<link href=\"{}\" rel=\"shortcut icon\">",
            path
        )))
    });
    registry.register("http_equiv", |args: &[Value]| {
        let name = string_arg("http_equiv", args, 0)?;
        let value = string_arg("http_equiv", args, 1)?;
        Ok(Value::from(format!(
            "<meta http-equiv=\"{}\" content=\"{}\">",
            name, value
        )))
    });
    registry.register("meta_description", |args: &[Value]| {
        let description = string_arg("meta_description", args, 0)?;
        Ok(Value::from(format!(
            "<meta name=\"description\" content=\"{}\">",
            description
        )))
    });
    registry.register("meta_keywords", |args: &[Value]| {
        let keywords = paths("meta_keywords", args)?.join(",");
        Ok(Value::from(format!(
            "<meta name=\"keywords\" content=\"{}\">",
            keywords
        )))
    });
    registry.register("page_title", |args: &[Value]| {
        let title = string_arg("page_title", args, 0)?;
        Ok(Value::from(format!("<title>{}</title>", title)))
    });
    registry.register("script", |args: &[Value]| {
        let kind = match args.get(1) {
            Some(kind) => escape_html(&display(kind)),
            None => "text/javascript".to_string(),
        };
        let tags: Vec<String> = paths("script", &args[..args.len().min(1)])?
            .iter()
            .map(|path| format!("<script type=\"{}\" src=\"{}\"></script>", kind, path))
            .collect();
        Ok(Value::from(tags.join("\n")))
    });
}

/// Escaped string form of argument `index`.
fn string_arg(function: &str, args: &[Value], index: usize) -> Result<String, String> {
    match args.get(index) {
        Some(Value::Array(_)) | Some(Value::Object(_)) => {
            Err(format!("{}() expects a string for argument {}", function, index + 1))
        }
        Some(value) => Ok(escape_html(&display(value))),
        None => Err(format!("{}() is missing argument {}", function, index + 1)),
    }
}

/// Escaped paths from the first argument, a string or an array of strings.
fn paths(function: &str, args: &[Value]) -> Result<Vec<String>, String> {
    match args.first() {
        Some(Value::Array(items)) => Ok(items.iter().map(|item| escape_html(&display(item))).collect()),
        Some(_) => Ok(vec![string_arg(function, args, 0)?]),
        None => Err(format!("{}() is missing argument 1", function)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, args: &[Value]) -> String {
        let registry = ViewFunctionRegistry::with_defaults();
        let value = registry.call(name, args).expect("function to succeed");
        display(&value)
    }

    #[test]
    fn test_charset() {
        assert_eq!(call("charset", &[json!("utf-8")]), r#"<meta charset="utf-8">"#);
    }

    #[test]
    fn test_css_accepts_one_or_many() {
        assert_eq!(
            call("css", &[json!("a.css")]),
            r#"<link href="a.css" rel="stylesheet">"#
        );
        assert_eq!(
            call("css", &[json!(["a.css", "b.css"])]),
            "<link href=\"a.css\" rel=\"stylesheet\">\n<link href=\"b.css\" rel=\"stylesheet\">"
        );
    }

    #[test]
    fn test_favicon() {
        assert_eq!(
            call("favicon", &[json!("/favicon.ico")]),
            r#"<link href="/favicon.ico" rel="shortcut icon">"#
        );
    }

    #[test]
    fn test_http_equiv() {
        assert_eq!(
            call("http_equiv", &[json!("refresh"), json!(30)]),
            r#"<meta http-equiv="refresh" content="30">"#
        );
    }

    #[test]
    fn test_meta_tags() {
        assert_eq!(
            call("meta_description", &[json!("A \"quoted\" page")]),
            r#"<meta name="description" content="A &quot;quoted&quot; page">"#
        );
        assert_eq!(
            call("meta_keywords", &[json!(["rust", "templates"])]),
            r#"<meta name="keywords" content="rust,templates">"#
        );
    }

    #[test]
    fn test_page_title_is_escaped() {
        assert_eq!(
            call("page_title", &[json!("Tom & Jerry")]),
            "<title>Tom &amp; Jerry</title>"
        );
    }

    #[test]
    fn test_script_with_type() {
        assert_eq!(
            call("script", &[json!("app.js")]),
            r#"<script type="text/javascript" src="app.js"></script>"#
        );
        assert_eq!(
            call("script", &[json!(["a.js"]), json!("module")]),
            r#"<script type="module" src="a.js"></script>"#
        );
    }

    #[test]
    fn test_missing_argument_fails() {
        let registry = ViewFunctionRegistry::with_defaults();
        assert!(registry.call("page_title", &[]).is_err());
    }
}
