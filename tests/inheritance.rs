//! Template inheritance: parts, parent placeholders, variable merging and cycles

use quill::quill::{MemoryViewFactory, TranspileError, Transpiler, View, ViewFactory};
use serde_json::json;
use std::sync::Arc;

fn transpiler(factory: MemoryViewFactory) -> Transpiler {
    Transpiler::new(Arc::new(factory))
}

fn render(factory: MemoryViewFactory, name: &str) -> Result<String, TranspileError> {
    let mut view = factory.create_view(name).expect("view to exist");
    transpiler(factory).transpile(&mut view)
}

#[test]
fn test_three_generations_compose_parts() {
    let factory = MemoryViewFactory::new()
        .with_template(
            "grandparent",
            r#"<% part("foo") %>bar<% endpart %><% show("foo") %>"#,
        )
        .with_template(
            "parent",
            r#"<% extends("grandparent") %><% part("foo") %><% parent %>baz<% endpart %>"#,
        )
        .with_template(
            "child",
            r#"<% extends("parent") %><% part("foo") %>blah<% parent %><% endpart %>"#,
        );
    assert_eq!(render(factory, "child").unwrap(), "blahbarbaz");
}

#[test]
fn test_child_part_without_parent_replaces_ancestors() {
    let factory = MemoryViewFactory::new()
        .with_template(
            "grandparent",
            r#"<% part("foo") %>bar<% endpart %><% show("foo") %>"#,
        )
        .with_template(
            "parent",
            r#"<% extends("grandparent") %><% part("foo") %><% parent %>baz<% endpart %>"#,
        )
        .with_template(
            "child",
            r#"<% extends("parent") %><% part("foo") %>blah<% endpart %>"#,
        );
    assert_eq!(render(factory, "child").unwrap(), "blah");
}

#[test]
fn test_layout_shows_child_parts() {
    let layout = "<html>\n<title><% show(\"title\") %></title>\n<body><% show(\"body\") %></body>\n</html>";
    let page = r#"
<% extends("layout") %>
<% part("title") %>Home<% endpart %>
<% part("body") %>Hello, {{ $name }}<% endpart %>
"#;
    let factory = MemoryViewFactory::new()
        .with_template("layout", layout)
        .with_template("page", page);
    factory.register_builder("page", |view: &mut View| view.set_var("name", "<Dave>"));

    assert_eq!(
        render(factory, "page").unwrap(),
        "<html>\n<title>Home</title>\n<body>Hello, &lt;Dave&gt;</body>\n</html>"
    );
}

#[test]
fn test_ancestor_part_is_the_default() {
    let factory = MemoryViewFactory::new()
        .with_template(
            "layout",
            r#"<% part("title") %>Untitled<% endpart %><title><% show("title") %></title>"#,
        )
        .with_template("bare", r#"<% extends("layout") %>"#)
        .with_template(
            "titled",
            r#"<% extends("layout") %><% part("title") %>About<% endpart %>"#,
        );
    let transpiler = transpiler(factory);

    let mut bare = transpiler.factory().create_view("bare").unwrap();
    assert_eq!(
        transpiler.transpile(&mut bare).unwrap(),
        "<title>Untitled</title>"
    );
    let mut titled = transpiler.factory().create_view("titled").unwrap();
    assert_eq!(
        transpiler.transpile(&mut titled).unwrap(),
        "<title>About</title>"
    );
}

#[test]
fn test_nearest_parent_variable_wins() {
    let factory = MemoryViewFactory::new()
        .with_template("parent1", r#"<% extends("parent2") %>"#)
        .with_template("parent2", "{{ $foo }}/{{ $only_in_parent2 }}")
        .with_template("child", r#"<% extends("parent1") %>"#);
    factory.register_builder("parent1", |view: &mut View| view.set_var("foo", "bar"));
    factory.register_builder("parent2", |view: &mut View| {
        view.set_var("foo", "baz");
        view.set_var("only_in_parent2", true);
    });

    let mut child = factory.create_view("child").unwrap();
    let output = transpiler(factory).transpile(&mut child).unwrap();

    assert_eq!(output, "bar/1");
    assert_eq!(child.var("foo"), Some(&json!("bar")));
    assert_eq!(child.var("only_in_parent2"), Some(&json!(true)));
}

#[test]
fn test_child_variables_are_not_overwritten() {
    let factory = MemoryViewFactory::new()
        .with_template("base", "{{ $title }}")
        .with_template("page", r#"<% extends("base") %>"#);
    factory.register_builder("base", |view: &mut View| view.set_var("title", "Base"));

    let mut page = factory.create_view("page").unwrap();
    page.set_var("title", "Page");
    assert_eq!(transpiler(factory).transpile(&mut page).unwrap(), "Page");
    assert_eq!(page.var("title"), Some(&json!("Page")));
}

#[test]
fn test_variables_assigned_in_child_reach_parent() {
    let factory = MemoryViewFactory::new()
        .with_template("base", "{{ $greeting }}")
        .with_template(
            "page",
            r#"<% extends("base") %><?host $greeting = "hi" . "!"; ?>"#,
        );
    assert_eq!(render(factory, "page").unwrap(), "hi!");
}

#[test]
fn test_extends_cycle_is_rejected() {
    let factory = MemoryViewFactory::new()
        .with_template("a", r#"<% extends("b") %>"#)
        .with_template("b", r#"<% extends("a") %>"#);
    assert_eq!(
        render(factory, "a"),
        Err(TranspileError::InheritanceCycle {
            chain: vec!["a".into(), "b".into(), "a".into()]
        })
    );
}

#[test]
fn test_include_cycle_is_rejected() {
    let factory = MemoryViewFactory::new().with_template("loop", r#"<% include("loop") %>"#);
    assert_eq!(
        render(factory, "loop"),
        Err(TranspileError::InheritanceCycle {
            chain: vec!["loop".into(), "loop".into()]
        })
    );
}

#[test]
fn test_repeated_include_is_not_a_cycle() {
    let factory = MemoryViewFactory::new()
        .with_template("item", "[{{ $n }}]")
        .with_template(
            "list",
            r#"<% foreach([1, 2, 3] as $n) %><% include("item") %><% endforeach %>"#,
        );
    assert_eq!(render(factory, "list").unwrap(), "[1][2][3]");
}

#[test]
fn test_depth_limit() {
    let factory = MemoryViewFactory::new()
        .with_template("v0", r#"<% include("v1") %>"#)
        .with_template("v1", r#"<% include("v2") %>"#)
        .with_template("v2", r#"<% include("v3") %>"#)
        .with_template("v3", "deep");
    let mut view = factory.create_view("v0").unwrap();

    let shallow = transpiler(factory).with_max_depth(3);
    assert_eq!(
        shallow.transpile(&mut view),
        Err(TranspileError::DepthExceeded { max_depth: 3 })
    );
}

#[test]
fn test_depth_limit_allows_exact_depth() {
    let factory = MemoryViewFactory::new()
        .with_template("v0", r#"<% include("v1") %>"#)
        .with_template("v1", "deep");
    let mut view = factory.create_view("v0").unwrap();
    assert_eq!(
        transpiler(factory).with_max_depth(2).transpile(&mut view).unwrap(),
        "deep"
    );
}

#[test]
fn test_missing_parent_propagates_factory_error() {
    let factory = MemoryViewFactory::new().with_template("page", r#"<% extends("nope") %>"#);
    assert!(matches!(
        render(factory, "page"),
        Err(TranspileError::Factory(_))
    ));
}
