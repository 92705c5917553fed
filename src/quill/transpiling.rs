//! Transpiler
//!
//! Turns a view into its rendered output. Code generation walks the AST and lowers each node to
//! [`Instruction`]s:
//!
//!     Expression      literal text, emitted verbatim
//!     SanitizedTag    the inner expression, run through the sanitizer
//!     UnsanitizedTag  the inner expression, unescaped
//!     Comment         nothing
//!     HostCode        the inner statements
//!     Directive       whatever the directive's generator returns
//!
//! The instructions are assembled into a [`Program`], which a per-compile runtime executes. The
//! runtime is where `extends`, `include` and parts are resolved, so everything mutable lives
//! there and a `Transpiler` can be shared between threads.

pub mod directives;
pub mod functions;
mod parts;
pub mod program;
pub mod registry;
mod runtime;

pub use program::{Instruction, Op, Program};
pub use registry::{DirectiveFn, DirectiveRegistry, ViewFunction, ViewFunctionRegistry};

use crate::quill::error::{FunctionError, ScriptError, TranspileError};
use crate::quill::factory::ViewFactory;
use crate::quill::lexing::Lexer;
use crate::quill::parsing::{Ast, NodeKind, Parser};
use crate::quill::sanitizer::{HtmlSanitizer, Sanitizer};
use crate::quill::script::{natives, parse_expression, parse_statements, ViewFunctions};
use crate::quill::view::View;
use runtime::Runtime;
use serde_json::Value;
use std::sync::Arc;

/// How many views may be rendering at once (parents and includes) before a compile fails.
pub const DEFAULT_MAX_DEPTH: usize = 32;

pub struct Transpiler {
    directives: Arc<DirectiveRegistry>,
    functions: Arc<ViewFunctionRegistry>,
    factory: Arc<dyn ViewFactory>,
    sanitizer: Arc<dyn Sanitizer>,
    natives: Arc<ViewFunctionRegistry>,
    parser: Parser,
    max_depth: usize,
}

impl Transpiler {
    /// A transpiler with the built-in directives and view functions and the HTML sanitizer.
    pub fn new(factory: Arc<dyn ViewFactory>) -> Self {
        Transpiler {
            directives: Arc::new(DirectiveRegistry::with_defaults()),
            functions: Arc::new(ViewFunctionRegistry::with_defaults()),
            factory,
            sanitizer: Arc::new(HtmlSanitizer),
            natives: Arc::new(ViewFunctionRegistry::new()),
            parser: Parser::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_directives(mut self, directives: Arc<DirectiveRegistry>) -> Self {
        self.directives = directives;
        self
    }

    pub fn with_functions(mut self, functions: Arc<ViewFunctionRegistry>) -> Self {
        self.functions = functions;
        self
    }

    pub fn with_sanitizer(mut self, sanitizer: Arc<dyn Sanitizer>) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// Plain functions supplied by the host.
    ///
    /// Their names are passed through by the lexer like the built-in natives, so templates call
    /// them without the view-function rewrite. Built-in natives take precedence.
    pub fn with_natives(mut self, natives: Arc<ViewFunctionRegistry>) -> Self {
        self.natives = natives;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn directives(&self) -> &DirectiveRegistry {
        &self.directives
    }

    pub fn functions(&self) -> &ViewFunctionRegistry {
        &self.functions
    }

    pub fn natives(&self) -> &ViewFunctionRegistry {
        &self.natives
    }

    pub fn factory(&self) -> &dyn ViewFactory {
        self.factory.as_ref()
    }

    pub fn sanitizer(&self) -> &dyn Sanitizer {
        self.sanitizer.as_ref()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Render `view`.
    ///
    /// Variables of every ancestor the view extends are merged into it, nearest first, without
    /// overwriting its own.
    pub fn transpile(&self, view: &mut View) -> Result<String, TranspileError> {
        tracing::debug!(view = view.name(), "transpiling view");
        let scope = view.vars().clone();
        Runtime::new(self).render(view, scope, 0)
    }

    /// Lex, parse and generate the program for one view, without running it.
    pub fn generate(&self, view: &View) -> Result<Program, TranspileError> {
        let lexer = Lexer::for_view(view)?.with_passthrough(self.natives.list());
        let tokens = lexer.lex(view.contents())?;
        let ast = self.parser.parse(&tokens)?;
        self.generate_ast(&ast)
    }

    /// Lower an AST into a program.
    pub fn generate_ast(&self, ast: &Ast) -> Result<Program, TranspileError> {
        let mut instructions = Vec::new();

        for &id in &ast.root().children {
            let node = ast.node(id);
            let line = node.line;
            let inner = ast.expression_of(id).unwrap_or_default();

            match &node.kind {
                NodeKind::Expression(text) => {
                    instructions.push((Instruction::Text(text.clone()), line));
                }
                NodeKind::SanitizedTag | NodeKind::UnsanitizedTag => {
                    let expr = parse_expression(inner)
                        .map_err(|source| TranspileError::Expression { line, source })?;
                    let sanitize = node.kind == NodeKind::SanitizedTag;
                    instructions.push((Instruction::Echo { expr, sanitize }, line));
                }
                NodeKind::Comment => {
                    instructions.push((Instruction::Comment(inner.to_string()), line));
                }
                NodeKind::HostCode => {
                    let statements = parse_statements(inner)
                        .map_err(|source| TranspileError::Expression { line, source })?;
                    instructions.push((Instruction::Exec(statements), line));
                }
                NodeKind::Directive => {
                    let (name, expr) = ast.directive_parts(id).unwrap_or_default();
                    let generator =
                        self.directives
                            .get(name)
                            .ok_or_else(|| TranspileError::UnknownDirective {
                                name: name.to_string(),
                                line,
                            })?;
                    tracing::trace!(directive = name, line, "dispatching directive");
                    let generated = generator(expr.unwrap_or_default()).map_err(|source| {
                        TranspileError::Directive {
                            name: name.to_string(),
                            line,
                            source,
                        }
                    })?;
                    instructions.extend(generated.into_iter().map(|i| (i, line)));
                }
                NodeKind::Root | NodeKind::DirectiveName(_) => {}
            }
        }

        Program::assemble(instructions)
    }

    /// Call a registered view function.
    pub fn call_view_function(&self, name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        self.functions.call(name, args)
    }
}

impl ViewFunctions for Transpiler {
    fn call_view_function(&self, name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        self.functions.call(name, args)
    }

    fn call_native(&self, name: &str, args: &[Value]) -> Result<Value, ScriptError> {
        if let Some(native) = natives::lookup(name) {
            return native(args);
        }
        if !self.natives.has(name) {
            return Err(ScriptError::UnknownNative(name.to_string()));
        }
        Ok(self.natives.call(name, args)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quill::error::ScriptError;
    use crate::quill::factory::MemoryViewFactory;
    use serde_json::json;

    fn transpiler(factory: MemoryViewFactory) -> Transpiler {
        Transpiler::new(Arc::new(factory))
    }

    fn render(source: &str) -> Result<String, TranspileError> {
        let mut view = View::new("test", source);
        transpiler(MemoryViewFactory::new()).transpile(&mut view)
    }

    #[test]
    fn test_plain_text_passes_through() {
        assert_eq!(render("\n\nHello\n  world\n\n").unwrap(), "Hello\n  world");
    }

    #[test]
    fn test_tags() {
        let mut view = View::new("test", "{{ $a }}|{{! $a !}}").with_var("a", "<b>");
        let output = transpiler(MemoryViewFactory::new())
            .transpile(&mut view)
            .unwrap();
        assert_eq!(output, "&lt;b&gt;|<b>");
    }

    #[test]
    fn test_comments_render_nothing() {
        assert_eq!(render("a{# anything #}b").unwrap(), "ab");
    }

    #[test]
    fn test_adjacent_host_code_blocks_render_values_only() {
        assert_eq!(render("<?host echo 1; ?><?host echo 2; ?>").unwrap(), "12");
        assert_eq!(render("<?host $a = 1; ?><?host echo $a; ?>").unwrap(), "1");
    }

    #[test]
    fn test_host_code_assigns_and_echoes() {
        assert_eq!(
            render("<?host $x = 2; echo $x * 3; ?> {{ $x }}").unwrap(),
            "6 2"
        );
    }

    #[test]
    fn test_unknown_directive() {
        assert_eq!(
            render("\n<% unknownDirective %>"),
            Err(TranspileError::UnknownDirective {
                name: "unknownDirective".into(),
                line: 2
            })
        );
    }

    #[test]
    fn test_unknown_function_is_reported_at_call_time() {
        assert_eq!(
            render("<% if(false) %>{{ nope() }}<% endif %>").unwrap(),
            ""
        );
        assert_eq!(
            render("{{ nope() }}"),
            Err(TranspileError::UnknownFunction {
                name: "nope".into(),
                line: 1
            })
        );
    }

    #[test]
    fn test_view_function_call() {
        assert_eq!(
            render(r#"{{! page_title("Home") !}}"#).unwrap(),
            "<title>Home</title>"
        );
    }

    #[test]
    fn test_if_elseif_else() {
        let source = "<% if($n > 1) %>many<% elseif($n == 1) %>one<% else %>none<% endif %>";
        let render_with = |n: i64| {
            let mut view = View::new("test", source).with_var("n", n);
            transpiler(MemoryViewFactory::new()).transpile(&mut view)
        };
        assert_eq!(render_with(3).unwrap(), "many");
        assert_eq!(render_with(1).unwrap(), "one");
        assert_eq!(render_with(0).unwrap(), "none");
    }

    #[test]
    fn test_foreach_with_keys() {
        let mut view = View::new(
            "test",
            "<% foreach($items as $k => $v) %>{{ $k }}={{ $v }};<% endforeach %>",
        )
        .with_var("items", json!({"a": 1, "b": 2}));
        let output = transpiler(MemoryViewFactory::new())
            .transpile(&mut view)
            .unwrap();
        assert_eq!(output, "a=1;b=2;");
    }

    #[test]
    fn test_nested_foreach() {
        let mut view = View::new(
            "test",
            "<% foreach($rows as $row) %>[<% foreach($row as $cell) %>{{ $cell }}<% endforeach %>]<% endforeach %>",
        )
        .with_var("rows", json!([[1, 2], [], [3]]));
        let output = transpiler(MemoryViewFactory::new())
            .transpile(&mut view)
            .unwrap();
        assert_eq!(output, "[12][][3]");
    }

    #[test]
    fn test_foreach_over_scalar_fails() {
        let mut view = View::new("test", "<% foreach($n as $x) %><% endforeach %>").with_var("n", 1);
        let result = transpiler(MemoryViewFactory::new()).transpile(&mut view);
        assert!(matches!(
            result,
            Err(TranspileError::Runtime {
                source: ScriptError::Type(_),
                ..
            })
        ));
    }

    #[test]
    fn test_for_and_while() {
        assert_eq!(
            render("<% for($i = 0; $i < 3; $i++) %>{{ $i }}<% endfor %>").unwrap(),
            "012"
        );
        assert_eq!(
            render("<?host $n = 3; ?><% while($n > 0) %>{{ $n }}<?host $n--; ?><% endwhile %>")
                .unwrap(),
            "321"
        );
    }

    #[test]
    fn test_include_scopes() {
        let factory = MemoryViewFactory::new()
            .with_template("greeting", "{{ $greeting }}, {{ $name }}");
        factory.register_builder("greeting", |view: &mut View| {
            view.set_var("greeting", "Hello");
            view.set_var("name", "nobody");
        });
        let mut view = View::new(
            "page",
            r#"<% include("greeting") %>/<% include("greeting", ["name" => "Ada"]) %>"#,
        )
        .with_var("name", "Dave")
        .with_var("greeting", "Hi");
        let output = transpiler(factory).transpile(&mut view).unwrap();
        assert_eq!(output, "Hello, nobody/Hello, Ada");
    }

    #[test]
    fn test_show_without_name_ends_open_part() {
        assert_eq!(
            render("<% part(\"side\") %>menu<% show %>|<% show(\"side\") %>").unwrap(),
            "menu|menu"
        );
    }

    #[test]
    fn test_parent_outside_part() {
        assert_eq!(
            render("\n\n<% parent %>"),
            Err(TranspileError::NoOpenPart {
                directive: "parent".into(),
                line: 3
            })
        );
    }

    #[test]
    fn test_unclosed_part() {
        assert!(matches!(
            render("<% part(\"a\") %>x"),
            Err(TranspileError::UnclosedPart { .. })
        ));
    }

    #[test]
    fn test_extends_twice() {
        let factory = MemoryViewFactory::new().with_template("base", "");
        let mut view = View::new("page", "<% extends(\"base\") %><% extends(\"other\") %>");
        assert!(matches!(
            transpiler(factory).transpile(&mut view),
            Err(TranspileError::MultipleParents { .. })
        ));
    }

    #[test]
    fn test_generate_does_not_run() {
        let view = View::new("test", "<% if($missing) %>x<% endif %>");
        let program = transpiler(MemoryViewFactory::new()).generate(&view).unwrap();
        assert_eq!(program.len(), 2);
    }

    #[test]
    fn test_custom_directive() {
        let mut directives = DirectiveRegistry::with_defaults();
        directives.register("hr", |_: &str| Ok(vec![Instruction::Text("<hr>".into())]));
        let transpiler =
            transpiler(MemoryViewFactory::new()).with_directives(Arc::new(directives));
        let mut view = View::new("test", "a<% hr %>b");
        assert_eq!(transpiler.transpile(&mut view).unwrap(), "a<hr>b");
    }
}
